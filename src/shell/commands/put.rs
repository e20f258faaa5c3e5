use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::path::Path;

use super::output::{format_size, to_json};
use super::{Command, ShellState};
use crate::print_line;
use crate::ui::create_spinner;

pub struct PutCommand;

#[async_trait]
impl Command for PutCommand {
    fn name(&self) -> &str {
        "put"
    }

    fn usage(&self) -> &str {
        "put LOCAL [DIR] - Upload a local file into DIR (default: current directory)"
    }

    async fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()> {
        let local = args
            .first()
            .ok_or_else(|| anyhow!("Usage: put LOCAL [DIR]"))?;
        let dir = match args.get(1) {
            Some(dir) => state.resolve(dir),
            None => state.cwd().clone(),
        };

        let local_path = Path::new(local);
        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("Not a file name: {local}"))?;
        let file = tokio::fs::File::open(local_path)
            .await
            .with_context(|| format!("Failed to open {local}"))?;
        let size = file.metadata().await?.len();

        let spinner = create_spinner(&format!("Uploading {file_name}..."));
        let result = state
            .manager()
            .upload(
                state.user(),
                &dir.as_dir(),
                file_name,
                Box::pin(file),
                size,
                None,
            )
            .await;
        spinner.finish_and_clear();
        let uploaded = result?;
        state.invalidate(&dir.join(file_name));

        if state.json() {
            print_line!("{}", to_json(&uploaded)?);
        } else {
            print_line!("/{} ({})", uploaded.relative_path(), format_size(size));
        }
        Ok(())
    }
}
