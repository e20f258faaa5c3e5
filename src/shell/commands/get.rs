use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures::TryStreamExt;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use super::output::format_size;
use super::{Command, ShellState};
use crate::print_line;
use crate::ui::create_progress_bar;

pub struct GetCommand;

#[async_trait]
impl Command for GetCommand {
    fn name(&self) -> &str {
        "get"
    }

    fn usage(&self) -> &str {
        "get FILE [LOCAL] - Download a file (default: its name in the local directory)"
    }

    async fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()> {
        let path = args
            .first()
            .ok_or_else(|| anyhow!("Usage: get FILE [LOCAL]"))?;
        let target = state.resolve(path);
        let mut download = state
            .manager()
            .download(state.user(), &target.as_file())
            .await?;

        let local = match args.get(1) {
            Some(local) if PathBuf::from(local).is_dir() => PathBuf::from(local).join(&download.name),
            Some(local) => PathBuf::from(local),
            None => PathBuf::from(&download.name),
        };
        let mut file = tokio::fs::File::create(&local)
            .await
            .with_context(|| format!("Failed to create {}", local.display()))?;

        let bar = create_progress_bar(download.size, &download.name);
        while let Some(chunk) = download.stream.try_next().await? {
            file.write_all(&chunk).await?;
            bar.inc(chunk.len() as u64);
        }
        file.flush().await?;
        bar.finish_and_clear();

        print_line!(
            "{} -> {} ({})",
            target,
            local.display(),
            format_size(download.size)
        );
        Ok(())
    }
}
