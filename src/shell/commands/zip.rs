use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures::TryStreamExt;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use super::output::format_size;
use super::{Command, ShellState};
use crate::print_line;
use crate::ui::create_spinner;

pub struct ZipCommand;

#[async_trait]
impl Command for ZipCommand {
    fn name(&self) -> &str {
        "zip"
    }

    fn usage(&self) -> &str {
        "zip DIR [LOCAL] - Download a directory as a zip archive"
    }

    async fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()> {
        let path = args
            .first()
            .ok_or_else(|| anyhow!("Usage: zip DIR [LOCAL]"))?;
        let target = state.resolve(path);
        let mut archive = state
            .manager()
            .download_folder_zip(state.user(), &target.as_dir())
            .await?;

        let local = match args.get(1) {
            Some(local) if PathBuf::from(local).is_dir() => PathBuf::from(local).join(&archive.name),
            Some(local) => PathBuf::from(local),
            None => PathBuf::from(&archive.name),
        };
        let mut file = tokio::fs::File::create(&local)
            .await
            .with_context(|| format!("Failed to create {}", local.display()))?;

        let spinner = create_spinner(&format!("Zipping {} files...", archive.entries));
        let mut written = 0u64;
        let result = async {
            while let Some(chunk) = archive.stream.try_next().await? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok::<(), anyhow::Error>(())
        }
        .await;
        spinner.finish_and_clear();

        if let Err(e) = result {
            // Don't leave a truncated archive behind
            drop(file);
            let _ = tokio::fs::remove_file(&local).await;
            return Err(e);
        }

        print_line!(
            "{} -> {} ({} files, {})",
            target,
            local.display(),
            archive.entries,
            format_size(written)
        );
        Ok(())
    }
}
