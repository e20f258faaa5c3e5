use anyhow::{Result, anyhow};
use async_trait::async_trait;

use super::output::{format_size, to_json};
use super::{Command, ShellState};
use crate::print_line;
use crate::vfs::ResourceKind;

pub struct StatCommand;

#[async_trait]
impl Command for StatCommand {
    fn name(&self) -> &str {
        "stat"
    }

    fn usage(&self) -> &str {
        "stat PATH - Show file or directory details"
    }

    async fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()> {
        let path = args.first().ok_or_else(|| anyhow!("Usage: stat PATH"))?;
        let target = state.resolve(path);
        let info = state
            .manager()
            .info(state.user(), &target.as_file())
            .await?;

        if state.json() {
            print_line!("{}", to_json(&info)?);
            return Ok(());
        }

        let kind = match info.kind {
            ResourceKind::File => "file",
            ResourceKind::Directory => "directory",
        };
        print_line!("  Path: {}", target);
        print_line!("  Type: {kind}");
        if let Some(size) = info.size {
            print_line!("  Size: {} ({size} bytes)", format_size(size));
        }
        Ok(())
    }
}
