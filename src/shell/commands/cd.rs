use anyhow::{Result, anyhow};
use async_trait::async_trait;

use super::{Command, ShellState};
use crate::vfs::VirtualPath;

pub struct CdCommand;

#[async_trait]
impl Command for CdCommand {
    fn name(&self) -> &str {
        "cd"
    }

    fn usage(&self) -> &str {
        "cd [PATH] - Change current directory (no PATH goes to the root)"
    }

    async fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()> {
        let Some(path_str) = args.first() else {
            state.set_cwd(VirtualPath::root());
            return Ok(());
        };

        let target = state.resolve(path_str);
        if !target.is_root() {
            let info = state
                .manager()
                .info(state.user(), &target.as_file())
                .await?;
            if !info.is_dir() {
                return Err(anyhow!("Not a directory: {path_str}"));
            }
        }

        state.set_cwd(target);
        Ok(())
    }
}
