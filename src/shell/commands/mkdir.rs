use anyhow::{Result, anyhow};
use async_trait::async_trait;

use super::output::to_json;
use super::{Command, ShellState};
use crate::print_line;

pub struct MkdirCommand;

#[async_trait]
impl Command for MkdirCommand {
    fn name(&self) -> &str {
        "mkdir"
    }

    fn usage(&self) -> &str {
        "mkdir PATH... - Create directories (and missing parents)"
    }

    async fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()> {
        if args.is_empty() {
            return Err(anyhow!("Usage: mkdir PATH..."));
        }

        // Missing parents may be created too
        state.invalidate_all();
        for arg in args {
            let target = state.resolve(arg);
            let created = state
                .manager()
                .create_directory(state.user(), &target.as_dir())
                .await?;
            if state.json() {
                print_line!("{}", to_json(&created)?);
            }
        }
        Ok(())
    }
}
