use anyhow::{Result, anyhow};
use async_trait::async_trait;

use super::{Command, ShellState};
use crate::print_line;

pub struct RmCommand;

#[async_trait]
impl Command for RmCommand {
    fn name(&self) -> &str {
        "rm"
    }

    fn usage(&self) -> &str {
        "rm PATH... - Delete files, or directories with everything in them"
    }

    async fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()> {
        if args.is_empty() {
            return Err(anyhow!("Usage: rm PATH..."));
        }

        for arg in args {
            let target = state.resolve(arg);
            if target.is_root() {
                return Err(anyhow!("Refusing to remove the root directory"));
            }
            let path = if arg.ends_with('/') {
                target.as_dir()
            } else {
                target.as_file()
            };
            let removed = state.manager().delete(state.user(), &path).await?;
            state.invalidate(&target);

            // The working directory may be gone now
            if state.cwd().segments().starts_with(target.segments()) {
                let parent = target.parent().unwrap_or_default();
                state.set_cwd(parent);
            }
            if !state.json() && removed > 1 {
                print_line!("removed {target} ({removed} objects)");
            }
        }
        Ok(())
    }
}
