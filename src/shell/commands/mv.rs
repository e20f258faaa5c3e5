use anyhow::{Result, anyhow};
use async_trait::async_trait;

use super::output::to_json;
use super::{Command, ShellState};
use crate::print_line;

pub struct MvCommand;

#[async_trait]
impl Command for MvCommand {
    fn name(&self) -> &str {
        "mv"
    }

    fn usage(&self) -> &str {
        "mv FROM TO - Move or rename a file or directory"
    }

    async fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()> {
        let [from, to] = args else {
            return Err(anyhow!("Usage: mv FROM TO"));
        };
        let src = state.resolve(from);
        let mut dst = state.resolve(to);

        let info = state.manager().info(state.user(), &src.as_file()).await?;
        // Moving a file onto a directory puts it inside, like the Unix tool
        if !info.is_dir() {
            let into_dir = to.ends_with('/')
                || matches!(
                    state.manager().info(state.user(), &dst.as_file()).await,
                    Ok(target) if target.is_dir()
                );
            if into_dir {
                dst = dst.join(&info.name);
            }
        }

        let (from_path, to_path) = if info.is_dir() {
            (src.as_dir(), dst.as_dir())
        } else {
            (src.as_file(), dst.as_file())
        };
        let moved = state
            .manager()
            .move_resource(state.user(), &from_path, &to_path)
            .await?;
        state.invalidate_all();

        if state.json() {
            print_line!("{}", to_json(&moved)?);
        } else {
            print_line!("{src} -> /{}", moved.relative_path());
        }
        Ok(())
    }
}
