use anyhow::Result;
use async_trait::async_trait;

use super::output::{display_name, long_line, to_json};
use super::{Command, ShellState};
use crate::print_line;

pub struct LsCommand;

#[async_trait]
impl Command for LsCommand {
    fn name(&self) -> &str {
        "ls"
    }

    fn usage(&self) -> &str {
        "ls [-R] [-l] [PATH] - List directory contents"
    }

    async fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()> {
        let mut recursive = false;
        let mut long_format = false;
        let mut path_arg: Option<&str> = None;

        for arg in args {
            match arg.as_str() {
                "-R" | "-r" => recursive = true,
                "-l" => long_format = true,
                "-lR" | "-Rl" => {
                    recursive = true;
                    long_format = true;
                }
                _ if path_arg.is_none() => path_arg = Some(arg.as_str()),
                _ => {}
            }
        }

        let dir = match path_arg {
            Some(path) => state.resolve(path),
            None => state.cwd().clone(),
        };

        let entries = if recursive {
            state
                .manager()
                .list(state.user(), &dir.as_dir(), true)
                .await?
        } else {
            state.list_dir(&dir).await?.to_vec()
        };

        if state.json() {
            print_line!("{}", to_json(&entries)?);
            return Ok(());
        }

        for entry in &entries {
            if long_format {
                print_line!("{}", long_line(entry, recursive));
            } else {
                print_line!("{}", display_name(entry, recursive));
            }
        }
        Ok(())
    }
}
