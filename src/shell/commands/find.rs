use anyhow::{Result, anyhow};
use async_trait::async_trait;

use super::output::{display_name, to_json};
use super::{Command, ShellState};
use crate::print_line;

pub struct FindCommand;

#[async_trait]
impl Command for FindCommand {
    fn name(&self) -> &str {
        "find"
    }

    fn usage(&self) -> &str {
        "find QUERY - Search the whole drive by name (case-insensitive)"
    }

    async fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()> {
        let query = args.first().ok_or_else(|| anyhow!("Usage: find QUERY"))?;
        let matches = state.manager().search(state.user(), query).await?;

        if state.json() {
            print_line!("{}", to_json(&matches)?);
            return Ok(());
        }
        for found in &matches {
            print_line!("/{}", display_name(found, true));
        }
        Ok(())
    }
}
