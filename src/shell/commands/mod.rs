use anyhow::Result;
use async_trait::async_trait;

pub mod cat;
pub mod cd;
pub mod find;
pub mod get;
pub mod ls;
pub mod mkdir;
pub mod mv;
pub mod output;
pub mod put;
pub mod rm;
pub mod stat;
pub mod zip;

use super::ShellState;

/// Trait for shell commands
#[async_trait]
pub trait Command: Send + Sync {
    /// Get the command name
    fn name(&self) -> &str;

    /// One-line usage shown by `help`
    fn usage(&self) -> &str;

    /// Execute the command
    async fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()>;
}
