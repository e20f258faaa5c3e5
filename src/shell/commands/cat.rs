use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::TryStreamExt;

use super::{Command, ShellState};
use crate::print_str;

/// Bytes shown as hex when a file is not UTF-8
const HEX_PREVIEW: usize = 1024;

pub struct CatCommand;

#[async_trait]
impl Command for CatCommand {
    fn name(&self) -> &str {
        "cat"
    }

    fn usage(&self) -> &str {
        "cat FILE - Display file contents"
    }

    async fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()> {
        let path = args.first().ok_or_else(|| anyhow!("Usage: cat FILE"))?;
        let target = state.resolve(path);
        let mut download = state
            .manager()
            .download(state.user(), &target.as_file())
            .await?;

        let mut pending = Vec::new();
        while let Some(chunk) = download.stream.try_next().await? {
            pending.extend_from_slice(&chunk);
            // Print every complete UTF-8 prefix as it arrives
            let valid = match std::str::from_utf8(&pending) {
                Ok(text) => text.len(),
                Err(e) if e.error_len().is_none() => e.valid_up_to(),
                Err(_) => {
                    eprintln!("Warning: File contains binary data");
                    print_hex(&pending);
                    return Ok(());
                }
            };
            print_str!("{}", String::from_utf8_lossy(&pending[..valid]));
            pending.drain(..valid);
        }

        if !pending.is_empty() {
            print_str!("{}", String::from_utf8_lossy(&pending));
        }
        Ok(())
    }
}

fn print_hex(bytes: &[u8]) {
    let display_len = bytes.len().min(HEX_PREVIEW);
    for (i, byte) in bytes[..display_len].iter().enumerate() {
        if i % 16 == 0 {
            print!("\n{i:08x}: ");
        }
        print!("{byte:02x} ");
    }
    println!();
}
