//! Output helpers shared by the shell commands.
//!
//! The macros return `Ok(())` from the calling command when stdout is a
//! closed pipe, so `s3drive ... | head` stops quietly.

use colored::*;
use serde::Serialize;

use crate::vfs::Resource;

/// Print with newline, returning early on BrokenPipe.
#[macro_export]
macro_rules! print_line {
    ($($arg:tt)*) => {{
        use std::io::Write;
        match writeln!(std::io::stdout(), $($arg)*) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }};
}

/// Print without newline, returning early on BrokenPipe.
#[macro_export]
macro_rules! print_str {
    ($($arg:tt)*) => {{
        use std::io::Write;
        match write!(std::io::stdout(), $($arg)*) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }};
}

pub use print_line;
pub use print_str;

/// Pretty JSON for `--json` output
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Display name of a resource, directories in blue with a trailing slash
pub fn display_name(resource: &Resource, full_path: bool) -> String {
    let name = if full_path {
        resource.relative_path()
    } else if resource.is_dir() {
        format!("{}/", resource.name)
    } else {
        resource.name.clone()
    };
    if resource.is_dir() {
        name.blue().bold().to_string()
    } else {
        name
    }
}

/// One line of a long listing: size column then name
pub fn long_line(resource: &Resource, full_path: bool) -> String {
    let size = match resource.size {
        Some(size) if !resource.is_dir() => format_size(size),
        _ => "-".to_string(),
    };
    format!("{size:>12}  {}", display_name(resource, full_path))
}
