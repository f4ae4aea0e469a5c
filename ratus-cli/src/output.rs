//! Output formatting utilities.
//!
//! These functions provide colored terminal output for the CLI.

use serde::Serialize;

/// Print a success message in green.
pub fn success(msg: &str) {
    println!("\x1b[32m{msg}\x1b[0m");
}

/// Print an error message in red.
pub fn error(msg: &str) {
    eprintln!("\x1b[31merror:\x1b[0m {msg}");
}

/// Print an info message in blue.
pub fn info(msg: &str) {
    println!("\x1b[34minfo:\x1b[0m {msg}");
}

pub fn json(value: &impl Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("cannot serialize output: {e}"))
}
