//! The `ratus check` command.

use super::{Options, load, print_reports};
use crate::{Format, output};

/// Run type checking on a Ratus file.
pub fn run(file: &str, mut options: Options) -> Result<(), String> {
    let source = load(file, &mut options)?;
    let reports = ratus::check(&source, &options.config);
    print_reports(&source, &reports, &options)?;

    if !reports.is_empty() {
        return Err(format!("{} error(s) found", reports.len()));
    }
    if !options.quiet && options.format == Format::Text {
        output::success("OK - No errors found");
    }
    Ok(())
}
