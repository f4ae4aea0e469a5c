//! CLI command implementations.

pub mod check;
pub mod parse;
pub mod run;

use std::fs;

use crate::{Format, output};

/// Settings shared by every command.
pub struct Options {
    pub config: ratus::Config,
    pub format: Format,
    pub quiet: bool,
}

/// Read `file` and record its name in the pipeline config.
pub fn load(file: &str, options: &mut Options) -> Result<String, String> {
    let source = fs::read_to_string(file).map_err(|e| format!("cannot read file '{file}': {e}"))?;
    options.config.file_name = file.to_string();
    Ok(source)
}

/// Print `reports` in the selected format.
pub fn print_reports(source: &str, reports: &[ratus::Report], options: &Options) -> Result<(), String> {
    match options.format {
        Format::Text => {
            for report in reports {
                ratus_diagnostic::emit(source, &report.span.file, &report.diagnostic)
                    .map_err(|e| format!("cannot write diagnostics: {e}"))?;
            }
        }
        Format::Json => println!("{}", output::json(&reports)?),
    }
    Ok(())
}
