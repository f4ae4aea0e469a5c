//! The `ratus run` command.

use super::{Options, load, print_reports};
use crate::{Format, output};
use ratus::Failure;

pub fn run(file: &str, mut options: Options) -> Result<(), String> {
    let source = load(file, &mut options)?;

    match ratus::run(&source, &options.config) {
        Ok(value) => {
            match options.format {
                Format::Text => println!("{value}"),
                Format::Json => println!("{}", output::json(&serde_json::json!({ "value": value }))?),
            }
            Ok(())
        }
        Err(failure) => {
            print_reports(&source, failure.reports(), &options)?;
            Err(match failure {
                Failure::Rejected(reports) => format!("{} error(s) found", reports.len()),
                Failure::Fault(_) => "evaluation failed".to_string(),
            })
        }
    }
}
