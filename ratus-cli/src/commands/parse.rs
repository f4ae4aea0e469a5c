//! The `ratus parse` command.

use super::{Options, load, print_reports};
use crate::{Format, output};

/// Parse a Ratus file and print its syntax tree, without checking or running it.
pub fn run(file: &str, mut options: Options) -> Result<(), String> {
    let source = load(file, &mut options)?;
    let (module, reports) = ratus::parse(&source, &options.config);

    if options.format == Format::Json {
        print_reports(&source, &reports, &options)?;
    }
    let Some(module) = module else {
        if options.format == Format::Text {
            print_reports(&source, &reports, &options)?;
        }
        return Err(format!("{} syntax error(s) found", reports.len()));
    };

    if let Some(tree) = tree_output(&module, &options) {
        output::info(&tree);
        output::success(&format!("OK - parsed {} statement(s)", module.stmts.len()));
    }
    Ok(())
}

/// The syntax tree as printed in text mode, or `None` when output is suppressed.
fn tree_output(module: &ratus::Module, options: &Options) -> Option<String> {
    (!options.quiet && options.format == Format::Text).then(|| format!("{module:#?}"))
}
