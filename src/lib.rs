//! Ratus: a small language with structural subtyping.
//!
//! The pipeline runs lexer, parser, type checker and evaluator in order.
//! Each stage reports its problems as [`Report`]s that carry a line/column
//! position as well as the underlying [`Diagnostic`] for rendering.
//!
//! ```no_run
//! let config = ratus::Config::default();
//! assert_eq!(ratus::run("1 + 2", &config).ok().as_deref(), Some("3"));
//! ```
//!
//! Embedders can expose native functions to programs with
//! [`Config::with_host_fn`]:
//!
//! ```no_run
//! use ratus::Value;
//!
//! let config = ratus::Config::new()
//!     .with_host_fn("choose", "fn(Bool, Int, Int) -> Int", |args| match args {
//!         [Value::Bool(c), Value::Int(a), Value::Int(b)] => Ok(Value::Int(if *c { *a } else { *b })),
//!         _ => Err("expected a condition and two Ints".to_string()),
//!     })
//!     .expect("signature parses");
//! assert_eq!(ratus::run("choose(1 > 2, 10, 5)", &config).ok().as_deref(), Some("5"));
//! ```

use std::rc::Rc;

use ratus_common::{LineIndex, Span};
use ratus_typeck::HostSignature;
use serde::Serialize;
use thiserror::Error;

pub use ratus_diagnostic::{Diagnostic, DiagnosticKind, Severity};
pub use ratus_eval::{EvalConfig, HostFn, HostFunction, Value};
pub use ratus_parser::ParseMode;
pub use ratus_syntax::Module;

/// Settings for one pipeline run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Name shown in reports; the core never opens it.
    pub file_name: String,
    pub parse_mode: ParseMode,
    pub eval: EvalConfig,
    /// Functions programs may call in addition to the builtins.
    pub host: Vec<Rc<HostFn>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            file_name: "<input>".to_string(),
            parse_mode: ParseMode::Recover,
            eval: EvalConfig::default(),
            host: Vec::new(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    pub fn with_parse_mode(mut self, mode: ParseMode) -> Self {
        self.parse_mode = mode;
        self
    }

    pub fn with_max_steps(mut self, steps: Option<u64>) -> Self {
        self.eval.max_steps = steps;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.eval.max_call_depth = depth;
        self
    }

    pub fn with_gc_threshold(mut self, frames: usize) -> Self {
        self.eval.gc_threshold = frames;
        self
    }

    pub fn with_max_collection_len(mut self, len: usize) -> Self {
        self.eval.max_collection_len = len;
        self
    }

    /// Register a host function under `name` with a signature written as a
    /// Ratus function type, e.g. `fn(Int, Int) -> Int`. A signature that does
    /// not lex or parse is rejected with reports against its own text.
    pub fn with_host_fn<F>(mut self, name: impl Into<String>, signature: &str, function: F) -> Result<Self, Failure>
    where
        F: Fn(&[Value<'_>]) -> Result<Value<'static>, String> + 'static,
    {
        let name = name.into();
        let lines = LineIndex::new(signature);
        let file = format!("<signature of {name}>");
        let tokens = ratus_lexer::tokenize(signature)
            .map_err(|errors| Failure::Rejected(reports(&errors, &lines, &file)))?;
        let ty =
            ratus_parser::parse_type(tokens).map_err(|errors| Failure::Rejected(reports(&errors, &lines, &file)))?;
        tracing::debug!(%name, "registered host function");
        self.host.push(Rc::new(HostFn::new(name, ty, function)));
        Ok(self)
    }

    fn host_signatures(&self) -> Vec<&HostSignature> {
        self.host.iter().map(|h| h.signature()).collect()
    }
}

/// Where a report points: file name plus 1-based line and column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSpan {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

/// A diagnostic resolved against its source text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub span: SourceSpan,
    pub message: String,
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub code: Option<&'static str>,
    #[serde(skip)]
    pub diagnostic: Diagnostic,
}

impl Report {
    fn new(diagnostic: Diagnostic, lines: &LineIndex<'_>, file: &str) -> Self {
        let location = lines.location(diagnostic.span.start);
        Self {
            span: SourceSpan {
                file: file.to_string(),
                line: location.line,
                column: location.column,
            },
            message: diagnostic.message.clone(),
            severity: diagnostic.severity,
            kind: diagnostic.kind,
            code: diagnostic.code.map(|c| c.as_str()),
            diagnostic,
        }
    }

    /// Byte range of the report in the source text.
    pub fn byte_span(&self) -> Span {
        self.diagnostic.span
    }

    /// Render with source excerpts, without colors.
    pub fn render(&self, source: &str) -> String {
        ratus_diagnostic::render(source, &self.span.file, &self.diagnostic)
    }
}

/// Why [`run`] produced no value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Failure {
    #[error("program rejected with {} error(s)", .0.len())]
    Rejected(Vec<Report>),
    #[error("runtime fault: {}", .0.message)]
    Fault(Report),
}

impl Failure {
    pub fn reports(&self) -> &[Report] {
        match self {
            Failure::Rejected(reports) => reports,
            Failure::Fault(report) => std::slice::from_ref(report),
        }
    }
}

fn reports<'a, E: 'a>(errors: impl IntoIterator<Item = &'a E>, lines: &LineIndex<'_>, file: &str) -> Vec<Report>
where
    Diagnostic: From<&'a E>,
{
    errors
        .into_iter()
        .map(|e| Report::new(Diagnostic::from(e), lines, file))
        .collect()
}

fn parse_with(source: &str, lines: &LineIndex<'_>, config: &Config) -> Result<Module, Vec<Report>> {
    let tokens = ratus_lexer::tokenize(source).map_err(|errors| reports(&errors, lines, &config.file_name))?;
    tracing::debug!(tokens = tokens.len(), "lexed");
    let module = ratus_parser::parse(tokens, config.parse_mode)
        .map_err(|errors| reports(&errors, lines, &config.file_name))?;
    tracing::debug!(statements = module.stmts.len(), "parsed");
    Ok(module)
}

/// Lex and parse `source`. The module is present only when no errors were found.
#[tracing::instrument(level = "debug", skip_all, fields(file = %config.file_name))]
pub fn parse(source: &str, config: &Config) -> (Option<Module>, Vec<Report>) {
    let lines = LineIndex::new(source);
    match parse_with(source, &lines, config) {
        Ok(module) => (Some(module), Vec::new()),
        Err(reports) => (None, reports),
    }
}

/// Parse and type check `source`; an empty result means it is well typed.
#[tracing::instrument(level = "debug", skip_all, fields(file = %config.file_name))]
pub fn check(source: &str, config: &Config) -> Vec<Report> {
    let lines = LineIndex::new(source);
    let module = match parse_with(source, &lines, config) {
        Ok(module) => module,
        Err(reports) => return reports,
    };
    match ratus_typeck::check_with_host(&module, &config.host_signatures()) {
        Ok(_) => Vec::new(),
        Err(errors) => reports(&errors, &lines, &config.file_name),
    }
}

/// Run `source` and render its result value.
#[tracing::instrument(level = "debug", skip_all, fields(file = %config.file_name))]
pub fn run(source: &str, config: &Config) -> Result<String, Failure> {
    let lines = LineIndex::new(source);
    let module = parse_with(source, &lines, config).map_err(Failure::Rejected)?;
    let checked = ratus_typeck::check_with_host(&module, &config.host_signatures())
        .map_err(|errors| Failure::Rejected(reports(&errors, &lines, &config.file_name)))?;
    match ratus_eval::evaluate_with_host(&checked, &config.eval, &config.host) {
        Ok(value) => Ok(value.to_string()),
        Err(fault) => Err(Failure::Fault(Report::new(
            Diagnostic::from(&fault),
            &lines,
            &config.file_name,
        ))),
    }
}
