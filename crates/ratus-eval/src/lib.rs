//! Evaluator for Ratus.
//!
//! This crate implements a tree-walking interpreter over a checked module.
//! Frames live in a [`Heap`] arena; closures refer to the frame they were
//! created in by id.

mod builtin;
mod env;
mod eval;
mod host;
mod value;

use std::rc::Rc;

pub use env::{FrameId, Heap, StaleFrame};
pub use eval::{Evaluator, FaultKind, RuntimeFault};
pub use host::{HostFn, HostFunction};
pub use value::{Closure, Fields, Value, format_float};

use ratus_typeck::Checked;

/// Limits for one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalConfig {
    /// Statements and expressions evaluated before giving up; unbounded if `None`.
    pub max_steps: Option<u64>,
    pub max_call_depth: usize,
    /// Frames allocated before the next collection runs. Collections happen
    /// between top-level statements, on loop iterations and on calls.
    pub gc_threshold: usize,
    /// Longest list or string a program may build. Strings count bytes.
    pub max_collection_len: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_steps: None,
            max_call_depth: 200,
            gc_threshold: 1024,
            max_collection_len: 1 << 22,
        }
    }
}

/// Evaluate a checked module.
pub fn evaluate<'m>(checked: &Checked<'m>, config: &EvalConfig) -> Result<Value<'m>, RuntimeFault> {
    evaluate_with_host(checked, config, &[])
}

/// Evaluate a module checked against the signatures of `host`.
#[tracing::instrument(level = "debug", skip_all, fields(host = host.len()))]
pub fn evaluate_with_host<'m>(
    checked: &Checked<'m>,
    config: &EvalConfig,
    host: &[Rc<HostFn>],
) -> Result<Value<'m>, RuntimeFault> {
    let mut evaluator = Evaluator::with_host(config.clone(), host.to_vec());
    let result = evaluator.eval_module(checked.module);
    match &result {
        Ok(_) => tracing::debug!("evaluation finished"),
        Err(fault) => tracing::debug!(kind = fault.kind.name(), "evaluation faulted"),
    }
    result
}
