//! Functions supplied by the embedding application.

use std::fmt;

use ratus_syntax::TypeExpr;
use ratus_typeck::HostSignature;

use crate::value::Value;

/// Native code a program can call.
///
/// The checker trusts the declared signature, so an implementation should
/// only return values of the declared result shape. An `Err` aborts the run
/// with a fault carrying the message.
pub trait HostFunction {
    fn call<'m>(&self, args: &[Value<'m>]) -> Result<Value<'m>, String>;
}

/// Closures that build their result from scratch.
impl<F> HostFunction for F
where
    F: Fn(&[Value<'_>]) -> Result<Value<'static>, String>,
{
    fn call<'m>(&self, args: &[Value<'m>]) -> Result<Value<'m>, String> {
        self(args)
    }
}

/// A named host function with its signature.
pub struct HostFn {
    signature: HostSignature,
    function: Box<dyn HostFunction>,
}

impl HostFn {
    pub fn new(name: impl Into<String>, ty: TypeExpr, function: impl HostFunction + 'static) -> Self {
        Self {
            signature: HostSignature {
                name: name.into(),
                ty,
            },
            function: Box::new(function),
        }
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn signature(&self) -> &HostSignature {
        &self.signature
    }

    pub fn call<'m>(&self, args: &[Value<'m>]) -> Result<Value<'m>, String> {
        self.function.call(args)
    }
}

impl fmt::Debug for HostFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFn")
            .field("name", &self.signature.name)
            .finish_non_exhaustive()
    }
}
