//! Lexical scopes for the checker.
//!
//! Scopes form a chain from the innermost block out to the module. A scope is
//! shared (`Rc`) because functions checked later, at their call sites, keep
//! their defining scope alive.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use ratus_common::Span;

use crate::shape::ShapeId;

/// Index into the checker's function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FnId(pub u32);

#[derive(Debug, Clone)]
pub struct Binding {
    /// Shape at this point of the program; narrower than `declared` inside a
    /// `!= none` guard.
    pub shape: ShapeId,
    /// Shape assignments must conform to.
    pub declared: ShapeId,
    pub mutable: bool,
    /// Declaration order within the owning scope.
    pub slot: u32,
    pub span: Span,
    /// Set for `fn` declarations, whose shape may still be inferred lazily.
    pub function: Option<FnId>,
}

#[derive(Debug, Default)]
pub struct Scope {
    bindings: RefCell<HashMap<String, Binding>>,
    types: RefCell<HashMap<String, (ShapeId, Span)>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    pub fn root() -> Rc<Scope> {
        Rc::new(Scope::default())
    }

    pub fn child(parent: &Rc<Scope>) -> Rc<Scope> {
        Rc::new(Scope {
            parent: Some(Rc::clone(parent)),
            ..Scope::default()
        })
    }

    /// Add a binding; on a clash the existing binding is returned and nothing changes.
    pub fn define(&self, name: &str, mut binding: Binding) -> Result<(), Binding> {
        let mut bindings = self.bindings.borrow_mut();
        if let Some(existing) = bindings.get(name) {
            return Err(existing.clone());
        }
        binding.slot = bindings.len() as u32;
        bindings.insert(name.to_string(), binding);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Binding> {
        if let Some(binding) = self.bindings.borrow().get(name) {
            return Some(binding.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    pub fn define_type(&self, name: &str, shape: ShapeId, span: Span) -> Result<(), Span> {
        let mut types = self.types.borrow_mut();
        if let Some(&(_, existing)) = types.get(name) {
            return Err(existing);
        }
        types.insert(name.to_string(), (shape, span));
        Ok(())
    }

    pub fn lookup_type(&self, name: &str) -> Option<ShapeId> {
        if let Some(&(shape, _)) = self.types.borrow().get(name) {
            return Some(shape);
        }
        self.parent.as_ref().and_then(|p| p.lookup_type(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(shape: ShapeId) -> Binding {
        Binding {
            shape,
            declared: shape,
            mutable: false,
            slot: 0,
            span: Span::DUMMY,
            function: None,
        }
    }

    #[test]
    fn lookup_walks_outward_and_inner_shadows() {
        let root = Scope::root();
        root.define("x", binding(ShapeId::INT)).expect("fresh name");
        let inner = Scope::child(&root);
        assert_eq!(inner.lookup("x").map(|b| b.shape), Some(ShapeId::INT));

        inner.define("x", binding(ShapeId::STR)).expect("shadowing is allowed");
        assert_eq!(inner.lookup("x").map(|b| b.shape), Some(ShapeId::STR));
        assert_eq!(root.lookup("x").map(|b| b.shape), Some(ShapeId::INT));
    }

    #[test]
    fn duplicate_in_same_scope_is_rejected() {
        let root = Scope::root();
        root.define("x", binding(ShapeId::INT)).expect("fresh name");
        let clash = root.define("x", binding(ShapeId::STR));
        assert_eq!(clash.map_err(|b| b.shape), Err(ShapeId::INT));
    }

    #[test]
    fn slots_follow_declaration_order() {
        let root = Scope::root();
        root.define("a", binding(ShapeId::INT)).expect("fresh");
        root.define("b", binding(ShapeId::INT)).expect("fresh");
        assert_eq!(root.lookup("b").map(|b| b.slot), Some(1));
    }
}
