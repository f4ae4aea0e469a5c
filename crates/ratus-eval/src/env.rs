//! Evaluation environment.
//!
//! Frames live in a [`Heap`] and are addressed by [`FrameId`]s that carry a
//! generation, so an id that outlived its frame is detected instead of
//! reading whatever reused the slot. A frame no closure captured is freed
//! when its block or call exits; captured frames are reclaimed by
//! [`Heap::collect`].

use thiserror::Error;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("frame {}:{} was already reclaimed", .0.index, .0.generation)]
pub struct StaleFrame(pub FrameId);

#[derive(Debug)]
struct Frame<'m> {
    parent: Option<FrameId>,
    bindings: Vec<(&'m str, Value<'m>)>,
    /// Some closure holds this frame; only a collection may free it.
    captured: bool,
}

#[derive(Debug)]
struct Slot<'m> {
    generation: u32,
    frame: Option<Frame<'m>>,
}

#[derive(Debug, Default)]
pub struct Heap<'m> {
    slots: Vec<Slot<'m>>,
    free: Vec<u32>,
    live: usize,
    allocated_since_collect: usize,
}

impl<'m> Heap<'m> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, parent: Option<FrameId>) -> FrameId {
        let frame = Frame {
            parent,
            bindings: Vec::new(),
            captured: false,
        };
        self.live += 1;
        self.allocated_since_collect += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.frame = Some(frame);
                FrameId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    frame: Some(frame),
                });
                FrameId { index, generation: 0 }
            }
        }
    }

    /// Called when the block or call owning `id` exits.
    pub fn release(&mut self, id: FrameId) {
        if self.frame(id).is_ok_and(|f| !f.captured) {
            self.free_slot(id.index);
        }
    }

    /// Keep `id` and its ancestors alive past their scope.
    pub fn capture(&mut self, id: FrameId) {
        let mut current = Some(id);
        while let Some(id) = current {
            match self.frame_mut(id) {
                Ok(frame) if !frame.captured => {
                    frame.captured = true;
                    current = frame.parent;
                }
                _ => break,
            }
        }
    }

    pub fn is_live(&self, id: FrameId) -> bool {
        self.frame(id).is_ok()
    }

    pub fn live_frames(&self) -> usize {
        self.live
    }

    pub fn allocated_since_collect(&self) -> usize {
        self.allocated_since_collect
    }

    pub fn define(&mut self, id: FrameId, name: &'m str, value: Value<'m>) -> Result<(), StaleFrame> {
        let frame = self.frame_mut(id)?;
        match frame.bindings.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => frame.bindings.push((name, value)),
        }
        Ok(())
    }

    /// Look `name` up from `id` outward.
    pub fn lookup(&self, id: FrameId, name: &str) -> Result<Option<&Value<'m>>, StaleFrame> {
        let Some(owner) = self.owner_of(id, name)? else {
            return Ok(None);
        };
        let frame = self.frame(owner)?;
        Ok(frame.bindings.iter().find(|(n, _)| *n == name).map(|(_, v)| v))
    }

    pub fn lookup_mut(&mut self, id: FrameId, name: &str) -> Result<Option<&mut Value<'m>>, StaleFrame> {
        let Some(owner) = self.owner_of(id, name)? else {
            return Ok(None);
        };
        let frame = self.frame_mut(owner)?;
        Ok(frame.bindings.iter_mut().find(|(n, _)| *n == name).map(|(_, v)| v))
    }

    fn owner_of(&self, id: FrameId, name: &str) -> Result<Option<FrameId>, StaleFrame> {
        let mut current = Some(id);
        while let Some(id) = current {
            let frame = self.frame(id)?;
            if frame.bindings.iter().any(|(n, _)| *n == name) {
                return Ok(Some(id));
            }
            current = frame.parent;
        }
        Ok(None)
    }

    /// Free every frame not reachable from `roots` or from the closures inside
    /// `values`, following parent links and closures stored in reachable
    /// bindings. Returns the number freed.
    pub fn collect(&mut self, roots: &[FrameId], values: &[Value<'m>]) -> usize {
        let mut marked = vec![false; self.slots.len()];
        let mut pending: Vec<FrameId> = roots.to_vec();
        let mut values: Vec<&Value<'m>> = values.iter().collect();

        loop {
            while let Some(value) = values.pop() {
                match value {
                    Value::Function(closure) => pending.push(closure.frame),
                    Value::List(items) => values.extend(items.iter()),
                    Value::Record(fields) => values.extend(fields.iter().map(|(_, v)| v)),
                    _ => {}
                }
            }
            let Some(id) = pending.pop() else {
                break;
            };
            let Ok(frame) = self.frame(id) else {
                continue;
            };
            if std::mem::replace(&mut marked[id.index as usize], true) {
                continue;
            }
            pending.extend(frame.parent);
            values.extend(frame.bindings.iter().map(|(_, v)| v));
        }

        let mut freed = 0;
        for index in 0..self.slots.len() {
            if !marked[index] && self.slots[index].frame.is_some() {
                self.free_slot(index as u32);
                freed += 1;
            }
        }
        self.allocated_since_collect = 0;
        freed
    }

    fn free_slot(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        if slot.frame.take().is_some() {
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index);
            self.live -= 1;
        }
    }

    fn frame(&self, id: FrameId) -> Result<&Frame<'m>, StaleFrame> {
        match self.slots.get(id.index as usize) {
            Some(Slot {
                generation,
                frame: Some(frame),
            }) if *generation == id.generation => Ok(frame),
            _ => Err(StaleFrame(id)),
        }
    }

    fn frame_mut(&mut self, id: FrameId) -> Result<&mut Frame<'m>, StaleFrame> {
        match self.slots.get_mut(id.index as usize) {
            Some(Slot {
                generation,
                frame: Some(frame),
            }) if *generation == id.generation => Ok(frame),
            _ => Err(StaleFrame(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_parents() {
        let mut heap = Heap::new();
        let outer = heap.alloc(None);
        heap.define(outer, "x", Value::Int(1)).expect("live");
        let inner = heap.alloc(Some(outer));
        assert!(matches!(heap.lookup(inner, "x"), Ok(Some(Value::Int(1)))));
        assert!(matches!(heap.lookup(inner, "y"), Ok(None)));
    }

    #[test]
    fn released_frame_is_stale_and_slot_reused() {
        let mut heap = Heap::new();
        let first = heap.alloc(None);
        heap.release(first);
        assert!(!heap.is_live(first));
        assert_eq!(heap.lookup(first, "x").err(), Some(StaleFrame(first)));

        let second = heap.alloc(None);
        assert_ne!(first, second);
        assert!(heap.is_live(second));
        assert_eq!(heap.live_frames(), 1);
    }

    #[test]
    fn captured_frames_survive_release_until_unreachable() {
        let mut heap = Heap::new();
        let root = heap.alloc(None);
        let kept = heap.alloc(Some(root));
        let dropped = heap.alloc(Some(root));
        heap.capture(kept);
        heap.capture(dropped);
        heap.release(kept);
        heap.release(dropped);
        assert!(heap.is_live(kept) && heap.is_live(dropped));

        // Only `root` is a root; nothing refers to either child.
        assert_eq!(heap.collect(&[root], &[]), 2);
        assert!(heap.is_live(root));
        assert!(!heap.is_live(kept));
    }

    #[test]
    fn values_outside_frames_keep_their_closures_alive() {
        use std::rc::Rc;

        let module = ratus_parser::parse_source("fn(x: Int) { return x; }").expect("parses");
        let Some(ratus_syntax::ExprKind::Lambda(decl)) = module.entry.as_ref().map(|e| &e.kind) else {
            panic!("expected a lambda entry");
        };
        let mut heap = Heap::new();
        let root = heap.alloc(None);
        let captured = heap.alloc(Some(root));
        heap.capture(captured);
        heap.release(captured);
        let closure = Value::Function(Rc::new(crate::value::Closure { decl: decl.as_ref(), frame: captured }));
        let held = Value::list(vec![closure]);

        assert_eq!(heap.collect(&[root], std::slice::from_ref(&held)), 0);
        assert!(heap.is_live(captured));
        assert_eq!(heap.collect(&[root], &[]), 1);
        assert!(!heap.is_live(captured));
    }
}
