//! Change notifications published by the store.

use grouplcm_core::{ObjectKey, Resource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

/// A write that landed in the store. `object` is the state after the write
/// (or the last state, for deletions).
#[derive(Debug, Clone)]
pub struct ResourceEvent {
    pub kind: EventKind,
    pub object: Resource,
}

impl ResourceEvent {
    pub fn key(&self) -> ObjectKey {
        self.object.key()
    }
}
