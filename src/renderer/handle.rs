use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identity of one GPU-side object. Ids are process-unique and
/// never reused, so equality is a single integer compare.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderId(NonZeroU64);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl RenderId {
    pub(crate) fn allocate() -> Self {
        let raw = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        RenderId(NonZeroU64::new(raw).expect("render id counter wrapped"))
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Debug for RenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RenderId({})", self.0)
    }
}

/// Tracks which handles are currently backed by a live GPU object.
///
/// Replaces finalizer-style "not disposed" warnings: drivers register
/// on create, release on destroy, and `report_leaks` is checked once
/// at shutdown. Liveness asserts in the submission path are
/// debug-build only.
pub(crate) struct HandleRegistry {
    live: HashMap<RenderId, &'static str>,
}

impl HandleRegistry {
    pub(crate) fn new() -> Self {
        Self {
            live: HashMap::new(),
        }
    }

    pub(crate) fn register(&mut self, id: RenderId, kind: &'static str) {
        let previous = self.live.insert(id, kind);
        debug_assert!(previous.is_none(), "handle {id:?} registered twice");
    }

    pub(crate) fn release(&mut self, id: RenderId) {
        if self.live.remove(&id).is_none() {
            log::warn!("released unknown or already-destroyed handle {id:?}");
        }
    }

    #[cfg(debug_assertions)]
    pub(crate) fn assert_live(&self, id: RenderId, context: &str) {
        debug_assert!(
            self.live.contains_key(&id),
            "{context}: handle {id:?} is not live"
        );
    }

    #[cfg(not(debug_assertions))]
    pub(crate) fn assert_live(&self, _id: RenderId, _context: &str) {}

    /// Logs every still-live handle and returns how many there were.
    pub(crate) fn report_leaks(&self) -> usize {
        for (id, kind) in &self.live {
            log::warn!("leaked {kind} handle {id:?} at shutdown");
        }
        self.live.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocated_ids_are_unique() {
        let a = RenderId::allocate();
        let b = RenderId::allocate();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }

    #[test]
    fn registry_counts_unreleased_handles() {
        let mut registry = HandleRegistry::new();
        let a = RenderId::allocate();
        let b = RenderId::allocate();
        registry.register(a, "texture");
        registry.register(b, "shader");
        registry.release(a);
        assert_eq!(registry.report_leaks(), 1);
    }
}
