use core::cell::UnsafeCell;
use derive_more::Deref;
use rustc_hash::FxBuildHasher;
use std::collections::HashMap as _HashMap;

/// A minimal `UnsafeCell` wrapper that is `Sync` when `T: Send`.
///
/// Backs the bytes of every buffer allocation. Concurrent access to the same
/// cell never happens: thunks that touch overlapping slices are ordered by a
/// dependency edge, so at most one writer (or any number of readers) is live
/// for a given byte at a time.
#[derive(Debug, Default, Deref)]
#[repr(transparent)]
pub(crate) struct SyncUnsafeCell<T>(UnsafeCell<T>);

// SAFETY: access is serialized by the dependency graph, see the type docs.
unsafe impl<T: Send> Sync for SyncUnsafeCell<T> {}

impl<T> SyncUnsafeCell<T> {
    pub(crate) const fn new(val: T) -> Self {
        Self(UnsafeCell::new(val))
    }

    pub(crate) fn into_inner(self) -> T {
        self.0.into_inner()
    }
}

/// Identifier of a node in the dependency graph.
///
/// Equals the position of the node's thunk in the original sequence, so ids
/// are dense, stable and already in a topological order.
pub type NodeId = usize;

/// Scheduling priority of a node: length of the longest path to a sink.
pub type Priority = usize;

pub(crate) type HashMap<K, V> = _HashMap<K, V, FxBuildHasher>;
