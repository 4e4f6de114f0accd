use crate::{
    buffer::{AccessKind, AllocationIndex, BufferAllocationSlice, BufferUse, Resource, ResourceUse},
    thunk::Thunk,
    types::{HashMap, NodeId},
};
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error;
use unzip3::Unzip3;

/// Error kind for graph construction failures.
///
/// Raised when a thunk reports buffer metadata that cannot describe real
/// memory.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GraphBuildError {
    /// A declared slice ends past `usize::MAX`.
    #[error("thunk #{node} (`{name}`) declares slice {slice} whose end overflows")]
    SliceOverflow {
        /// Node of the offending thunk.
        node: NodeId,
        /// Name of the offending thunk.
        name: String,
        /// The offending slice.
        slice: BufferAllocationSlice,
    },
}

/// Declared uses of every thunk, indexed by node id.
pub(super) struct NodeUses {
    buffers: Vec<Vec<BufferUse>>,
    resources: Vec<Vec<ResourceUse>>,
}

impl NodeUses {
    /// Query every thunk for its uses and validate them.
    pub(super) fn collect(thunks: &[Box<dyn Thunk>]) -> Result<Self, GraphBuildError> {
        let (buffers, resources, names): (Vec<_>, Vec<_>, Vec<_>) = thunks
            .iter()
            .map(|thunk| (thunk.buffer_uses(), thunk.resource_uses(), thunk.name()))
            .unzip3();
        for (node, (uses, name)) in buffers.iter().zip(names).enumerate() {
            let overflowing = uses
                .iter()
                .find(|buffer_use| buffer_use.slice().end().is_none());
            if let Some(buffer_use) = overflowing {
                return Err(GraphBuildError::SliceOverflow {
                    node,
                    name: name.to_owned(),
                    slice: buffer_use.slice(),
                });
            }
        }
        Ok(Self { buffers, resources })
    }

    pub(super) fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Number of bytes touched by all nodes, counting overlapping slices
    /// once.
    pub(super) fn footprint_bytes(&self) -> usize {
        let mut ranges: Vec<_> = self
            .buffers
            .iter()
            .flatten()
            .map(BufferUse::slice)
            .filter(|slice| slice.size() != 0)
            .map(|slice| (slice.index(), slice.offset(), slice.offset() + slice.size()))
            .collect();
        ranges.sort_unstable();

        // Ranges are sorted, so bytes below `covered_end` are already counted.
        let mut total = 0usize;
        let mut covered: Option<(AllocationIndex, usize)> = None;
        for (index, start, end) in ranges {
            let from = match covered {
                Some((covered_index, covered_end)) if covered_index == index => {
                    start.max(covered_end)
                }
                _ => start,
            };
            if end > from {
                total = total.saturating_add(end - from);
                covered = Some((index, end));
            }
        }
        total
    }

    /// Candidate dependency edges: for every node, ascending, the earlier
    /// nodes it must follow directly or through one another.
    ///
    /// Every returned pair conflicts, and every conflicting pair is connected
    /// by a path of returned pairs. An access stops producing candidates once
    /// a later node writes a range covering it, so a chain of thunks on one
    /// slice yields a single candidate per node.
    pub(super) fn candidate_predecessors(&self) -> Vec<Vec<NodeId>> {
        let mut frontier = AccessFrontier::default();
        (0..self.len())
            .map(|node| {
                let mut candidates = Vec::new();
                frontier.conflicting(&self.buffers[node], &self.resources[node], &mut candidates);
                candidates.sort_unstable();
                candidates.dedup();
                frontier.record(node, &self.buffers[node], &self.resources[node]);
                candidates
            })
            .collect()
    }
}

/// Accesses of already visited nodes that a later node may still need a
/// direct edge from.
///
/// An access is dropped once a later node writes a range covering it: any
/// future access conflicting with it also conflicts with that write, which
/// is already ordered after it.
#[derive(Default)]
struct AccessFrontier {
    buffers: HashMap<AllocationIndex, AllocationFrontier>,
    resources: HashMap<*const Resource, Vec<(NodeId, AccessKind)>>,
}

impl AccessFrontier {
    fn conflicting(
        &self,
        buffers: &[BufferUse],
        resources: &[ResourceUse],
        out: &mut Vec<NodeId>,
    ) {
        for buffer_use in buffers {
            let slice = buffer_use.slice();
            if let Some(allocation) = self.buffers.get(&slice.index()) {
                allocation.conflicting(slice, buffer_use.access(), out);
            }
        }
        for resource_use in resources {
            if let Some(accesses) = self.resources.get(&Arc::as_ptr(resource_use.resource())) {
                out.extend(
                    accesses
                        .iter()
                        .filter(|(_, access)| resource_use.access().conflicts_with(*access))
                        .map(|&(node, _)| node),
                );
            }
        }
    }

    fn record(&mut self, node: NodeId, buffers: &[BufferUse], resources: &[ResourceUse]) {
        let buffers = buffers.iter().filter(|buffer_use| buffer_use.slice().size() != 0);
        for buffer_use in buffers.clone() {
            if buffer_use.access() == AccessKind::Write {
                if let Some(allocation) = self.buffers.get_mut(&buffer_use.slice().index()) {
                    allocation.remove_covered(buffer_use.slice());
                }
            }
        }
        for buffer_use in buffers {
            self.buffers
                .entry(buffer_use.slice().index())
                .or_default()
                .insert(node, buffer_use.slice(), buffer_use.access());
        }

        for resource_use in resources {
            let accesses = self
                .resources
                .entry(Arc::as_ptr(resource_use.resource()))
                .or_default();
            if resource_use.access() == AccessKind::Write {
                accesses.retain(|&(other, _)| other == node);
            }
            accesses.push((node, resource_use.access()));
        }
    }
}

/// Frontier of one allocation.
#[derive(Default)]
struct AllocationFrontier {
    /// Keyed by `(offset, size, node)`. A write recorded over a read of the
    /// same slice by the same node replaces it.
    accesses: BTreeMap<(usize, usize, NodeId), AccessKind>,
    /// Largest slice ever recorded; bounds how far before a query an
    /// overlapping access may start.
    max_size: usize,
}

impl AllocationFrontier {
    fn conflicting(
        &self,
        slice: BufferAllocationSlice,
        access: AccessKind,
        out: &mut Vec<NodeId>,
    ) {
        if slice.size() == 0 {
            return;
        }
        let (start, end) = (slice.offset(), slice.offset() + slice.size());
        let from = start.saturating_sub(self.max_size);
        out.extend(
            self.accesses
                .range((from, 0, 0)..(end, 0, 0))
                .filter(|&(&(offset, size, _), &other)| {
                    offset + size > start && access.conflicts_with(other)
                })
                .map(|(&(_, _, node), _)| node),
        );
    }

    fn remove_covered(&mut self, slice: BufferAllocationSlice) {
        let (start, end) = (slice.offset(), slice.offset() + slice.size());
        let covered: Vec<_> = self
            .accesses
            .range((start, 0, 0)..(end, 0, 0))
            .map(|(&key, _)| key)
            .filter(|&(offset, size, _)| offset + size <= end)
            .collect();
        for key in covered {
            self.accesses.remove(&key);
        }
    }

    fn insert(&mut self, node: NodeId, slice: BufferAllocationSlice, access: AccessKind) {
        self.max_size = self.max_size.max(slice.size());
        let recorded = self
            .accesses
            .entry((slice.offset(), slice.size(), node))
            .or_insert(access);
        if access == AccessKind::Write {
            *recorded = AccessKind::Write;
        }
    }
}
