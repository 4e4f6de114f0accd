mod build;
mod reduce;

/// Error returned by [`Graph::build`] when a thunk reports unusable buffer
/// metadata.
pub use crate::graph::build::GraphBuildError;
use crate::{
    graph::{
        build::NodeUses,
        reduce::{priorities, reduce_predecessors, successors},
    },
    thunk::Thunk,
    types::{NodeId, Priority},
};
use core::fmt;

/// One thunk in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDef {
    id: NodeId,
    in_edges: Vec<NodeId>,
    out_edges: Vec<NodeId>,
    priority: Priority,
}

impl NodeDef {
    /// Position of the node's thunk in the sequence.
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Direct predecessors, ascending.
    pub fn in_edges(&self) -> &[NodeId] {
        &self.in_edges
    }

    /// Direct successors, ascending.
    pub fn out_edges(&self) -> &[NodeId] {
        &self.out_edges
    }

    /// Length of the longest path from this node to a sink.
    pub const fn priority(&self) -> Priority {
        self.priority
    }
}

/// Minimal dependency DAG over a thunk sequence.
///
/// An edge `u -> v` means `v` must not start before `u` completes. Edges
/// always point from an earlier thunk to a later one, so node ids are a
/// topological order. Edges implied by longer paths are removed, which makes
/// the graph the unique transitive reduction of the conflict relation.
#[must_use]
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<NodeDef>,
    source: Vec<NodeId>,
    sink: Vec<NodeId>,
    is_sequential: bool,
    num_edges: usize,
    footprint_bytes: usize,
}

impl Graph {
    /// Build the reduced dependency graph of `thunks`.
    ///
    /// Two thunks are connected iff the later one touches data the earlier
    /// one touches, with at least one of them writing it (directly or
    /// through a shared resource), and no longer path already orders them.
    ///
    /// # Errors
    /// If a thunk declares a slice whose end overflows.
    pub fn build(thunks: &[Box<dyn Thunk>]) -> Result<Self, GraphBuildError> {
        // Example, three thunks touching one slice:
        //
        //   0: write s     0 ----> 1 ----> 2
        //   1: read s       \_____________/^
        //   2: write s          (implied)
        //
        // - Phase 2 proposes 0 for node 1 and {0, 1} for node 2; the write of
        //   2 then hides both from later nodes.
        // - Phase 3 drops 0 -> 2: the path through 1 already orders them.
        // - Phase 4 assigns priorities {0: 2, 1: 1, 2: 0}.
        //
        // Phase 1: query and validate the declared uses.
        let uses = NodeUses::collect(thunks)?;

        // Phase 2: candidate predecessors, pointing backward in program order.
        // Every conflicting pair is connected through candidates.
        let candidates = uses.candidate_predecessors();

        // Phase 3: drop candidates implied by longer paths.
        let (in_edges, num_removed) = reduce_predecessors(candidates);
        let out_edges = successors(&in_edges);
        let num_edges = in_edges.iter().map(Vec::len).sum();
        tracing::trace!(num_edges, num_removed, "reduced thunk dependency graph");

        // Phase 4: priorities from the reduced successor lists.
        let priorities = priorities(&out_edges);

        // Phase 5: materialize nodes and derived properties.
        let nodes: Vec<_> = in_edges
            .into_iter()
            .zip(out_edges)
            .zip(priorities)
            .enumerate()
            .map(|(id, ((in_edges, out_edges), priority))| NodeDef {
                id,
                in_edges,
                out_edges,
                priority,
            })
            .collect();
        let source: Vec<_> = nodes
            .iter()
            .filter(|node| node.in_edges.is_empty())
            .map(NodeDef::id)
            .collect();
        let sink: Vec<_> = nodes
            .iter()
            .filter(|node| node.out_edges.is_empty())
            .map(NodeDef::id)
            .collect();
        // A single chain: one entry, one exit, nothing forks or joins.
        let is_sequential = nodes.len() <= 1
            || (source.len() == 1
                && sink.len() == 1
                && nodes
                    .iter()
                    .all(|node| node.in_edges.len() <= 1 && node.out_edges.len() <= 1));

        let result = Self {
            num_edges,
            footprint_bytes: uses.footprint_bytes(),
            nodes,
            source,
            sink,
            is_sequential,
        };
        if !result.nodes.is_empty() {
            assert!(!result.source.is_empty(), "Graph::build: [1]");
            assert!(!result.sink.is_empty(), "Graph::build: [2]");
        }
        Ok(result)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of edges after reduction.
    pub const fn num_edges(&self) -> usize {
        self.num_edges
    }

    /// All nodes, indexed by id.
    pub fn nodes(&self) -> &[NodeDef] {
        &self.nodes
    }

    /// Node `id`.
    ///
    /// # Panics
    /// If `id` is out of range.
    pub fn node(&self, id: NodeId) -> &NodeDef {
        &self.nodes[id]
    }

    /// Nodes without predecessors, ascending.
    pub fn source(&self) -> &[NodeId] {
        &self.source
    }

    /// Nodes without successors, ascending.
    pub fn sink(&self) -> &[NodeId] {
        &self.sink
    }

    /// Whether the graph is a single chain (trivially true for zero or one
    /// node).
    pub const fn is_sequential(&self) -> bool {
        self.is_sequential
    }

    /// Number of bytes the thunks touch, counting overlapping slices once.
    pub const fn footprint_bytes(&self) -> usize {
        self.footprint_bytes
    }

    /// Priority of every node, indexed by id.
    pub fn priorities(&self) -> Vec<Priority> {
        self.nodes.iter().map(NodeDef::priority).collect()
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "graph: {} node(s), {} edge(s), sequential={}, source={:?}, sink={:?}",
            self.nodes.len(),
            self.num_edges,
            self.is_sequential,
            self.source,
            self.sink
        )?;
        for node in &self.nodes {
            writeln!(
                f,
                "  #{} priority={} in={:?} out={:?}",
                node.id, node.priority, node.in_edges, node.out_edges
            )?;
        }
        Ok(())
    }
}
