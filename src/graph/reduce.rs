use crate::types::{NodeId, Priority};

/// Reduce candidate predecessor lists to the transitive reduction.
///
/// `candidates[v]` holds, ascending, earlier nodes `v` depends on; together
/// they must reach every node `v` depends on. Node ids are therefore a
/// topological order. A candidate is dropped when it is an ancestor of
/// another candidate of the same node.
///
/// Returns the reduced predecessor lists, sorted ascending, and the number
/// of dropped candidates.
pub(super) fn reduce_predecessors(candidates: Vec<Vec<NodeId>>) -> (Vec<Vec<NodeId>>, usize) {
    let num_nodes = candidates.len();
    let mut in_edges: Vec<Vec<NodeId>> = Vec::with_capacity(num_nodes);
    // `reached[u] == v` marks `u` as an ancestor of a kept predecessor of `v`.
    let mut reached = vec![NodeId::MAX; num_nodes];
    let mut stack = Vec::new();
    let mut removed = 0;

    for (v, candidates) in candidates.into_iter().enumerate() {
        if candidates.len() < 2 {
            // A single predecessor can't be implied through another one.
            in_edges.push(candidates);
            continue;
        }
        // Ancestors of a candidate have smaller ids, so visiting candidates
        // from the highest one down classifies each before it is reached.
        let lowest = candidates[0];
        let mut kept = Vec::with_capacity(candidates.len());
        for &candidate in candidates.iter().rev() {
            assert!(candidate < v, "reduce_predecessors: [1]");
            if reached[candidate] == v {
                removed += 1;
                continue;
            }
            kept.push(candidate);
            stack.push(candidate);
            while let Some(node) = stack.pop() {
                for &predecessor in &in_edges[node] {
                    // Nodes below the lowest candidate can't lead to one.
                    if predecessor >= lowest && reached[predecessor] != v {
                        reached[predecessor] = v;
                        stack.push(predecessor);
                    }
                }
            }
        }
        kept.reverse();
        in_edges.push(kept);
    }
    (in_edges, removed)
}

/// Successor lists, sorted ascending, of the graph given by `in_edges`.
pub(super) fn successors(in_edges: &[Vec<NodeId>]) -> Vec<Vec<NodeId>> {
    let mut out_edges = vec![Vec::new(); in_edges.len()];
    for (node, predecessors) in in_edges.iter().enumerate() {
        for &predecessor in predecessors {
            out_edges[predecessor].push(node);
        }
    }
    out_edges
}

/// Longest path to any sink, per node: `0` for sinks, otherwise one more
/// than the highest successor priority.
pub(super) fn priorities(out_edges: &[Vec<NodeId>]) -> Vec<Priority> {
    let mut priorities = vec![0; out_edges.len()];
    for node in (0..out_edges.len()).rev() {
        priorities[node] = out_edges[node]
            .iter()
            .map(|&successor| {
                assert!(successor > node, "priorities: [1]");
                priorities[successor] + 1
            })
            .max()
            .unwrap_or(0);
    }
    priorities
}
