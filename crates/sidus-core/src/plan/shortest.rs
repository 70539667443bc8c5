//! Deterministic shortest path over a skill plan.
//!
//! `petgraph::algo::dijkstra` only reports distances, and its tie handling
//! depends on heap order. Plans need the path itself and the same path on
//! every run, so equal-cost predecessors are resolved toward the lower node
//! index.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

/// Shortest path from `from` to `to`, both ends included.
///
/// Returns the path and its total weight, or `None` when `to` is unreachable.
pub(crate) fn shortest_path<N>(
    graph: &UnGraph<N, u32>,
    from: NodeIndex,
    to: NodeIndex,
) -> Option<(Vec<NodeIndex>, u64)> {
    let count = graph.node_count();
    let mut dist = vec![u64::MAX; count];
    let mut prev: Vec<Option<NodeIndex>> = vec![None; count];
    let mut settled = vec![false; count];
    let mut heap = BinaryHeap::new();

    dist[from.index()] = 0;
    heap.push(Reverse((0u64, from.index())));

    while let Some(Reverse((cost, u))) = heap.pop() {
        if settled[u] {
            continue;
        }
        settled[u] = true;
        if u == to.index() {
            break;
        }
        let node = NodeIndex::new(u);
        for edge in graph.edges(node) {
            let v = if edge.source() == node { edge.target() } else { edge.source() };
            if settled[v.index()] {
                continue;
            }
            let next = cost.saturating_add(u64::from(*edge.weight()));
            let current = dist[v.index()];
            let better = next < current
                || (next == current && prev[v.index()].is_some_and(|p| u < p.index()));
            if better {
                dist[v.index()] = next;
                prev[v.index()] = Some(node);
                heap.push(Reverse((next, v.index())));
            }
        }
    }

    if dist[to.index()] == u64::MAX {
        return None;
    }

    let mut path = vec![to];
    let mut cursor = to;
    while let Some(p) = prev[cursor.index()] {
        path.push(p);
        cursor = p;
    }
    path.reverse();
    Some((path, dist[to.index()]))
}
