//! Deterministic shortest-path-first computation.
//!
//! Every ordered structure here is a `BTreeMap`/`BTreeSet` so that two nodes
//! holding the same topology walk the graph in the same order and install
//! identical forwarding tables.

use std::collections::{BTreeMap, BTreeSet};

use crate::packet::NodeId;

/// Undirected adjacency, node id -> (neighbour id -> cost).
pub type Graph = BTreeMap<NodeId, BTreeMap<NodeId, u32>>;

pub const INF: u64 = u64::MAX;

/// Adds an undirected edge, keeping the minimum cost when both the local
/// neighbour table and a flooded LSA contribute the same edge.
pub fn add_edge(adj: &mut Graph, a: &str, b: &str, cost: u32) {
    let fwd = adj.entry(a.to_owned()).or_default();
    let slot = fwd.entry(b.to_owned()).or_insert(cost);
    *slot = (*slot).min(cost);
    let rev = adj.entry(b.to_owned()).or_default();
    let slot = rev.entry(a.to_owned()).or_insert(cost);
    *slot = (*slot).min(cost);
}

pub struct SpfResult {
    pub dist: BTreeMap<NodeId, u64>,
    /// Destination -> first hop out of `source`. Only reachable nodes appear.
    pub first_hop: BTreeMap<NodeId, NodeId>,
    /// Destination -> predecessor on the shortest path, for path display.
    pub prev: BTreeMap<NodeId, NodeId>,
}

/// Equal-cost tie-break between two candidate first hops. Returns true when
/// `cand` should replace `cur`.
///
/// Live direct neighbours win over hops only known through the LSDB; among
/// equals the lexicographically smaller id wins, which is what makes the
/// choice reproducible across restarts.
pub fn prefer_first_hop(
    cand: Option<&str>,
    cur: Option<&str>,
    is_live_direct: &dyn Fn(&str) -> bool,
) -> bool {
    match (cand, cur) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(a), Some(b)) => {
            let (live_a, live_b) = (is_live_direct(a), is_live_direct(b));
            if live_a != live_b {
                live_a
            } else {
                a < b
            }
        }
    }
}

/// Dijkstra from `source`, carrying the first hop through relaxation instead
/// of post-walking a predecessor chain, so equal-cost alternatives resolve
/// through [`prefer_first_hop`] exactly once.
pub fn first_hops(
    adj: &Graph,
    source: &str,
    is_live_direct: &dyn Fn(&str) -> bool,
) -> SpfResult {
    let mut dist: BTreeMap<NodeId, u64> = adj.keys().map(|k| (k.clone(), INF)).collect();
    let mut first: BTreeMap<NodeId, NodeId> = BTreeMap::new();
    let mut prev: BTreeMap<NodeId, NodeId> = BTreeMap::new();

    if !adj.contains_key(source) {
        return SpfResult {
            dist,
            first_hop: first,
            prev,
        };
    }
    dist.insert(source.to_owned(), 0);

    let mut unvisited: BTreeSet<NodeId> = adj.keys().cloned().collect();
    while !unvisited.is_empty() {
        // argmin over (distance, id); the id component settles equal
        // distances deterministically
        let u = match unvisited
            .iter()
            .map(|v| (dist[v], v.clone()))
            .min()
        {
            Some((d, _)) if d == INF => break,
            Some((_, v)) => v,
            None => break,
        };

        for (v, &cost) in &adj[&u] {
            let alt = dist[&u].saturating_add(cost as u64);
            let cand = if u == source {
                Some(v.clone())
            } else {
                first.get(&u).cloned()
            };
            let dv = dist[v];
            if alt < dv {
                dist.insert(v.clone(), alt);
                prev.insert(v.clone(), u.clone());
                match cand {
                    Some(c) => {
                        first.insert(v.clone(), c);
                    }
                    None => {
                        first.remove(v);
                    }
                }
            } else if alt == dv
                && prefer_first_hop(
                    cand.as_deref(),
                    first.get(v).map(String::as_str),
                    is_live_direct,
                )
            {
                if let Some(c) = cand {
                    first.insert(v.clone(), c);
                }
            }
        }
        unvisited.remove(&u);
    }

    SpfResult {
        dist,
        first_hop: first,
        prev,
    }
}
