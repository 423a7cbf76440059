use std::collections::BTreeMap;

use crate::feedback::DropReason;
use crate::packet::{kind, NodeId, Packet};
use crate::spf::{self, Graph};
use crate::strategy::{Action, RoutingAlgorithm};

/// Static shortest-path routing over the configured topology: the table is
/// computed once from the full adjacency document and no control packets are
/// ever exchanged. Useful as a baseline against the adaptive strategies.
pub struct DijkstraRouting {
    pub router_id: NodeId,
    pub topology: BTreeMap<NodeId, Vec<NodeId>>,
    routing_table: BTreeMap<NodeId, NodeId>,
    prev: BTreeMap<NodeId, NodeId>,
}

impl DijkstraRouting {
    pub fn new(router_id: &str) -> DijkstraRouting {
        DijkstraRouting {
            router_id: router_id.to_owned(),
            topology: BTreeMap::new(),
            routing_table: BTreeMap::new(),
            prev: BTreeMap::new(),
        }
    }

    /// Installs the full network topology and computes the table.
    pub fn set_topology(&mut self, topology: BTreeMap<NodeId, Vec<NodeId>>) {
        let mut adj = Graph::new();
        for (node, neighbors) in &topology {
            for n in neighbors {
                spf::add_edge(&mut adj, node, n, 1);
            }
        }
        self.topology = topology;

        if !adj.contains_key(&self.router_id) {
            self.routing_table = BTreeMap::new();
            self.prev = BTreeMap::new();
            return;
        }
        let direct = self
            .topology
            .get(&self.router_id)
            .cloned()
            .unwrap_or_default();
        let is_direct = |n: &str| direct.iter().any(|d| d == n);
        let result = spf::first_hops(&adj, &self.router_id, &is_direct);
        let mut table = result.first_hop;
        table.remove(&self.router_id);
        self.routing_table = table;
        self.prev = result.prev;
    }
}

impl RoutingAlgorithm for DijkstraRouting {
    fn name(&self) -> &'static str {
        "dijkstra"
    }

    fn update_neighbor(&mut self, _id: &str, _cost: u32, _now: u64) {
        // the table comes from the topology document, not from discovery
    }

    fn process_packet(
        &mut self,
        pkt: &mut Packet,
        _from_neighbor: Option<&str>,
        _now: u64,
    ) -> Action {
        if pkt.kind == kind::HELLO || pkt.to == self.router_id {
            return Action::Done;
        }
        match self.next_hop(&pkt.to) {
            Some(hop) => Action::Forward(hop),
            None => Action::Dropped(DropReason::NoRoute),
        }
    }

    fn next_hop(&self, dst: &str) -> Option<NodeId> {
        if dst == self.router_id {
            return None;
        }
        self.routing_table.get(dst).cloned()
    }

    fn routing_table(&self) -> BTreeMap<NodeId, NodeId> {
        self.routing_table.clone()
    }

    fn full_path(&self, dst: &str) -> Option<Vec<NodeId>> {
        if dst == self.router_id || !self.routing_table.contains_key(dst) {
            return None;
        }
        let mut path = vec![dst.to_owned()];
        let mut cur = dst.to_owned();
        while cur != self.router_id {
            cur = self.prev.get(&cur)?.clone();
            path.push(cur.clone());
        }
        path.reverse();
        Some(path)
    }

    fn summary(&self) -> String {
        format!(
            "dijkstra: {} nodes in topology, {} routes",
            self.topology.len(),
            self.routing_table.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{kind, Packet};

    fn square_topology() -> BTreeMap<NodeId, Vec<NodeId>> {
        [
            ("A", vec!["B", "D"]),
            ("B", vec!["A", "C"]),
            ("C", vec!["B", "D"]),
            ("D", vec!["C", "A"]),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.into_iter().map(str::to_owned).collect()))
        .collect()
    }

    #[test]
    fn table_matches_the_configured_topology() {
        let mut d = DijkstraRouting::new("A");
        d.set_topology(square_topology());
        assert_eq!(d.next_hop("B"), Some("B".to_owned()));
        assert_eq!(d.next_hop("D"), Some("D".to_owned()));
        // equal cost via B or D: lexicographically smaller neighbour
        assert_eq!(d.next_hop("C"), Some("B".to_owned()));
        assert_eq!(d.next_hop("A"), None);
        assert_eq!(d.next_hop("Z"), None);
    }

    #[test]
    fn full_path_walks_the_tree() {
        let mut d = DijkstraRouting::new("A");
        d.set_topology(square_topology());
        assert_eq!(
            d.full_path("C"),
            Some(vec!["A".to_owned(), "B".to_owned(), "C".to_owned()])
        );
        assert_eq!(d.full_path("Z"), None);
    }

    #[test]
    fn forwards_by_table_and_consumes_own_traffic() {
        let mut d = DijkstraRouting::new("B");
        d.set_topology(square_topology());

        let mut pkt = Packet::new("dijkstra", kind::MESSAGE, "A", "C", 5);
        assert_eq!(
            d.process_packet(&mut pkt, Some("A"), 0),
            Action::Forward("C".to_owned())
        );

        let mut pkt = Packet::new("dijkstra", kind::MESSAGE, "A", "B", 5);
        assert_eq!(d.process_packet(&mut pkt, Some("A"), 0), Action::Done);
    }
}
