use std::collections::BTreeMap;

use crate::packet::{kind, NodeId, Packet, BROADCAST};
use crate::strategy::{Action, RoutingAlgorithm};

const HELLO_INTERVAL: u64 = 5;

/// Pure flooding: every packet we are not the destination of goes to every
/// neighbour except the one it came from. Storm control (msg-id dedup, TTL
/// decrement, sender exclusion) lives entirely in the router; the strategy
/// keeps no per-packet state.
pub struct Flooding {
    pub router_id: NodeId,
    pub neighbors: BTreeMap<NodeId, u32>,
    last_hello_time: u64,
}

impl Flooding {
    pub fn new(router_id: &str) -> Flooding {
        Flooding {
            router_id: router_id.to_owned(),
            neighbors: BTreeMap::new(),
            last_hello_time: 0,
        }
    }
}

impl RoutingAlgorithm for Flooding {
    fn name(&self) -> &'static str {
        "flooding"
    }

    fn update_neighbor(&mut self, id: &str, cost: u32, _now: u64) {
        self.neighbors.insert(id.to_owned(), cost);
    }

    fn process_packet(
        &mut self,
        pkt: &mut Packet,
        _from_neighbor: Option<&str>,
        _now: u64,
    ) -> Action {
        // HELLO introduces a neighbour and never transits
        if pkt.kind == kind::HELLO {
            return Action::Done;
        }

        // unicast addressed to us: the router delivers upward
        if pkt.to == self.router_id
            && matches!(
                pkt.kind.as_str(),
                kind::MESSAGE | kind::ECHO | kind::ECHO_REPLY
            )
        {
            return Action::Done;
        }

        Action::Flood
    }

    fn should_send_hello(&self, now: u64) -> bool {
        now.saturating_sub(self.last_hello_time) >= HELLO_INTERVAL
    }

    fn create_hello_packet(&mut self, now: u64) -> Option<Packet> {
        self.last_hello_time = now;
        // TTL 1: a HELLO is only ever meaningful one hop out
        let mut pkt = Packet::new("flooding", kind::HELLO, &self.router_id, BROADCAST, 1);
        pkt.ensure_msg_id();
        pkt.headers
            .insert("ts".to_owned(), serde_json::json!(now));
        pkt.set_path(&[]);
        Some(pkt)
    }

    fn next_hop(&self, _dst: &str) -> Option<NodeId> {
        None
    }

    fn routing_table(&self) -> BTreeMap<NodeId, NodeId> {
        // flooding has no routes; show neighbours as their own first hop
        self.neighbors
            .keys()
            .map(|n| (n.clone(), n.clone()))
            .collect()
    }
}
