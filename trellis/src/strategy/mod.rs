//! Routing strategies.
//!
//! A strategy is pure state: it never blocks, sleeps or touches the network,
//! and it never reads the clock. The router drives it with decoded packets
//! and a caller-supplied `now` (local epoch seconds), and executes whatever
//! [`Action`] comes back.

use std::collections::BTreeMap;

use crate::feedback::DropReason;
use crate::packet::{NodeId, Packet, PATH_WINDOW};

mod dijkstra;
mod flooding;
mod lsr;

pub use dijkstra::DijkstraRouting;
pub use flooding::Flooding;
pub use lsr::{LinkStateRouting, LsaEntry, LsrTimers, NeighborState};

/// What the router should do with a packet after the strategy has seen it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Consumed locally; nothing to forward.
    Done,
    /// Dropped; the reason feeds the router's drop counters.
    Dropped(DropReason),
    /// Forward to every neighbour except the inbound one.
    Flood,
    /// Forward to every neighbour except the inbound one; the packet is an
    /// accepted LSA travelling the mesh.
    FloodLsa,
    /// Unicast to this neighbour.
    Forward(NodeId),
}

pub trait RoutingAlgorithm: Send {
    fn name(&self) -> &'static str;

    /// Upserts a directly connected neighbour. No I/O, no route computation.
    fn update_neighbor(&mut self, id: &str, cost: u32, now: u64);

    /// Decides what to do with an inbound packet. `from_neighbor` is the
    /// link label the transport attached, `None` when the substrate could
    /// not identify the sending link.
    fn process_packet(&mut self, pkt: &mut Packet, from_neighbor: Option<&str>, now: u64)
        -> Action;

    fn should_send_hello(&self, _now: u64) -> bool {
        false
    }
    fn create_hello_packet(&mut self, _now: u64) -> Option<Packet> {
        None
    }
    fn should_send_lsa(&self, _now: u64) -> bool {
        false
    }
    fn create_lsa_packet(&mut self, _now: u64) -> Option<Packet> {
        None
    }

    /// Periodic maintenance; both are idempotent and default to no-ops.
    fn check_neighbor_timeouts(&mut self, _now: u64) {}
    fn age_lsa_database(&mut self, _now: u64) {}

    fn next_hop(&self, dst: &str) -> Option<NodeId>;

    /// Snapshot of destination -> first hop, for operator commands.
    fn routing_table(&self) -> BTreeMap<NodeId, NodeId>;

    /// Full path to a destination where the strategy can reconstruct one.
    fn full_path(&self, _dst: &str) -> Option<Vec<NodeId>> {
        None
    }

    /// One-line internal state description for the `debug` command.
    fn summary(&self) -> String {
        format!("{}: {} routes", self.name(), self.routing_table().len())
    }
}

impl<A: RoutingAlgorithm + ?Sized> RoutingAlgorithm for Box<A> {
    fn name(&self) -> &'static str {
        (**self).name()
    }
    fn update_neighbor(&mut self, id: &str, cost: u32, now: u64) {
        (**self).update_neighbor(id, cost, now)
    }
    fn process_packet(
        &mut self,
        pkt: &mut Packet,
        from_neighbor: Option<&str>,
        now: u64,
    ) -> Action {
        (**self).process_packet(pkt, from_neighbor, now)
    }
    fn should_send_hello(&self, now: u64) -> bool {
        (**self).should_send_hello(now)
    }
    fn create_hello_packet(&mut self, now: u64) -> Option<Packet> {
        (**self).create_hello_packet(now)
    }
    fn should_send_lsa(&self, now: u64) -> bool {
        (**self).should_send_lsa(now)
    }
    fn create_lsa_packet(&mut self, now: u64) -> Option<Packet> {
        (**self).create_lsa_packet(now)
    }
    fn check_neighbor_timeouts(&mut self, now: u64) {
        (**self).check_neighbor_timeouts(now)
    }
    fn age_lsa_database(&mut self, now: u64) {
        (**self).age_lsa_database(now)
    }
    fn next_hop(&self, dst: &str) -> Option<NodeId> {
        (**self).next_hop(dst)
    }
    fn routing_table(&self) -> BTreeMap<NodeId, NodeId> {
        (**self).routing_table()
    }
    fn full_path(&self, dst: &str) -> Option<Vec<NodeId>> {
        (**self).full_path(dst)
    }
    fn summary(&self) -> String {
        (**self).summary()
    }
}

/// Maintains the rolling window of recent forwarders in `headers.path`.
///
/// Returns false when our own id is already present (the packet has looped)
/// and the caller must drop. Otherwise the head is shed once the window holds
/// [`PATH_WINDOW`] entries and our id is appended.
pub(crate) fn roll_path_window(self_id: &str, pkt: &mut Packet) -> bool {
    let mut path = pkt.path();
    if path.iter().any(|hop| hop == self_id) {
        return false;
    }
    if path.len() >= PATH_WINDOW {
        path.remove(0);
    }
    path.push(self_id.to_owned());
    pkt.set_path(&path);
    true
}
