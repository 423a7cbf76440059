use std::collections::{BTreeMap, VecDeque};

use log::{debug, info, warn};

use crate::feedback::DropReason;
use crate::packet::{kind, NodeId, Packet};
use crate::seen::SeenSet;
use crate::strategy::{Action, RoutingAlgorithm};

/// Capacity of the router-level message-id filter.
pub const SEEN_CAPACITY: usize = 50_000;
/// Hop budget for operator-originated messages and echoes.
pub const DEFAULT_TTL: u32 = 5;
/// Entries kept in the in-memory packet log ring.
const PACKET_LOG_CAPACITY: usize = 100;

/// An I/O instruction produced by the router and executed by whoever owns
/// the transport: the async node runtime, or a test harness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Unicast(NodeId, Vec<u8>),
    /// Fan out to every neighbour; used for self-originated HELLOs and LSAs.
    Broadcast(Vec<u8>),
}

/// A packet consumed locally and handed upward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub kind: String,
    pub from: NodeId,
    pub payload: String,
    pub ttl: u32,
}

#[derive(Debug, Default, Clone)]
pub struct DropCounters {
    counts: BTreeMap<DropReason, u64>,
}

impl DropCounters {
    fn bump(&mut self, reason: DropReason) {
        *self.counts.entry(reason).or_insert(0) += 1;
    }

    pub fn get(&self, reason: DropReason) -> u64 {
        self.counts.get(&reason).copied().unwrap_or(0)
    }
}

/// Per-node orchestration state.
///
/// The router is synchronous and does no I/O of its own: inbound frames and
/// clock ticks go in, [`Dispatch`] instructions and [`Delivery`] records come
/// out through the public queues. The async runtime in [`crate::node`] drains
/// them; so does the virtual-network test harness.
pub struct Router<A: RoutingAlgorithm> {
    pub id: NodeId,
    pub algorithm: A,
    /// Configured direct neighbours and their link costs.
    pub neighbors: BTreeMap<NodeId, u32>,
    pub outbound: Vec<Dispatch>,
    pub deliveries: Vec<Delivery>,
    pub drops: DropCounters,
    pub packet_log: VecDeque<String>,
    seen: SeenSet<String>,
}

impl<A: RoutingAlgorithm> Router<A> {
    pub fn new(id: &str, algorithm: A) -> Router<A> {
        Router {
            id: id.to_owned(),
            algorithm,
            neighbors: BTreeMap::new(),
            outbound: Vec::new(),
            deliveries: Vec::new(),
            drops: DropCounters::default(),
            packet_log: VecDeque::new(),
            seen: SeenSet::new(SEEN_CAPACITY),
        }
    }

    /// Registers a configured neighbour with the router and the algorithm.
    pub fn add_neighbor(&mut self, id: &str, cost: u32, now: u64) {
        self.neighbors.insert(id.to_owned(), cost);
        self.algorithm.update_neighbor(id, cost, now);
    }

    /// Full pipeline for one inbound frame: decode, dedup, ask the strategy,
    /// execute the action.
    pub fn handle_frame(&mut self, frame: &[u8], from_neighbor: Option<&str>, now: u64) {
        let mut pkt = match Packet::decode(frame) {
            Ok(pkt) => pkt,
            Err(e) => {
                self.drops.bump(DropReason::MalformedPacket);
                debug!("{}: dropping frame: {}", self.id, e);
                return;
            }
        };

        let msg_id = pkt.ensure_msg_id();
        if !self.seen.insert(msg_id) {
            self.drops.bump(DropReason::DuplicateMessage);
            return;
        }
        self.log_packet("RECV", &pkt, from_neighbor);

        if pkt.is_broadcast() {
            let action = self.algorithm.process_packet(&mut pkt, from_neighbor, now);
            self.execute(action, pkt, from_neighbor);
            return;
        }

        if pkt.to == self.id {
            self.deliver(pkt, now);
            return;
        }

        // unicast in transit
        let action = self.algorithm.process_packet(&mut pkt, from_neighbor, now);
        self.execute(action, pkt, from_neighbor);
    }

    fn execute(&mut self, action: Action, mut pkt: Packet, from_neighbor: Option<&str>) {
        match action {
            Action::Done => {}
            Action::Dropped(reason) => {
                self.drops.bump(reason);
                debug!(
                    "{}: {} from {} to {} dropped ({})",
                    self.id, pkt.kind, pkt.from, pkt.to, reason
                );
            }
            Action::Flood | Action::FloodLsa => {
                if !pkt.decrement_ttl() {
                    self.drops.bump(DropReason::TtlExpired);
                    return;
                }
                self.flood(&pkt, from_neighbor);
            }
            Action::Forward(next) => {
                if !pkt.decrement_ttl() {
                    self.drops.bump(DropReason::TtlExpired);
                    return;
                }
                self.unicast(&pkt, &next);
            }
        }
    }

    /// Delivers a packet addressed to this node. Echo requests are answered
    /// through the normal origination path.
    fn deliver(&mut self, pkt: Packet, now: u64) {
        match pkt.kind.as_str() {
            kind::MESSAGE => {
                info!("{}: [message from {}] {}", self.id, pkt.from, pkt.payload);
                self.log_packet("DELIVERED", &pkt, None);
                self.deliveries.push(Delivery {
                    kind: pkt.kind,
                    from: pkt.from,
                    payload: pkt.payload,
                    ttl: pkt.ttl,
                });
            }
            kind::ECHO => {
                let reply_payload = format!("echo reply from {}", self.id);
                let dst = pkt.from.clone();
                self.deliveries.push(Delivery {
                    kind: pkt.kind,
                    from: pkt.from,
                    payload: pkt.payload,
                    ttl: pkt.ttl,
                });
                self.originate(kind::ECHO_REPLY, &dst, &reply_payload, now);
            }
            kind::ECHO_REPLY => {
                info!("{}: [echo reply from {}] {}", self.id, pkt.from, pkt.payload);
                self.deliveries.push(Delivery {
                    kind: pkt.kind,
                    from: pkt.from,
                    payload: pkt.payload,
                    ttl: pkt.ttl,
                });
            }
            other => {
                debug!("{}: ignoring {} addressed to us", self.id, other);
            }
        }
    }

    /// Periodic maintenance: liveness sweep, LSDB aging, then HELLO and LSA
    /// emission when due.
    pub fn tick(&mut self, now: u64) {
        self.algorithm.check_neighbor_timeouts(now);
        self.algorithm.age_lsa_database(now);

        if self.algorithm.should_send_hello(now) {
            if let Some(mut hello) = self.algorithm.create_hello_packet(now) {
                self.broadcast(&mut hello);
            }
        }
        if self.algorithm.should_send_lsa(now) {
            if let Some(mut lsa) = self.algorithm.create_lsa_packet(now) {
                self.broadcast(&mut lsa);
            }
        }
    }

    /// Originates a packet from this node. Routed destinations get a
    /// unicast; everything else falls back to a flood fan-out, which is also
    /// the only path the flooding strategy ever takes.
    pub fn originate(&mut self, kind: &str, dst: &str, payload: &str, now: u64) {
        let mut pkt = Packet::new(self.algorithm.name(), kind, &self.id, dst, DEFAULT_TTL)
            .with_payload(payload);
        let msg_id = pkt.ensure_msg_id();
        pkt.headers.insert("ts".to_owned(), serde_json::json!(now));
        self.seen.insert(msg_id);
        self.log_packet("SENT", &pkt, None);

        // the first transmission spends a hop
        if !pkt.decrement_ttl() {
            self.drops.bump(DropReason::TtlExpired);
            return;
        }
        match self.algorithm.next_hop(dst) {
            Some(hop) => self.unicast(&pkt, &hop),
            None => self.flood(&pkt, None),
        }
    }

    /// Fans a packet out to every configured neighbour except the inbound
    /// link and the originator itself.
    fn flood(&mut self, pkt: &Packet, exclude: Option<&str>) {
        let bytes = match pkt.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("{}: cannot encode packet for flood: {}", self.id, e);
                return;
            }
        };
        let mut fanned = 0;
        for neighbor in self.neighbors.keys() {
            if Some(neighbor.as_str()) == exclude || *neighbor == pkt.from {
                continue;
            }
            self.outbound
                .push(Dispatch::Unicast(neighbor.clone(), bytes.clone()));
            fanned += 1;
        }
        if fanned > 0 {
            self.log_packet("FLOODED", pkt, exclude);
        }
    }

    fn unicast(&mut self, pkt: &Packet, neighbor: &str) {
        match pkt.encode() {
            Ok(bytes) => {
                self.outbound
                    .push(Dispatch::Unicast(neighbor.to_owned(), bytes));
                self.log_packet("FORWARDED", pkt, Some(neighbor));
            }
            Err(e) => warn!("{}: cannot encode packet for {}: {}", self.id, neighbor, e),
        }
    }

    /// Self-originated control packet to every neighbour at once.
    fn broadcast(&mut self, pkt: &mut Packet) {
        let msg_id = pkt.ensure_msg_id();
        // our own broadcast must not be reprocessed if it comes back
        self.seen.insert(msg_id);
        match pkt.encode() {
            Ok(bytes) => {
                self.outbound.push(Dispatch::Broadcast(bytes));
                self.log_packet("SENT", pkt, None);
            }
            Err(e) => warn!("{}: cannot encode {} packet: {}", self.id, pkt.kind, e),
        }
    }

    fn log_packet(&mut self, what: &str, pkt: &Packet, via: Option<&str>) {
        let via = via.map(|v| format!(" via {v}")).unwrap_or_default();
        let id = pkt.msg_id().unwrap_or("-");
        let line = format!(
            "[{what}]{via} {} [id={id}] {} -> {}",
            pkt.kind, pkt.from, pkt.to
        );
        debug!("{}: {line}", self.id);
        self.packet_log.push_back(line);
        if self.packet_log.len() > PACKET_LOG_CAPACITY {
            self.packet_log.pop_front();
        }
    }
}
