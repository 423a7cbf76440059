use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::feedback::DropReason;
use crate::packet::{kind, NodeId, Packet, BROADCAST};
use crate::seen::SeenSet;
use crate::spf::{self, Graph};
use crate::strategy::{roll_path_window, Action, RoutingAlgorithm};

/// Protocol timers, in seconds. The defaults are load-bearing for
/// interoperability: `lsa_refresh_interval` must stay below `lsa_max_age` or
/// a node would age out its own advertisement between refreshes.
#[derive(Debug, Clone)]
pub struct LsrTimers {
    pub hello_interval: u64,
    pub neighbor_timeout: u64,
    pub lsa_min_interval: u64,
    pub lsa_refresh_interval: u64,
    pub lsa_max_age: u64,
    pub lsa_seen_capacity: usize,
}

impl Default for LsrTimers {
    fn default() -> LsrTimers {
        LsrTimers {
            hello_interval: 5,
            neighbor_timeout: 20,
            lsa_min_interval: 8,
            lsa_refresh_interval: 30,
            lsa_max_age: 90,
            lsa_seen_capacity: 1024,
        }
    }
}

/// A directly connected neighbour. Entries are never removed on timeout,
/// only flipped to `alive = false`; a later HELLO revives them.
#[derive(Debug, Clone)]
pub struct NeighborState {
    pub cost: u32,
    pub last_seen: u64,
    pub alive: bool,
}

/// The most recently accepted advertisement from one originator.
#[derive(Debug, Clone)]
pub struct LsaEntry {
    pub seq: u64,
    pub neighbors: BTreeMap<NodeId, u32>,
    pub last_received: u64,
}

/// LSA payload as carried inside `packet.payload`. `seq` being typed keeps
/// non-integer sequence numbers from ever entering the database.
#[derive(Deserialize)]
struct RawLsa {
    origin: NodeId,
    seq: u64,
    #[serde(default)]
    neighbors: BTreeMap<String, Value>,
}

pub struct LinkStateRouting {
    pub router_id: NodeId,
    pub timers: LsrTimers,
    pub neighbor_states: BTreeMap<NodeId, NeighborState>,
    pub link_state_db: BTreeMap<NodeId, LsaEntry>,
    /// Every router id this node has heard of, self included.
    pub area_routers: BTreeSet<NodeId>,
    pub my_lsa_seq: u64,
    pub last_lsa_time: u64,
    pub last_hello_time: u64,
    pub topology_changed: bool,
    lsa_seen: SeenSet<(NodeId, u64)>,
    /// Destination -> first hop. Replaced wholesale by `calculate_routes`,
    /// never mutated in place.
    routing_table: BTreeMap<NodeId, NodeId>,
}

impl LinkStateRouting {
    pub fn new(router_id: &str) -> LinkStateRouting {
        Self::with_timers(router_id, LsrTimers::default())
    }

    pub fn with_timers(router_id: &str, timers: LsrTimers) -> LinkStateRouting {
        debug_assert!(timers.lsa_refresh_interval < timers.lsa_max_age);
        LinkStateRouting {
            router_id: router_id.to_owned(),
            neighbor_states: BTreeMap::new(),
            link_state_db: BTreeMap::new(),
            area_routers: BTreeSet::new(),
            my_lsa_seq: 0,
            last_lsa_time: 0,
            last_hello_time: 0,
            topology_changed: false,
            lsa_seen: SeenSet::new(timers.lsa_seen_capacity),
            routing_table: BTreeMap::new(),
            timers,
        }
    }

    fn handle_hello(&mut self, pkt: &Packet, from_neighbor: Option<&str>, now: u64) {
        // prefer the link label; fall back to the claimed sender only when it
        // is already a known neighbour, so a stranger cannot introduce itself
        // over an unidentified link
        let resolved = match from_neighbor {
            Some(n) => Some(n.to_owned()),
            None if self.neighbor_states.contains_key(&pkt.from) => Some(pkt.from.clone()),
            None => None,
        };
        let Some(id) = resolved else {
            debug!("{}: hello from unresolvable link, ignored", self.router_id);
            return;
        };
        let entry = self.neighbor_states.entry(id).or_insert(NeighborState {
            cost: 1,
            last_seen: now,
            alive: true,
        });
        entry.last_seen = now;
        entry.alive = true;
        if entry.cost == 0 {
            entry.cost = 1;
        }
        self.topology_changed = true;
    }

    fn handle_lsa(&mut self, pkt: &mut Packet, now: u64) -> Action {
        if !roll_path_window(&self.router_id, pkt) {
            debug!("{}: LSA dropped, own id in path window", self.router_id);
            return Action::Dropped(DropReason::PathLoop);
        }

        let raw: RawLsa = match serde_json::from_str(&pkt.payload) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("{}: undecodable LSA payload: {}", self.router_id, e);
                return Action::Dropped(DropReason::MalformedPacket);
            }
        };
        if raw.origin != pkt.from {
            debug!(
                "{}: LSA origin {} does not match sender {}, dropped",
                self.router_id, raw.origin, pkt.from
            );
            return Action::Dropped(DropReason::SpoofedLsa);
        }

        if !self.lsa_seen.insert((raw.origin.clone(), raw.seq)) {
            return Action::Dropped(DropReason::StaleOrDuplicateLsa);
        }
        if let Some(entry) = self.link_state_db.get(&raw.origin) {
            if entry.seq >= raw.seq {
                debug!(
                    "{}: stale LSA from {} (seq {} <= {})",
                    self.router_id, raw.origin, raw.seq, entry.seq
                );
                return Action::Dropped(DropReason::StaleOrDuplicateLsa);
            }
        }

        let neighbors = normalize_costs(&raw.neighbors);
        self.area_routers.insert(raw.origin.clone());
        self.area_routers.extend(neighbors.keys().cloned());
        self.area_routers.insert(self.router_id.clone());
        self.link_state_db.insert(
            raw.origin.clone(),
            LsaEntry {
                seq: raw.seq,
                neighbors,
                last_received: now,
            },
        );
        self.calculate_routes();
        Action::FloodLsa
    }

    /// Rebuilds the forwarding table from the live neighbour set and the
    /// LSDB. When both contribute the same edge the cheaper cost wins.
    pub fn calculate_routes(&mut self) {
        let mut adj = Graph::new();
        for (n, st) in &self.neighbor_states {
            if st.alive {
                spf::add_edge(&mut adj, &self.router_id, n, st.cost);
            }
        }
        for (origin, entry) in &self.link_state_db {
            for (m, &cost) in &entry.neighbors {
                spf::add_edge(&mut adj, origin, m, cost);
            }
        }

        if !adj.contains_key(&self.router_id) {
            self.routing_table = BTreeMap::new();
            return;
        }
        let states = &self.neighbor_states;
        let live = |n: &str| states.get(n).map_or(false, |s| s.alive);
        let mut table = spf::first_hops(&adj, &self.router_id, &live).first_hop;
        table.remove(&self.router_id);
        self.routing_table = table;
    }
}

fn normalize_costs(raw: &BTreeMap<String, Value>) -> BTreeMap<NodeId, u32> {
    raw.iter()
        .filter_map(|(n, v)| {
            v.as_u64()
                .filter(|&c| c >= 1)
                .map(|c| (n.clone(), c.min(u32::MAX as u64) as u32))
        })
        .collect()
}

impl RoutingAlgorithm for LinkStateRouting {
    fn name(&self) -> &'static str {
        "lsr"
    }

    fn update_neighbor(&mut self, id: &str, cost: u32, now: u64) {
        let cost = cost.max(1);
        let entry = self
            .neighbor_states
            .entry(id.to_owned())
            .or_insert(NeighborState {
                cost,
                last_seen: now,
                alive: true,
            });
        entry.cost = cost;
        entry.last_seen = now;
        entry.alive = true;
        self.topology_changed = true;
    }

    fn process_packet(
        &mut self,
        pkt: &mut Packet,
        from_neighbor: Option<&str>,
        now: u64,
    ) -> Action {
        match pkt.kind.as_str() {
            kind::HELLO => {
                self.handle_hello(pkt, from_neighbor, now);
                Action::Done
            }
            kind::INFO | kind::LSA => self.handle_lsa(pkt, now),
            _ => {
                if pkt.to == self.router_id {
                    return Action::Done;
                }
                match self.next_hop(&pkt.to) {
                    Some(hop) => Action::Forward(hop),
                    None => Action::Dropped(DropReason::NoRoute),
                }
            }
        }
    }

    fn should_send_hello(&self, now: u64) -> bool {
        now.saturating_sub(self.last_hello_time) >= self.timers.hello_interval
    }

    fn create_hello_packet(&mut self, now: u64) -> Option<Packet> {
        self.last_hello_time = now;
        let mut pkt = Packet::new("lsr", kind::HELLO, &self.router_id, BROADCAST, 5);
        pkt.ensure_msg_id();
        pkt.headers.insert("ts".to_owned(), serde_json::json!(now));
        pkt.set_path(&[]);
        Some(pkt)
    }

    fn should_send_lsa(&self, now: u64) -> bool {
        let since = now.saturating_sub(self.last_lsa_time);
        (self.topology_changed && since >= self.timers.lsa_min_interval)
            || since >= self.timers.lsa_refresh_interval
    }

    fn create_lsa_packet(&mut self, now: u64) -> Option<Packet> {
        self.my_lsa_seq += 1;
        self.last_lsa_time = now;
        self.topology_changed = false;

        let neighs: BTreeMap<NodeId, u32> = self
            .neighbor_states
            .iter()
            .filter(|(_, st)| {
                st.alive && now.saturating_sub(st.last_seen) < self.timers.neighbor_timeout
            })
            .map(|(n, st)| (n.clone(), st.cost))
            .collect();

        // pre-install our own entry and mark our own (origin, seq) as seen so
        // the copy echoed back around a loop is suppressed
        self.link_state_db.insert(
            self.router_id.clone(),
            LsaEntry {
                seq: self.my_lsa_seq,
                neighbors: neighs.clone(),
                last_received: now,
            },
        );
        self.lsa_seen.insert((self.router_id.clone(), self.my_lsa_seq));
        self.area_routers.insert(self.router_id.clone());
        self.calculate_routes();

        let payload = serde_json::json!({
            "origin": self.router_id,
            "seq": self.my_lsa_seq,
            "neighbors": neighs,
            "ts": now,
        })
        .to_string();

        let mut pkt =
            Packet::new("lsr", kind::INFO, &self.router_id, BROADCAST, 16).with_payload(payload);
        pkt.ensure_msg_id();
        pkt.headers
            .insert("seq".to_owned(), serde_json::json!(self.my_lsa_seq));
        pkt.set_path(&[]);
        Some(pkt)
    }

    fn check_neighbor_timeouts(&mut self, now: u64) {
        let mut changed = false;
        for st in self.neighbor_states.values_mut() {
            let alive_now = now.saturating_sub(st.last_seen) < self.timers.neighbor_timeout;
            if alive_now != st.alive {
                st.alive = alive_now;
                changed = true;
            }
        }
        if changed {
            self.topology_changed = true;
            self.calculate_routes();
        }
    }

    fn age_lsa_database(&mut self, now: u64) {
        let before = self.link_state_db.len();
        let max_age = self.timers.lsa_max_age;
        self.link_state_db
            .retain(|_, e| now.saturating_sub(e.last_received) < max_age);
        if self.link_state_db.len() != before {
            self.topology_changed = true;
            self.calculate_routes();
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

    fn summary(&self) -> String {
        format!(
            "lsr: {} neighbours ({} alive), lsdb {:?}, area {:?}, seq {}",
            self.neighbor_states.len(),
            self.neighbor_states.values().filter(|s| s.alive).count(),
            self.link_state_db.keys().collect::<Vec<_>>(),
            self.area_routers,
            self.my_lsa_seq,
        )
    }
}
