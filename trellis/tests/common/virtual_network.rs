use std::collections::{BTreeMap, BTreeSet};

use trellis::packet::{kind, NodeId};
use trellis::router::{Dispatch, Router};
use trellis::strategy::{LinkStateRouting, RoutingAlgorithm};

/// A mesh of LSR routers joined by in-memory links, driven by a synthetic
/// one-second clock. `run_for` ticks every node and then pumps frames until
/// the network is quiet, applying the same dispatch rules the async runtime
/// does: unicasts go to their link, broadcasts to every link neighbour.
pub struct VirtualNet {
    pub routers: BTreeMap<NodeId, Router<LinkStateRouting>>,
    links: BTreeSet<(NodeId, NodeId)>,
    pub now: u64,
    /// Nodes that no longer tick (no HELLO/LSA) but still forward.
    muted: BTreeSet<NodeId>,
    /// Nodes that are gone entirely: no tick, frames to them are lost.
    down: BTreeSet<NodeId>,
}

fn ordered(a: &str, b: &str) -> (NodeId, NodeId) {
    if a < b {
        (a.to_owned(), b.to_owned())
    } else {
        (b.to_owned(), a.to_owned())
    }
}

impl VirtualNet {
    pub fn create(nodes: &[&str], edges: &[(&str, &str)]) -> VirtualNet {
        let mut routers = BTreeMap::new();
        for id in nodes {
            routers.insert(
                (*id).to_owned(),
                Router::new(id, LinkStateRouting::new(id)),
            );
        }
        let mut links = BTreeSet::new();
        for &(a, b) in edges {
            links.insert(ordered(a, b));
            routers.get_mut(a).unwrap().add_neighbor(b, 1, 0);
            routers.get_mut(b).unwrap().add_neighbor(a, 1, 0);
        }
        VirtualNet {
            routers,
            links,
            now: 0,
            muted: BTreeSet::new(),
            down: BTreeSet::new(),
        }
    }

    fn neighbors_of(&self, id: &str) -> Vec<NodeId> {
        self.links
            .iter()
            .filter_map(|(a, b)| {
                if a == id {
                    Some(b.clone())
                } else if b == id {
                    Some(a.clone())
                } else {
                    None
                }
            })
            .collect()
    }

    /// Stops a node's periodic tick; it keeps forwarding what it receives.
    pub fn mute(&mut self, id: &str) {
        self.muted.insert(id.to_owned());
    }

    pub fn unmute(&mut self, id: &str) {
        self.muted.remove(id);
    }

    /// Removes a node from the network entirely.
    pub fn take_down(&mut self, id: &str) {
        self.down.insert(id.to_owned());
    }

    /// Advances the clock one second at a time, ticking and pumping.
    pub fn run_for(&mut self, secs: u64) {
        for _ in 0..secs {
            self.now += 1;
            let ids: Vec<NodeId> = self.routers.keys().cloned().collect();
            for id in &ids {
                if self.muted.contains(id) || self.down.contains(id) {
                    continue;
                }
                self.routers.get_mut(id).unwrap().tick(self.now);
            }
            self.pump();
        }
    }

    /// Moves queued frames between routers until nothing more is emitted.
    pub fn pump(&mut self) {
        loop {
            let mut frames: Vec<(NodeId, NodeId, Vec<u8>)> = Vec::new();
            let ids: Vec<NodeId> = self.routers.keys().cloned().collect();
            for id in &ids {
                let outbound = std::mem::take(&mut self.routers.get_mut(id).unwrap().outbound);
                for dispatch in outbound {
                    match dispatch {
                        Dispatch::Unicast(to, bytes) => frames.push((to, id.clone(), bytes)),
                        Dispatch::Broadcast(bytes) => {
                            for n in self.neighbors_of(id) {
                                frames.push((n, id.clone(), bytes.clone()));
                            }
                        }
                    }
                }
            }
            if frames.is_empty() {
                break;
            }
            for (to, from, bytes) in frames {
                if self.down.contains(&to) {
                    continue;
                }
                if let Some(router) = self.routers.get_mut(&to) {
                    router.handle_frame(&bytes, Some(&from), self.now);
                }
            }
        }
    }

    /// Originates an operator message and lets it travel.
    pub fn send(&mut self, from: &str, to: &str, payload: &str) {
        let now = self.now;
        self.routers
            .get_mut(from)
            .unwrap()
            .originate(kind::MESSAGE, to, payload, now);
        self.pump();
    }

    pub fn lsr(&self, id: &str) -> &LinkStateRouting {
        &self.routers[id].algorithm
    }

    pub fn next_hop(&self, at: &str, dst: &str) -> Option<NodeId> {
        self.routers[at].algorithm.next_hop(dst)
    }
}
