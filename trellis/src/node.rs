//! Async runtime around a [`Router`]: a receive loop and a periodic tick
//! multiplexed on one task, with the locking discipline the control plane
//! requires. The lock is only ever held across synchronous router calls;
//! every transport send happens after it is released.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use log::{debug, warn};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::router::{Dispatch, Router};
use crate::strategy::RoutingAlgorithm;
use crate::transport::{Inbound, Transport};
use crate::util::unix_now;

/// Cadence of the maintenance tick.
pub const TICK_INTERVAL: Duration = Duration::from_millis(750);
/// How long shutdown waits for in-flight sends before giving up.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Handle for signalling shutdown from another task (the command loop).
#[derive(Clone)]
pub struct NodeHandle {
    shutdown_tx: broadcast::Sender<()>,
}

impl NodeHandle {
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

pub struct Node<A: RoutingAlgorithm, T: Transport> {
    pub router: Arc<Mutex<Router<A>>>,
    pub transport: Arc<T>,
    inbound: mpsc::Receiver<Inbound>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl<A: RoutingAlgorithm, T: Transport> Node<A, T> {
    pub fn new(
        router: Arc<Mutex<Router<A>>>,
        transport: Arc<T>,
        inbound: mpsc::Receiver<Inbound>,
    ) -> (Node<A, T>, NodeHandle) {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        (
            Node {
                router,
                transport,
                inbound,
                shutdown_rx,
            },
            NodeHandle { shutdown_tx },
        )
    }

    /// Runs until shutdown is signalled or the transport's receive stream
    /// closes. All state is in-memory; a restarted node re-converges from
    /// HELLO and LSA exchange alone.
    pub async fn run(mut self) {
        let mut tick = interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    debug!("node: shutdown signalled");
                    break;
                }
                inbound = self.inbound.recv() => {
                    match inbound {
                        Some(Inbound { frame, from_neighbor }) => {
                            {
                                let mut router = self.router.lock().await;
                                router.handle_frame(&frame, from_neighbor.as_deref(), unix_now());
                            }
                            flush(&self.router, self.transport.as_ref()).await;
                        }
                        None => {
                            debug!("node: transport receive stream closed");
                            break;
                        }
                    }
                }
                _ = tick.tick() => {
                    {
                        let mut router = self.router.lock().await;
                        router.tick(unix_now());
                    }
                    flush(&self.router, self.transport.as_ref()).await;
                }
            }
        }

        // bounded grace for whatever is still queued
        if timeout(SHUTDOWN_GRACE, flush(&self.router, self.transport.as_ref()))
            .await
            .is_err()
        {
            warn!("node: shutdown grace expired with sends still in flight");
        }
        self.transport.close().await;
    }
}

/// Drains the router's queues and performs the I/O, outside the lock.
/// Deliveries were already surfaced by the router when they happened; they
/// are drained here only so the queue cannot grow without bound.
pub async fn flush<A: RoutingAlgorithm, T: Transport + ?Sized>(
    router: &Mutex<Router<A>>,
    transport: &T,
) {
    let dispatches = {
        let mut router = router.lock().await;
        router.deliveries.clear();
        std::mem::take(&mut router.outbound)
    };
    for dispatch in dispatches {
        let result = match dispatch {
            Dispatch::Unicast(neighbor, bytes) => {
                transport.send_unicast(&neighbor, Bytes::from(bytes)).await
            }
            Dispatch::Broadcast(bytes) => transport.send_broadcast(Bytes::from(bytes)).await,
        };
        if let Err(e) = result {
            // best effort: the periodic refresh repairs whatever this lost
            warn!("send failed: {e}");
        }
    }
}
