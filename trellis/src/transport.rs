use async_trait::async_trait;
use bytes::Bytes;

use crate::feedback::TransportError;
use crate::packet::NodeId;

/// One frame off the wire. `from_neighbor` is the label of the link it
/// arrived on, `None` when the substrate cannot identify the sending link
/// (e.g. a freshly accepted connection that has not introduced itself).
#[derive(Debug, Clone)]
pub struct Inbound {
    pub frame: Bytes,
    pub from_neighbor: Option<NodeId>,
}

/// The message substrate as the node sees it: best-effort sends, an
/// idempotent close. The receive side is not part of the trait; a transport
/// hands the node a single-owner `tokio::sync::mpsc::Receiver<Inbound>`
/// stream when it is built.
///
/// Send failures are not fatal anywhere in the control plane; the caller
/// logs and moves on, and the periodic HELLO/LSA refresh repairs the view.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_unicast(&self, neighbor: &str, frame: Bytes) -> Result<(), TransportError>;

    /// Fan-out to all neighbours; substrate-dependent (a broker publish, or
    /// one write per live link).
    async fn send_broadcast(&self, frame: Bytes) -> Result<(), TransportError>;

    async fn close(&self);
}
