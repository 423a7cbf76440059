//! TCP mesh substrate: one listener, one outbound connection per neighbour,
//! length-delimited frames. Outbound links carry the neighbour's id as the
//! inbound label; frames on accepted connections arrive unlabelled because
//! nothing on a raw socket proves who is talking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;

use trellis::feedback::TransportError;
use trellis::packet::NodeId;
use trellis::transport::{Inbound, Transport};

/// Cadence for re-dialling neighbours we have no live link to.
const RETRY_INTERVAL: Duration = Duration::from_secs(15);

type Writer = FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>;

pub struct TcpMesh {
    peers: HashMap<NodeId, (String, u16)>,
    writers: Mutex<HashMap<NodeId, Writer>>,
    inbound_tx: mpsc::Sender<Inbound>,
    cancel: CancellationToken,
}

impl TcpMesh {
    /// Binds the listener, starts the accept and redial loops, and hands
    /// back the single-owner receive stream for the node.
    pub async fn start(
        bind: (String, u16),
        peers: HashMap<NodeId, (String, u16)>,
    ) -> Result<(Arc<TcpMesh>, mpsc::Receiver<Inbound>), TransportError> {
        let (inbound_tx, inbound_rx) = mpsc::channel(256);
        let listener = TcpListener::bind((bind.0.as_str(), bind.1)).await?;

        let mesh = Arc::new(TcpMesh {
            peers,
            writers: Mutex::new(HashMap::new()),
            inbound_tx,
            cancel: CancellationToken::new(),
        });

        tokio::spawn(accept_loop(
            listener,
            mesh.inbound_tx.clone(),
            mesh.cancel.clone(),
        ));
        tokio::spawn(connect_loop(mesh.clone()));
        Ok((mesh, inbound_rx))
    }

    /// Neighbours we currently hold a live outbound link to.
    pub async fn connected_peers(&self) -> Vec<NodeId> {
        self.writers.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl Transport for TcpMesh {
    async fn send_unicast(&self, neighbor: &str, frame: Bytes) -> Result<(), TransportError> {
        let mut writers = self.writers.lock().await;
        let Some(writer) = writers.get_mut(neighbor) else {
            return Err(TransportError::LinkDown(neighbor.to_owned()));
        };
        if let Err(e) = writer.send(frame).await {
            // drop the broken link; the redial loop will rebuild it
            writers.remove(neighbor);
            return Err(TransportError::Io(e));
        }
        Ok(())
    }

    async fn send_broadcast(&self, frame: Bytes) -> Result<(), TransportError> {
        let mut writers = self.writers.lock().await;
        let mut broken = Vec::new();
        for (peer, writer) in writers.iter_mut() {
            if let Err(e) = writer.send(frame.clone()).await {
                warn!("broadcast to {peer} failed: {e}");
                broken.push(peer.clone());
            }
        }
        for peer in broken {
            writers.remove(&peer);
        }
        Ok(())
    }

    async fn close(&self) {
        self.cancel.cancel();
        self.writers.lock().await.clear();
    }
}

async fn accept_loop(
    listener: TcpListener,
    inbound_tx: mpsc::Sender<Inbound>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    debug!("accepted connection from {addr}");
                    let (read, _write) = stream.into_split();
                    tokio::spawn(read_frames(read, None, inbound_tx.clone(), cancel.clone()));
                }
                Err(e) => {
                    warn!("accept failed: {e}");
                    sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}

async fn connect_loop(mesh: Arc<TcpMesh>) {
    loop {
        for (peer, (host, port)) in &mesh.peers {
            if mesh.cancel.is_cancelled() {
                return;
            }
            if mesh.writers.lock().await.contains_key(peer) {
                continue;
            }
            match TcpStream::connect((host.as_str(), *port)).await {
                Ok(stream) => {
                    let (read, write) = stream.into_split();
                    mesh.writers
                        .lock()
                        .await
                        .insert(peer.clone(), FramedWrite::new(write, LengthDelimitedCodec::new()));
                    info!("connected to neighbour {peer} at {host}:{port}");
                    tokio::spawn(read_frames(
                        read,
                        Some(peer.clone()),
                        mesh.inbound_tx.clone(),
                        mesh.cancel.clone(),
                    ));
                }
                Err(e) => debug!("neighbour {peer} unreachable: {e}"),
            }
        }
        tokio::select! {
            _ = mesh.cancel.cancelled() => break,
            _ = sleep(RETRY_INTERVAL) => {}
        }
    }
}

async fn read_frames(
    read: OwnedReadHalf,
    label: Option<NodeId>,
    inbound_tx: mpsc::Sender<Inbound>,
    cancel: CancellationToken,
) {
    let mut frames = FramedRead::new(read, LengthDelimitedCodec::new());
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = frames.next() => match frame {
                Some(Ok(bytes)) => {
                    let inbound = Inbound {
                        frame: bytes.freeze(),
                        from_neighbor: label.clone(),
                    };
                    if inbound_tx.send(inbound).await.is_err() {
                        break; // node is gone
                    }
                }
                Some(Err(e)) => {
                    warn!("link error{}: {e}", label_suffix(&label));
                    break;
                }
                None => {
                    debug!("link closed{}", label_suffix(&label));
                    break;
                }
            }
        }
    }
}

fn label_suffix(label: &Option<NodeId>) -> String {
    label
        .as_ref()
        .map(|l| format!(" on link to {l}"))
        .unwrap_or_default()
}
