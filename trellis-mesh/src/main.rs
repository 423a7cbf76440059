mod tcp;

use std::collections::HashMap;
use std::io::{stdin, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use log::{error, info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use tokio::sync::Mutex;

use trellis::config::{Endpoint, NamesDoc, TopologyDoc, DEFAULT_COST};
use trellis::node::{flush, Node, NodeHandle};
use trellis::packet::kind;
use trellis::router::Router;
use trellis::strategy::{DijkstraRouting, Flooding, LinkStateRouting, RoutingAlgorithm};
use trellis::util::unix_now;

use crate::tcp::TcpMesh;

#[derive(Parser)]
#[command(about = "A trellis mesh node over TCP links")]
struct Args {
    /// This node's id in the topology and names documents.
    #[arg(long)]
    id: String,
    #[arg(long, value_enum)]
    algorithm: Algorithm,
    /// Path to the topology document ({"type":"topo",...}).
    #[arg(long)]
    topo: PathBuf,
    /// Path to the names document ({"type":"names",...}).
    #[arg(long)]
    names: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum Algorithm {
    Flooding,
    Dijkstra,
    Lsr,
}

fn socket_of(endpoint: &Endpoint, id: &str) -> anyhow::Result<(String, u16)> {
    match endpoint {
        Endpoint::Socket { host, port } => Ok((host.clone(), *port)),
        Endpoint::Channel { .. } => {
            bail!("node {id} is bound to a pub/sub channel; the TCP mesh cannot reach it")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;
    let args = Args::parse();

    let topo_text = tokio::fs::read_to_string(&args.topo)
        .await
        .with_context(|| format!("reading {}", args.topo.display()))?;
    let topo = TopologyDoc::parse(&topo_text)?;
    let names_text = tokio::fs::read_to_string(&args.names)
        .await
        .with_context(|| format!("reading {}", args.names.display()))?;
    let names = NamesDoc::parse(&names_text)?;

    let algorithm: Box<dyn RoutingAlgorithm> = match args.algorithm {
        Algorithm::Flooding => Box::new(Flooding::new(&args.id)),
        Algorithm::Lsr => Box::new(LinkStateRouting::new(&args.id)),
        Algorithm::Dijkstra => {
            let mut dijkstra = DijkstraRouting::new(&args.id);
            dijkstra.set_topology(topo.config.clone());
            Box::new(dijkstra)
        }
    };

    let mut router = Router::new(&args.id, algorithm);
    let now = unix_now();
    for neighbor in topo.neighbors_of(&args.id) {
        router.add_neighbor(&neighbor, DEFAULT_COST, now);
    }

    let bind = socket_of(names.endpoint_of(&args.id)?, &args.id)?;
    let mut peers = HashMap::new();
    for neighbor in topo.neighbors_of(&args.id) {
        peers.insert(neighbor.clone(), socket_of(names.endpoint_of(&neighbor)?, &neighbor)?);
    }

    let (mesh, inbound) = TcpMesh::start(bind.clone(), peers).await?;
    let router = Arc::new(Mutex::new(router));
    let (node, handle) = Node::new(router.clone(), mesh.clone(), inbound);
    let node_task = tokio::spawn(node.run());

    info!(
        "node {} listening on {}:{}, running {}",
        args.id,
        bind.0,
        bind.1,
        router.lock().await.algorithm.name()
    );
    info!("type \"help\" for commands");

    command_loop(&args.id, &topo, router, mesh, handle).await;

    node_task.await?;
    Ok(())
}

async fn command_loop(
    id: &str,
    topo: &TopologyDoc,
    router: Arc<Mutex<Router<Box<dyn RoutingAlgorithm>>>>,
    mesh: Arc<TcpMesh>,
    handle: NodeHandle,
) {
    for line in stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        let split: Vec<&str> = line.split_whitespace().collect();
        if split.is_empty() {
            continue;
        }
        match split[0] {
            "help" => {
                info!(
                    r#"commands:
  send <destination> <message...> -- send a message
  echo <destination>              -- round-trip probe
  neighbors                       -- configured neighbours and link state
  routes                          -- forwarding table
  logs                            -- recent packet activity
  topology                        -- the configured adjacency
  path <destination>              -- full path (dijkstra only)
  debug                           -- algorithm internals
  quit                            -- stop the node"#
                );
            }
            "send" if split.len() >= 3 => {
                let dst = split[1];
                let message = split[2..].join(" ");
                {
                    let mut router = router.lock().await;
                    router.originate(kind::MESSAGE, dst, &message, unix_now());
                }
                flush(&router, mesh.as_ref()).await;
            }
            "echo" if split.len() == 2 => {
                {
                    let mut router = router.lock().await;
                    router.originate(kind::ECHO, split[1], "echo request", unix_now());
                }
                flush(&router, mesh.as_ref()).await;
            }
            "neighbors" => {
                let connected = mesh.connected_peers().await;
                let router = router.lock().await;
                for (neighbor, cost) in &router.neighbors {
                    let state = if connected.contains(neighbor) {
                        "connected"
                    } else {
                        "disconnected"
                    };
                    info!("  {neighbor} (cost {cost}): {state}");
                }
            }
            "routes" => {
                let router = router.lock().await;
                let table = router.algorithm.routing_table();
                if table.is_empty() {
                    info!("  (no routes)");
                }
                for (dst, hop) in table {
                    info!("  {dst} -> {hop}");
                }
            }
            "logs" => {
                let router = router.lock().await;
                for entry in router.packet_log.iter().rev().take(10).rev() {
                    info!("  {entry}");
                }
            }
            "topology" => {
                for (node, neighbors) in &topo.config {
                    let marker = if node == id { " (this node)" } else { "" };
                    info!("  {node}{marker}: {neighbors:?}");
                }
            }
            "path" if split.len() == 2 => {
                let router = router.lock().await;
                match router.algorithm.full_path(split[1]) {
                    Some(path) => info!("  {}", path.join(" -> ")),
                    None if router.algorithm.name() != "dijkstra" => {
                        info!("  path is only available for the dijkstra algorithm")
                    }
                    None => info!("  no path to {}", split[1]),
                }
            }
            "debug" => {
                let router = router.lock().await;
                info!("  {}", router.algorithm.summary());
            }
            "quit" => break,
            _ => error!("unknown command, type \"help\" for help"),
        }
    }
    // reached on quit and on stdin EOF alike
    handle.shutdown();
}
