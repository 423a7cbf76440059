use std::collections::BTreeMap;

use serde::Deserialize;

use crate::feedback::ConfigError;
use crate::packet::NodeId;

/// Link cost used when the topology document carries no weights.
pub const DEFAULT_COST: u32 = 1;

/// The `{"type": "topo", "config": {...}}` document: unweighted adjacency,
/// node id -> direct neighbour ids.
#[derive(Debug, Clone, Deserialize)]
pub struct TopologyDoc {
    #[serde(rename = "type")]
    pub kind: String,
    pub config: BTreeMap<NodeId, Vec<NodeId>>,
}

/// The `{"type": "names", "config": {...}}` document: node id -> endpoint
/// binding consumed by the transport.
#[derive(Debug, Clone, Deserialize)]
pub struct NamesDoc {
    #[serde(rename = "type")]
    pub kind: String,
    pub config: BTreeMap<NodeId, Endpoint>,
}

/// Where a node can be reached. `Socket` is the TCP mesh binding; `Channel`
/// names a pub/sub channel for brokered substrates.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Endpoint {
    Socket { host: String, port: u16 },
    Channel { channel: String },
}

impl TopologyDoc {
    pub fn parse(text: &str) -> Result<TopologyDoc, ConfigError> {
        let doc: TopologyDoc = serde_json::from_str(text)?;
        if doc.kind != "topo" {
            return Err(ConfigError::WrongKind {
                expected: "topo",
                got: doc.kind,
            });
        }
        Ok(doc)
    }

    /// Direct neighbours of `id`, empty when the node is not listed.
    pub fn neighbors_of(&self, id: &str) -> Vec<NodeId> {
        self.config.get(id).cloned().unwrap_or_default()
    }
}

impl NamesDoc {
    pub fn parse(text: &str) -> Result<NamesDoc, ConfigError> {
        let doc: NamesDoc = serde_json::from_str(text)?;
        if doc.kind != "names" {
            return Err(ConfigError::WrongKind {
                expected: "names",
                got: doc.kind,
            });
        }
        Ok(doc)
    }

    pub fn endpoint_of(&self, id: &str) -> Result<&Endpoint, ConfigError> {
        self.config
            .get(id)
            .ok_or_else(|| ConfigError::UnknownNode(id.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_topology() {
        let doc = TopologyDoc::parse(
            r#"{"type":"topo","config":{"A":["B","D"],"B":["A","C"],"C":["B","D"],"D":["C","A"]}}"#,
        )
        .unwrap();
        assert_eq!(doc.neighbors_of("A"), vec!["B".to_owned(), "D".to_owned()]);
        assert!(doc.neighbors_of("Z").is_empty());
    }

    #[test]
    fn rejects_wrong_document_kind() {
        let err = TopologyDoc::parse(r#"{"type":"names","config":{}}"#);
        assert!(matches!(err, Err(ConfigError::WrongKind { .. })));
    }

    #[test]
    fn parses_socket_and_channel_names() {
        let doc = NamesDoc::parse(
            r#"{"type":"names","config":{
                "A":{"host":"127.0.0.1","port":4001},
                "B":{"channel":"mesh.b"}}}"#,
        )
        .unwrap();
        assert!(matches!(
            doc.endpoint_of("A").unwrap(),
            Endpoint::Socket { port: 4001, .. }
        ));
        assert!(matches!(
            doc.endpoint_of("B").unwrap(),
            Endpoint::Channel { .. }
        ));
        assert!(doc.endpoint_of("Z").is_err());
    }
}
