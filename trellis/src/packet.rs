use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::feedback::CodecError;

/// Address of a node on the routing network. Must be unique mesh-wide.
pub type NodeId = String;

/// Destination marker for packets addressed to every neighbour.
pub const BROADCAST: &str = "broadcast";

/// Forwarders recorded in the `path` header, newest last.
pub const PATH_WINDOW: usize = 3;

/// Wire values of the `type` field.
pub mod kind {
    pub const HELLO: &str = "hello";
    pub const INFO: &str = "info";
    /// Alias for [`INFO`] accepted on receipt.
    pub const LSA: &str = "lsa";
    pub const MESSAGE: &str = "message";
    pub const ECHO: &str = "echo";
    pub const ECHO_REPLY: &str = "echo_reply";
}

/// A control-plane message.
///
/// The wire encoding is a single UTF-8 JSON object. `proto`, `type`, `from`,
/// `to` and `ttl` are required on receipt; `headers` and `payload` default to
/// empty. Header keys and top-level keys we do not recognize are carried
/// through untouched so newer nodes can flood through older ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub proto: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub from: NodeId,
    pub to: NodeId,
    pub ttl: u32,
    #[serde(default)]
    pub headers: Map<String, Value>,
    #[serde(default)]
    pub payload: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Packet {
    pub fn new(proto: &str, kind: &str, from: &str, to: &str, ttl: u32) -> Packet {
        Packet {
            proto: proto.to_owned(),
            kind: kind.to_owned(),
            from: from.to_owned(),
            to: to.to_owned(),
            ttl,
            headers: Map::new(),
            payload: String::new(),
            extra: Map::new(),
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Packet {
        self.payload = payload.into();
        self
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(|e| CodecError::MalformedPacket {
            reason: e.to_string(),
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Packet, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::MalformedPacket {
            reason: e.to_string(),
        })
    }

    /// The stable message id, if one has been assigned and is non-empty.
    pub fn msg_id(&self) -> Option<&str> {
        self.headers
            .get("msg_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Assigns a fresh unique id unless one is already present. The id is
    /// never mutated after first transmission.
    pub fn ensure_msg_id(&mut self) -> String {
        if let Some(id) = self.msg_id() {
            return id.to_owned();
        }
        let id = Uuid::new_v4().simple().to_string();
        self.headers
            .insert("msg_id".to_owned(), Value::String(id.clone()));
        id
    }

    /// The `path` header as a list of node ids, empty when absent or of the
    /// wrong shape.
    pub fn path(&self) -> Vec<NodeId> {
        self.headers
            .get("path")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_path(&mut self, path: &[NodeId]) {
        let items = path.iter().cloned().map(Value::String).collect();
        self.headers.insert("path".to_owned(), Value::Array(items));
    }

    pub fn is_broadcast(&self) -> bool {
        self.to == BROADCAST
    }

    /// Decrements the hop budget. Returns true while the packet may still be
    /// forwarded (`ttl > 0` after the decrement).
    pub fn decrement_ttl(&mut self) -> bool {
        self.ttl = self.ttl.saturating_sub(1);
        self.ttl > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Packet {
        let mut pkt = Packet::new("lsr", kind::MESSAGE, "A", "D", 5).with_payload("HOLA D");
        pkt.ensure_msg_id();
        pkt.set_path(&["B".into(), "C".into()]);
        pkt
    }

    #[test]
    fn round_trip() {
        let pkt = sample();
        let decoded = Packet::decode(&pkt.encode().unwrap()).unwrap();
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn wire_field_names() {
        let bytes = sample().encode().unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["type"], "message");
        assert_eq!(v["from"], "A");
        assert_eq!(v["to"], "D");
        assert!(v["ttl"].is_u64());
        assert!(v["headers"]["path"].is_array());
    }

    #[test]
    fn decode_rejects_missing_required_fields() {
        // no ttl
        let err = Packet::decode(br#"{"proto":"lsr","type":"hello","from":"A","to":"B"}"#);
        assert!(err.is_err());
        // no proto
        let err = Packet::decode(br#"{"type":"hello","from":"A","to":"B","ttl":5}"#);
        assert!(err.is_err());
        // ttl of the wrong type
        let err = Packet::decode(br#"{"proto":"lsr","type":"hello","from":"A","to":"B","ttl":"5"}"#);
        assert!(err.is_err());
        // negative ttl never fits a hop budget
        let err = Packet::decode(br#"{"proto":"lsr","type":"hello","from":"A","to":"B","ttl":-1}"#);
        assert!(err.is_err());
        // not json at all
        assert!(Packet::decode(b"not json").is_err());
    }

    #[test]
    fn decode_defaults_headers_and_payload() {
        let pkt =
            Packet::decode(br#"{"proto":"lsr","type":"hello","from":"A","to":"B","ttl":5}"#)
                .unwrap();
        assert!(pkt.headers.is_empty());
        assert_eq!(pkt.payload, "");
    }

    #[test]
    fn unknown_keys_survive_a_forward() {
        let raw = br#"{"proto":"lsr","type":"message","from":"A","to":"D","ttl":5,
            "headers":{"msg_id":"m1","x-trace":"t9"},"payload":"hi","vendor":42}"#;
        let mut pkt = Packet::decode(raw).unwrap();
        pkt.decrement_ttl();
        let v: serde_json::Value = serde_json::from_slice(&pkt.encode().unwrap()).unwrap();
        assert_eq!(v["headers"]["x-trace"], "t9");
        assert_eq!(v["vendor"], 42);
        assert_eq!(v["ttl"], 4);
    }

    #[test]
    fn ensure_msg_id_is_stable() {
        let mut pkt = Packet::new("lsr", kind::HELLO, "A", BROADCAST, 5);
        assert!(pkt.msg_id().is_none());
        let id = pkt.ensure_msg_id();
        assert_eq!(pkt.ensure_msg_id(), id);

        // an empty id counts as missing
        pkt.headers
            .insert("msg_id".to_owned(), json!(""));
        assert!(pkt.msg_id().is_none());
        assert_ne!(pkt.ensure_msg_id(), "");
    }

    #[test]
    fn ttl_never_goes_negative() {
        let mut pkt = Packet::new("lsr", kind::MESSAGE, "A", "B", 1);
        assert!(!pkt.decrement_ttl());
        assert_eq!(pkt.ttl, 0);
        assert!(!pkt.decrement_ttl());
        assert_eq!(pkt.ttl, 0);
    }
}
