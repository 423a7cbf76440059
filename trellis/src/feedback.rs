use thiserror::Error;

/// Errors produced while decoding frames off the wire.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Invalid JSON, a missing required field, or a field of the wrong type.
    #[error("malformed packet: {reason}")]
    MalformedPacket { reason: String },
}

/// Errors produced by a transport implementation. None of these are fatal to
/// the control plane; the router logs them and keeps going.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("transport i/o failure: {0}")]
    Io(#[from] std::io::Error),
    /// The neighbour has no live link right now.
    #[error("no link to neighbour {0}")]
    LinkDown(String),
}

/// Errors produced while interpreting configuration documents.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("expected a \"{expected}\" document, got \"{got}\"")]
    WrongKind { expected: &'static str, got: String },
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("node {0} is not present in the names document")]
    UnknownNode(String),
}

/// Why an inbound packet was dropped. Drops are local and silent from the
/// peer's perspective; the periodic HELLO/LSA refresh re-converges the mesh.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DropReason {
    #[error("malformed packet")]
    MalformedPacket,
    #[error("duplicate message id")]
    DuplicateMessage,
    #[error("stale or duplicate LSA")]
    StaleOrDuplicateLsa,
    #[error("LSA origin does not match sender")]
    SpoofedLsa,
    #[error("own id present in path window")]
    PathLoop,
    #[error("ttl expired")]
    TtlExpired,
    #[error("no route to destination")]
    NoRoute,
}
