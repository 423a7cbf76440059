//! Control plane for a small routed mesh: a flooding transport discipline
//! and a link-state routing engine, driven by a per-node orchestrator over a
//! pluggable message substrate.
//!
//! The strategy and router layers are pure state machines (no I/O, no clock
//! access); [`node`] wraps them in an async runtime over a [`transport`]
//! capability. The demo binary lives in the `trellis-mesh` crate.

pub mod config;
pub mod feedback;
pub mod node;
pub mod packet;
pub mod router;
pub mod seen;
pub mod spf;
pub mod strategy;
pub mod transport;
pub mod util;
