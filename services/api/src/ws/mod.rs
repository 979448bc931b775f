//! WebSocket Relay
//!
//! Everything needed to relay one client WebSocket to one upstream live
//! session:
//!
//! - `protocol`: the JSON frames exchanged with the client.
//! - `lifecycle`: the session state shared by the inbound and outbound loops.
//! - `session`: the relay session itself, including the response demultiplexer.
//! - `gateway`: the Axum upgrade handler and the per-connection loops.

pub mod gateway;
pub mod lifecycle;
pub mod protocol;
pub mod session;

#[cfg(test)]
mod fake;

pub use gateway::ws_handler;
