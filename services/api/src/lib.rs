//! Parley API Library Crate
//!
//! This library contains the relay service: configuration, application state,
//! HTTP handlers, routing, and the WebSocket session relay. The binaries are
//! thin wrappers around it.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
