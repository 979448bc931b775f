//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources handed to every handler and relay session.

use crate::config::{Config, RelaySettings};
use parley_core::LiveConnector;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub settings: Arc<RelaySettings>,
    pub connector: Arc<dyn LiveConnector>,
}
