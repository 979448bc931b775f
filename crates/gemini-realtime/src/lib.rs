//! Gemini Live client implementing the `parley-core` live session traits.

pub mod client;
pub mod types;

pub use client::{GEMINI_LIVE_ENDPOINT, GeminiLiveConnector, GeminiLiveReceiver, GeminiLiveSender};
