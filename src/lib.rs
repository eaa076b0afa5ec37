// src/lib.rs
//
// Basketball event detection over per-frame ball and pose detections.
//
// Frames flow through detection → analysis → pipeline; see
// pipeline::session for the per-frame order.

pub mod analysis;
pub mod batch;
pub mod config;
pub mod detection;
pub mod error;
pub mod pipeline;
pub mod types;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use pipeline::{LiveSession, SessionMode, SessionReport, SessionStore};
pub use types::{Config, EventKind, GameEvent, RawFrame};
