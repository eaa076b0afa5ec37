// src/error.rs

use crate::pipeline::session::{SessionId, SessionMode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Structurally invalid frame; the frame is rejected, the session continues.
    #[error("malformed frame{}: {reason}", fmt_index(.frame_index))]
    MalformedFrame {
        frame_index: Option<u64>,
        reason: String,
    },

    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("session {session} is not a {expected:?} session")]
    ModeMismatch {
        session: SessionId,
        expected: SessionMode,
    },

    #[error("event at {timestamp:.3}s appended after {last:.3}s")]
    EventOrder { timestamp: f64, last: f64 },
}

fn fmt_index(index: &Option<u64>) -> String {
    match index {
        Some(i) => format!(" #{}", i),
        None => String::new(),
    }
}

impl EngineError {
    pub fn malformed(frame_index: Option<u64>, reason: impl Into<String>) -> Self {
        Self::MalformedFrame {
            frame_index,
            reason: reason.into(),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    pub fn is_malformed_frame(&self) -> bool {
        matches!(self, Self::MalformedFrame { .. })
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
