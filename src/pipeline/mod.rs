// src/pipeline/mod.rs

pub mod event_log;
pub mod live;
pub mod metrics;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod fixtures;

pub use event_log::{EventLog, EventSnapshot, SessionStats};
pub use live::{DeltaReceiver, LiveSession};
pub use metrics::{MetricsSummary, SessionMetrics};
pub use session::{
    FrameDelta, ReportMetadata, SessionId, SessionMode, SessionReport, SessionState,
    SessionStatus,
};
pub use store::SessionStore;
