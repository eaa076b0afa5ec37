// src/pipeline/store.rs
//
// Session control surface: start / feed_frame / run_batch / stop / status.
// Sessions never share state; the store only maps ids to owned sessions.

use super::session::{FrameDelta, SessionId, SessionMode, SessionReport, SessionState, SessionStatus};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::types::RawFrame;
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Default)]
pub struct SessionStore {
    sessions: HashMap<SessionId, SessionState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, mode: SessionMode, config: EngineConfig) -> Result<SessionId> {
        let id = Uuid::new_v4();
        let state = SessionState::new(id, mode, config)?;
        self.sessions.insert(id, state);
        info!("Session {} started ({:?})", id, mode);
        Ok(id)
    }

    /// Live sessions only. A malformed frame is returned as an error and
    /// the session stays usable.
    pub fn feed_frame(&mut self, id: SessionId, raw: RawFrame) -> Result<FrameDelta> {
        let state = self.get_mut(id)?;
        if state.mode() != SessionMode::Live {
            return Err(EngineError::ModeMismatch {
                session: id,
                expected: SessionMode::Live,
            });
        }
        state.process_frame(raw)
    }

    /// Processes every frame in order, then stops the session. Rejected
    /// frames are logged and counted, never fatal.
    pub fn run_batch(
        &mut self,
        id: SessionId,
        frames: impl IntoIterator<Item = RawFrame>,
        output_ref: Option<String>,
    ) -> Result<SessionReport> {
        if self.get_mut(id)?.mode() != SessionMode::Batch {
            return Err(EngineError::ModeMismatch {
                session: id,
                expected: SessionMode::Batch,
            });
        }
        let mut state = self
            .sessions
            .remove(&id)
            .ok_or(EngineError::UnknownSession(id))?;

        for raw in frames {
            if let Err(e) = state.process_frame(raw) {
                if !e.is_malformed_frame() {
                    warn!("session {}: frame skipped: {}", id, e);
                }
            }
        }
        Ok(state.finalize(output_ref))
    }

    /// Ends the session; later calls with this id fail with `UnknownSession`.
    pub fn stop(&mut self, id: SessionId) -> Result<SessionReport> {
        let state = self
            .sessions
            .remove(&id)
            .ok_or(EngineError::UnknownSession(id))?;
        Ok(state.finalize(None))
    }

    pub fn status(&self, id: SessionId) -> Result<SessionStatus> {
        self.sessions
            .get(&id)
            .map(SessionState::status)
            .ok_or(EngineError::UnknownSession(id))
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn get_mut(&mut self, id: SessionId) -> Result<&mut SessionState> {
        self.sessions
            .get_mut(&id)
            .ok_or(EngineError::UnknownSession(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fixtures::{ball_row, frame_with, player};
    use crate::types::EventKind;

    #[test]
    fn test_start_rejects_bad_config() {
        let mut store = SessionStore::new();
        let mut cfg = EngineConfig::default();
        cfg.possession.max_wrist_distance = -1.0;
        assert!(matches!(
            store.start(SessionMode::Live, cfg),
            Err(EngineError::InvalidConfig(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_live_lifecycle() {
        let mut store = SessionStore::new();
        let id = store.start(SessionMode::Live, EngineConfig::default()).unwrap();
        for i in 0..5 {
            store
                .feed_frame(id, frame_with(i, vec![player(200.0, Some(0))], vec![ball_row(200.0, 250.0)]))
                .unwrap();
        }
        let status = store.status(id).unwrap();
        assert!(status.running);
        assert_eq!(status.frame_counter, 5);
        assert!(status.last_events.is_empty());

        let report = store.stop(id).unwrap();
        assert_eq!(report.session_id, id);
        assert_eq!(report.metadata.mode, SessionMode::Live);
        assert_eq!(report.metadata.frames_processed, 5);

        assert!(matches!(store.status(id), Err(EngineError::UnknownSession(_))));
        assert!(matches!(
            store.feed_frame(id, frame_with(6, vec![], vec![])),
            Err(EngineError::UnknownSession(_))
        ));
        assert!(store.stop(id).is_err());
    }

    #[test]
    fn test_batch_session_refuses_feed_frame() {
        let mut store = SessionStore::new();
        let id = store.start(SessionMode::Batch, EngineConfig::default()).unwrap();
        let err = store.feed_frame(id, frame_with(0, vec![], vec![])).unwrap_err();
        assert!(matches!(err, EngineError::ModeMismatch { expected: SessionMode::Live, .. }));
        assert!(store.contains(id));
    }

    #[test]
    fn test_run_batch_skips_malformed_and_finishes() {
        let mut store = SessionStore::new();
        let id = store.start(SessionMode::Batch, EngineConfig::default()).unwrap();
        let people = || vec![player(200.0, Some(0)), player(500.0, Some(0))];
        let mut frames = Vec::new();
        for i in 0..10 {
            frames.push(frame_with(i, people(), vec![ball_row(200.0, 250.0)]));
        }
        // replayed frame in the middle of the stream
        frames.push(frame_with(9, people(), vec![ball_row(200.0, 250.0)]));
        for i in 10..20 {
            frames.push(frame_with(i, people(), vec![ball_row(500.0, 250.0)]));
        }

        let report = store
            .run_batch(id, frames, Some("reports/game.events.json".to_string()))
            .unwrap();
        assert_eq!(report.metadata.frames_processed, 20);
        assert_eq!(report.metadata.frames_rejected, 1);
        assert_eq!(report.summary.count(EventKind::Pass), 1);
        assert_eq!(report.summary.team_count(0, EventKind::Pass), 1);
        assert!(!store.contains(id));
    }

    #[test]
    fn test_run_batch_on_live_session_is_mismatch() {
        let mut store = SessionStore::new();
        let id = store.start(SessionMode::Live, EngineConfig::default()).unwrap();
        assert!(matches!(
            store.run_batch(id, Vec::new(), None),
            Err(EngineError::ModeMismatch { expected: SessionMode::Batch, .. })
        ));
        assert!(store.contains(id));
    }

    #[test]
    fn test_sessions_are_independent() {
        let mut store = SessionStore::new();
        let a = store.start(SessionMode::Live, EngineConfig::default()).unwrap();
        let b = store.start(SessionMode::Live, EngineConfig::default()).unwrap();
        store.feed_frame(a, frame_with(0, vec![], vec![])).unwrap();
        assert!(store.feed_frame(a, frame_with(0, vec![], vec![])).is_err());
        // same index is fine in another session
        store.feed_frame(b, frame_with(0, vec![], vec![])).unwrap();
        store.stop(a).unwrap();
        assert_eq!(store.status(b).unwrap().frame_counter, 1);
        assert_eq!(store.len(), 1);
    }
}
