// src/pipeline/live.rs
//
// Live-mode runner: one tokio task per session owns its SessionState.
//
// Frames reach the task through a bounded queue. `offer` never waits: a
// full queue drops the frame and counts it. Dropped frames never reach the
// session, so possession windows are delayed by them, never advanced.
//
// Stop travels through the same queue, so frames already queued are
// processed before the session is finalized. Dropping the handle aborts
// the task and releases the session without a report.

use super::metrics::SessionMetrics;
use super::session::{FrameDelta, SessionId, SessionMode, SessionReport, SessionState};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::types::RawFrame;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type DeltaReceiver = mpsc::UnboundedReceiver<Result<FrameDelta>>;

enum Command {
    Frame(RawFrame),
    Stop(oneshot::Sender<SessionReport>),
}

pub struct LiveSession {
    id: SessionId,
    commands: mpsc::Sender<Command>,
    metrics: SessionMetrics,
    task: Option<JoinHandle<()>>,
}

impl LiveSession {
    /// Starts the session task. Every processed frame produces one item on
    /// the returned receiver; it closes once the session ends.
    pub fn spawn(config: EngineConfig, queue_capacity: usize) -> Result<(Self, DeltaReceiver)> {
        if queue_capacity == 0 {
            return Err(EngineError::invalid_config("live.queue_capacity must be >= 1"));
        }
        let id = Uuid::new_v4();
        let metrics = SessionMetrics::new();
        let state = SessionState::new(id, SessionMode::Live, config)?.with_metrics(metrics.clone());

        let (cmd_tx, cmd_rx) = mpsc::channel(queue_capacity);
        let (delta_tx, delta_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_session(state, cmd_rx, delta_tx));
        info!("Live session {} started (queue {})", id, queue_capacity);

        Ok((
            Self {
                id,
                commands: cmd_tx,
                metrics,
                task: Some(task),
            },
            delta_rx,
        ))
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    /// Queues a frame without waiting. Returns false if it was dropped.
    pub fn offer(&self, frame: RawFrame) -> bool {
        match self.commands.try_send(Command::Frame(frame)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.metrics.inc(&self.metrics.frames_dropped);
                warn!("Live session {}: queue full, frame dropped", self.id);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Queues a frame, waiting for space.
    pub async fn send(&self, frame: RawFrame) -> Result<()> {
        self.commands
            .send(Command::Frame(frame))
            .await
            .map_err(|_| EngineError::UnknownSession(self.id))
    }

    /// Processes what is already queued, then finalizes the session.
    pub async fn stop(mut self) -> Result<SessionReport> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Stop(reply_tx))
            .await
            .map_err(|_| EngineError::UnknownSession(self.id))?;
        let report = reply_rx
            .await
            .map_err(|_| EngineError::UnknownSession(self.id))?;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        Ok(report)
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Live session {} handle dropped, cancelling", self.id);
            task.abort();
        }
    }
}

async fn run_session(
    mut state: SessionState,
    mut commands: mpsc::Receiver<Command>,
    deltas: mpsc::UnboundedSender<Result<FrameDelta>>,
) {
    while let Some(cmd) = commands.recv().await {
        match cmd {
            Command::Frame(raw) => {
                // Receiver gone means nobody is listening; keep processing
                let _ = deltas.send(state.process_frame(raw));
            }
            Command::Stop(reply) => {
                let report = state.finalize(None);
                let _ = reply.send(report);
                return;
            }
        }
    }
    info!(
        "Live session {} disconnected after {} frames, state released",
        state.id(),
        state.frame_counter()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fixtures::{ball_row, frame_with, player};
    use crate::types::EventKind;

    #[tokio::test]
    async fn test_live_handoff_produces_pass() {
        let (session, mut deltas) = LiveSession::spawn(EngineConfig::default(), 64).unwrap();
        let people = || vec![player(200.0, Some(3)), player(300.0, Some(3))];
        for i in 0..10 {
            session
                .send(frame_with(i, people(), vec![ball_row(200.0, 250.0)]))
                .await
                .unwrap();
        }
        for i in 10..20 {
            session
                .send(frame_with(i, people(), vec![ball_row(300.0, 250.0)]))
                .await
                .unwrap();
        }
        let report = session.stop().await.unwrap();
        assert_eq!(report.metadata.frames_processed, 20);
        assert_eq!(report.summary.team_count(3, EventKind::Pass), 1);

        let mut seen = 0;
        let mut passes = 0;
        while let Some(delta) = deltas.recv().await {
            let delta = delta.unwrap();
            seen += 1;
            passes += delta.events.iter().filter(|e| e.kind == EventKind::Pass).count();
        }
        assert_eq!(seen, 20);
        assert_eq!(passes, 1);
    }

    #[tokio::test]
    async fn test_full_queue_drops_frames() {
        // current-thread runtime: the session task cannot run until we yield
        let (session, _deltas) = LiveSession::spawn(EngineConfig::default(), 1).unwrap();
        assert!(session.offer(frame_with(0, vec![], vec![])));
        assert!(!session.offer(frame_with(1, vec![], vec![])));
        assert!(!session.offer(frame_with(2, vec![], vec![])));

        let report = session.stop().await.unwrap();
        assert_eq!(report.metadata.frames_processed, 1);
        assert_eq!(report.metadata.frames_dropped, 2);
    }

    #[tokio::test]
    async fn test_malformed_frame_surfaces_as_delta_error() {
        let (session, mut deltas) = LiveSession::spawn(EngineConfig::default(), 4).unwrap();
        session.send(frame_with(3, vec![], vec![])).await.unwrap();
        session.send(frame_with(2, vec![], vec![])).await.unwrap();
        assert!(deltas.recv().await.unwrap().is_ok());
        let err = deltas.recv().await.unwrap().unwrap_err();
        assert!(err.is_malformed_frame());
        let report = session.stop().await.unwrap();
        assert_eq!(report.metadata.frames_rejected, 1);
    }

    #[tokio::test]
    async fn test_dropping_handle_cancels_session() {
        let (session, mut deltas) = LiveSession::spawn(EngineConfig::default(), 4).unwrap();
        session.send(frame_with(0, vec![], vec![])).await.unwrap();
        drop(session);
        // the task is gone, so the delta stream ends
        while deltas.recv().await.is_some() {}
    }

    #[tokio::test]
    async fn test_zero_capacity_rejected() {
        assert!(LiveSession::spawn(EngineConfig::default(), 0).is_err());
    }
}
