// src/pipeline/session.rs
//
// One analysis session: owns every per-session stage and runs a frame
// through them in a fixed order.
//
//   RawFrame → normalize → select ball → jump filter → track people
//            → resolve possession → shot detector → play state → event log
//
// A frame is fully processed before the next one is looked at. A frame the
// normalizer rejects leaves every stage untouched.

use super::event_log::{EventLog, SessionStats};
use super::metrics::{MetricsSummary, SessionMetrics};
use crate::analysis::{
    select_ball, PersonTracker, PlayStateMachine, PossessionEpisode, PossessionResolver,
    ShotDetector,
};
use crate::config::EngineConfig;
use crate::detection::{AcceptedFrame, BallJumpFilter, FrameNormalizer};
use crate::error::Result;
use crate::types::{GameEvent, RawFrame, TrackId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type SessionId = Uuid;

/// Events returned by `status`.
pub const STATUS_RECENT_EVENTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Live,
    Batch,
}

/// Result of one processed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDelta {
    pub frame_index: u64,
    pub timestamp: f64,
    pub events: Vec<GameEvent>,
    pub holder: Option<TrackId>,
    pub pending_holder: Option<TrackId>,
    pub ball_detected: bool,
    pub people_detected: usize,
    pub holding_frames: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub running: bool,
    pub mode: SessionMode,
    pub frame_counter: u64,
    pub last_events: Vec<GameEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub mode: SessionMode,
    pub frames_processed: u64,
    pub frames_rejected: u64,
    pub frames_dropped: u64,
    pub tracks_created: u64,
    /// Stream time between the first and last accepted frame
    pub duration_secs: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_ref: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub metrics: MetricsSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub events: Vec<GameEvent>,
    pub summary: SessionStats,
    pub metadata: ReportMetadata,
}

pub struct SessionState {
    id: SessionId,
    mode: SessionMode,
    normalizer: FrameNormalizer,
    ball_filter: BallJumpFilter,
    tracker: PersonTracker,
    resolver: PossessionResolver,
    play: PlayStateMachine,
    shot: ShotDetector,
    log: EventLog,
    first_accepted: Option<AcceptedFrame>,
    last_accepted: Option<AcceptedFrame>,
    frame_counter: u64,
    metrics: SessionMetrics,
}

impl SessionState {
    /// Rejects an invalid configuration before any frame is accepted.
    pub fn new(id: SessionId, mode: SessionMode, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let EngineConfig {
            detection,
            tracker,
            possession,
            play,
            shot,
        } = config;
        Ok(Self {
            id,
            mode,
            ball_filter: BallJumpFilter::new(detection.max_ball_step),
            normalizer: FrameNormalizer::new(detection),
            tracker: PersonTracker::new(tracker),
            resolver: PossessionResolver::new(possession),
            play: PlayStateMachine::new(play),
            shot: ShotDetector::new(shot),
            log: EventLog::new(),
            first_accepted: None,
            last_accepted: None,
            frame_counter: 0,
            metrics: SessionMetrics::new(),
        })
    }

    /// Shares counters with an outside handle (the live runner).
    pub fn with_metrics(mut self, metrics: SessionMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn current_episode(&self) -> Option<&PossessionEpisode> {
        self.play.episode()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn process_frame(&mut self, raw: RawFrame) -> Result<FrameDelta> {
        self.metrics.inc(&self.metrics.frames_received);

        let frame = match self.normalizer.normalize(raw, self.last_accepted) {
            Ok(f) => f,
            Err(e) => {
                self.metrics.inc(&self.metrics.frames_rejected);
                warn!("session {}: {}", self.id, e);
                return Err(e);
            }
        };
        let accepted = AcceptedFrame {
            frame_index: frame.frame_index,
            timestamp: frame.timestamp,
        };
        self.first_accepted.get_or_insert(accepted);
        self.last_accepted = Some(accepted);
        self.frame_counter += 1;

        let ball = self
            .ball_filter
            .accept(select_ball(&frame.ball_boxes), frame.frame_index);
        let people = self.tracker.update(&frame);
        let outcome = self.resolver.update(ball, &people);

        let mut events = Vec::new();
        if let Some(shot) = self.shot.update(&frame, &outcome) {
            events.push(shot);
        }
        events.extend(self.play.update(
            &frame,
            &outcome,
            &self.tracker,
            self.shot.frames_since_shot(),
        ));
        // A finished bounce proves the holder still has the ball
        if let Some(holder) = self.play.completed_dribble_at(frame.frame_index) {
            self.resolver.renew(holder);
        }

        for ev in &events {
            self.log.append(ev.clone())?;
        }

        self.metrics.inc(&self.metrics.frames_processed);
        self.metrics
            .add(&self.metrics.events_emitted, events.len() as u64);
        self.metrics
            .set(&self.metrics.tracks_created, self.tracker.total_created());

        debug!(
            "session {} frame {}: ball={} people={} holder={:?} events={}",
            self.id,
            frame.frame_index,
            ball.is_some(),
            people.len(),
            outcome.holder,
            events.len()
        );

        Ok(FrameDelta {
            frame_index: frame.frame_index,
            timestamp: frame.timestamp,
            events,
            holder: outcome.holder,
            pending_holder: outcome.pending.map(|(id, _)| id),
            ball_detected: ball.is_some(),
            people_detected: people.len(),
            holding_frames: self.play.episode().map(|e| e.holding_frame_count),
        })
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            running: true,
            mode: self.mode,
            frame_counter: self.frame_counter,
            last_events: self.log.recent(STATUS_RECENT_EVENTS).to_vec(),
        }
    }

    /// Ends the session. The open episode is discarded without a closing
    /// event and all tracking state is released with `self`.
    pub fn finalize(mut self, output_ref: Option<String>) -> SessionReport {
        self.play.flush();
        self.resolver.reset();
        self.shot.reset();
        self.ball_filter.reset();
        self.tracker.clear();

        let metrics = self.metrics.summary();
        let duration_secs = match (self.first_accepted, self.last_accepted) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        };
        let snapshot = self.log.into_snapshot();

        info!(
            "Session {} finalized: {} frames, {} events, {} rejected, {} dropped",
            self.id,
            metrics.frames_processed,
            snapshot.summary.total_events,
            metrics.frames_rejected,
            metrics.frames_dropped
        );

        SessionReport {
            session_id: self.id,
            events: snapshot.events,
            summary: snapshot.summary,
            metadata: ReportMetadata {
                mode: self.mode,
                frames_processed: metrics.frames_processed,
                frames_rejected: metrics.frames_rejected,
                frames_dropped: metrics.frames_dropped,
                tracks_created: metrics.tracks_created,
                duration_secs,
                output_ref,
                generated_at: Utc::now(),
                metrics,
            },
        }
    }
}
