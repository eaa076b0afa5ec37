// src/analysis/mod.rs
//
// Per-frame analysis stages.
//
// Signal flow:
//   FrameDetections → person_tracker ──→ possession ──┬→ play_state → travel / double_dribble
//                                                     │              pass / interception
//   selected ball ────────────────────────────────────┴→ shot_detector → shot
//
// Orchestrated by pipeline::session::SessionState.

pub mod person_tracker;
pub mod play_state;
pub mod possession;
pub mod shot_detector;

pub use person_tracker::{PersonTrack, PersonTracker, TrackedPerson, TrackerConfig};
pub use play_state::{EpisodePhase, PlayConfig, PlayStateMachine, PossessionEpisode};
pub use possession::{
    select_ball, Candidate, PossessionConfig, PossessionOutcome, PossessionResolver,
    PossessionTransition,
};
pub use shot_detector::{ShotConfig, ShotDetector};
