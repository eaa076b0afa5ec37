// src/analysis/play_state.rs
//
// Per-possession rule engine. Consumes the resolver's transitions and the
// holder's body motion, emits travel / double-dribble / pass / interception.
//
// Episode lifecycle:
//   opening (resolver hysteresis) → open { Held ⇄ Dribbling } → closed
//
//   Held       ball in the holder's hand region; holding_frame_count grows
//   Dribbling  ball left the hand; a return within dribble_window_frames
//              after dropping at least dribble_min_drop px is one dribble,
//              which resets the continuous hold
//
// Closing an episode (handoff or lapse) drops all of its state. Violations
// fire at most once per episode.

use super::person_tracker::PersonTracker;
use super::possession::{PossessionOutcome, PossessionTransition};
use crate::types::{FrameDetections, GameEvent, Point, TeamId, TrackId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayConfig {
    /// Continuous-hold length (frames) after which moving is a travel and
    /// after which a finished dribble counts as stopped
    pub hold_threshold_frames: u32,
    /// Hip/knee displacement (px) during a hold that counts as moving
    pub movement_threshold: f32,
    /// Max frames the ball may be away from the hand for a dribble cycle
    pub dribble_window_frames: u32,
    /// Minimum downward travel (px) of the ball for a dribble cycle
    pub dribble_min_drop: f32,
    /// Interceptions this many frames after a shot are treated as
    /// rebounds and not reported. 0 disables the check.
    pub rebound_window_frames: u64,
}

impl Default for PlayConfig {
    fn default() -> Self {
        Self {
            hold_threshold_frames: 30,
            movement_threshold: 40.0,
            dribble_window_frames: 12,
            dribble_min_drop: 25.0,
            rebound_window_frames: 0,
        }
    }
}

// ============================================================================
// EPISODE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EpisodePhase {
    Held,
    Dribbling {
        frames_away: u32,
        release_y: f32,
        lowest_y: f32,
    },
}

#[derive(Debug, Clone)]
pub struct PossessionEpisode {
    pub holder: TrackId,
    pub team: Option<TeamId>,
    pub start_frame: u64,
    pub holding_frame_count: u32,
    pub dribble_count: u32,
    /// Frame on which the latest dribble cycle completed
    pub last_dribble_frame: Option<u64>,
    pub last_ball_centroid: Option<Point>,
    pub phase: EpisodePhase,
    /// Lower-body position where the current continuous hold started
    hold_anchor: Option<Point>,
    last_in_hand_y: Option<f32>,
    dribble_stopped: bool,
    travel_emitted: bool,
    double_dribble_emitted: bool,
}

impl PossessionEpisode {
    fn open(holder: TrackId, team: Option<TeamId>, frame: u64, anchor: Option<Point>, ball: Option<Point>) -> Self {
        Self {
            holder,
            team,
            start_frame: frame,
            holding_frame_count: 1,
            dribble_count: 0,
            last_dribble_frame: None,
            last_ball_centroid: ball,
            phase: EpisodePhase::Held,
            hold_anchor: anchor,
            last_in_hand_y: ball.map(|b| b.y),
            dribble_stopped: false,
            travel_emitted: false,
            double_dribble_emitted: false,
        }
    }

    pub fn travel_emitted(&self) -> bool {
        self.travel_emitted
    }

    pub fn double_dribble_emitted(&self) -> bool {
        self.double_dribble_emitted
    }
}

// ============================================================================
// STATE MACHINE
// ============================================================================

pub struct PlayStateMachine {
    config: PlayConfig,
    episode: Option<PossessionEpisode>,
}

impl PlayStateMachine {
    pub fn new(config: PlayConfig) -> Self {
        Self {
            config,
            episode: None,
        }
    }

    pub fn episode(&self) -> Option<&PossessionEpisode> {
        self.episode.as_ref()
    }

    /// Holder whose dribble cycle completed on `frame_index`, if any.
    pub fn completed_dribble_at(&self, frame_index: u64) -> Option<TrackId> {
        self.episode
            .as_ref()
            .filter(|ep| ep.last_dribble_frame == Some(frame_index))
            .map(|ep| ep.holder)
    }

    /// Advance one frame. `frames_since_shot` feeds the rebound filter.
    pub fn update(
        &mut self,
        frame: &FrameDetections,
        outcome: &PossessionOutcome,
        tracker: &PersonTracker,
        frames_since_shot: Option<u64>,
    ) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let ball = outcome.ball.map(|b| b.center());

        match outcome.transition {
            Some(PossessionTransition::Acquired { holder, .. }) => {
                let incoming_team = tracker.team_of(holder);
                if let Some(closed) = self.episode.take() {
                    if closed.holder != holder {
                        let outgoing_team = tracker.team_of(closed.holder).or(closed.team);
                        if let Some(ev) =
                            self.classify_handoff(frame, outgoing_team, incoming_team, frames_since_shot)
                        {
                            events.push(ev);
                        }
                    }
                }
                let anchor = current_lower_body(tracker, holder, frame.frame_index);
                self.episode = Some(PossessionEpisode::open(
                    holder,
                    incoming_team,
                    frame.frame_index,
                    anchor,
                    ball,
                ));
                return events;
            }
            Some(PossessionTransition::Lapsed { holder }) => {
                if let Some(closed) = self.episode.take() {
                    info!(
                        "Episode closed (lapse): P{} held {} frames, {} dribble(s)",
                        holder, closed.holding_frame_count, closed.dribble_count
                    );
                }
                return events;
            }
            None => {}
        }

        let Some(ep) = self.episode.as_mut() else {
            return events;
        };

        if let Some(team) = tracker.team_of(ep.holder) {
            ep.team = Some(team);
        }
        if ball.is_some() {
            ep.last_ball_centroid = ball;
        }
        let in_hand = outcome.in_hand_of(ep.holder);
        let lower_body = current_lower_body(tracker, ep.holder, frame.frame_index);

        match ep.phase {
            EpisodePhase::Held => {
                if in_hand {
                    ep.holding_frame_count += 1;
                    if let Some(b) = ball {
                        ep.last_in_hand_y = Some(b.y);
                    }
                    if ep.hold_anchor.is_none() {
                        ep.hold_anchor = lower_body;
                    }
                    if let Some(ev) = check_travel(&self.config, ep, lower_body, frame) {
                        events.push(ev);
                    }
                    if ep.dribble_count > 0
                        && !ep.dribble_stopped
                        && ep.holding_frame_count > self.config.hold_threshold_frames
                    {
                        debug!("P{} picked up the dribble", ep.holder);
                        ep.dribble_stopped = true;
                    }
                } else if let Some(b) = ball {
                    let release_y = ep.last_in_hand_y.unwrap_or(b.y);
                    ep.phase = EpisodePhase::Dribbling {
                        frames_away: 1,
                        release_y,
                        lowest_y: b.y.max(release_y),
                    };
                }
            }
            EpisodePhase::Dribbling {
                frames_away,
                release_y,
                lowest_y,
            } => {
                if in_hand {
                    let dropped = lowest_y - release_y;
                    if frames_away <= self.config.dribble_window_frames
                        && dropped >= self.config.dribble_min_drop
                    {
                        ep.dribble_count += 1;
                        ep.last_dribble_frame = Some(frame.frame_index);
                        ep.holding_frame_count = 0;
                        ep.hold_anchor = lower_body;
                        debug!(
                            "P{} dribble #{} ({:.0}px drop, {} frames)",
                            ep.holder, ep.dribble_count, dropped, frames_away
                        );
                        if ep.dribble_stopped && !ep.double_dribble_emitted {
                            ep.double_dribble_emitted = true;
                            info!(
                                "🏀 DOUBLE DRIBBLE: P{} at frame {}",
                                ep.holder, frame.frame_index
                            );
                            events.push(GameEvent::double_dribble(frame, ep.holder, ep.team));
                        }
                    } else {
                        // Caught back without a qualifying bounce; the hold continues
                        ep.holding_frame_count += 1;
                    }
                    if let Some(b) = ball {
                        ep.last_in_hand_y = Some(b.y);
                    }
                    ep.phase = EpisodePhase::Held;
                } else {
                    ep.phase = EpisodePhase::Dribbling {
                        frames_away: frames_away + 1,
                        release_y,
                        lowest_y: ball.map_or(lowest_y, |b| lowest_y.max(b.y)),
                    };
                }
            }
        }

        events
    }

    fn classify_handoff(
        &self,
        frame: &FrameDetections,
        outgoing: Option<TeamId>,
        incoming: Option<TeamId>,
        frames_since_shot: Option<u64>,
    ) -> Option<GameEvent> {
        match (outgoing, incoming) {
            (Some(a), Some(b)) if a == b => {
                info!("🏀 PASS: team {} at frame {}", a, frame.frame_index);
                Some(GameEvent::pass(frame, Some(a)))
            }
            (Some(_), Some(b)) => {
                let window = self.config.rebound_window_frames;
                if window > 0 && frames_since_shot.is_some_and(|n| n <= window) {
                    debug!(
                        "Possession change at frame {} treated as rebound",
                        frame.frame_index
                    );
                    return None;
                }
                info!("🏀 INTERCEPTION: team {} at frame {}", b, frame.frame_index);
                Some(GameEvent::interception(frame, b))
            }
            _ => {
                info!(
                    "🏀 PASS (team unknown) at frame {}",
                    frame.frame_index
                );
                Some(GameEvent::pass(frame, None))
            }
        }
    }

    /// Drops the open episode without emitting anything.
    pub fn flush(&mut self) {
        self.episode = None;
    }
}

fn current_lower_body(tracker: &PersonTracker, id: TrackId, frame_index: u64) -> Option<Point> {
    let track = tracker.get(id)?;
    if track.last_seen_frame != frame_index {
        return None;
    }
    track.lower_body()
}

fn check_travel(
    config: &PlayConfig,
    ep: &mut PossessionEpisode,
    lower_body: Option<Point>,
    frame: &FrameDetections,
) -> Option<GameEvent> {
    if ep.travel_emitted || ep.holding_frame_count <= config.hold_threshold_frames {
        return None;
    }
    let displacement = ep.hold_anchor?.distance(&lower_body?);
    if displacement <= config.movement_threshold {
        return None;
    }
    ep.travel_emitted = true;
    info!(
        "🏀 TRAVEL: P{} moved {:.0}px over a {}-frame hold (frame {})",
        ep.holder, displacement, ep.holding_frame_count, frame.frame_index
    );
    Some(GameEvent::travel(frame, ep.holder, ep.team))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::person_tracker::TrackerConfig;
    use crate::analysis::possession::{Candidate, PossessionConfig, PossessionResolver};
    use crate::types::{BallBox, EventKind, Keypoint, PersonDetection, NUM_LANDMARKS};

    /// Player whose torso/legs sit at (x, 300) with the left wrist at (x, 250).
    fn player(x: f32, team: Option<TeamId>) -> PersonDetection {
        let mut keypoints = [Keypoint {
            x,
            y: 300.0,
            confidence: 0.9,
        }; NUM_LANDMARKS];
        keypoints[9] = Keypoint {
            x,
            y: 250.0,
            confidence: 0.9,
        };
        keypoints[10] = Keypoint {
            x,
            y: 250.0,
            confidence: 0.0,
        };
        PersonDetection { keypoints, team }
    }

    fn ball_at(x: f32, y: f32) -> BallBox {
        BallBox {
            x1: x - 8.0,
            y1: y - 8.0,
            x2: x + 8.0,
            y2: y + 8.0,
            confidence: 0.9,
        }
    }

    struct Rig {
        tracker: PersonTracker,
        resolver: PossessionResolver,
        play: PlayStateMachine,
        index: u64,
        events: Vec<GameEvent>,
    }

    impl Rig {
        fn new(play: PlayConfig) -> Self {
            Self {
                tracker: PersonTracker::new(TrackerConfig::default()),
                resolver: PossessionResolver::new(PossessionConfig::default()),
                play: PlayStateMachine::new(play),
                index: 0,
                events: Vec::new(),
            }
        }

        fn step(&mut self, people: Vec<PersonDetection>, ball: Option<BallBox>) {
            let frame = FrameDetections {
                frame_index: self.index,
                timestamp: self.index as f64 / 30.0,
                ball_boxes: ball.into_iter().collect(),
                people,
            };
            self.index += 1;
            let seen = self.tracker.update(&frame);
            let outcome = self.resolver.update(ball, &seen);
            let evs = self.play.update(&frame, &outcome, &self.tracker, None);
            if let Some(holder) = self.play.completed_dribble_at(frame.frame_index) {
                self.resolver.renew(holder);
            }
            self.events.extend(evs);
        }

        fn kinds(&self) -> Vec<EventKind> {
            self.events.iter().map(|e| e.kind).collect()
        }
    }

    #[test]
    fn test_stationary_hold_is_not_travel() {
        let mut rig = Rig::new(PlayConfig::default());
        for _ in 0..120 {
            rig.step(vec![player(200.0, Some(1))], Some(ball_at(200.0, 250.0)));
        }
        assert!(rig.events.is_empty());
        assert_eq!(rig.play.episode().unwrap().holding_frame_count, 118);
    }

    #[test]
    fn test_travel_fires_once_per_episode() {
        let mut rig = Rig::new(PlayConfig::default());
        for i in 0..150 {
            let x = 200.0 + i as f32 * 2.0;
            rig.step(vec![player(x, Some(1))], Some(ball_at(x, 250.0)));
        }
        assert_eq!(rig.kinds(), vec![EventKind::Travel]);
        assert!(rig.play.episode().unwrap().travel_emitted());
        assert!(rig.events[0].description.contains("player 1 (team 1)"));
    }

    fn dribble(rig: &mut Rig, x: f32) {
        // ball leaves the hand for 3 frames 80px lower, then is caught
        for _ in 0..3 {
            rig.step(vec![player(x, Some(1))], Some(ball_at(x, 330.0)));
        }
        rig.step(vec![player(x, Some(1))], Some(ball_at(x, 250.0)));
    }

    #[test]
    fn test_dribble_resets_hold() {
        let mut rig = Rig::new(PlayConfig::default());
        for _ in 0..20 {
            rig.step(vec![player(200.0, Some(1))], Some(ball_at(200.0, 250.0)));
        }
        dribble(&mut rig, 200.0);
        let ep = rig.play.episode().unwrap();
        assert_eq!(ep.dribble_count, 1);
        assert_eq!(ep.holding_frame_count, 0);
        assert_eq!(ep.phase, EpisodePhase::Held);
    }

    #[test]
    fn test_double_dribble_after_pickup() {
        let mut rig = Rig::new(PlayConfig::default());
        for _ in 0..5 {
            rig.step(vec![player(200.0, Some(1))], Some(ball_at(200.0, 250.0)));
        }
        dribble(&mut rig, 200.0);
        dribble(&mut rig, 200.0);
        assert!(rig.events.is_empty(), "dribbling alone is legal");

        // pick the ball up past the hold threshold, then dribble again
        for _ in 0..40 {
            rig.step(vec![player(200.0, Some(1))], Some(ball_at(200.0, 250.0)));
        }
        dribble(&mut rig, 200.0);
        dribble(&mut rig, 200.0);
        assert_eq!(rig.kinds(), vec![EventKind::DoubleDribble]);
    }

    #[test]
    fn test_long_dribble_keeps_episode() {
        let mut rig = Rig::new(PlayConfig::default());
        for _ in 0..5 {
            rig.step(vec![player(200.0, Some(1))], Some(ball_at(200.0, 250.0)));
        }
        let start = rig.play.episode().unwrap().start_frame;
        for n in 1..=10 {
            dribble(&mut rig, 200.0);
            let ep = rig.play.episode().expect("episode lapsed mid-dribble");
            assert_eq!(ep.start_frame, start);
            assert_eq!(ep.dribble_count, n);
            assert_eq!(ep.last_dribble_frame, Some(rig.index - 1));
        }
        assert!(rig.events.is_empty());
    }

    #[test]
    fn test_slow_return_is_not_a_dribble() {
        let mut rig = Rig::new(PlayConfig::default());
        for _ in 0..5 {
            rig.step(vec![player(200.0, Some(1))], Some(ball_at(200.0, 250.0)));
        }
        // away for 14 frames: longer than the dribble window but shorter than the lapse
        for _ in 0..14 {
            rig.step(vec![player(200.0, Some(1))], Some(ball_at(200.0, 340.0)));
        }
        rig.step(vec![player(200.0, Some(1))], Some(ball_at(200.0, 250.0)));
        assert_eq!(rig.play.episode().unwrap().dribble_count, 0);
    }

    fn handoff(team_a: Option<TeamId>, team_b: Option<TeamId>) -> Vec<GameEvent> {
        let mut rig = Rig::new(PlayConfig::default());
        let people = || vec![player(200.0, team_a), player(500.0, team_b)];
        for _ in 0..10 {
            rig.step(people(), Some(ball_at(200.0, 250.0)));
        }
        for _ in 0..5 {
            rig.step(people(), Some(ball_at(500.0, 250.0)));
        }
        rig.events
    }

    #[test]
    fn test_same_team_handoff_is_pass() {
        let events = handoff(Some(1), Some(1));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Pass);
        assert_eq!(events[0].team, Some(1));
        assert_eq!(events[0].frame_index, 12);
    }

    #[test]
    fn test_cross_team_handoff_is_interception() {
        let events = handoff(Some(1), Some(2));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Interception);
        assert_eq!(events[0].team, Some(2));
    }

    #[test]
    fn test_unknown_team_handoff_omits_team() {
        let events = handoff(Some(1), None);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Pass);
        assert_eq!(events[0].team, None);
    }

    #[test]
    fn test_rebound_window_suppresses_interception() {
        let cfg = PlayConfig {
            rebound_window_frames: 24,
            ..PlayConfig::default()
        };
        let mut play = PlayStateMachine::new(cfg);
        let mut tracker = PersonTracker::new(TrackerConfig::default());
        let frame = FrameDetections {
            frame_index: 0,
            timestamp: 0.0,
            ball_boxes: vec![],
            people: vec![player(200.0, Some(1)), player(500.0, Some(2))],
        };
        tracker.update(&frame);
        let acquire = |holder, previous| PossessionOutcome {
            ball: Some(ball_at(200.0, 250.0)),
            nearest: Some(Candidate {
                track_id: holder,
                distance: 0.0,
            }),
            holder: Some(holder),
            pending: None,
            transition: Some(PossessionTransition::Acquired { holder, previous }),
        };
        assert!(play.update(&frame, &acquire(1, None), &tracker, None).is_empty());
        let evs = play.update(&frame, &acquire(2, Some(1)), &tracker, Some(10));
        assert!(evs.is_empty());
        let evs = play.update(&frame, &acquire(1, Some(2)), &tracker, Some(40));
        assert_eq!(evs.len(), 1);
        assert_eq!(evs[0].kind, EventKind::Interception);
    }

    #[test]
    fn test_flush_discards_episode_silently() {
        let mut rig = Rig::new(PlayConfig::default());
        for _ in 0..10 {
            rig.step(vec![player(200.0, Some(1))], Some(ball_at(200.0, 250.0)));
        }
        assert!(rig.play.episode().is_some());
        rig.play.flush();
        assert!(rig.play.episode().is_none());
        assert!(rig.events.is_empty());
    }
}
