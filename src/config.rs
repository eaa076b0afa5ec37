// src/config.rs

use crate::analysis::person_tracker::TrackerConfig;
use crate::analysis::play_state::PlayConfig;
use crate::analysis::possession::PossessionConfig;
use crate::analysis::shot_detector::ShotConfig;
use crate::detection::DetectionConfig;
use crate::error::{EngineError, Result};
use crate::types::{Config, Region};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.engine.validate()?;
        Ok(config)
    }
}

/// Everything a session is started with. Thresholds are in pixels and
/// processed-frame counts; nothing here is wall-clock based.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub detection: DetectionConfig,
    pub tracker: TrackerConfig,
    pub possession: PossessionConfig,
    pub play: PlayConfig,
    pub shot: ShotConfig,
}

impl EngineConfig {
    /// Convenience for callers that only need to place the basket.
    pub fn with_basket_zone(mut self, zone: Region) -> Self {
        self.shot.basket_zone = Some(zone);
        self
    }

    pub fn validate(&self) -> Result<()> {
        let d = &self.detection;
        unit_interval("detection.min_ball_confidence", d.min_ball_confidence)?;
        if let Some(step) = d.max_ball_step {
            positive("detection.max_ball_step", step)?;
        }

        let t = &self.tracker;
        positive("tracker.max_match_distance", t.max_match_distance)?;
        unit_interval("tracker.min_keypoint_confidence", t.min_keypoint_confidence)?;
        nonzero("tracker.max_missed_frames", t.max_missed_frames as usize)?;
        nonzero("tracker.history_len", t.history_len)?;

        let p = &self.possession;
        positive("possession.max_wrist_distance", p.max_wrist_distance)?;
        unit_interval("possession.min_wrist_confidence", p.min_wrist_confidence)?;
        nonzero("possession.hysteresis_frames", p.hysteresis_frames as usize)?;
        nonzero("possession.lapse_frames", p.lapse_frames as usize)?;

        let play = &self.play;
        nonzero("play.hold_threshold_frames", play.hold_threshold_frames as usize)?;
        positive("play.movement_threshold", play.movement_threshold)?;
        nonzero("play.dribble_window_frames", play.dribble_window_frames as usize)?;
        positive("play.dribble_min_drop", play.dribble_min_drop)?;
        if p.lapse_frames <= play.dribble_window_frames {
            return Err(EngineError::invalid_config(format!(
                "possession.lapse_frames ({}) must exceed play.dribble_window_frames ({})",
                p.lapse_frames, play.dribble_window_frames
            )));
        }

        let s = &self.shot;
        if let Some(zone) = &s.basket_zone {
            if !zone.is_valid() {
                return Err(EngineError::invalid_config(format!(
                    "shot.basket_zone is empty or inverted: {:?}",
                    zone
                )));
            }
        }
        nonzero("shot.trajectory_frames", s.trajectory_frames)?;
        if s.min_trajectory_points < 2 || s.min_trajectory_points > s.trajectory_frames {
            return Err(EngineError::invalid_config(format!(
                "shot.min_trajectory_points must be in 2..={}, got {}",
                s.trajectory_frames, s.min_trajectory_points
            )));
        }
        positive("shot.min_rise", s.min_rise)?;
        positive("shot.projection_factor", s.projection_factor)?;
        nonzero("shot.release_window_frames", s.release_window_frames as usize)?;

        Ok(())
    }
}

fn positive(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::invalid_config(format!(
            "{} must be a positive number, got {}",
            name, value
        )))
    }
}

fn unit_interval(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::invalid_config(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}

fn nonzero(name: &str, value: usize) -> Result<()> {
    if value > 0 {
        Ok(())
    } else {
        Err(EngineError::invalid_config(format!("{} must be >= 1", name)))
    }
}
