// src/pipeline/event_log.rs
//
// Append-only event log with an incrementally folded summary.
// The summary is never stored on its own: `SessionStats::from_events`
// over the log always reproduces it.

use crate::error::{EngineError, Result};
use crate::types::{EventKind, GameEvent, TeamId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_events: u64,
    pub event_counts: BTreeMap<EventKind, u64>,
    pub team_stats: BTreeMap<TeamId, BTreeMap<EventKind, u64>>,
}

impl SessionStats {
    pub fn record(&mut self, event: &GameEvent) {
        self.total_events += 1;
        *self.event_counts.entry(event.kind).or_insert(0) += 1;
        if let Some(team) = event.team {
            *self
                .team_stats
                .entry(team)
                .or_default()
                .entry(event.kind)
                .or_insert(0) += 1;
        }
    }

    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a GameEvent>) -> Self {
        let mut stats = Self::default();
        for ev in events {
            stats.record(ev);
        }
        stats
    }

    pub fn count(&self, kind: EventKind) -> u64 {
        self.event_counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn team_count(&self, team: TeamId, kind: EventKind) -> u64 {
        self.team_stats
            .get(&team)
            .and_then(|m| m.get(&kind))
            .copied()
            .unwrap_or(0)
    }
}

/// Ordered events plus the summary at the moment of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub events: Vec<GameEvent>,
    pub summary: SessionStats,
}

#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<GameEvent>,
    stats: SessionStats,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: GameEvent) -> Result<()> {
        if let Some(last) = self.events.last() {
            if event.timestamp < last.timestamp {
                return Err(EngineError::EventOrder {
                    timestamp: event.timestamp,
                    last: last.timestamp,
                });
            }
        }
        self.stats.record(&event);
        self.events.push(event);
        Ok(())
    }

    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    pub fn summary(&self) -> &SessionStats {
        &self.stats
    }

    pub fn snapshot(&self) -> EventSnapshot {
        EventSnapshot {
            events: self.events.clone(),
            summary: self.stats.clone(),
        }
    }

    pub fn events_of_kind(&self, kind: EventKind) -> Vec<&GameEvent> {
        self.events.iter().filter(|e| e.kind == kind).collect()
    }

    /// Last `n` events, oldest first.
    pub fn recent(&self, n: usize) -> &[GameEvent] {
        let start = self.events.len().saturating_sub(n);
        &self.events[start..]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_snapshot(self) -> EventSnapshot {
        EventSnapshot {
            events: self.events,
            summary: self.stats,
        }
    }
}
