//! Human-readable policy and economy events, kept in a bounded log.

use crate::SimError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Category of a recorded event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    GameStarted,
    GovernanceChanged,
    VoteRecorded,
    VoteRejected,
    PolicyRateSet,
    RateClamped,
    QuorumNotMet,
    InsufficientInventory,
    PayrollShortfall,
    TaxShortfall,
    RepaymentDeferred,
    LoanIssued,
    LoanDeclined,
    EmergencyLending,
    DebtCeilingReached,
    ProductionShortfall,
    Warning,
}

/// One entry of the event log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Turn during which the event happened.
    pub turn: u64,
    pub kind: EventKind,
    pub message: String,
}

impl Event {
    pub fn new(turn: u64, kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            turn,
            kind,
            message: message.into(),
        }
    }

    /// Record a recovered error condition.
    pub fn from_error(turn: u64, err: &SimError) -> Self {
        let kind = match err {
            SimError::InsufficientInventory { .. } => EventKind::InsufficientInventory,
            SimError::QuorumNotMet { .. } => EventKind::QuorumNotMet,
            SimError::InvalidVote { .. } => EventKind::VoteRejected,
            _ => EventKind::Warning,
        };
        Self::new(turn, kind, err.to_string())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[turn {}] {}", self.turn, self.message)
    }
}

/// Fixed-capacity event log; the oldest entries are dropped first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    capacity: usize,
    events: VecDeque<Event>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn push(&mut self, event: Event) {
        tracing::debug!(turn = event.turn, kind = ?event.kind, "{}", event.message);
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn extend<I: IntoIterator<Item = Event>>(&mut self, events: I) {
        for e in events {
            self.push(e);
        }
    }

    /// Retained events, oldest first.
    pub fn recent(&self) -> Vec<Event> {
        self.events.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_is_bounded_and_drops_oldest() {
        let mut log = EventLog::new(3);
        for t in 0..5u64 {
            log.push(Event::new(t, EventKind::PolicyRateSet, format!("rate {t}")));
        }
        assert_eq!(log.len(), 3);
        let turns: Vec<u64> = log.iter().map(|e| e.turn).collect();
        assert_eq!(turns, vec![2, 3, 4]);
    }

    #[test]
    fn errors_map_to_event_kinds() {
        let e = Event::from_error(4, &SimError::QuorumNotMet { cast: 0, quorum: 3 });
        assert_eq!(e.kind, EventKind::QuorumNotMet);
        assert_eq!(e.turn, 4);
        assert_eq!(
            e.to_string(),
            "[turn 4] democratic vote quorum not met: 0 of 3 votes cast"
        );
    }
}
