//! Optimistic vote control for a single comment or post.
//!
//! A press updates the local state and score immediately and yields a [`PendingVote`]
//! for the caller to dispatch. Presses are versioned: only the resolution of the most
//! recent press may commit or roll back, so out-of-order replies from earlier presses
//! cannot clobber newer local state.

use crate::format::format_score;
use crate::reddit::VoteState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDirection {
    Up,
    Down,
}

/// Next state and score delta for a press.
pub fn transition(current: VoteState, pressed: VoteDirection) -> (VoteState, i64) {
    match (current, pressed) {
        (VoteState::None, VoteDirection::Up) => (VoteState::Up, 1),
        (VoteState::None, VoteDirection::Down) => (VoteState::Down, -1),
        (VoteState::Up, VoteDirection::Up) => (VoteState::None, -1),
        (VoteState::Up, VoteDirection::Down) => (VoteState::Down, -2),
        (VoteState::Down, VoteDirection::Down) => (VoteState::None, 1),
        (VoteState::Down, VoteDirection::Up) => (VoteState::Up, 2),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingVote {
    pub thing_id: String,
    pub state: VoteState,
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Committed,
    RolledBack,
    Stale,
}

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    version: u64,
    state: VoteState,
    score: i64,
}

#[derive(Debug, Clone)]
pub struct VoteWidget {
    thing_id: String,
    state: VoteState,
    score: i64,
    version: u64,
    in_flight: Option<Snapshot>,
}

impl VoteWidget {
    /// The server never reports the viewer's existing vote, so every widget starts
    /// at [`VoteState::None`].
    pub fn new(thing_id: impl Into<String>, score: i64) -> Self {
        Self {
            thing_id: thing_id.into(),
            state: VoteState::None,
            score,
            version: 0,
            in_flight: None,
        }
    }

    pub fn thing_id(&self) -> &str {
        &self.thing_id
    }

    pub fn state(&self) -> VoteState {
        self.state
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn score_label(&self) -> String {
        format_score(self.score)
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn press(&mut self, pressed: VoteDirection) -> PendingVote {
        let (next, delta) = transition(self.state, pressed);
        self.version = self.version.wrapping_add(1);
        self.in_flight = Some(Snapshot {
            version: self.version,
            state: self.state,
            score: self.score,
        });
        self.state = next;
        self.score += delta;
        PendingVote {
            thing_id: self.thing_id.clone(),
            state: next,
            version: self.version,
        }
    }

    pub fn resolve(&mut self, version: u64, success: bool) -> Resolution {
        let Some(snapshot) = self.in_flight else {
            return Resolution::Stale;
        };
        if snapshot.version != version {
            return Resolution::Stale;
        }
        self.in_flight = None;
        if success {
            return Resolution::Committed;
        }
        self.state = snapshot.state;
        self.score = snapshot.score;
        Resolution::RolledBack
    }
}
