//! Level / progress / winner state machine
//!
//! The machine maps the overall intensity of each frame to one of five
//! levels plus a fractional progress inside that level. Reaching level 5 with
//! an intensity above the winner threshold enters a time-boxed winner state
//! that is only left once the level has dropped again *and* the winner
//! duration has elapsed.
//!
//! [`advance`] is the pure transition; [`LevelStateMachine`] owns the single
//! mutable state instance of a server.

use serde::{Deserialize, Serialize};

use crate::config::AudioConfiguration;
use crate::frame::unit;

/// Lowest level
pub const MIN_LEVEL: u8 = 1;
/// Highest level, the only one from which the winner state can be entered
pub const MAX_LEVEL: u8 = 5;

/// Level progression state shared by all clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelState {
    /// Current level (1 - 5)
    pub current: u8,
    /// Progress inside the current level (0.0 - 1.0, exclusive)
    pub progress: f32,
    /// Winner state active
    pub is_winner: bool,
    /// Unix millis at which the winner state was entered
    pub winner_start_time: Option<i64>,
}

impl Default for LevelState {
    fn default() -> Self {
        Self {
            current: MIN_LEVEL,
            progress: 0.0,
            is_winner: false,
            winner_start_time: None,
        }
    }
}

impl LevelState {
    /// Starting state: level 1, no progress, no winner
    pub fn initial() -> Self {
        Self::default()
    }
}

/// Parameters of the transition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelRules {
    /// Exponent `k` of the sensitivity curve `intensity ^ k`
    pub sensitivity: f32,
    /// Intensity that must be strictly exceeded at level 5
    pub winner_threshold: f32,
    /// Minimum winner hold time in milliseconds
    pub winner_duration_ms: u64,
}

impl Default for LevelRules {
    fn default() -> Self {
        Self::from(&AudioConfiguration::default())
    }
}

impl From<&AudioConfiguration> for LevelRules {
    fn from(config: &AudioConfiguration) -> Self {
        Self {
            sensitivity: config.level_sensitivity,
            winner_threshold: config.winner_threshold,
            winner_duration_ms: config.winner_duration_ms,
        }
    }
}

/// Compute the state following `previous` for one intensity sample taken at
/// `now_ms`.
pub fn advance(previous: &LevelState, intensity: f32, now_ms: i64, rules: &LevelRules) -> LevelState {
    let intensity = unit(intensity);
    let scaled = intensity.powf(rules.sensitivity);
    let position = scaled * f32::from(MAX_LEVEL);

    let current = ((position.floor() as u8) + 1).min(MAX_LEVEL);
    // Guard against rounding pushing the remainder to exactly 1.0
    let progress = (position % 1.0).clamp(0.0, 1.0 - f32::EPSILON);

    let mut next = LevelState {
        current,
        progress,
        ..previous.clone()
    };

    if current == MAX_LEVEL && intensity > rules.winner_threshold && !previous.is_winner {
        next.is_winner = true;
        next.winner_start_time = Some(now_ms);
    } else if current < MAX_LEVEL && previous.is_winner {
        let started = previous.winner_start_time.unwrap_or(0);
        let elapsed = now_ms.saturating_sub(started);
        if u64::try_from(elapsed).is_ok_and(|elapsed| elapsed > rules.winner_duration_ms) {
            next.is_winner = false;
            next.winner_start_time = None;
        }
    }

    next
}

/// Owner of the single mutable [`LevelState`] of a server.
#[derive(Debug, Clone)]
pub struct LevelStateMachine {
    state: LevelState,
    rules: LevelRules,
}

impl LevelStateMachine {
    /// Create a machine in the initial state
    pub fn new(rules: LevelRules) -> Self {
        Self {
            state: LevelState::initial(),
            rules,
        }
    }

    /// Feed one intensity sample and return the new state
    pub fn apply(&mut self, intensity: f32, now_ms: i64) -> &LevelState {
        let next = advance(&self.state, intensity, now_ms, &self.rules);
        if next.current != self.state.current {
            tracing::debug!("Level {} -> {}", self.state.current, next.current);
        }
        if next.is_winner && !self.state.is_winner {
            tracing::info!("Winner state entered at {}", now_ms);
        } else if !next.is_winner && self.state.is_winner {
            tracing::info!("Winner state cleared at {}", now_ms);
        }
        self.state = next;
        &self.state
    }

    /// Current state
    pub fn state(&self) -> &LevelState {
        &self.state
    }

    /// Current rules
    pub fn rules(&self) -> &LevelRules {
        &self.rules
    }

    /// Replace the rules; the state itself is kept
    pub fn set_rules(&mut self, rules: LevelRules) {
        self.rules = rules;
    }

    /// Return to the initial state
    pub fn reset(&mut self) {
        self.state = LevelState::initial();
    }
}

impl Default for LevelStateMachine {
    fn default() -> Self {
        Self::new(LevelRules::default())
    }
}
