// src/types.rs
use std::fmt;

/// Why mining is currently paused
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PauseReason {
    /// No live pool connection, either because login has not succeeded
    /// yet or because the connection dropped and is being re-established.
    NoConnection,

    /// The most recent login failed. Reserved; nothing produces it yet.
    NoLogin,

    /// An operator asked for mining to pause. Reserved; nothing produces it yet.
    OperatorOverride,
}

/// Whether workers should be dispatched for the current job
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ActivityState {
    /// Workers run against the current job
    Active,

    /// Dispatch is skipped until conditions change
    Paused(PauseReason),
}

impl ActivityState {
    /// Derives the activity state from current external conditions.
    pub fn evaluate(connected: bool) -> Self {
        if connected {
            ActivityState::Active
        } else {
            ActivityState::Paused(PauseReason::NoConnection)
        }
    }

    /// Returns true for any `Paused` variant.
    pub fn is_paused(&self) -> bool {
        matches!(self, ActivityState::Paused(_))
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityState::Active => write!(f, "ACTIVE"),
            ActivityState::Paused(PauseReason::NoConnection) => write!(f, "PAUSED: no connection."),
            ActivityState::Paused(PauseReason::NoLogin) => write!(f, "PAUSED: login failed."),
            ActivityState::Paused(PauseReason::OperatorOverride) => {
                write!(f, "PAUSED: operator override.")
            }
        }
    }
}

/// Lifecycle of the hash engine's dataset
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum EngineStatus {
    /// No dataset has been built yet; `seed` has not been called
    #[default]
    NotStarted,

    /// A dataset is being built
    Starting,

    /// A dataset is ready for hashing
    Ok,
}

/// Commands accepted on the control loop's poke channel
///
/// Commands travel as small integer codes so that callers outside the
/// crate can poke the loop without sharing this type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Conditions changed: stop workers, reset stats, re-evaluate
    StateChange,

    /// Stop workers and leave the loop
    Exit,

    /// Placeholder; handled as a no-op
    UpdateStats,

    /// Any code without a meaning
    Unknown(u8),
}

impl Command {
    /// Wire code for [`Command::StateChange`]
    pub const STATE_CHANGE: u8 = 1;
    /// Wire code for [`Command::Exit`]
    pub const EXIT: u8 = 8;
    /// Wire code for [`Command::UpdateStats`]
    pub const UPDATE_STATS: u8 = 9;

    /// Returns the integer code for this command.
    pub fn code(&self) -> u8 {
        match self {
            Command::StateChange => Self::STATE_CHANGE,
            Command::Exit => Self::EXIT,
            Command::UpdateStats => Self::UPDATE_STATS,
            Command::Unknown(code) => *code,
        }
    }
}

impl From<u8> for Command {
    fn from(code: u8) -> Self {
        match code {
            Self::STATE_CHANGE => Command::StateChange,
            Self::EXIT => Command::Exit,
            Self::UPDATE_STATS => Command::UpdateStats,
            other => Command::Unknown(other),
        }
    }
}
