//! Error taxonomy
//!
//! Invalid requests never surface to the sender; callers log the `Rejection`
//! and drop the request. The other types belong to the scheduler and the
//! external collaborators.

use crate::types::{GameMode, ParticipantId, Phase};

/// Why the host dropped a participant request
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("unknown or disconnected participant {0}")]
    UnknownParticipant(ParticipantId),

    #[error("{target} is not presenting")]
    OutsideWindow { target: ParticipantId },

    #[error("{voter} already voted for {target}")]
    DuplicateVote {
        voter: ParticipantId,
        target: ParticipantId,
    },

    #[error("{0} cannot vote for themselves")]
    SelfVote(ParticipantId),

    #[error("phase sequence already running")]
    AlreadyRunning,

    #[error("only the host participant can {0}")]
    NotHost(&'static str),

    #[error("game mode is locked while a round runs (phase {0:?})")]
    ModeLocked(Phase),

    #[error("unknown game mode {0:?}")]
    UnknownMode(GameMode),
}

/// The phase sequence was force-stopped at a suspension point
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("phase sequence cancelled")]
pub struct Cancelled;

/// Failure reported by the external profile store
#[derive(Debug, thiserror::Error)]
pub enum RewardError {
    #[error("profile store unavailable: {0}")]
    Unavailable(String),
}

/// Bad value in the environment configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}
