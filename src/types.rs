use serde::{Deserialize, Serialize};
use std::fmt;

/// Session id (ULID string), stable for the lifetime of one host session
pub type SessionId = String;

/// Opaque participant identity handed out by the transport.
///
/// Ordering matters: presentation order and ranking tie-breaks both use
/// ascending ids, so every observer derives the same order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Waiting,
    ThemeDisplay,
    Customization,
    Presentation,
    Podium,
    Reward,
    ReturnToLobby,
}

impl Phase {
    /// The phase that follows this one. `ReturnToLobby` wraps around to `Waiting`.
    pub fn next(self) -> Phase {
        use Phase::*;

        match self {
            Waiting => ThemeDisplay,
            ThemeDisplay => Customization,
            Customization => Presentation,
            Presentation => Podium,
            Podium => Reward,
            Reward => ReturnToLobby,
            ReturnToLobby => Waiting,
        }
    }
}

/// Session-wide game mode selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct GameMode(pub i32);

impl GameMode {
    /// Audience grades each runway from 1 to 5
    pub const GRADED: GameMode = GameMode(0);
    /// Audience gives a thumbs up (1) or down (0)
    pub const BINARY: GameMode = GameMode(1);

    pub fn is_known(self) -> bool {
        self == Self::GRADED || self == Self::BINARY
    }

    /// Score range of the voting UI for this mode
    pub fn vote_scale(self) -> VoteScale {
        if self == Self::BINARY {
            VoteScale { min: 0, max: 1 }
        } else {
            VoteScale { min: 1, max: 5 }
        }
    }
}

/// Inclusive score range accepted while a presenter window is open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteScale {
    pub min: u8,
    pub max: u8,
}

impl VoteScale {
    /// Clamp a submitted score into this range
    pub fn normalize(&self, score: i32) -> u8 {
        score.clamp(i32::from(self.min), i32::from(self.max)) as u8
    }
}

/// Avatar placement sent with `TeleportTo`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Transform {
    pub position: [f32; 3],
    /// Rotation around the vertical axis, in degrees
    pub yaw: f32,
}

impl Transform {
    pub const fn new(x: f32, y: f32, z: f32, yaw: f32) -> Self {
        Self {
            position: [x, y, z],
            yaw,
        }
    }
}

/// A connected participant as seen by the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    /// Lobby spawn point; participants return here after the podium
    pub spawn: Transform,
}

/// One line of the derived ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub participant_id: ParticipantId,
    /// Arithmetic mean of received scores, 0.0 when nobody voted
    pub average_score: f64,
    pub vote_count: u32,
}

impl RankingEntry {
    pub fn has_votes(&self) -> bool {
        self.vote_count > 0
    }
}

/// Theme chosen for one round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub category: String,
    pub name: String,
}

/// Text revealed to an impostor instead of the real theme name
pub const IMPOSTOR_THEME: &str = "impostor";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order_wraps_to_waiting() {
        let mut phase = Phase::Waiting;
        let mut seen = vec![phase];
        for _ in 0..7 {
            phase = phase.next();
            seen.push(phase);
        }

        assert_eq!(
            seen,
            vec![
                Phase::Waiting,
                Phase::ThemeDisplay,
                Phase::Customization,
                Phase::Presentation,
                Phase::Podium,
                Phase::Reward,
                Phase::ReturnToLobby,
                Phase::Waiting,
            ]
        );
    }

    #[test]
    fn test_vote_scale_normalizes_scores() {
        let graded = GameMode::GRADED.vote_scale();
        assert_eq!(graded.normalize(0), 1);
        assert_eq!(graded.normalize(4), 4);
        assert_eq!(graded.normalize(9), 5);

        let binary = GameMode::BINARY.vote_scale();
        assert_eq!(binary.normalize(-3), 0);
        assert_eq!(binary.normalize(5), 1);
    }

    #[test]
    fn test_unknown_game_mode() {
        assert!(GameMode(0).is_known());
        assert!(GameMode(1).is_known());
        assert!(!GameMode(7).is_known());
    }

    #[test]
    fn test_phase_serializes_screaming_case() {
        let json = serde_json::to_string(&Phase::ReturnToLobby).unwrap();
        assert_eq!(json, "\"RETURN_TO_LOBBY\"");
    }
}
