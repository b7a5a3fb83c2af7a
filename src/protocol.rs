use crate::types::*;
use serde::{Deserialize, Serialize};

/// Requests a participant can send to the host.
///
/// Sender identity comes from the transport connection, never from the payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    SubmitReady {
        ready: bool,
    },
    SubmitVote {
        target: ParticipantId,
        score: i32,
    },
    /// Host participant only, before the phase sequence starts
    SelectGameMode {
        mode: GameMode,
    },
    /// Client finished its reward UI
    SettlementComplete,
    /// Host participant only: abort the running sequence
    ForceStop,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        session_id: SessionId,
        participant_id: ParticipantId,
        display_name: String,
        phase: Phase,
        game_mode: GameMode,
        server_now: String,
    },
    ReadyCountChanged {
        ready: u32,
        total: u32,
    },
    AutoStartCountdown {
        seconds: u32,
    },
    AutoStartCancelled,
    GameModeChanged {
        mode: GameMode,
    },
    PhaseChanged {
        phase: Phase,
        /// Bumped on every phase write so clients can drop stale frames
        version: u64,
        server_now: String,
    },
    /// Directed: per-recipient theme (the theme name is `"impostor"` for the impostor)
    ThemeReveal {
        category: String,
        theme: String,
    },
    StartCustomizationTimer {
        seconds: u32,
        theme: Option<String>,
        deadline: String,
    },
    ApplyAllVisuals,
    PresenterChanged {
        presenter: Option<ParticipantId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        seconds: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        scale: Option<VoteScale>,
    },
    /// Directed to the presenter: start the walk/animation sequence
    BeginRunway {
        seconds: u32,
        start: Transform,
    },
    /// Directed: place the recipient's own avatar
    TeleportTo {
        transform: Transform,
    },
    RankingDisplay {
        entries: Vec<RankingLine>,
    },
    HidePodium,
    /// Directed: reward granted to the recipient
    RewardGranted {
        rank: Option<u32>,
        amount: u32,
    },
    ResetVisuals,
    Error {
        code: String,
        msg: String,
    },
}

/// Ranking row as shown on the podium screen
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankingLine {
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub score: f64,
    pub votes: u32,
}
