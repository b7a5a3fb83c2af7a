//! Lobby readiness and game mode selection
//!
//! Keeps one ready flag per connected participant and the pending auto-start
//! countdown, if any. The countdown task itself is spawned by the session; this
//! module only owns its cancellation token.

use crate::error::Rejection;
use crate::protocol::ServerMessage;
use crate::session::SessionContext;
use crate::types::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// A pending auto-start countdown
#[derive(Debug, Clone)]
pub struct Countdown {
    pub id: ulid::Ulid,
    pub token: CancellationToken,
}

/// Aggregate shown in the lobby UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyCount {
    pub ready: u32,
    pub total: u32,
}

impl ReadyCount {
    pub fn is_quorum(&self) -> bool {
        self.total > 0 && self.ready == self.total
    }
}

#[derive(Debug, Default)]
struct ReadyBook {
    flags: BTreeMap<ParticipantId, bool>,
    game_mode: GameMode,
    countdown: Option<Countdown>,
}

impl ReadyBook {
    fn count(&self) -> ReadyCount {
        ReadyCount {
            ready: self.flags.values().filter(|r| **r).count() as u32,
            total: self.flags.len() as u32,
        }
    }

    /// Cancel the pending countdown, returning whether there was one
    fn cancel_countdown(&mut self) -> bool {
        match self.countdown.take() {
            Some(countdown) => {
                countdown.token.cancel();
                true
            }
            None => false,
        }
    }
}

pub struct ReadinessCoordinator {
    ctx: Arc<SessionContext>,
    book: RwLock<ReadyBook>,
}

impl ReadinessCoordinator {
    pub fn new(ctx: Arc<SessionContext>) -> Self {
        Self {
            ctx,
            book: RwLock::new(ReadyBook::default()),
        }
    }

    /// New participants start not ready
    pub async fn on_connect(&self, id: ParticipantId) {
        let mut book = self.book.write().await;
        book.flags.entry(id).or_insert(false);
        self.broadcast_count(book.count()).await;
    }

    /// Drop the participant's flag. Returns true if a pending countdown was cancelled.
    pub async fn on_disconnect(&self, id: ParticipantId) -> bool {
        let mut book = self.book.write().await;
        if book.flags.remove(&id).is_none() {
            return false;
        }

        let cancelled = book.cancel_countdown();
        if cancelled {
            tracing::info!("Auto-start cancelled: {} disconnected", id);
            self.ctx
                .transport
                .broadcast(ServerMessage::AutoStartCancelled)
                .await;
        }
        self.broadcast_count(book.count()).await;
        cancelled
    }

    /// Apply a participant's own ready flag
    pub async fn submit_ready(
        &self,
        id: ParticipantId,
        ready: bool,
    ) -> Result<ReadyCount, Rejection> {
        let mut book = self.book.write().await;
        let Some(flag) = book.flags.get_mut(&id) else {
            return Err(Rejection::UnknownParticipant(id));
        };
        *flag = ready;

        if !ready && book.cancel_countdown() {
            tracing::info!("Auto-start cancelled: {} is no longer ready", id);
            self.ctx
                .transport
                .broadcast(ServerMessage::AutoStartCancelled)
                .await;
        }

        let count = book.count();
        tracing::debug!("{} ready={} ({}/{})", id, ready, count.ready, count.total);
        self.broadcast_count(count).await;
        Ok(count)
    }

    /// True iff somebody is connected and everybody is ready
    pub async fn all_ready(&self) -> bool {
        self.book.read().await.count().is_quorum()
    }

    pub async fn ready_count(&self) -> ReadyCount {
        self.book.read().await.count()
    }

    pub async fn is_ready(&self, id: ParticipantId) -> Option<bool> {
        self.book.read().await.flags.get(&id).copied()
    }

    /// Clear every flag and any pending countdown
    pub async fn reset_all(&self) {
        let mut book = self.book.write().await;
        for flag in book.flags.values_mut() {
            *flag = false;
        }
        if book.cancel_countdown() {
            self.ctx
                .transport
                .broadcast(ServerMessage::AutoStartCancelled)
                .await;
        }
        self.broadcast_count(book.count()).await;
    }

    pub async fn game_mode(&self) -> GameMode {
        self.book.read().await.game_mode
    }

    /// Store a new game mode. Phase and host checks happen in the session.
    pub async fn set_game_mode(&self, mode: GameMode) -> Result<(), Rejection> {
        if !mode.is_known() {
            return Err(Rejection::UnknownMode(mode));
        }

        let mut book = self.book.write().await;
        if book.game_mode != mode {
            book.game_mode = mode;
            tracing::info!("Game mode set to {:?}", mode);
            self.ctx
                .transport
                .broadcast(ServerMessage::GameModeChanged { mode })
                .await;
        }
        Ok(())
    }

    /// Arm a fresh auto-start countdown, replacing any pending one.
    ///
    /// Returns `None` when the quorum no longer holds.
    pub async fn arm_countdown(&self) -> Option<Countdown> {
        let mut book = self.book.write().await;
        if !book.count().is_quorum() {
            return None;
        }
        book.cancel_countdown();

        let countdown = Countdown {
            id: ulid::Ulid::new(),
            token: CancellationToken::new(),
        };
        book.countdown = Some(countdown.clone());
        self.ctx
            .transport
            .broadcast(ServerMessage::AutoStartCountdown {
                seconds: self.ctx.config.auto_start_countdown_seconds,
            })
            .await;
        Some(countdown)
    }

    /// Claim an expired countdown. Only the still-pending countdown with an
    /// intact quorum may start the sequence.
    pub async fn finish_countdown(&self, countdown: &Countdown) -> bool {
        let mut book = self.book.write().await;
        let is_current = book
            .countdown
            .as_ref()
            .is_some_and(|pending| pending.id == countdown.id);
        if !is_current || countdown.token.is_cancelled() {
            return false;
        }
        book.countdown = None;
        book.count().is_quorum()
    }

    pub async fn countdown_pending(&self) -> bool {
        self.book.read().await.countdown.is_some()
    }

    async fn broadcast_count(&self, count: ReadyCount) {
        self.ctx
            .transport
            .broadcast(ServerMessage::ReadyCountChanged {
                ready: count.ready,
                total: count.total,
            })
            .await;
    }
}
