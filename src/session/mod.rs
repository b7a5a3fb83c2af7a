mod roster;

pub use roster::Roster;

use crate::config::SessionConfig;
use crate::error::Rejection;
use crate::orchestrator::PhaseOrchestrator;
use crate::podium::PodiumSequencer;
use crate::presentation::PresentationCoordinator;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::readiness::ReadinessCoordinator;
use crate::reward::{ProfileStore, RewardSettlement};
use crate::theme::ThemeSource;
use crate::transport::SessionTransport;
use crate::types::*;
use crate::votes::VoteAggregator;
use std::sync::Arc;

/// Everything a component needs to reach the rest of the session.
///
/// Built once per session and handed to every component constructor.
pub struct SessionContext {
    pub id: SessionId,
    pub config: SessionConfig,
    pub transport: Arc<dyn SessionTransport>,
    pub roster: Roster,
}

impl SessionContext {
    pub fn new(config: SessionConfig, transport: Arc<dyn SessionTransport>) -> Arc<Self> {
        Arc::new(Self {
            id: ulid::Ulid::new().to_string(),
            config,
            transport,
            roster: Roster::new(),
        })
    }
}

/// Host side of one session: connection events in, broadcasts out
pub struct Session {
    ctx: Arc<SessionContext>,
    readiness: Arc<ReadinessCoordinator>,
    presentation: Arc<PresentationCoordinator>,
    votes: Arc<VoteAggregator>,
    podium: Arc<PodiumSequencer>,
    reward: Arc<RewardSettlement>,
    orchestrator: Arc<PhaseOrchestrator>,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        transport: Arc<dyn SessionTransport>,
        themes: Arc<dyn ThemeSource>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Arc<Self> {
        let ctx = SessionContext::new(config, transport);
        let readiness = Arc::new(ReadinessCoordinator::new(ctx.clone()));
        let votes = Arc::new(VoteAggregator::new());
        let presentation = Arc::new(PresentationCoordinator::new(
            ctx.clone(),
            readiness.clone(),
            votes.clone(),
        ));
        let podium = Arc::new(PodiumSequencer::new(ctx.clone(), votes.clone()));
        let reward = Arc::new(RewardSettlement::new(ctx.clone(), profiles));
        let orchestrator = Arc::new(PhaseOrchestrator::new(
            ctx.clone(),
            readiness.clone(),
            presentation.clone(),
            votes.clone(),
            podium.clone(),
            reward.clone(),
            themes,
        ));

        tracing::info!("Session {} created", ctx.id);
        Arc::new(Self {
            ctx,
            readiness,
            presentation,
            votes,
            podium,
            reward,
            orchestrator,
        })
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.ctx
    }

    pub fn readiness(&self) -> &Arc<ReadinessCoordinator> {
        &self.readiness
    }

    pub fn votes(&self) -> &Arc<VoteAggregator> {
        &self.votes
    }

    pub fn orchestrator(&self) -> &Arc<PhaseOrchestrator> {
        &self.orchestrator
    }

    pub async fn phase(&self) -> Phase {
        self.orchestrator.phase().await
    }

    /// Transport reported a new connection
    pub async fn connect(&self, id: ParticipantId) -> Participant {
        let participant = self.ctx.roster.insert(id, &self.ctx.config).await;
        tracing::info!("{} connected as {}", id, participant.display_name);

        self.ctx
            .transport
            .send_to(
                id,
                ServerMessage::Welcome {
                    session_id: self.ctx.id.clone(),
                    participant_id: id,
                    display_name: participant.display_name.clone(),
                    phase: self.orchestrator.phase().await,
                    game_mode: self.readiness.game_mode().await,
                    server_now: chrono::Utc::now().to_rfc3339(),
                },
            )
            .await;
        self.readiness.on_connect(id).await;
        participant
    }

    /// Transport reported a lost connection. Never cancels the sequence.
    pub async fn disconnect(self: &Arc<Self>, id: ParticipantId) {
        if self.ctx.roster.remove(id).await.is_none() {
            tracing::debug!("Disconnect for unknown participant {}", id);
            return;
        }
        tracing::info!("{} disconnected", id);

        self.readiness.on_disconnect(id).await;
        self.votes.purge(id).await;
        self.reward.forget(id);

        // The remaining lobby may still (or now) be fully ready
        self.maybe_arm_auto_start().await;
    }

    /// Validate and apply one participant request. Rejections are logged only.
    pub async fn handle_message(self: &Arc<Self>, from: ParticipantId, msg: ClientMessage) {
        if let Err(rejection) = self.dispatch(from, msg).await {
            tracing::warn!("Rejected request from {}: {}", from, rejection);
        }
    }

    async fn dispatch(
        self: &Arc<Self>,
        from: ParticipantId,
        msg: ClientMessage,
    ) -> Result<(), Rejection> {
        if !self.ctx.roster.contains(from).await {
            return Err(Rejection::UnknownParticipant(from));
        }

        match msg {
            ClientMessage::SubmitReady { ready } => {
                let count = self.readiness.submit_ready(from, ready).await?;
                if ready && count.is_quorum() {
                    self.maybe_arm_auto_start().await;
                }
            }
            ClientMessage::SubmitVote { target, score } => {
                if !self.ctx.roster.contains(target).await {
                    return Err(Rejection::UnknownParticipant(target));
                }
                self.presentation.submit_vote(from, target, score).await?;
            }
            ClientMessage::SelectGameMode { mode } => {
                self.require_host(from, "select the game mode").await?;
                if self.orchestrator.is_running().await {
                    return Err(Rejection::ModeLocked(self.orchestrator.phase().await));
                }
                self.readiness.set_game_mode(mode).await?;
            }
            ClientMessage::SettlementComplete => {
                if !self.reward.acknowledge(from) {
                    tracing::debug!("{} confirmed a reward that was not pending", from);
                }
            }
            ClientMessage::ForceStop => {
                self.require_host(from, "stop the session").await?;
                self.force_stop().await;
            }
        }
        Ok(())
    }

    async fn require_host(
        &self,
        from: ParticipantId,
        action: &'static str,
    ) -> Result<(), Rejection> {
        if self.ctx.roster.host().await == Some(from) {
            Ok(())
        } else {
            Err(Rejection::NotHost(action))
        }
    }

    /// Start the phase sequence now
    pub async fn start(&self) -> Result<ulid::Ulid, Rejection> {
        self.orchestrator.start().await
    }

    /// Abort the running sequence and put every component back into a
    /// startable state
    pub async fn force_stop(&self) {
        self.orchestrator.force_stop().await;
        self.votes.reset().await;
        self.podium.hide().await;
        self.readiness.reset_all().await;
    }

    /// Arm the auto-start countdown if no sequence runs and everyone is ready
    async fn maybe_arm_auto_start(self: &Arc<Self>) {
        if self.orchestrator.is_running().await {
            return;
        }
        let Some(countdown) = self.readiness.arm_countdown().await else {
            return;
        };

        tracing::info!(
            "Everyone is ready, starting in {}s",
            self.ctx.config.auto_start_countdown_seconds
        );
        let session = Arc::clone(self);
        let delay = self.ctx.config.auto_start_countdown();
        tokio::spawn(async move {
            tokio::select! {
                _ = countdown.token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if session.readiness.finish_countdown(&countdown).await {
                        if let Err(e) = session.start().await {
                            tracing::warn!("Auto-start failed: {}", e);
                        }
                    }
                }
            }
        });
    }
}

#[cfg(test)]
pub(crate) fn test_context() -> (Arc<SessionContext>, Arc<crate::transport::RecordingTransport>) {
    test_context_with(SessionConfig::default())
}

#[cfg(test)]
pub(crate) fn test_context_with(
    config: SessionConfig,
) -> (Arc<SessionContext>, Arc<crate::transport::RecordingTransport>) {
    let transport = Arc::new(crate::transport::RecordingTransport::new());
    let ctx = SessionContext::new(config, transport.clone());
    (ctx, transport)
}
