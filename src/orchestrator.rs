//! Phase sequence state machine
//!
//! The host owns the single replicated `Phase`. A run of the sequence is one
//! tokio task driven by a `Scheduler`; its `PhaseSequenceHandle` is the only
//! thing `force_stop` needs to cancel. At most one handle is live.

use crate::error::{Cancelled, Rejection};
use crate::podium::{PodiumOutcome, PodiumSequencer};
use crate::presentation::PresentationCoordinator;
use crate::protocol::ServerMessage;
use crate::readiness::ReadinessCoordinator;
use crate::reward::RewardSettlement;
use crate::scheduler::Scheduler;
use crate::session::SessionContext;
use crate::theme::{ThemeAssignment, ThemeSource};
use crate::types::*;
use crate::votes::VoteAggregator;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One in-flight run of the phase sequence
#[derive(Debug)]
pub struct PhaseSequenceHandle {
    pub id: ulid::Ulid,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl PhaseSequenceHandle {
    fn is_live(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the run and wait until its task is gone; pending timers go with it
    async fn stop(self) {
        self.token.cancel();
        self.task.abort();
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                tracing::error!("Phase sequence {} panicked: {}", self.id, e);
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PhaseState {
    phase: Phase,
    version: u64,
}

pub struct PhaseOrchestrator {
    ctx: Arc<SessionContext>,
    readiness: Arc<ReadinessCoordinator>,
    presentation: Arc<PresentationCoordinator>,
    votes: Arc<VoteAggregator>,
    podium: Arc<PodiumSequencer>,
    reward: Arc<RewardSettlement>,
    themes: Arc<dyn ThemeSource>,
    state: RwLock<PhaseState>,
    handle: Mutex<Option<PhaseSequenceHandle>>,
    theme: RwLock<Option<ThemeAssignment>>,
}

impl PhaseOrchestrator {
    pub fn new(
        ctx: Arc<SessionContext>,
        readiness: Arc<ReadinessCoordinator>,
        presentation: Arc<PresentationCoordinator>,
        votes: Arc<VoteAggregator>,
        podium: Arc<PodiumSequencer>,
        reward: Arc<RewardSettlement>,
        themes: Arc<dyn ThemeSource>,
    ) -> Self {
        Self {
            ctx,
            readiness,
            presentation,
            votes,
            podium,
            reward,
            themes,
            state: RwLock::new(PhaseState {
                phase: Phase::Waiting,
                version: 0,
            }),
            handle: Mutex::new(None),
            theme: RwLock::new(None),
        }
    }

    pub async fn phase(&self) -> Phase {
        self.state.read().await.phase
    }

    /// The theme drawn for the current run, if any
    pub async fn current_theme(&self) -> Option<ThemeAssignment> {
        self.theme.read().await.clone()
    }

    /// Write the replicated phase and tell everyone
    pub async fn set_phase(&self, phase: Phase) {
        let mut state = self.state.write().await;
        state.phase = phase;
        state.version += 1;
        tracing::info!("Phase -> {:?} (v{})", phase, state.version);

        self.ctx
            .transport
            .broadcast(ServerMessage::PhaseChanged {
                phase,
                version: state.version,
                server_now: chrono::Utc::now().to_rfc3339(),
            })
            .await;
    }

    pub async fn is_running(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .is_some_and(PhaseSequenceHandle::is_live)
    }

    /// Begin a new run. Rejected while another run is live.
    pub async fn start(self: &Arc<Self>) -> Result<ulid::Ulid, Rejection> {
        let mut handle = self.handle.lock().await;
        if handle.as_ref().is_some_and(PhaseSequenceHandle::is_live) {
            tracing::warn!("Start requested while a phase sequence is running, ignoring");
            return Err(Rejection::AlreadyRunning);
        }

        let id = ulid::Ulid::new();
        let token = CancellationToken::new();
        let sched = Scheduler::new(token.clone());
        let orchestrator = Arc::clone(self);

        tracing::info!("Starting phase sequence {}", id);
        let task = tokio::spawn(async move {
            match orchestrator.run_sequence(&sched).await {
                Ok(()) => tracing::info!("Phase sequence {} finished", id),
                Err(Cancelled) => tracing::info!("Phase sequence {} stopped", id),
            }
            orchestrator.release_handle(id).await;
        });

        *handle = Some(PhaseSequenceHandle { id, token, task });
        Ok(id)
    }

    /// Stop scheduling future transitions. The phase value stays where it is.
    ///
    /// Returns once the run's task has finished, so no transition can land
    /// afterwards. Returns false when nothing was running.
    pub async fn force_stop(&self) -> bool {
        // The task may be waiting on this lock in `release_handle`
        let taken = self.handle.lock().await.take();
        match taken {
            Some(handle) => {
                tracing::info!("Force stopping phase sequence {}", handle.id);
                handle.stop().await;
                true
            }
            None => {
                tracing::debug!("Force stop with no running sequence");
                false
            }
        }
    }

    async fn release_handle(&self, id: ulid::Ulid) {
        let mut handle = self.handle.lock().await;
        if handle.as_ref().is_some_and(|h| h.id == id) {
            *handle = None;
        }
    }

    async fn run_sequence(&self, sched: &Scheduler) -> Result<(), Cancelled> {
        let mut phase = Phase::ThemeDisplay;
        let mut standings = PodiumOutcome::default();
        self.votes.reset().await;

        loop {
            sched.checkpoint()?;
            self.set_phase(phase).await;

            match phase {
                Phase::ThemeDisplay => self.reveal_theme(sched).await?,
                Phase::Customization => self.run_customization(sched).await?,
                Phase::Presentation => self.run_presentation(sched).await?,
                Phase::Podium => standings = self.podium.start_podium_sequence(sched).await?,
                Phase::Reward => {
                    self.reward.settle(sched, &standings.ranking).await?;
                }
                Phase::ReturnToLobby => return self.return_to_lobby(sched).await,
                Phase::Waiting => return Ok(()),
            }

            sched.after(self.ctx.config.phase_delay()).await?;
            phase = phase.next();
        }
    }

    async fn reveal_theme(&self, sched: &Scheduler) -> Result<(), Cancelled> {
        let participants = self.ctx.roster.ids().await;
        if participants.is_empty() {
            tracing::warn!("No participants for the theme reveal");
        }

        match self.themes.assign(&participants) {
            Some(assignment) => {
                tracing::info!(
                    "Theme: {} / {}",
                    assignment.theme.category,
                    assignment.theme.name
                );
                for id in &participants {
                    self.ctx
                        .transport
                        .send_to(
                            *id,
                            ServerMessage::ThemeReveal {
                                category: assignment.theme.category.clone(),
                                theme: assignment.reveal_for(*id).to_string(),
                            },
                        )
                        .await;
                }
                *self.theme.write().await = Some(assignment);
            }
            None => tracing::warn!("Theme source is empty, skipping reveal"),
        }

        sched.after(self.ctx.config.theme_display()).await
    }

    async fn run_customization(&self, sched: &Scheduler) -> Result<(), Cancelled> {
        let duration = self.ctx.config.customization_duration();
        // The impostor must not learn the theme from the broadcast
        let theme = self
            .theme
            .read()
            .await
            .as_ref()
            .filter(|a| a.impostor.is_none())
            .map(|a| a.theme.name.clone());
        let deadline = chrono::Utc::now()
            + chrono::Duration::seconds(i64::from(self.ctx.config.customization_duration_seconds));

        self.ctx
            .transport
            .broadcast(ServerMessage::StartCustomizationTimer {
                seconds: self.ctx.config.customization_duration_seconds,
                theme,
                deadline: deadline.to_rfc3339(),
            })
            .await;

        // Always the full window, no early exit
        sched.after(duration).await
    }

    async fn run_presentation(&self, sched: &Scheduler) -> Result<(), Cancelled> {
        self.ctx
            .transport
            .broadcast(ServerMessage::ApplyAllVisuals)
            .await;

        let order = self.ctx.roster.ids().await;
        let presented = self
            .presentation
            .run_presentation_phase(sched, order)
            .await?;
        tracing::info!("{} participants walked the runway", presented.len());
        Ok(())
    }

    async fn return_to_lobby(&self, sched: &Scheduler) -> Result<(), Cancelled> {
        self.ctx
            .transport
            .broadcast(ServerMessage::ResetVisuals)
            .await;
        self.podium.return_to_spawn().await;

        sched.after(self.ctx.config.phase_delay()).await?;

        self.votes.reset().await;
        self.readiness.reset_all().await;
        *self.theme.write().await = None;
        self.set_phase(Phase::Waiting).await;
        Ok(())
    }
}
