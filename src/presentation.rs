//! Runway presentation
//!
//! Puts one participant on stage at a time. The presenter window is shared by
//! the walk animation and by voting, and always runs its full length.

use crate::error::{Cancelled, Rejection};
use crate::protocol::ServerMessage;
use crate::readiness::ReadinessCoordinator;
use crate::scheduler::Scheduler;
use crate::session::SessionContext;
use crate::types::*;
use crate::votes::VoteAggregator;
use std::sync::Arc;

pub struct PresentationCoordinator {
    ctx: Arc<SessionContext>,
    readiness: Arc<ReadinessCoordinator>,
    votes: Arc<VoteAggregator>,
}

impl PresentationCoordinator {
    pub fn new(
        ctx: Arc<SessionContext>,
        readiness: Arc<ReadinessCoordinator>,
        votes: Arc<VoteAggregator>,
    ) -> Self {
        Self {
            ctx,
            readiness,
            votes,
        }
    }

    /// Present everyone in `order`, one window each.
    ///
    /// Participants who left before their turn are skipped. Returns the ids
    /// that actually went on stage.
    pub async fn run_presentation_phase(
        &self,
        sched: &Scheduler,
        mut order: Vec<ParticipantId>,
    ) -> Result<Vec<ParticipantId>, Cancelled> {
        order.sort();
        order.dedup();

        if order.is_empty() {
            tracing::warn!("Presentation phase with no participants, skipping");
            return Ok(Vec::new());
        }

        // The mode cannot change once the sequence is running
        let scale = self.readiness.game_mode().await.vote_scale();
        let window = self.ctx.config.presentation_window();
        let seconds = self.ctx.config.presentation_per_participant_seconds;
        let total = order.len();
        let mut presented = Vec::with_capacity(total);

        for (i, presenter) in order.into_iter().enumerate() {
            sched.checkpoint()?;
            if !self.ctx.roster.contains(presenter).await {
                tracing::info!("{} left before their runway turn, skipping", presenter);
                continue;
            }

            tracing::info!("{} is now presenting", presenter);
            self.votes.open_window(presenter, scale).await;
            self.ctx
                .transport
                .broadcast(ServerMessage::PresenterChanged {
                    presenter: Some(presenter),
                    seconds: Some(seconds),
                    scale: Some(scale),
                })
                .await;
            self.ctx
                .transport
                .send_to(
                    presenter,
                    ServerMessage::BeginRunway {
                        seconds,
                        start: self.ctx.config.runway_start,
                    },
                )
                .await;

            // Full window even if the presenter disconnects meanwhile
            let waited = sched.after(window).await;
            self.votes.close_window().await;
            waited?;

            self.ctx
                .transport
                .broadcast(ServerMessage::PresenterChanged {
                    presenter: None,
                    seconds: None,
                    scale: None,
                })
                .await;
            presented.push(presenter);

            if i + 1 < total {
                sched.after(self.ctx.config.presentation_gap()).await?;
            }
        }

        Ok(presented)
    }

    /// Votes pass through untouched; scoring lives in the aggregator
    pub async fn submit_vote(
        &self,
        voter: ParticipantId,
        target: ParticipantId,
        score: i32,
    ) -> Result<u8, Rejection> {
        self.votes.submit_vote(voter, target, score).await
    }

    pub async fn current_presenter(&self) -> Option<ParticipantId> {
        self.votes.active_window().await.map(|w| w.presenter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{test_context, SessionContext};
    use crate::transport::RecordingTransport;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    type Fixture = (
        Arc<PresentationCoordinator>,
        Arc<VoteAggregator>,
        Arc<SessionContext>,
        Arc<RecordingTransport>,
    );

    async fn setup(ids: &[u64]) -> Fixture {
        let (ctx, transport) = test_context();
        let readiness = Arc::new(ReadinessCoordinator::new(ctx.clone()));
        for id in ids {
            ctx.roster.insert(ParticipantId(*id), &ctx.config).await;
            readiness.on_connect(ParticipantId(*id)).await;
        }
        let votes = Arc::new(VoteAggregator::new());
        let presentation = Arc::new(PresentationCoordinator::new(
            ctx.clone(),
            readiness,
            votes.clone(),
        ));
        transport.clear().await;
        (presentation, votes, ctx, transport)
    }

    fn presenters(broadcasts: &[ServerMessage]) -> Vec<Option<ParticipantId>> {
        broadcasts
            .iter()
            .filter_map(|m| match m {
                ServerMessage::PresenterChanged { presenter, .. } => Some(*presenter),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_everyone_presents_in_order() {
        let (presentation, _, ctx, transport) = setup(&[2, 1]).await;
        let sched = Scheduler::new(CancellationToken::new());
        let start = tokio::time::Instant::now();

        let presented = presentation
            .run_presentation_phase(&sched, vec![ParticipantId(2), ParticipantId(1)])
            .await
            .unwrap();
        assert_eq!(presented, vec![ParticipantId(1), ParticipantId(2)]);

        // Two full windows and one gap between them
        let expected = ctx.config.presentation_window() * 2 + ctx.config.presentation_gap();
        assert!(start.elapsed() >= expected);

        assert_eq!(
            presenters(&transport.broadcasts().await),
            vec![Some(ParticipantId(1)), None, Some(ParticipantId(2)), None]
        );
        assert!(matches!(
            transport.sent_to(ParticipantId(1)).await.as_slice(),
            [ServerMessage::BeginRunway { .. }]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_departed_participant_is_skipped() {
        let (presentation, _, ctx, transport) = setup(&[1, 2, 3]).await;
        ctx.roster.remove(ParticipantId(2)).await;
        let sched = Scheduler::new(CancellationToken::new());

        let presented = presentation
            .run_presentation_phase(
                &sched,
                vec![ParticipantId(1), ParticipantId(2), ParticipantId(3)],
            )
            .await
            .unwrap();
        assert_eq!(presented, vec![ParticipantId(1), ParticipantId(3)]);
        assert!(transport.sent_to(ParticipantId(2)).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_presenter_leaving_keeps_full_window() {
        let (presentation, _, ctx, transport) = setup(&[1, 2]).await;
        let sched = Scheduler::new(CancellationToken::new());
        let start = tokio::time::Instant::now();

        let runner = {
            let presentation = presentation.clone();
            tokio::spawn(async move {
                presentation
                    .run_presentation_phase(&sched, vec![ParticipantId(1), ParticipantId(2)])
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        ctx.roster.remove(ParticipantId(1)).await;

        let window = ctx.config.presentation_window();
        tokio::time::sleep_until(start + window - Duration::from_secs(1)).await;
        assert_eq!(presentation.current_presenter().await, Some(ParticipantId(1)));

        let next_turn = start + window + ctx.config.presentation_gap();
        tokio::time::sleep_until(next_turn - Duration::from_millis(500)).await;
        assert!(!presenters(&transport.broadcasts().await).contains(&Some(ParticipantId(2))));

        let presented = runner.await.unwrap().unwrap();
        assert_eq!(presented, vec![ParticipantId(1), ParticipantId(2)]);
        assert_eq!(
            presenters(&transport.broadcasts().await),
            vec![Some(ParticipantId(1)), None, Some(ParticipantId(2)), None]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_order_returns_immediately() {
        let (presentation, _, _, transport) = setup(&[]).await;
        let sched = Scheduler::new(CancellationToken::new());

        let presented = presentation.run_presentation_phase(&sched, vec![]).await.unwrap();
        assert!(presented.is_empty());
        assert!(transport.messages().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_votes_only_count_for_current_presenter() {
        let (presentation, votes, _, _) = setup(&[1, 2]).await;
        let sched = Scheduler::new(CancellationToken::new());

        let runner = {
            let presentation = presentation.clone();
            let sched = sched.clone();
            tokio::spawn(async move {
                presentation
                    .run_presentation_phase(&sched, vec![ParticipantId(1), ParticipantId(2)])
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(presentation.current_presenter().await, Some(ParticipantId(1)));
        assert_eq!(presentation.submit_vote(ParticipantId(2), ParticipantId(1), 4).await, Ok(4));
        assert!(presentation.submit_vote(ParticipantId(1), ParticipantId(2), 4).await.is_err());

        runner.await.unwrap().unwrap();
        assert_eq!(presentation.current_presenter().await, None);
        assert_eq!(votes.scores_for(ParticipantId(1)).await, vec![4]);
        assert!(votes.scores_for(ParticipantId(2)).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_closes_the_window() {
        let (presentation, votes, _, _) = setup(&[1, 2]).await;
        let token = CancellationToken::new();
        let sched = Scheduler::new(token.clone());

        let runner = {
            let presentation = presentation.clone();
            tokio::spawn(async move {
                presentation
                    .run_presentation_phase(&sched, vec![ParticipantId(1), ParticipantId(2)])
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();

        assert_eq!(runner.await.unwrap(), Err(Cancelled));
        assert!(votes.active_window().await.is_none());
    }
}
