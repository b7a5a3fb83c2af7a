//! Podium staging
//!
//! Top ranked participants are moved onto fixed podium spots for a timed
//! display, then everyone goes back to their lobby spawn.

use crate::error::Cancelled;
use crate::protocol::{RankingLine, ServerMessage};
use crate::scheduler::Scheduler;
use crate::session::SessionContext;
use crate::types::*;
use crate::votes::VoteAggregator;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A participant standing on the podium
#[derive(Debug, Clone, PartialEq)]
pub struct PodiumPlacement {
    /// 1-based
    pub rank: u32,
    pub participant_id: ParticipantId,
    pub transform: Transform,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PodiumOutcome {
    pub ranking: Vec<RankingEntry>,
    pub placements: Vec<PodiumPlacement>,
}

pub struct PodiumSequencer {
    ctx: Arc<SessionContext>,
    votes: Arc<VoteAggregator>,
    displayed: RwLock<bool>,
}

impl PodiumSequencer {
    pub fn new(ctx: Arc<SessionContext>, votes: Arc<VoteAggregator>) -> Self {
        Self {
            ctx,
            votes,
            displayed: RwLock::new(false),
        }
    }

    pub async fn start_podium_sequence(
        &self,
        sched: &Scheduler,
    ) -> Result<PodiumOutcome, Cancelled> {
        let ranking = self.votes.ranked_results().await;

        if !ranking.iter().any(RankingEntry::has_votes) {
            tracing::warn!("No votes were cast, podium stays empty");
            self.return_to_spawn().await;
            return Ok(PodiumOutcome {
                ranking,
                placements: Vec::new(),
            });
        }

        let placements = self.assign_places(&ranking);
        for placement in &placements {
            tracing::info!(
                "{} takes podium place {}",
                placement.participant_id,
                placement.rank
            );
            // Directed: each client only moves its own avatar
            self.ctx
                .transport
                .send_to(
                    placement.participant_id,
                    ServerMessage::TeleportTo {
                        transform: placement.transform,
                    },
                )
                .await;
        }

        let entries = self.ranking_lines(&ranking).await;
        self.ctx
            .transport
            .broadcast(ServerMessage::RankingDisplay { entries })
            .await;
        *self.displayed.write().await = true;

        sched.after(self.ctx.config.podium_display()).await?;

        self.return_to_spawn().await;
        self.hide().await;

        Ok(PodiumOutcome {
            ranking,
            placements,
        })
    }

    /// Podium places for the best entries that received votes
    fn assign_places(&self, ranking: &[RankingEntry]) -> Vec<PodiumPlacement> {
        ranking
            .iter()
            .filter(|e| e.has_votes())
            .take(self.ctx.config.podium_slots())
            .zip(self.ctx.config.podium_positions.iter())
            .enumerate()
            .map(|(i, (entry, transform))| PodiumPlacement {
                rank: i as u32 + 1,
                participant_id: entry.participant_id,
                transform: *transform,
            })
            .collect()
    }

    async fn ranking_lines(&self, ranking: &[RankingEntry]) -> Vec<RankingLine> {
        let mut lines = Vec::with_capacity(ranking.len());
        for entry in ranking {
            lines.push(RankingLine {
                participant_id: entry.participant_id,
                display_name: self.ctx.roster.display_name(entry.participant_id).await,
                score: entry.average_score,
                votes: entry.vote_count,
            });
        }
        lines
    }

    /// Send every connected participant back to their spawn point
    pub async fn return_to_spawn(&self) {
        for participant in self.ctx.roster.all().await {
            self.ctx
                .transport
                .send_to(
                    participant.id,
                    ServerMessage::TeleportTo {
                        transform: participant.spawn,
                    },
                )
                .await;
        }
    }

    /// Hide the ranking display if it is showing
    pub async fn hide(&self) {
        let mut displayed = self.displayed.write().await;
        if *displayed {
            *displayed = false;
            self.ctx.transport.broadcast(ServerMessage::HidePodium).await;
        }
    }

    pub async fn is_displayed(&self) -> bool {
        *self.displayed.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_context;
    use crate::transport::RecordingTransport;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    type Fixture = (
        Arc<PodiumSequencer>,
        Arc<VoteAggregator>,
        Arc<SessionContext>,
        Arc<RecordingTransport>,
    );

    async fn setup(ids: &[u64]) -> Fixture {
        let (ctx, transport) = test_context();
        for id in ids {
            ctx.roster.insert(ParticipantId(*id), &ctx.config).await;
        }
        let votes = Arc::new(VoteAggregator::new());
        let podium = Arc::new(PodiumSequencer::new(ctx.clone(), votes.clone()));
        (podium, votes, ctx, transport)
    }

    async fn cast(votes: &VoteAggregator, presenter: u64, ballots: &[(u64, i32)]) {
        votes
            .open_window(ParticipantId(presenter), GameMode::GRADED.vote_scale())
            .await;
        for (voter, score) in ballots {
            votes
                .submit_vote(ParticipantId(*voter), ParticipantId(presenter), *score)
                .await
                .unwrap();
        }
        votes.close_window().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_top_entries_take_the_podium() {
        let (podium, votes, ctx, transport) = setup(&[1, 2, 3]).await;
        cast(&votes, 1, &[(2, 5), (3, 5)]).await;
        cast(&votes, 2, &[(1, 3)]).await;
        cast(&votes, 3, &[]).await;

        let start = tokio::time::Instant::now();
        let outcome = podium
            .start_podium_sequence(&Scheduler::new(CancellationToken::new()))
            .await
            .unwrap();
        assert!(start.elapsed() >= ctx.config.podium_display());

        let placed: Vec<(u32, ParticipantId)> = outcome
            .placements
            .iter()
            .map(|p| (p.rank, p.participant_id))
            .collect();
        assert_eq!(placed, vec![(1, ParticipantId(1)), (2, ParticipantId(2))]);
        assert_eq!(outcome.placements[0].transform, ctx.config.podium_positions[0]);

        // Podium spot first, then back to spawn
        let spawn = ctx.roster.get(ParticipantId(1)).await.unwrap().spawn;
        assert_eq!(
            transport.sent_to(ParticipantId(1)).await,
            vec![
                ServerMessage::TeleportTo { transform: ctx.config.podium_positions[0] },
                ServerMessage::TeleportTo { transform: spawn },
            ]
        );

        let broadcasts = transport.broadcasts().await;
        assert!(matches!(
            broadcasts.as_slice(),
            [ServerMessage::RankingDisplay { .. }, ServerMessage::HidePodium]
        ));
        if let ServerMessage::RankingDisplay { entries } = &broadcasts[0] {
            assert_eq!(entries.len(), 3);
            assert_eq!(entries[0].participant_id, ParticipantId(1));
            assert_eq!(entries[0].score, 5.0);
            assert_eq!(entries[2].votes, 0);
        }
        assert!(!podium.is_displayed().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_votes_skips_the_display() {
        let (podium, votes, ctx, transport) = setup(&[1, 2]).await;
        cast(&votes, 1, &[]).await;
        cast(&votes, 2, &[]).await;

        let start = tokio::time::Instant::now();
        let outcome = podium
            .start_podium_sequence(&Scheduler::new(CancellationToken::new()))
            .await
            .unwrap();

        assert!(outcome.placements.is_empty());
        assert!(start.elapsed() < ctx.config.podium_display());
        assert!(transport.broadcasts().await.is_empty());
        for id in [1, 2] {
            assert!(matches!(
                transport.sent_to(ParticipantId(id)).await.as_slice(),
                [ServerMessage::TeleportTo { .. }]
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_podium_slots_cap_placements() {
        let (podium, votes, ctx, _) = setup(&[1, 2, 3, 4, 5]).await;
        for presenter in 1..=5u64 {
            let voter = if presenter == 1 { 2 } else { 1 };
            cast(&votes, presenter, &[(voter, presenter as i32)]).await;
        }

        let outcome = podium
            .start_podium_sequence(&Scheduler::new(CancellationToken::new()))
            .await
            .unwrap();
        assert_eq!(outcome.placements.len(), ctx.config.podium_slots());
        assert_eq!(outcome.placements[0].participant_id, ParticipantId(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_leaves_display_for_hide() {
        let (podium, votes, _, transport) = setup(&[1, 2]).await;
        cast(&votes, 1, &[(2, 4)]).await;

        let token = CancellationToken::new();
        let runner = {
            let podium = podium.clone();
            let sched = Scheduler::new(token.clone());
            tokio::spawn(async move { podium.start_podium_sequence(&sched).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
        assert_eq!(runner.await.unwrap(), Err(Cancelled));
        assert!(podium.is_displayed().await);

        podium.hide().await;
        podium.hide().await;
        let hides = transport
            .broadcasts()
            .await
            .into_iter()
            .filter(|m| *m == ServerMessage::HidePodium)
            .count();
        assert_eq!(hides, 1);
    }
}
