//! Reward settlement
//!
//! Amounts come from podium rank. The profile store is external; failures
//! there are logged and never stop the sequence. The phase ends once every
//! connected participant has confirmed, or after the configured timeout.

use crate::config::SessionConfig;
use crate::error::{Cancelled, RewardError};
use crate::protocol::ServerMessage;
use crate::scheduler::{Scheduler, WaitOutcome};
use crate::session::SessionContext;
use crate::types::*;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

/// Persistent player profiles (currency etc.) live outside this crate
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn grant_reward(
        &self,
        participant: ParticipantId,
        amount: u32,
    ) -> Result<(), RewardError>;
}

/// Profile store that keeps balances in memory
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    balances: RwLock<HashMap<ParticipantId, u64>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn balance(&self, participant: ParticipantId) -> u64 {
        self.balances
            .read()
            .await
            .get(&participant)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn grant_reward(
        &self,
        participant: ParticipantId,
        amount: u32,
    ) -> Result<(), RewardError> {
        *self.balances.write().await.entry(participant).or_insert(0) += u64::from(amount);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardGrant {
    pub participant_id: ParticipantId,
    /// Podium rank, if any
    pub rank: Option<u32>,
    pub amount: u32,
}

/// Reward for every connected participant given the final ranking
pub fn reward_amounts(
    config: &SessionConfig,
    ranking: &[RankingEntry],
    connected: &[ParticipantId],
) -> Vec<RewardGrant> {
    let podium: Vec<ParticipantId> = ranking
        .iter()
        .filter(|e| e.has_votes())
        .take(config.podium_slots())
        .map(|e| e.participant_id)
        .collect();

    connected
        .iter()
        .map(|id| {
            let rank = podium.iter().position(|p| p == id).map(|i| i as u32 + 1);
            let amount = rank
                .and_then(|r| config.reward_by_rank.get(r as usize - 1).copied())
                .unwrap_or(config.participation_reward);
            RewardGrant {
                participant_id: *id,
                rank,
                amount,
            }
        })
        .collect()
}

pub struct RewardSettlement {
    ctx: Arc<SessionContext>,
    store: Arc<dyn ProfileStore>,
    /// Participants whose confirmation is still outstanding
    pending: watch::Sender<BTreeSet<ParticipantId>>,
}

impl RewardSettlement {
    pub fn new(ctx: Arc<SessionContext>, store: Arc<dyn ProfileStore>) -> Self {
        let (pending, _) = watch::channel(BTreeSet::new());
        Self {
            ctx,
            store,
            pending,
        }
    }

    /// Grant rewards and wait for every connected participant to confirm
    pub async fn settle(
        &self,
        sched: &Scheduler,
        ranking: &[RankingEntry],
    ) -> Result<Vec<RewardGrant>, Cancelled> {
        let connected = self.ctx.roster.ids().await;
        if connected.is_empty() {
            tracing::warn!("Nobody connected at reward time, skipping settlement");
            return Ok(Vec::new());
        }

        let grants = reward_amounts(&self.ctx.config, ranking, &connected);
        // Arm before sending so fast confirmations are not lost
        self.pending.send_replace(connected.iter().copied().collect());

        for grant in &grants {
            if let Err(e) = self
                .store
                .grant_reward(grant.participant_id, grant.amount)
                .await
            {
                tracing::error!(
                    "Failed to grant {} to {}: {}",
                    grant.amount,
                    grant.participant_id,
                    e
                );
            }
            self.ctx
                .transport
                .send_to(
                    grant.participant_id,
                    ServerMessage::RewardGranted {
                        rank: grant.rank,
                        amount: grant.amount,
                    },
                )
                .await;
        }

        let mut rx = self.pending.subscribe();
        let outcome = sched
            .wait_until(&mut rx, self.ctx.config.reward_ack_timeout(), |p| p.is_empty())
            .await;
        let left = self.pending.send_replace(BTreeSet::new());

        match outcome? {
            WaitOutcome::Satisfied => tracing::info!("All participants confirmed their rewards"),
            WaitOutcome::TimedOut => tracing::warn!(
                "Reward confirmation timed out, {} still pending",
                left.len()
            ),
            WaitOutcome::Closed => {}
        }

        Ok(grants)
    }

    /// A participant finished its reward UI. Returns false if nothing was pending.
    pub fn acknowledge(&self, id: ParticipantId) -> bool {
        let mut removed = false;
        self.pending.send_if_modified(|pending| {
            removed = pending.remove(&id);
            removed
        });
        removed
    }

    /// Disconnected participants no longer hold up the phase
    pub fn forget(&self, id: ParticipantId) {
        self.acknowledge(id);
    }

    pub fn pending(&self) -> BTreeSet<ParticipantId> {
        self.pending.borrow().clone()
    }
}
