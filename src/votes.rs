//! Vote collection and ranking
//!
//! Votes are only accepted for the participant currently on stage. Each
//! `(voter, target)` pair counts once; the first submission wins.

use crate::error::Rejection;
use crate::types::*;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

/// The open voting window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenterWindow {
    pub presenter: ParticipantId,
    pub scale: VoteScale,
}

#[derive(Debug, Default)]
struct VoteBook {
    window: Option<PresenterWindow>,
    /// target -> (voter, score) in arrival order
    received: BTreeMap<ParticipantId, Vec<(ParticipantId, u8)>>,
    /// Everyone who went on stage, voted for or not
    candidates: BTreeSet<ParticipantId>,
}

#[derive(Debug, Default)]
pub struct VoteAggregator {
    book: RwLock<VoteBook>,
}

impl VoteAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start accepting votes for `presenter`
    pub async fn open_window(&self, presenter: ParticipantId, scale: VoteScale) {
        let mut book = self.book.write().await;
        book.candidates.insert(presenter);
        book.window = Some(PresenterWindow { presenter, scale });
    }

    pub async fn close_window(&self) {
        self.book.write().await.window = None;
    }

    pub async fn active_window(&self) -> Option<PresenterWindow> {
        self.book.read().await.window
    }

    /// Record a vote. Returns the normalized score that was stored.
    pub async fn submit_vote(
        &self,
        voter: ParticipantId,
        target: ParticipantId,
        score: i32,
    ) -> Result<u8, Rejection> {
        let mut book = self.book.write().await;

        let window = match book.window {
            Some(w) if w.presenter == target => w,
            _ => return Err(Rejection::OutsideWindow { target }),
        };
        if voter == target {
            return Err(Rejection::SelfVote(voter));
        }

        let ballots = book.received.entry(target).or_default();
        if ballots.iter().any(|(v, _)| *v == voter) {
            return Err(Rejection::DuplicateVote { voter, target });
        }

        let normalized = window.scale.normalize(score);
        ballots.push((voter, normalized));
        tracing::debug!("{} scored {} with {}", voter, target, normalized);
        Ok(normalized)
    }

    /// Scores received by `target`, in arrival order
    pub async fn scores_for(&self, target: ParticipantId) -> Vec<u8> {
        self.book
            .read()
            .await
            .received
            .get(&target)
            .map(|ballots| ballots.iter().map(|(_, s)| *s).collect())
            .unwrap_or_default()
    }

    /// Deterministic ranking derived from the current votes. Pure read.
    pub async fn ranked_results(&self) -> Vec<RankingEntry> {
        let book = self.book.read().await;
        rank(&book.received, &book.candidates)
    }

    /// Forget everything a disconnected participant gave or received
    pub async fn purge(&self, id: ParticipantId) {
        let mut book = self.book.write().await;
        book.received.remove(&id);
        book.candidates.remove(&id);
        for ballots in book.received.values_mut() {
            ballots.retain(|(voter, _)| *voter != id);
        }
        book.received.retain(|_, ballots| !ballots.is_empty());
    }

    /// Full session reset
    pub async fn reset(&self) {
        *self.book.write().await = VoteBook::default();
    }
}

/// Order targets by mean score, highest first.
///
/// Ties and zero-vote candidates fall back to ascending id; zero-vote
/// candidates always come after everyone who received a vote.
pub fn rank(
    received: &BTreeMap<ParticipantId, Vec<(ParticipantId, u8)>>,
    candidates: &BTreeSet<ParticipantId>,
) -> Vec<RankingEntry> {
    let mut voted: Vec<RankingEntry> = received
        .iter()
        .filter(|(_, ballots)| !ballots.is_empty())
        .map(|(target, ballots)| {
            let sum: u32 = ballots.iter().map(|(_, s)| u32::from(*s)).sum();
            RankingEntry {
                participant_id: *target,
                average_score: f64::from(sum) / ballots.len() as f64,
                vote_count: ballots.len() as u32,
            }
        })
        .collect();

    voted.sort_by(|a, b| {
        match b.average_score.total_cmp(&a.average_score) {
            Ordering::Equal => a.participant_id.cmp(&b.participant_id),
            other => other,
        }
    });

    // BTreeSet iteration is already ascending
    let unvoted = candidates
        .iter()
        .filter(|id| !received.get(id).is_some_and(|b| !b.is_empty()))
        .map(|id| RankingEntry {
            participant_id: *id,
            average_score: 0.0,
            vote_count: 0,
        });

    voted.extend(unvoted);
    voted
}
