use crate::config::SessionConfig;
use crate::types::*;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Connected participants, keyed (and therefore ordered) by id
#[derive(Debug, Default)]
pub struct Roster {
    participants: RwLock<BTreeMap<ParticipantId, Participant>>,
    joined: RwLock<usize>,
}

/// Friendly display name like "brave-otter"
fn generate_display_name(id: ParticipantId) -> String {
    petname::petname(2, "-").unwrap_or_else(|| format!("model-{}", id.0))
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a participant; connecting twice keeps the original entry
    pub async fn insert(&self, id: ParticipantId, config: &SessionConfig) -> Participant {
        let mut participants = self.participants.write().await;
        if let Some(existing) = participants.get(&id) {
            return existing.clone();
        }

        let mut joined = self.joined.write().await;
        let participant = Participant {
            id,
            display_name: generate_display_name(id),
            spawn: config.spawn_for(*joined),
        };
        *joined += 1;

        participants.insert(id, participant.clone());
        participant
    }

    pub async fn remove(&self, id: ParticipantId) -> Option<Participant> {
        self.participants.write().await.remove(&id)
    }

    pub async fn contains(&self, id: ParticipantId) -> bool {
        self.participants.read().await.contains_key(&id)
    }

    pub async fn get(&self, id: ParticipantId) -> Option<Participant> {
        self.participants.read().await.get(&id).cloned()
    }

    /// Connected ids in ascending order
    pub async fn ids(&self) -> Vec<ParticipantId> {
        self.participants.read().await.keys().copied().collect()
    }

    pub async fn all(&self) -> Vec<Participant> {
        self.participants.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.participants.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.participants.read().await.is_empty()
    }

    /// The host participant: the longest-connected participant still present
    pub async fn host(&self) -> Option<ParticipantId> {
        self.participants.read().await.keys().next().copied()
    }

    pub async fn display_name(&self, id: ParticipantId) -> String {
        self.participants
            .read()
            .await
            .get(&id)
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}
