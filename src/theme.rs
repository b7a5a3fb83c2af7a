//! Theme selection for the reveal phase

use crate::types::*;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// The round's theme plus the impostor, if one was drawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeAssignment {
    pub theme: Theme,
    pub impostor: Option<ParticipantId>,
}

impl ThemeAssignment {
    /// Theme text shown to `id`
    pub fn reveal_for(&self, id: ParticipantId) -> &str {
        if self.impostor == Some(id) {
            IMPOSTOR_THEME
        } else {
            &self.theme.name
        }
    }
}

/// Picks the theme for a round
pub trait ThemeSource: Send + Sync {
    /// `None` means there is nothing to pick from
    fn assign(&self, participants: &[ParticipantId]) -> Option<ThemeAssignment>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeCategory {
    pub name: String,
    pub themes: Vec<String>,
}

/// Bundled theme list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeCatalog {
    pub categories: Vec<ThemeCategory>,
    /// Hand one participant the impostor reveal (needs at least three players)
    pub impostor: bool,
}

/// Smallest lobby where an impostor round makes sense
const MIN_PLAYERS_FOR_IMPOSTOR: usize = 3;

impl ThemeCatalog {
    pub fn new(categories: Vec<ThemeCategory>) -> Self {
        Self {
            categories,
            impostor: false,
        }
    }

    pub fn with_impostor(mut self, impostor: bool) -> Self {
        self.impostor = impostor;
        self
    }

    pub fn pick<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        participants: &[ParticipantId],
    ) -> Option<ThemeAssignment> {
        let usable: Vec<&ThemeCategory> = self
            .categories
            .iter()
            .filter(|c| !c.themes.is_empty())
            .collect();
        let category = usable.choose(rng)?;
        let name = category.themes.choose(rng)?;

        let impostor = if self.impostor && participants.len() >= MIN_PLAYERS_FOR_IMPOSTOR {
            participants.choose(rng).copied()
        } else {
            None
        };

        Some(ThemeAssignment {
            theme: Theme {
                category: category.name.clone(),
                name: name.clone(),
            },
            impostor,
        })
    }
}

impl ThemeSource for ThemeCatalog {
    fn assign(&self, participants: &[ParticipantId]) -> Option<ThemeAssignment> {
        self.pick(&mut rand::rng(), participants)
    }
}

impl Default for ThemeCatalog {
    fn default() -> Self {
        let category = |name: &str, themes: &[&str]| ThemeCategory {
            name: name.to_string(),
            themes: themes.iter().map(|t| t.to_string()).collect(),
        };

        Self::new(vec![
            category("Seasons", &["Summer Vacation", "Winter Wonderland", "Spring Bloom"]),
            category("Jobs", &["Astronaut", "Chef", "Detective", "Rock Star"]),
            category("Eras", &["Medieval", "Disco", "Far Future"]),
            category("Parties", &["Halloween", "Royal Ball", "Beach Party"]),
        ])
    }
}
