//! Host-side session configuration

use crate::error::ConfigError;
use crate::types::Transform;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    pub theme_display_seconds: u32,
    pub customization_duration_seconds: u32,
    pub presentation_per_participant_seconds: u32,
    /// Pause between one presenter leaving the stage and the next one starting
    pub presentation_gap_seconds: u32,
    pub podium_display_seconds: u32,
    pub delay_between_major_phases_seconds: u32,
    pub max_podium_slots: usize,
    pub auto_start_countdown_seconds: u32,
    /// Upper bound on waiting for reward confirmations
    pub reward_ack_timeout_seconds: u32,
    /// Reward for podium rank 1, 2, 3...
    pub reward_by_rank: Vec<u32>,
    /// Reward for everyone not on the podium
    pub participation_reward: u32,
    pub podium_positions: Vec<Transform>,
    pub spawn_positions: Vec<Transform>,
    pub runway_start: Transform,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            theme_display_seconds: 5,
            customization_duration_seconds: 90,
            presentation_per_participant_seconds: 12,
            presentation_gap_seconds: 2,
            podium_display_seconds: 10,
            delay_between_major_phases_seconds: 2,
            max_podium_slots: 3,
            auto_start_countdown_seconds: 3,
            reward_ack_timeout_seconds: 30,
            reward_by_rank: vec![300, 200, 100],
            participation_reward: 50,
            podium_positions: vec![
                Transform::new(0.0, 1.5, 20.0, 180.0),
                Transform::new(-2.0, 1.0, 20.0, 180.0),
                Transform::new(2.0, 0.5, 20.0, 180.0),
            ],
            spawn_positions: (0..8)
                .map(|i| Transform::new(-7.0 + 2.0 * i as f32, 0.0, 0.0, 0.0))
                .collect(),
            runway_start: Transform::new(0.0, 0.0, 5.0, 0.0),
        }
    }
}

impl SessionConfig {
    /// Load overrides from `RUNWAY_*` environment variables.
    ///
    /// Invalid values are logged and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        override_from_env(
            "RUNWAY_THEME_DISPLAY_SECONDS",
            &mut config.theme_display_seconds,
        );
        override_from_env(
            "RUNWAY_CUSTOMIZATION_SECONDS",
            &mut config.customization_duration_seconds,
        );
        override_from_env(
            "RUNWAY_PRESENTATION_SECONDS",
            &mut config.presentation_per_participant_seconds,
        );
        override_from_env(
            "RUNWAY_PRESENTATION_GAP_SECONDS",
            &mut config.presentation_gap_seconds,
        );
        override_from_env(
            "RUNWAY_PODIUM_DISPLAY_SECONDS",
            &mut config.podium_display_seconds,
        );
        override_from_env(
            "RUNWAY_PHASE_DELAY_SECONDS",
            &mut config.delay_between_major_phases_seconds,
        );
        override_from_env("RUNWAY_MAX_PODIUM_SLOTS", &mut config.max_podium_slots);
        override_from_env(
            "RUNWAY_AUTO_START_SECONDS",
            &mut config.auto_start_countdown_seconds,
        );
        override_from_env(
            "RUNWAY_REWARD_ACK_TIMEOUT_SECONDS",
            &mut config.reward_ack_timeout_seconds,
        );
        override_from_env(
            "RUNWAY_PARTICIPATION_REWARD",
            &mut config.participation_reward,
        );

        match parse_list::<u32>("RUNWAY_REWARD_BY_RANK") {
            Ok(Some(rewards)) => config.reward_by_rank = rewards,
            Ok(None) => {}
            Err(e) => tracing::warn!("{}, keeping default", e),
        }

        config
    }

    pub fn theme_display(&self) -> Duration {
        secs(self.theme_display_seconds)
    }

    pub fn customization_duration(&self) -> Duration {
        secs(self.customization_duration_seconds)
    }

    pub fn presentation_window(&self) -> Duration {
        secs(self.presentation_per_participant_seconds)
    }

    pub fn presentation_gap(&self) -> Duration {
        secs(self.presentation_gap_seconds)
    }

    pub fn podium_display(&self) -> Duration {
        secs(self.podium_display_seconds)
    }

    pub fn phase_delay(&self) -> Duration {
        secs(self.delay_between_major_phases_seconds)
    }

    pub fn auto_start_countdown(&self) -> Duration {
        secs(self.auto_start_countdown_seconds)
    }

    pub fn reward_ack_timeout(&self) -> Duration {
        secs(self.reward_ack_timeout_seconds)
    }

    /// Number of podium places actually usable with the configured geometry
    pub fn podium_slots(&self) -> usize {
        self.max_podium_slots.min(self.podium_positions.len())
    }

    /// Spawn point for the n-th connection (round-robin)
    pub fn spawn_for(&self, slot: usize) -> Transform {
        if self.spawn_positions.is_empty() {
            return Transform::default();
        }
        self.spawn_positions[slot % self.spawn_positions.len()]
    }
}

fn secs(seconds: u32) -> Duration {
    Duration::from_secs(u64::from(seconds))
}

fn override_from_env<T: FromStr>(var: &'static str, target: &mut T) {
    match parse_var(var) {
        Ok(Some(value)) => *target = value,
        Ok(None) => {}
        Err(e) => tracing::warn!("{}, keeping default", e),
    }
}

fn parse_var<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    let raw = match std::env::var(var) {
        Ok(raw) => raw,
        Err(_) => return Ok(None),
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::Invalid {
            var,
            expected: "a non-negative integer",
            value: raw.clone(),
        })
}

fn parse_list<T: FromStr>(var: &'static str) -> Result<Option<Vec<T>>, ConfigError> {
    let raw = match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw,
        _ => return Ok(None),
    };

    raw.split(',')
        .map(|part| part.trim().parse::<T>())
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
        .map_err(|_| ConfigError::Invalid {
            var,
            expected: "a comma separated list of integers",
            value: raw.clone(),
        })
}
