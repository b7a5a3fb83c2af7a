// Session lifecycle engine for the runway party game

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod podium;
pub mod presentation;
pub mod protocol;
pub mod readiness;
pub mod reward;
pub mod scheduler;
pub mod session;
pub mod theme;
pub mod transport;
pub mod types;
pub mod votes;
pub mod ws;
