//! I/O helpers for stepchat commands.

pub mod config;
pub mod prompt;
pub mod provider;
pub mod script;
pub mod transcript_log;
pub mod turns;
