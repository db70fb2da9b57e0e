//! CyberTutor - Telegram bot for hands-on cybersecurity training
//!
//! The bot walks users through four exercises: a k-anonymity password
//! breach check, a simulated phishing drill, themed quizzes with stored
//! scores, and a file scan through VirusTotal with live status updates.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging and small helpers
//! - `storage`: SQLite pool, migrations and queries
//! - `services`: breach lookup, phishing scenarios, quiz bank, scan orchestration
//! - `conversation`: per-user state machines, independent of Telegram
//! - `telegram`: bot setup, dispatcher schema and the Telegram transport

#![allow(clippy::too_many_arguments)]

pub mod cli;
pub mod conversation;
pub mod core;
pub mod i18n;
pub mod services;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
