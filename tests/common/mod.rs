//! Common test utilities
//!
//! This module is shared across all integration tests

pub mod fixtures;
pub mod recorder;

#[allow(unused_imports)]
pub use fixtures::{callback, command, file, scan_settings, temp_pool, text, TestBot, USER};
#[allow(unused_imports)]
pub use recorder::{Call, RecordingTransport, ScriptedScanService};
