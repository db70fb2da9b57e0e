//! Domain services: breach lookup, file scanning, quiz catalog and phishing drills

pub mod breach;
pub mod phishing;
pub mod quiz;
pub mod scan;

pub use breach::{BreachClient, BreachError, BreachLookup, Severity};
pub use quiz::{QuizError, Theme};
pub use scan::{ScanError, ScanOrchestrator, ScanOutcome, ScanService};
