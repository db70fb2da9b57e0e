//! Inline button payloads.
//!
//! Encoded as short colon-separated strings to stay well under the 64-byte
//! callback data limit.

use std::fmt;
use std::str::FromStr;

use crate::services::phishing::Scenario;
use crate::services::quiz::{QuizError, Theme};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Main,
    Password,
    Phishing,
    Quiz,
    Upload,
    Progress,
}

impl MenuItem {
    fn id(&self) -> &'static str {
        match self {
            MenuItem::Main => "main",
            MenuItem::Password => "password",
            MenuItem::Phishing => "phishing",
            MenuItem::Quiz => "quiz",
            MenuItem::Upload => "upload",
            MenuItem::Progress => "progress",
        }
    }

    fn from_id(id: &str) -> Option<Self> {
        Some(match id {
            "main" => MenuItem::Main,
            "password" => MenuItem::Password,
            "phishing" => MenuItem::Phishing,
            "quiz" => MenuItem::Quiz,
            "upload" => MenuItem::Upload,
            "progress" => MenuItem::Progress,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Menu(MenuItem),
    PickScenario(Scenario),
    PhishingClick,
    PhishingReport,
    PhishingRestart,
    PickTheme(Theme),
    Answer { question: usize, option: usize },
    NextQuestion,
    CancelUpload,
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::Menu(item) => write!(f, "menu:{}", item.id()),
            CallbackAction::PickScenario(s) => write!(f, "phish:pick:{}", s.id()),
            CallbackAction::PhishingClick => f.write_str("phish:click"),
            CallbackAction::PhishingReport => f.write_str("phish:report"),
            CallbackAction::PhishingRestart => f.write_str("phish:restart"),
            CallbackAction::PickTheme(t) => write!(f, "quiz:theme:{}", t.id()),
            CallbackAction::Answer { question, option } => write!(f, "answer:{}:{}", question, option),
            CallbackAction::NextQuestion => f.write_str("quiz:next"),
            CallbackAction::CancelUpload => f.write_str("upload:cancel"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallbackError {
    #[error("unrecognized callback data: {0}")]
    Unrecognized(String),

    /// Well-formed theme button for a theme that is not in the catalog
    #[error(transparent)]
    Quiz(#[from] QuizError),
}

impl FromStr for CallbackAction {
    type Err = CallbackError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let unknown = || CallbackError::Unrecognized(data.to_string());
        let parts: Vec<&str> = data.split(':').collect();

        let action = match parts.as_slice() {
            ["menu", item] => CallbackAction::Menu(MenuItem::from_id(item).ok_or_else(unknown)?),
            ["phish", "pick", id] => CallbackAction::PickScenario(Scenario::from_id(id).ok_or_else(unknown)?),
            ["phish", "click"] => CallbackAction::PhishingClick,
            ["phish", "report"] => CallbackAction::PhishingReport,
            ["phish", "restart"] => CallbackAction::PhishingRestart,
            ["quiz", "theme", id] => CallbackAction::PickTheme(Theme::parse(id)?),
            ["answer", q, o] => CallbackAction::Answer {
                question: q.parse().map_err(|_| unknown())?,
                option: o.parse().map_err(|_| unknown())?,
            },
            ["quiz", "next"] => CallbackAction::NextQuestion,
            ["upload", "cancel"] => CallbackAction::CancelUpload,
            _ => return Err(unknown()),
        };
        Ok(action)
    }
}
