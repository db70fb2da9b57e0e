//! Quiz catalog and scoring.
//!
//! The bank stores only the structure of every question (option count and
//! correct index). Question texts, options and explanations live in the
//! locale files under `quiz-{theme}-{n}-*` keys, so every function here is
//! pure and language independent.

use std::collections::BTreeMap;
use std::str::FromStr;

use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use thiserror::Error;

/// Score below which a theme gets a targeted recommendation.
pub const RECOMMENDATION_THRESHOLD: f64 = 70.0;

/// Quiz topic. The string form (`password_security`, ...) is the stable id
/// used in callbacks and the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Theme {
    PasswordSecurity,
    Phishing,
    NetworkSecurity,
}

impl Theme {
    /// Parses a theme id, rejecting unknown ones.
    pub fn parse(id: &str) -> Result<Self, QuizError> {
        Theme::from_str(id).map_err(|_| QuizError::UnknownTheme(id.to_string()))
    }

    pub fn id(&self) -> &str {
        self.as_ref()
    }

    /// Locale key of the theme's display name.
    pub fn name_key(&self) -> String {
        format!("quiz-theme-{}", self.id())
    }

    /// Locale key of the recommendation shown when this theme scores low.
    pub fn recommendation_key(&self) -> String {
        format!("rec-{}", self.id())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuizError {
    #[error("unknown quiz theme: {0}")]
    UnknownTheme(String),

    #[error("question {index} out of range for theme {theme}")]
    QuestionOutOfRange { theme: Theme, index: usize },

    #[error("option {option} out of range for question {index} of theme {theme}")]
    OptionOutOfRange { theme: Theme, index: usize, option: usize },
}

/// One question of the bank. Text lives in the locale files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Question {
    pub theme: Theme,
    /// Zero-based position inside the theme
    pub index: usize,
    pub option_count: usize,
    pub correct: usize,
}

impl Question {
    fn key_base(&self) -> String {
        format!("quiz-{}-{}", self.theme.id(), self.index + 1)
    }

    pub fn text_key(&self) -> String {
        format!("{}-text", self.key_base())
    }

    pub fn option_key(&self, option: usize) -> String {
        format!("{}-opt-{}", self.key_base(), option + 1)
    }

    pub fn explanation_key(&self) -> String {
        format!("{}-explanation", self.key_base())
    }
}

/// (option count, correct option) per question.
const PASSWORD_SECURITY: &[(usize, usize)] = &[(4, 2), (4, 1), (4, 1)];
const PHISHING: &[(usize, usize)] = &[(4, 2), (4, 1), (4, 0)];
const NETWORK_SECURITY: &[(usize, usize)] = &[(4, 1), (4, 0), (4, 2)];

fn bank(theme: Theme) -> &'static [(usize, usize)] {
    match theme {
        Theme::PasswordSecurity => PASSWORD_SECURITY,
        Theme::Phishing => PHISHING,
        Theme::NetworkSecurity => NETWORK_SECURITY,
    }
}

/// All themes in presentation order.
pub fn list_themes() -> Vec<Theme> {
    Theme::iter().collect()
}

pub fn questions_for_theme(theme: Theme) -> Vec<Question> {
    bank(theme)
        .iter()
        .enumerate()
        .map(|(index, &(option_count, correct))| Question {
            theme,
            index,
            option_count,
            correct,
        })
        .collect()
}

pub fn question_count(theme: Theme) -> usize {
    bank(theme).len()
}

pub fn question_at(theme: Theme, index: usize) -> Result<Question, QuizError> {
    questions_for_theme(theme)
        .get(index)
        .copied()
        .ok_or(QuizError::QuestionOutOfRange { theme, index })
}

/// Fails for an option the question does not have.
pub fn is_correct(theme: Theme, index: usize, answer: usize) -> Result<bool, QuizError> {
    let question = question_at(theme, index)?;
    if answer >= question.option_count {
        return Err(QuizError::OptionOutOfRange {
            theme,
            index,
            option: answer,
        });
    }
    Ok(question.correct == answer)
}

/// Locale key of the explanation for a question.
pub fn explanation_for(theme: Theme, index: usize) -> Result<String, QuizError> {
    Ok(question_at(theme, index)?.explanation_key())
}

/// Percentage rounded to one decimal; 0 when there are no questions.
pub fn percentage(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = correct as f64 / total as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}

pub fn score_of(theme: Theme, correct: usize) -> f64 {
    percentage(correct, question_count(theme))
}

/// Summary tier for a finished quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreTier {
    Excellent,
    Fair,
    NeedsReview,
}

impl ScoreTier {
    pub fn for_score(score: f64) -> Self {
        if score >= 80.0 {
            ScoreTier::Excellent
        } else if score >= 50.0 {
            ScoreTier::Fair
        } else {
            ScoreTier::NeedsReview
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            ScoreTier::Excellent => "quiz-tier-excellent",
            ScoreTier::Fair => "quiz-tier-fair",
            ScoreTier::NeedsReview => "quiz-tier-review",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    Improve(Theme),
    KeepItUp,
}

impl Recommendation {
    pub fn key(&self) -> String {
        match self {
            Recommendation::Improve(theme) => theme.recommendation_key(),
            Recommendation::KeepItUp => "rec-keep-it-up".to_string(),
        }
    }
}

/// One tip per known theme scoring below the threshold, in theme order, or
/// a single generic tip. Unknown theme ids in `scores` are ignored.
pub fn recommendations_for(scores: &BTreeMap<String, f64>) -> Vec<Recommendation> {
    let tips: Vec<Recommendation> = Theme::iter()
        .filter(|theme| {
            scores
                .get(theme.id())
                .is_some_and(|score| *score < RECOMMENDATION_THRESHOLD)
        })
        .map(Recommendation::Improve)
        .collect();

    if tips.is_empty() {
        vec![Recommendation::KeepItUp]
    } else {
        tips
    }
}
