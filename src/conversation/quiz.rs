//! Quiz: `Idle → SelectingTheme → Answering → Summary → Idle`.
//!
//! The running score lives in the flow state and is mirrored to the
//! `quiz_sessions` row after every step. Buttons from an earlier question
//! (or a second tap on the same one) are ignored.

use unic_langid::LanguageIdentifier;

use super::callbacks::{CallbackAction, MenuItem};
use super::menu::menu_button;
use super::transport::{Button, Keyboard, MessageRef, Reply};
use super::{Event, FlowDeps, FlowState, QuizState};
use crate::core::error::AppResult;
use crate::i18n::{t, t_args};
use crate::services::quiz::{self, percentage, Question, QuizError, ScoreTier, Theme};
use crate::storage::db::{self, QuizSessionUpdate};

pub async fn start(
    deps: &FlowDeps,
    event: &Event,
    lang: &LanguageIdentifier,
    message: Option<MessageRef>,
) -> AppResult<()> {
    deps.conversations
        .set(event.user_id, FlowState::Quiz(QuizState::SelectingTheme));

    let keyboard = Keyboard::column(
        quiz::list_themes()
            .into_iter()
            .map(|theme| Button::new(t(lang, &theme.name_key()), CallbackAction::PickTheme(theme).to_string())),
    )
    .row(vec![menu_button(lang)]);
    let reply = Reply::text(t(lang, "quiz-choose-theme")).with_keyboard(keyboard);
    deps.present(event.chat_id, message, reply).await
}

/// Starts `theme` from the first question. Allowed from any state, so a
/// theme chosen mid-quiz resets the running score.
pub async fn pick_theme(
    deps: &FlowDeps,
    event: &Event,
    lang: &LanguageIdentifier,
    theme: Theme,
    message: Option<MessageRef>,
) -> AppResult<()> {
    let total = quiz::question_count(theme);
    deps.conversations.set(
        event.user_id,
        FlowState::Quiz(QuizState::Answering {
            theme,
            index: 0,
            correct: 0,
            total,
            revealed: false,
        }),
    );
    deps.with_conn(|conn| db::update_quiz_session(conn, event.user_id, &QuizSessionUpdate::start(theme.id())))?;
    log::info!("User {} started quiz {}", event.user_id, theme.id());

    let question = quiz::question_at(theme, 0)?;
    deps.present(event.chat_id, message, question_reply(lang, &question, total))
        .await
}

pub async fn answer(
    deps: &FlowDeps,
    event: &Event,
    lang: &LanguageIdentifier,
    question_index: usize,
    option: usize,
    message: Option<MessageRef>,
) -> AppResult<()> {
    let (theme, index, correct, total) = match deps.conversations.get(event.user_id) {
        Some(FlowState::Quiz(QuizState::Answering {
            theme,
            index,
            correct,
            total,
            revealed: false,
        })) if index == question_index => (theme, index, correct, total),
        _ => {
            log::debug!("User {}: stale answer {}:{} ignored", event.user_id, question_index, option);
            return Ok(());
        }
    };

    let question = quiz::question_at(theme, index)?;
    let is_correct = match quiz::is_correct(theme, index, option) {
        Ok(is_correct) => is_correct,
        Err(e @ QuizError::OptionOutOfRange { .. }) => {
            log::warn!("User {}: {}", event.user_id, e);
            deps.send(event.chat_id, Reply::text(t(lang, "quiz-invalid-option"))).await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let correct = correct + usize::from(is_correct);

    deps.conversations.set(
        event.user_id,
        FlowState::Quiz(QuizState::Answering {
            theme,
            index,
            correct,
            total,
            revealed: true,
        }),
    );
    deps.with_conn(|conn| {
        db::update_quiz_session(
            conn,
            event.user_id,
            &QuizSessionUpdate::advance(to_u32(index + 1), to_u32(correct)),
        )
    })?;

    deps.present(
        event.chat_id,
        message,
        feedback_reply(lang, &question, total, is_correct),
    )
    .await
}

pub async fn next(
    deps: &FlowDeps,
    event: &Event,
    lang: &LanguageIdentifier,
    message: Option<MessageRef>,
) -> AppResult<()> {
    let (theme, index, correct, total) = match deps.conversations.get(event.user_id) {
        Some(FlowState::Quiz(QuizState::Answering {
            theme,
            index,
            correct,
            total,
            revealed: true,
        })) => (theme, index, correct, total),
        _ => {
            log::debug!("User {}: stale next ignored", event.user_id);
            return Ok(());
        }
    };

    if index + 1 < total {
        deps.conversations.set(
            event.user_id,
            FlowState::Quiz(QuizState::Answering {
                theme,
                index: index + 1,
                correct,
                total,
                revealed: false,
            }),
        );
        let question = quiz::question_at(theme, index + 1)?;
        return deps
            .present(event.chat_id, message, question_reply(lang, &question, total))
            .await;
    }

    let score = percentage(correct, total);
    deps.conversations
        .set(event.user_id, FlowState::Quiz(QuizState::Summary { theme }));
    let stored = deps.with_conn(|conn| db::append_test_result(conn, event.user_id, theme.id(), score))?;
    log::info!("User {} finished quiz {}: {:.1}%", event.user_id, theme.id(), stored);

    deps.present(event.chat_id, message, summary_reply(lang, theme, correct, total, stored))
        .await
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

pub fn question_reply(lang: &LanguageIdentifier, question: &Question, total: usize) -> Reply {
    let mut text = t_args(
        lang,
        "quiz-question-header",
        &[
            ("number", (question.index + 1).to_string()),
            ("total", total.to_string()),
        ],
    );
    text.push_str("\n\n");
    text.push_str(&t(lang, &question.text_key()));

    let keyboard = Keyboard::column((0..question.option_count).map(|option| {
        Button::new(
            t(lang, &question.option_key(option)),
            CallbackAction::Answer {
                question: question.index,
                option,
            }
            .to_string(),
        )
    }));
    Reply::text(text).with_keyboard(keyboard)
}

pub fn feedback_reply(lang: &LanguageIdentifier, question: &Question, total: usize, is_correct: bool) -> Reply {
    let verdict = if is_correct {
        t(lang, "quiz-correct")
    } else {
        t_args(
            lang,
            "quiz-wrong",
            &[("answer", t(lang, &question.option_key(question.correct)))],
        )
    };
    let text = format!(
        "{}\n\n{}\n\n💡 {}",
        t(lang, &question.text_key()),
        verdict,
        t(lang, &question.explanation_key())
    );

    let next_key = if question.index + 1 < total {
        "quiz-btn-next"
    } else {
        "quiz-btn-finish"
    };
    let keyboard = Keyboard::column([Button::new(t(lang, next_key), CallbackAction::NextQuestion.to_string())]);
    Reply::text(text).with_keyboard(keyboard)
}

pub fn summary_reply(lang: &LanguageIdentifier, theme: Theme, correct: usize, total: usize, score: f64) -> Reply {
    let text = format!(
        "{}\n\n{}",
        t_args(
            lang,
            "quiz-summary",
            &[
                ("theme", t(lang, &theme.name_key())),
                ("correct", correct.to_string()),
                ("total", total.to_string()),
                ("score", format!("{:.1}", score)),
            ],
        ),
        t(lang, ScoreTier::for_score(score).key())
    );
    let keyboard = Keyboard::column([
        Button::new(t(lang, "quiz-btn-restart"), CallbackAction::PickTheme(theme).to_string()),
        Button::new(t(lang, "quiz-btn-other-theme"), CallbackAction::Menu(MenuItem::Quiz).to_string()),
        menu_button(lang),
    ]);
    Reply::text(text).with_keyboard(keyboard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::lang_from_code;

    #[test]
    fn test_question_buttons_carry_index() {
        let lang = lang_from_code("ru");
        let question = quiz::question_at(Theme::Phishing, 1).unwrap();
        let reply = question_reply(&lang, &question, 3);

        let data: Vec<String> = reply.keyboard.unwrap().buttons().map(|b| b.data.clone()).collect();
        assert_eq!(data, vec!["answer:1:0", "answer:1:1", "answer:1:2", "answer:1:3"]);
        assert!(reply.text.contains("2/3"));
    }

    #[test]
    fn test_wrong_feedback_names_correct_option() {
        let lang = lang_from_code("en");
        let question = quiz::question_at(Theme::NetworkSecurity, 0).unwrap();
        let reply = feedback_reply(&lang, &question, 3, false);
        assert!(reply.text.contains(&t(&lang, "quiz-network_security-1-opt-2")));
        assert!(reply.text.contains(&t(&lang, "quiz-network_security-1-explanation")));
    }

    #[test]
    fn test_last_question_offers_finish() {
        let lang = lang_from_code("en");
        let question = quiz::question_at(Theme::NetworkSecurity, 2).unwrap();
        let reply = feedback_reply(&lang, &question, 3, true);
        let keyboard = reply.keyboard.unwrap();
        assert_eq!(keyboard.buttons().next().unwrap().text, t(&lang, "quiz-btn-finish"));
    }

    #[test]
    fn test_summary_tier() {
        let lang = lang_from_code("ru");
        let reply = summary_reply(&lang, Theme::Phishing, 1, 3, 33.3);
        assert!(reply.text.contains(&t(&lang, "quiz-tier-review")));
        assert!(reply.text.contains("33.3"));
    }
}
