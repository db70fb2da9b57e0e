//! Phishing drill: `Idle → SelectingScenario → Simulating → Education → Idle`.

use unic_langid::LanguageIdentifier;

use super::callbacks::CallbackAction;
use super::menu::menu_button;
use super::transport::{Button, Keyboard, MessageRef, Reply};
use super::{Event, FlowDeps, FlowState, PhishingState};
use crate::core::error::AppResult;
use crate::i18n::{t, t_args};
use crate::services::phishing::{generate_token, phishing_link, Scenario};
use crate::storage::db;

pub async fn start(
    deps: &FlowDeps,
    event: &Event,
    lang: &LanguageIdentifier,
    message: Option<MessageRef>,
) -> AppResult<()> {
    deps.conversations
        .set(event.user_id, FlowState::Phishing(PhishingState::SelectingScenario));

    let keyboard = Keyboard::column(
        Scenario::all()
            .into_iter()
            .map(|s| Button::new(t(lang, &s.title_key()), CallbackAction::PickScenario(s).to_string())),
    )
    .row(vec![menu_button(lang)]);
    let reply = Reply::text(t(lang, "phishing-choose")).with_keyboard(keyboard);
    deps.present(event.chat_id, message, reply).await
}

pub async fn pick(
    deps: &FlowDeps,
    event: &Event,
    lang: &LanguageIdentifier,
    scenario: Scenario,
    message: Option<MessageRef>,
) -> AppResult<()> {
    if deps.conversations.get(event.user_id) != Some(FlowState::Phishing(PhishingState::SelectingScenario)) {
        log::debug!("User {}: stale scenario pick ignored", event.user_id);
        return Ok(());
    }

    let link = phishing_link(&generate_token());
    deps.conversations.set(
        event.user_id,
        FlowState::Phishing(PhishingState::Simulating {
            scenario,
            link: link.clone(),
        }),
    );

    let keyboard = Keyboard::default().row(vec![
        Button::new(t(lang, "phishing-btn-click"), CallbackAction::PhishingClick.to_string()),
        Button::new(t(lang, "phishing-btn-report"), CallbackAction::PhishingReport.to_string()),
    ]);
    let text = t_args(lang, &scenario.message_key(), &[("link", link)]);
    deps.present(event.chat_id, message, Reply::text(text).with_keyboard(keyboard))
        .await
}

/// Handles the user's decision in the simulation. Both outcomes are logged
/// once and lead to the education step.
pub async fn resolve(
    deps: &FlowDeps,
    event: &Event,
    lang: &LanguageIdentifier,
    clicked: bool,
    message: Option<MessageRef>,
) -> AppResult<()> {
    let scenario = match deps.conversations.get(event.user_id) {
        Some(FlowState::Phishing(PhishingState::Simulating { scenario, .. })) => scenario,
        _ => {
            log::debug!("User {}: stale phishing decision ignored", event.user_id);
            return Ok(());
        }
    };

    deps.conversations
        .set(event.user_id, FlowState::Phishing(PhishingState::Education { scenario }));
    deps.with_conn(|conn| db::append_phishing_log(conn, event.user_id, scenario.id(), clicked))?;
    log::info!(
        "User {} phishing drill {}: {}",
        event.user_id,
        scenario.id(),
        if clicked { "clicked" } else { "reported" }
    );

    deps.present(event.chat_id, message, education_reply(lang, scenario, clicked))
        .await
}

pub fn education_reply(lang: &LanguageIdentifier, scenario: Scenario, clicked: bool) -> Reply {
    let verdict = if clicked {
        format!("{}\n\n{}", t(lang, "phishing-clicked"), t(lang, &scenario.consequence_key()))
    } else {
        t(lang, "phishing-reported")
    };
    let text = format!(
        "{}\n\n{}\n{}",
        verdict,
        t(lang, "phishing-signs-header"),
        t(lang, &scenario.signs_key())
    );
    let keyboard = Keyboard::column([
        Button::new(t(lang, "phishing-btn-restart"), CallbackAction::PhishingRestart.to_string()),
        menu_button(lang),
    ]);
    Reply::text(text).with_keyboard(keyboard)
}
