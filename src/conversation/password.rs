//! Password breach check: `Idle → AwaitingSecret → Idle`.
//!
//! Messages carrying the secret are deleted as soon as they arrive; the
//! secret is never stored or logged.

use unic_langid::LanguageIdentifier;

use super::menu::menu_button;
use super::transport::{Keyboard, MessageRef, Reply};
use super::{Event, FlowDeps, FlowState, PasswordState};
use crate::core::error::AppResult;
use crate::core::utils::format_count;
use crate::i18n::{t, t_args};
use crate::services::breach::{BreachError, BreachLookup};

pub async fn start(
    deps: &FlowDeps,
    event: &Event,
    lang: &LanguageIdentifier,
    command: Option<MessageRef>,
) -> AppResult<()> {
    if let Some(command) = command {
        deps.delete_quietly(command).await;
    }
    deps.conversations
        .set(event.user_id, FlowState::Password(PasswordState::AwaitingSecret));
    deps.send(event.chat_id, Reply::text(t(lang, "password-prompt"))).await?;
    Ok(())
}

pub async fn reprompt(deps: &FlowDeps, event: &Event, lang: &LanguageIdentifier) -> AppResult<()> {
    deps.send(event.chat_id, Reply::text(t(lang, "password-empty"))).await?;
    Ok(())
}

pub async fn on_secret(
    deps: &FlowDeps,
    event: &Event,
    lang: &LanguageIdentifier,
    secret: &str,
    message: MessageRef,
) -> AppResult<()> {
    deps.delete_quietly(message).await;

    if secret.trim().is_empty() {
        return reprompt(deps, event, lang).await;
    }

    deps.conversations.clear(event.user_id);
    let status = deps.send(event.chat_id, Reply::text(t(lang, "password-checking"))).await?;

    let result = deps.breach.check_secret(secret).await;
    log::info!(
        "User {} password check: {}",
        event.user_id,
        match &result {
            Ok(lookup) if lookup.found => "found",
            Ok(_) => "not found",
            Err(_) => "error",
        }
    );

    let reply = Reply::text(render_result(lang, &result)).with_keyboard(Keyboard::column([menu_button(lang)]));
    deps.present(event.chat_id, Some(status), reply).await
}

pub fn render_result(lang: &LanguageIdentifier, result: &Result<BreachLookup, BreachError>) -> String {
    match result {
        Ok(lookup) => match lookup.severity() {
            Some(severity) => t_args(
                lang,
                "password-found",
                &[
                    ("banner", t(lang, severity.banner_key())),
                    ("count", format_count(lookup.count)),
                ],
            ),
            None => t(lang, "password-not-found"),
        },
        Err(e) => {
            log::warn!("Breach lookup failed: {}", e);
            t(lang, "password-error")
        }
    }
}
