//! Commands outside any flow: /start, /help, /progress, /cancel and the main menu.

use unic_langid::LanguageIdentifier;

use super::callbacks::{CallbackAction, MenuItem};
use super::transport::{Button, Keyboard, MessageRef, Reply};
use super::{Event, FlowDeps};
use crate::core::error::AppResult;
use crate::i18n::{t, t_args};
use crate::services::quiz::{self, recommendations_for, Theme};
use crate::storage::db::{self, Progress};

pub fn menu_button(lang: &LanguageIdentifier) -> Button {
    Button::new(t(lang, "btn-menu"), CallbackAction::Menu(MenuItem::Main).to_string())
}

pub fn main_menu_keyboard(lang: &LanguageIdentifier) -> Keyboard {
    let item = |key: &str, item: MenuItem| Button::new(t(lang, key), CallbackAction::Menu(item).to_string());
    Keyboard::default()
        .row(vec![item("menu-password", MenuItem::Password), item("menu-phishing", MenuItem::Phishing)])
        .row(vec![item("menu-quiz", MenuItem::Quiz), item("menu-upload", MenuItem::Upload)])
        .row(vec![item("menu-progress", MenuItem::Progress)])
}

pub async fn start(deps: &FlowDeps, event: &Event, lang: &LanguageIdentifier) -> AppResult<()> {
    deps.conversations.clear(event.user_id);
    let name = event.username.clone().unwrap_or_else(|| t(lang, "anonymous-user"));
    let reply = Reply::text(t_args(lang, "start-welcome", &[("name", name)])).with_keyboard(main_menu_keyboard(lang));
    deps.send(event.chat_id, reply).await?;
    Ok(())
}

pub async fn help(deps: &FlowDeps, event: &Event, lang: &LanguageIdentifier) -> AppResult<()> {
    deps.send(event.chat_id, Reply::text(t(lang, "help-text"))).await?;
    Ok(())
}

/// Leaves whatever flow the user is in and shows the main menu.
pub async fn main_menu(
    deps: &FlowDeps,
    event: &Event,
    lang: &LanguageIdentifier,
    message: Option<MessageRef>,
) -> AppResult<()> {
    deps.conversations.clear(event.user_id);
    let reply = Reply::text(t(lang, "menu-title")).with_keyboard(main_menu_keyboard(lang));
    deps.present(event.chat_id, message, reply).await
}

/// Clears any active flow. Silent when the user was idle.
pub async fn cancel(deps: &FlowDeps, event: &Event, lang: &LanguageIdentifier) -> AppResult<()> {
    if deps.conversations.clear(event.user_id).is_some() {
        deps.send(
            event.chat_id,
            Reply::text(t(lang, "cancel-done")).with_keyboard(main_menu_keyboard(lang)),
        )
        .await?;
    }
    Ok(())
}

pub async fn idle_hint(deps: &FlowDeps, event: &Event, lang: &LanguageIdentifier) -> AppResult<()> {
    deps.send(
        event.chat_id,
        Reply::text(t(lang, "idle-hint")).with_keyboard(main_menu_keyboard(lang)),
    )
    .await?;
    Ok(())
}

pub async fn progress(
    deps: &FlowDeps,
    event: &Event,
    lang: &LanguageIdentifier,
    message: Option<MessageRef>,
) -> AppResult<()> {
    let progress = deps.with_conn(|conn| db::get_progress(conn, event.user_id))?;
    let reply = Reply::text(render_progress(lang, &progress)).with_keyboard(Keyboard::column([menu_button(lang)]));
    deps.present(event.chat_id, message, reply).await
}

pub fn render_progress(lang: &LanguageIdentifier, progress: &Progress) -> String {
    let mut lines = vec![t(lang, "progress-header")];

    if progress.best_scores.is_empty() {
        lines.push(t(lang, "progress-no-tests"));
    } else {
        for theme in quiz::list_themes() {
            if let Some(score) = progress.best_scores.get(theme.id()) {
                lines.push(t_args(
                    lang,
                    "progress-theme-line",
                    &[("theme", t(lang, &theme.name_key())), ("score", format!("{:.1}", score))],
                ));
            }
        }
        // Themes that are no longer in the catalog still count towards the average.
        for (id, score) in progress.best_scores.iter().filter(|(id, _)| Theme::parse(id).is_err()) {
            lines.push(t_args(
                lang,
                "progress-theme-line",
                &[("theme", id.clone()), ("score", format!("{:.1}", score))],
            ));
        }
        lines.push(t_args(
            lang,
            "progress-average",
            &[("score", format!("{:.1}", progress.average_score))],
        ));
    }

    lines.push(String::new());
    match progress.phishing.recognition_rate() {
        Some(rate) => lines.push(t_args(
            lang,
            "progress-phishing",
            &[
                ("total", progress.phishing.total.to_string()),
                ("clicked", progress.phishing.clicked.to_string()),
                ("rate", format!("{:.0}", rate * 100.0)),
            ],
        )),
        None => lines.push(t(lang, "progress-phishing-none")),
    }

    lines.push(String::new());
    lines.push(t(lang, "progress-recommendations"));
    for rec in recommendations_for(&progress.best_scores) {
        lines.push(format!("• {}", t(lang, &rec.key())));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::lang_from_code;
    use crate::storage::db::PhishingStats;
    use std::collections::BTreeMap;

    #[test]
    fn test_render_progress_lists_scores_and_tip() {
        let lang = lang_from_code("en");
        let progress = Progress {
            best_scores: BTreeMap::from([
                ("password_security".to_string(), 33.3),
                ("phishing".to_string(), 100.0),
            ]),
            average_score: 66.7,
            phishing: PhishingStats { total: 4, clicked: 1 },
        };

        let text = render_progress(&lang, &progress);
        assert!(text.contains("33.3"));
        assert!(text.contains("66.7"));
        assert!(text.contains("75%"));
        assert!(text.contains(&t(&lang, "rec-password_security")));
        assert!(!text.contains(&t(&lang, "rec-phishing")));
    }

    #[test]
    fn test_render_empty_progress() {
        let lang = lang_from_code("ru");
        let text = render_progress(&lang, &Progress::default());
        assert!(text.contains(&t(&lang, "progress-no-tests")));
        assert!(text.contains(&t(&lang, "progress-phishing-none")));
        assert!(text.contains(&t(&lang, "rec-keep-it-up")));
    }

    #[test]
    fn test_main_menu_has_every_flow() {
        let lang = lang_from_code("ru");
        let data: Vec<String> = main_menu_keyboard(&lang).buttons().map(|b| b.data.clone()).collect();
        for expected in ["menu:password", "menu:phishing", "menu:quiz", "menu:upload", "menu:progress"] {
            assert!(data.iter().any(|d| d == expected), "missing {expected}");
        }
    }
}
