//! Per-user conversation state machines.
//!
//! Every inbound update is translated by the Telegram layer into an
//! [`Event`] and handed to [`dispatch`], which routes it by the user's
//! current [`FlowState`]. Flows are mutually exclusive: entering one
//! replaces whatever the user was doing, and replacing an upload that is
//! still processing cancels its scan.

pub mod callbacks;
pub mod menu;
pub mod password;
pub mod phishing;
pub mod quiz;
pub mod transport;
pub mod upload;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use unic_langid::LanguageIdentifier;

use crate::core::error::AppResult;
use crate::i18n;
use crate::services::breach::BreachClient;
use crate::services::phishing::Scenario;
use crate::services::quiz::Theme;
use crate::services::scan::{ScanOrchestrator, ScanSettings};
use crate::storage::db::{self, DbConnection, DbPool};

use callbacks::{CallbackAction, CallbackError, MenuItem};
use transport::{ChatTransport, MessageRef, Reply, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordState {
    AwaitingSecret,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhishingState {
    SelectingScenario,
    Simulating { scenario: Scenario, link: String },
    Education { scenario: Scenario },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizState {
    SelectingTheme,
    Answering {
        theme: Theme,
        index: usize,
        correct: usize,
        /// Question count captured when the theme was chosen
        total: usize,
        /// Current question already answered, waiting for "next"
        revealed: bool,
    },
    Summary {
        theme: Theme,
    },
}

#[derive(Debug, Clone)]
pub enum UploadState {
    AwaitingFile,
    Processing { job_id: u64, cancel: CancellationToken },
}

impl PartialEq for UploadState {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (UploadState::AwaitingFile, UploadState::AwaitingFile) => true,
            (UploadState::Processing { job_id: a, .. }, UploadState::Processing { job_id: b, .. }) => a == b,
            _ => false,
        }
    }
}

/// Where a user currently is. Absence from the store means idle.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    Password(PasswordState),
    Phishing(PhishingState),
    Quiz(QuizState),
    Upload(UploadState),
}

impl FlowState {
    fn processing_job(&self) -> Option<(u64, &CancellationToken)> {
        match self {
            FlowState::Upload(UploadState::Processing { job_id, cancel }) => Some((*job_id, cancel)),
            _ => None,
        }
    }
}

/// In-memory per-user flow state, shared by all handlers.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    states: Arc<DashMap<i64, FlowState>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: i64) -> Option<FlowState> {
        self.states.get(&user_id).map(|s| s.value().clone())
    }

    /// Replaces the user's state. A scan still processing under the old
    /// state is cancelled unless the new state is the same job.
    pub fn set(&self, user_id: i64, state: FlowState) {
        let new_job = state.processing_job().map(|(id, _)| id);
        if let Some(old) = self.states.insert(user_id, state) {
            if let Some((old_job, cancel)) = old.processing_job() {
                if Some(old_job) != new_job {
                    log::info!("User {} left upload job {}, cancelling scan", user_id, old_job);
                    cancel.cancel();
                }
            }
        }
    }

    /// Back to idle. Returns the previous state; an in-flight scan is cancelled.
    pub fn clear(&self, user_id: i64) -> Option<FlowState> {
        let old = self.states.remove(&user_id).map(|(_, s)| s);
        if let Some((job_id, cancel)) = old.as_ref().and_then(|s| s.processing_job()) {
            log::info!("Cancelling upload job {} of user {}", job_id, user_id);
            cancel.cancel();
        }
        old
    }

    /// Clears the state only if it is still processing `job_id`.
    pub fn release_job(&self, user_id: i64, job_id: u64) -> bool {
        self.states
            .remove_if(&user_id, |_, state| {
                state.processing_job().is_some_and(|(id, _)| id == job_id)
            })
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Entry commands, independent of how the platform spells them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Start,
    Help,
    Password,
    Phishing,
    Quiz,
    Upload,
    Progress,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    pub file_id: String,
    pub file_name: Option<String>,
    /// Size declared by the platform, in bytes
    pub size: u64,
    pub message: MessageRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Command { intent: Intent, message: MessageRef },
    Text { text: String, message: MessageRef },
    File(IncomingFile),
    Callback {
        id: String,
        data: String,
        message: Option<MessageRef>,
    },
    /// Stickers, photos and anything else without a dedicated handler
    Other { message: MessageRef },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub user_id: i64,
    pub chat_id: i64,
    pub username: Option<String>,
    pub language_code: Option<String>,
    pub kind: EventKind,
}

impl Event {
    pub fn lang(&self) -> LanguageIdentifier {
        i18n::lang_from_code(self.language_code.as_deref().unwrap_or(i18n::DEFAULT_LANG_CODE))
    }
}

/// Everything a flow handler may touch.
#[derive(Clone)]
pub struct FlowDeps {
    pub transport: Arc<dyn ChatTransport>,
    pub conversations: ConversationStore,
    pub db_pool: Arc<DbPool>,
    pub breach: Arc<BreachClient>,
    pub scanner: ScanOrchestrator,
    pub scan_settings: Arc<ScanSettings>,
    job_seq: Arc<AtomicU64>,
}

impl FlowDeps {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        db_pool: Arc<DbPool>,
        breach: Arc<BreachClient>,
        scanner: ScanOrchestrator,
        scan_settings: Arc<ScanSettings>,
    ) -> Self {
        Self {
            transport,
            conversations: ConversationStore::new(),
            db_pool,
            breach,
            scanner,
            scan_settings,
            job_seq: Arc::new(AtomicU64::new(1)),
        }
    }

    pub(crate) fn next_job_id(&self) -> u64 {
        self.job_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&DbConnection) -> rusqlite::Result<T>) -> AppResult<T> {
        let conn = db::get_connection(&self.db_pool)?;
        Ok(f(&conn)?)
    }

    pub(crate) async fn send(&self, chat_id: i64, reply: Reply) -> AppResult<MessageRef> {
        Ok(self.transport.send(chat_id, reply).await?)
    }

    /// Edits `message` in place when given, otherwise (or when the edit
    /// fails) sends a new message.
    pub(crate) async fn present(&self, chat_id: i64, message: Option<MessageRef>, reply: Reply) -> AppResult<()> {
        if let Some(message) = message {
            match self.transport.edit(message, reply.clone()).await {
                Ok(()) | Err(TransportError::NotModified) => return Ok(()),
                Err(e) => log::debug!("Edit of message {} failed, sending new: {}", message.message_id, e),
            }
        }
        self.send(chat_id, reply).await?;
        Ok(())
    }

    /// Deletion is best-effort; failures are logged and dropped.
    pub(crate) async fn delete_quietly(&self, message: MessageRef) {
        if let Err(e) = self.transport.delete(message).await {
            log::debug!("Could not delete message {}: {}", message.message_id, e);
        }
    }
}

/// Routes one event to the flow that owns it.
pub async fn dispatch(deps: &FlowDeps, event: Event) -> AppResult<()> {
    let lang = event.lang();
    deps.with_conn(|conn| {
        db::get_or_create_user(
            conn,
            event.user_id,
            event.username.as_deref(),
            event.language_code.as_deref(),
        )
    })?;

    match &event.kind {
        EventKind::Command { intent, message } => on_command(deps, &event, &lang, *intent, *message).await,
        EventKind::Callback { id, data, message } => {
            if let Err(e) = deps.transport.answer_callback(id, None).await {
                log::debug!("answer_callback failed: {}", e);
            }
            match data.parse::<CallbackAction>() {
                Ok(action) => on_callback(deps, &event, &lang, action, *message).await,
                Err(CallbackError::Quiz(e)) => {
                    log::warn!("User {}: {}", event.user_id, e);
                    deps.send(event.chat_id, Reply::text(i18n::t(&lang, "quiz-unknown-theme")))
                        .await?;
                    Ok(())
                }
                Err(e) => {
                    log::warn!("User {}: {}", event.user_id, e);
                    Ok(())
                }
            }
        }
        EventKind::Text { text, message } => on_text(deps, &event, &lang, text, *message).await,
        EventKind::File(file) => on_file(deps, &event, &lang, file).await,
        EventKind::Other { message } => on_other(deps, &event, &lang, *message).await,
    }
}

async fn on_command(
    deps: &FlowDeps,
    event: &Event,
    lang: &LanguageIdentifier,
    intent: Intent,
    message: MessageRef,
) -> AppResult<()> {
    log::info!("User {} command {:?}", event.user_id, intent);
    match intent {
        Intent::Start => menu::start(deps, event, lang).await,
        Intent::Help => menu::help(deps, event, lang).await,
        Intent::Progress => menu::progress(deps, event, lang, None).await,
        Intent::Cancel => menu::cancel(deps, event, lang).await,
        Intent::Password => password::start(deps, event, lang, Some(message)).await,
        Intent::Phishing => phishing::start(deps, event, lang, None).await,
        Intent::Quiz => quiz::start(deps, event, lang, None).await,
        Intent::Upload => upload::start(deps, event, lang, None).await,
    }
}

async fn on_callback(
    deps: &FlowDeps,
    event: &Event,
    lang: &LanguageIdentifier,
    action: CallbackAction,
    message: Option<MessageRef>,
) -> AppResult<()> {
    match action {
        CallbackAction::Menu(MenuItem::Main) => menu::main_menu(deps, event, lang, message).await,
        CallbackAction::Menu(MenuItem::Password) => password::start(deps, event, lang, None).await,
        CallbackAction::Menu(MenuItem::Phishing) => phishing::start(deps, event, lang, message).await,
        CallbackAction::Menu(MenuItem::Quiz) => quiz::start(deps, event, lang, message).await,
        CallbackAction::Menu(MenuItem::Upload) => upload::start(deps, event, lang, message).await,
        CallbackAction::Menu(MenuItem::Progress) => menu::progress(deps, event, lang, message).await,
        CallbackAction::PickScenario(scenario) => phishing::pick(deps, event, lang, scenario, message).await,
        CallbackAction::PhishingClick => phishing::resolve(deps, event, lang, true, message).await,
        CallbackAction::PhishingReport => phishing::resolve(deps, event, lang, false, message).await,
        CallbackAction::PhishingRestart => phishing::start(deps, event, lang, message).await,
        CallbackAction::PickTheme(theme) => quiz::pick_theme(deps, event, lang, theme, message).await,
        CallbackAction::Answer { question, option } => {
            quiz::answer(deps, event, lang, question, option, message).await
        }
        CallbackAction::NextQuestion => quiz::next(deps, event, lang, message).await,
        CallbackAction::CancelUpload => upload::cancel(deps, event),
    }
}

async fn on_text(
    deps: &FlowDeps,
    event: &Event,
    lang: &LanguageIdentifier,
    text: &str,
    message: MessageRef,
) -> AppResult<()> {
    match deps.conversations.get(event.user_id) {
        Some(FlowState::Password(PasswordState::AwaitingSecret)) => {
            password::on_secret(deps, event, lang, text, message).await
        }
        Some(FlowState::Upload(UploadState::AwaitingFile)) => upload::reprompt(deps, event, lang).await,
        Some(FlowState::Upload(UploadState::Processing { .. })) => upload::busy(deps, event, lang).await,
        Some(FlowState::Quiz(_)) | Some(FlowState::Phishing(_)) => {
            deps.send(event.chat_id, Reply::text(i18n::t(lang, "use-buttons"))).await?;
            Ok(())
        }
        None => menu::idle_hint(deps, event, lang).await,
    }
}

async fn on_file(deps: &FlowDeps, event: &Event, lang: &LanguageIdentifier, file: &IncomingFile) -> AppResult<()> {
    match deps.conversations.get(event.user_id) {
        Some(FlowState::Upload(UploadState::AwaitingFile)) => upload::on_file(deps, event, lang, file).await,
        Some(FlowState::Upload(UploadState::Processing { .. })) => upload::busy(deps, event, lang).await,
        Some(FlowState::Password(PasswordState::AwaitingSecret)) => {
            deps.delete_quietly(file.message).await;
            password::reprompt(deps, event, lang).await
        }
        _ => menu::idle_hint(deps, event, lang).await,
    }
}

async fn on_other(deps: &FlowDeps, event: &Event, lang: &LanguageIdentifier, message: MessageRef) -> AppResult<()> {
    match deps.conversations.get(event.user_id) {
        Some(FlowState::Upload(UploadState::AwaitingFile)) => upload::reprompt(deps, event, lang).await,
        Some(FlowState::Password(PasswordState::AwaitingSecret)) => {
            deps.delete_quietly(message).await;
            password::reprompt(deps, event, lang).await
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replacing_processing_cancels_scan() {
        let store = ConversationStore::new();
        let cancel = CancellationToken::new();
        store.set(
            1,
            FlowState::Upload(UploadState::Processing {
                job_id: 7,
                cancel: cancel.clone(),
            }),
        );

        store.set(1, FlowState::Quiz(QuizState::SelectingTheme));

        assert!(cancel.is_cancelled());
        assert_eq!(store.get(1), Some(FlowState::Quiz(QuizState::SelectingTheme)));
    }

    #[test]
    fn test_clear_cancels_scan() {
        let store = ConversationStore::new();
        let cancel = CancellationToken::new();
        store.set(
            3,
            FlowState::Upload(UploadState::Processing {
                job_id: 1,
                cancel: cancel.clone(),
            }),
        );

        assert!(store.clear(3).is_some());
        assert!(cancel.is_cancelled());
        assert!(store.get(3).is_none());
    }

    #[test]
    fn test_release_job_only_matches_same_job() {
        let store = ConversationStore::new();
        store.set(
            1,
            FlowState::Upload(UploadState::Processing {
                job_id: 2,
                cancel: CancellationToken::new(),
            }),
        );

        assert!(!store.release_job(1, 1));
        assert!(store.get(1).is_some());
        assert!(store.release_job(1, 2));
        assert!(store.is_empty());
    }

    #[test]
    fn test_release_job_keeps_other_flow() {
        let store = ConversationStore::new();
        store.set(1, FlowState::Password(PasswordState::AwaitingSecret));
        assert!(!store.release_job(1, 2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_states_are_per_user() {
        let store = ConversationStore::new();
        store.set(1, FlowState::Password(PasswordState::AwaitingSecret));
        store.set(2, FlowState::Quiz(QuizState::SelectingTheme));
        store.clear(1);
        assert!(store.get(1).is_none());
        assert!(store.get(2).is_some());
    }
}
