//! File scan: `Idle → AwaitingFile → Processing → Idle`.
//!
//! Accepting a file spawns two tasks: one downloads and scans it through
//! [`ScanOrchestrator`], the other ([`supervise`]) re-renders the status
//! message every tick from the orchestrator's progress snapshots and reacts
//! to cancellation immediately. Chat updates keep flowing meanwhile, which
//! is what lets the cancel button work.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use unic_langid::LanguageIdentifier;

use super::callbacks::CallbackAction;
use super::menu::menu_button;
use super::transport::{Button, ChatTransport, Keyboard, MessageRef, Reply, TransportError};
use super::{ConversationStore, Event, FlowDeps, FlowState, IncomingFile, UploadState};
use crate::core::error::AppResult;
use crate::core::utils::format_size;
use crate::i18n::{t, t_args};
use crate::services::scan::{ScanError, ScanJob, ScanOrchestrator, ScanOutcome, ScanProgress, ScanReport, ScanStatus};

pub async fn start(
    deps: &FlowDeps,
    event: &Event,
    lang: &LanguageIdentifier,
    message: Option<MessageRef>,
) -> AppResult<()> {
    if let Some(FlowState::Upload(UploadState::Processing { .. })) = deps.conversations.get(event.user_id) {
        return busy(deps, event, lang).await;
    }
    if !deps.scan_settings.is_configured() {
        log::warn!("User {} asked for a scan, but scanning is not configured", event.user_id);
        return deps
            .present(
                event.chat_id,
                message,
                Reply::text(t(lang, "upload-not-configured")).with_keyboard(Keyboard::column([menu_button(lang)])),
            )
            .await;
    }

    deps.conversations
        .set(event.user_id, FlowState::Upload(UploadState::AwaitingFile));
    let text = t_args(
        lang,
        "upload-prompt",
        &[("limit", format_size(deps.scan_settings.max_file_size))],
    );
    deps.present(event.chat_id, message, Reply::text(text)).await
}

pub async fn reprompt(deps: &FlowDeps, event: &Event, lang: &LanguageIdentifier) -> AppResult<()> {
    deps.send(event.chat_id, Reply::text(t(lang, "upload-not-file"))).await?;
    Ok(())
}

pub async fn busy(deps: &FlowDeps, event: &Event, lang: &LanguageIdentifier) -> AppResult<()> {
    deps.send(event.chat_id, Reply::text(t(lang, "upload-busy"))).await?;
    Ok(())
}

/// Cancel button. Clearing the state fires the job's token; the status
/// display reports the cancellation itself.
pub fn cancel(deps: &FlowDeps, event: &Event) -> AppResult<()> {
    match deps.conversations.get(event.user_id) {
        Some(FlowState::Upload(_)) => {
            deps.conversations.clear(event.user_id);
            log::info!("User {} cancelled the upload", event.user_id);
        }
        _ => log::debug!("User {}: cancel without an upload ignored", event.user_id),
    }
    Ok(())
}

pub async fn on_file(deps: &FlowDeps, event: &Event, lang: &LanguageIdentifier, file: &IncomingFile) -> AppResult<()> {
    let limit = deps.scan_settings.max_file_size;
    if let Err(e) = ScanJob::check_declared_size(file.size, limit) {
        log::info!("User {} sent an oversized file: {}", event.user_id, e);
        deps.send(event.chat_id, Reply::text(render_error(lang, &e))).await?;
        return Ok(());
    }

    let job_id = deps.next_job_id();
    let cancel = CancellationToken::new();
    deps.conversations.set(
        event.user_id,
        FlowState::Upload(UploadState::Processing {
            job_id,
            cancel: cancel.clone(),
        }),
    );

    let display_name = file.file_name.clone().unwrap_or_else(|| "file".to_string());
    let status = match deps
        .send(
            event.chat_id,
            status_reply(lang, &display_name, &ScanProgress::queued(0), Duration::ZERO),
        )
        .await
    {
        Ok(status) => status,
        Err(e) => {
            deps.conversations.release_job(event.user_id, job_id);
            return Err(e);
        }
    };

    log::info!(
        "User {} upload job {}: {} ({} bytes)",
        event.user_id,
        job_id,
        display_name,
        file.size
    );

    let request = UploadRequest {
        user_id: event.user_id,
        job_id,
        file: file.clone(),
        display_name,
        limit,
        status,
        lang: lang.clone(),
    };
    tokio::spawn(process_upload(deps.clone(), request, cancel));
    Ok(())
}

/// Everything the background task needs about one accepted file.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub user_id: i64,
    pub job_id: u64,
    pub file: IncomingFile,
    pub display_name: String,
    pub limit: u64,
    pub status: MessageRef,
    pub lang: LanguageIdentifier,
}

/// Runs one accepted upload to its end and reports the outcome.
pub async fn process_upload(deps: FlowDeps, request: UploadRequest, cancel: CancellationToken) -> ScanOutcome {
    let _guard = ProcessingGuard::new(deps.conversations.clone(), request.user_id, request.job_id, cancel.clone());

    let (progress_tx, progress_rx) = watch::channel(ScanProgress::queued(deps.scanner.policy().max_attempts));
    let scan = tokio::spawn(download_and_scan(
        deps.transport.clone(),
        deps.scanner.clone(),
        request.file.clone(),
        request.limit,
        cancel.clone(),
        progress_tx,
    ));

    let sink = TransportStatusSink {
        transport: deps.transport.clone(),
        message: request.status,
        lang: request.lang.clone(),
        display_name: request.display_name.clone(),
    };
    let outcome = supervise(
        scan,
        progress_rx,
        &cancel,
        &sink,
        deps.scan_settings.status_tick,
        deps.scan_settings.max_status_ticks,
    )
    .await;
    sink.finish(&outcome).await;
    outcome
}

async fn download_and_scan(
    transport: Arc<dyn ChatTransport>,
    scanner: ScanOrchestrator,
    file: IncomingFile,
    limit: u64,
    cancel: CancellationToken,
    progress: watch::Sender<ScanProgress>,
) -> ScanOutcome {
    let downloaded = tokio::select! {
        _ = cancel.cancelled() => return ScanOutcome::Cancelled,
        res = transport.fetch_file(&file.file_id) => res,
    };
    let bytes = match downloaded {
        Ok(bytes) => bytes,
        Err(e) => return ScanOutcome::Failed(ScanError::Transport(e.to_string())),
    };

    let name = file.file_name.as_deref().unwrap_or("upload.bin");
    let mut job = match ScanJob::new(bytes, name, file.size, limit, cancel) {
        Ok(job) => job,
        Err(e) => return ScanOutcome::Failed(e),
    };
    scanner.run(&mut job, &progress).await
}

/// Releases the `Processing` state on every exit path of the upload task,
/// including panics. The job's token is cancelled so a scan that is still
/// running stops before its next request.
pub struct ProcessingGuard {
    store: ConversationStore,
    user_id: i64,
    job_id: u64,
    cancel: CancellationToken,
}

impl ProcessingGuard {
    pub fn new(store: ConversationStore, user_id: i64, job_id: u64, cancel: CancellationToken) -> Self {
        Self {
            store,
            user_id,
            job_id,
            cancel,
        }
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
        if self.store.release_job(self.user_id, self.job_id) {
            log::debug!("Released upload job {} of user {}", self.job_id, self.user_id);
        }
    }
}

/// Presentation of a running scan.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn render(&self, progress: &ScanProgress, elapsed: Duration);

    async fn finish(&self, outcome: &ScanOutcome);
}

/// Waits for the scan while refreshing the display every `tick`.
///
/// Returns as soon as the scan ends, the token is cancelled (without
/// waiting for the scan task to notice) or `max_ticks` refreshes have
/// passed, in which case the scan is cancelled and reported as timed out.
pub async fn supervise(
    mut scan: JoinHandle<ScanOutcome>,
    progress: watch::Receiver<ScanProgress>,
    cancel: &CancellationToken,
    sink: &dyn StatusSink,
    tick: Duration,
    max_ticks: u32,
) -> ScanOutcome {
    let started = Instant::now();
    let mut interval = tokio::time::interval_at(started + tick, tick);
    let mut ticks = 0u32;

    loop {
        tokio::select! {
            biased;
            joined = &mut scan => {
                return joined.unwrap_or_else(|e| {
                    log::error!("Scan task ended abnormally: {}", e);
                    ScanOutcome::Failed(ScanError::Transport(format!("scan task aborted: {e}")))
                });
            }
            _ = cancel.cancelled() => return ScanOutcome::Cancelled,
            _ = interval.tick() => {
                ticks += 1;
                let snapshot = *progress.borrow();
                if ticks > max_ticks {
                    cancel.cancel();
                    return ScanOutcome::TimedOut { attempts: snapshot.attempt };
                }
                sink.render(&snapshot, started.elapsed()).await;
            }
        }
    }
}

struct TransportStatusSink {
    transport: Arc<dyn ChatTransport>,
    message: MessageRef,
    lang: LanguageIdentifier,
    display_name: String,
}

impl TransportStatusSink {
    async fn show(&self, reply: Reply) {
        match self.transport.edit(self.message, reply).await {
            Ok(()) | Err(TransportError::NotModified) => {}
            Err(e) => log::debug!("Status update failed: {}", e),
        }
    }
}

#[async_trait]
impl StatusSink for TransportStatusSink {
    async fn render(&self, progress: &ScanProgress, elapsed: Duration) {
        self.show(status_reply(&self.lang, &self.display_name, progress, elapsed))
            .await;
    }

    async fn finish(&self, outcome: &ScanOutcome) {
        let text = render_outcome(&self.lang, &self.display_name, outcome);
        self.show(Reply::text(text).with_keyboard(Keyboard::column([menu_button(&self.lang)])))
            .await;
    }
}

pub fn status_reply(lang: &LanguageIdentifier, name: &str, progress: &ScanProgress, elapsed: Duration) -> Reply {
    let phase = match progress.status {
        ScanStatus::Queued => t(lang, "upload-status-downloading"),
        ScanStatus::Submitting => t(lang, "upload-status-submitting"),
        _ => t_args(
            lang,
            "upload-status-waiting",
            &[
                ("attempt", progress.attempt.to_string()),
                ("max", progress.max_attempts.to_string()),
            ],
        ),
    };
    let text = t_args(
        lang,
        "upload-status",
        &[
            ("name", name.to_string()),
            ("phase", phase),
            ("elapsed", elapsed.as_secs().to_string()),
        ],
    );
    let keyboard = Keyboard::column([Button::new(
        t(lang, "upload-btn-cancel"),
        CallbackAction::CancelUpload.to_string(),
    )]);
    Reply::text(text).with_keyboard(keyboard)
}

pub fn render_outcome(lang: &LanguageIdentifier, name: &str, outcome: &ScanOutcome) -> String {
    match outcome {
        ScanOutcome::Completed(report) => render_report(lang, name, report),
        ScanOutcome::Failed(e) => render_error(lang, e),
        ScanOutcome::Cancelled => t(lang, "upload-cancelled"),
        ScanOutcome::TimedOut { .. } => t(lang, "upload-timeout"),
    }
}

pub fn render_report(lang: &LanguageIdentifier, name: &str, report: &ScanReport) -> String {
    let mut lines = vec![
        t(lang, report.verdict.key()),
        t_args(
            lang,
            "upload-result",
            &[
                ("name", name.to_string()),
                ("ratio", report.detection_ratio.clone()),
            ],
        ),
    ];
    if !report.detections.is_empty() {
        lines.push(String::new());
        lines.push(t(lang, "upload-detections-header"));
        for d in &report.detections {
            lines.push(format!("• {}: {} ({})", d.engine, d.result, d.category));
        }
    }
    lines.join("\n")
}

pub fn render_error(lang: &LanguageIdentifier, error: &ScanError) -> String {
    match error {
        ScanError::NotConfigured => t(lang, "upload-not-configured"),
        ScanError::FileTooLarge { size, limit } => t_args(
            lang,
            "upload-too-large",
            &[("size", format_size(*size)), ("limit", format_size(*limit))],
        ),
        other => t_args(lang, "upload-failed", &[("reason", other.to_string())]),
    }
}
