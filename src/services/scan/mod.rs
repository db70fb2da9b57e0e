//! File scan orchestration.
//!
//! A [`ScanJob`] goes through
//! `Queued → Submitting → AwaitingVerdict → {Completed, Failed, Cancelled, TimedOut}`.
//! [`ScanOrchestrator::run`] submits the file, polls the analysis with a
//! capped linear backoff under a hard attempt ceiling, and stops before the
//! next network call as soon as the job's cancellation token fires. Progress
//! is published as [`ScanProgress`] snapshots on a `watch` channel; rendering
//! is left to the caller.

pub mod client;
pub mod error;
pub mod verdict;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::core::config;
use crate::core::utils::sanitize_filename;

pub use client::VirusTotalClient;
pub use error::ScanError;
pub use verdict::{classify, AnalysisAttributes, Detection, ScanReport, Verdict};

/// Opaque analysis identifier returned by the scan service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisHandle(pub String);

/// What one poll of the analysis reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisStatus {
    Queued,
    InProgress,
    Completed(AnalysisAttributes),
    Unknown(String),
}

/// External malware scanning service.
#[async_trait]
pub trait ScanService: Send + Sync {
    /// Uploads the file and returns the analysis handle.
    async fn submit(&self, bytes: Vec<u8>, filename: &str) -> Result<AnalysisHandle, ScanError>;

    /// Fetches the current state of an analysis.
    async fn fetch_analysis(&self, handle: &AnalysisHandle) -> Result<AnalysisStatus, ScanError>;
}

/// Polling schedule: the delay after attempt `n` is `base_delay * n`,
/// capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: config::scan::MAX_POLL_ATTEMPTS,
            base_delay: config::scan::poll_base_delay(),
            max_delay: config::scan::poll_max_delay(),
        }
    }
}

impl PollPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt).min(self.max_delay)
    }
}

/// Scan values read from the environment, bundled for injection.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub api_url: String,
    pub api_key: String,
    pub max_file_size: u64,
    pub policy: PollPolicy,
    pub status_tick: Duration,
    pub max_status_ticks: u32,
}

impl ScanSettings {
    pub fn from_env() -> Self {
        Self {
            api_url: config::scan::API_URL.clone(),
            api_key: config::VIRUSTOTAL_API_KEY.clone(),
            max_file_size: *config::MAX_FILE_SIZE,
            policy: PollPolicy::default(),
            status_tick: config::scan::status_tick(),
            max_status_ticks: config::scan::MAX_STATUS_TICKS,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanStatus {
    Queued,
    Submitting,
    AwaitingVerdict,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl ScanStatus {
    fn rank(self) -> u8 {
        match self {
            ScanStatus::Queued => 0,
            ScanStatus::Submitting => 1,
            ScanStatus::AwaitingVerdict => 2,
            ScanStatus::Completed | ScanStatus::Failed | ScanStatus::Cancelled | ScanStatus::TimedOut => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 3
    }

    /// Transitions only move forward; a terminal status is final.
    pub fn can_advance_to(self, next: ScanStatus) -> bool {
        next.rank() > self.rank()
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid scan status transition {from:?} -> {to:?}")]
pub struct StatusTransitionError {
    pub from: ScanStatus,
    pub to: ScanStatus,
}

/// In-memory state of one scan.
#[derive(Debug)]
pub struct ScanJob {
    bytes: Vec<u8>,
    filename: String,
    declared_size: u64,
    handle: Option<AnalysisHandle>,
    attempts: u32,
    status: ScanStatus,
    cancel: CancellationToken,
}

impl ScanJob {
    /// Rejects a file by its declared size before anything is downloaded.
    pub fn check_declared_size(size: u64, limit: u64) -> Result<(), ScanError> {
        if size > limit {
            Err(ScanError::FileTooLarge { size, limit })
        } else {
            Ok(())
        }
    }

    /// Builds a queued job. The real byte length is checked against `limit`
    /// again, the declared size may have been wrong.
    pub fn new(
        bytes: Vec<u8>,
        filename: &str,
        declared_size: u64,
        limit: u64,
        cancel: CancellationToken,
    ) -> Result<Self, ScanError> {
        Self::check_declared_size(bytes.len() as u64, limit)?;
        Ok(Self {
            bytes,
            filename: sanitize_filename(filename),
            declared_size,
            handle: None,
            attempts: 0,
            status: ScanStatus::Queued,
            cancel,
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn declared_size(&self) -> u64 {
        self.declared_size
    }

    pub fn handle(&self) -> Option<&AnalysisHandle> {
        self.handle.as_ref()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn status(&self) -> ScanStatus {
        self.status
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn advance(&mut self, next: ScanStatus) -> Result<(), StatusTransitionError> {
        if !self.status.can_advance_to(next) {
            return Err(StatusTransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// Snapshot published while a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    pub status: ScanStatus,
    pub attempt: u32,
    pub max_attempts: u32,
}

impl ScanProgress {
    pub fn queued(max_attempts: u32) -> Self {
        Self {
            status: ScanStatus::Queued,
            attempt: 0,
            max_attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed(ScanReport),
    Failed(ScanError),
    Cancelled,
    TimedOut { attempts: u32 },
}

impl ScanOutcome {
    fn status(&self) -> ScanStatus {
        match self {
            ScanOutcome::Completed(_) => ScanStatus::Completed,
            ScanOutcome::Failed(_) => ScanStatus::Failed,
            ScanOutcome::Cancelled => ScanStatus::Cancelled,
            ScanOutcome::TimedOut { .. } => ScanStatus::TimedOut,
        }
    }
}

#[derive(Clone)]
pub struct ScanOrchestrator {
    service: Arc<dyn ScanService>,
    policy: PollPolicy,
}

impl ScanOrchestrator {
    pub fn new(service: Arc<dyn ScanService>, policy: PollPolicy) -> Self {
        Self { service, policy }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Drives `job` to a terminal status.
    pub async fn run(&self, job: &mut ScanJob, progress: &watch::Sender<ScanProgress>) -> ScanOutcome {
        let outcome = self.drive(job, progress).await;
        self.step(job, outcome.status(), progress);

        match &outcome {
            ScanOutcome::Completed(report) => log::info!(
                "Scan of {} completed after {} polls: {:?} ({})",
                job.filename,
                job.attempts,
                report.verdict,
                report.detection_ratio
            ),
            ScanOutcome::Failed(e) => log::warn!("Scan of {} failed: {}", job.filename, e),
            ScanOutcome::Cancelled => log::info!("Scan of {} cancelled after {} polls", job.filename, job.attempts),
            ScanOutcome::TimedOut { attempts } => {
                log::warn!("Scan of {} timed out after {} polls", job.filename, attempts)
            }
        }
        outcome
    }

    fn publish(&self, job: &ScanJob, progress: &watch::Sender<ScanProgress>) {
        progress.send_replace(ScanProgress {
            status: job.status,
            attempt: job.attempts,
            max_attempts: self.policy.max_attempts,
        });
    }

    fn step(&self, job: &mut ScanJob, next: ScanStatus, progress: &watch::Sender<ScanProgress>) {
        if let Err(e) = job.advance(next) {
            log::warn!("Scan of {}: {}", job.filename, e);
        }
        self.publish(job, progress);
    }

    async fn drive(&self, job: &mut ScanJob, progress: &watch::Sender<ScanProgress>) -> ScanOutcome {
        if job.cancel.is_cancelled() {
            return ScanOutcome::Cancelled;
        }
        self.step(job, ScanStatus::Submitting, progress);

        let bytes = std::mem::take(&mut job.bytes);
        let handle = match self.service.submit(bytes, &job.filename).await {
            Ok(handle) => handle,
            Err(e) => return ScanOutcome::Failed(e),
        };
        log::info!("Scan of {} submitted, analysis {}", job.filename, handle.0);
        job.handle = Some(handle.clone());

        if job.cancel.is_cancelled() {
            return ScanOutcome::Cancelled;
        }
        self.step(job, ScanStatus::AwaitingVerdict, progress);

        for attempt in 1..=self.policy.max_attempts {
            if job.cancel.is_cancelled() {
                return ScanOutcome::Cancelled;
            }
            job.attempts = attempt;
            self.publish(job, progress);

            match self.service.fetch_analysis(&handle).await {
                Err(e) => return ScanOutcome::Failed(e),
                Ok(AnalysisStatus::Completed(attributes)) => return ScanOutcome::Completed(classify(&attributes)),
                Ok(AnalysisStatus::Unknown(status)) => return ScanOutcome::Failed(ScanError::UnknownStatus(status)),
                Ok(AnalysisStatus::Queued) | Ok(AnalysisStatus::InProgress) => {}
            }

            if attempt == self.policy.max_attempts {
                break;
            }

            let delay = self.policy.delay_for_attempt(attempt);
            log::debug!("Analysis {} pending, next poll in {:?}", handle.0, delay);
            tokio::select! {
                _ = job.cancel.cancelled() => return ScanOutcome::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        ScanOutcome::TimedOut {
            attempts: job.attempts,
        }
    }
}
