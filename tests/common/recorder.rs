//! Recording doubles for the outbound collaborators
//!
//! `RecordingTransport` captures every chat call in order; `ScriptedScanService`
//! replays a fixed list of poll results.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use cybertutor::conversation::transport::{ChatTransport, MessageRef, Reply, TransportError};
use cybertutor::services::scan::{AnalysisHandle, AnalysisStatus, ScanError, ScanService};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Send { chat_id: i64, reply: Reply },
    Edit { message: MessageRef, reply: Reply },
    Delete(MessageRef),
    Answer(String),
    Fetch(String),
}

/// Chat transport that remembers everything the bot did.
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicI32,
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `file_id` downloadable with the given content.
    pub fn put_file(&self, file_id: &str, bytes: Vec<u8>) {
        self.files.lock().unwrap().insert(file_id.to_string(), bytes);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Texts of every sent or edited message, in order.
    pub fn texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send { reply, .. } | Call::Edit { reply, .. } => Some(reply.text),
                _ => None,
            })
            .collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.texts().pop()
    }

    /// Last sent or edited reply.
    pub fn last_reply(&self) -> Option<Reply> {
        self.calls().into_iter().rev().find_map(|c| match c {
            Call::Send { reply, .. } | Call::Edit { reply, .. } => Some(reply),
            _ => None,
        })
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send(&self, chat_id: i64, reply: Reply) -> Result<MessageRef, TransportError> {
        self.record(Call::Send { chat_id, reply });
        Ok(MessageRef {
            chat_id,
            message_id: 1000 + self.next_id.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn edit(&self, message: MessageRef, reply: Reply) -> Result<(), TransportError> {
        self.record(Call::Edit { message, reply });
        Ok(())
    }

    async fn delete(&self, message: MessageRef) -> Result<(), TransportError> {
        self.record(Call::Delete(message));
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, _text: Option<String>) -> Result<(), TransportError> {
        self.record(Call::Answer(callback_id.to_string()));
        Ok(())
    }

    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        self.record(Call::Fetch(file_id.to_string()));
        self.files
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| TransportError::Download(format!("no such file: {file_id}")))
    }
}

/// Scan service that returns scripted answers.
///
/// Polls beyond the end of the script keep reporting the last entry
/// (or `InProgress` for an empty script).
pub struct ScriptedScanService {
    submit_result: Result<AnalysisHandle, ScanError>,
    polls: Mutex<VecDeque<Result<AnalysisStatus, ScanError>>>,
    last: Mutex<Result<AnalysisStatus, ScanError>>,
    submits: AtomicU32,
    poll_count: AtomicU32,
    submitted_names: Mutex<Vec<String>>,
}

impl ScriptedScanService {
    pub fn new(polls: Vec<Result<AnalysisStatus, ScanError>>) -> Self {
        Self {
            submit_result: Ok(AnalysisHandle("analysis-1".to_string())),
            polls: Mutex::new(polls.into()),
            last: Mutex::new(Ok(AnalysisStatus::InProgress)),
            submits: AtomicU32::new(0),
            poll_count: AtomicU32::new(0),
            submitted_names: Mutex::new(Vec::new()),
        }
    }

    /// Every poll answers "in progress".
    pub fn pending() -> Self {
        Self::new(Vec::new())
    }

    pub fn failing_submit(error: ScanError) -> Self {
        let mut service = Self::pending();
        service.submit_result = Err(error);
        service
    }

    pub fn submits(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> u32 {
        self.poll_count.load(Ordering::SeqCst)
    }

    pub fn submitted_names(&self) -> Vec<String> {
        self.submitted_names.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScanService for ScriptedScanService {
    async fn submit(&self, _bytes: Vec<u8>, filename: &str) -> Result<AnalysisHandle, ScanError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        self.submitted_names.lock().unwrap().push(filename.to_string());
        self.submit_result.clone()
    }

    async fn fetch_analysis(&self, _handle: &AnalysisHandle) -> Result<AnalysisStatus, ScanError> {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        let next = self.polls.lock().unwrap().pop_front();
        match next {
            Some(result) => {
                *self.last.lock().unwrap() = result.clone();
                result
            }
            None => self.last.lock().unwrap().clone(),
        }
    }
}
