//! Test fixtures: a temporary database, scan settings and a wired-up bot
//!
//! `TestBot` builds the same `FlowDeps` production uses, with the chat and
//! the scanner replaced by recording doubles.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use cybertutor::conversation::transport::MessageRef;
use cybertutor::conversation::{self, Event, EventKind, FlowDeps, FlowState, IncomingFile, Intent};
use cybertutor::services::breach::BreachClient;
use cybertutor::services::scan::{PollPolicy, ScanOrchestrator, ScanSettings};
use cybertutor::storage::{create_pool, DbPool};
use tempfile::TempDir;

use super::recorder::{RecordingTransport, ScriptedScanService};

/// Default test user (private chat, so chat id == user id)
pub const USER: i64 = 123456789;

/// Fresh migrated database in a temporary directory.
///
/// Keep the `TempDir` alive for as long as the pool is used.
pub fn temp_pool() -> (TempDir, Arc<DbPool>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");
    let pool = create_pool(path.to_str().unwrap()).unwrap();
    (dir, Arc::new(pool))
}

/// Production polling schedule with a 1 KiB upload limit.
pub fn scan_settings() -> ScanSettings {
    ScanSettings {
        api_url: "http://127.0.0.1:9".to_string(),
        api_key: "test-key".to_string(),
        max_file_size: 1024,
        policy: PollPolicy {
            max_attempts: 15,
            base_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(30),
        },
        status_tick: Duration::from_secs(10),
        max_status_ticks: 30,
    }
}

pub struct TestBot {
    pub deps: FlowDeps,
    pub transport: Arc<RecordingTransport>,
    pub scanner: Arc<ScriptedScanService>,
    _dir: TempDir,
}

impl TestBot {
    pub fn new() -> Self {
        Self::with(ScriptedScanService::pending(), scan_settings(), "http://127.0.0.1:9")
    }

    pub fn with_scanner(scanner: ScriptedScanService) -> Self {
        Self::with(scanner, scan_settings(), "http://127.0.0.1:9")
    }

    pub fn with_breach_url(breach_url: &str) -> Self {
        Self::with(ScriptedScanService::pending(), scan_settings(), breach_url)
    }

    pub fn with(scanner: ScriptedScanService, settings: ScanSettings, breach_url: &str) -> Self {
        let (dir, pool) = temp_pool();
        let transport = Arc::new(RecordingTransport::new());
        let scanner = Arc::new(scanner);
        let orchestrator = ScanOrchestrator::new(scanner.clone(), settings.policy);
        let deps = FlowDeps::new(
            transport.clone(),
            pool,
            Arc::new(BreachClient::new(reqwest::Client::new(), breach_url)),
            orchestrator,
            Arc::new(settings),
        );
        Self {
            deps,
            transport,
            scanner,
            _dir: dir,
        }
    }

    pub async fn handle(&self, kind: EventKind) {
        conversation::dispatch(&self.deps, event(kind)).await.unwrap();
    }

    pub fn state(&self) -> Option<FlowState> {
        self.deps.conversations.get(USER)
    }

    pub fn conn(&self) -> cybertutor::storage::DbConnection {
        cybertutor::storage::get_connection(&self.deps.db_pool).unwrap()
    }
}

fn event(kind: EventKind) -> Event {
    Event {
        user_id: USER,
        chat_id: USER,
        username: Some("tester".to_string()),
        language_code: Some("en".to_string()),
        kind,
    }
}

fn message(id: i32) -> MessageRef {
    MessageRef {
        chat_id: USER,
        message_id: id,
    }
}

pub fn command(intent: Intent) -> EventKind {
    EventKind::Command {
        intent,
        message: message(1),
    }
}

pub fn text(body: &str) -> EventKind {
    EventKind::Text {
        text: body.to_string(),
        message: message(2),
    }
}

pub fn callback(data: &str) -> EventKind {
    EventKind::Callback {
        id: format!("cb-{data}"),
        data: data.to_string(),
        message: Some(message(3)),
    }
}

pub fn file(file_id: &str, name: &str, size: u64) -> EventKind {
    EventKind::File(IncomingFile {
        file_id: file_id.to_string(),
        file_name: Some(name.to_string()),
        size,
        message: message(4),
    })
}
