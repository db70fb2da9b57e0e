use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Configuration constants for the bot.
///
/// Every value is read once from the environment (after `.env` has been
/// loaded by `main`) and cached for the lifetime of the process.

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// VirusTotal API key used by the file scanner.
/// Read from VIRUSTOTAL_API_KEY. Empty means scanning is not configured.
pub static VIRUSTOTAL_API_KEY: Lazy<String> =
    Lazy::new(|| env::var("VIRUSTOTAL_API_KEY").unwrap_or_else(|_| String::new()));

/// Maximum accepted upload size in bytes.
/// Read from MAX_FILE_SIZE, default 20 MiB.
pub static MAX_FILE_SIZE: Lazy<u64> = Lazy::new(|| {
    env::var("MAX_FILE_SIZE")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|size| *size > 0)
        .unwrap_or(DEFAULT_MAX_FILE_SIZE)
});

/// 20 MiB, the Bot API download ceiling for regular bots.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: bot.db
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "bot.db".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: cybertutor.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "cybertutor.log".to_string()));

/// Pwned Passwords range API configuration
pub mod breach {
    use super::*;

    /// Base URL of the range API (the `/range/{prefix}` path is appended).
    pub static API_URL: Lazy<String> =
        Lazy::new(|| env::var("PWNED_API_URL").unwrap_or_else(|_| "https://api.pwnedpasswords.com".to_string()));

    /// Descriptive client identifier required by the service.
    pub const USER_AGENT: &str = "cybertutor-bot (security awareness trainer)";
}

/// File scanning configuration
pub mod scan {
    use super::*;

    /// Base URL of the VirusTotal v3 API.
    pub static API_URL: Lazy<String> = Lazy::new(|| {
        env::var("VIRUSTOTAL_API_URL").unwrap_or_else(|_| "https://www.virustotal.com/api/v3".to_string())
    });

    /// Hard ceiling on analysis polls before the job times out.
    pub const MAX_POLL_ATTEMPTS: u32 = 15;

    /// Base delay multiplied by the attempt number between polls (seconds).
    pub const POLL_BASE_DELAY_SECS: u64 = 3;

    /// Upper bound for a single inter-poll delay (seconds).
    pub const POLL_MAX_DELAY_SECS: u64 = 30;

    /// Interval between status message refreshes (seconds).
    pub const STATUS_TICK_SECS: u64 = 10;

    /// Maximum number of status refreshes before the display gives up.
    pub const MAX_STATUS_TICKS: u32 = 30;

    pub fn poll_base_delay() -> Duration {
        Duration::from_secs(POLL_BASE_DELAY_SECS)
    }

    pub fn poll_max_delay() -> Duration {
        Duration::from_secs(POLL_MAX_DELAY_SECS)
    }

    pub fn status_tick() -> Duration {
        Duration::from_secs(STATUS_TICK_SECS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for outbound HTTP requests (in seconds).
    /// Uploads of a 20 MiB file to the scanner must fit in it.
    pub const REQUEST_TIMEOUT_SECS: u64 = 120;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Retry configuration for the dispatcher
pub mod retry {
    use super::Duration;

    /// Maximum number of attempts to reach the Bot API at startup
    pub const STARTUP_MAX_RETRIES: u32 = 12;

    /// Delay between startup attempts (in seconds)
    pub const STARTUP_RETRY_DELAY_SECS: u64 = 5;

    pub fn startup_delay() -> Duration {
        Duration::from_secs(STARTUP_RETRY_DELAY_SECS)
    }
}

/// Checks the settings the process cannot run without.
///
/// Called once from `main` before the dispatcher starts; a missing bot token
/// is fatal.
pub fn validate() -> anyhow::Result<()> {
    if BOT_TOKEN.trim().is_empty() {
        anyhow::bail!("BOT_TOKEN (or TELOXIDE_TOKEN) environment variable not set");
    }
    if VIRUSTOTAL_API_KEY.trim().is_empty() {
        log::warn!("VIRUSTOTAL_API_KEY is not set; /upload will report that scanning is unavailable");
    }
    log::info!(
        "Configuration: database={}, max_file_size={} bytes, scan_api={}",
        *DATABASE_PATH,
        *MAX_FILE_SIZE,
        *scan::API_URL
    );
    Ok(())
}
