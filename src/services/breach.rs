//! Pwned Passwords range API client.
//!
//! Only the first five hex characters of the SHA-1 digest leave the process
//! (k-anonymity); the matching happens locally against the returned
//! `SUFFIX:COUNT` lines.

use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::core::config;

/// Result of a breach lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreachLookup {
    pub found: bool,
    /// Number of times the secret appears in the corpus (0 when not found)
    pub count: u64,
}

impl BreachLookup {
    pub fn not_found() -> Self {
        Self { found: false, count: 0 }
    }

    /// Severity banner tier, `None` for a clean secret.
    pub fn severity(&self) -> Option<Severity> {
        self.found.then(|| Severity::from_count(self.count))
    }
}

/// How bad a breached secret is, by occurrence count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// More than 1000 occurrences
    Critical,
    /// More than 100 occurrences
    Danger,
    Warning,
}

impl Severity {
    pub fn from_count(count: u64) -> Self {
        if count > 1000 {
            Severity::Critical
        } else if count > 100 {
            Severity::Danger
        } else {
            Severity::Warning
        }
    }

    /// Locale key of the banner shown above the result.
    pub fn banner_key(&self) -> &'static str {
        match self {
            Severity::Critical => "password-banner-critical",
            Severity::Danger => "password-banner-danger",
            Severity::Warning => "password-banner-warning",
        }
    }
}

/// Transport-level failure of the lookup. Never retried.
#[derive(Debug, Error)]
pub enum BreachError {
    #[error("breach lookup request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("breach lookup returned HTTP {0}")]
    HttpStatus(reqwest::StatusCode),
}

/// Upper-case hex SHA-1 split into the 5-char prefix and the 35-char suffix.
pub fn split_digest(secret: &str) -> (String, String) {
    let digest = hex::encode_upper(Sha1::digest(secret.as_bytes()));
    let (prefix, suffix) = digest.split_at(5);
    (prefix.to_string(), suffix.to_string())
}

/// Finds `suffix` in a range response body and returns its count.
///
/// Lines are `SUFFIX:COUNT`, CRLF tolerated. Lines without exactly one
/// colon or with an unparsable count are skipped.
pub fn find_suffix(body: &str, suffix: &str) -> Option<u64> {
    body.lines().find_map(|line| {
        let mut parts = line.trim().split(':');
        let (candidate, count) = match (parts.next(), parts.next(), parts.next()) {
            (Some(candidate), Some(count), None) => (candidate, count),
            _ => return None,
        };
        if !candidate.eq_ignore_ascii_case(suffix) {
            return None;
        }
        count.trim().parse::<u64>().ok()
    })
}

/// Client for the range endpoint.
#[derive(Debug, Clone)]
pub struct BreachClient {
    http: reqwest::Client,
    base_url: String,
}

impl BreachClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Client pointed at the configured API URL.
    pub fn from_env(http: reqwest::Client) -> Self {
        Self::new(http, config::breach::API_URL.as_str())
    }

    /// Checks whether `secret` appears in the breach corpus.
    ///
    /// The secret itself is never logged.
    pub async fn check_secret(&self, secret: &str) -> Result<BreachLookup, BreachError> {
        let (prefix, suffix) = split_digest(secret);
        let url = format!("{}/range/{}", self.base_url, prefix);

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::USER_AGENT, config::breach::USER_AGENT)
            .send()
            .await?;

        if !response.status().is_success() {
            log::warn!("Breach lookup for prefix {} returned {}", prefix, response.status());
            return Err(BreachError::HttpStatus(response.status()));
        }

        let body = response.text().await?;
        let lookup = match find_suffix(&body, &suffix) {
            Some(count) => BreachLookup { found: true, count },
            None => BreachLookup::not_found(),
        };
        log::debug!("Breach lookup for prefix {}: found={}", prefix, lookup.found);
        Ok(lookup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_digest_of_password() {
        // SHA-1("password") = 5BAA61E4C9B93F3F0682250B6CF8331B7EE68FD8
        let (prefix, suffix) = split_digest("password");
        assert_eq!(prefix, "5BAA6");
        assert_eq!(suffix, "1E4C9B93F3F0682250B6CF8331B7EE68FD8");
        assert_eq!(suffix.len(), 35);
    }

    #[test]
    fn test_find_suffix_matches_case_insensitively() {
        let body = "0018A45C4D1DEF81644B54AB7F969B88D65:1\r\n1e4c9b93f3f0682250b6cf8331b7ee68fd8:3861493\r\n";
        assert_eq!(find_suffix(body, "1E4C9B93F3F0682250B6CF8331B7EE68FD8"), Some(3_861_493));
    }

    #[test]
    fn test_find_suffix_skips_malformed_lines() {
        let body = "garbage\nABC:1:2\nABC:notanumber\nABC:5\n";
        assert_eq!(find_suffix(body, "abc"), Some(5));
    }

    #[test]
    fn test_find_suffix_not_found() {
        assert_eq!(find_suffix("AAA:1\nBBB:2", "CCC"), None);
        assert_eq!(find_suffix("", "CCC"), None);
    }

    #[test]
    fn test_severity_thresholds() {
        assert_eq!(Severity::from_count(1001), Severity::Critical);
        assert_eq!(Severity::from_count(1000), Severity::Danger);
        assert_eq!(Severity::from_count(101), Severity::Danger);
        assert_eq!(Severity::from_count(100), Severity::Warning);
        assert_eq!(BreachLookup::not_found().severity(), None);
    }
}
