//! Redaction of diagnostic text
//!
//! Anything that leaves the process in a message, in `error_details`, or in
//! a log line passes through a [`Redactor`] first.

use lazy_static::lazy_static;
use regex::Regex;

/// Default cap on diagnostic text, in characters
pub const DEFAULT_MAX_LEN: usize = 200;

const MASK: &str = "[REDACTED]";

lazy_static! {
    /// `Bearer <token>` in headers or echoed error bodies
    static ref BEARER_RE: Regex = Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9._~+/=-]+").unwrap();

    /// `access_token=...` style query or form parameters
    static ref QUERY_SECRET_RE: Regex = Regex::new(
        r"(?i)\b(access_token|refresh_token|id_token|token|client_secret|key|password)=([^&\s]+)"
    ).unwrap();

    /// `"access_token": "..."` style JSON members
    static ref JSON_SECRET_RE: Regex = Regex::new(
        r#"(?i)"(access_token|refresh_token|id_token|authorization|client_secret|password)"\s*:\s*"[^"]*""#
    ).unwrap();

    /// Google OAuth access tokens
    static ref GOOGLE_TOKEN_RE: Regex = Regex::new(r"ya29\.[A-Za-z0-9._-]+").unwrap();

    /// Long base64 runs, i.e. file content echoed back somewhere
    static ref BASE64_RUN_RE: Regex = Regex::new(r"[A-Za-z0-9+/]{64,}={0,2}").unwrap();
}

/// Masks credentials and content in free text and caps its length
#[derive(Debug, Clone)]
pub struct Redactor {
    secrets: Vec<String>,
    max_len: usize,
}

impl Default for Redactor {
    fn default() -> Self {
        Self {
            secrets: Vec::new(),
            max_len: DEFAULT_MAX_LEN,
        }
    }
}

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also mask this exact value wherever it appears
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.push(secret);
        }
        self
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// Redact and truncate
    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for secret in &self.secrets {
            out = out.replace(secret.as_str(), MASK);
        }
        out = BEARER_RE.replace_all(&out, "Bearer [REDACTED]").into_owned();
        out = QUERY_SECRET_RE.replace_all(&out, "$1=[REDACTED]").into_owned();
        out = JSON_SECRET_RE
            .replace_all(&out, r#""$1":"[REDACTED]""#)
            .into_owned();
        out = GOOGLE_TOKEN_RE.replace_all(&out, MASK).into_owned();
        out = BASE64_RUN_RE
            .replace_all(&out, |caps: &regex::Captures<'_>| {
                format!("[{} encoded bytes]", caps[0].len())
            })
            .into_owned();
        truncate(&out, self.max_len)
    }
}

/// Cut `text` to at most `max_len` characters, marking the cut
pub fn truncate(text: &str, max_len: usize) -> String {
    match text.char_indices().nth(max_len) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
