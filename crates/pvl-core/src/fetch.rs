//! The fetch collaborator and the typed result of a script's single fetch.

use crate::error::{ProofError, ProofStatus};
use scraper::Html;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    String,
    Html,
    Json,
}

impl FetchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchMode::String => "string",
            FetchMode::Html => "html",
            FetchMode::Json => "json",
        }
    }

    pub fn parse(mode: &str) -> Option<Self> {
        match mode {
            "string" => Some(FetchMode::String),
            "html" => Some(FetchMode::Html),
            "json" => Some(FetchMode::Json),
            _ => None,
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content retrieved by a script's `fetch`. Immutable once stored.
#[derive(Debug, Clone)]
pub enum FetchResult {
    String(String),
    Json(Value),
    Html(Html),
}

impl FetchResult {
    pub fn mode(&self) -> FetchMode {
        match self {
            FetchResult::String(_) => FetchMode::String,
            FetchResult::Json(_) => FetchMode::Json,
            FetchResult::Html(_) => FetchMode::Html,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("request timed out")]
    Timeout,
    #[error("host unreachable: {0}")]
    Unreachable(String),
    #[error("could not parse response: {0}")]
    Parse(String),
}

impl FetchError {
    /// Attach the failing URL and classify into the proof taxonomy.
    pub fn into_proof_error(self, url: &str) -> ProofError {
        let status = match &self {
            FetchError::Http { status, .. } => ProofStatus::from_http(*status),
            FetchError::Timeout => ProofStatus::Timeout,
            FetchError::Unreachable(_) => ProofStatus::HostUnreachable,
            FetchError::Parse(_) => ProofStatus::FailedParse,
        };
        ProofError::new(status, format!("Error fetching {url}: {self}"))
    }
}

/// Retrieves remote content on behalf of a script.
///
/// Only `get_text` is required; HTML and JSON default to parsing the text
/// body. Implementations own their timeouts and report them as
/// [`FetchError::Timeout`].
pub trait Fetcher: Send + Sync {
    fn get_text(&self, url: &str) -> Result<String, FetchError>;

    fn get_html(&self, url: &str) -> Result<Html, FetchError> {
        let body = self.get_text(url)?;
        Ok(Html::parse_document(&body))
    }

    fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let body = self.get_text(url)?;
        serde_json::from_str(&body).map_err(|err| FetchError::Parse(err.to_string()))
    }
}
