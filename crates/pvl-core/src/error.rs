//! Proof status taxonomy and the single error type surfaced by a check.
//!
//! Every failure a verification attempt can produce collapses into one
//! [`ProofError`]: a [`ProofStatus`] code plus a human description. Codes use
//! the identity service's proof-status numbering so callers can report them
//! without translation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ProofResult<T> = Result<T, ProofError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofStatus {
    HostUnreachable,
    FailedParse,
    DnsError,
    Http429,
    Http500,
    Timeout,
    InternalError,
    NotFound,
    ContentFailure,
    TextNotFound,
    Http300,
    Http400,
    HttpOther,
    BadSignature,
    BadApiUrl,
    InvalidPvl,
}

impl ProofStatus {
    /// Numeric proof-status code.
    pub fn code(self) -> u16 {
        match self {
            ProofStatus::HostUnreachable => 101,
            ProofStatus::FailedParse => 106,
            ProofStatus::DnsError => 107,
            ProofStatus::Http429 => 129,
            ProofStatus::Http500 => 150,
            ProofStatus::Timeout => 160,
            ProofStatus::InternalError => 170,
            ProofStatus::NotFound => 201,
            ProofStatus::ContentFailure => 202,
            ProofStatus::TextNotFound => 205,
            ProofStatus::Http300 => 230,
            ProofStatus::Http400 => 240,
            ProofStatus::HttpOther => 260,
            ProofStatus::BadSignature => 303,
            ProofStatus::BadApiUrl => 304,
            ProofStatus::InvalidPvl => 308,
        }
    }

    /// Transient network-class failures (the 1xx range).
    pub fn is_soft(self) -> bool {
        (100..200).contains(&self.code())
    }

    /// Map an HTTP response status onto the proof taxonomy.
    pub fn from_http(status: u16) -> Self {
        match status / 100 {
            3 => ProofStatus::Http300,
            4 if status == 429 => ProofStatus::Http429,
            4 => ProofStatus::Http400,
            5 => ProofStatus::Http500,
            _ => ProofStatus::HttpOther,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{desc} (code={})", .status.code())]
pub struct ProofError {
    pub status: ProofStatus,
    pub desc: String,
}

impl ProofError {
    pub fn new(status: ProofStatus, desc: impl Into<String>) -> Self {
        Self {
            status,
            desc: desc.into(),
        }
    }

    pub fn invalid_pvl(desc: impl Into<String>) -> Self {
        Self::new(ProofStatus::InvalidPvl, desc)
    }

    pub fn content_failure(desc: impl Into<String>) -> Self {
        Self::new(ProofStatus::ContentFailure, desc)
    }

    /// Re-tag an `InvalidPvl` error with the program counter it came from.
    /// Other statuses pass through untouched.
    pub(crate) fn at_instruction(self, pc: usize) -> Self {
        if self.status != ProofStatus::InvalidPvl {
            return self;
        }
        Self::invalid_pvl(format!("Invalid PVL ({pc}): {}", self.desc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_numeric_code() {
        let err = ProofError::content_failure("Regex did not match");
        assert_eq!(err.to_string(), "Regex did not match (code=202)");
    }

    #[test]
    fn only_invalid_pvl_is_rewrapped_with_position() {
        let wrapped = ProofError::invalid_pvl("bad target").at_instruction(3);
        assert_eq!(wrapped.desc, "Invalid PVL (3): bad target");

        let untouched = ProofError::content_failure("nope").at_instruction(3);
        assert_eq!(untouched.desc, "nope");
    }

    #[test]
    fn http_statuses_map_by_class() {
        assert_eq!(ProofStatus::from_http(301), ProofStatus::Http300);
        assert_eq!(ProofStatus::from_http(404), ProofStatus::Http400);
        assert_eq!(ProofStatus::from_http(429), ProofStatus::Http429);
        assert_eq!(ProofStatus::from_http(503), ProofStatus::Http500);
        assert_eq!(ProofStatus::from_http(600), ProofStatus::HttpOther);
        assert!(ProofStatus::Timeout.is_soft());
        assert!(!ProofStatus::ContentFailure.is_soft());
    }
}
