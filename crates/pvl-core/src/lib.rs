//! PVL Core crate.
//!
//! PVL (Proof Verification Language) documents describe, per remote service,
//! how to confirm that a user's public proof post is genuine: where to fetch
//! it, how to navigate the fetched content, and what must be found there.
//!
//! Layers:
//!
//! - `program`: document contract and decoding into the closed instruction set.
//! - `validator`: static checks run before anything executes.
//! - `vm`: the per-script runner and instruction semantics.
//! - `substitute` + `pattern`: `%{name}` expansion and regex construction.
//! - `selector`: JSON and CSS navigation over fetched content.
//! - `dns`: the TXT-record driver for DNS proofs.
//! - `engine`: the orchestrator tying validation, signature opening, and
//!   script execution together.
//!
//! Network, DNS and signature cryptography stay outside the crate behind the
//! [`Fetcher`], [`DnsResolver`] and [`SignatureOpener`] traits.

pub mod config;
pub mod dns;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod pattern;
pub mod program;
pub mod selector;
pub mod service;
pub mod sig;
pub mod substitute;
pub mod text;
pub mod validator;
pub mod vm;

pub use config::{PvlConfig, SUPPORTED_PVL_VERSION};
pub use dns::{DnsError, DnsResolver};
pub use engine::{Engine, RemoteProof, SigHint};
pub use error::{ProofError, ProofResult, ProofStatus};
pub use fetch::{FetchError, FetchMode, FetchResult, Fetcher};
pub use program::{Instruction, ProofDocument, Script, parse_document, parse_document_str};
pub use service::ServiceType;
pub use sig::{OpenedSignature, SigId, SignatureError, SignatureOpener};
pub use substitute::ScriptVariables;
pub use validator::validate_document;
