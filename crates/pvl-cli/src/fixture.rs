//! Offline collaborators backed by a JSON case file.
//!
//! ```json
//! {
//!   "proof": {"username_keybase": "kronk", "username_service": "kronk", "sig": "<armored>"},
//!   "hint": {"api_url": "https://gist.github.com/kronk/abc"},
//!   "signature": {"body_base64": "...", "sig_id": "<66 hex chars>"},
//!   "pages": {"https://gist.github.com/kronk/abc": "<page body>"},
//!   "txt": {"_keybase.example.com": ["keybase-site-verification=..."]}
//! }
//! ```

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use pvl_core::{
    DnsError, DnsResolver, FetchError, Fetcher, OpenedSignature, RemoteProof, SigHint, SigId,
    SignatureError, SignatureOpener,
};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct CaseFile {
    pub proof: RemoteProof,
    pub hint: SigHint,
    pub signature: SignatureFixture,
    #[serde(default)]
    pub pages: HashMap<String, String>,
    #[serde(default)]
    pub txt: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignatureFixture {
    pub body_base64: String,
    pub sig_id: String,
}

/// Serves `pages`; any other URL is an HTTP 404.
#[derive(Debug, Clone)]
pub struct FixtureFetcher {
    pages: HashMap<String, String>,
}

impl FixtureFetcher {
    pub fn new(pages: HashMap<String, String>) -> Self {
        Self { pages }
    }
}

impl Fetcher for FixtureFetcher {
    fn get_text(&self, url: &str) -> Result<String, FetchError> {
        debug!(%url, "fixture fetch");
        self.pages.get(url).cloned().ok_or_else(|| FetchError::Http {
            status: 404,
            message: "Not Found".to_string(),
        })
    }
}

/// Serves `txt`; any other domain fails to resolve.
#[derive(Debug, Clone)]
pub struct FixtureResolver {
    zones: HashMap<String, Vec<String>>,
}

impl FixtureResolver {
    pub fn new(zones: HashMap<String, Vec<String>>) -> Self {
        Self { zones }
    }
}

impl DnsResolver for FixtureResolver {
    fn lookup_txt(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        self.zones
            .get(domain)
            .cloned()
            .ok_or_else(|| DnsError(format!("lookup {domain}: no such host")))
    }
}

/// Accepts exactly the armored text recorded in the case's proof.
#[derive(Debug, Clone)]
pub struct FixtureOpener {
    armored: String,
    signature: SignatureFixture,
}

impl FixtureOpener {
    pub fn new(armored: impl Into<String>, signature: SignatureFixture) -> Self {
        Self {
            armored: armored.into(),
            signature,
        }
    }
}

impl SignatureOpener for FixtureOpener {
    fn open_signature(&self, armored: &str) -> Result<OpenedSignature, SignatureError> {
        if armored != self.armored {
            return Err(SignatureError(
                "armored signature does not match the fixture".to_string(),
            ));
        }
        let body = STANDARD
            .decode(self.signature.body_base64.trim())
            .map_err(|err| SignatureError(format!("body is not base64: {err}")))?;
        let sig_id = SigId::from_hex(&self.signature.sig_id)?;
        Ok(OpenedSignature { body, sig_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIG_ID: &str = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff0f";

    fn fixture() -> SignatureFixture {
        SignatureFixture {
            body_base64: STANDARD.encode(b"body"),
            sig_id: SIG_ID.to_string(),
        }
    }

    #[test]
    fn opener_accepts_only_recorded_armor() {
        let opener = FixtureOpener::new("armor", fixture());
        let opened = opener.open_signature("armor").unwrap();
        assert_eq!(opened.body, b"body");
        assert_eq!(opened.sig_id.as_hex(), SIG_ID);
        assert!(opener.open_signature("other").is_err());
    }

    #[test]
    fn unknown_url_and_domain_fail() {
        let fetcher = FixtureFetcher::new(HashMap::new());
        assert!(matches!(
            fetcher.get_text("https://x.test"),
            Err(FetchError::Http { status: 404, .. })
        ));
        let resolver = FixtureResolver::new(HashMap::new());
        assert!(resolver.lookup_txt("x.test").is_err());
    }
}
