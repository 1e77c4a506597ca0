use crate::config::PvlConfig;
use crate::dns::{DnsResolver, run_dns};
use crate::error::{ProofError, ProofResult, ProofStatus};
use crate::fetch::Fetcher;
use crate::program::{ProofDocument, Script};
use crate::service::ServiceType;
use crate::sig::SignatureOpener;
use crate::substitute::ScriptVariables;
use crate::validator::validate_document;
use crate::vm::{ScriptState, StepContext, run_script};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// The claim being checked: who posted the proof, where, and the armored
/// signature they posted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProof {
    pub username_keybase: String,
    #[serde(default)]
    pub username_service: String,
    #[serde(default)]
    pub hostname: String,
    /// Armored signature text.
    pub sig: String,
}

/// Server-supplied pointer to where the proof lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigHint {
    pub api_url: String,
}

/// Engine-scoped proof checking.
///
/// Holds the configuration and the three outside collaborators. An engine is
/// immutable once built, so one instance can serve concurrent checks.
pub struct Engine {
    config: PvlConfig,
    fetcher: Box<dyn Fetcher>,
    resolver: Box<dyn DnsResolver>,
    opener: Box<dyn SignatureOpener>,
}

impl Engine {
    pub fn new(
        config: PvlConfig,
        fetcher: Box<dyn Fetcher>,
        resolver: Box<dyn DnsResolver>,
        opener: Box<dyn SignatureOpener>,
    ) -> Self {
        Self {
            config,
            fetcher,
            resolver,
            opener,
        }
    }

    /// Validate only, returning the candidate scripts for `service`.
    pub fn validate(&self, doc: &ProofDocument, service: ServiceType) -> ProofResult<Vec<Script>> {
        validate_document(doc, service, &self.config)
    }

    /// Check `proof` against the scripts `doc` defines for `service`.
    pub fn check_proof(
        &self,
        doc: &ProofDocument,
        service: ServiceType,
        proof: &RemoteProof,
        hint: &SigHint,
    ) -> ProofResult<()> {
        if !self.config.enabled {
            return Err(ProofError::new(
                ProofStatus::InternalError,
                "PVL is disabled",
            ));
        }

        let scripts = self.validate(doc, service)?;
        let opened = self.opener.open_signature(&proof.sig)?;

        let webish = service.is_webish();
        let vars = ScriptVariables {
            username_service: if webish {
                String::new()
            } else {
                proof.username_service.clone()
            },
            username_keybase: proof.username_keybase.clone(),
            sig: opened.body,
            sig_id_medium: opened.sig_id.to_medium_id(),
            sig_id_short: opened.sig_id.to_short_id(),
            hostname: if webish {
                proof.hostname.clone()
            } else {
                String::new()
            },
        };
        let start = ScriptState::new(service, vars, hint.api_url.as_str());
        let ctx = StepContext {
            fetcher: self.fetcher.as_ref(),
        };

        if service.is_dns() {
            return run_dns(&scripts, &start, &ctx, self.resolver.as_ref());
        }

        let mut first_err = None;
        for (index, script) in scripts.iter().enumerate() {
            match run_script(script, start.clone(), &ctx) {
                Ok(()) => {
                    debug!(%service, script = index, "PVL script verified proof");
                    return Ok(());
                }
                Err(err) => {
                    debug!(%service, script = index, %err, "PVL script failed");
                    first_err.get_or_insert(err);
                }
            }
        }
        let err = first_err.unwrap_or_else(|| ProofError::invalid_pvl("Empty script list"));
        warn!(%service, %err, "PVL proof check failed");
        Err(err)
    }
}
