//! DNS proof driver: tries every script against every TXT record of the
//! proof's hostname, falling back to the `_keybase.` subdomain.

use crate::error::{ProofError, ProofResult, ProofStatus};
use crate::program::Script;
use crate::vm::{ScriptState, StepContext, run_script};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DnsError(pub String);

/// Resolves TXT records for a domain.
pub trait DnsResolver: Send + Sync {
    fn lookup_txt(&self, domain: &str) -> Result<Vec<String>, DnsError>;
}

/// Domains checked for a hostname, in order.
pub fn candidate_domains(hostname: &str) -> [String; 2] {
    [hostname.to_string(), format!("_keybase.{hostname}")]
}

/// Succeed if any (domain, record, script) triple succeeds.
///
/// Each attempt starts from a fresh copy of `start` with the TXT record as
/// its active string. When nothing matches, the error for the first domain
/// is returned.
pub fn run_dns(
    scripts: &[Script],
    start: &ScriptState,
    ctx: &StepContext,
    resolver: &dyn DnsResolver,
) -> ProofResult<()> {
    let mut first_err = None;
    for domain in candidate_domains(&start.vars.hostname) {
        match run_dns_domain(scripts, start, ctx, resolver, &domain) {
            Ok(()) => return Ok(()),
            Err(err) => {
                debug!(%domain, %err, "PVL DNS domain did not verify");
                first_err.get_or_insert(err);
            }
        }
    }
    Err(first_err.unwrap_or_else(|| {
        ProofError::new(ProofStatus::InternalError, "No DNS domains to check")
    }))
}

fn run_dns_domain(
    scripts: &[Script],
    start: &ScriptState,
    ctx: &StepContext,
    resolver: &dyn DnsResolver,
    domain: &str,
) -> ProofResult<()> {
    let records = resolver.lookup_txt(domain).map_err(|err| {
        ProofError::new(
            ProofStatus::DnsError,
            format!("DNS failure for {domain}: {err}"),
        )
    })?;

    for record in &records {
        debug!(%domain, %record, "PVL checking TXT record");
        for script in scripts {
            let mut state = start.clone();
            state.active_string = record.clone();
            if run_script(script, state, ctx).is_ok() {
                return Ok(());
            }
        }
    }

    Err(ProofError::new(
        ProofStatus::NotFound,
        format!(
            "Checked {} TXT entries of {domain}, but didn't find signature",
            records.len()
        ),
    ))
}
