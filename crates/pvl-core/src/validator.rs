//! Static checks run before any script executes.
//!
//! Validation is structural only: it never fetches and never compiles a
//! regex. Checks run in a fixed order and the first failure is returned.
//!
//! 1. `pvl_version` equals the configured supported version.
//! 2. The requested service has a non-empty list of scripts.
//! 3. Every instruction decodes into the closed instruction set.
//! 4. A per-script scan of fetch placement (see [`validate_script`]).

use crate::config::PvlConfig;
use crate::error::{ProofError, ProofResult};
use crate::fetch::FetchMode;
use crate::program::{Instruction, ProofDocument, Script};
use crate::service::ServiceType;

/// Validate `doc` for `service` and return its decoded candidate scripts.
pub fn validate_document(
    doc: &ProofDocument,
    service: ServiceType,
    config: &PvlConfig,
) -> ProofResult<Vec<Script>> {
    let version = doc.version().ok_or_else(|| {
        ProofError::invalid_pvl(format!(
            "PVL missing version number: {}",
            doc.pvl_version
        ))
    })?;
    if version != config.supported_version {
        return Err(ProofError::invalid_pvl(format!(
            "PVL is for the wrong version {version} != {}",
            config.supported_version
        )));
    }

    let scripts = doc.scripts(service)?;
    for script in &scripts {
        validate_script(script, service)?;
    }
    Ok(scripts)
}

/// Scan one decoded script for fetch-placement errors.
///
/// - DNS scripts may not fetch, select, or transform the URL.
/// - Other scripts fetch at most once.
/// - `selector_json` needs an earlier json fetch, `selector_css` an earlier
///   html fetch.
/// - `transform_url` must come before the fetch.
pub fn validate_script(script: &Script, service: ServiceType) -> ProofResult<()> {
    if script.is_empty() {
        return Err(ProofError::invalid_pvl("Empty script"));
    }
    let dns = service.is_dns();
    let mut fetched: Option<FetchMode> = None;

    for instruction in &script.instructions {
        match instruction {
            Instruction::AssertRegexMatch(_)
            | Instruction::AssertFindBase64(_)
            | Instruction::WhitespaceNormalize
            | Instruction::RegexCapture(_) => {}
            Instruction::Fetch(mode) => {
                if dns {
                    return Err(ProofError::invalid_pvl(
                        "DNS script cannot contain fetch instruction",
                    ));
                }
                if fetched.is_some() {
                    return Err(ProofError::invalid_pvl(
                        "Script cannot contain multiple fetch instructions",
                    ));
                }
                fetched = Some(*mode);
            }
            Instruction::SelectorJson(_) => {
                require_fetched(dns, fetched, FetchMode::Json, "json selector")?;
            }
            Instruction::SelectorCss { .. } => {
                require_fetched(dns, fetched, FetchMode::Html, "css selector")?;
            }
            Instruction::TransformUrl { .. } => {
                if dns {
                    return Err(ProofError::invalid_pvl("DNS script cannot transform url"));
                }
                if fetched.is_some() {
                    return Err(ProofError::invalid_pvl(
                        "Script cannot transform after fetch",
                    ));
                }
            }
        }
    }
    Ok(())
}

fn require_fetched(
    dns: bool,
    fetched: Option<FetchMode>,
    wanted: FetchMode,
    what: &str,
) -> ProofResult<()> {
    if dns {
        return Err(ProofError::invalid_pvl(format!("DNS script cannot use {what}")));
    }
    match fetched {
        None => Err(ProofError::invalid_pvl("Script cannot select before fetch")),
        Some(mode) if mode != wanted => Err(ProofError::invalid_pvl(format!(
            "Script contains {what} in non-{wanted} mode"
        ))),
        Some(_) => Ok(()),
    }
}
