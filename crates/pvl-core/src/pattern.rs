//! `/pattern/opts` templates compiled into [`Regex`] values.

use crate::error::{ProofError, ProofResult};
use crate::substitute::{ScriptVariables, substitute};
use regex::Regex;

const ALLOWED_OPTIONS: &str = "imsU";

/// Build a regex from a slash-delimited template.
///
/// The body between the first and last `/` is substituted first, then the
/// trailing option letters become an inline flag group.
pub fn build_regex(template: &str, vars: &ScriptVariables) -> ProofResult<Regex> {
    let malformed = || ProofError::invalid_pvl(format!("Could not build regex {template}"));

    let rest = template.strip_prefix('/').ok_or_else(malformed)?;
    let last_slash = rest.rfind('/').ok_or_else(malformed)?;
    let (body, opts) = (&rest[..last_slash], &rest[last_slash + 1..]);
    if !opts.chars().all(|c| ALLOWED_OPTIONS.contains(c)) {
        return Err(malformed());
    }

    // The regex crate rejects a repeated flag inside one group.
    let mut flags = String::with_capacity(opts.len());
    for c in opts.chars() {
        if !flags.contains(c) {
            flags.push(c);
        }
    }

    let body = substitute(body, vars, &[])?;
    let pattern = if flags.is_empty() {
        body
    } else {
        format!("(?{flags}){body}")
    };

    Regex::new(&pattern).map_err(|err| {
        ProofError::invalid_pvl(format!("Could not compile regex ({template}): {err}"))
    })
}
