//! `%{name}` template expansion.
//!
//! Only a fixed set of variable names is recognized. Numeric names index into
//! an optional regex match supplied by the caller. Every inserted value is
//! regex-escaped, so variable content can never change the meaning of the
//! surrounding pattern. Unknown names stay in the output verbatim, which lets
//! scripts written for a newer variable set still compile.

use crate::error::{ProofError, ProofResult, ProofStatus};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use std::sync::OnceLock;

/// Per-attempt values a script may reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptVariables {
    /// Blank for DNS and web proofs.
    pub username_service: String,
    pub username_keybase: String,
    pub sig: Vec<u8>,
    pub sig_id_medium: String,
    pub sig_id_short: String,
    /// Blank for proofs that are not DNS or web.
    pub hostname: String,
}

impl ScriptVariables {
    /// Resolve one variable. `Ok(None)` means "not a variable name, leave the
    /// token alone".
    fn lookup(&self, name: &str, matches: &[&str]) -> ProofResult<Option<String>> {
        let value = match name {
            "username_service" => self.username_service.clone(),
            "username_keybase" => self.username_keybase.clone(),
            "sig" => STANDARD.encode(&self.sig),
            "sig_id_medium" => self.sig_id_medium.clone(),
            "sig_id_short" => self.sig_id_short.clone(),
            "hostname" => self.hostname.clone(),
            _ => {
                let Ok(index) = name.parse::<usize>() else {
                    return Ok(None);
                };
                let group = matches.get(index).ok_or_else(|| {
                    ProofError::new(
                        ProofStatus::BadApiUrl,
                        format!("Substitution argument {index} out of range of match"),
                    )
                })?;
                (*group).to_string()
            }
        };
        Ok(Some(value))
    }
}

fn variable_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"%\{[\w0-9]+\}").expect("static token pattern compiles"))
}

/// Expand every `%{name}` token in `template`.
///
/// `matches` is the group list of a prior regex match (`matches[0]` being the
/// whole match); pass an empty slice outside a match context.
pub fn substitute(template: &str, vars: &ScriptVariables, matches: &[&str]) -> ProofResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for token in variable_token().find_iter(template) {
        out.push_str(&template[last..token.start()]);
        let tag = token.as_str();
        let name = &tag[2..tag.len() - 1];
        match vars.lookup(name, matches)? {
            Some(value) => out.push_str(&regex::escape(&value)),
            None => out.push_str(tag),
        }
        last = token.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}
