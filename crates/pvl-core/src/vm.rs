//! Script runner and per-instruction step handlers.
//!
//! A script runs strictly in order: each instruction takes the current
//! [`ScriptState`] by value and either hands back the updated state or stops
//! the script with an error. There are no jumps, loops, or retries.

use crate::error::{ProofError, ProofResult, ProofStatus};
use crate::fetch::{FetchMode, FetchResult, Fetcher};
use crate::pattern::build_regex;
use crate::program::{Instruction, Script};
use crate::selector::{CssSelector, JsonSelector, select_css, select_json, selection_contents};
use crate::service::ServiceType;
use crate::substitute::{ScriptVariables, substitute};
use crate::text::{find_base64_block, whitespace_normalize};
use tracing::debug;

/// Mutable record threaded through one script attempt.
#[derive(Debug, Clone)]
pub struct ScriptState {
    pub pc: usize,
    pub service: ServiceType,
    pub vars: ScriptVariables,
    pub active_string: String,
    pub fetch_url: String,
    /// `None` until the script's fetch runs.
    pub fetch_result: Option<FetchResult>,
}

impl ScriptState {
    /// Fresh state whose active string and fetch URL both start at `hint_url`.
    pub fn new(service: ServiceType, vars: ScriptVariables, hint_url: impl Into<String>) -> Self {
        let hint_url = hint_url.into();
        Self {
            pc: 0,
            service,
            vars,
            active_string: hint_url.clone(),
            fetch_url: hint_url,
            fetch_result: None,
        }
    }
}

/// Collaborators a running script may call out to.
pub struct StepContext<'a> {
    pub fetcher: &'a dyn Fetcher,
}

/// Run `script` to completion from `state`.
pub fn run_script(script: &Script, mut state: ScriptState, ctx: &StepContext) -> ProofResult<()> {
    if script.is_empty() {
        return Err(ProofError::invalid_pvl("Empty scripts are not allowed."));
    }
    for instruction in &script.instructions {
        let pc = state.pc;
        debug!(pc, op = instruction.name(), "PVL step");
        state = step(instruction, state, ctx).map_err(|err| err.at_instruction(pc))?;
        state.pc += 1;
    }
    Ok(())
}

/// Dispatch one instruction.
pub fn step(
    instruction: &Instruction,
    state: ScriptState,
    ctx: &StepContext,
) -> ProofResult<ScriptState> {
    match instruction {
        Instruction::AssertRegexMatch(template) => assert_regex_match(template, state),
        Instruction::AssertFindBase64(target) => assert_find_base64(target, state),
        Instruction::WhitespaceNormalize => {
            let mut state = state;
            state.active_string = whitespace_normalize(&state.active_string);
            Ok(state)
        }
        Instruction::RegexCapture(template) => regex_capture(template, state),
        Instruction::Fetch(mode) => fetch(*mode, state, ctx),
        Instruction::SelectorJson(path) => selector_json(path, state),
        Instruction::SelectorCss { selectors, attr } => {
            selector_css(selectors, attr.as_deref(), state)
        }
        Instruction::TransformUrl { from, to } => transform_url(from, to, state),
    }
}

fn assert_regex_match(template: &str, state: ScriptState) -> ProofResult<ScriptState> {
    let re = build_regex(template, &state.vars)?;
    if !re.is_match(&state.active_string) {
        debug!(regex = %re, active = %state.active_string, "PVL regex did not match");
        return Err(ProofError::content_failure(format!("Regex did not match {re}")));
    }
    Ok(state)
}

fn assert_find_base64(target: &str, state: ScriptState) -> ProofResult<ScriptState> {
    if target != "sig" {
        return Err(ProofError::invalid_pvl("Can only assert_find_base64 for sig"));
    }
    if !find_base64_block(&state.active_string, &state.vars.sig) {
        return Err(ProofError::new(
            ProofStatus::TextNotFound,
            "Signature not found",
        ));
    }
    Ok(state)
}

fn regex_capture(template: &str, mut state: ScriptState) -> ProofResult<ScriptState> {
    let re = build_regex(template, &state.vars)?;
    let captured = re
        .captures(&state.active_string)
        .and_then(|caps| caps.get(1))
        .map(|group| group.as_str().to_string());
    match captured {
        Some(group) => {
            state.active_string = group;
            Ok(state)
        }
        None => {
            debug!(regex = %re, active = %state.active_string, "PVL regex capture did not match");
            Err(ProofError::content_failure(format!(
                "Regex capture did not match: {re}"
            )))
        }
    }
}

fn fetch(mode: FetchMode, mut state: ScriptState, ctx: &StepContext) -> ProofResult<ScriptState> {
    if state.fetch_result.is_some() {
        return Err(ProofError::invalid_pvl(
            "Script cannot contain more than one fetch",
        ));
    }
    if state.service.is_dns() {
        return Err(ProofError::invalid_pvl("Script cannot fetch for DNS"));
    }

    let url = state.fetch_url.as_str();
    debug!(%url, %mode, "PVL fetch");
    let result = match mode {
        FetchMode::String => ctx.fetcher.get_text(url).map(FetchResult::String),
        FetchMode::Json => ctx.fetcher.get_json(url).map(FetchResult::Json),
        FetchMode::Html => ctx.fetcher.get_html(url).map(FetchResult::Html),
    }
    .map_err(|err| err.into_proof_error(url))?;

    state.active_string = match &result {
        FetchResult::String(body) => body.clone(),
        FetchResult::Json(_) | FetchResult::Html(_) => String::new(),
    };
    state.fetch_result = Some(result);
    Ok(state)
}

fn selector_json(path: &[JsonSelector], mut state: ScriptState) -> ProofResult<ScriptState> {
    let Some(FetchResult::Json(root)) = &state.fetch_result else {
        return Err(mode_mismatch("json selector", state.fetch_result.as_ref()));
    };
    let results = select_json(root, path);
    if results.is_empty() {
        return Err(ProofError::content_failure(
            "Json selector did not match any values",
        ));
    }
    state.active_string = results.join(" ");
    Ok(state)
}

fn selector_css(
    selectors: &[CssSelector],
    attr: Option<&str>,
    mut state: ScriptState,
) -> ProofResult<ScriptState> {
    let Some(FetchResult::Html(doc)) = &state.fetch_result else {
        return Err(mode_mismatch("css selector", state.fetch_result.as_ref()));
    };
    let selection = select_css(doc, selectors)?;
    if selection.is_empty() {
        return Err(ProofError::content_failure("No elements matched by selector"));
    }
    let contents = selection_contents(&selection, attr)?;
    state.active_string = contents;
    Ok(state)
}

fn mode_mismatch(what: &str, fetched: Option<&FetchResult>) -> ProofError {
    match fetched {
        Some(result) => ProofError::invalid_pvl(format!(
            "Cannot use {what} with {} fetch result",
            result.mode()
        )),
        None => ProofError::invalid_pvl(format!("Cannot use {what} before fetch")),
    }
}

fn transform_url(from: &str, to: &str, mut state: ScriptState) -> ProofResult<ScriptState> {
    let re = build_regex(from, &state.vars)?;
    let Some(caps) = re.captures(&state.fetch_url) else {
        debug!(regex = %re, url = %state.fetch_url, "PVL regex transform did not match");
        return Err(ProofError::content_failure(format!(
            "Regex transform did not match: {re}"
        )));
    };
    let groups: Vec<&str> = caps
        .iter()
        .map(|group| group.map_or("", |m| m.as_str()))
        .collect();
    let new_url = substitute(to, &state.vars, &groups).map_err(|err| {
        debug!(regex = %re, url = %state.fetch_url, "PVL regex transform did not substitute");
        ProofError::new(
            ProofStatus::BadApiUrl,
            format!("Regex transform did not substitute: {re} {}", err.desc),
        )
    })?;

    state.fetch_url = new_url.clone();
    state.active_string = new_url;
    Ok(state)
}
