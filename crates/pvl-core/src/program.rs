//! PVL document contract: envelope, scripts, and the closed instruction set.
//!
//! Wire shape:
//!
//! ```json
//! {
//!   "pvl_version": 1,
//!   "services": {
//!     "github": [[{"fetch": "string"}, {"assert_find_base64": "sig"}],
//!                [{"transform_url": "/^(.*)$/", "to": "%{1}.txt"}, {"fetch": "string"}]],
//!     "dns": [{"assert_regex_match": "/^keybase-site-verification=%{sig_id_short}$/"}]
//!   }
//! }
//! ```
//!
//! A service maps to one script or to an ordered list of alternative scripts.
//!
//! Instruction contract:
//!
//! | key | value | extra keys |
//! |---|---|---|
//! | `assert_regex_match` | regex template | |
//! | `assert_find_base64` | target name (`"sig"`) | |
//! | `whitespace_normalize` | any | |
//! | `regex_capture` | regex template | |
//! | `fetch` | `"string"` / `"html"` / `"json"` | |
//! | `selector_json` | non-empty list of index / key / `{"all": true}` | |
//! | `selector_css` | non-empty list of selector string / index | optional `attr` |
//! | `transform_url` | regex template matched against the fetch URL | required `to` |

use crate::error::{ProofError, ProofResult};
use crate::fetch::FetchMode;
use crate::selector::{CssSelector, JsonSelector};
use crate::service::ServiceType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ASSERT_REGEX_MATCH: &str = "assert_regex_match";
pub const ASSERT_FIND_BASE64: &str = "assert_find_base64";
pub const WHITESPACE_NORMALIZE: &str = "whitespace_normalize";
pub const REGEX_CAPTURE: &str = "regex_capture";
pub const FETCH: &str = "fetch";
pub const SELECTOR_JSON: &str = "selector_json";
pub const SELECTOR_CSS: &str = "selector_css";
pub const TRANSFORM_URL: &str = "transform_url";

const INSTRUCTION_KEYS: [&str; 8] = [
    ASSERT_REGEX_MATCH,
    ASSERT_FIND_BASE64,
    WHITESPACE_NORMALIZE,
    REGEX_CAPTURE,
    FETCH,
    SELECTOR_JSON,
    SELECTOR_CSS,
    TRANSFORM_URL,
];

/// Parsed top-level document envelope.
///
/// Service entries stay as raw JSON until a check asks for them, so a
/// document can carry scripts for services (or instructions) this build does
/// not know without failing checks for the services it does.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProofDocument {
    #[serde(default)]
    pub pvl_version: Value,
    #[serde(default)]
    pub services: Map<String, Value>,
}

impl ProofDocument {
    pub fn version(&self) -> Option<i64> {
        self.pvl_version.as_i64()
    }

    /// Decode the candidate scripts for `service`, in document order.
    pub fn scripts(&self, service: ServiceType) -> ProofResult<Vec<Script>> {
        let entry = self.services.get(service.as_str()).ok_or_else(|| {
            ProofError::invalid_pvl(format!("PVL has no scripts for service {service}"))
        })?;
        let items = entry
            .as_array()
            .ok_or_else(|| ProofError::invalid_pvl("PVL script is not an array"))?;
        if items.is_empty() {
            return Err(ProofError::invalid_pvl("Empty script list"));
        }

        // A list whose first element is itself a list is an OR of scripts.
        if items[0].is_array() {
            items
                .iter()
                .map(|script| {
                    let instructions = script.as_array().ok_or_else(|| {
                        ProofError::invalid_pvl("Could not unpack PVL multiscript")
                    })?;
                    Script::from_values(instructions)
                })
                .collect()
        } else {
            Ok(vec![Script::from_values(items)?])
        }
    }
}

pub fn parse_document(input: &Value) -> ProofResult<ProofDocument> {
    if !input.is_object() {
        return Err(ProofError::invalid_pvl("PVL document must be an object"));
    }
    serde_json::from_value(input.clone())
        .map_err(|err| ProofError::invalid_pvl(format!("invalid PVL document: {err}")))
}

pub fn parse_document_str(input: &str) -> ProofResult<ProofDocument> {
    let value: Value = serde_json::from_str(input)
        .map_err(|err| ProofError::invalid_pvl(format!("PVL document is not JSON: {err}")))?;
    parse_document(&value)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    AssertRegexMatch(String),
    AssertFindBase64(String),
    WhitespaceNormalize,
    RegexCapture(String),
    Fetch(FetchMode),
    SelectorJson(Vec<JsonSelector>),
    SelectorCss {
        selectors: Vec<CssSelector>,
        attr: Option<String>,
    },
    TransformUrl {
        from: String,
        to: String,
    },
}

impl Instruction {
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::AssertRegexMatch(_) => ASSERT_REGEX_MATCH,
            Instruction::AssertFindBase64(_) => ASSERT_FIND_BASE64,
            Instruction::WhitespaceNormalize => WHITESPACE_NORMALIZE,
            Instruction::RegexCapture(_) => REGEX_CAPTURE,
            Instruction::Fetch(_) => FETCH,
            Instruction::SelectorJson(_) => SELECTOR_JSON,
            Instruction::SelectorCss { .. } => SELECTOR_CSS,
            Instruction::TransformUrl { .. } => TRANSFORM_URL,
        }
    }

    /// Decode one wire instruction object. `index` is its position in the
    /// script and is used in error messages.
    pub fn from_value(value: &Value, index: usize) -> ProofResult<Self> {
        let unsupported =
            || ProofError::invalid_pvl(format!("Unsupported PVL instruction {index}"));
        let obj = value.as_object().ok_or_else(unsupported)?;

        let mut named = INSTRUCTION_KEYS.iter().filter(|key| obj.contains_key(**key));
        let key = *named.next().ok_or_else(unsupported)?;
        if let Some(other) = named.next() {
            return Err(ProofError::invalid_pvl(format!(
                "Instruction {index} names both {key} and {other}"
            )));
        }
        let allowed_extra: &[&str] = match key {
            SELECTOR_CSS => &["attr"],
            TRANSFORM_URL => &["to"],
            _ => &[],
        };
        if let Some(extra) = obj
            .keys()
            .find(|k| k.as_str() != key && !allowed_extra.contains(&k.as_str()))
        {
            return Err(ProofError::invalid_pvl(format!(
                "Instruction {index} ({key}) has unexpected key {extra}"
            )));
        }

        let arg = &obj[key];
        let string_arg = |what: &str| {
            arg.as_str().map(str::to_string).ok_or_else(|| {
                ProofError::invalid_pvl(format!("Could not get {what} of instruction {index}"))
            })
        };

        let instruction = match key {
            ASSERT_REGEX_MATCH => Instruction::AssertRegexMatch(string_arg("pattern")?),
            ASSERT_FIND_BASE64 => Instruction::AssertFindBase64(string_arg("target")?),
            WHITESPACE_NORMALIZE => Instruction::WhitespaceNormalize,
            REGEX_CAPTURE => Instruction::RegexCapture(string_arg("pattern")?),
            FETCH => {
                let mode = string_arg("fetch type")?;
                let mode = FetchMode::parse(&mode).ok_or_else(|| {
                    ProofError::invalid_pvl(format!("Unsupported fetch type: {mode}"))
                })?;
                Instruction::Fetch(mode)
            }
            SELECTOR_JSON => {
                let steps = selector_list(arg, "Json", index)?;
                Instruction::SelectorJson(
                    steps
                        .iter()
                        .map(JsonSelector::from_value)
                        .collect::<ProofResult<_>>()?,
                )
            }
            SELECTOR_CSS => {
                let steps = selector_list(arg, "CSS", index)?;
                let attr = match obj.get("attr") {
                    None => None,
                    Some(Value::String(attr)) => Some(attr.clone()),
                    Some(_) => {
                        return Err(ProofError::invalid_pvl(format!(
                            "attr of instruction {index} must be a string"
                        )));
                    }
                };
                Instruction::SelectorCss {
                    selectors: steps
                        .iter()
                        .map(CssSelector::from_value)
                        .collect::<ProofResult<_>>()?,
                    attr,
                }
            }
            TRANSFORM_URL => {
                let from = string_arg("source pattern")?;
                let to = obj.get("to").and_then(Value::as_str).ok_or_else(|| {
                    ProofError::invalid_pvl(format!(
                        "Could not get dest pattern of instruction {index}"
                    ))
                })?;
                Instruction::TransformUrl {
                    from,
                    to: to.to_string(),
                }
            }
            _ => return Err(unsupported()),
        };
        Ok(instruction)
    }
}

fn selector_list<'a>(arg: &'a Value, kind: &str, index: usize) -> ProofResult<&'a Vec<Value>> {
    let steps = arg.as_array().ok_or_else(|| {
        ProofError::invalid_pvl(format!(
            "{kind} selectors of instruction {index} must be an array"
        ))
    })?;
    if steps.is_empty() {
        return Err(ProofError::invalid_pvl(format!(
            "{kind} selector list of instruction {index} must contain at least 1 element"
        )));
    }
    Ok(steps)
}

/// An ordered, non-empty instruction sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub instructions: Vec<Instruction>,
}

impl Script {
    pub fn from_values(values: &[Value]) -> ProofResult<Self> {
        if values.is_empty() {
            return Err(ProofError::invalid_pvl("Empty script"));
        }
        let instructions = values
            .iter()
            .enumerate()
            .map(|(index, value)| Instruction::from_value(value, index))
            .collect::<ProofResult<Vec<_>>>()?;
        Ok(Self { instructions })
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProofStatus;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn single_script_entry_decodes() {
        let doc = parse_document(&json!({
            "pvl_version": 1,
            "services": {
                "twitter": [
                    {"fetch": "html"},
                    {"selector_css": ["div.tweet", 0], "attr": "data-text"},
                    {"whitespace_normalize": true},
                    {"assert_find_base64": "sig"}
                ]
            }
        }))
        .unwrap();
        let scripts = doc.scripts(ServiceType::Twitter).unwrap();
        assert_eq!(scripts.len(), 1);
        assert_eq!(
            scripts[0].instructions,
            vec![
                Instruction::Fetch(FetchMode::Html),
                Instruction::SelectorCss {
                    selectors: vec![
                        CssSelector::Find("div.tweet".into()),
                        CssSelector::Index(0)
                    ],
                    attr: Some("data-text".into()),
                },
                Instruction::WhitespaceNormalize,
                Instruction::AssertFindBase64("sig".into()),
            ]
        );
    }

    #[test]
    fn list_of_scripts_keeps_document_order() {
        let doc = parse_document(&json!({
            "pvl_version": 1,
            "services": {
                "github": [
                    [{"fetch": "string"}, {"assert_regex_match": "/a/"}],
                    [{"transform_url": "/^(.*)$/", "to": "%{1}/raw"}, {"fetch": "json"},
                     {"selector_json": [{"all": true}, "body"]}]
                ]
            }
        }))
        .unwrap();
        let scripts = doc.scripts(ServiceType::Github).unwrap();
        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts[0].len(), 2);
        assert_eq!(
            scripts[1].instructions[2],
            Instruction::SelectorJson(vec![JsonSelector::All, JsonSelector::Key("body".into())])
        );
    }

    #[test]
    fn unknown_instruction_reports_its_index() {
        let err = Script::from_values(&[json!({"fetch": "string"}), json!({"teleport": 1})])
            .unwrap_err();
        assert_eq!(err.status, ProofStatus::InvalidPvl);
        assert_eq!(err.desc, "Unsupported PVL instruction 1");
    }

    #[test]
    fn stray_and_doubled_keys_are_rejected() {
        let cases = [
            json!({"fetch": "string", "attr": "x"}),
            json!({"fetch": "string", "regex_capture": "/x/"}),
            json!({"transform_url": "/x/"}),
            json!({"selector_css": []}),
            json!({"selector_json": "key"}),
            json!({"fetch": "xml"}),
            json!({"assert_regex_match": 7}),
            json!("fetch"),
        ];
        for case in cases {
            let err = Instruction::from_value(&case, 0).unwrap_err();
            assert_eq!(err.status, ProofStatus::InvalidPvl, "{case}");
        }
    }

    #[test]
    fn missing_or_empty_service_entries_fail() {
        let doc = parse_document(&json!({
            "pvl_version": 1,
            "services": {"reddit": [], "github": "nope", "rooter": [[]]}
        }))
        .unwrap();
        for service in [
            ServiceType::Reddit,
            ServiceType::Github,
            ServiceType::Rooter,
            ServiceType::Coinbase,
        ] {
            let err = doc.scripts(service).unwrap_err();
            assert_eq!(err.status, ProofStatus::InvalidPvl, "{service}");
        }
    }

    #[test]
    fn non_object_documents_are_rejected() {
        assert!(parse_document(&json!([1, 2])).is_err());
        assert!(parse_document_str("{not json").is_err());
        let doc = parse_document_str(r#"{"pvl_version": 2}"#).unwrap();
        assert_eq!(doc.version(), Some(2));
    }
}
