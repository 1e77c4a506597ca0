//! JSON-path and CSS-path selection over fetched content.
//!
//! JSON paths descend a `serde_json::Value` by index, key, or the `{"all":
//! true}` wildcard. CSS paths run against an arena-backed [`Html`] document:
//! strings find descendants, integers pick the nth element of the current
//! selection. Both preserve left-to-right document order in their output.

use crate::error::{ProofError, ProofResult};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonSelector {
    Index(i64),
    Key(String),
    All,
}

impl JsonSelector {
    pub fn from_value(value: &Value) -> ProofResult<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(JsonSelector::Index)
                .ok_or_else(|| unrecognized("json", value)),
            Value::String(key) => Ok(JsonSelector::Key(key.clone())),
            Value::Object(obj) if obj.get("all") == Some(&Value::Bool(true)) && obj.len() == 1 => {
                Ok(JsonSelector::All)
            }
            _ => Err(unrecognized("json", value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CssSelector {
    Find(String),
    Index(i64),
}

impl CssSelector {
    pub fn from_value(value: &Value) -> ProofResult<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(CssSelector::Index)
                .ok_or_else(|| unrecognized("css", value)),
            Value::String(s) => Ok(CssSelector::Find(s.clone())),
            _ => Err(unrecognized("css", value)),
        }
    }
}

fn unrecognized(kind: &str, value: &Value) -> ProofError {
    ProofError::invalid_pvl(format!("Selector entry not recognized for {kind} selector: {value}"))
}

/// Every string reached by `path`, in traversal order.
///
/// A branch that cannot continue (wrong container type, missing key, index out
/// of range) contributes nothing; the caller decides whether an empty result
/// is a failure.
pub fn select_json(root: &Value, path: &[JsonSelector]) -> Vec<String> {
    let mut out = Vec::new();
    collect_json(root, path, &mut out);
    out
}

fn collect_json(node: &Value, path: &[JsonSelector], out: &mut Vec<String>) {
    let Some((selector, rest)) = path.split_first() else {
        out.push(stringify(node));
        return;
    };
    match selector {
        JsonSelector::Index(index) => {
            let Some(items) = node.as_array() else {
                debug!(index, "PVL json select by index from non-array");
                return;
            };
            match usize::try_from(*index).ok().and_then(|i| items.get(i)) {
                Some(child) => collect_json(child, rest, out),
                None => debug!(index, len = items.len(), "PVL json index out of range"),
            }
        }
        JsonSelector::Key(key) => {
            let Some(fields) = node.as_object() else {
                debug!(%key, "PVL json select by key from non-map");
                return;
            };
            match fields.get(key) {
                Some(child) => collect_json(child, rest, out),
                None => debug!(%key, "PVL json key missing"),
            }
        }
        JsonSelector::All => match node {
            Value::Array(items) => {
                for child in items {
                    collect_json(child, rest, out);
                }
            }
            Value::Object(fields) => {
                for child in fields.values() {
                    collect_json(child, rest, out);
                }
            }
            _ => debug!("PVL json select could not get children of scalar"),
        },
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Apply a CSS path to `doc`, starting from the whole document.
pub fn select_css<'a>(doc: &'a Html, path: &[CssSelector]) -> ProofResult<Vec<ElementRef<'a>>> {
    // `None` stands for the document itself, so the first find can match the
    // root element too.
    let mut selection: Option<Vec<ElementRef<'a>>> = None;
    for step in path {
        selection = Some(match step {
            CssSelector::Find(query) => {
                let selector = Selector::parse(query).map_err(|err| {
                    ProofError::invalid_pvl(format!(
                        "Could not parse css selector {query:?}: {err}"
                    ))
                })?;
                match &selection {
                    None => doc.select(&selector).collect(),
                    Some(elements) => find_within(elements, &selector),
                }
            }
            CssSelector::Index(index) => {
                let elements = selection.unwrap_or_else(|| vec![doc.root_element()]);
                nth(elements, *index).into_iter().collect()
            }
        });
    }
    Ok(selection.unwrap_or_else(|| vec![doc.root_element()]))
}

fn find_within<'a>(elements: &[ElementRef<'a>], selector: &Selector) -> Vec<ElementRef<'a>> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for element in elements {
        for matched in element.select(selector) {
            if seen.insert(matched.id()) {
                found.push(matched);
            }
        }
    }
    found
}

/// Element at `index`, counting from the end when negative.
fn nth(elements: Vec<ElementRef<'_>>, index: i64) -> Option<ElementRef<'_>> {
    let len = i64::try_from(elements.len()).ok()?;
    let index = if index < 0 { len + index } else { index };
    usize::try_from(index)
        .ok()
        .and_then(|i| elements.get(i).copied())
}

/// Text (or `attr` value) of each element, joined by single spaces.
pub fn selection_contents(elements: &[ElementRef<'_>], attr: Option<&str>) -> ProofResult<String> {
    let mut parts = Vec::with_capacity(elements.len());
    for element in elements {
        match attr {
            Some(name) => {
                let value = element.value().attr(name).ok_or_else(|| {
                    ProofError::content_failure(format!(
                        "Could not get html for selection: could not get attr {name} of element"
                    ))
                })?;
                parts.push(value.to_string());
            }
            None => parts.push(element.text().collect::<String>()),
        }
    }
    Ok(parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProofStatus;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn path(steps: Value) -> Vec<JsonSelector> {
        steps
            .as_array()
            .unwrap()
            .iter()
            .map(|s| JsonSelector::from_value(s).unwrap())
            .collect()
    }

    #[test]
    fn json_descends_by_key_and_index() {
        let doc = json!({"data": {"children": [{"title": "first"}, {"title": "second"}]}});
        let got = select_json(&doc, &path(json!(["data", "children", 1, "title"])));
        assert_eq!(got, vec!["second".to_string()]);
    }

    #[test]
    fn json_wildcard_fans_out_and_swallows_failing_branches() {
        let doc = json!([
            {"data": {"selftext": "alpha"}},
            {"data": "not an object"},
            {"other": 1},
            {"data": {"selftext": "beta"}}
        ]);
        let got = select_json(&doc, &path(json!([{"all": true}, "data", "selftext"])));
        assert_eq!(got, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn json_wildcard_visits_object_values_in_key_order() {
        let doc = json!({"zeta": "3", "alpha": "1", "mid": {"x": "2"}});
        let got = select_json(&doc, &path(json!([{"all": true}])));
        assert_eq!(got, vec!["1", r#"{"x":"2"}"#, "3"]);

        let got = select_json(&doc, &path(json!([{"all": true}, "x"])));
        assert_eq!(got, vec!["2"]);
    }

    #[test]
    fn json_non_strings_are_serialized() {
        let doc = json!({"n": 5, "obj": {"a": [1, 2]}, "nil": null});
        assert_eq!(select_json(&doc, &path(json!(["n"]))), vec!["5"]);
        assert_eq!(
            select_json(&doc, &path(json!(["obj"]))),
            vec![r#"{"a":[1,2]}"#]
        );
        assert_eq!(select_json(&doc, &path(json!(["nil"]))), vec!["null"]);
    }

    #[test]
    fn json_misses_yield_nothing() {
        let doc = json!({"a": [1]});
        assert!(select_json(&doc, &path(json!(["b"]))).is_empty());
        assert!(select_json(&doc, &path(json!(["a", 3]))).is_empty());
        assert!(select_json(&doc, &path(json!(["a", -1]))).is_empty());
        assert!(select_json(&doc, &path(json!([0]))).is_empty());
    }

    #[test]
    fn json_rejects_unknown_selector_entries() {
        for bad in [json!({"all": false}), json!(true), json!(1.5), json!(null)] {
            let err = JsonSelector::from_value(&bad).unwrap_err();
            assert_eq!(err.status, ProofStatus::InvalidPvl);
        }
    }

    const PAGE: &str = r#"
        <html><body>
          <div class="bio">first <b>bio</b></div>
          <ul id="posts">
            <li class="post" data-id="1">one</li>
            <li class="post" data-id="2">two</li>
            <li class="post">three</li>
          </ul>
        </body></html>"#;

    fn css(steps: Value) -> Vec<CssSelector> {
        steps
            .as_array()
            .unwrap()
            .iter()
            .map(|s| CssSelector::from_value(s).unwrap())
            .collect()
    }

    #[test]
    fn css_finds_text_in_document_order() {
        let doc = Html::parse_document(PAGE);
        let found = select_css(&doc, &css(json!(["li.post"]))).unwrap();
        assert_eq!(selection_contents(&found, None).unwrap(), "one two three");

        let bio = select_css(&doc, &css(json!(["div.bio"]))).unwrap();
        assert_eq!(selection_contents(&bio, None).unwrap(), "first bio");
    }

    #[test]
    fn css_chains_find_and_index() {
        let doc = Html::parse_document(PAGE);
        let second = select_css(&doc, &css(json!(["#posts", "li", 1]))).unwrap();
        assert_eq!(selection_contents(&second, None).unwrap(), "two");

        let last = select_css(&doc, &css(json!(["li", -1]))).unwrap();
        assert_eq!(selection_contents(&last, None).unwrap(), "three");

        let none = select_css(&doc, &css(json!(["li", 7]))).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn css_attribute_reads_require_every_element() {
        let doc = Html::parse_document(PAGE);
        let first_two = select_css(&doc, &css(json!(["li", 0]))).unwrap();
        assert_eq!(selection_contents(&first_two, Some("data-id")).unwrap(), "1");

        let all = select_css(&doc, &css(json!(["li"]))).unwrap();
        let err = selection_contents(&all, Some("data-id")).unwrap_err();
        assert_eq!(err.status, ProofStatus::ContentFailure);
    }

    #[test]
    fn css_nested_finds_are_deduplicated() {
        let doc = Html::parse_document("<div><div><p>x</p></div></div>");
        let found = select_css(&doc, &css(json!(["div", "p"]))).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn css_bad_selector_is_invalid_pvl() {
        let doc = Html::parse_document(PAGE);
        let err = select_css(&doc, &css(json!(["[[["]))).unwrap_err();
        assert_eq!(err.status, ProofStatus::InvalidPvl);
    }
}
