//! Repair of double-encoded agreement payloads.
//!
//! The agreements endpoint embeds JSON documents as string values inside its
//! JSON response (`"articulations": "[{\"type\": ...}]"`), and sometimes wraps
//! the whole body in one more pair of quotes. The fix-up below undoes exactly
//! that shape, in this order:
//!
//! 1. strip one leading and one trailing `"`, if present
//! 2. unescape every `\"` to `"`
//! 3. drop a `"` directly before `{` / `[` and directly after `}` / `]`
//!
//! It is not a lenient JSON parser. Anything still invalid after these passes
//! is reported as [`ArticulateError::MalformedResponse`].

use serde_json::Value;
use tracing::debug;

use articulate_shared::{ArticulateError, Result};

use crate::document::ArticulationDocument;

/// Quote-wrapped literal markers and their replacements, applied in order.
const WRAPPED_LITERALS: [(&str, &str); 4] = [("\"{", "{"), ("}\"", "}"), ("\"[", "["), ("]\"", "]")];

/// Bytes of context kept on each side of a parse failure.
const FRAGMENT_RADIUS: usize = 40;

/// Repair a raw agreement payload and parse it.
pub fn repair(raw: &str) -> Result<ArticulationDocument> {
    let text = repair_text(raw);

    match serde_json::from_str::<Value>(&text) {
        Ok(root) => Ok(ArticulationDocument::new(root)),
        Err(e) => {
            let fragment = fragment_around(&text, e.line(), e.column());
            debug!(error = %e, raw_len = raw.len(), "payload still invalid after repair");
            Err(ArticulateError::malformed(e.to_string(), fragment))
        }
    }
}

/// Apply the textual fix-up without parsing.
pub fn repair_text(raw: &str) -> String {
    let unquoted = strip_outer_quotes(raw);
    let mut text = unquoted.replace("\\\"", "\"");

    for (wrapped, literal) in WRAPPED_LITERALS {
        text = text.replace(wrapped, literal);
    }

    text
}

fn strip_outer_quotes(raw: &str) -> &str {
    let text = raw.strip_prefix('"').unwrap_or(raw);
    text.strip_suffix('"').unwrap_or(text)
}

/// Cut a short window of `text` around a 1-based line/column position.
fn fragment_around(text: &str, line: usize, column: usize) -> String {
    let line_start: usize = text
        .split('\n')
        .take(line.saturating_sub(1))
        .map(|l| l.len() + 1)
        .sum();
    let offset = floor_char_boundary(text, line_start + column.saturating_sub(1));
    let start = floor_char_boundary(text, offset.saturating_sub(FRAGMENT_RADIUS));
    let end = ceil_char_boundary(text, offset + FRAGMENT_RADIUS);

    text[start..end].to_string()
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut i = index.min(text.len());
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(text: &str, index: usize) -> usize {
    let mut i = index.min(text.len());
    while !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Encode a document the way the agreements endpoint does: every object or
    /// array directly under `result` becomes a JSON string.
    pub(super) fn double_encode(doc: &Value) -> String {
        let mut encoded = doc.clone();
        if let Some(result) = encoded.get_mut("result").and_then(Value::as_object_mut) {
            for value in result.values_mut() {
                if value.is_object() || value.is_array() {
                    *value = Value::String(value.to_string());
                }
            }
        }
        encoded.to_string()
    }

    fn sample_document() -> Value {
        json!({
            "result": {
                "name": "MATH",
                "receivingInstitution": {"id": 132, "names": [{"name": "UC Santa Cruz"}]},
                "articulations": [
                    {
                        "type": "Course",
                        "course": {"prefix": "MATH", "courseNumber": "20A"},
                        "sendingArticulation": {
                            "items": [{"items": [{
                                "type": "Course",
                                "prefix": "MATH",
                                "courseNumber": "1A",
                                "courseTitle": "Calculus I"
                            }]}]
                        }
                    },
                    {"type": "NoArticulation", "reason": null}
                ]
            },
            "validationFailure": null,
            "isSuccessful": true
        })
    }

    #[test]
    fn strips_outer_quotes_and_unescapes() {
        let doc = repair(r#""{\"a\":1,\"b\":\"x\"}""#).expect("repair");
        assert_eq!(doc.as_value(), &json!({"a": 1, "b": "x"}));
    }

    #[test]
    fn strips_at_most_one_quote_per_side() {
        assert_eq!(strip_outer_quotes("\"\"x\"\""), "\"x\"");
        assert_eq!(strip_outer_quotes("x"), "x");
        assert_eq!(strip_outer_quotes("\""), "");
    }

    #[test]
    fn unwraps_quoted_nested_literals() {
        let raw = r#"{"result":{"articulations":"[{\"type\":\"Course\"}]","meta":"{\"k\":1}"}}"#;
        let text = repair_text(raw);
        assert_eq!(
            text,
            r#"{"result":{"articulations":[{"type":"Course"}],"meta":{"k":1}}}"#
        );
    }

    #[test]
    fn valid_document_is_unchanged() {
        let raw = r#"{"a":[1,2],"b":{"c":"d"},"e":null}"#;
        let expected: Value = serde_json::from_str(raw).expect("valid json");
        let doc = repair(raw).expect("repair");
        assert_eq!(doc.as_value(), &expected);
        assert_eq!(repair_text(raw), raw);
    }

    #[test]
    fn double_encoded_roundtrip() {
        let original = sample_document();
        let encoded = double_encode(&original);
        assert!(encoded.contains(r#""articulations":"[{\""#));

        let doc = repair(&encoded).expect("repair");
        assert_eq!(doc.as_value(), &original);
    }

    #[test]
    fn quote_wrapped_roundtrip() {
        let original = sample_document();
        let wrapped = format!("\"{}\"", double_encode(&original));

        let doc = repair(&wrapped).expect("repair");
        assert_eq!(doc.into_value(), original);
    }

    #[test]
    fn fixture_payload_repairs() {
        let raw = std::fs::read_to_string("../../../fixtures/assist/agreement-math.json")
            .expect("read agreement fixture");
        let doc = repair(&raw).expect("repair fixture");
        let articulations = doc.articulations().expect("articulation list");
        assert_eq!(articulations.len(), 7);
        assert_eq!(doc.as_value()["result"]["receivingInstitution"]["id"], 132);
        assert!(doc.as_value()["result"]["templateAssets"].is_array());
    }

    #[test]
    fn unrepairable_payload_is_malformed() {
        let err = repair(r#"{"result": {"articulations": [1, 2}}"#).unwrap_err();
        match err {
            ArticulateError::MalformedResponse { fragment, .. } => {
                assert!(fragment.contains("[1, 2}"));
            }
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }

    #[test]
    fn escaped_quotes_in_values_are_not_preserved() {
        // Valid JSON, but the unescape pass cannot tell a quote inside a
        // title from one inside an embedded document.
        let raw = r#"{"result":{"articulations":[{"courseTitle":"Calculus \"Honors\" I"}]}}"#;
        assert!(serde_json::from_str::<Value>(raw).is_ok());

        let err = repair(raw).unwrap_err();
        match err {
            ArticulateError::MalformedResponse { fragment, .. } => {
                assert!(fragment.contains("Honors"));
            }
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }

    #[test]
    fn does_not_guess_other_malformations() {
        let err = repair("{'result': {'articulations': []}}").unwrap_err();
        assert!(matches!(err, ArticulateError::MalformedResponse { .. }));

        let err = repair("").unwrap_err();
        assert!(matches!(err, ArticulateError::MalformedResponse { .. }));
    }

    #[test]
    fn fragment_respects_char_boundaries() {
        let text = format!("{}{}", "é".repeat(60), "!");
        let fragment = fragment_around(&text, 1, 61);
        assert!(!fragment.is_empty());
        assert!(fragment.chars().all(|c| c == 'é' || c == '!'));
    }

    #[test]
    fn fragment_on_later_line() {
        let text = "line one\nline two has the problem here\nline three";
        let fragment = fragment_around(text, 2, 18);
        assert!(fragment.contains("problem"));
    }
}
