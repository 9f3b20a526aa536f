//! Turning a model reply into a [`StructuredRecord`].

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::models::StructuredRecord;

lazy_static! {
    /// A reply wrapped in one fenced block. A language tag only counts as one
    /// when a line break follows it.
    static ref CODE_FENCE: Regex = Regex::new(
        r"(?s)\A\s*```(?:[A-Za-z0-9_+-]+[ \t]*\r?\n|[ \t]*\r?\n)?(.*?)\r?\n?\s*```\s*\z"
    )
    .unwrap();
}

/// Remove a surrounding fenced code block and its language tag, then trim.
///
/// Text that is not fully enclosed in a fence is only trimmed.
pub fn strip_code_fence(reply: &str) -> &str {
    match CODE_FENCE.captures(reply).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => reply.trim(),
    }
}

/// Parse a model reply into a record.
///
/// A JSON object is accepted as-is; anything else becomes
/// `{raw_output: <stripped text>}`.
pub fn normalize(reply: &str) -> StructuredRecord {
    let stripped = strip_code_fence(reply);

    match serde_json::from_str::<Value>(stripped) {
        Ok(Value::Object(fields)) => StructuredRecord::Fields(fields),
        _ => StructuredRecord::Fallback {
            raw_output: stripped.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const BARE: &str = r#"{"product_name": "Amul Taaza", "batch_number": "A23M08", "expiry_date": null}"#;

    #[test]
    fn test_fenced_with_tag_equals_bare() {
        let fenced = format!("```json\n{}\n```", BARE);
        assert_eq!(normalize(&fenced), normalize(BARE));
        assert!(normalize(&fenced).fields().is_some());
    }

    #[test]
    fn test_fence_variants() {
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  ```JSON\r\n{\"a\": 1}\r\n```  \n"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```{}```"), "{}");
        assert_eq!(strip_code_fence("  plain  "), "plain");
    }

    #[test]
    fn test_inner_backticks_survive() {
        assert_eq!(
            strip_code_fence("```json\n{\"note\": \"use `x`\"}\n```"),
            "{\"note\": \"use `x`\"}"
        );
    }

    #[test]
    fn test_non_json_falls_back() {
        let record = normalize("```\nSorry, I cannot read this label.\n```");
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"raw_output": "Sorry, I cannot read this label."})
        );
    }

    #[test]
    fn test_single_line_fence_keeps_content() {
        assert_eq!(strip_code_fence("```NoData```"), "NoData");
        assert_eq!(
            normalize("```NoData```"),
            StructuredRecord::Fallback {
                raw_output: "NoData".to_string()
            }
        );
        assert_eq!(strip_code_fence("```json\nNoData```"), "NoData");
    }

    #[test]
    fn test_json_non_object_falls_back() {
        assert_eq!(
            normalize("[1, 2]"),
            StructuredRecord::Fallback {
                raw_output: "[1, 2]".to_string()
            }
        );
    }

    #[test]
    fn test_empty_reply() {
        assert_eq!(
            normalize(""),
            StructuredRecord::Fallback {
                raw_output: String::new()
            }
        );
    }

    #[test]
    fn test_object_accepted_as_is() {
        let record = normalize(r#"{"product_name": "Milk", "extra": 3}"#);
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"product_name": "Milk", "extra": 3})
        );
    }
}
