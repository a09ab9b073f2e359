use serde_json::Value;
use tracing::{debug, warn};

use crate::engine::sanitizer::sanitize;
use crate::error::ProviderError;

/// Decode the raw completion text into untyped JSON.
///
/// The raw text is tried first; only if that fails is it sanitized and parsed
/// one more time.
pub fn decode_story_json(raw: &str) -> Result<Value, ProviderError> {
    let first_err = match serde_json::from_str::<Value>(raw) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    warn!(error = %first_err, "Completion is not valid JSON, retrying after sanitizing");

    let cleaned = sanitize(raw);
    match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => {
            debug!("Sanitized completion parsed");
            Ok(value)
        }
        Err(second_err) => {
            warn!(error = %second_err, "Sanitized completion is still not valid JSON");
            Err(ProviderError::UnparsableContent {
                raw: raw.to_string(),
                detail: first_err.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clean_json_is_parsed_directly() {
        let value = decode_story_json(r#"{"stages":[]}"#).unwrap();
        assert_eq!(value, json!({ "stages": [] }));
    }

    #[test]
    fn valid_json_keeps_inner_whitespace_runs() {
        let value = decode_story_json(r#"{"t":"a  b","u":"tab\tkept"}"#).unwrap();
        assert_eq!(value["t"], "a  b");
        assert_eq!(value["u"], "tab\tkept");
    }

    #[test]
    fn raw_line_breaks_inside_strings_are_repaired() {
        let raw =
            "{\"stages\":[{\"stageNumber\":1,\"text\":\"line one\nline two\",\"choices\":[]}]}";
        assert!(serde_json::from_str::<Value>(raw).is_err());

        let value = decode_story_json(raw).unwrap();
        assert_eq!(value["stages"][0]["text"], "line one line two");
    }

    #[test]
    fn hopeless_text_keeps_raw_and_first_error() {
        let err = decode_story_json("Sure! Here is your story:").unwrap_err();
        match err {
            ProviderError::UnparsableContent { raw, detail } => {
                assert_eq!(raw, "Sure! Here is your story:");
                assert!(!detail.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
