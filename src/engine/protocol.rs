use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorKind, ProviderError};

/// JSON error body returned by `POST /generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub details: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,

    /// Offending stage or choice for structural failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment: Option<Value>,

    /// Completion text that could not be parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
            kind: None,
            fragment: None,
            raw_content: None,
        }
    }
}

impl From<&ProviderError> for ErrorBody {
    fn from(err: &ProviderError) -> Self {
        let mut body = ErrorBody::new(err.title(), err.details());
        body.kind = Some(err.kind());
        match err {
            ProviderError::InvalidStructure(inner) => body.fragment = inner.fragment().cloned(),
            ProviderError::UnparsableContent { raw, .. } => body.raw_content = Some(raw.clone()),
            _ => {}
        }
        body
    }
}

/// HTTP status used to report `err` to the caller. Always non-2xx.
pub fn status_for(err: &ProviderError) -> u16 {
    match err {
        ProviderError::Http { status, .. } if (400..600).contains(status) => *status,
        ProviderError::NoEndpoint { .. } => 503,
        ProviderError::Http { .. }
        | ProviderError::Transport(_)
        | ProviderError::UnexpectedResponse(_) => 502,
        ProviderError::UnparsableContent { .. } | ProviderError::InvalidStructure(_) => 500,
    }
}
