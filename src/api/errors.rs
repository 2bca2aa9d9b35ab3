//! Error taxonomy for the MediaWiki API
//!
//! The API reports failures as a JSON `error` node with a string `code`,
//! a human-readable `info` and optionally structured detail `messages`.
//! [`classify_error`] maps that node onto the closed [`MediaWikiError`]
//! set. [`ConnectionError`] is the transport-level taxonomy wrapping
//! everything a request can fail with.

use crate::datamodel::deserializer::DeserializationError;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Error code for the server-side replication lag condition.
pub const ERROR_MAXLAG: &str = "maxlag";
/// Error code returned when `assert=user` fails on a dropped session.
pub const ERROR_ASSERT_USER_FAILED: &str = "assertuserfailed";
/// Error code for conflicting concurrent edits.
pub const ERROR_EDIT_CONFLICT: &str = "editconflict";
/// Error code for an invalid or stale token.
pub const ERROR_BAD_TOKEN: &str = "badtoken";
/// Error code for requests naming an entity that does not exist.
pub const ERROR_NO_SUCH_ENTITY: &str = "no-such-entity";

/// One structured sub-message attached to an API error.
///
/// The server sends these in a `messages` array; their order is
/// meaningful and is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiErrorMessage {
    /// Message key, e.g. `"wikibase-api-failed-save"`.
    pub name: String,
    #[serde(default)]
    html: Option<HtmlText>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct HtmlText {
    #[serde(rename = "*")]
    text: String,
}

impl ApiErrorMessage {
    /// Human-readable rendering of the message, when the server sent one.
    pub fn text(&self) -> Option<&str> {
        self.html.as_ref().map(|h| h.text.as_str())
    }
}

/// An error reported by the API in its response envelope.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MediaWikiError {
    /// The server asks the client to back off until replication catches up.
    #[error("maxlag: {info} (lag: {lag_seconds}s)")]
    MaxLag { info: String, lag_seconds: f64 },

    /// The `assert=user` check failed: the session was dropped server-side.
    #[error("assertion that the user is logged in failed: {info}")]
    AssertUserFailed { info: String },

    /// A concurrent edit won; the caller decides whether to merge and retry.
    #[error("edit conflict: {info}")]
    EditConflict {
        info: String,
        details: Vec<ApiErrorMessage>,
    },

    /// The supplied token was invalid or stale.
    #[error("invalid or stale token: {info}")]
    BadToken { info: String },

    /// The request named an entity that does not exist.
    #[error("no such entity: {info}")]
    NoSuchEntity {
        info: String,
        details: Vec<ApiErrorMessage>,
    },

    /// Any error code outside the fixed table.
    #[error("{code}: {info}")]
    Generic {
        code: String,
        info: String,
        details: Vec<ApiErrorMessage>,
    },
}

impl MediaWikiError {
    /// The error code as reported by the server.
    pub fn code(&self) -> &str {
        match self {
            MediaWikiError::MaxLag { .. } => ERROR_MAXLAG,
            MediaWikiError::AssertUserFailed { .. } => ERROR_ASSERT_USER_FAILED,
            MediaWikiError::EditConflict { .. } => ERROR_EDIT_CONFLICT,
            MediaWikiError::BadToken { .. } => ERROR_BAD_TOKEN,
            MediaWikiError::NoSuchEntity { .. } => ERROR_NO_SUCH_ENTITY,
            MediaWikiError::Generic { code, .. } => code,
        }
    }

    /// The human-readable description as reported by the server.
    pub fn info(&self) -> &str {
        match self {
            MediaWikiError::MaxLag { info, .. }
            | MediaWikiError::AssertUserFailed { info }
            | MediaWikiError::EditConflict { info, .. }
            | MediaWikiError::BadToken { info }
            | MediaWikiError::NoSuchEntity { info, .. }
            | MediaWikiError::Generic { info, .. } => info,
        }
    }

    /// Structured detail messages, in server order.
    pub fn details(&self) -> &[ApiErrorMessage] {
        match self {
            MediaWikiError::EditConflict { details, .. }
            | MediaWikiError::NoSuchEntity { details, .. }
            | MediaWikiError::Generic { details, .. } => details,
            _ => &[],
        }
    }
}

/// Maps a raw `error` node from an API response onto a typed error.
///
/// The maxlag special case takes precedence over the code table: whenever
/// `code == "maxlag"` and a numeric `lag` field is present, the result is
/// [`MediaWikiError::MaxLag`] carrying that lag value.
pub fn classify_error(error_node: &Value) -> MediaWikiError {
    let code = error_node
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or("UNKNOWN")
        .to_string();
    let info = error_node
        .get("info")
        .and_then(Value::as_str)
        .unwrap_or("No details provided")
        .to_string();

    // A malformed messages array is not itself an error.
    let details = match error_node.get("messages") {
        Some(messages) => match serde_json::from_value::<Vec<ApiErrorMessage>>(messages.clone()) {
            Ok(details) => details,
            Err(e) => {
                warn!("could not parse 'messages' field of API error response: {e}");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    if code == ERROR_MAXLAG {
        if let Some(lag_seconds) = error_node.get("lag").and_then(Value::as_f64) {
            return MediaWikiError::MaxLag { info, lag_seconds };
        }
    }

    match code.as_str() {
        ERROR_ASSERT_USER_FAILED => MediaWikiError::AssertUserFailed { info },
        ERROR_EDIT_CONFLICT => MediaWikiError::EditConflict { info, details },
        ERROR_BAD_TOKEN => MediaWikiError::BadToken { info },
        ERROR_NO_SUCH_ENTITY => MediaWikiError::NoSuchEntity { info, details },
        _ => MediaWikiError::Generic {
            code,
            info,
            details,
        },
    }
}

/// Everything a request on an [`crate::api::ApiConnection`] can fail with.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The configured API base URL could not be parsed.
    #[error("invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// Connection-level failure before a response was received.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("unexpected HTTP status {status}")]
    Status {
        status: u16,
        headers: Vec<(String, String)>,
    },

    /// The response body was not valid JSON; the raw body is kept for
    /// diagnostics.
    #[error("malformed JSON response: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
        body: String,
    },

    /// The response parsed but did not have the expected shape.
    #[error("unexpected response shape: {0}")]
    UnexpectedResponse(String),

    /// An error reported by the API in the response envelope.
    #[error(transparent)]
    Api(#[from] MediaWikiError),

    /// The login credentials were rejected.
    #[error("login rejected: {0}")]
    Auth(String),

    /// A write was attempted without being logged in. Checked before any
    /// network call.
    #[error("not logged in")]
    NotLoggedIn,

    /// A returned entity payload could not be deserialized.
    #[error(transparent)]
    Deserialization(#[from] DeserializationError),

    /// A document could not be serialized for the wire.
    #[error("failed to serialize document: {0}")]
    Serialize(serde_json::Error),

    /// The document is not valid input for the requested operation.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// An attached file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maxlag_with_lag_wins_over_the_table() {
        let node = json!({
            "code": "maxlag",
            "info": "Waiting for lag",
            "lag": 5.2,
            "host": "db2042",
        });
        let err = classify_error(&node);
        assert_eq!(
            err,
            MediaWikiError::MaxLag {
                info: "Waiting for lag".to_string(),
                lag_seconds: 5.2,
            }
        );
    }

    #[test]
    fn maxlag_without_lag_falls_through_to_generic() {
        let node = json!({"code": "maxlag", "info": "Waiting for lag"});
        let err = classify_error(&node);
        assert_eq!(err.code(), "maxlag");
        assert!(matches!(err, MediaWikiError::Generic { .. }));
    }

    #[test]
    fn unknown_code_is_generic_and_unchanged() {
        let node = json!({"code": "some-novel-error", "info": "something odd"});
        let err = classify_error(&node);
        assert_eq!(err.code(), "some-novel-error");
        assert_eq!(err.info(), "something odd");
        assert!(matches!(err, MediaWikiError::Generic { .. }));
    }

    #[test]
    fn missing_code_and_info_use_documented_defaults() {
        let err = classify_error(&json!({}));
        assert_eq!(err.code(), "UNKNOWN");
        assert_eq!(err.info(), "No details provided");
    }

    #[test]
    fn assertuserfailed_maps_to_its_own_kind() {
        let node = json!({"code": "assertuserfailed", "info": "session gone"});
        assert!(matches!(
            classify_error(&node),
            MediaWikiError::AssertUserFailed { .. }
        ));
    }

    #[test]
    fn badtoken_maps_to_its_own_kind() {
        let node = json!({"code": "badtoken", "info": "Invalid CSRF token."});
        assert!(matches!(
            classify_error(&node),
            MediaWikiError::BadToken { .. }
        ));
    }

    #[test]
    fn editconflict_keeps_detail_messages_in_order() {
        let node = json!({
            "code": "editconflict",
            "info": "Edit conflict.",
            "messages": [
                {"name": "edit-conflict", "html": {"*": "Edit conflict."}},
                {"name": "second-message"},
            ],
        });
        let err = classify_error(&node);
        let details = err.details();
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].name, "edit-conflict");
        assert_eq!(details[0].text(), Some("Edit conflict."));
        assert_eq!(details[1].name, "second-message");
        assert_eq!(details[1].text(), None);
    }

    #[test]
    fn malformed_messages_array_is_non_fatal() {
        let node = json!({
            "code": "editconflict",
            "info": "Edit conflict.",
            "messages": "not an array",
        });
        let err = classify_error(&node);
        assert!(matches!(err, MediaWikiError::EditConflict { .. }));
        assert!(err.details().is_empty());
    }
}
