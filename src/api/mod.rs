//! Protocol and session layer for the Wikibase web API
//!
//! [`connection::ApiConnection`] owns one logical session to one API base
//! URL: login state, cached tokens, HTTP client configuration, request
//! construction and response envelope parsing. [`editor::EntityEditor`]
//! composes a connection with token acquisition to perform entity edits.

pub mod connection;
pub mod editor;
pub mod errors;
pub mod tokens;

pub use connection::{ApiConnection, Credentials, FileUpload, HttpMethod};
pub use editor::EntityEditor;
pub use errors::{classify_error, ApiErrorMessage, ConnectionError, MediaWikiError};
pub use tokens::{TokenCache, TOKEN_CSRF, TOKEN_LOGIN};
