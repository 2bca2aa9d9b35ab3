//! Wikibase API client and dump-revision ingestion
//!
//! Keeps a local typed model of Wikibase entities (items, properties,
//! lexemes, media info records, redirects) synchronized with a remote
//! MediaWiki API over blocking HTTP+JSON, and ingests the same entity
//! shapes from a bulk revision stream (e.g. an offline dump) instead of
//! the live API.
//!
//! The two halves are independent but share the data model:
//! - [`api`]: session state, token lifecycle, request construction
//!   (including multipart upload), response envelope parsing and a typed
//!   error taxonomy for the API's JSON error format.
//! - [`ingest`]: a per-revision pipeline that classifies raw
//!   content-model-tagged text, detects redirects, deserializes into
//!   typed entity documents and forwards them to a sink, isolating
//!   failures so one malformed revision never aborts the stream.

pub mod api;
pub mod datamodel;
pub mod ingest;

pub use api::connection::{ApiConnection, Credentials, HttpMethod};
pub use api::editor::EntityEditor;
pub use api::errors::{ConnectionError, MediaWikiError};
pub use datamodel::deserializer::{DeserializationError, JsonDeserializer};
pub use datamodel::EntityDocument;
pub use ingest::processor::RevisionProcessor;
pub use ingest::{EntityDocumentSink, Revision};
