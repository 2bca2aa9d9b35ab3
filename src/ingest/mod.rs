//! Revision ingestion
//!
//! Feeds page revisions from a dump or a live stream through a
//! content-model dispatcher into an [`EntityDocumentSink`]. A broken
//! revision never aborts the run; it is counted and logged, and
//! processing continues with the next one.

use serde::{Deserialize, Serialize};

use crate::datamodel::{
    EntityRedirectDocument, ItemDocument, LexemeDocument, MediaInfoDocument, PropertyDocument,
};

pub mod processor;

/// One page revision as it arrives from a dump or the recent-changes
/// feed. The `raw_text` is the revision body, which for entity pages is
/// the JSON serialization of the entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Revision {
    pub page_title: String,
    pub namespace: i32,
    pub content_model: String,
    pub raw_text: String,
}

impl Revision {
    pub fn new(
        page_title: impl Into<String>,
        namespace: i32,
        content_model: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            page_title: page_title.into(),
            namespace,
            content_model: content_model.into(),
            raw_text: raw_text.into(),
        }
    }
}

/// Receiver for the documents produced by a
/// [`processor::RevisionProcessor`].
///
/// Every method has an empty default body, so an implementation only
/// overrides the variants it cares about. Handlers take ownership of
/// the document and must not fail; a sink that needs to report problems
/// records them internally.
pub trait EntityDocumentSink {
    fn process_item_document(&mut self, document: ItemDocument) {
        let _ = document;
    }

    fn process_property_document(&mut self, document: PropertyDocument) {
        let _ = document;
    }

    fn process_lexeme_document(&mut self, document: LexemeDocument) {
        let _ = document;
    }

    fn process_media_info_document(&mut self, document: MediaInfoDocument) {
        let _ = document;
    }

    fn process_entity_redirect_document(&mut self, document: EntityRedirectDocument) {
        let _ = document;
    }
}

/// Counters accumulated over one processing run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    /// Revisions handed to the processor.
    pub revisions_seen: u64,
    /// Entity documents forwarded to the sink.
    pub documents_forwarded: u64,
    /// Redirect documents forwarded to the sink.
    pub redirects_forwarded: u64,
    /// Revisions with a recognized content model that failed to
    /// deserialize.
    pub revisions_skipped: u64,
    /// Revisions whose content model is not handled.
    pub revisions_ignored: u64,
}
