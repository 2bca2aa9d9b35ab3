//! Content-model dispatch for incoming revisions

use std::collections::HashMap;

use tracing::{error, info};

use super::{EntityDocumentSink, IngestStats, Revision};
use crate::datamodel::deserializer::{DeserializationError, JsonDeserializer};
use crate::datamodel::{MODEL_ITEM, MODEL_LEXEME, MODEL_MEDIA_INFO, MODEL_PROPERTY};

/// Routes revisions to an [`EntityDocumentSink`] based on their content
/// model.
///
/// Revisions whose content model is not an entity model are counted and
/// dropped. A revision that fails to deserialize is logged and counted
/// as skipped; [`RevisionProcessor::process`] itself never fails, so one
/// broken revision cannot abort a run.
pub struct RevisionProcessor<'a, S: EntityDocumentSink> {
    sink: &'a mut S,
    deserializer: JsonDeserializer,
    stats: IngestStats,
    site_name: String,
    namespaces: HashMap<i32, String>,
}

impl<'a, S: EntityDocumentSink> RevisionProcessor<'a, S> {
    /// Creates a processor forwarding into `sink`, attaching `site_iri`
    /// to the entity ids of everything it produces.
    pub fn new(sink: &'a mut S, site_iri: impl Into<String>) -> Self {
        Self {
            sink,
            deserializer: JsonDeserializer::new(site_iri),
            stats: IngestStats::default(),
            site_name: String::new(),
            namespaces: HashMap::new(),
        }
    }

    /// Records the site metadata announced at the head of a dump.
    pub fn start_processing(&mut self, site_name: &str, namespaces: &HashMap<i32, String>) {
        self.site_name = site_name.to_string();
        self.namespaces = namespaces.clone();
        info!(
            "processing revisions of {} ({} namespaces)",
            self.site_name,
            self.namespaces.len()
        );
    }

    /// Handles one revision. Never fails; deserialization problems are
    /// logged and counted instead.
    pub fn process(&mut self, revision: &Revision) {
        self.stats.revisions_seen += 1;

        let result = match revision.content_model.as_str() {
            MODEL_ITEM => {
                if is_redirect(&revision.raw_text) {
                    self.forward_redirect(revision)
                } else {
                    self.forward_item(revision)
                }
            }
            MODEL_PROPERTY => {
                if is_redirect(&revision.raw_text) {
                    self.forward_redirect(revision)
                } else {
                    self.forward_property(revision)
                }
            }
            MODEL_LEXEME => {
                if is_redirect(&revision.raw_text) {
                    self.forward_redirect(revision)
                } else {
                    self.forward_lexeme(revision)
                }
            }
            MODEL_MEDIA_INFO => self.forward_media_info(revision),
            _ => {
                self.stats.revisions_ignored += 1;
                return;
            }
        };

        if let Err(e) = result {
            self.stats.revisions_skipped += 1;
            error!(
                "skipping {} revision of page '{}': {e}",
                revision.content_model, revision.page_title
            );
        }
    }

    /// Logs a summary of the finished run.
    pub fn finish_processing(&self) {
        info!(
            "finished processing {}: {} revisions, {} documents and {} redirects forwarded, {} skipped, {} ignored",
            self.site_name,
            self.stats.revisions_seen,
            self.stats.documents_forwarded,
            self.stats.redirects_forwarded,
            self.stats.revisions_skipped,
            self.stats.revisions_ignored
        );
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    fn forward_item(&mut self, revision: &Revision) -> Result<(), DeserializationError> {
        let doc = self
            .deserializer
            .deserialize_item_document(&revision.raw_text)?;
        self.stats.documents_forwarded += 1;
        self.sink.process_item_document(doc);
        Ok(())
    }

    fn forward_property(&mut self, revision: &Revision) -> Result<(), DeserializationError> {
        let doc = self
            .deserializer
            .deserialize_property_document(&revision.raw_text)?;
        self.stats.documents_forwarded += 1;
        self.sink.process_property_document(doc);
        Ok(())
    }

    fn forward_lexeme(&mut self, revision: &Revision) -> Result<(), DeserializationError> {
        let doc = self
            .deserializer
            .deserialize_lexeme_document(&revision.raw_text)?;
        self.stats.documents_forwarded += 1;
        self.sink.process_lexeme_document(doc);
        Ok(())
    }

    fn forward_media_info(&mut self, revision: &Revision) -> Result<(), DeserializationError> {
        let doc = self
            .deserializer
            .deserialize_media_info_document(&revision.raw_text)?;
        self.stats.documents_forwarded += 1;
        self.sink.process_media_info_document(doc);
        Ok(())
    }

    fn forward_redirect(&mut self, revision: &Revision) -> Result<(), DeserializationError> {
        let doc = self
            .deserializer
            .deserialize_entity_redirect_document(&revision.raw_text)?;
        self.stats.redirects_forwarded += 1;
        self.sink.process_entity_redirect_document(doc);
        Ok(())
    }
}

/// Cheap pre-parse test for redirect payloads. Redirect pages are tiny,
/// so a substring check on the raw text is enough to route them before
/// the entity schema is ever tried.
fn is_redirect(raw_text: &str) -> bool {
    raw_text.contains("\"redirect\":")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamodel::{
        EntityRedirectDocument, ItemDocument, LexemeDocument, PropertyDocument,
    };

    const SITE_IRI: &str = "http://www.wikidata.org/entity/";

    #[derive(Default)]
    struct RecordingSink {
        items: Vec<ItemDocument>,
        properties: Vec<PropertyDocument>,
        lexemes: Vec<LexemeDocument>,
        redirects: Vec<EntityRedirectDocument>,
    }

    impl EntityDocumentSink for RecordingSink {
        fn process_item_document(&mut self, document: ItemDocument) {
            self.items.push(document);
        }

        fn process_property_document(&mut self, document: PropertyDocument) {
            self.properties.push(document);
        }

        fn process_lexeme_document(&mut self, document: LexemeDocument) {
            self.lexemes.push(document);
        }

        fn process_entity_redirect_document(&mut self, document: EntityRedirectDocument) {
            self.redirects.push(document);
        }
    }

    #[test]
    fn items_reach_the_item_handler() {
        let mut sink = RecordingSink::default();
        let mut processor = RevisionProcessor::new(&mut sink, SITE_IRI);

        processor.process(&Revision::new(
            "Q42",
            0,
            MODEL_ITEM,
            r#"{"type":"item","id":"Q42","labels":{"en":{"language":"en","value":"Douglas Adams"}}}"#,
        ));

        assert_eq!(sink.items.len(), 1);
        assert_eq!(sink.items[0].id.id(), "Q42");
        assert_eq!(sink.items[0].id.site_iri(), SITE_IRI);
    }

    #[test]
    fn properties_reach_the_property_handler() {
        let mut sink = RecordingSink::default();
        let mut processor = RevisionProcessor::new(&mut sink, SITE_IRI);

        processor.process(&Revision::new(
            "Property:P31",
            120,
            MODEL_PROPERTY,
            r#"{"type":"property","id":"P31","datatype":"wikibase-item"}"#,
        ));

        assert_eq!(sink.properties.len(), 1);
        assert_eq!(sink.properties[0].datatype, "wikibase-item");
    }

    #[test]
    fn lexemes_reach_the_lexeme_handler() {
        let mut sink = RecordingSink::default();
        let mut processor = RevisionProcessor::new(&mut sink, SITE_IRI);

        processor.process(&Revision::new(
            "Lexeme:L99",
            146,
            MODEL_LEXEME,
            r#"{"type":"lexeme","id":"L99","lemmas":{"en":{"language":"en","value":"run"}}}"#,
        ));

        assert_eq!(sink.lexemes.len(), 1);
        assert_eq!(sink.lexemes[0].id.id(), "L99");
    }

    #[test]
    fn redirect_text_routes_to_the_redirect_handler() {
        let mut sink = RecordingSink::default();
        let mut processor = RevisionProcessor::new(&mut sink, SITE_IRI);

        // content model says item, body says redirect
        processor.process(&Revision::new(
            "Q3",
            0,
            MODEL_ITEM,
            r#"{"entity":"Q3","redirect":"Q4"}"#,
        ));

        assert_eq!(processor.stats().redirects_forwarded, 1);
        assert_eq!(processor.stats().documents_forwarded, 0);
        assert!(sink.items.is_empty());
        assert_eq!(sink.redirects.len(), 1);
        assert_eq!(sink.redirects[0].target.id(), "Q4");
    }

    #[test]
    fn malformed_text_is_counted_and_does_not_reach_the_sink() {
        let mut sink = RecordingSink::default();
        let mut processor = RevisionProcessor::new(&mut sink, SITE_IRI);

        processor.process(&Revision::new("Q1", 0, MODEL_ITEM, "{this is not json"));

        assert_eq!(processor.stats().revisions_seen, 1);
        assert_eq!(processor.stats().revisions_skipped, 1);
        assert!(sink.items.is_empty());
    }

    #[test]
    fn unhandled_content_models_are_ignored() {
        let mut sink = RecordingSink::default();
        let mut processor = RevisionProcessor::new(&mut sink, SITE_IRI);

        processor.process(&Revision::new(
            "Talk:Q42",
            1,
            "wikitext",
            "== Discussion ==",
        ));

        assert_eq!(processor.stats().revisions_ignored, 1);
        assert_eq!(processor.stats().revisions_skipped, 0);
        assert!(sink.items.is_empty());
    }

    #[test]
    fn a_run_accumulates_stats_across_revisions() {
        let mut sink = RecordingSink::default();
        let mut processor = RevisionProcessor::new(&mut sink, SITE_IRI);
        let mut namespaces = HashMap::new();
        namespaces.insert(0, String::new());
        namespaces.insert(120, "Property".to_string());
        processor.start_processing("wikidatawiki", &namespaces);

        processor.process(&Revision::new(
            "Q1",
            0,
            MODEL_ITEM,
            r#"{"type":"item","id":"Q1"}"#,
        ));
        processor.process(&Revision::new(
            "Q2",
            0,
            MODEL_ITEM,
            r#"{"entity":"Q2","redirect":"Q1"}"#,
        ));
        processor.process(&Revision::new("Q3", 0, MODEL_ITEM, "broken"));
        processor.process(&Revision::new("Main Page", 0, "wikitext", "hello"));
        processor.finish_processing();

        let stats = processor.stats();
        assert_eq!(stats.revisions_seen, 4);
        assert_eq!(stats.documents_forwarded, 1);
        assert_eq!(stats.redirects_forwarded, 1);
        assert_eq!(stats.revisions_skipped, 1);
        assert_eq!(stats.revisions_ignored, 1);
    }
}
