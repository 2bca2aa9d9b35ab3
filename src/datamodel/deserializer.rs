//! JSON deserialization of entity documents
//!
//! One reader per document variant, plus a generic reader for payloads
//! whose variant is not known ahead of time. The site IRI is fixed at
//! construction and attached to every entity id, since it is never part
//! of the raw text itself.

use super::{
    EntityDocument, EntityRedirectDocument, ItemDocument, LexemeDocument, MediaInfoDocument,
    PropertyDocument,
};
use serde_json::Value;
use thiserror::Error;

/// Why a document could not be deserialized.
#[derive(Debug, Error)]
pub enum DeserializationError {
    /// The text was not well-formed JSON.
    #[error("malformed JSON: {0}")]
    Parse(serde_json::Error),

    /// The JSON was well-formed but did not match the entity schema.
    #[error("JSON does not match the entity schema: {0}")]
    Mapping(serde_json::Error),

    /// The source text could not be read.
    #[error("failed to read document source: {0}")]
    Io(std::io::Error),
}

impl From<serde_json::Error> for DeserializationError {
    fn from(e: serde_json::Error) -> Self {
        use serde_json::error::Category;
        match e.classify() {
            Category::Io => DeserializationError::Io(e.into()),
            Category::Syntax | Category::Eof => DeserializationError::Parse(e),
            Category::Data => DeserializationError::Mapping(e),
        }
    }
}

/// Deserializer for entity documents of one site.
#[derive(Debug, Clone)]
pub struct JsonDeserializer {
    site_iri: String,
}

impl JsonDeserializer {
    /// Creates a deserializer for the site with the given root IRI, e.g.
    /// `"http://www.wikidata.org/entity/"`.
    pub fn new(site_iri: impl Into<String>) -> Self {
        Self {
            site_iri: site_iri.into(),
        }
    }

    pub fn site_iri(&self) -> &str {
        &self.site_iri
    }

    pub fn deserialize_item_document(
        &self,
        json: &str,
    ) -> Result<ItemDocument, DeserializationError> {
        let mut doc: ItemDocument = serde_json::from_str(json)?;
        doc.id = doc.id.with_site_iri(&self.site_iri);
        Ok(doc)
    }

    pub fn deserialize_property_document(
        &self,
        json: &str,
    ) -> Result<PropertyDocument, DeserializationError> {
        let mut doc: PropertyDocument = serde_json::from_str(json)?;
        doc.id = doc.id.with_site_iri(&self.site_iri);
        Ok(doc)
    }

    pub fn deserialize_lexeme_document(
        &self,
        json: &str,
    ) -> Result<LexemeDocument, DeserializationError> {
        let mut doc: LexemeDocument = serde_json::from_str(json)?;
        doc.id = doc.id.with_site_iri(&self.site_iri);
        Ok(doc)
    }

    pub fn deserialize_media_info_document(
        &self,
        json: &str,
    ) -> Result<MediaInfoDocument, DeserializationError> {
        let mut doc: MediaInfoDocument = serde_json::from_str(json)?;
        doc.id = doc.id.with_site_iri(&self.site_iri);
        Ok(doc)
    }

    pub fn deserialize_entity_redirect_document(
        &self,
        json: &str,
    ) -> Result<EntityRedirectDocument, DeserializationError> {
        let mut doc: EntityRedirectDocument = serde_json::from_str(json)?;
        doc.source = doc.source.with_site_iri(&self.site_iri);
        doc.target = doc.target.with_site_iri(&self.site_iri);
        Ok(doc)
    }

    /// Deserializes a payload whose variant is not known ahead of time,
    /// dispatching on the `redirect` key and the `type` field.
    pub fn deserialize_entity_document(
        &self,
        json: &str,
    ) -> Result<EntityDocument, DeserializationError> {
        let value: Value = serde_json::from_str(json)?;
        self.entity_document_from_value(value)
    }

    fn entity_document_from_value(
        &self,
        value: Value,
    ) -> Result<EntityDocument, DeserializationError> {
        if value.get("redirect").is_some() {
            let mut doc: EntityRedirectDocument = serde_json::from_value(value)?;
            doc.source = doc.source.with_site_iri(&self.site_iri);
            doc.target = doc.target.with_site_iri(&self.site_iri);
            return Ok(EntityDocument::Redirect(doc));
        }

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        match kind.as_str() {
            "item" => {
                let mut doc: ItemDocument = serde_json::from_value(value)?;
                doc.id = doc.id.with_site_iri(&self.site_iri);
                Ok(EntityDocument::Item(doc))
            }
            "property" => {
                let mut doc: PropertyDocument = serde_json::from_value(value)?;
                doc.id = doc.id.with_site_iri(&self.site_iri);
                Ok(EntityDocument::Property(doc))
            }
            "lexeme" => {
                let mut doc: LexemeDocument = serde_json::from_value(value)?;
                doc.id = doc.id.with_site_iri(&self.site_iri);
                Ok(EntityDocument::Lexeme(doc))
            }
            "mediainfo" => {
                let mut doc: MediaInfoDocument = serde_json::from_value(value)?;
                doc.id = doc.id.with_site_iri(&self.site_iri);
                Ok(EntityDocument::MediaInfo(doc))
            }
            other => Err(DeserializationError::Mapping(
                <serde_json::Error as serde::de::Error>::custom(format!(
                    "unknown entity type '{other}'"
                )),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE_IRI: &str = "http://www.wikidata.org/entity/";

    fn deserializer() -> JsonDeserializer {
        JsonDeserializer::new(SITE_IRI)
    }

    #[test]
    fn item_gets_the_site_iri_attached() {
        let doc = deserializer()
            .deserialize_item_document(
                r#"{"type":"item","id":"Q42","labels":{"en":{"language":"en","value":"Douglas Adams"}}}"#,
            )
            .unwrap();
        assert_eq!(doc.id.id(), "Q42");
        assert_eq!(doc.id.site_iri(), SITE_IRI);
        assert_eq!(doc.labels["en"].value, "Douglas Adams");
    }

    #[test]
    fn property_keeps_its_datatype() {
        let doc = deserializer()
            .deserialize_property_document(
                r#"{"type":"property","id":"P31","datatype":"wikibase-item","labels":{}}"#,
            )
            .unwrap();
        assert_eq!(doc.id.id(), "P31");
        assert_eq!(doc.datatype, "wikibase-item");
    }

    #[test]
    fn lexeme_reads_lemmas_and_category() {
        let doc = deserializer()
            .deserialize_lexeme_document(
                r#"{"type":"lexeme","id":"L99","lemmas":{"en":{"language":"en","value":"run"}},"lexicalCategory":"Q24905","language":"Q1860"}"#,
            )
            .unwrap();
        assert_eq!(doc.id.id(), "L99");
        assert_eq!(doc.lemmas["en"].value, "run");
        assert_eq!(doc.lexical_category.as_deref(), Some("Q24905"));
    }

    #[test]
    fn redirect_attaches_site_iri_to_both_ends() {
        let doc = deserializer()
            .deserialize_entity_redirect_document(r#"{"entity":"Q3","redirect":"Q4"}"#)
            .unwrap();
        assert_eq!(doc.source.iri(), format!("{SITE_IRI}Q3"));
        assert_eq!(doc.target.iri(), format!("{SITE_IRI}Q4"));
    }

    #[test]
    fn empty_array_leniency_applies_to_every_variant() {
        let d = deserializer();
        assert!(d
            .deserialize_item_document(r#"{"id":"Q1","labels":[],"claims":[]}"#)
            .is_ok());
        assert!(d
            .deserialize_property_document(r#"{"id":"P1","datatype":"string","labels":[]}"#)
            .is_ok());
        assert!(d
            .deserialize_lexeme_document(r#"{"id":"L1","lemmas":[]}"#)
            .is_ok());
        assert!(d
            .deserialize_media_info_document(r#"{"id":"M1","labels":[],"statements":[]}"#)
            .is_ok());
    }

    #[test]
    fn generic_reader_dispatches_on_the_type_field() {
        let d = deserializer();
        let item = d
            .deserialize_entity_document(r#"{"type":"item","id":"Q5"}"#)
            .unwrap();
        assert!(matches!(item, EntityDocument::Item(_)));
        assert_eq!(item.entity_id().site_iri(), SITE_IRI);

        let property = d
            .deserialize_entity_document(r#"{"type":"property","id":"P5","datatype":"string"}"#)
            .unwrap();
        assert_eq!(property.kind(), "property");
    }

    #[test]
    fn generic_reader_prefers_the_redirect_key() {
        let doc = deserializer()
            .deserialize_entity_document(r#"{"entity":"Q3","redirect":"Q4"}"#)
            .unwrap();
        assert!(matches!(doc, EntityDocument::Redirect(_)));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = deserializer()
            .deserialize_item_document("{not json")
            .unwrap_err();
        assert!(matches!(err, DeserializationError::Parse(_)));
    }

    #[test]
    fn schema_mismatch_is_a_mapping_error() {
        // Well-formed JSON, but labels has the wrong shape.
        let err = deserializer()
            .deserialize_item_document(r#"{"id":"Q1","labels":{"en":"not a term"}}"#)
            .unwrap_err();
        assert!(matches!(err, DeserializationError::Mapping(_)));
    }

    #[test]
    fn unknown_type_is_a_mapping_error() {
        let err = deserializer()
            .deserialize_entity_document(r#"{"type":"form","id":"L1-F1"}"#)
            .unwrap_err();
        assert!(matches!(err, DeserializationError::Mapping(_)));
    }
}
