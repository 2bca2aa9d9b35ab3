//! Typed Wikibase entity documents
//!
//! One record per knowledge-base subject: items, properties, lexemes,
//! media info records, plus redirect markers. Entity identity is the
//! entity id together with a site IRI; the site IRI never appears in the
//! wire JSON and is attached by the [`deserializer::JsonDeserializer`].
//!
//! Statement groups, sitelinks, forms and senses are carried as raw JSON:
//! the crate moves them around and writes them back but does not model
//! their per-field schema.

pub mod deserializer;

pub use deserializer::{DeserializationError, JsonDeserializer};

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;

/// Content model tag of item revisions.
pub const MODEL_ITEM: &str = "wikibase-item";
/// Content model tag of property revisions.
pub const MODEL_PROPERTY: &str = "wikibase-property";
/// Content model tag of lexeme revisions.
pub const MODEL_LEXEME: &str = "wikibase-lexeme";
/// Content model tag of media info revisions.
pub const MODEL_MEDIA_INFO: &str = "wikibase-mediainfo";

/// An entity id (e.g. `Q42`, `P31`, `L99`) qualified by the IRI of the
/// site it belongs to.
///
/// Only the id appears on the wire; the site IRI is supplied when the
/// document is deserialized. New documents that have not been assigned an
/// id yet use [`EntityIdValue::placeholder`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityIdValue {
    id: String,
    site_iri: String,
}

impl EntityIdValue {
    pub fn new(id: impl Into<String>, site_iri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            site_iri: site_iri.into(),
        }
    }

    /// The id used by documents that do not exist on the server yet.
    pub fn placeholder() -> Self {
        Self {
            id: String::new(),
            site_iri: String::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.id.is_empty()
    }

    /// The bare entity id, e.g. `Q42`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The IRI of the site the entity belongs to.
    pub fn site_iri(&self) -> &str {
        &self.site_iri
    }

    /// The full IRI of the entity: site IRI followed by the id.
    pub fn iri(&self) -> String {
        format!("{}{}", self.site_iri, self.id)
    }

    pub(crate) fn with_site_iri(mut self, site_iri: &str) -> Self {
        self.site_iri = site_iri.to_string();
        self
    }
}

impl Serialize for EntityIdValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.id)
    }
}

impl<'de> Deserialize<'de> for EntityIdValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = String::deserialize(deserializer)?;
        Ok(EntityIdValue {
            id,
            site_iri: String::new(),
        })
    }
}

/// A language-tagged term (label, description, alias, lemma).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermValue {
    pub language: String,
    pub value: String,
}

impl TermValue {
    pub fn new(language: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            value: value.into(),
        }
    }
}

/// Deserializes a JSON object into a map, additionally accepting an empty
/// JSON array as an empty map.
///
/// Old revisions encode empty term and statement maps as `[]`; this
/// leniency is applied uniformly across all document variants.
fn map_or_empty_array<'de, D, V>(deserializer: D) -> Result<HashMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MapOrArray<V> {
        Map(HashMap<String, V>),
        Array(Vec<Value>),
    }

    match MapOrArray::deserialize(deserializer)? {
        MapOrArray::Map(map) => Ok(map),
        MapOrArray::Array(entries) if entries.is_empty() => Ok(HashMap::new()),
        MapOrArray::Array(_) => Err(de::Error::custom(
            "expected a JSON object, found a non-empty array",
        )),
    }
}

/// A document describing one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDocument {
    #[serde(
        default = "EntityIdValue::placeholder",
        skip_serializing_if = "EntityIdValue::is_placeholder"
    )]
    pub id: EntityIdValue,
    #[serde(
        default,
        deserialize_with = "map_or_empty_array",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub labels: HashMap<String, TermValue>,
    #[serde(
        default,
        deserialize_with = "map_or_empty_array",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub descriptions: HashMap<String, TermValue>,
    #[serde(
        default,
        deserialize_with = "map_or_empty_array",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub aliases: HashMap<String, Vec<TermValue>>,
    /// Statement groups keyed by property id, kept as raw JSON.
    #[serde(
        default,
        deserialize_with = "map_or_empty_array",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub claims: HashMap<String, Value>,
    #[serde(
        default,
        deserialize_with = "map_or_empty_array",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub sitelinks: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastrevid: Option<u64>,
}

impl ItemDocument {
    /// Creates an empty item document with the given id. Use
    /// [`EntityIdValue::placeholder`] for a document that is yet to be
    /// created on the server.
    pub fn new(id: EntityIdValue) -> Self {
        Self {
            id,
            labels: HashMap::new(),
            descriptions: HashMap::new(),
            aliases: HashMap::new(),
            claims: HashMap::new(),
            sitelinks: HashMap::new(),
            lastrevid: None,
        }
    }

    pub fn with_label(mut self, language: &str, value: &str) -> Self {
        self.labels
            .insert(language.to_string(), TermValue::new(language, value));
        self
    }

    pub fn with_description(mut self, language: &str, value: &str) -> Self {
        self.descriptions
            .insert(language.to_string(), TermValue::new(language, value));
        self
    }
}

/// A document describing one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDocument {
    #[serde(
        default = "EntityIdValue::placeholder",
        skip_serializing_if = "EntityIdValue::is_placeholder"
    )]
    pub id: EntityIdValue,
    /// The datatype of values of this property, e.g. `"wikibase-item"`.
    pub datatype: String,
    #[serde(
        default,
        deserialize_with = "map_or_empty_array",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub labels: HashMap<String, TermValue>,
    #[serde(
        default,
        deserialize_with = "map_or_empty_array",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub descriptions: HashMap<String, TermValue>,
    #[serde(
        default,
        deserialize_with = "map_or_empty_array",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub aliases: HashMap<String, Vec<TermValue>>,
    #[serde(
        default,
        deserialize_with = "map_or_empty_array",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub claims: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastrevid: Option<u64>,
}

impl PropertyDocument {
    pub fn new(id: EntityIdValue, datatype: impl Into<String>) -> Self {
        Self {
            id,
            datatype: datatype.into(),
            labels: HashMap::new(),
            descriptions: HashMap::new(),
            aliases: HashMap::new(),
            claims: HashMap::new(),
            lastrevid: None,
        }
    }

    pub fn with_label(mut self, language: &str, value: &str) -> Self {
        self.labels
            .insert(language.to_string(), TermValue::new(language, value));
        self
    }
}

/// A document describing one lexeme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexemeDocument {
    #[serde(
        default = "EntityIdValue::placeholder",
        skip_serializing_if = "EntityIdValue::is_placeholder"
    )]
    pub id: EntityIdValue,
    #[serde(
        default,
        deserialize_with = "map_or_empty_array",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub lemmas: HashMap<String, TermValue>,
    #[serde(rename = "lexicalCategory", default, skip_serializing_if = "Option::is_none")]
    pub lexical_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Forms and senses kept as raw JSON.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forms: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub senses: Vec<Value>,
    #[serde(
        default,
        deserialize_with = "map_or_empty_array",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub claims: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastrevid: Option<u64>,
}

/// A document describing one media info record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfoDocument {
    #[serde(
        default = "EntityIdValue::placeholder",
        skip_serializing_if = "EntityIdValue::is_placeholder"
    )]
    pub id: EntityIdValue,
    #[serde(
        default,
        deserialize_with = "map_or_empty_array",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub labels: HashMap<String, TermValue>,
    #[serde(
        default,
        deserialize_with = "map_or_empty_array",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub statements: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastrevid: Option<u64>,
}

/// A marker recording that one entity redirects to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRedirectDocument {
    /// The redirecting entity.
    #[serde(rename = "entity")]
    pub source: EntityIdValue,
    /// The entity being redirected to.
    #[serde(rename = "redirect")]
    pub target: EntityIdValue,
}

/// Any entity document, as a closed tagged union.
///
/// Dispatch over the variant happens through content-model strings (for
/// revisions) or the JSON `type` field (for API payloads); adding a
/// variant means extending those tables.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityDocument {
    Item(ItemDocument),
    Property(PropertyDocument),
    Lexeme(LexemeDocument),
    MediaInfo(MediaInfoDocument),
    Redirect(EntityRedirectDocument),
}

impl EntityDocument {
    /// The id identifying this document. For redirects this is the
    /// redirecting entity.
    pub fn entity_id(&self) -> &EntityIdValue {
        match self {
            EntityDocument::Item(doc) => &doc.id,
            EntityDocument::Property(doc) => &doc.id,
            EntityDocument::Lexeme(doc) => &doc.id,
            EntityDocument::MediaInfo(doc) => &doc.id,
            EntityDocument::Redirect(doc) => &doc.source,
        }
    }

    /// Short lowercase name of the variant, matching the wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            EntityDocument::Item(_) => "item",
            EntityDocument::Property(_) => "property",
            EntityDocument::Lexeme(_) => "lexeme",
            EntityDocument::MediaInfo(_) => "mediainfo",
            EntityDocument::Redirect(_) => "redirect",
        }
    }
}
