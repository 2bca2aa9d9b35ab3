//! High-level entity editing over an [`ApiConnection`]
//!
//! Performs create-or-update operations against the remote service:
//! acquires a write token, serializes the document, sends the edit and
//! deserializes the updated document from the response. Classified API
//! errors surface to the caller unchanged; in particular a
//! [`crate::MediaWikiError::BadToken`] or
//! [`crate::MediaWikiError::EditConflict`] is never retried here. The
//! caller decides whether to clear the token and try again.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use super::connection::{ApiConnection, HttpMethod};
use super::errors::ConnectionError;
use super::tokens::TOKEN_CSRF;
use crate::datamodel::{EntityDocument, ItemDocument, JsonDeserializer, PropertyDocument};

/// Editor for the entity data of one site.
pub struct EntityEditor<'a> {
    connection: &'a mut ApiConnection,
    deserializer: JsonDeserializer,
    /// Mark edits as made by a bot account.
    bot: bool,
    /// Back-off threshold in seconds sent with every edit, if any.
    maxlag: Option<u32>,
}

impl<'a> EntityEditor<'a> {
    /// Creates an editor writing through the given connection. The site
    /// IRI is used to qualify entity ids in API responses, since it is
    /// not part of the payload.
    pub fn new(connection: &'a mut ApiConnection, site_iri: impl Into<String>) -> Self {
        Self {
            connection,
            deserializer: JsonDeserializer::new(site_iri),
            bot: false,
            maxlag: None,
        }
    }

    pub fn site_iri(&self) -> &str {
        self.deserializer.site_iri()
    }

    pub fn set_bot(&mut self, bot: bool) {
        self.bot = bot;
    }

    pub fn set_maxlag(&mut self, seconds: Option<u32>) {
        self.maxlag = seconds;
    }

    /// Creates a new item from a document with a placeholder id. Returns
    /// the created document carrying the server-assigned id.
    pub fn create_item_document(
        &mut self,
        document: &ItemDocument,
        summary: Option<&str>,
    ) -> Result<ItemDocument, ConnectionError> {
        if !document.id.is_placeholder() {
            return Err(ConnectionError::InvalidDocument(
                "a document to be created must not carry an entity id".to_string(),
            ));
        }
        let data = to_wire_json(document)?;
        match self.edit_entity(None, Some("item"), &data, false, summary)? {
            EntityDocument::Item(doc) => Ok(doc),
            other => Err(unexpected_kind("item", &other)),
        }
    }

    /// Creates a new property from a document with a placeholder id.
    pub fn create_property_document(
        &mut self,
        document: &PropertyDocument,
        summary: Option<&str>,
    ) -> Result<PropertyDocument, ConnectionError> {
        if !document.id.is_placeholder() {
            return Err(ConnectionError::InvalidDocument(
                "a document to be created must not carry an entity id".to_string(),
            ));
        }
        let data = to_wire_json(document)?;
        match self.edit_entity(None, Some("property"), &data, false, summary)? {
            EntityDocument::Property(doc) => Ok(doc),
            other => Err(unexpected_kind("property", &other)),
        }
    }

    /// Writes the data of an existing item. With `clear` the existing
    /// data is replaced wholesale; otherwise the given data is merged
    /// into what is already there.
    pub fn edit_item_document(
        &mut self,
        document: &ItemDocument,
        clear: bool,
        summary: Option<&str>,
    ) -> Result<ItemDocument, ConnectionError> {
        if document.id.is_placeholder() {
            return Err(ConnectionError::InvalidDocument(
                "a document to be edited must carry its entity id".to_string(),
            ));
        }
        let id = document.id.id().to_string();
        let data = to_wire_json(document)?;
        match self.edit_entity(Some(&id), None, &data, clear, summary)? {
            EntityDocument::Item(doc) => Ok(doc),
            other => Err(unexpected_kind("item", &other)),
        }
    }

    /// Writes the data of an existing property.
    pub fn edit_property_document(
        &mut self,
        document: &PropertyDocument,
        clear: bool,
        summary: Option<&str>,
    ) -> Result<PropertyDocument, ConnectionError> {
        if document.id.is_placeholder() {
            return Err(ConnectionError::InvalidDocument(
                "a document to be edited must carry its entity id".to_string(),
            ));
        }
        let id = document.id.id().to_string();
        let data = to_wire_json(document)?;
        match self.edit_entity(Some(&id), None, &data, clear, summary)? {
            EntityDocument::Property(doc) => Ok(doc),
            other => Err(unexpected_kind("property", &other)),
        }
    }

    /// Sends one `wbeditentity` request. Exactly one of `id` (update an
    /// existing entity) and `new` (create an entity of the given kind)
    /// should be set.
    ///
    /// Requires a logged-in connection; this is checked before any
    /// request is sent.
    pub fn edit_entity(
        &mut self,
        id: Option<&str>,
        new: Option<&str>,
        data: &str,
        clear: bool,
        summary: Option<&str>,
    ) -> Result<EntityDocument, ConnectionError> {
        if !self.connection.is_logged_in() {
            return Err(ConnectionError::NotLoggedIn);
        }
        let token = self.connection.get_or_fetch_token(TOKEN_CSRF)?;

        let mut params: BTreeMap<String, String> = BTreeMap::new();
        params.insert("action".to_string(), "wbeditentity".to_string());
        params.insert("token".to_string(), token);
        params.insert("data".to_string(), data.to_string());
        if let Some(id) = id {
            params.insert("id".to_string(), id.to_string());
        }
        if let Some(new) = new {
            params.insert("new".to_string(), new.to_string());
        }
        if clear {
            // boolean API parameter: presence alone marks the flag
            params.insert("clear".to_string(), String::new());
        }
        if self.bot {
            params.insert("bot".to_string(), String::new());
        }
        if let Some(lag) = self.maxlag {
            params.insert("maxlag".to_string(), lag.to_string());
        }
        if let Some(summary) = summary {
            params.insert("summary".to_string(), summary.to_string());
        }

        debug!(
            "editing entity (id: {:?}, new: {:?}, clear: {clear})",
            id, new
        );
        let root = self.connection.send_json_request(HttpMethod::Post, params)?;

        let entity = root.get("entity").ok_or_else(|| {
            ConnectionError::UnexpectedResponse(
                "edit response did not contain an 'entity' payload".to_string(),
            )
        })?;
        Ok(self
            .deserializer
            .deserialize_entity_document(&entity.to_string())?)
    }
}

fn to_wire_json<T: Serialize>(document: &T) -> Result<String, ConnectionError> {
    serde_json::to_string(document).map_err(ConnectionError::Serialize)
}

fn unexpected_kind(expected: &str, got: &EntityDocument) -> ConnectionError {
    ConnectionError::UnexpectedResponse(format!(
        "expected an entity of type '{expected}', got '{}' for {}",
        got.kind(),
        got.entity_id().id()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamodel::EntityIdValue;

    const SITE_IRI: &str = "http://www.wikidata.org/entity/";

    #[test]
    fn editing_requires_a_logged_in_connection() {
        // unroutable base URL: the check must fire before any request
        let mut conn = ApiConnection::new("http://127.0.0.1:9/w/api.php").unwrap();
        let mut editor = EntityEditor::new(&mut conn, SITE_IRI);

        let doc = ItemDocument::new(EntityIdValue::placeholder()).with_label("en", "new item");
        let result = editor.create_item_document(&doc, None);
        assert!(matches!(result, Err(ConnectionError::NotLoggedIn)));
    }

    #[test]
    fn creating_rejects_a_document_with_an_id() {
        let mut conn = ApiConnection::new("http://127.0.0.1:9/w/api.php").unwrap();
        let mut editor = EntityEditor::new(&mut conn, SITE_IRI);

        let doc = ItemDocument::new(EntityIdValue::new("Q42", SITE_IRI));
        let result = editor.create_item_document(&doc, None);
        assert!(matches!(result, Err(ConnectionError::InvalidDocument(_))));
    }

    #[test]
    fn editing_rejects_a_document_without_an_id() {
        let mut conn = ApiConnection::new("http://127.0.0.1:9/w/api.php").unwrap();
        let mut editor = EntityEditor::new(&mut conn, SITE_IRI);

        let doc = ItemDocument::new(EntityIdValue::placeholder());
        let result = editor.edit_item_document(&doc, false, None);
        assert!(matches!(result, Err(ConnectionError::InvalidDocument(_))));
    }
}
