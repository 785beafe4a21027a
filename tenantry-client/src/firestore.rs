//! Firestore REST document client
//!
//! Documents travel as Firestore's typed value encoding
//! (`{"stringValue": "..."}`, `{"mapValue": {"fields": ...}}`, ...). The
//! client converts to and from plain `serde_json::Value` so callers never see
//! the wire encoding.

use reqwest::Client;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::{handle_empty_response, handle_response};

const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_DATABASE: &str = "(default)";

/// Client for one Firestore database of one project
#[derive(Debug, Clone)]
pub struct FirestoreClient {
    /// Base URL of the REST API
    base_url: String,
    project_id: String,
    database: String,
    /// OAuth2 bearer token
    access_token: String,
    client: Client,
}

impl FirestoreClient {
    /// Create a client for the default database of a project
    pub fn new(project_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, project_id, access_token)
    }

    /// Create a client against a custom endpoint (e.g. the local emulator)
    pub fn with_base_url(
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            database: DEFAULT_DATABASE.to_string(),
            access_token: access_token.into(),
            client: Client::new(),
        }
    }

    /// Same credentials, scoped to a named database
    pub fn for_database(&self, database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..self.clone()
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// URL of the documents root for this project and database
    pub fn documents_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents",
            self.base_url, self.project_id, self.database
        )
    }

    fn document_url(&self, collection: &str, id: &str) -> Result<String> {
        if collection.is_empty() || id.is_empty() || id.contains('/') {
            return Err(ClientError::InvalidRequest(format!(
                "Invalid document path '{}/{}'",
                collection, id
            )));
        }
        Ok(format!("{}/{}/{}", self.documents_url(), collection, id))
    }

    // =============================================================================
    // Documents
    // =============================================================================

    /// Fetch a document as plain JSON
    ///
    /// # Returns
    /// `None` if the document does not exist
    pub async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let url = self.document_url(collection, id)?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        match handle_response::<Value>(response).await {
            Ok(document) => {
                let fields = document.get("fields").cloned().unwrap_or(Value::Object(Map::new()));
                Ok(Some(decode_fields(&fields)))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write the given top-level fields, leaving other fields untouched
    ///
    /// Creates the document if it does not exist.
    pub async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<()> {
        let url = self.document_url(collection, id)?;
        debug!("PATCH {} ({} field(s))", url, fields.len());

        let mask: Vec<(&str, String)> = fields
            .keys()
            .map(|key| ("updateMask.fieldPaths", quote_field_path(key)))
            .collect();

        let body = serde_json::json!({ "fields": encode_fields(fields) });

        let response = self
            .client
            .patch(&url)
            .bearer_auth(&self.access_token)
            .query(&mask)
            .json(&body)
            .send()
            .await?;

        handle_empty_response(response).await
    }
}

/// Quotes a field path segment unless it is a simple identifier
fn quote_field_path(key: &str) -> String {
    let simple = key
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if simple {
        key.to_string()
    } else {
        format!("`{}`", key.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

/// Encodes a JSON object as a Firestore `fields` map
pub fn encode_fields(fields: &Map<String, Value>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect(),
    )
}

fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => serde_json::json!({ "nullValue": null }),
        Value::Bool(b) => serde_json::json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            // Firestore transports 64-bit integers as strings
            Some(i) => serde_json::json!({ "integerValue": i.to_string() }),
            None => serde_json::json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => serde_json::json!({ "stringValue": s }),
        Value::Array(items) => serde_json::json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => serde_json::json!({
            "mapValue": { "fields": encode_fields(map) }
        }),
    }
}

/// Decodes a Firestore `fields` map into a plain JSON object
pub fn decode_fields(fields: &Value) -> Value {
    match fields.as_object() {
        Some(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), decode_value(v)))
                .collect(),
        ),
        None => Value::Object(Map::new()),
    }
}

fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|m| m.iter().next()) else {
        return Value::Null;
    };

    match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" | "doubleValue" => inner.clone(),
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or_else(|| inner.clone()),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => decode_fields(inner.get("fields").unwrap_or(&Value::Null)),
        _ => inner.clone(),
    }
}
