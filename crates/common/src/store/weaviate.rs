//! Weaviate adapter
//!
//! Reads go through the GraphQL `Get`/`Aggregate` endpoints, writes through
//! `POST /v1/objects`. Chunk rows reference their document with an
//! `ofDocument` cross-reference.

use super::{Collection, Filter, StoredObject, VectorStore};
use crate::config::StoreConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use serde_json::{json, Map, Value};
use std::time::Duration;

const DOCUMENT_PROPERTIES: &[&str] = &[
    "title",
    "document_type",
    "summary",
    "keywords",
    "sector",
    "client",
    "budget",
    "date",
];

const CHUNK_PROPERTIES: &[&str] = &["content", "index", "page"];

const REFERENCE_PROPERTY: &str = "ofDocument";

pub struct WeaviateStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_retry_elapsed: Duration,
}

impl WeaviateStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            max_retry_elapsed: Duration::from_millis(config.max_retry_elapsed_ms),
        })
    }

    fn policy(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_elapsed_time: Some(self.max_retry_elapsed),
            ..ExponentialBackoff::default()
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Content-Type", "application/json");
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Send a JSON body, retrying connection failures and 5xx responses
    async fn send(&self, method: reqwest::Method, path: &str, body: &Value) -> Result<Value> {
        retry(self.policy(), || {
            let method = method.clone();
            async move {
                let response = self
                    .request(method, path)
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| backoff::Error::transient(store_error(format!("request failed: {}", e))))?;

                let status = response.status();
                if status.is_server_error() {
                    let text = response.text().await.unwrap_or_default();
                    tracing::warn!(status = status.as_u16(), path, "Weaviate server error, retrying");
                    return Err(backoff::Error::transient(store_error(format!(
                        "{} returned {}: {}",
                        path, status, text
                    ))));
                }
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(backoff::Error::permanent(store_error(format!(
                        "{} returned {}: {}",
                        path, status, text
                    ))));
                }

                response
                    .json::<Value>()
                    .await
                    .map_err(|e| backoff::Error::permanent(store_error(format!("invalid response: {}", e))))
            }
        })
        .await
    }

    async fn graphql(&self, query: String) -> Result<Value> {
        let payload = self
            .send(reqwest::Method::POST, "/v1/graphql", &json!({ "query": query }))
            .await?;

        if let Some(errors) = payload.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let messages: Vec<&str> = errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(Value::as_str))
                    .collect();
                return Err(store_error(messages.join("; ")));
            }
        }
        Ok(payload)
    }

    async fn get(&self, collection: Collection, arguments: String, score_field: &str) -> Result<Vec<StoredObject>> {
        let query = format!(
            "{{ Get {{ {}({}) {{ {} _additional {{ id {} }} }} }} }}",
            collection.name(),
            arguments,
            selection(collection),
            score_field
        );
        let payload = self.graphql(query).await?;
        let rows = payload
            .pointer(&format!("/data/Get/{}", collection.name()))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(rows.into_iter().filter_map(|row| parse_row(collection, row)).collect())
    }
}

fn store_error(message: String) -> AppError {
    AppError::StoreError { message }
}

fn selection(collection: Collection) -> String {
    match collection {
        Collection::Document => DOCUMENT_PROPERTIES.join(" "),
        Collection::Chunk => format!(
            "{} {} {{ ... on Document {{ _additional {{ id }} }} }}",
            CHUNK_PROPERTIES.join(" "),
            REFERENCE_PROPERTY
        ),
    }
}

/// GraphQL string literal (JSON escaping is a valid subset)
fn quote(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

fn vector_literal(vector: &[f32]) -> String {
    let parts: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

fn where_clause(filter: &Filter) -> String {
    match filter {
        Filter::Equal { property, value } => format!(
            "{{ operator: Equal, path: [{}], valueText: {} }}",
            quote(property),
            quote(value)
        ),
        Filter::Any(operands) => compound("Or", operands),
        Filter::All(operands) => compound("And", operands),
    }
}

fn compound(operator: &str, operands: &[Filter]) -> String {
    let parts: Vec<String> = operands.iter().map(where_clause).collect();
    format!("{{ operator: {}, operands: [{}] }}", operator, parts.join(", "))
}

fn parse_row(collection: Collection, row: Value) -> Option<StoredObject> {
    let Value::Object(mut fields) = row else {
        return None;
    };
    let additional = fields.remove("_additional")?;
    let id = additional.get("id")?.as_str()?.to_string();

    let score = if let Some(distance) = additional.get("distance").and_then(Value::as_f64) {
        Some(1.0 - distance as f32)
    } else {
        // hybrid scores come back as strings
        additional.get("score").and_then(|s| match s {
            Value::String(s) => s.parse::<f32>().ok(),
            other => other.as_f64().map(|v| v as f32),
        })
    };

    let document_ref = match collection {
        Collection::Chunk => fields
            .remove(REFERENCE_PROPERTY)
            .and_then(|refs| refs.pointer("/0/_additional/id").and_then(Value::as_str).map(str::to_string)),
        Collection::Document => None,
    };

    let properties: Map<String, Value> = fields.into_iter().filter(|(_, v)| !v.is_null()).collect();

    Some(StoredObject {
        id,
        properties,
        document_ref,
        score,
    })
}

#[async_trait]
impl VectorStore for WeaviateStore {
    async fn filter_query(
        &self,
        collection: Collection,
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<StoredObject>> {
        let mut arguments = format!("limit: {}", limit);
        if let Some(filter) = filter {
            arguments.push_str(&format!(", where: {}", where_clause(filter)));
        }
        self.get(collection, arguments, "").await
    }

    async fn vector_query(
        &self,
        collection: Collection,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<StoredObject>> {
        let arguments = format!(
            "limit: {}, nearVector: {{ vector: {} }}",
            limit,
            vector_literal(vector)
        );
        self.get(collection, arguments, "distance").await
    }

    async fn hybrid_query(
        &self,
        collection: Collection,
        text: &str,
        vector: &[f32],
        limit: usize,
        alpha: f32,
    ) -> Result<Vec<StoredObject>> {
        let arguments = format!(
            "limit: {}, hybrid: {{ query: {}, vector: {}, alpha: {} }}",
            limit,
            quote(text),
            vector_literal(vector),
            alpha.clamp(0.0, 1.0)
        );
        self.get(collection, arguments, "score").await
    }

    async fn insert(
        &self,
        collection: Collection,
        object: StoredObject,
        vector: Vec<f32>,
    ) -> Result<String> {
        let mut properties = object.properties;
        if let (Collection::Chunk, Some(document_id)) = (collection, &object.document_ref) {
            properties.insert(
                REFERENCE_PROPERTY.to_string(),
                json!([{ "beacon": format!("weaviate://localhost/Document/{}", document_id) }]),
            );
        }

        let mut body = json!({
            "class": collection.name(),
            "properties": properties,
            "vector": vector,
        });
        if !object.id.is_empty() {
            body["id"] = Value::String(object.id.clone());
        }

        let created = self.send(reqwest::Method::POST, "/v1/objects", &body).await?;
        created
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| store_error("insert response carried no id".to_string()))
    }

    async fn count(&self, collection: Collection) -> Result<usize> {
        let query = format!("{{ Aggregate {{ {} {{ meta {{ count }} }} }} }}", collection.name());
        let payload = self.graphql(query).await?;
        payload
            .pointer(&format!("/data/Aggregate/{}/0/meta/count", collection.name()))
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .ok_or_else(|| store_error("aggregate response carried no count".to_string()))
    }
}
