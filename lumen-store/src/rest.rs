//! PostgREST client for the hosted data backend

use async_trait::async_trait;
use lumen_core::config::RestStoreConfig;
use lumen_core::store::{DocumentStore, StoreError, StoreResult};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::debug;

/// Tables keyed by their own primary key rather than by `user_id`
const SELF_KEYED_TABLES: &[&str] = &["profiles"];

/// Document store backed by a PostgREST endpoint (`{url}/rest/v1`)
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl RestStore {
    /// Create a new store client
    pub fn new(url: impl AsRef<str>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("{}/rest/v1", url.as_ref().trim_end_matches('/')),
            api_key: api_key.into(),
            access_token: None,
        }
    }

    pub fn from_config(config: &RestStoreConfig) -> Self {
        let store = Self::new(&config.url, config.api_key.clone());
        match config.access_token.trim() {
            "" => store,
            token => store.with_access_token(token),
        }
    }

    /// Authorize requests as a signed-in user instead of the anonymous role
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn key_column(table: &str) -> &'static str {
        if SELF_KEYED_TABLES.contains(&table) {
            "id"
        } else {
            "user_id"
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(table))
    }

    fn eq_filter(table: &str, id: &str) -> (String, String) {
        (Self::key_column(table).to_string(), format!("eq.{}", id))
    }

    fn apply_headers(&self, req_builder: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        req_builder
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }

    async fn send(&self, req_builder: RequestBuilder) -> StoreResult<Response> {
        let response = self
            .apply_headers(req_builder)
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StoreError::Backend(format!(
                "HTTP {}: {}",
                status,
                error_message(&error_text)
            )));
        }
        Ok(response)
    }

    async fn fetch_rows(&self, req_builder: RequestBuilder) -> StoreResult<Vec<Value>> {
        let response = self.send(req_builder).await?;
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        match serde_json::from_str::<Value>(&body)? {
            Value::Array(rows) => Ok(rows),
            other => Err(StoreError::Backend(format!(
                "expected a row list, got {}",
                other
            ))),
        }
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl DocumentStore for RestStore {
    async fn select_by_id(&self, table: &str, id: &str) -> StoreResult<Value> {
        debug!("Selecting {}/{}", table, id);
        let filter = Self::eq_filter(table, id);
        let req_builder = self.client.get(self.table_url(table)).query(&[
            (filter.0.as_str(), filter.1.as_str()),
            ("select", "*"),
            ("limit", "1"),
        ]);

        self.fetch_rows(req_builder)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(table, id))
    }

    async fn select_recent(
        &self,
        table: &str,
        owner: &str,
        order_by: &str,
        limit: usize,
    ) -> StoreResult<Vec<Value>> {
        debug!("Selecting {} recent rows from {} for {}", limit, table, owner);
        let filter = Self::eq_filter(table, owner);
        let order = format!("{}.desc", order_by);
        let limit = limit.to_string();
        let req_builder = self.client.get(self.table_url(table)).query(&[
            (filter.0.as_str(), filter.1.as_str()),
            ("select", "*"),
            ("order", order.as_str()),
            ("limit", limit.as_str()),
        ]);

        self.fetch_rows(req_builder).await
    }

    async fn upsert(&self, table: &str, id: &str, record: Value) -> StoreResult<()> {
        let key = Self::key_column(table);
        let mut record = match record {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::Backend(format!(
                    "{} records must be objects, got {}",
                    table, other
                )))
            }
        };
        record
            .entry(key.to_string())
            .or_insert_with(|| Value::String(id.to_string()));

        debug!("Upserting {}/{}", table, id);
        let req_builder = self
            .client
            .post(self.table_url(table))
            .query(&[("on_conflict", key)])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&Value::Object(record));

        self.send(req_builder).await?;
        Ok(())
    }

    async fn delete_by_id(&self, table: &str, id: &str) -> StoreResult<()> {
        debug!("Deleting {}/{}", table, id);
        let filter = Self::eq_filter(table, id);
        let req_builder = self
            .client
            .delete(self.table_url(table))
            .query(&[(filter.0.as_str(), filter.1.as_str())]);

        self.send(req_builder).await?;
        Ok(())
    }
}
