//! REST durable store backend
//!
//! Talks to a PostgREST-style row API (one resource per table, filters in
//! the query string, `Prefer: resolution=merge-duplicates` for idempotent
//! upserts). Every request carries a bounded timeout; the store's absence
//! must never hang a request handler.

use super::types::{ConversationRow, FeedbackRow, MessageRow, StoreError, StoreResult};
use super::DurableStore;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection parameters for the REST backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestStoreConfig {
    /// Base URL of the row API (e.g. `https://db.internal/rest/v1`)
    pub base_url: String,
    /// Service API key
    pub api_key: String,
    /// Per-request timeout
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

impl RestStoreConfig {
    /// Load from the environment (`DURABLE_STORE_URL`, `DURABLE_STORE_KEY`).
    /// Both are required at process start.
    pub fn from_env() -> StoreResult<Self> {
        let base_url = std::env::var("DURABLE_STORE_URL")
            .map_err(|_| StoreError::Connection("DURABLE_STORE_URL is not set".to_string()))?;
        let api_key = std::env::var("DURABLE_STORE_KEY")
            .map_err(|_| StoreError::Connection("DURABLE_STORE_KEY is not set".to_string()))?;
        Ok(Self {
            base_url,
            api_key,
            timeout: default_timeout(),
        })
    }
}

/// [`DurableStore`] over a PostgREST-style HTTP API
#[derive(Debug, Clone)]
pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
}

impl RestStore {
    /// Build a store client; fails on malformed credentials
    pub fn new(config: RestStoreConfig) -> StoreResult<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| StoreError::Connection(format!("invalid api key: {}", e)))?;
        let key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| StoreError::Connection(format!("invalid api key: {}", e)))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert("apikey", key);

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!(base_url = %config.base_url, "durable store client ready");
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    async fn check(response: reqwest::Response) -> StoreResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Http {
            status: status.as_u16(),
            body,
        })
    }

    async fn insert<T: Serialize + Sync>(&self, table: &str, row: &T) -> StoreResult<()> {
        let response = self.http.post(self.url(table)).json(row).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn upsert<T: Serialize + Sync>(&self, table: &str, row: &T) -> StoreResult<()> {
        let response = self
            .http
            .post(self.url(table))
            .header("Prefer", "resolution=merge-duplicates")
            .json(row)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> StoreResult<Vec<T>> {
        let response = self
            .http
            .get(self.url(table))
            .query(query)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl DurableStore for RestStore {
    async fn insert_conversation(&self, row: &ConversationRow) -> StoreResult<()> {
        self.insert("conversations", row).await
    }

    async fn upsert_conversation(&self, row: &ConversationRow) -> StoreResult<()> {
        self.upsert("conversations", row).await
    }

    async fn update_conversation(&self, row: &ConversationRow) -> StoreResult<()> {
        let patch = serde_json::json!({
            "status": row.status,
            "message_count": row.message_count,
            "title": row.title,
            "updated_at": row.updated_at,
        });
        let response = self
            .http
            .patch(self.url("conversations"))
            .query(&[("id", format!("eq.{}", row.id))])
            .json(&patch)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn get_conversation(&self, id: &str) -> StoreResult<Option<ConversationRow>> {
        let rows: Vec<ConversationRow> = self
            .select(
                "conversations",
                &[("id", format!("eq.{}", id)), ("limit", "1".to_string())],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_message(&self, row: &MessageRow) -> StoreResult<()> {
        self.insert("messages", row).await
    }

    async fn upsert_message(&self, row: &MessageRow) -> StoreResult<()> {
        self.upsert("messages", row).await
    }

    async fn messages_for(&self, conversation_id: &str) -> StoreResult<Vec<MessageRow>> {
        self.select(
            "messages",
            &[
                ("conversation_id", format!("eq.{}", conversation_id)),
                ("order", "created_at.asc".to_string()),
            ],
        )
        .await
    }

    async fn insert_feedback(&self, row: &FeedbackRow) -> StoreResult<()> {
        self.insert("feedback", row).await
    }
}
