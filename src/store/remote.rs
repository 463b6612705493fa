//! Session store backed by a PostgREST endpoint (e.g. Supabase).
//!
//! Tables `sessions` and `archives` are expected to carry the JSON field
//! names of [`Session`] and [`Archive`] as columns, with unique constraints
//! on `sessions(start, end)` and `archives(date)`.

use crate::core::{Activity, Archive, Session, SessionBucket, SessionCounters};
use crate::store::{SessionStore, StoreError};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

const TABLE_SESSIONS: &str = "sessions";
const TABLE_ARCHIVES: &str = "archives";

/// Remote store configuration.
#[derive(Debug, Clone)]
pub struct RemoteStoreConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// API key sent as both `apikey` and bearer token
    pub api_key: String,
}

impl RemoteStoreConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    /// REST endpoint of `table`.
    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url.trim_end_matches('/'), table)
    }
}

fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

/// Async PostgREST client.
pub struct RemoteStore {
    config: RemoteStoreConfig,
    client: reqwest::Client,
}

impl RemoteStore {
    pub fn new(config: RemoteStoreConfig) -> Result<Self, StoreError> {
        if config.url.is_empty() || config.api_key.is_empty() {
            return Err(StoreError::Backend(
                "remote store needs both a URL and an API key".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| StoreError::Backend(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.api_key)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, StoreError> {
        let response = self
            .authed(self.client.get(self.config.table_url(table)))
            .query(&[("select", "*")])
            .query(query)
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let response = check_status(response, table).await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::Backend(format!("invalid response from {table}: {e}")))
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
        what: String,
    ) -> Result<T, StoreError> {
        self.select(table, query)
            .await?
            .into_iter()
            .next()
            .ok_or(StoreError::NotFound(what))
    }

    async fn insert<T: Serialize>(&self, table: &str, record: &T) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.post(self.config.table_url(table)))
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        check_status(response, table).await?;
        Ok(())
    }

    /// PATCH the rows matching `id` and return how many changed.
    async fn update_by_id(
        &self,
        table: &str,
        id: &str,
        fields: serde_json::Value,
    ) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.patch(self.config.table_url(table)))
            .header("Prefer", "return=representation")
            .query(&[("id", eq(id))])
            .json(&fields)
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let response = check_status(response, table).await?;
        let rows: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| StoreError::Backend(format!("invalid response from {table}: {e}")))?;

        if rows.is_empty() {
            return Err(StoreError::NotFound(format!("{table} row {id}")));
        }
        Ok(())
    }

    pub async fn current_session(&self, bucket: &SessionBucket) -> Result<Session, StoreError> {
        self.select_one(
            TABLE_SESSIONS,
            &[
                ("start", eq(format_time(bucket.start))),
                ("end", eq(format_time(bucket.end))),
            ],
            format!("session starting {}", bucket.start),
        )
        .await
    }

    pub async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        self.insert(TABLE_SESSIONS, session).await
    }

    pub async fn update_session_activity(
        &self,
        id: &str,
        activity: &[Activity],
    ) -> Result<(), StoreError> {
        let fields = serde_json::json!({ "activity": activity });
        self.update_by_id(TABLE_SESSIONS, id, fields).await
    }

    pub async fn update_session_counters(
        &self,
        id: &str,
        counters: &SessionCounters,
    ) -> Result<(), StoreError> {
        let fields = serde_json::to_value(counters)?;
        self.update_by_id(TABLE_SESSIONS, id, fields).await
    }

    pub async fn current_archive(&self, date: &str) -> Result<Archive, StoreError> {
        self.select_one(
            TABLE_ARCHIVES,
            &[("date", eq(date))],
            format!("archive for {date}"),
        )
        .await
    }

    pub async fn insert_archive(&self, archive: &Archive) -> Result<(), StoreError> {
        self.insert(TABLE_ARCHIVES, archive).await
    }

    pub async fn update_archive_sessions(
        &self,
        id: &str,
        sessions: &[Session],
    ) -> Result<(), StoreError> {
        let fields = serde_json::json!({ "sessions": sessions });
        self.update_by_id(TABLE_ARCHIVES, id, fields).await
    }

    pub async fn delete_sessions_older_than(
        &self,
        before: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let response = self
            .authed(self.client.delete(self.config.table_url(TABLE_SESSIONS)))
            .header("Prefer", "return=representation")
            .query(&[("end", format!("lt.{}", format_time(before)))])
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let response = check_status(response, TABLE_SESSIONS).await?;
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Backend(format!("invalid response from {TABLE_SESSIONS}: {e}")))?;
        deleted_rows(&body)
    }

    pub async fn sessions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Session>, StoreError> {
        self.select(
            TABLE_SESSIONS,
            &[
                ("start", format!("gte.{}", format_time(from))),
                ("end", format!("lte.{}", format_time(to))),
                ("order", "start.asc".to_string()),
            ],
        )
        .await
    }
}

/// Count the rows a `return=representation` delete echoed back.
fn deleted_rows(body: &str) -> Result<usize, StoreError> {
    serde_json::from_str::<Vec<serde_json::Value>>(body)
        .map(|rows| rows.len())
        .map_err(|e| StoreError::Backend(format!("invalid response from {TABLE_SESSIONS}: {e}")))
}

/// Map non-success statuses onto store errors.
async fn check_status(response: Response, table: &str) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    match status {
        StatusCode::CONFLICT => Err(StoreError::Conflict(format!("{table} row ({message})"))),
        StatusCode::NOT_FOUND => Err(StoreError::NotFound(format!("{table} ({message})"))),
        _ => Err(StoreError::Backend(format!(
            "{table} request failed ({}): {message}",
            status.as_u16()
        ))),
    }
}

/// Blocking wrapper for use from the synchronous monitor loop.
pub struct BlockingRemoteStore {
    inner: RemoteStore,
    runtime: tokio::runtime::Runtime,
}

impl BlockingRemoteStore {
    pub fn new(config: RemoteStoreConfig) -> Result<Self, StoreError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StoreError::Backend(format!("failed to create runtime: {e}")))?;

        Ok(Self {
            inner: RemoteStore::new(config)?,
            runtime,
        })
    }
}

impl SessionStore for BlockingRemoteStore {
    fn current_session(&self, bucket: &SessionBucket) -> Result<Session, StoreError> {
        self.runtime.block_on(self.inner.current_session(bucket))
    }

    fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        self.runtime.block_on(self.inner.insert_session(session))
    }

    fn update_session_activity(&self, id: &str, activity: &[Activity]) -> Result<(), StoreError> {
        self.runtime
            .block_on(self.inner.update_session_activity(id, activity))
    }

    fn update_session_counters(
        &self,
        id: &str,
        counters: &SessionCounters,
    ) -> Result<(), StoreError> {
        self.runtime
            .block_on(self.inner.update_session_counters(id, counters))
    }

    fn current_archive(&self, date: &str) -> Result<Archive, StoreError> {
        self.runtime.block_on(self.inner.current_archive(date))
    }

    fn insert_archive(&self, archive: &Archive) -> Result<(), StoreError> {
        self.runtime.block_on(self.inner.insert_archive(archive))
    }

    fn update_archive_sessions(&self, id: &str, sessions: &[Session]) -> Result<(), StoreError> {
        self.runtime
            .block_on(self.inner.update_archive_sessions(id, sessions))
    }

    fn delete_sessions_older_than(&self, before: DateTime<Utc>) -> Result<usize, StoreError> {
        self.runtime
            .block_on(self.inner.delete_sessions_older_than(before))
    }

    fn sessions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Session>, StoreError> {
        self.runtime.block_on(self.inner.sessions_between(from, to))
    }
}
