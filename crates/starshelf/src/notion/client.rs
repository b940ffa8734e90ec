//! Notion database client implementing the mirror store.

use std::collections::hash_map::Entry;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::convert::{page_properties, to_mirror_page};
use super::error::NotionError;
use super::types::{MAX_QUERY_PAGE_SIZE, NOTION_VERSION, NotionPage, QueryResponse};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{
    HttpError, HttpHeaders, HttpMethod, HttpRequest, HttpResponse, SwappableTransport,
    TransportFactory,
};
use crate::platform::{
    self, ApiRateLimiter, MirrorPage, MirrorSnapshot, MirrorStore, RemoteItem, rate_limits,
};
use crate::retry::{RetryConfig, with_transient_retry};

/// Default Notion API base URL.
pub const NOTION_API: &str = "https://api.notion.com/v1";

/// Tuning knobs for [`NotionClient`].
#[derive(Debug, Clone)]
pub struct NotionOptions {
    /// Pages requested per database query (at most 100).
    pub page_size: u32,
    /// Reconnect-and-retry policy for transient failures.
    pub retry: RetryConfig,
    /// Pacing applied before every request. Defaults to
    /// [`NOTION_MIN_INTERVAL`](rate_limits::NOTION_MIN_INTERVAL); `None` disables it.
    pub rate_limiter: Option<ApiRateLimiter>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for NotionOptions {
    fn default() -> Self {
        Self {
            page_size: MAX_QUERY_PAGE_SIZE,
            retry: RetryConfig::default(),
            rate_limiter: Some(ApiRateLimiter::with_min_interval(
                rate_limits::NOTION_MIN_INTERVAL,
            )),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Notion API client bound to one database.
///
/// The underlying connection pool can be dropped and rebuilt with
/// [`reset`](Self::reset); every request recovers from a transient
/// failure by doing exactly that and retrying once.
pub struct NotionClient {
    transport: SwappableTransport,
    api_base: String,
    token: String,
    database_id: String,
    options: NotionOptions,
}

impl NotionClient {
    /// Create a client using reqwest.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let notion = NotionClient::new(&api_key, &database_id, NotionOptions::default())?;
    /// let pages = notion.fetch_all_pages().await?;
    /// ```
    pub fn new(
        token: &str,
        database_id: &str,
        options: NotionOptions,
    ) -> Result<Self, NotionError> {
        let factory = ReqwestTransport::factory(options.timeout);
        Self::new_with_factory(token, database_id, options, factory)
    }

    /// Create a client whose transports come from `factory`.
    pub fn new_with_factory(
        token: &str,
        database_id: &str,
        options: NotionOptions,
        factory: TransportFactory,
    ) -> Result<Self, NotionError> {
        Ok(Self {
            transport: SwappableTransport::new(factory)?,
            api_base: NOTION_API.to_string(),
            token: token.to_string(),
            database_id: database_id.to_string(),
            options,
        })
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    /// Drop the current connection pool and build a fresh one.
    ///
    /// Requests already in flight finish on the old pool.
    pub fn reset(&self) {
        match self.transport.reset() {
            Ok(()) => tracing::info!("Notion client reset"),
            Err(e) => tracing::warn!(
                error = %e,
                "Failed to rebuild Notion transport, keeping the old one"
            ),
        }
    }

    fn headers(&self) -> HttpHeaders {
        vec![
            ("Authorization".to_string(), format!("Bearer {}", self.token)),
            ("Notion-Version".to_string(), NOTION_VERSION.to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ]
    }

    /// Send one attempt: pace, send on the current transport, check status.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, NotionError> {
        if let Some(limiter) = &self.options.rate_limiter {
            limiter.wait().await;
        }

        let response = self.transport.current().send(request).await?;
        if response.is_success() {
            return Ok(response);
        }
        if response.status == 502 {
            return Err(HttpError::UpstreamUnavailable {
                status: response.status,
            }
            .into());
        }
        Err(NotionError::from_response(response.status, &response.body))
    }

    /// Send a JSON request with reset-and-retry-once semantics and decode the reply.
    async fn request<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        body: &Value,
        label: &str,
    ) -> Result<T, NotionError> {
        let request = HttpRequest::json(
            method,
            format!("{}{}", self.api_base, path),
            self.headers(),
            body,
        );

        let response = with_transient_retry(
            || {
                let request = request.clone();
                async move { self.execute(request).await }
            },
            &self.options.retry,
            NotionError::is_transient,
            |_| self.reset(),
            label,
        )
        .await?;

        Ok(serde_json::from_slice(&response.body)?)
    }

    async fn query_page(&self, cursor: Option<&str>) -> Result<QueryResponse, NotionError> {
        let mut body = json!({ "page_size": self.options.page_size.clamp(1, MAX_QUERY_PAGE_SIZE) });
        if let Some(cursor) = cursor {
            body["start_cursor"] = json!(cursor);
        }

        self.request(
            HttpMethod::Post,
            &format!("/databases/{}/query", self.database_id),
            &body,
            "query database",
        )
        .await
    }

    /// Walk the whole database, keeping the first page per Repo ID.
    async fn list_pages(&self) -> Result<MirrorSnapshot, NotionError> {
        let mut snapshot = MirrorSnapshot::default();
        let mut cursor: Option<String> = None;

        loop {
            let response = self.query_page(cursor.as_deref()).await?;

            for page in &response.results {
                if page.archived || page.in_trash {
                    continue;
                }
                let Some(mirror) = to_mirror_page(page) else {
                    tracing::warn!(page_id = %page.id, "Skipping page without a Repo ID");
                    continue;
                };

                match snapshot.pages.entry(mirror.external_id.clone()) {
                    Entry::Occupied(kept) => {
                        tracing::warn!(
                            external_id = %mirror.external_id,
                            kept = %kept.get().page_id,
                            duplicate = %mirror.page_id,
                            "Duplicate page for the same item"
                        );
                        snapshot.duplicates.push(mirror);
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(mirror);
                    }
                }
            }

            if !response.has_more {
                break;
            }
            match response.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(snapshot)
    }
}

#[async_trait]
impl MirrorStore for NotionClient {
    async fn fetch_all_pages(&self) -> platform::Result<MirrorSnapshot> {
        tracing::info!(database_id = %self.database_id, "Fetching all Notion pages");

        let snapshot = self.list_pages().await?;

        tracing::info!(
            count = snapshot.pages.len(),
            duplicates = snapshot.duplicates.len(),
            "Fetched Notion pages"
        );
        Ok(snapshot)
    }

    async fn insert(&self, item: &RemoteItem) -> platform::Result<MirrorPage> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": page_properties(item),
        });
        let label = format!("insert {}", item.display_name);
        let page: NotionPage = self.request(HttpMethod::Post, "/pages", &body, &label).await?;

        tracing::info!(repo = %item.display_name, page_id = %page.id, "Inserted page");
        Ok(MirrorPage {
            page_id: page.id,
            external_id: item.id.clone(),
            title: item.display_name.clone(),
        })
    }

    async fn update(&self, page_id: &str, item: &RemoteItem) -> platform::Result<MirrorPage> {
        let body = json!({ "properties": page_properties(item) });
        let label = format!("update {}", item.display_name);
        let page: NotionPage = self
            .request(HttpMethod::Patch, &format!("/pages/{page_id}"), &body, &label)
            .await?;

        tracing::info!(repo = %item.display_name, page_id = %page.id, "Updated page");
        Ok(MirrorPage {
            page_id: page.id,
            external_id: item.id.clone(),
            title: item.display_name.clone(),
        })
    }

    async fn archive(&self, page_id: &str) -> platform::Result<()> {
        let label = format!("archive {page_id}");
        let _: Value = self
            .request(
                HttpMethod::Patch,
                &format!("/pages/{page_id}"),
                &json!({ "archived": true }),
                &label,
            )
            .await?;
        Ok(())
    }
}
