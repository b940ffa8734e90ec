//! GitHub client for the viewer's starred repositories.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::convert::to_remote_item;
use super::error::GitHubError;
use super::types::{
    DEFAULT_PAGE_SIZE, DEFAULT_TOPICS_LIMIT, GraphQlResponse, STARRED_REPOSITORIES_QUERY,
    StarredRepositories, ViewerData,
};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::platform::{self, RemoteItem, SourceFeed};

/// Default GitHub API host.
pub const GITHUB_API: &str = "https://api.github.com";

/// Tuning knobs for [`GitHubClient`].
#[derive(Debug, Clone)]
pub struct GitHubOptions {
    /// Stars requested per GraphQL page.
    pub page_size: usize,
    /// Pause between consecutive page requests.
    pub page_delay: Duration,
    /// Topics requested per repository.
    pub topics_limit: u32,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for GitHubOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            page_delay: Duration::from_millis(100),
            topics_limit: DEFAULT_TOPICS_LIMIT,
            timeout: Duration::from_secs(30),
        }
    }
}

/// GitHub API client.
///
/// Reads the star list through the GraphQL API and unstars through REST.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    api_base: String,
    token: String,
    options: GitHubOptions,
}

impl GitHubClient {
    /// Create a client talking to api.github.com.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = GitHubClient::new(&token, GitHubOptions::default())?;
    /// let stars = client.fetch_latest(10).await?;
    /// ```
    pub fn new(token: &str, options: GitHubOptions) -> Result<Self, GitHubError> {
        let transport = ReqwestTransport::with_timeout(options.timeout)?;
        Ok(Self::new_with_transport(token, options, Arc::new(transport)))
    }

    pub fn new_with_transport(
        token: &str,
        options: GitHubOptions,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            api_base: GITHUB_API.to_string(),
            token: token.to_string(),
            options,
        }
    }

    /// Point the client at another API host (GitHub Enterprise).
    #[must_use]
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn options(&self) -> &GitHubOptions {
        &self.options
    }

    fn headers(&self) -> HttpHeaders {
        vec![
            ("Accept".to_string(), "application/vnd.github+json".to_string()),
            ("User-Agent".to_string(), "starshelf".to_string()),
            ("Authorization".to_string(), format!("Bearer {}", self.token)),
        ]
    }

    fn check_status(response: &HttpResponse) -> Result<(), GitHubError> {
        if response.is_success() {
            return Ok(());
        }
        Err(GitHubError::Api {
            status: response.status,
            message: response.body_text(),
        })
    }

    /// Run a GraphQL query and decode its `data`.
    async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, GitHubError> {
        let request = HttpRequest::json(
            HttpMethod::Post,
            format!("{}/graphql", self.api_base),
            self.headers(),
            &json!({ "query": query, "variables": variables }),
        );

        let response = self.transport.send(request).await?;
        Self::check_status(&response)?;

        let envelope: GraphQlResponse<T> = serde_json::from_slice(&response.body)?;
        if !envelope.errors.is_empty() {
            let message = envelope
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(GitHubError::GraphQl(message));
        }

        envelope.data.ok_or(GitHubError::MissingData)
    }

    /// Fetch one page of stars, newest first.
    async fn fetch_starred_page(
        &self,
        first: usize,
        after: Option<&str>,
    ) -> Result<StarredRepositories, GitHubError> {
        let data: ViewerData = self
            .graphql(
                STARRED_REPOSITORIES_QUERY,
                json!({
                    "first": first,
                    "after": after,
                    "topicFirst": self.options.topics_limit,
                }),
            )
            .await?;
        Ok(data.viewer.starred_repositories)
    }

    /// Fetch up to `limit` stars, following cursors page by page.
    pub async fn list_starred(&self, limit: usize) -> Result<Vec<RemoteItem>, GitHubError> {
        let mut items = Vec::new();
        if limit == 0 {
            return Ok(items);
        }

        let page_size = self.options.page_size.max(1);
        let mut cursor: Option<String> = None;
        let mut page = 0u32;

        loop {
            let first = page_size.min(limit - items.len());
            let connection = self.fetch_starred_page(first, cursor.as_deref()).await?;
            page += 1;

            let count = connection.edges.len();
            items.extend(connection.edges.into_iter().map(to_remote_item));
            tracing::debug!(page, count, total = items.len(), "Fetched page of stars");

            if !connection.page_info.has_next_page || items.len() >= limit {
                break;
            }
            match connection.page_info.end_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }

            tokio::time::sleep(self.options.page_delay).await;
        }

        items.truncate(limit);
        tracing::info!(count = items.len(), pages = page, "Fetched starred repositories");
        Ok(items)
    }

    /// Remove the viewer's star from `name_with_owner`.
    ///
    /// Returns `false` if the repository was not starred (or no longer exists).
    pub async fn unstar(&self, name_with_owner: &str) -> Result<bool, GitHubError> {
        let request = HttpRequest {
            method: HttpMethod::Delete,
            url: format!("{}/user/starred/{}", self.api_base, name_with_owner),
            headers: self.headers(),
            body: Vec::new(),
        };

        let response = self.transport.send(request).await?;
        match response.status {
            200 | 204 => Ok(true),
            404 => Ok(false),
            _ => {
                Self::check_status(&response)?;
                Ok(true)
            }
        }
    }
}

#[async_trait]
impl SourceFeed for GitHubClient {
    async fn fetch_all(&self, limit: usize) -> platform::Result<Vec<RemoteItem>> {
        Ok(self.list_starred(limit).await?)
    }

    async fn fetch_latest(&self, count: usize) -> platform::Result<Vec<RemoteItem>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        if count > self.options.page_size {
            return self.fetch_all(count).await;
        }

        let connection = self.fetch_starred_page(count, None).await?;
        let mut items: Vec<RemoteItem> = connection.edges.into_iter().map(to_remote_item).collect();
        items.truncate(count);
        tracing::info!(count = items.len(), "Fetched latest starred repositories");
        Ok(items)
    }

    async fn remove(&self, item: &RemoteItem) -> platform::Result<()> {
        if self.unstar(&item.display_name).await? {
            tracing::info!(repo = %item.display_name, "Unstarred repository");
        } else {
            tracing::info!(repo = %item.display_name, "Repository was not starred");
        }
        Ok(())
    }
}
