//! GitHub source feed: the viewer's starred repositories.
//!
//! Stars are read through the GraphQL API, newest first, and removed
//! through the REST `user/starred` endpoint.
//!
//! # Module Structure
//!
//! - [`error`] - Error types for GitHub API operations
//! - [`types`] - GraphQL query and wire types
//! - [`client`] - Client creation and the [`SourceFeed`](crate::platform::SourceFeed) impl
//! - [`convert`] - Conversion to [`RemoteItem`](crate::platform::RemoteItem)

mod client;
mod convert;
mod error;
mod types;

pub use client::{GITHUB_API, GitHubClient, GitHubOptions};
pub use error::GitHubError;
pub use types::{DEFAULT_PAGE_SIZE, DEFAULT_TOPICS_LIMIT};
