//! GraphQL wire types for the starred-repositories query.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Default number of starred repositories requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Default number of topics requested per repository.
pub const DEFAULT_TOPICS_LIMIT: u32 = 50;

/// Query for one page of the viewer's stars, newest first.
pub const STARRED_REPOSITORIES_QUERY: &str = r#"
query StarredRepositories($first: Int!, $after: String, $topicFirst: Int!) {
  viewer {
    starredRepositories(first: $first, after: $after, orderBy: {field: STARRED_AT, direction: DESC}) {
      pageInfo {
        endCursor
        hasNextPage
      }
      edges {
        starredAt
        node {
          id
          isFork
          isEmpty
          isArchived
          isMirror
          isDisabled
          isPrivate
          isLocked
          nameWithOwner
          url
          description
          primaryLanguage {
            name
          }
          repositoryTopics(first: $topicFirst) {
            nodes {
              topic {
                name
              }
            }
          }
          updatedAt
        }
      }
    }
  }
}
"#;

/// Envelope of every GraphQL response.
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ViewerData {
    pub viewer: Viewer,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    pub starred_repositories: StarredRepositories,
}

/// One page of the starred-repositories connection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarredRepositories {
    pub page_info: PageInfo,
    #[serde(default)]
    pub edges: Vec<StarredEdge>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarredEdge {
    pub starred_at: DateTime<Utc>,
    pub node: StarredRepoNode,
}

/// Repository fields selected by [`STARRED_REPOSITORIES_QUERY`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarredRepoNode {
    pub id: String,
    pub is_fork: bool,
    pub is_empty: bool,
    pub is_archived: bool,
    pub is_mirror: bool,
    pub is_disabled: bool,
    pub is_private: bool,
    pub is_locked: bool,
    pub name_with_owner: String,
    pub url: String,
    pub description: Option<String>,
    pub primary_language: Option<Language>,
    #[serde(default)]
    pub repository_topics: TopicConnection,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct Language {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopicConnection {
    #[serde(default)]
    pub nodes: Vec<TopicNode>,
}

#[derive(Debug, Deserialize)]
pub struct TopicNode {
    pub topic: Topic,
}

#[derive(Debug, Deserialize)]
pub struct Topic {
    pub name: String,
}
