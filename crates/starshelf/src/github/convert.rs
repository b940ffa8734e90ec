//! Conversion from GraphQL nodes to source-feed items.

use super::types::StarredEdge;
use crate::platform::{RemoteItem, RepoFlags};

/// Convert one starred edge into a [`RemoteItem`].
///
/// Topics keep their platform order with repeats removed.
pub(crate) fn to_remote_item(edge: StarredEdge) -> RemoteItem {
    let node = edge.node;

    let mut topics: Vec<String> = Vec::with_capacity(node.repository_topics.nodes.len());
    for topic in node.repository_topics.nodes {
        if !topics.contains(&topic.topic.name) {
            topics.push(topic.topic.name);
        }
    }

    RemoteItem {
        id: node.id,
        display_name: node.name_with_owner,
        url: node.url,
        description: node.description.filter(|d| !d.is_empty()),
        topics,
        language: node.primary_language.map(|l| l.name),
        flags: RepoFlags {
            fork: node.is_fork,
            archived: node.is_archived,
            private: node.is_private,
            mirror: node.is_mirror,
            locked: node.is_locked,
            empty: node.is_empty,
            disabled: node.is_disabled,
        },
        added_at: edge.starred_at,
        last_updated_at: node.updated_at,
    }
}
