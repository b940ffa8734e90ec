//! Mapping between source items and Notion page properties.

use std::borrow::Cow;

use serde_json::{Value, json};

use super::types::{NotionPage, RichText};
use crate::platform::{MirrorPage, RemoteItem};

/// Property holding the item's display name.
pub const PROP_NAME: &str = "Name";
/// Property holding the item's stable external id.
pub const PROP_EXTERNAL_ID: &str = "Repo ID";

/// Descriptions at or above this many characters are truncated.
pub const DESCRIPTION_LIMIT: usize = 2000;
/// Characters kept from a truncated description.
pub const DESCRIPTION_KEEP: usize = 1200;

/// Shorten descriptions that would exceed Notion's rich text limit.
pub fn truncate_description(description: &str) -> Cow<'_, str> {
    if description.chars().count() < DESCRIPTION_LIMIT {
        return Cow::Borrowed(description);
    }
    let kept: String = description.chars().take(DESCRIPTION_KEEP).collect();
    Cow::Owned(format!("{kept}..."))
}

fn text(content: &str) -> Value {
    json!([{ "type": "text", "text": { "content": content } }])
}

fn names<'a>(values: impl IntoIterator<Item = &'a str>) -> Value {
    Value::Array(
        values
            .into_iter()
            .map(|name| json!({ "name": name }))
            .collect(),
    )
}

/// Properties written on insert and update.
pub fn page_properties(item: &RemoteItem) -> Value {
    let description = truncate_description(item.description.as_deref().unwrap_or_default());

    json!({
        "Name": { "type": "title", "title": text(&item.display_name) },
        "Repo ID": { "type": "rich_text", "rich_text": text(&item.id) },
        "Type": { "type": "select", "select": { "name": "Star" } },
        "Link": { "type": "url", "url": item.url },
        "Description": { "type": "rich_text", "rich_text": text(&description) },
        "Primary Language": {
            "type": "select",
            "select": { "name": item.language.as_deref().unwrap_or("null") }
        },
        "Repository Topics": {
            "type": "multi_select",
            "multi_select": names(item.topics.iter().map(String::as_str))
        },
        "Flags": { "type": "multi_select", "multi_select": names(item.flags.names()) },
        "Starred At": { "type": "date", "date": { "start": item.added_at.to_rfc3339() } },
        "Updated At": { "type": "date", "date": { "start": item.last_updated_at.to_rfc3339() } },
    })
}

fn plain_text(parts: &[RichText]) -> String {
    parts.iter().map(|p| p.plain_text.as_str()).collect()
}

/// Read the mirror identity of a page; `None` when it has no external id.
pub fn to_mirror_page(page: &NotionPage) -> Option<MirrorPage> {
    let external_id = page
        .properties
        .get(PROP_EXTERNAL_ID)
        .map(|p| plain_text(&p.rich_text))
        .filter(|id| !id.trim().is_empty())?;

    let title = page
        .properties
        .get(PROP_NAME)
        .map(|p| plain_text(&p.title))
        .unwrap_or_default();

    Some(MirrorPage {
        page_id: page.id.clone(),
        external_id: external_id.trim().to_string(),
        title,
    })
}
