//! Notion wire types, limited to the fields the mirror reads back.

use std::collections::HashMap;

use serde::Deserialize;

/// Notion API version sent with every request.
pub const NOTION_VERSION: &str = "2022-06-28";

/// Maximum `page_size` accepted by the database query endpoint.
pub const MAX_QUERY_PAGE_SIZE: u32 = 100;

/// Response of `POST /databases/{id}/query`.
#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<NotionPage>,
    #[serde(default)]
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

/// A database page.
#[derive(Debug, Deserialize)]
pub struct NotionPage {
    pub id: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub in_trash: bool,
    #[serde(default)]
    pub properties: HashMap<String, PropertyValue>,
}

/// A page property. Only text-bearing variants are decoded.
#[derive(Debug, Default, Deserialize)]
pub struct PropertyValue {
    #[serde(default)]
    pub title: Vec<RichText>,
    #[serde(default)]
    pub rich_text: Vec<RichText>,
}

#[derive(Debug, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: String,
}
