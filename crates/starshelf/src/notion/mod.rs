//! Notion mirror store: one database page per starred repository.
//!
//! Pages carry the repository's stable id in a `Repo ID` property so the
//! mirror can be rebuilt from Notion alone, whatever the current name.
//!
//! # Module Structure
//!
//! - [`error`] - Error types for Notion API operations
//! - [`types`] - Wire types for query results and pages
//! - [`client`] - Client with reset-and-retry and the [`MirrorStore`](crate::platform::MirrorStore) impl
//! - [`convert`] - Page properties and description truncation

mod client;
mod convert;
mod error;
mod types;

pub use client::{NOTION_API, NotionClient, NotionOptions};
pub use convert::{
    DESCRIPTION_KEEP, DESCRIPTION_LIMIT, PROP_EXTERNAL_ID, PROP_NAME, page_properties,
    truncate_description,
};
pub use error::NotionError;
pub use types::NOTION_VERSION;
