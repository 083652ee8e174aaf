//! Database row types. These map directly to SQLite rows and are kept apart
//! from the wire types so the storage layer stays independent.
//!
//! Every entity is built through its `new` factory, which always assigns a
//! fresh id and creation timestamp.

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

/// Current time as fixed-width RFC 3339, so string order is time order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

impl UserRow {
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            password: password_hash.into(),
            created_at: now_timestamp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignRow {
    pub id: String,
    pub image_url: String,
    pub votes: i64,
    pub contact: Option<String>,
    pub created_at: String,
}

impl DesignRow {
    pub fn new(image_url: impl Into<String>, contact: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            image_url: image_url.into(),
            votes: 0,
            contact,
            created_at: now_timestamp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRow {
    pub id: String,
    pub design_id: String,
    pub user_id: String,
    pub parent_id: Option<String>,
    pub body: String,
    pub likes: i64,
    pub created_at: String,
}

impl CommentRow {
    pub fn new(
        design_id: impl Into<String>,
        user_id: impl Into<String>,
        body: impl Into<String>,
        parent_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            design_id: design_id.into(),
            user_id: user_id.into(),
            parent_id,
            body: body.into(),
            likes: 0,
            created_at: now_timestamp(),
        }
    }

    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    /// Whether rows remain past the end of this window.
    pub fn has_more(&self, total: u64) -> bool {
        u64::from(self.page) * u64::from(self.page_size) < total
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, page_size: 10 }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
}
