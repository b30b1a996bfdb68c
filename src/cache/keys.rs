//! Cache key namespace.
//!
//! Per-post entries live under `post:<id>`; list views under
//! `post:index:<view>`. Every per-post key shares the `post:` prefix so the
//! whole collection can be enumerated with a single `SCAN MATCH post:*`.

use std::fmt;

use crate::domain::posts::{FeaturedFilter, PostId};

pub const POST_PREFIX: &str = "post:";
pub const POST_INDEX_PREFIX: &str = "post:index:";
pub const POST_SCAN_PATTERN: &str = "post:*";

/// A key in the shared cache namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A single post document.
    Post(PostId),
    /// A cached list view.
    PostIndex(FeaturedFilter),
}

impl CacheKey {
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Post(id) => write!(f, "{POST_PREFIX}{id}"),
            Self::PostIndex(filter) => write!(f, "{POST_INDEX_PREFIX}{}", filter.view_name()),
        }
    }
}

/// `post:*` also matches list views; those must be skipped when enumerating
/// per-post entries.
pub fn is_index_key(key: &str) -> bool {
    key.starts_with(POST_INDEX_PREFIX)
}
