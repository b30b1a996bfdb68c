//! Post documents as the cache layer sees them.
//!
//! A document is an opaque JSON object. Only `id`, `featured` and `createdAt`
//! carry meaning here; everything else is passed through untouched.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{
    Date, OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description,
};

use super::error::DomainError;

/// Fields owned by the authoritative store; stripped from write bodies.
const RESERVED_FIELDS: [&str; 3] = ["id", "createdAt", "updatedAt"];

/// Identifier of a post in the authoritative store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(i64);

impl PostId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for PostId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PostId {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| DomainError::validation("id", format!("`{value}` is not a post id")))
    }
}

/// A full post document, always a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostDocument(Map<String, Value>);

impl PostDocument {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn from_value(value: Value) -> Result<Self, DomainError> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(DomainError::validation(
                "document",
                format!("expected a JSON object, found {}", json_kind(&other)),
            )),
        }
    }

    /// Post id, accepting both numeric and string renderings.
    pub fn id(&self) -> Option<PostId> {
        match self.0.get("id")? {
            Value::Number(number) => number.as_i64().map(PostId),
            Value::String(raw) => raw.parse().ok(),
            _ => None,
        }
    }

    /// Missing or non-boolean `featured` counts as not featured.
    pub fn featured(&self) -> bool {
        self.0
            .get("featured")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn created_at(&self) -> Option<&str> {
        self.str_field("createdAt")
    }

    /// Sort key for "newest first" ordering.
    ///
    /// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates (midnight UTC).
    pub fn recency(&self) -> Option<OffsetDateTime> {
        let raw = self.created_at()?;
        if let Ok(timestamp) = OffsetDateTime::parse(raw, &Rfc3339) {
            return Some(timestamp);
        }
        Date::parse(raw, format_description!("[year]-[month]-[day]"))
            .ok()
            .map(|date| date.midnight().assume_utc())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

/// Sort newest first. Documents without a usable `createdAt` go last and ties
/// keep their incoming order.
pub fn sort_by_recency(posts: &mut [PostDocument]) {
    posts.sort_by_key(|post| std::cmp::Reverse(post.recency()));
}

/// Body of a create/update request, minus store-owned fields.
#[derive(Debug, Clone, PartialEq)]
pub struct PostBody(Map<String, Value>);

impl PostBody {
    pub fn from_value(value: Value) -> Result<Self, DomainError> {
        let mut fields = PostDocument::from_value(value)?.into_fields();
        for field in RESERVED_FIELDS {
            fields.remove(field);
        }
        Ok(Self(fields))
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

/// Which slice of the post collection a list view covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FeaturedFilter {
    #[default]
    All,
    Featured,
    Unfeatured,
}

impl FeaturedFilter {
    /// Interpret the `featured` query parameter. Only an exact `true` selects
    /// featured posts; any other present value selects the unfeatured ones.
    pub fn from_query(raw: Option<&str>) -> Self {
        match raw {
            Some("true") => Self::Featured,
            Some(_) => Self::Unfeatured,
            None => Self::All,
        }
    }

    pub fn flag(self) -> Option<bool> {
        match self {
            Self::All => None,
            Self::Featured => Some(true),
            Self::Unfeatured => Some(false),
        }
    }

    pub fn matches(self, post: &PostDocument) -> bool {
        self.flag().is_none_or(|wanted| post.featured() == wanted)
    }

    pub fn view_name(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Featured => "featured",
            Self::Unfeatured => "unfeatured",
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> PostDocument {
        PostDocument::from_value(value).expect("object document")
    }

    #[test]
    fn id_accepts_numbers_and_strings() {
        assert_eq!(doc(json!({"id": 42})).id(), Some(PostId::new(42)));
        assert_eq!(doc(json!({"id": "7"})).id(), Some(PostId::new(7)));
        assert_eq!(doc(json!({"id": "abc"})).id(), None);
        assert_eq!(doc(json!({})).id(), None);
    }

    #[test]
    fn featured_defaults_to_false() {
        assert!(doc(json!({"featured": true})).featured());
        assert!(!doc(json!({"featured": "yes"})).featured());
        assert!(!doc(json!({})).featured());
    }

    #[test]
    fn non_object_documents_are_rejected() {
        let err = PostDocument::from_value(json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn sort_puts_newest_first_and_undated_last() {
        let mut posts = vec![
            doc(json!({"id": 1, "createdAt": "2024-01-01"})),
            doc(json!({"id": 2})),
            doc(json!({"id": 3, "createdAt": "2024-03-05T10:00:00Z"})),
            doc(json!({"id": 4, "createdAt": "2024-02-01T00:00:00+00:00"})),
        ];

        sort_by_recency(&mut posts);

        let ids: Vec<i64> = posts
            .iter()
            .filter_map(PostDocument::id)
            .map(PostId::get)
            .collect();
        assert_eq!(ids, vec![3, 4, 1, 2]);
    }

    #[test]
    fn body_strips_store_owned_fields() {
        let body = PostBody::from_value(json!({
            "id": 9,
            "title": "Hello",
            "createdAt": "2024-01-01",
            "updatedAt": "2024-01-02",
        }))
        .expect("valid body");

        assert_eq!(body.fields().len(), 1);
        assert_eq!(body.fields()["title"], "Hello");
    }

    #[test]
    fn featured_filter_from_query() {
        assert_eq!(FeaturedFilter::from_query(Some("true")), FeaturedFilter::Featured);
        assert_eq!(FeaturedFilter::from_query(Some("false")), FeaturedFilter::Unfeatured);
        assert_eq!(FeaturedFilter::from_query(None), FeaturedFilter::All);
        for raw in ["TRUE", "1", "", "yes"] {
            assert_eq!(
                FeaturedFilter::from_query(Some(raw)),
                FeaturedFilter::Unfeatured,
                "featured={raw:?}"
            );
        }

        let featured = doc(json!({"featured": true}));
        assert!(FeaturedFilter::Featured.matches(&featured));
        assert!(!FeaturedFilter::Unfeatured.matches(&featured));
        assert!(FeaturedFilter::All.matches(&featured));
    }
}
