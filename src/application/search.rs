//! Title/excerpt search straight against the content store. Results are not
//! cached.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::application::error::AppError;
use crate::application::repos::PostsRepo;
use crate::domain::posts::PostDocument;

const MIN_QUERY_CHARS: usize = 2;
const SEARCH_LIMIT: u32 = 10;
const EXCERPT_MAX_CHARS: usize = 150;
const EXCERPT_CUT_CHARS: usize = 147;
const EXCERPT_PLACEHOLDER: &str = "No excerpt available";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: Value,
    pub title: Value,
    pub excerpt: String,
    pub created_at: Value,
    pub date: Value,
    pub thumbnail: Value,
    pub category: Value,
}

impl PostSummary {
    fn from_document(post: &PostDocument) -> Self {
        let field = |name: &str| post.get(name).cloned().unwrap_or(Value::Null);

        let date = match post.get("date") {
            Some(value) if is_present(value) => value.clone(),
            _ => field("createdAt"),
        };

        Self {
            id: field("id"),
            title: field("title"),
            excerpt: summarize_excerpt(post),
            created_at: field("createdAt"),
            date,
            thumbnail: field("thumbnail"),
            category: field("category"),
        }
    }
}

#[derive(Clone)]
pub struct SearchService {
    posts: Arc<dyn PostsRepo>,
}

impl SearchService {
    pub fn new(posts: Arc<dyn PostsRepo>) -> Self {
        Self { posts }
    }

    pub async fn search(&self, query: Option<&str>) -> Result<Vec<PostSummary>, AppError> {
        let query = query.map(str::trim).unwrap_or_default();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Ok(Vec::new());
        }

        let posts = self
            .posts
            .search_posts(query, SEARCH_LIMIT)
            .await
            .map_err(|err| {
                error!(query, error = %err, "Post search failed");
                AppError::from(err)
            })?;

        Ok(posts.iter().map(PostSummary::from_document).collect())
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.is_empty(),
        _ => true,
    }
}

fn summarize_excerpt(post: &PostDocument) -> String {
    let excerpt = post
        .str_field("excerpt")
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .or_else(|| first_paragraph_text(post.get("details")))
        .unwrap_or_default();

    if excerpt.is_empty() {
        return EXCERPT_PLACEHOLDER.to_string();
    }
    if excerpt.chars().count() > EXCERPT_MAX_CHARS {
        let mut cut: String = excerpt.chars().take(EXCERPT_CUT_CHARS).collect();
        cut.push_str("...");
        return cut;
    }
    excerpt
}

/// Text of the first paragraph block that has any text children, joined with
/// spaces.
fn first_paragraph_text(details: Option<&Value>) -> Option<String> {
    let blocks = details?.as_array()?;
    blocks.iter().find_map(|block| {
        if block.get("type").and_then(Value::as_str) != Some("paragraph") {
            return None;
        }
        let texts: Vec<&str> = block
            .get("children")?
            .as_array()?
            .iter()
            .filter(|child| child.get("type").and_then(Value::as_str) == Some("text"))
            .map(|child| child.get("text").and_then(Value::as_str).unwrap_or_default())
            .collect();
        (!texts.is_empty()).then(|| texts.join(" "))
    })
}
