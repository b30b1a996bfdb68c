use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    application::{
        error::{AppError, ErrorReport},
        posts::PostService,
        repos::PostsRepo,
        search::SearchService,
    },
    domain::posts::FeaturedFilter,
};

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
    parse_post_id,
};

#[derive(Clone)]
pub struct PublicState {
    pub posts: Arc<PostService>,
    pub search: Arc<SearchService>,
    pub db: Arc<dyn PostsRepo>,
}

pub fn build_router(state: PublicState) -> Router {
    Router::new()
        .route("/api/cache/post/{id}", get(cached_post))
        .route("/api/cache/posts", get(cached_posts))
        .route("/api/posts/search", get(search_posts))
        .route("/_health/db", get(public_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListQuery {
    featured: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchQuery {
    q: Option<String>,
}

async fn cached_post(State(state): State<PublicState>, Path(id): Path<String>) -> Response {
    let Some(id) = parse_post_id(&id) else {
        return AppError::NotFound.into_response();
    };

    match state.posts.get_post(id).await {
        Ok(post) => Json(post).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn cached_posts(State(state): State<PublicState>, Query(query): Query<ListQuery>) -> Response {
    let filter = FeaturedFilter::from_query(query.featured.as_deref());

    match state.posts.list_posts(filter).await {
        Ok(posts) => Json(json!({ "posts": posts })).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn search_posts(State(state): State<PublicState>, Query(query): Query<SearchQuery>) -> Response {
    match state.search.search(query.q.as_deref()).await {
        Ok(posts) => Json(json!({ "posts": posts })).into_response(),
        Err(err) => {
            let status = StatusCode::INTERNAL_SERVER_ERROR;
            let mut response = (
                status,
                Json(json!({ "error": "Search failed", "posts": [] })),
            )
                .into_response();
            ErrorReport::from_error("infra::http::public::search_posts", status, &err)
                .attach(&mut response);
            response
        }
    }
}

async fn public_health(State(state): State<PublicState>) -> Response {
    db_health_response(state.db.health_check().await)
}
