//! Write surface for the content store. Bound to loopback by default; there
//! is no authentication layer.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{post, put},
};
use serde_json::Value;

use crate::{
    application::{error::AppError, posts::PostWriteService},
    domain::posts::PostBody,
};

use super::{
    middleware::{log_responses, set_request_context},
    parse_post_id,
};

#[derive(Clone)]
pub struct AdminState {
    pub writes: Arc<PostWriteService>,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/api/posts", post(create_post))
        .route("/api/posts/{id}", put(update_post).delete(delete_post))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn create_post(State(state): State<AdminState>, Json(body): Json<Value>) -> Response {
    let body = match PostBody::from_value(body) {
        Ok(body) => body,
        Err(err) => return AppError::from(err).into_response(),
    };

    match state.writes.create(body).await {
        Ok(post) => (StatusCode::CREATED, Json(post)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn update_post(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let Some(id) = parse_post_id(&id) else {
        return AppError::NotFound.into_response();
    };

    let body = match PostBody::from_value(body) {
        Ok(body) => body,
        Err(err) => return AppError::from(err).into_response(),
    };

    match state.writes.update(id, body).await {
        Ok(post) => Json(post).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn delete_post(State(state): State<AdminState>, Path(id): Path<String>) -> Response {
    let Some(id) = parse_post_id(&id) else {
        return AppError::NotFound.into_response();
    };

    match state.writes.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}
