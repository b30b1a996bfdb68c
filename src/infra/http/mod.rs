mod admin;
mod middleware;
mod public;

pub use admin::{AdminState, build_admin_router};
pub use middleware::{REQUEST_ID_HEADER, RequestContext};
pub use public::{PublicState, build_router};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::application::{error::ErrorReport, repos::RepoError};
use crate::domain::posts::PostId;

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// Path ids that do not parse cannot name a stored post.
fn parse_post_id(raw: &str) -> Option<PostId> {
    raw.parse().ok()
}
