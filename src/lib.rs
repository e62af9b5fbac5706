pub mod api;
pub mod auth;
pub mod config;
pub mod format;
pub mod listings;
pub mod messages;
pub mod model;
pub mod res;
pub mod session;

use axum::{
    Router,
    extract::FromRef,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};

use api::ApiClient;
use messages::TranscriptSettings;
use session::SessionBus;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub api: ApiClient,
    pub bus: SessionBus,
    pub settings: TranscriptSettings,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { Redirect::to("/messages") }))
        .merge(auth::router())
        .nest("/messages", messages::router())
        .nest("/listings", listings::router())
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("request failed: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{}\n\n{}", self.0, self.0.backtrace()),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Login page address that brings the user back to `path` afterwards.
pub fn login_redirect(path: &str) -> Redirect {
    Redirect::to(&format!("/login?return_url={}", urlencoding::encode(path)))
}

/// Only same-site absolute paths are accepted as post-login destinations.
pub fn safe_return_url(url: Option<&str>) -> Option<&str> {
    url.filter(|url| url.starts_with('/') && !url.starts_with("//") && !url.starts_with("/\\"))
}
