use axum::{
    Form, debug_handler,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::{
    AppResult, AppState,
    api::{ApiClient, ApiError},
    include_res,
    model::{AuthResponse, LoginRequest, RegisterRequest},
    res, safe_return_url,
    session::SessionStore,
};

#[derive(Deserialize)]
pub struct LoginQuery {
    pub return_url: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[debug_handler(state = AppState)]
pub async fn login_page(
    Query(LoginQuery { return_url }): Query<LoginQuery>,
    store: SessionStore,
) -> AppResult<Response> {
    if store.current().await?.is_some() {
        let dest = safe_return_url(return_url.as_deref()).unwrap_or("/messages");
        return Ok(Redirect::to(dest).into_response());
    }

    if let Some(return_url) = safe_return_url(return_url.as_deref()) {
        store.set_return_url(return_url).await?;
    }

    Ok(login_form(StatusCode::OK, ""))
}

#[debug_handler(state = AppState)]
pub async fn login(
    State(api): State<ApiClient>,
    store: SessionStore,
    Form(LoginForm { username, password }): Form<LoginForm>,
) -> AppResult<Response> {
    match api.login(&LoginRequest { username, password }).await {
        Ok(response) => signed_in(&store, response).await,
        Err(err) => {
            tracing::info!("login rejected: {err}");
            Ok(login_form(StatusCode::UNAUTHORIZED, &auth_failure(&err)))
        }
    }
}

#[debug_handler(state = AppState)]
pub async fn register(
    State(api): State<ApiClient>,
    store: SessionStore,
    Form(RegisterForm { username, email, password }): Form<RegisterForm>,
) -> AppResult<Response> {
    match api.register(&RegisterRequest { username, email, password }).await {
        Ok(response) => signed_in(&store, response).await,
        Err(err) => {
            tracing::info!("registration rejected: {err}");
            Ok(login_form(StatusCode::BAD_REQUEST, &auth_failure(&err)))
        }
    }
}

async fn signed_in(store: &SessionStore, response: AuthResponse) -> AppResult<Response> {
    let return_url = store.take_return_url().await?;
    store.sign_in(response).await?;

    let dest = safe_return_url(return_url.as_deref()).unwrap_or("/messages");
    Ok(Redirect::to(dest).into_response())
}

fn auth_failure(err: &ApiError) -> String {
    match err {
        ApiError::Unauthorized(_) => "Invalid username or password.".to_owned(),
        err => err.user_message(),
    }
}

fn login_form(status: StatusCode, error: &str) -> Response {
    let body = include_res!(str, "/pages/login.html").replace("{error}", &res::escape(error));
    (status, res::page("Sign in", None, &body)).into_response()
}
