use axum::{debug_handler, response::Redirect};

use crate::{AppResult, session::SessionStore};

#[debug_handler(state = crate::AppState)]
pub async fn logout(store: SessionStore) -> AppResult<Redirect> {
    store.sign_out().await?;
    Ok(Redirect::to("/login"))
}
