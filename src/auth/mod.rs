mod login;
mod logout;

use axum::{Router, routing::get};

use crate::AppState;

pub use login::{login, login_page, register};
pub use logout::logout;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login::login_page).post(login::login))
        .route("/register", axum::routing::post(login::register))
        .route("/logout", get(logout::logout))
}
