use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use pulldown_cmark_escape::escape_html;

use crate::model::AuthSession;

#[macro_export]
macro_rules! include_res {
    (bytes, $p:expr) => {
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
    (str, $p:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
}

/// Wraps a page body in the site layout.
pub fn page(title: &str, session: Option<&AuthSession>, body: &str) -> Html<String> {
    let nav = match session {
        Some(auth) if auth.is_admin() => {
            format!("{} (admin) · <a href=\"/logout\">Sign out</a>", escape(&auth.username))
        }
        Some(auth) => format!("{} · <a href=\"/logout\">Sign out</a>", escape(&auth.username)),
        None => "<a href=\"/login\">Sign in</a>".to_owned(),
    };

    Html(
        include_res!(str, "/pages/layout.html")
            .replace("{title}", &escape(title))
            .replace("{nav}", &nav)
            .replace("{body}", body),
    )
}

/// A short explanation page, e.g. when a conversation cannot be opened.
pub fn notice(status: StatusCode, heading: &str, message: &str, session: Option<&AuthSession>) -> Response {
    let body = include_res!(str, "/pages/notice.html")
        .replace("{heading}", &escape(heading))
        .replace("{message}", &escape(message));
    (status, page(heading, session, &body)).into_response()
}

/// Escapes text for element bodies and double-quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let _ = escape_html(&mut out, text);
    out
}
