use axum::{
    Router, debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};

use crate::{
    AppResult, AppState,
    api::{ApiClient, ApiError},
    format, include_res, login_redirect,
    model::{AuthSession, Listing},
    res::{self, escape},
    session::SessionStore,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(listing))
        .route("/{id}/contact", post(contact_seller))
}

/// The listing a conversation is about, with a way to reach its seller.
#[debug_handler(state = AppState)]
pub(crate) async fn listing(
    Path(listing_id): Path<i64>,
    State(api): State<ApiClient>,
    store: SessionStore,
) -> AppResult<Response> {
    let session = store.current().await?;

    match api.listing(listing_id).await {
        Ok(listing) => {
            let body = listing_html(&api, &listing, session.as_ref());
            Ok(res::page(&listing.title, session.as_ref(), &body).into_response())
        }
        Err(err) => {
            tracing::info!(listing_id, "could not load listing: {err}");
            Ok(res::notice(error_status(&err), "Listing unavailable", &err.user_message(), session.as_ref()))
        }
    }
}

fn listing_html(api: &ApiClient, listing: &Listing, session: Option<&AuthSession>) -> String {
    let image = match &listing.image {
        Some(image) => format!(
            r#"<img class="thumb" style="width:160px;height:120px" src="{}" alt="{}">"#,
            escape(&api.upload_url(image)),
            escape(&listing.title)
        ),
        None => String::new(),
    };
    let contact = match session {
        Some(auth) if auth.user_id == listing.user_id => String::new(),
        _ => include_res!(str, "/pages/contact.html").replace("{id}", &listing.id.to_string()),
    };

    include_res!(str, "/pages/listing.html")
        .replace("{image}", &image)
        .replace("{title}", &escape(&listing.title))
        .replace("{price}", &escape(&format::price(listing.price)))
        .replace("{location}", &escape(&listing.location))
        .replace("{category}", &escape(&listing.category_name))
        .replace("{seller}", &escape(&listing.username))
        .replace("{description}", &escape(&listing.description))
        .replace("{contact}", &contact)
}

fn error_status(err: &ApiError) -> StatusCode {
    match err {
        ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        ApiError::Rejected { status, .. } if *status < 500 => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST)
        }
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// Opens the conversation with a listing's seller, creating it on first contact.
#[debug_handler(state = AppState)]
pub(crate) async fn contact_seller(
    Path(listing_id): Path<i64>,
    State(api): State<ApiClient>,
    store: SessionStore,
) -> AppResult<Response> {
    let Some(session) = store.current().await? else {
        return Ok(login_redirect(&format!("/listings/{listing_id}")).into_response());
    };

    match api.start_conversation(&session.token, listing_id).await {
        Ok(conversation) => Ok(Redirect::to(&format!("/messages/{}", conversation.id)).into_response()),
        Err(err) if err.is_auth() => {
            store.sign_out().await?;
            Ok(login_redirect("/messages").into_response())
        }
        Err(err) => {
            tracing::info!(listing_id, "could not start conversation: {err}");
            let status = error_status(&err);
            Ok(res::notice(status, "Could not contact the seller", &err.user_message(), Some(&session)))
        }
    }
}
