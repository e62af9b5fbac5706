use axum::{
    debug_handler,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use time::OffsetDateTime;

use crate::{
    AppResult, AppState,
    api::ApiClient,
    include_res, login_redirect,
    res::{self, escape},
    session::SessionStore,
};

use super::{
    MAX_MESSAGE_CHARS, TranscriptSettings,
    list::{ConversationList, ConversationSummary, ListOutcome},
};

#[debug_handler(state = AppState)]
pub(crate) async fn conversations(
    State(api): State<ApiClient>,
    State(settings): State<TranscriptSettings>,
    store: SessionStore,
) -> AppResult<Response> {
    let session = store.current().await?;

    let mut list = ConversationList::default();
    let outcome = list
        .load(&api, session.as_ref(), OffsetDateTime::now_utc(), settings.offset)
        .await;
    if outcome == ListOutcome::Unauthenticated {
        store.sign_out().await?;
        return Ok(login_redirect("/messages").into_response());
    }

    let rows = list.conversations();
    let rows_html = if rows.is_empty() {
        include_res!(str, "/pages/messages/empty.html").to_owned()
    } else {
        rows.iter().map(|row| row_html(&api, row)).collect()
    };
    let count = match rows.len() {
        1 => "1 conversation".to_owned(),
        n => format!("{n} conversations"),
    };

    let body = include_res!(str, "/pages/messages/list.html")
        .replace("{count}", &count)
        .replace("{error}", &escape(list.error().unwrap_or("")))
        .replace("{rows}", &rows_html);
    Ok(res::page("Messages", session.as_ref(), &body).into_response())
}

fn row_html(api: &ApiClient, row: &ConversationSummary) -> String {
    let conv = &row.conversation;
    let thumb = match &conv.listing_image {
        Some(image) => format!(
            r#"<img class="thumb" src="{}" alt="{}">"#,
            escape(&api.upload_url(image)),
            escape(&conv.listing_title)
        ),
        None => r#"<div class="thumb"></div>"#.to_owned(),
    };

    include_res!(str, "/pages/messages/row.html")
        .replace("{id}", &conv.id.to_string())
        .replace("{thumb}", &thumb)
        .replace("{other_username}", &escape(&conv.other_username))
        .replace("{activity}", &escape(&row.activity))
        .replace("{listing_title}", &escape(&conv.listing_title))
        .replace("{preview}", &escape(&row.preview))
}

#[debug_handler(state = AppState)]
pub(crate) async fn transcript(
    Path(conversation_id): Path<i64>,
    State(api): State<ApiClient>,
    store: SessionStore,
) -> AppResult<Response> {
    let Some(session) = store.current().await? else {
        return Ok(login_redirect(&format!("/messages/{conversation_id}")).into_response());
    };

    let body = include_res!(str, "/pages/messages/transcript.html")
        .replace("{conversation_id}", &conversation_id.to_string())
        .replace("{uploads_url}", &escape(&api.upload_url("")))
        .replace("{max_chars}", &MAX_MESSAGE_CHARS.to_string());
    Ok(res::page("Conversation", Some(&session), &body).into_response())
}
