mod composer;
mod controller;
mod list;
mod page;
mod transcript;
mod ws;

use axum::{Router, routing::get};

use crate::AppState;

pub use composer::{Composer, ComposerView, MAX_MESSAGE_CHARS};
pub use controller::{
    DEFAULT_POLL_INTERVAL, MountError, SendOutcome, TranscriptHandle, TranscriptPhase,
    TranscriptSender, TranscriptSettings, TranscriptView, mount,
};
pub use list::{ConversationList, ConversationSummary, EMPTY_PREVIEW, ListOutcome};
pub use transcript::{DateGroup, DateGroupView, MessageView, group_by_date, merge_messages, render_groups};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(page::conversations))
        .route("/{id}", get(page::transcript))
        .route("/{id}/ws", get(ws::transcript_ws))
}
