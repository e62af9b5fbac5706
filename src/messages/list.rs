use serde::Serialize;
use time::{OffsetDateTime, UtcOffset};

use crate::{
    api::MessagesApi,
    format::relative_time,
    model::{AuthSession, Conversation},
};

pub const EMPTY_PREVIEW: &str = "No messages yet — say hello!";

/// One row of the conversation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub activity: String,
    pub preview: String,
}

impl ConversationSummary {
    pub fn new(conversation: Conversation, now: OffsetDateTime, offset: UtcOffset) -> Self {
        let activity = relative_time(conversation.active_at(), now, offset);
        let preview = conversation
            .last_message
            .clone()
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| EMPTY_PREVIEW.to_owned());
        Self { conversation, activity, preview }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOutcome {
    Loaded,
    /// No usable session; the caller sends the browser to the login page.
    Unauthenticated,
}

/// The signed-in user's conversations, most recently active first as the
/// server orders them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationList {
    loading: bool,
    conversations: Vec<ConversationSummary>,
    error: Option<String>,
}

impl Default for ConversationList {
    fn default() -> Self {
        Self { loading: true, conversations: Vec::new(), error: None }
    }
}

impl ConversationList {
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Fetches the list once. A failed fetch leaves the list empty; it is
    /// not retried.
    pub async fn load(
        &mut self,
        api: &dyn MessagesApi,
        session: Option<&AuthSession>,
        now: OffsetDateTime,
        offset: UtcOffset,
    ) -> ListOutcome {
        let Some(auth) = session else {
            self.loading = false;
            return ListOutcome::Unauthenticated;
        };

        self.loading = true;
        let fetched = api.list_conversations(&auth.token).await;
        self.loading = false;

        match fetched {
            Ok(conversations) => {
                self.error = None;
                self.conversations = conversations
                    .into_iter()
                    .map(|conversation| ConversationSummary::new(conversation, now, offset))
                    .collect();
                ListOutcome::Loaded
            }
            Err(err) => {
                tracing::warn!(user_id = auth.user_id, "failed to fetch conversations: {err}");
                self.conversations.clear();
                self.error = Some(err.user_message());
                if err.is_auth() {
                    ListOutcome::Unauthenticated
                } else {
                    ListOutcome::Loaded
                }
            }
        }
    }
}
