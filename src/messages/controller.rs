//! Lifecycle of one open conversation view.
//!
//! [`mount`] loads the conversation and its history, then starts a poller that
//! folds fresh history into the transcript every `poll_interval`. The returned
//! [`TranscriptHandle`] owns the poller; dropping or tearing it down stops the
//! timer, and results that land afterwards are discarded.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde::Serialize;
use thiserror::Error;
use time::{OffsetDateTime, UtcOffset};
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
    time::{Instant, Interval, MissedTickBehavior},
};

use crate::{
    api::{ApiError, MessagesApi},
    model::{AuthSession, Conversation, Message},
    session::{SessionBus, SessionEvent, signed_out},
};

use super::{
    composer::{Composer, ComposerView},
    transcript::{DateGroupView, merge_messages, render_groups},
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct TranscriptSettings {
    pub poll_interval: Duration,
    /// Offset whose calendar decides date groups and clock labels.
    pub offset: UtcOffset,
}

impl Default for TranscriptSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            offset: UtcOffset::UTC,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptPhase {
    Loading,
    Ready,
    Error,
    Unauthenticated,
}

#[derive(Debug, Error)]
pub enum MountError {
    #[error("no signed-in session")]
    Unauthenticated,

    #[error("conversation {conversation_id} could not be loaded: {source}")]
    Unavailable {
        conversation_id: i64,
        #[source]
        source: ApiError,
    },
}

impl MountError {
    /// Where the browser goes after a failed mount.
    pub fn redirect_to(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "/login",
            Self::Unavailable { .. } => "/messages",
        }
    }

    pub fn is_auth(&self) -> bool {
        match self {
            Self::Unauthenticated => true,
            Self::Unavailable { source, .. } => source.is_auth(),
        }
    }
}

/// Snapshot pushed to the browser after every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptView {
    pub phase: TranscriptPhase,
    pub conversation: Option<Conversation>,
    pub groups: Vec<DateGroupView>,
    /// Bumped whenever the message sequence changes; the browser scrolls to
    /// the newest message when it sees a new value.
    pub revision: u64,
    pub composer: ComposerView,
}

impl TranscriptView {
    pub fn loading() -> Self {
        Self {
            phase: TranscriptPhase::Loading,
            conversation: None,
            groups: Vec::new(),
            revision: 0,
            composer: Composer::default().view(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent(Message),
    /// Blank text, a send already in flight, or the view is gone.
    Ignored,
    Failed(String),
}

struct TranscriptState {
    phase: TranscriptPhase,
    conversation: Conversation,
    messages: Vec<Message>,
    revision: u64,
    composer: Composer,
    live: bool,
}

impl TranscriptState {
    fn replace_messages(&mut self, merged: Vec<Message>) {
        if merged != self.messages {
            self.messages = merged;
            self.revision += 1;
        }
    }
}

struct Shared {
    state: Mutex<TranscriptState>,
    views: watch::Sender<TranscriptView>,
    viewer_id: i64,
    offset: UtcOffset,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, TranscriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `f` and publishes, unless the view was torn down.
    fn update<R>(&self, f: impl FnOnce(&mut TranscriptState) -> R) -> Option<R> {
        let mut state = self.lock();
        if !state.live {
            return None;
        }
        let out = f(&mut state);
        self.views.send_replace(self.render(&state));
        Some(out)
    }

    fn render(&self, state: &TranscriptState) -> TranscriptView {
        TranscriptView {
            phase: state.phase,
            conversation: Some(state.conversation.clone()),
            groups: render_groups(&state.messages, self.viewer_id, self.offset, OffsetDateTime::now_utc()),
            revision: state.revision,
            composer: state.composer.view(),
        }
    }

    fn retire(&self) {
        self.lock().live = false;
    }
}

/// Loads conversation `conversation_id` for `session` and starts polling.
///
/// Both the conversation and its history must load; if either fails the view
/// is abandoned with [`MountError::Unavailable`].
pub async fn mount(
    api: Arc<dyn MessagesApi>,
    session: Option<AuthSession>,
    conversation_id: i64,
    settings: TranscriptSettings,
    bus: &SessionBus,
) -> Result<TranscriptHandle, MountError> {
    let Some(auth) = session else {
        return Err(MountError::Unauthenticated);
    };

    // subscribe before loading so a sign-out during the fetch is not missed
    let session_events = bus.subscribe();

    let (conversation, messages) = tokio::try_join!(
        api.get_conversation(&auth.token, conversation_id),
        api.list_messages(&auth.token, conversation_id),
    )
    .map_err(|source| MountError::Unavailable { conversation_id, source })?;

    let state = TranscriptState {
        phase: TranscriptPhase::Ready,
        conversation,
        messages: merge_messages(&[], messages),
        revision: 1,
        composer: Composer::default(),
        live: true,
    };
    let shared = Arc::new(Shared {
        state: Mutex::new(state),
        views: watch::channel(TranscriptView::loading()).0,
        viewer_id: auth.user_id,
        offset: settings.offset,
    });
    shared.views.send_replace(shared.render(&shared.lock()));

    tracing::info!(conversation_id, user_id = auth.user_id, "transcript mounted");

    let poller = tokio::spawn(poll(
        shared.clone(),
        api.clone(),
        auth.clone(),
        conversation_id,
        settings.poll_interval,
        session_events,
    ));

    Ok(TranscriptHandle {
        sender: TranscriptSender { shared, api, auth, conversation_id },
        poller: Some(poller),
    })
}

async fn poll(
    shared: Arc<Shared>,
    api: Arc<dyn MessagesApi>,
    auth: AuthSession,
    conversation_id: i64,
    period: Duration,
    mut session_events: broadcast::Receiver<SessionEvent>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let fetched = tokio::select! {
            biased;
            _ = signed_out(&mut session_events, auth.user_id) => break,
            fetched = next_poll(&mut ticker, api.as_ref(), &auth.token, conversation_id) => fetched,
        };

        match fetched {
            Ok(messages) => {
                shared.update(|state| {
                    let merged = merge_messages(&state.messages, messages);
                    state.replace_messages(merged);
                });
            }
            Err(err) if err.is_auth() => {
                tracing::warn!(conversation_id, "poll rejected the session: {err}");
                break;
            }
            Err(err) => tracing::warn!(conversation_id, "poll failed: {err}"),
        }
    }

    shared.update(|state| state.phase = TranscriptPhase::Unauthenticated);
    tracing::debug!(conversation_id, "polling stopped");
}

async fn next_poll(
    ticker: &mut Interval,
    api: &dyn MessagesApi,
    token: &str,
    conversation_id: i64,
) -> Result<Vec<Message>, ApiError> {
    ticker.tick().await;
    api.list_messages(token, conversation_id).await
}

/// Cloneable send path into a mounted transcript.
#[derive(Clone)]
pub struct TranscriptSender {
    shared: Arc<Shared>,
    api: Arc<dyn MessagesApi>,
    auth: AuthSession,
    conversation_id: i64,
}

impl TranscriptSender {
    /// Sends `text` as a new message.
    ///
    /// Blank text and calls made while another send is outstanding are
    /// ignored without a request. On success the server's copy of the message
    /// joins the transcript and the draft is cleared; on failure the draft is
    /// kept and the error shown.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let Some(content) = self.shared.update(|state| state.composer.begin(text)).flatten() else {
            return SendOutcome::Ignored;
        };
        let _settle = SettleOnDrop(&self.shared);

        match self.api.send_message(&self.auth.token, self.conversation_id, &content).await {
            Ok(message) => {
                self.shared.update(|state| {
                    state.composer.succeed();
                    let merged = merge_messages(&state.messages, vec![message.clone()]);
                    state.replace_messages(merged);
                });
                SendOutcome::Sent(message)
            }
            Err(err) => {
                tracing::warn!(conversation_id = self.conversation_id, "send failed: {err}");
                let shown = err.user_message();
                self.shared.update(|state| {
                    state.composer.fail(shown.clone());
                    if err.is_auth() {
                        state.phase = TranscriptPhase::Unauthenticated;
                    }
                });
                SendOutcome::Failed(shown)
            }
        }
    }
}

/// Re-enables sending however the send future ends, including cancellation.
struct SettleOnDrop<'a>(&'a Shared);

impl Drop for SettleOnDrop<'_> {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        if state.live && state.composer.is_sending() {
            state.composer.settle();
            self.0.views.send_replace(self.0.render(&state));
        }
    }
}

/// An open transcript. Polling stops when this is torn down or dropped.
pub struct TranscriptHandle {
    sender: TranscriptSender,
    poller: Option<JoinHandle<()>>,
}

impl TranscriptHandle {
    pub fn conversation_id(&self) -> i64 {
        self.sender.conversation_id
    }

    pub fn subscribe(&self) -> watch::Receiver<TranscriptView> {
        self.sender.shared.views.subscribe()
    }

    pub fn view(&self) -> TranscriptView {
        self.sender.shared.views.borrow().clone()
    }

    pub fn phase(&self) -> TranscriptPhase {
        self.sender.shared.lock().phase
    }

    pub fn messages(&self) -> Vec<Message> {
        self.sender.shared.lock().messages.clone()
    }

    pub fn composer(&self) -> Composer {
        self.sender.shared.lock().composer.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(|poller| !poller.is_finished())
    }

    pub fn sender(&self) -> TranscriptSender {
        self.sender.clone()
    }

    pub async fn send(&self, text: &str) -> SendOutcome {
        self.sender.send(text).await
    }

    /// Stops polling and detaches the view. Safe to call more than once.
    pub fn teardown(&mut self) {
        let Some(poller) = self.poller.take() else {
            return;
        };
        poller.abort();
        self.sender.shared.retire();
        tracing::debug!(conversation_id = self.sender.conversation_id, "transcript torn down");
    }
}

impl Drop for TranscriptHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}
