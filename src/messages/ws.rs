use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message as Frame, WebSocket},
    },
    response::Response,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::{AppState, api::{ApiClient, MessagesApi}, session::SessionStore};

use super::{TranscriptPhase, TranscriptSettings, TranscriptView, controller};

/// Frames pushed to the browser.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ServerEvent {
    Transcript(TranscriptView),
    Redirect { to: &'static str },
}

/// Frames the browser sends.
#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ClientCommand {
    Send { content: String },
}

/// Mounts the transcript for as long as the socket stays open.
#[debug_handler(state = AppState)]
pub(crate) async fn transcript_ws(
    Path(conversation_id): Path<i64>,
    State(api): State<ApiClient>,
    State(settings): State<TranscriptSettings>,
    store: SessionStore,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket: WebSocket| {
        let (sender, receiver) = socket.split();
        serve(sender, receiver, Arc::new(api), store, settings, conversation_id)
    })
}

/// Drives one mounted transcript over a frame sink and stream.
///
/// This runs after the upgrade response has left, so every session change made
/// here is persisted explicitly.
pub(crate) async fn serve<Tx, Rx>(
    mut sender: Tx,
    mut receiver: Rx,
    api: Arc<dyn MessagesApi>,
    store: SessionStore,
    settings: TranscriptSettings,
    conversation_id: i64,
) where
    Tx: Sink<Frame, Error = axum::Error> + Unpin + Send + 'static,
    Rx: Stream<Item = Result<Frame, axum::Error>> + Unpin,
{
    let session = match store.current().await {
        Ok(session) => session,
        Err(err) => {
            tracing::warn!("could not read session: {}", err.0);
            None
        }
    };
    persist(&store).await;

    if send_event(&mut sender, &ServerEvent::Transcript(TranscriptView::loading())).await.is_err() {
        return;
    }

    let mut handle = match controller::mount(api, session, conversation_id, settings, store.bus()).await {
        Ok(handle) => handle,
        Err(err) => {
            tracing::info!("transcript not opened: {err}");
            if err.is_auth() {
                sign_out(&store).await;
            }
            let _ = send_event(&mut sender, &ServerEvent::Redirect { to: err.redirect_to() }).await;
            return;
        }
    };

    let mut views = handle.subscribe();
    let mut forward = tokio::spawn(async move {
        loop {
            let view = views.borrow_and_update().clone();
            if view.phase == TranscriptPhase::Unauthenticated {
                sign_out(&store).await;
                let _ = send_event(&mut sender, &ServerEvent::Redirect { to: "/login" }).await;
                break;
            }
            if send_event(&mut sender, &ServerEvent::Transcript(view)).await.is_err() {
                break;
            }
            if views.changed().await.is_err() {
                break;
            }
        }
    });

    let transcript = handle.sender();
    loop {
        let frame = tokio::select! {
            _ = &mut forward => break,
            frame = receiver.next() => frame,
        };

        let text = match frame {
            Some(Ok(Frame::Text(text))) => text,
            Some(Ok(Frame::Close(_))) | Some(Err(_)) | None => break,
            Some(Ok(_)) => continue,
        };

        match serde_json::from_str::<ClientCommand>(text.as_str()) {
            Ok(ClientCommand::Send { content }) => {
                let transcript = transcript.clone();
                tokio::spawn(async move {
                    transcript.send(&content).await;
                });
            }
            Err(err) => tracing::debug!(conversation_id, "ignoring malformed frame: {err}"),
        }
    }

    handle.teardown();
    forward.abort();
}

async fn sign_out(store: &SessionStore) {
    if let Err(err) = store.sign_out().await {
        tracing::warn!("could not clear session: {}", err.0);
    }
    persist(store).await;
}

async fn persist(store: &SessionStore) {
    if let Err(err) = store.persist().await {
        tracing::warn!("could not save session: {}", err.0);
    }
}

async fn send_event<S>(sender: &mut S, event: &ServerEvent) -> Result<(), axum::Error>
where
    S: Sink<Frame, Error = axum::Error> + Unpin,
{
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(err) => {
            tracing::error!("could not encode frame: {err}");
            return Ok(());
        }
    };
    sender.send(Frame::Text(json.into())).await
}

#[cfg(test)]
mod tests {
    use std::{
        pin::Pin,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use futures_util::{sink, stream};
    use tokio::sync::{mpsc, oneshot};
    use time::macros::datetime;
    use tower_sessions::{MemoryStore, Session};

    use crate::{
        api::{ApiError, ApiResult},
        model::{AuthResponse, Conversation, Message},
        session::SessionBus,
    };

    use super::*;

    struct Inbox {
        missing: bool,
        /// Rejects every history load after the first.
        revoked: bool,
        loads: AtomicUsize,
    }

    impl Inbox {
        fn new() -> Self {
            Self { missing: false, revoked: false, loads: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl MessagesApi for Inbox {
        async fn list_conversations(&self, _token: &str) -> ApiResult<Vec<Conversation>> {
            Ok(vec![conversation()])
        }

        async fn get_conversation(&self, _token: &str, _id: i64) -> ApiResult<Conversation> {
            if self.missing {
                return Err(ApiError::NotFound("Conversation not found".to_owned()));
            }
            Ok(conversation())
        }

        async fn list_messages(&self, _token: &str, _id: i64) -> ApiResult<Vec<Message>> {
            if self.loads.fetch_add(1, Ordering::SeqCst) > 0 && self.revoked {
                return Err(ApiError::Unauthorized(401));
            }
            Ok(vec![Message {
                id: 1,
                conversation_id: 7,
                sender_id: 2,
                sender_username: "vesa".to_owned(),
                content: "Still available?".to_owned(),
                sent_at: datetime!(2024-01-02 09:00:00 UTC),
            }])
        }

        async fn send_message(&self, _token: &str, _id: i64, _content: &str) -> ApiResult<Message> {
            Err(ApiError::Unauthorized(401))
        }
    }

    fn conversation() -> Conversation {
        Conversation {
            id: 7,
            listing_id: 40,
            listing_title: "Mountain bike".to_owned(),
            listing_image: None,
            other_user_id: 2,
            other_username: "vesa".to_owned(),
            last_message: None,
            last_message_at: None,
            created_at: datetime!(2024-01-01 08:00:00 UTC),
        }
    }

    async fn signed_in() -> SessionStore {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        let store = SessionStore::new(session, SessionBus::default());
        store
            .sign_in(AuthResponse {
                token: "tok".to_owned(),
                user_id: 1,
                username: "arben".to_owned(),
                email: "a@example.com".to_owned(),
                role: "USER".to_owned(),
            })
            .await
            .unwrap();
        store
    }

    fn json(frame: Frame) -> serde_json::Value {
        match frame {
            Frame::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("unexpected frame {other:?}"),
        }
    }

    type FrameSink = Pin<Box<dyn Sink<Frame, Error = axum::Error> + Send>>;

    fn frames() -> (FrameSink, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = sink::unfold(tx, |tx, frame: Frame| async move {
            tx.send(frame).map_err(axum::Error::new)?;
            Ok::<_, axum::Error>(tx)
        });
        (Box::pin(sink), rx)
    }

    async fn drain(mut rx: mpsc::UnboundedReceiver<Frame>) -> Vec<serde_json::Value> {
        let mut sent = Vec::new();
        while let Some(frame) = rx.recv().await {
            sent.push(json(frame));
        }
        sent
    }

    #[tokio::test(start_paused = true)]
    async fn loading_then_ready_until_closed() {
        let store = signed_in().await;
        let (tx, mut rx) = frames();
        let (close, closed) = oneshot::channel::<()>();
        let inbound = Box::pin(stream::once(async move {
            let _ = closed.await;
            Ok(Frame::Close(None))
        }));

        let task = tokio::spawn(serve(
            tx,
            inbound,
            Arc::new(Inbox::new()),
            store.clone(),
            TranscriptSettings::default(),
            7,
        ));

        let first = json(rx.recv().await.unwrap());
        assert_eq!(first["type"], "transcript");
        assert_eq!(first["phase"], "loading");

        let second = json(rx.recv().await.unwrap());
        assert_eq!(second["type"], "transcript");
        assert_eq!(second["phase"], "ready");
        assert_eq!(second["conversation"]["otherUsername"], "vesa");

        close.send(()).unwrap();
        task.await.unwrap();
        assert!(store.current().await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_mount_redirects_to_the_inbox() {
        let store = signed_in().await;
        let (tx, rx) = frames();
        let api = Inbox { missing: true, ..Inbox::new() };

        serve(tx, stream::pending(), Arc::new(api), store.clone(), TranscriptSettings::default(), 7).await;

        let sent = drain(rx).await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["phase"], "loading");
        assert_eq!(sent[1], serde_json::json!({"type": "redirect", "to": "/messages"}));
        assert!(store.current().await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_session_redirects_to_login() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        let store = SessionStore::new(session, SessionBus::default());
        let (tx, rx) = frames();

        serve(tx, stream::pending(), Arc::new(Inbox::new()), store, TranscriptSettings::default(), 7).await;

        let sent = drain(rx).await;
        assert_eq!(sent.last(), Some(&serde_json::json!({"type": "redirect", "to": "/login"})));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_poll_signs_out_and_redirects() {
        let store = signed_in().await;
        let (tx, rx) = frames();
        let api = Inbox { revoked: true, ..Inbox::new() };

        serve(tx, stream::pending(), Arc::new(api), store.clone(), TranscriptSettings::default(), 7).await;

        let sent = drain(rx).await;
        assert_eq!(sent.last(), Some(&serde_json::json!({"type": "redirect", "to": "/login"})));
        assert_eq!(store.current().await.unwrap(), None);
    }

    #[test]
    fn commands_are_type_tagged() {
        let cmd: ClientCommand = serde_json::from_str(r#"{"type":"send","content":"Hello"}"#).unwrap();
        assert_eq!(cmd, ClientCommand::Send { content: "Hello".to_owned() });
        assert!(serde_json::from_str::<ClientCommand>(r#"{"type":"shout"}"#).is_err());
    }

    #[test]
    fn events_flatten_the_view() {
        let json = serde_json::to_value(ServerEvent::Transcript(TranscriptView::loading())).unwrap();
        assert_eq!(json["type"], "transcript");
        assert_eq!(json["phase"], "loading");
        assert_eq!(json["composer"]["maxChars"], 2000);

        let json = serde_json::to_value(ServerEvent::Redirect { to: "/messages" }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "redirect", "to": "/messages"}));
    }
}
