//! Client for the marketplace HTTP API.

mod error;
mod listings;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::model::{
    ApiErrorBody, AuthResponse, Conversation, LoginRequest, Message, RegisterRequest,
    SendMessageRequest,
};

pub use error::ApiError;

pub type ApiResult<T> = Result<T, ApiError>;

/// The messaging calls the conversation views depend on.
#[async_trait]
pub trait MessagesApi: Send + Sync {
    async fn list_conversations(&self, token: &str) -> ApiResult<Vec<Conversation>>;

    async fn get_conversation(&self, token: &str, conversation_id: i64) -> ApiResult<Conversation>;

    /// Full history, oldest first.
    async fn list_messages(&self, token: &str, conversation_id: i64) -> ApiResult<Vec<Message>>;

    async fn send_message(&self, token: &str, conversation_id: i64, content: &str) -> ApiResult<Message>;
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let http = reqwest::ClientBuilder::new()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { http, base_url })
    }

    /// Public address of an uploaded listing image.
    pub fn upload_url(&self, file_name: &str) -> String {
        format!("{}/uploads/{file_name}", self.base_url)
    }

    pub async fn login(&self, request: &LoginRequest) -> ApiResult<AuthResponse> {
        let req = self.request(Method::POST, "/api/auth/login", None).json(request);
        decode(req.send().await?).await
    }

    pub async fn register(&self, request: &RegisterRequest) -> ApiResult<AuthResponse> {
        let req = self.request(Method::POST, "/api/auth/register", None).json(request);
        decode(req.send().await?).await
    }

    /// Opens (or reuses) the caller's conversation with a listing's seller.
    pub async fn start_conversation(&self, token: &str, listing_id: i64) -> ApiResult<Conversation> {
        let req = self
            .request(Method::POST, "/api/messages/conversations", Some(token))
            .query(&[("listingId", listing_id)]);
        decode(req.send().await?).await
    }

    pub(crate) fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let req = self.http.request(method, format!("{}{path}", self.base_url));
        match token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, token: &str) -> ApiResult<T> {
        decode(self.request(Method::GET, path, Some(token)).send().await?).await
    }
}

#[async_trait]
impl MessagesApi for ApiClient {
    async fn list_conversations(&self, token: &str) -> ApiResult<Vec<Conversation>> {
        self.get("/api/messages/conversations", token).await
    }

    async fn get_conversation(&self, token: &str, conversation_id: i64) -> ApiResult<Conversation> {
        self.get(&format!("/api/messages/conversations/{conversation_id}"), token).await
    }

    async fn list_messages(&self, token: &str, conversation_id: i64) -> ApiResult<Vec<Message>> {
        self.get(&format!("/api/messages/conversations/{conversation_id}/messages"), token).await
    }

    async fn send_message(&self, token: &str, conversation_id: i64, content: &str) -> ApiResult<Message> {
        let req = self
            .request(
                Method::POST,
                &format!("/api/messages/conversations/{conversation_id}/messages"),
                Some(token),
            )
            .json(&SendMessageRequest { content });
        decode(req.send().await?).await
    }
}

pub(crate) async fn decode<T: DeserializeOwned>(resp: Response) -> ApiResult<T> {
    let resp = check(resp).await?;
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Turns non-2xx responses into [`ApiError`]s.
pub(crate) async fn check(resp: Response) -> ApiResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body: ApiErrorBody = resp
        .bytes()
        .await
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default();
    Err(ApiError::from_status(status.as_u16(), body))
}
