use thiserror::Error;

use crate::model::ApiErrorBody;

#[derive(Debug, Error)]
pub enum ApiError {
    /// 401/403: the bearer token is missing, expired or rejected.
    #[error("not authorized (HTTP {0})")]
    Unauthorized(u16),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub(crate) fn from_status(status: u16, body: ApiErrorBody) -> Self {
        let message = describe(status, body);
        match status {
            401 | 403 => Self::Unauthorized(status),
            404 => Self::NotFound(message),
            _ => Self::Rejected { status, message },
        }
    }

    /// Whether the stored session should be treated as invalid.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Short text suitable for showing next to a form.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized(_) => "Your session has expired. Please sign in again.".to_owned(),
            Self::NotFound(message) | Self::Rejected { message, .. } => message.clone(),
            Self::Transport(_) => "Could not reach the server. Please try again.".to_owned(),
            Self::Decode(_) => "The server sent an unexpected response.".to_owned(),
        }
    }
}

fn describe(status: u16, body: ApiErrorBody) -> String {
    if let Some(errors) = body.errors.filter(|errors| !errors.is_empty()) {
        return errors.into_values().collect::<Vec<_>>().join("; ");
    }
    body.message
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("request failed with status {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: &str) -> ApiErrorBody {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn auth_statuses_invalidate_the_session() {
        assert!(ApiError::from_status(401, ApiErrorBody::default()).is_auth());
        assert!(ApiError::from_status(403, ApiErrorBody::default()).is_auth());
        assert!(!ApiError::from_status(404, ApiErrorBody::default()).is_auth());
        assert!(!ApiError::from_status(500, ApiErrorBody::default()).is_auth());
    }

    #[test]
    fn validation_errors_are_joined() {
        let err = ApiError::from_status(
            400,
            body(r#"{"message":"Validation failed","status":400,"errors":{"content":"Message must be less than 2000 characters"}}"#),
        );
        assert_eq!(err.user_message(), "Message must be less than 2000 characters");
    }

    #[test]
    fn falls_back_to_message_then_status() {
        let err = ApiError::from_status(500, body(r#"{"message":"Conversation not found"}"#));
        assert_eq!(err.user_message(), "Conversation not found");

        let err = ApiError::from_status(502, ApiErrorBody::default());
        assert_eq!(err.user_message(), "request failed with status 502");
    }
}
