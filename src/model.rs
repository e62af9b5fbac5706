use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The signed-in identity held for one browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub token: String,
}

impl AuthSession {
    pub fn is_admin(&self) -> bool {
        self.role == "ADMIN"
    }
}

impl From<AuthResponse> for AuthSession {
    fn from(AuthResponse { token, user_id, username, email, role }: AuthResponse) -> Self {
        Self { user_id, username, email, role, token }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// A 1:1 thread with another user about one listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: i64,
    pub listing_id: i64,
    pub listing_title: String,
    #[serde(default)]
    pub listing_image: Option<String>,
    pub other_user_id: i64,
    pub other_username: String,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub last_message_at: Option<OffsetDateTime>,
    #[serde(with = "timestamp")]
    pub created_at: OffsetDateTime,
}

impl Conversation {
    /// When the thread last saw activity.
    pub fn active_at(&self) -> OffsetDateTime {
        self.last_message_at.unwrap_or(self.created_at)
    }
}

/// One immutable message in a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub sender_username: String,
    pub content: String,
    #[serde(with = "timestamp")]
    pub sent_at: OffsetDateTime,
}

impl Message {
    /// Transcript order: send time, then id for equal timestamps.
    pub fn order_key(&self) -> (OffsetDateTime, i64) {
        (self.sent_at, self.id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SendMessageRequest<'a> {
    pub(crate) content: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub location: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: OffsetDateTime,
    pub user_id: i64,
    pub username: String,
    pub category_id: i64,
    pub category_name: String,
}

/// Fields of a listing create or update; sent as multipart.
#[derive(Debug, Clone)]
pub struct ListingForm {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub location: String,
    pub category_id: i64,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    #[serde(with = "timestamp")]
    pub created_at: OffsetDateTime,
}

/// Error body the API returns on validation and business failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) errors: Option<std::collections::BTreeMap<String, String>>,
}

/// Timestamps arrive either as RFC 3339 or as naive ISO-8601 date-times;
/// naive values are read as UTC.
pub mod timestamp {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
    use time::{
        OffsetDateTime, PrimitiveDateTime,
        format_description::well_known::{Iso8601, Rfc3339},
    };

    pub fn parse(s: &str) -> Result<OffsetDateTime, time::error::Parse> {
        OffsetDateTime::parse(s, &Rfc3339).or_else(|_| {
            PrimitiveDateTime::parse(s, &Iso8601::DEFAULT).map(PrimitiveDateTime::assume_utc)
        })
    }

    pub fn serialize<S: Serializer>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        let text = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OffsetDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse(&text).map_err(|err| D::Error::custom(format!("bad timestamp {text:?}: {err}")))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|text| parse(&text).map_err(|err| D::Error::custom(format!("bad timestamp {text:?}: {err}"))))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn message_reads_backend_local_date_time() {
        let msg: Message = serde_json::from_str(
            r#"{"id":7,"conversationId":3,"senderId":1,"senderUsername":"arta","content":"hi","sentAt":"2024-01-01T10:00:00"}"#,
        )
        .unwrap();
        assert_eq!(msg.sent_at, datetime!(2024-01-01 10:00:00 UTC));
    }

    #[test]
    fn message_reads_offset_timestamps() {
        let msg: Message = serde_json::from_str(
            r#"{"id":7,"conversationId":3,"senderId":1,"senderUsername":"arta","content":"hi","sentAt":"2024-01-01T10:00:00+01:00"}"#,
        )
        .unwrap();
        assert_eq!(msg.sent_at, datetime!(2024-01-01 09:00:00 UTC));
    }

    #[test]
    fn conversation_optional_fields_may_be_null() {
        let conv: Conversation = serde_json::from_str(
            r#"{"id":1,"listingId":9,"listingTitle":"Bike","listingImage":null,"otherUserId":2,
                "otherUsername":"dren","lastMessage":null,"lastMessageAt":null,"createdAt":"2024-03-05T08:30:00Z"}"#,
        )
        .unwrap();
        assert_eq!(conv.last_message_at, None);
        assert_eq!(conv.active_at(), datetime!(2024-03-05 08:30:00 UTC));
    }

    #[test]
    fn auth_response_becomes_session() {
        let resp: AuthResponse = serde_json::from_str(
            r#"{"token":"t0k","userId":4,"username":"lira","email":"l@x.io","role":"ADMIN"}"#,
        )
        .unwrap();
        let session = AuthSession::from(resp);
        assert_eq!(session.token, "t0k");
        assert!(session.is_admin());
    }
}
