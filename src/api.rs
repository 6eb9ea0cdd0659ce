//! Client-server API request construction and response checking.
//!
//! Requests are plain values: the caller's transport sends them and hands the
//! status code and body back to [`check_response`]. No I/O happens here.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{Result, RoomlineError};
use crate::event::{MESSAGE_TYPE, REPLACE_RELATION};
use crate::notify::localpart;
use crate::reconcile::ContinuationToken;

pub const CLIENT_PREFIX: &str = "/_matrix/client/r0";
pub const TEXT_MSGTYPE: &str = "m.text";
pub const DEFAULT_REDACT_REASON: &str = "Deleted by user";

// ---------------------------------------------------------------------------
// Request value
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// A request ready for a transport. `path` is already percent-encoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    fn get(path: String) -> Self {
        Self {
            method: Method::Get,
            path,
            query: Vec::new(),
            body: None,
        }
    }

    fn post<B: Serialize>(path: String, body: Option<&B>) -> Result<Self> {
        Ok(Self {
            method: Method::Post,
            path,
            query: Vec::new(),
            body: body.map(serde_json::to_value).transpose()?,
        })
    }

    /// Full URL against `base` (e.g. `https://matrix.org`).
    pub fn url(&self, base: &str) -> String {
        let mut url = format!("{}{}", base.trim_end_matches('/'), self.path);
        for (i, (key, value)) in self.query.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    pub msgtype: String,
    pub body: String,
}

impl TextContent {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            msgtype: TEXT_MSGTYPE.to_string(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub rel_type: String,
    pub event_id: String,
}

/// Body of a replacing `m.room.message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditContent {
    pub msgtype: String,
    pub body: String,
    #[serde(rename = "m.new_content")]
    pub new_content: TextContent,
    #[serde(rename = "m.relates_to")]
    pub relates_to: Relation,
}

#[derive(Debug, Clone, Serialize)]
struct RedactBody<'a> {
    reason: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct InviteBody<'a> {
    user_id: &'a str,
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RoomlineError::EmptyInput(field));
    }
    Ok(trimmed)
}

fn room_segment(room_id: &str) -> Result<String> {
    let room = room_id.trim();
    if room.is_empty() {
        return Err(RoomlineError::NoRoom);
    }
    Ok(urlencoding::encode(room).into_owned())
}

fn send_path(room_id: &str) -> Result<String> {
    Ok(format!(
        "{CLIENT_PREFIX}/rooms/{}/send/{MESSAGE_TYPE}",
        room_segment(room_id)?
    ))
}

/// `POST /rooms/{room}/send/m.room.message` with a text body.
pub fn send_text(room_id: &str, body: &str) -> Result<ApiRequest> {
    let body = required(body, "message")?;
    ApiRequest::post(send_path(room_id)?, Some(&TextContent::new(body)))
}

/// A replacement message for `target`.
pub fn edit_text(room_id: &str, target: &str, body: &str) -> Result<ApiRequest> {
    let body = required(body, "edit text")?;
    let target = required(target, "event id")?;
    let content = EditContent {
        msgtype: TEXT_MSGTYPE.to_string(),
        body: body.to_string(),
        new_content: TextContent::new(body),
        relates_to: Relation {
            rel_type: REPLACE_RELATION.to_string(),
            event_id: target.to_string(),
        },
    };
    ApiRequest::post(send_path(room_id)?, Some(&content))
}

/// `POST /rooms/{room}/redact/{event}`. A blank reason uses
/// [`DEFAULT_REDACT_REASON`].
pub fn redact(room_id: &str, event_id: &str, reason: Option<&str>) -> Result<ApiRequest> {
    let event = required(event_id, "event id")?;
    let reason = reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_REDACT_REASON);
    let path = format!(
        "{CLIENT_PREFIX}/rooms/{}/redact/{}",
        room_segment(room_id)?,
        urlencoding::encode(event)
    );
    ApiRequest::post(path, Some(&RedactBody { reason }))
}

pub fn invite(room_id: &str, user_id: &str) -> Result<ApiRequest> {
    let user_id = required(user_id, "user id")?;
    let path = format!("{CLIENT_PREFIX}/rooms/{}/invite", room_segment(room_id)?);
    ApiRequest::post(path, Some(&InviteBody { user_id }))
}

/// `POST /join/{room}`; accepts a room id or alias.
pub fn join(room: &str) -> Result<ApiRequest> {
    let room = required(room, "room")?;
    let path = format!("{CLIENT_PREFIX}/join/{}", urlencoding::encode(room));
    ApiRequest::post::<()>(path, None)
}

pub fn joined_members(room_id: &str) -> Result<ApiRequest> {
    let path = format!("{CLIENT_PREFIX}/rooms/{}/joined_members", room_segment(room_id)?);
    Ok(ApiRequest::get(path))
}

/// Long-poll `/sync`, resuming from `since` when a cursor exists.
pub fn sync(since: &ContinuationToken, timeout: Duration) -> ApiRequest {
    let mut req = ApiRequest::get(format!("{CLIENT_PREFIX}/sync"));
    if let Some(since) = since.as_str() {
        req.query.push(("since".into(), since.to_string()));
    }
    req.query.push(("timeout".into(), timeout.as_millis().to_string()));
    req
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    pub event_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinResponse {
    pub room_id: String,
}

/// Any JSON object; used where only success matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyResponse {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedMembersResponse {
    #[serde(default)]
    pub joined: BTreeMap<String, MemberInfo>,
}

/// A joined member as shown in the member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMember {
    pub user_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl JoinedMembersResponse {
    /// Members sorted by user id; a missing display name falls back to the
    /// localpart.
    pub fn into_members(self) -> Vec<RoomMember> {
        self.joined
            .into_iter()
            .map(|(user_id, info)| {
                let display_name = info
                    .display_name
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| localpart(&user_id).to_string());
                RoomMember {
                    user_id,
                    display_name,
                    avatar_url: info.avatar_url,
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    errcode: String,
    #[serde(default)]
    error: Option<String>,
}

/// Check a response body against the expected shape `T`.
///
/// # Returns
/// - `Err(RoomlineError::Api)` when the body carries an `errcode`, whatever the status.
/// - `Err(RoomlineError::Http)` for other non-2xx statuses.
/// - `Err(RoomlineError::Shape)` when a 2xx body does not decode as `T`.
///
/// # Panics
/// This function never panics.
pub fn check_response<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<T> {
    if let Ok(err) = serde_json::from_slice::<ErrorBody>(body) {
        return Err(RoomlineError::Api {
            status,
            errcode: err.errcode,
            message: err.error.unwrap_or_else(|| "Unknown error".to_string()),
        });
    }

    if !(200..300).contains(&status) {
        return Err(RoomlineError::Http { status });
    }

    serde_json::from_slice::<T>(body).map_err(|e| RoomlineError::Shape {
        expected: std::any::type_name::<T>(),
        detail: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
