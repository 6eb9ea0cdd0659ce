//! Sync response wire shapes and event decoding.
//!
//! ## Responsibility
//! Turn the loosely-typed timeline events of a `/sync` response into the
//! closed [`EventRecord`] variant the reconciler matches on. All probing of
//! optional fields happens here, once, at the wire boundary.
//!
//! ## Classification order
//! | Check                                             | Result            |
//! |---------------------------------------------------|-------------------|
//! | `unsigned.redacted_because.redacts` is a string   | `RedactionMarker` |
//! | `type == m.room.redaction`                        | `Redaction`       |
//! | `m.room.message` with an `m.replace` relation     | `Edit`            |
//! | `m.room.message` with a string `content.body`     | `Creation`        |
//! | anything else                                     | ignored           |
//!
//! The first matching row wins; a marker beats everything else even when the
//! event is also a well-formed message.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use tracing::debug;

pub const MESSAGE_TYPE: &str = "m.room.message";
pub const REDACTION_TYPE: &str = "m.room.redaction";
pub const REPLACE_RELATION: &str = "m.replace";

// ---------------------------------------------------------------------------
// Decoded event records
// ---------------------------------------------------------------------------

/// One timeline event, reduced to what reconciliation needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventRecord {
    /// A new message.
    Creation {
        id: String,
        sender: String,
        body: String,
    },
    /// Replace the body of `target`. `body` is `None` when the replacement
    /// content carried no usable body; such edits are dropped.
    Edit {
        id: String,
        target: String,
        body: Option<String>,
    },
    /// An explicit `m.room.redaction` event.
    Redaction { target: String },
    /// An event whose `unsigned.redacted_because` names a redacted id.
    RedactionMarker { target: String },
}

/// Outcome of decoding a single raw event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Record(EventRecord),
    /// Not something the timeline view cares about (state events, reactions...).
    Ignored,
    /// Looked like a known kind but lacked a field that kind requires.
    Malformed(&'static str),
}

impl EventRecord {
    /// Classify a raw timeline event.
    ///
    /// # Panics
    /// This function never panics.
    pub fn decode(raw: &Value) -> Decoded {
        if let Some(target) = str_at(raw, "/unsigned/redacted_because/redacts") {
            return Decoded::Record(EventRecord::RedactionMarker {
                target: target.to_owned(),
            });
        }

        match raw.get("type").and_then(Value::as_str) {
            Some(REDACTION_TYPE) => {
                // Room versions 11+ move `redacts` into the content.
                match str_at(raw, "/redacts").or_else(|| str_at(raw, "/content/redacts")) {
                    Some(target) => Decoded::Record(EventRecord::Redaction {
                        target: target.to_owned(),
                    }),
                    None => Decoded::Malformed("redaction without target"),
                }
            }
            Some(MESSAGE_TYPE) => decode_message(raw),
            _ => Decoded::Ignored,
        }
    }
}

fn decode_message(raw: &Value) -> Decoded {
    let content = match raw.get("content") {
        Some(c) if c.is_object() => c,
        _ => return Decoded::Malformed("message without content"),
    };

    if let Some(target) = replace_target(content) {
        let replacement = content
            .get("m.new_content")
            .filter(|v| !v.is_null())
            .unwrap_or(content);
        let body = replacement
            .get("body")
            .and_then(Value::as_str)
            .filter(|b| !b.is_empty())
            .map(str::to_owned);
        let Some(id) = str_at(raw, "/event_id") else {
            return Decoded::Malformed("edit without event_id");
        };
        return Decoded::Record(EventRecord::Edit {
            id: id.to_owned(),
            target: target.to_owned(),
            body,
        });
    }

    let Some(body) = content.get("body").and_then(Value::as_str) else {
        return Decoded::Malformed("message without string body");
    };
    let Some(id) = str_at(raw, "/event_id") else {
        return Decoded::Malformed("message without event_id");
    };
    let Some(sender) = str_at(raw, "/sender") else {
        return Decoded::Malformed("message without sender");
    };

    Decoded::Record(EventRecord::Creation {
        id: id.to_owned(),
        sender: sender.to_owned(),
        body: body.to_owned(),
    })
}

fn replace_target(content: &Value) -> Option<&str> {
    let relates = content.get("m.relates_to")?;
    if relates.get("rel_type").and_then(Value::as_str) != Some(REPLACE_RELATION) {
        return None;
    }
    relates.get("event_id").and_then(Value::as_str)
}

fn str_at<'a>(v: &'a Value, pointer: &str) -> Option<&'a str> {
    v.pointer(pointer).and_then(Value::as_str)
}

// ---------------------------------------------------------------------------
// Update batch
// ---------------------------------------------------------------------------

/// One decoded increment of a room's timeline plus the cursor for the next
/// request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateBatch {
    pub events: Vec<EventRecord>,
    /// `None` when the response carried no usable next cursor.
    pub next_batch: Option<String>,
    /// Raw events dropped during decoding because required fields were missing.
    pub malformed: usize,
}

impl UpdateBatch {
    pub fn new(events: Vec<EventRecord>, next_batch: Option<String>) -> Self {
        Self {
            events,
            next_batch: next_batch.filter(|t| !t.is_empty()),
            malformed: 0,
        }
    }

    /// Decode raw timeline events in delivery order.
    pub fn from_raw(raw: &[Value], next_batch: Option<String>) -> Self {
        let mut batch = Self::new(Vec::with_capacity(raw.len()), next_batch);
        for event in raw {
            match EventRecord::decode(event) {
                Decoded::Record(record) => batch.events.push(record),
                Decoded::Ignored => {}
                Decoded::Malformed(reason) => {
                    batch.malformed += 1;
                    let event_id = str_at(event, "/event_id").unwrap_or("?");
                    debug!(reason, event_id, "skipping malformed timeline event");
                }
            }
        }
        batch
    }
}

// ---------------------------------------------------------------------------
// /sync response shape
// ---------------------------------------------------------------------------

/// The subset of a `/sync` response the client reads.
///
/// Every section is optional; absent sections decode as empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncResponse {
    #[serde(default)]
    pub next_batch: Option<String>,
    #[serde(default)]
    pub rooms: Option<Rooms>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rooms {
    #[serde(default)]
    pub join: BTreeMap<String, JoinedRoom>,
    /// Invite state is not inspected, only the room ids.
    #[serde(default)]
    pub invite: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinedRoom {
    #[serde(default)]
    pub timeline: Option<Timeline>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub events: Vec<Value>,
}

impl SyncResponse {
    /// The next cursor, treating an empty string as absent.
    pub fn next_cursor(&self) -> Option<&str> {
        self.next_batch.as_deref().filter(|t| !t.is_empty())
    }

    /// Decode the timeline of `room_id`. A room missing from the response
    /// yields an empty batch that still carries the cursor.
    pub fn batch_for(&self, room_id: &str) -> UpdateBatch {
        let events = self
            .rooms
            .as_ref()
            .and_then(|r| r.join.get(room_id))
            .and_then(|room| room.timeline.as_ref())
            .map(|t| t.events.as_slice())
            .unwrap_or_default();
        UpdateBatch::from_raw(events, self.next_batch.clone())
    }

    /// Rooms with a pending invite, in sorted order.
    pub fn invited_rooms(&self) -> Vec<String> {
        self.rooms
            .as_ref()
            .map(|r| r.invite.keys().cloned().collect())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
