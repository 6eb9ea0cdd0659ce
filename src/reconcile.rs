//! Incremental timeline reconciliation.
//!
//! Merges decoded [`UpdateBatch`]es into a caller-owned [`MessageList`].
//! Every failure mode degrades to skipping one event: unknown edit and
//! redaction targets are no-ops, duplicate creations are ignored, and a batch
//! without a next cursor leaves the [`ContinuationToken`] where it was.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use tracing::{debug, trace};

use crate::event::{EventRecord, UpdateBatch};
use crate::notify::Notification;

// ---------------------------------------------------------------------------
// Message list
// ---------------------------------------------------------------------------

/// A message as shown in the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub body: String,
    pub sender: String,
    pub edited: bool,
}

impl Message {
    pub fn new(id: impl Into<String>, body: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            sender: sender.into(),
            edited: false,
        }
    }
}

/// Messages in observation order. Ids are unique.
///
/// Also remembers edits that were discarded because their target was not
/// known yet, and every id a redaction has named, so a redelivered batch can
/// neither apply a stale edit nor bring a redacted message back. Both sets
/// only grow until [`MessageList::clear`]; a session clears them when it
/// joins a room. Equality only looks at the visible messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageList {
    messages: Vec<Message>,
    #[serde(skip)]
    discarded_edits: HashSet<String>,
    #[serde(skip)]
    redacted: HashSet<String>,
}

impl PartialEq for MessageList {
    fn eq(&self, other: &Self) -> bool {
        self.messages == other.messages
    }
}

impl Eq for MessageList {}

impl MessageList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Append `message` unless its id is already present.
    ///
    /// Returns `false` for a duplicate.
    pub fn push(&mut self, message: Message) -> bool {
        if self.contains(&message.id) {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Replace the body of `id` and mark it edited. Returns `false` when the
    /// id is unknown.
    pub fn edit(&mut self, id: &str, body: impl Into<String>) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(target) => {
                target.body = body.into();
                target.edited = true;
                true
            }
            None => false,
        }
    }

    /// Remove `id`, returning the removed message if it was present.
    pub fn remove(&mut self, id: &str) -> Option<Message> {
        let pos = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(pos))
    }

    /// Remove `id` for good. The id is remembered even when it is not in the
    /// list yet, and a later creation with that id is refused.
    pub fn redact(&mut self, id: &str) -> Option<Message> {
        self.redacted.insert(id.to_owned());
        self.remove(id)
    }

    pub fn is_redacted(&self, id: &str) -> bool {
        self.redacted.contains(id)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.discarded_edits.clear();
        self.redacted.clear();
    }

    fn discard_edit(&mut self, edit_id: String) {
        self.discarded_edits.insert(edit_id);
    }

    fn is_discarded_edit(&self, edit_id: &str) -> bool {
        self.discarded_edits.contains(edit_id)
    }
}

impl<'a> IntoIterator for &'a MessageList {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

// ---------------------------------------------------------------------------
// Continuation token
// ---------------------------------------------------------------------------

/// Opaque `/sync` cursor. Empty until the first successful batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(Option<String>);

impl ContinuationToken {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// Move to `next` when present; otherwise keep the current cursor.
    pub fn advance(self, next: Option<String>) -> Self {
        match next.filter(|t| !t.is_empty()) {
            Some(next) => Self(Some(next)),
            None => self,
        }
    }
}

impl From<&str> for ContinuationToken {
    fn from(token: &str) -> Self {
        Self(Some(token.to_owned()).filter(|t| !t.is_empty()))
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Whether the surface showing the timeline currently has the user's
/// attention. Notifications are only raised in the background.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Focus {
    #[default]
    Foreground,
    Background,
}

/// Per-batch counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub created: usize,
    pub duplicates: usize,
    pub edited: usize,
    /// Edits whose replacement carried no body.
    pub dropped_edits: usize,
    pub redacted: usize,
    /// Creations refused because their id was already redacted.
    pub suppressed: usize,
    /// Edits and redactions naming an id not in the list.
    pub unknown_targets: usize,
    pub malformed: usize,
    /// The batch had no next cursor; the token was held.
    pub cursor_held: bool,
}

/// Result of reconciling one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciled {
    pub token: ContinuationToken,
    /// One entry per newly created message worth notifying about.
    pub notifications: Vec<Notification>,
    pub stats: ReconcileStats,
}

/// Applies update batches to a message list on behalf of one local user.
#[derive(Debug, Clone)]
pub struct Reconciler {
    local_user: String,
}

impl Reconciler {
    pub fn new(local_user: impl Into<String>) -> Self {
        Self {
            local_user: local_user.into(),
        }
    }

    pub fn local_user(&self) -> &str {
        &self.local_user
    }

    /// Apply `batch` to `list` in delivery order and return the next cursor.
    ///
    /// Never fails. The token only moves when the batch carries a next
    /// cursor.
    pub fn reconcile(
        &self,
        list: &mut MessageList,
        token: ContinuationToken,
        batch: UpdateBatch,
        focus: Focus,
    ) -> Reconciled {
        let mut stats = ReconcileStats {
            malformed: batch.malformed,
            cursor_held: batch.next_batch.is_none(),
            ..ReconcileStats::default()
        };
        let mut notifications = Vec::new();

        for event in batch.events {
            match event {
                EventRecord::RedactionMarker { target } | EventRecord::Redaction { target } => {
                    if list.redact(&target).is_some() {
                        stats.redacted += 1;
                    } else {
                        stats.unknown_targets += 1;
                        trace!(redacts = %target, "redaction for unknown message");
                    }
                }
                EventRecord::Edit { id, target, body } => {
                    if list.is_discarded_edit(&id) {
                        continue;
                    }
                    if !list.contains(&target) {
                        stats.unknown_targets += 1;
                        trace!(edit = %id, replaces = %target, "edit for unknown message dropped");
                        list.discard_edit(id);
                        continue;
                    }
                    match body {
                        Some(body) => {
                            list.edit(&target, body);
                            stats.edited += 1;
                        }
                        None => stats.dropped_edits += 1,
                    }
                }
                EventRecord::Creation { id, sender, body } => {
                    if list.is_redacted(&id) {
                        stats.suppressed += 1;
                        trace!(event = %id, "creation of redacted message ignored");
                        continue;
                    }
                    let notify = focus == Focus::Background
                        && sender != self.local_user
                        && !body.is_empty();
                    let message = Message::new(id, body, sender);
                    let note = notify.then(|| Notification::new(&message.sender, &message.body));
                    if list.push(message) {
                        stats.created += 1;
                        notifications.extend(note);
                    } else {
                        stats.duplicates += 1;
                    }
                }
            }
        }

        if stats.cursor_held {
            debug!("batch carried no next cursor, holding current token");
        }

        Reconciled {
            token: token.advance(batch.next_batch),
            notifications,
            stats,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
