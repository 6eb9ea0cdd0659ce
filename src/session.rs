//! Per-user client state threaded explicitly through sync and UI actions.
//!
//! ## Responsibility
//! [`SyncSession`] owns everything a chat view needs between requests: the
//! selected room, the message list, the `/sync` cursor and the member list.
//! It builds requests from that state and folds responses back into it.
//!
//! ## Ordering
//! Callers must apply one sync response (including its auto-joins) before
//! asking for the next [`SyncSession::sync_request`]; the cursor embedded in
//! the next request depends on it.

use std::time::Duration;

use tracing::{debug, warn};

use crate::api::{self, ApiRequest, JoinResponse, JoinedMembersResponse, RoomMember, SendResponse};
use crate::error::{Result, RoomlineError};
use crate::event::SyncResponse;
use crate::notify::Notifier;
use crate::reconcile::{ContinuationToken, Focus, Message, MessageList, ReconcileStats, Reconciler};

/// What one applied sync response did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// `false` when the response had no next cursor and was not applied.
    pub applied: bool,
    pub stats: ReconcileStats,
    pub notified: usize,
    /// Rooms with pending invites, to be joined before the next sync.
    pub invites: Vec<String>,
}

impl SyncOutcome {
    /// One join request per pending invite.
    pub fn join_requests(&self) -> Vec<ApiRequest> {
        self.invites
            .iter()
            .filter_map(|room| match api::join(room) {
                Ok(req) => Some(req),
                Err(e) => {
                    warn!(error = %e, room = %room, "skipping auto-join");
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SyncSession {
    reconciler: Reconciler,
    room_id: Option<String>,
    messages: MessageList,
    cursor: ContinuationToken,
    members: Vec<RoomMember>,
    focus: Focus,
}

impl SyncSession {
    pub fn new(local_user: impl Into<String>) -> Self {
        Self {
            reconciler: Reconciler::new(local_user),
            room_id: None,
            messages: MessageList::new(),
            cursor: ContinuationToken::none(),
            members: Vec::new(),
            focus: Focus::Foreground,
        }
    }

    /// Start in `room_id` without joining.
    pub fn with_room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into()).filter(|r| !r.is_empty());
        self
    }

    pub fn local_user(&self) -> &str {
        self.reconciler.local_user()
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn messages(&self) -> &MessageList {
        &self.messages
    }

    pub fn cursor(&self) -> &ContinuationToken {
        &self.cursor
    }

    pub fn members(&self) -> &[RoomMember] {
        &self.members
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
    }

    fn room(&self) -> Result<&str> {
        self.room_id.as_deref().ok_or(RoomlineError::NoRoom)
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    pub fn sync_request(&self, timeout: Duration) -> ApiRequest {
        api::sync(&self.cursor, timeout)
    }

    pub fn send_request(&self, body: &str) -> Result<ApiRequest> {
        api::send_text(self.room()?, body)
    }

    pub fn edit_request(&self, target: &str, body: &str) -> Result<ApiRequest> {
        api::edit_text(self.room()?, target, body)
    }

    pub fn redact_request(&self, event_id: &str, reason: Option<&str>) -> Result<ApiRequest> {
        api::redact(self.room()?, event_id, reason)
    }

    pub fn invite_request(&self, user_id: &str) -> Result<ApiRequest> {
        api::invite(self.room()?, user_id)
    }

    pub fn members_request(&self) -> Result<ApiRequest> {
        api::joined_members(self.room()?)
    }

    // -----------------------------------------------------------------------
    // Responses
    // -----------------------------------------------------------------------

    /// Fold one `/sync` response into the session.
    ///
    /// A response without a next cursor is treated as transient: nothing is
    /// applied and the next request reuses the current cursor.
    pub fn apply_sync(&mut self, response: SyncResponse, notifier: &dyn Notifier) -> SyncOutcome {
        if response.next_cursor().is_none() {
            warn!(
                cursor = self.cursor.as_str().unwrap_or(""),
                "sync response without next_batch, keeping cursor"
            );
            return SyncOutcome::default();
        }

        let token = std::mem::take(&mut self.cursor);
        let mut outcome = SyncOutcome {
            applied: true,
            invites: response.invited_rooms(),
            ..SyncOutcome::default()
        };

        match self.room_id.as_deref() {
            Some(room) => {
                let batch = response.batch_for(room);
                let reconciled = self
                    .reconciler
                    .reconcile(&mut self.messages, token, batch, self.focus);
                for note in &reconciled.notifications {
                    notifier.notify(note);
                }
                self.cursor = reconciled.token;
                outcome.notified = reconciled.notifications.len();
                outcome.stats = reconciled.stats;
            }
            None => {
                self.cursor = token.advance(response.next_batch);
            }
        }

        debug!(
            cursor = self.cursor.as_str().unwrap_or(""),
            created = outcome.stats.created,
            edited = outcome.stats.edited,
            redacted = outcome.stats.redacted,
            suppressed = outcome.stats.suppressed,
            invites = outcome.invites.len(),
            "sync applied"
        );
        outcome
    }

    /// Show a message the server accepted, before it comes back through sync.
    ///
    /// Returns `false` if sync already delivered it.
    pub fn record_sent(&mut self, response: &SendResponse, body: &str) -> bool {
        let message = Message::new(&response.event_id, body.trim(), self.local_user());
        self.messages.push(message)
    }

    pub fn record_edit(&mut self, target: &str, body: &str) -> bool {
        self.messages.edit(target, body.trim())
    }

    pub fn record_redaction(&mut self, event_id: &str) -> bool {
        self.messages.redact(event_id).is_some()
    }

    /// Switch to the joined room and start its timeline from scratch.
    pub fn record_join(&mut self, response: JoinResponse) {
        self.room_id = Some(response.room_id);
        self.messages.clear();
        self.members.clear();
        self.cursor = ContinuationToken::none();
    }

    pub fn set_members(&mut self, response: JoinedMembersResponse) {
        self.members = response.into_members();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
