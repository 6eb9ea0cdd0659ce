//! Notification values raised for incoming messages.
//!
//! The crate only decides *whether* a message deserves a notification; how
//! it is shown (desktop popup, sound, terminal bell) belongs to whatever
//! implements [`Notifier`].

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use tracing::info;

/// Bodies longer than this are shortened in [`Notification::preview`].
pub const PREVIEW_MAX_CHARS: usize = 100;
const PREVIEW_KEEP_CHARS: usize = PREVIEW_MAX_CHARS - 3;

/// Title used when the sender is the local user.
pub const SELF_TITLE: &str = "You";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub sender: String,
    pub body: String,
}

impl Notification {
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
        }
    }

    /// `"You"` for the local user, otherwise the sender's localpart.
    pub fn title(&self, local_user: &str) -> String {
        if self.sender == local_user {
            SELF_TITLE.to_string()
        } else {
            localpart(&self.sender).to_string()
        }
    }

    /// The body, cut to 97 characters plus `...` when it exceeds 100.
    pub fn preview(&self) -> String {
        if self.body.chars().count() > PREVIEW_MAX_CHARS {
            let kept: String = self.body.chars().take(PREVIEW_KEEP_CHARS).collect();
            format!("{kept}...")
        } else {
            self.body.clone()
        }
    }
}

/// `@alice:example.org` → `alice`. Ids without a sigil or server part are
/// returned as far as they go.
pub fn localpart(user_id: &str) -> &str {
    let name = user_id.split(':').next().unwrap_or(user_id);
    name.strip_prefix('@').unwrap_or(name)
}

/// Delivery seam for notifications.
pub trait Notifier {
    fn notify(&self, notification: &Notification);
}

/// Emits each notification as a tracing event.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    local_user: String,
}

impl LogNotifier {
    pub fn new(local_user: impl Into<String>) -> Self {
        Self {
            local_user: local_user.into(),
        }
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) {
        info!(
            title = %notification.title(&self.local_user),
            body = %notification.preview(),
            "new message"
        );
    }
}

/// Keeps every notification it receives.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Notification> {
        match self.seen.lock() {
            Ok(mut seen) => std::mem::take(&mut *seen),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notification: &Notification) {
        match self.seen.lock() {
            Ok(mut seen) => seen.push(notification.clone()),
            Err(poisoned) => poisoned.into_inner().push(notification.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localpart_strips_sigil_and_server() {
        assert_eq!(localpart("@alice:example.org"), "alice");
        assert_eq!(localpart("bob"), "bob");
        assert_eq!(localpart("@carol"), "carol");
    }

    #[test]
    fn title_for_self_and_others() {
        let n = Notification::new("@alice:x", "hi");
        assert_eq!(n.title("@alice:x"), SELF_TITLE);
        assert_eq!(n.title("@me:x"), "alice");
    }

    #[test]
    fn preview_short_body_unchanged() {
        let body = "a".repeat(PREVIEW_MAX_CHARS);
        assert_eq!(Notification::new("@a:x", body.clone()).preview(), body);
    }

    #[test]
    fn preview_long_body_truncated() {
        let body = "a".repeat(PREVIEW_MAX_CHARS + 1);
        let preview = Notification::new("@a:x", body).preview();
        assert_eq!(preview.chars().count(), PREVIEW_MAX_CHARS);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn preview_counts_chars_not_bytes() {
        let body = "é".repeat(PREVIEW_MAX_CHARS + 5);
        let preview = Notification::new("@a:x", body).preview();
        assert_eq!(preview.chars().count(), PREVIEW_MAX_CHARS);
    }

    #[test]
    fn collecting_notifier_drains() {
        let sink = CollectingNotifier::new();
        sink.notify(&Notification::new("@a:x", "one"));
        sink.notify(&Notification::new("@b:x", "two"));
        assert_eq!(sink.take().len(), 2);
        assert!(sink.take().is_empty());
    }
}
