//! # roomline
//!
//! Client-side glue for the Matrix client-server API: request construction,
//! response checking, and reconciliation of `/sync` timeline updates into a
//! local message list.
//!
//! ## Flow
//!
//! ```rust,ignore
//! let mut session = SyncSession::new("@me:matrix.org").with_room("!room:matrix.org");
//! let req = session.sync_request(Duration::from_secs(30));
//! // ... transport sends `req`, decodes the body ...
//! let outcome = session.apply_sync(response, &LogNotifier::new(session.local_user()));
//! for join in outcome.join_requests() { /* send before the next sync */ }
//! ```
//!
//! The transport itself is not part of this crate.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod notify;
pub mod reconcile;
pub mod replay;
pub mod session;

pub use error::{Result, RoomlineError};
pub use event::{EventRecord, SyncResponse, UpdateBatch};
pub use notify::{Notification, Notifier};
pub use reconcile::{ContinuationToken, Focus, Message, MessageList, Reconciled, Reconciler};
pub use session::{SyncOutcome, SyncSession};
