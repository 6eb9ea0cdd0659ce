//! Feed recorded `/sync` responses through a session.
//!
//! Input is newline-delimited JSON, one sync response per line, in the order
//! they were received. Lines are applied strictly one after another so the
//! cursor threading matches a live polling loop.

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;

use tracing::{info, warn};

use crate::api::ApiRequest;
use crate::error::Result;
use crate::event::SyncResponse;
use crate::notify::Notifier;
use crate::session::SyncSession;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplaySummary {
    /// Non-blank input lines.
    pub lines: usize,
    pub applied: usize,
    /// Responses without a next cursor.
    pub held: usize,
    /// Lines that were not valid sync responses.
    pub skipped_lines: usize,
    pub notifications: usize,
    pub malformed_events: usize,
    /// Join requests a live client would send for pending invites.
    pub joins: Vec<ApiRequest>,
}

/// Apply every response in `reader` to `session`.
///
/// # Errors
/// Only read failures are returned; unparseable lines are logged and skipped.
pub async fn replay<R>(reader: R, session: &mut SyncSession, notifier: &dyn Notifier) -> Result<ReplaySummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = ReplaySummary::default();
    let mut lines = LinesStream::new(reader.lines());
    let mut line_no = 0usize;

    while let Some(line) = lines.next().await {
        let line = line?;
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        summary.lines += 1;

        let response: SyncResponse = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, line = line_no, "skipping unparseable sync response");
                summary.skipped_lines += 1;
                continue;
            }
        };

        let outcome = session.apply_sync(response, notifier);
        if !outcome.applied {
            summary.held += 1;
            continue;
        }
        summary.applied += 1;
        summary.notifications += outcome.notified;
        summary.malformed_events += outcome.stats.malformed;

        for req in outcome.join_requests() {
            info!(line = line_no, path = %req.path, "auto-join for pending invite");
            summary.joins.push(req);
        }
    }

    Ok(summary)
}
