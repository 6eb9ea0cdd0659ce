//! Command-line arguments and timeline rendering for the `roomline` binary.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

use crate::api::ApiRequest;
use crate::config::Config;
use crate::error::Result;
use crate::notify::localpart;
use crate::reconcile::MessageList;
use crate::session::SyncSession;

/// Placeholder identity when neither flag, env nor config names a user.
pub const ANONYMOUS_USER: &str = "@anonymous:localhost";

#[derive(Parser, Debug)]
#[command(name = "roomline")]
#[command(version)]
#[command(about = "Replay chat sync streams and plan client-server API requests")]
pub struct Args {
    /// Config file (defaults to ./roomline.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Local user id, e.g. @me:matrix.org
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Room id the timeline is read from
    #[arg(long, global = true)]
    pub room: Option<String>,

    /// Debug-level logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply newline-delimited sync responses and print the resulting timeline
    Replay {
        /// Input file, or - for stdin
        #[arg(default_value = "-")]
        input: String,

        /// Print the timeline and summary as JSON
        #[arg(long)]
        json: bool,

        /// Treat the view as unfocused so incoming messages notify
        #[arg(long)]
        background: bool,
    },

    /// Print the request a client would send
    Plan {
        #[command(subcommand)]
        action: PlanAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum PlanAction {
    Send { body: String },
    Edit { event_id: String, body: String },
    Redact {
        event_id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    Invite { user_id: String },
    Join { room: String },
    Members,
    Sync,
}

/// Flags win over config values (which already include env overrides).
pub fn apply_args(args: &Args, config: &mut Config) {
    if let Some(user) = &args.user {
        config.user_id = Some(user.clone());
    }
    if let Some(room) = &args.room {
        config.room_id = Some(room.clone());
    }
}

pub fn session_from(config: &Config) -> SyncSession {
    let user = config.user_id.as_deref().unwrap_or(ANONYMOUS_USER);
    let session = SyncSession::new(user);
    match &config.room_id {
        Some(room) => session.with_room(room.as_str()),
        None => session,
    }
}

pub fn plan(action: &PlanAction, session: &SyncSession, config: &Config) -> Result<ApiRequest> {
    match action {
        PlanAction::Send { body } => session.send_request(body),
        PlanAction::Edit { event_id, body } => session.edit_request(event_id, body),
        PlanAction::Redact { event_id, reason } => session.redact_request(
            event_id,
            reason.as_deref().or(config.redact_reason.as_deref()),
        ),
        PlanAction::Invite { user_id } => session.invite_request(user_id),
        PlanAction::Join { room } => crate::api::join(room),
        PlanAction::Members => session.members_request(),
        PlanAction::Sync => Ok(session.sync_request(config.sync_timeout())),
    }
}

/// One line per message: `name: body`, with `(edited)` on replaced bodies.
pub fn render_timeline(messages: &MessageList, local_user: &str) -> String {
    let mut out = String::new();
    for m in messages {
        let name = if m.sender == local_user {
            "you".green().bold()
        } else {
            localpart(&m.sender).cyan().bold()
        };
        out.push_str(&format!("{name}: {}", m.body));
        if m.edited {
            out.push_str(&format!(" {}", "(edited)".dimmed()));
        }
        out.push('\n');
    }
    out
}
