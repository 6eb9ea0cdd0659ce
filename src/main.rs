use clap::Parser;
use colored::*;
use tokio::io::{self, AsyncBufRead, BufReader};
use tracing_subscriber::EnvFilter;

use roomline::cli::{self, Args, Command};
use roomline::config;
use roomline::notify::LogNotifier;
use roomline::reconcile::Focus;
use roomline::replay::replay;

fn init_tracing(verbose: bool) {
    let default = if verbose { "roomline=debug" } else { "roomline=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn open_input(input: &str) -> std::io::Result<Box<dyn AsyncBufRead + Unpin>> {
    if input == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        let file = tokio::fs::File::open(input).await?;
        Ok(Box::new(BufReader::new(file)))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config_path = args.config.clone().unwrap_or_else(config::default_path);
    let mut config = config::load(&config_path)?;
    cli::apply_args(&args, &mut config);

    let mut session = cli::session_from(&config);

    match &args.command {
        Command::Replay { input, json, background } => {
            if *background {
                session.set_focus(Focus::Background);
            }
            let reader = open_input(input).await?;
            let notifier = LogNotifier::new(session.local_user());
            let summary = replay(reader, &mut session, &notifier).await?;

            if *json {
                let out = serde_json::json!({
                    "cursor": session.cursor(),
                    "messages": session.messages(),
                    "summary": summary,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print!("{}", cli::render_timeline(session.messages(), session.local_user()));
                eprintln!(
                    "{} {} responses applied, {} held, {} skipped, next cursor {}",
                    "replay:".bold(),
                    summary.applied,
                    summary.held,
                    summary.skipped_lines,
                    session.cursor().as_str().unwrap_or("-"),
                );
                for join in &summary.joins {
                    eprintln!("  {} {}", "join".yellow(), join.url(&config.homeserver));
                }
            }
        }
        Command::Plan { action } => {
            let req = cli::plan(action, &session, &config)?;
            let out = serde_json::json!({
                "url": req.url(&config.homeserver),
                "request": req,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    Ok(())
}
