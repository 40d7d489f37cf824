//! `ephemeral` command-line front end.
//!
//! # Responsibility
//! - Drive the create/view request contract against a local note database.
//! - Render the three viewer states: unavailable, delivered, destroyed.

mod args;

use anyhow::{Context, Result};
use args::{id_from_input, Cli, Command};
use clap::Parser;
use ephemeral_core::db::open_db;
use ephemeral_core::{
    default_log_level, init_logging, now_epoch_ms, share_url, ConsumeOutcome, EngineError,
    ExpirationEngine, ExpirationPolicy, NoteValidationError, SqliteNoteStore, ViewState,
};
use serde::Serialize;
use std::io::Read;
use std::process::ExitCode;

#[derive(Serialize)]
struct Created<'a> {
    id: &'a str,
    url: String,
    policy: ExpirationPolicy,
}

#[derive(Serialize)]
struct Viewed<'a> {
    state: ViewState,
    #[serde(flatten)]
    outcome: &'a ConsumeOutcome,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir).map_err(anyhow::Error::msg)?;
    }

    let conn = open_db(&cli.db)
        .with_context(|| format!("failed to open note database `{}`", cli.db.display()))?;
    let engine = ExpirationEngine::new(SqliteNoteStore::try_new(&conn)?);
    let now = now_epoch_ms();

    match cli.command {
        Command::Create { policy, content } => {
            let content = match content {
                Some(content) => content,
                None => read_stdin()?,
            };
            let id = match engine.create(content, policy, now) {
                Ok(id) => id,
                Err(EngineError::Validation(NoteValidationError::EmptyContent)) => {
                    eprintln!("Please enter some content for your note.");
                    return Ok(ExitCode::from(2));
                }
                Err(err) => return Err(err.into()),
            };

            let url = share_url(&cli.base_url, &id);
            if cli.json {
                let created = Created {
                    id: id.as_str(),
                    url,
                    policy,
                };
                println!("{}", serde_json::to_string(&created)?);
            } else {
                println!("{url}");
            }
        }
        Command::View { id } => {
            let outcome = engine.consume_raw(id_from_input(&id), now)?;
            let state = outcome.view_state();
            if cli.json {
                let viewed = Viewed {
                    state,
                    outcome: &outcome,
                };
                println!("{}", serde_json::to_string(&viewed)?);
            } else {
                render_outcome(&outcome);
            }
            if state == ViewState::Unavailable {
                return Ok(ExitCode::from(3));
            }
        }
        Command::Purge => {
            let removed = engine.purge_expired(now)?;
            if cli.json {
                println!("{}", serde_json::json!({ "removed": removed }));
            } else {
                println!("removed {removed} expired note(s)");
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn render_outcome(outcome: &ConsumeOutcome) {
    match outcome {
        ConsumeOutcome::NotFound => {
            eprintln!("This note does not exist or has already been deleted.");
        }
        ConsumeOutcome::Expired { .. } => {
            eprintln!("This note has expired and been deleted.");
        }
        ConsumeOutcome::Delivered {
            content,
            final_view,
        } => {
            println!("{content}");
            if *final_view {
                eprintln!("This note has been deleted after viewing.");
            }
        }
    }
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .context("failed to read note content from stdin")?;
    Ok(buffer)
}
