//! Mitter - one-shot console client
#![allow(clippy::uninlined_format_args)]

use std::io::{self, BufRead, Write};
use std::sync::mpsc;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use mitter::{Config, RateLimit, RequestError, Session, Status, User};

fn main() -> Result<()> {
    // Initialize logging (RUST_LOG=debug for verbose output)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let command = parse_args()?;
    match command {
        Command::Help => {
            print_help();
            return Ok(());
        }
        Command::Version => {
            println!("mitter {}", mitter::VERSION);
            return Ok(());
        }
        _ => {}
    }

    let mut config = Config::load()?;
    if !config.has_credentials() {
        let path = Config::default_path()
            .map_or_else(|_| "Unknown".to_string(), |p| p.display().to_string());
        anyhow::bail!("No username configured. Add your credentials to {path}");
    }

    // A console run is strictly sequential: no worker threads.
    let mut session = config.session(1);
    let result = run(&session, &mut config, command);
    session.close();
    result
}

/// CLI commands
enum Command {
    Timeline,
    Replies,
    Post { text: String },
    Delete { id: u64 },
    Friends,
    Limits,
    Help,
    Version,
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() == 1 {
        return Ok(Command::Timeline);
    }

    match args[1].as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help),
        "-v" | "--version" | "version" => Ok(Command::Version),
        "timeline" | "tl" => Ok(Command::Timeline),
        "replies" => Ok(Command::Replies),
        "post" | "update" => {
            let text = args[2..].join(" ");
            if text.trim().is_empty() {
                anyhow::bail!("Missing status text");
            }
            Ok(Command::Post { text })
        }
        "delete" => {
            let id = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("Missing status id"))?
                .parse::<u64>()
                .context("Status id must be a number")?;
            Ok(Command::Delete { id })
        }
        "friends" => Ok(Command::Friends),
        "limits" => Ok(Command::Limits),
        other => Err(anyhow::anyhow!(
            "Unknown command: {other}\nRun 'mitter --help' for usage"
        )),
    }
}

fn print_help() {
    println!(
        r#"mitter {} - a microblogging client

USAGE:
    mitter [COMMAND]

COMMANDS:
    timeline              Show the friends timeline (default)
    replies               Show replies to you
    post <text>           Post a status update
    delete <id>           Delete one of your statuses
    friends               List the people you follow
    limits                Show the API calls left this hour

OPTIONS:
    -h, --help            Show this help message
    -v, --version         Show version information"#,
        mitter::VERSION
    );
}

/// Run one session call and wait for its callback
fn call<T, F>(start: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(Box<dyn FnOnce(Result<T, RequestError>) + Send>),
{
    let (tx, rx) = mpsc::channel();
    start(Box::new(move |result| {
        let _ = tx.send(result);
    }));
    rx.recv()
        .context("Request finished without a result")?
        .map_err(|e| explain(&e))
}

fn explain(error: &RequestError) -> anyhow::Error {
    if error.is_auth_failure() {
        anyhow::anyhow!("Authentication failed, check your username and password")
    } else if error.is_forbidden() {
        anyhow::anyhow!("The server refused the action: {error}")
    } else if error.is_transient() {
        anyhow::anyhow!("The server is busy, try again later ({error})")
    } else {
        anyhow::anyhow!("{error}")
    }
}

/// Status length past which the server may truncate the text
const SOFT_LIMIT: usize = 140;

/// Status length past which the server refuses the update
const HARD_LIMIT: usize = 160;

/// How a status text fits the server's limits
#[derive(Debug, PartialEq, Eq)]
enum Length {
    Fits,
    MayBeTruncated,
    TooLong,
}

fn check_length(text: &str) -> Length {
    match text.chars().count() {
        n if n > HARD_LIMIT => Length::TooLong,
        n if n > SOFT_LIMIT => Length::MayBeTruncated,
        _ => Length::Fits,
    }
}

fn run(session: &Session, config: &mut Config, command: Command) -> Result<()> {
    match command {
        Command::Timeline => {
            let statuses = call::<Vec<Status>, _>(|cb| session.friends_timeline(cb))?;
            if let Some(newest) = print_new_statuses(statuses, config.last_id) {
                config.last_id = newest;
                config.save()?;
            }
        }
        Command::Replies => {
            let statuses = call::<Vec<Status>, _>(|cb| session.replies(cb))?;
            if let Some(newest) = print_new_statuses(statuses, config.last_reply) {
                config.last_reply = newest;
                config.save()?;
            }
        }
        Command::Post { text } => {
            match check_length(&text) {
                Length::TooLong => anyhow::bail!(
                    "Your status has more than {HARD_LIMIT} characters and the server will \
                     likely refuse it. Your status was NOT updated."
                ),
                Length::MayBeTruncated => {
                    println!(
                        "Your status has more than {SOFT_LIMIT} characters and may be truncated."
                    );
                    if !confirm("Do you want to continue [Y/n]? ")? {
                        println!("Your status was NOT updated.");
                        return Ok(());
                    }
                }
                Length::Fits => {}
            }
            let status = call::<Status, _>(|cb| session.update(&text, cb))?;
            println!("✓ Posted status {}", status.id);
        }
        Command::Delete { id } => {
            call::<serde_json::Value, _>(|cb| session.destroy(id, cb))?;
            println!("✓ Deleted status {id}");
        }
        Command::Friends => {
            for user in call::<Vec<User>, _>(|cb| session.friends(cb))? {
                println!("{}", user.label());
            }
        }
        Command::Limits => {
            let limit = call::<RateLimit, _>(|cb| session.rate_limit_status(cb))?;
            println!(
                "{}/{} calls left, resets at {}",
                limit.remaining_hits,
                limit.hourly_limit,
                limit
                    .reset_at()
                    .map_or_else(|| "unknown".to_string(), |t| t.to_rfc2822())
            );
        }
        Command::Help | Command::Version => {}
    }
    Ok(())
}

/// Ask a yes/no question; anything but "n" counts as yes
fn confirm(question: &str) -> Result<bool> {
    print!("{question}");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read answer")?;
    Ok(!answer.trim().eq_ignore_ascii_case("n"))
}

/// Statuses newer than `last_seen`, oldest first
fn unseen(mut statuses: Vec<Status>, last_seen: u64) -> Vec<Status> {
    statuses.reverse();
    statuses.retain(|s| s.id > last_seen);
    statuses
}

/// Print statuses newer than `last_seen` and return the newest id shown
fn print_new_statuses(statuses: Vec<Status>, last_seen: u64) -> Option<u64> {
    let statuses = unseen(statuses, last_seen);
    let newest = statuses.iter().map(|s| s.id).max();

    for status in statuses {
        let author = status
            .user
            .as_ref()
            .map_or_else(|| "unknown".to_string(), User::label);
        let when = status
            .created_at
            .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let header = format!("{author} @ {when} [{}]:", status.id);
        println!("{header}");
        println!("{}", "-".repeat(header.chars().count()));
        println!("{}\n", status.text);
    }
    newest
}
