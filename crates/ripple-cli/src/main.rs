//! ripple: command-line client for a ripple event queue.
//!
//! Pushes events, dumps retained history as JSON, and tails live keys as
//! Server-Sent Events frames, against the Redis instance named by
//! `REDIS_URL`.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ripple_queue::{defaults, next_event_id, sse, DuplicateWindow, Error, Event, Queue, QueueConfig};
use ripple_redis::{RedisConfig, RedisTransport};

#[derive(Parser)]
#[command(name = "ripple")]
#[command(author, version, about = "Push, replay and tail ripple events")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish one event under a key
    Push {
        /// Topic key (without namespace)
        key: String,

        /// Event type tag (no spaces)
        event_type: String,

        /// Event payload
        payload: String,

        /// Event id (default: current time in microseconds)
        #[arg(long)]
        id: Option<i64>,

        /// Authoring session id
        #[arg(long, default_value_t = 0)]
        session: i64,

        /// Authoring user id
        #[arg(long, default_value_t = 0)]
        user: i64,

        /// Do not append the event to history
        #[arg(long)]
        no_persist: bool,
    },

    /// Print retained history for a key as JSON
    History {
        /// Topic key (without namespace)
        key: String,

        /// Only events with an id greater than this
        #[arg(long, default_value_t = 0)]
        since: i64,
    },

    /// Stream events for one or more keys as SSE frames until interrupted
    Tail {
        /// Topic keys (without namespace)
        #[arg(required = true, num_args = 1..)]
        keys: Vec<String>,

        /// Replay history newer than this id before streaming
        #[arg(long)]
        since: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = init_tracing();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Configure the tracing subscriber.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected on stderr, off in files)
///   RUST_LOG    - standard env filter (default: "ripple_cli=info" plus the library crates)
///
/// Console logs go to stderr so stdout carries only command output.
fn init_tracing() -> Option<WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1")
        .or(log_file.as_ref().map(|_| false));

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "ripple_cli=info,ripple_queue=info,ripple_redis=info,ripple_core=info".into()
    });

    let (writer, guard) = log_writer(log_file.as_deref());
    let layer = tracing_subscriber::fmt::layer().with_writer(writer);
    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        registry.with(layer.json()).init();
    } else {
        let layer = match log_ansi {
            Some(ansi) => layer.with_ansi(ansi),
            None => layer,
        };
        registry.with(layer).init();
    }

    debug!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stderr)"),
        "Logging initialized"
    );
    guard
}

/// Daily-rolling file writer when `path` is set, stderr otherwise.
fn log_writer(path: Option<&str>) -> (BoxMakeWriter, Option<WorkerGuard>) {
    let Some(path) = path.map(Path::new) else {
        return (BoxMakeWriter::new(std::io::stderr), None);
    };
    let dir = path.parent().unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("ripple.log");
    let (non_blocking, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, file_name));
    (BoxMakeWriter::new(non_blocking), Some(guard))
}

async fn connect() -> anyhow::Result<Queue> {
    let redis = RedisConfig::from_env();
    let transport = RedisTransport::connect(&redis)
        .await
        .with_context(|| format!("connecting to {}", redis.redacted_url()))?;
    Ok(Queue::new(Arc::new(transport), QueueConfig::from_env()))
}

fn duplicate_window_from_env() -> DuplicateWindow {
    let capacity = std::env::var("RIPPLE_DUPLICATE_WINDOW")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(defaults::DUPLICATE_WINDOW);
    DuplicateWindow::new(capacity)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let queue = connect().await?;

    match cli.command {
        Commands::Push {
            key,
            event_type,
            payload,
            id,
            session,
            user,
            no_persist,
        } => {
            let event = Event::new(id.unwrap_or_else(next_event_id), key, event_type, payload)
                .with_session(session)
                .with_user(user);
            queue.push(&event, !no_persist).await?;
            println!("{}", event.id);
        }

        Commands::History { key, since } => {
            let history = queue.history(&key, since).await?;
            println!("{}", serde_json::to_string_pretty(&history)?);
        }

        Commands::Tail { keys, since } => tail(&queue, &keys, since).await?,
    }

    Ok(())
}

/// Subscribe first, then replay history, so nothing published in between is
/// missed; the duplicate window drops events seen on both paths.
async fn tail(queue: &Queue, keys: &[String], since: Option<i64>) -> anyhow::Result<()> {
    let mut bridge = queue.listen().await?;
    let mut sub = queue.chan();
    for key in keys {
        queue.subscribe(&mut sub, key);
    }

    let mut window = duplicate_window_from_env();
    let mut out = std::io::stdout();

    if let Some(since) = since {
        for key in keys {
            let mut history = match queue.history(key, since).await {
                Ok(history) => history,
                Err(Error::HistoryUnavailable) => {
                    warn!(key = %key, "History disabled; streaming live events only");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if history.truncated {
                warn!(
                    key = %key,
                    since,
                    oldest_id = history.oldest_id,
                    "History does not reach back to the requested id; events may be missing"
                );
            }
            history.retain_unseen(&mut window);
            for event in &history.events {
                out.write_all(sse::event_frame(event).as_bytes())?;
            }
            out.flush()?;
        }
    }

    info!(keys = keys.len(), "Tailing");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = bridge.terminated() => {
                anyhow::bail!("transport subscription ended");
            }
            event = sub.recv() => {
                let Some(event) = event else { break };
                if window.check(&event) {
                    debug!(event_id = event.id, key = %event.key, "Skipping duplicate");
                    continue;
                }
                out.write_all(sse::event_frame(&event).as_bytes())?;
                out.flush()?;
            }
        }
    }

    queue.unsubscribe_all(&mut sub);
    bridge.shutdown().await?;
    Ok(())
}
