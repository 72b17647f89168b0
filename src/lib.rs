mod utils;

pub mod attention;
pub mod error;
pub mod events;
pub mod pacing;
pub mod playback;
pub mod reader;
pub mod remote;
pub mod settings;
pub mod text;

use std::{
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

use attention::{ActivityPresence, ActivitySignal};
use events::ReaderEvent;
use playback::PlaybackStatus;
use reader::{ReaderCommand, ReaderSession};
use remote::{AiService, HttpAiClient};
use settings::{ReaderSettings, SettingsStore};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Default)]
struct CliArgs {
    path: Option<PathBuf>,
    settings: Option<PathBuf>,
    smart: bool,
    summary: bool,
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<CliArgs> {
    let mut parsed = CliArgs::default();
    let mut args = args;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--smart" => parsed.smart = true,
            "--summary" => parsed.summary = true,
            "--settings" => {
                let path = args.next().context("--settings needs a path")?;
                parsed.settings = Some(PathBuf::from(path));
            }
            other if other.starts_with("--") => anyhow::bail!("unknown flag {other}"),
            other => parsed.path = Some(PathBuf::from(other)),
        }
    }
    Ok(parsed)
}

/// Terminal controls. Every line also counts as reader activity.
fn command_from_line(line: &str) -> Option<ReaderCommand> {
    match line.trim() {
        "p" | "space" => Some(ReaderCommand::TogglePlay),
        ">" => Some(ReaderCommand::SkipForward),
        "<" => Some(ReaderCommand::SkipBackward),
        "+" => Some(ReaderCommand::WpmUp),
        "-" => Some(ReaderCommand::WpmDown),
        "r" => Some(ReaderCommand::Restart),
        "q" => Some(ReaderCommand::Close),
        "s" => Some(ReaderCommand::ToggleSmartPacer),
        "m" => Some(ReaderCommand::Summarize),
        _ => None,
    }
}

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log_info!("swiftread starting up...");

    let args = parse_args(std::env::args().skip(1))?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let result = runtime.block_on(read_to_terminal(args));
    // The stdin reader may still be parked on a blocking read.
    runtime.shutdown_background();
    result
}

async fn read_to_terminal(args: CliArgs) -> Result<()> {
    let settings = match &args.settings {
        Some(path) => SettingsStore::new(path.clone())?.get()?,
        None => ReaderSettings::default(),
    };
    let attention_config = settings.attention.clone();

    let text = match &args.path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buffer)
                .await
                .context("Failed to read text from stdin")?;
            buffer
        }
    };

    let ai: Option<Arc<dyn AiService>> = match HttpAiClient::from_env() {
        Ok(client) => Some(Arc::new(client)),
        Err(err) => {
            log_info!("smart features disabled: {err}");
            None
        }
    };

    let session = ReaderSession::new(settings, ai);
    let mut events = session.events().subscribe();

    if session.load_text(&text).await.is_err() {
        eprintln!("No text to read.");
        return Ok(());
    }

    if args.summary {
        if let Some(handle) = session.request_summary().await {
            handle.await.context("summary task failed")?;
        }
    }
    if args.smart && !session.smart_pacer().await.enabled {
        session.toggle_smart_pacer().await;
    }

    let quit = CancellationToken::new();

    // Stdin carries the text when no path is given, so it can't double as
    // the activity signal.
    if args.path.is_some() {
        let signal = ActivitySignal::new();
        let source = ActivityPresence::new(signal.clone(), &attention_config);
        if session.start_tracking(Box::new(source)).await.is_ok() {
            tokio::spawn(forward_stdin(session.clone(), signal, quit.clone()));
        }
    }

    session.play().await.ok();
    tokio::select! {
        result = render(&mut events) => result?,
        _ = quit.cancelled() => {}
    }

    session.close().await;
    let info = session.info().await;
    let snapshot = session.snapshot().await;
    println!(
        "\nRead {} words in {}s (session {}, opened {})",
        snapshot.total_words,
        snapshot.read_elapsed_secs.unwrap_or_default(),
        info.id,
        info.opened_at.format("%Y-%m-%d %H:%M:%S")
    );
    Ok(())
}

async fn forward_stdin(session: ReaderSession, signal: ActivitySignal, quit: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        signal.record_activity();
        match command_from_line(&line) {
            Some(ReaderCommand::Close) => {
                quit.cancel();
                return;
            }
            Some(command) => session.handle_command(command).await,
            None => {}
        }
    }
}

/// Prints each step with its focal letter bracketed until playback finishes.
async fn render(events: &mut broadcast::Receiver<ReaderEvent>) -> Result<()> {
    let mut last_index = usize::MAX;
    let mut stdout = io::stdout();
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                log_warn!("renderer skipped {skipped} events");
                continue;
            }
            Err(RecvError::Closed) => return Ok(()),
        };

        match event {
            ReaderEvent::PlaybackChanged { snapshot } => {
                if snapshot.status == PlaybackStatus::Finished {
                    return Ok(());
                }
                if snapshot.index != last_index && !snapshot.display_text.is_empty() {
                    last_index = snapshot.index;
                    let orp = &snapshot.orp;
                    write!(
                        stdout,
                        "\r\x1b[2K{}[{}]{}  {}  {}",
                        orp.before,
                        orp.focal,
                        orp.after,
                        snapshot.progress_label,
                        snapshot.time_left
                    )?;
                    stdout.flush()?;
                }
            }
            ReaderEvent::Notice { message } => eprintln!("\n{message}"),
            ReaderEvent::TrackingError { message } => {
                eprintln!("\nattention tracking off: {message}")
            }
            ReaderEvent::AttentionChanged { state, meta } => {
                log_info!("attention {state:?} ({meta})");
            }
            ReaderEvent::Rewound { from, to, .. } => log_info!("rewound {from} -> {to}"),
            ReaderEvent::SpeedChanged { .. } | ReaderEvent::SmartPacerChanged { .. } => {}
        }
    }
}
