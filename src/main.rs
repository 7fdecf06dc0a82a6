mod cli;
mod core;
mod error;
mod tui;

use crate::cli::{Cli, Commands, KeyAction, OutputFormat};
use crate::core::annotate;
use crate::core::timestamp::{format_timestamp, seconds_from_f64};
use crate::core::{BackendClient, Config, KeyStore, VideoRef};
use crate::error::{Error, Result};
use crate::tui::{App, EventHandler, init as tui_init, restore as tui_restore, ui};
use clap::Parser;
use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "vidchat.log";
const FALLBACK_WIDTH: usize = 100;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config();
    let store = KeyStore::open(&config.data_dir)?;

    let interactive = matches!(cli.command, None | Some(Commands::Tui { .. }));
    init_logging(&store, interactive)?;

    match cli.command {
        Some(Commands::Sections { video_url }) => {
            run_cli_sections(&config, &store, &video_url).await?;
        }
        Some(Commands::Ask {
            video_url,
            question,
            format,
        }) => {
            run_cli_ask(&config, &store, &video_url, &question, format).await?;
        }
        Some(Commands::Search { video_url, query }) => {
            run_cli_search(&config, &store, &video_url, &query).await?;
        }
        Some(Commands::Annotate { format }) => {
            run_cli_annotate(format)?;
        }
        Some(Commands::Key { action }) => {
            run_cli_key(&store, action)?;
        }
        Some(Commands::Chats) => {
            run_cli_chats(&store)?;
        }
        Some(Commands::Tui { video_url }) => {
            run_tui(&config, store, video_url.as_deref()).await?;
        }
        None => {
            run_tui(&config, store, None).await?;
        }
    }

    Ok(())
}

// The TUI owns the terminal, so its log goes to a file in the data directory.
fn init_logging(store: &KeyStore, interactive: bool) -> Result<()> {
    let default = if interactive { "vidchat=info" } else { "vidchat=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    if interactive {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(store.root().join(LOG_FILE))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }

    Ok(())
}

fn parse_video(input: &str) -> Result<VideoRef> {
    VideoRef::parse(input).ok_or_else(|| Error::custom("Invalid video URL or ID"))
}

async fn run_cli_sections(config: &Config, store: &KeyStore, video_url: &str) -> Result<()> {
    let video = parse_video(video_url)?;
    let api_key = config.require_api_key(store)?;
    let backend = BackendClient::new(&config.backend_url, config.timeout)?;

    println!("Summarizing video: {}", video.id);
    let sections = backend.fetch_sections(&video.watch_url(), &api_key).await?;

    if sections.is_empty() {
        println!("No sections returned.");
        return Ok(());
    }

    for section in sections {
        if let Some(error) = &section.error {
            println!("{:<16} error: {error}", "");
            continue;
        }
        let range = format!("{}-{}", section.start, section.end);
        println!("{range:<16} {}", section.summary);
    }

    Ok(())
}

async fn run_cli_ask(
    config: &Config,
    store: &KeyStore,
    video_url: &str,
    question: &str,
    format: OutputFormat,
) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        return Err(Error::custom("Question cannot be empty"));
    }

    let video = parse_video(video_url)?;
    let api_key = config.require_api_key(store)?;
    let backend = BackendClient::new(&config.backend_url, config.timeout)?;

    info!(video_id = %video.id, "asking question");
    let raw = backend
        .ask_question(&video.watch_url(), question, &api_key)
        .await?;
    let fragments = annotate::annotate(&raw);

    match format {
        OutputFormat::Html => println!("{}", annotate::to_html(&fragments)),
        OutputFormat::Text => {
            let width = crossterm::terminal::size()
                .map(|(cols, _)| cols as usize)
                .unwrap_or(FALLBACK_WIDTH);
            for line in annotate::to_text(&fragments).lines() {
                if line.is_empty() {
                    println!();
                    continue;
                }
                for wrapped in textwrap::wrap(line, width) {
                    println!("{wrapped}");
                }
            }

            let seconds = annotate::timestamps(&fragments);
            if !seconds.is_empty() {
                println!();
                for s in seconds {
                    println!("{:>8}  {}", format_timestamp(s), video.watch_url_at(s));
                }
            }
        }
    }

    Ok(())
}

async fn run_cli_search(
    config: &Config,
    store: &KeyStore,
    video_url: &str,
    query: &str,
) -> Result<()> {
    let query = query.trim();
    if query.is_empty() {
        return Err(Error::custom("Search query cannot be empty"));
    }

    let video = parse_video(video_url)?;
    let api_key = config.require_api_key(store)?;
    let backend = BackendClient::new(&config.backend_url, config.timeout)?;

    println!("Searching video frames: {}", video.id);
    match backend
        .visual_search(&video.watch_url(), query, &api_key)
        .await?
    {
        Some(result) => {
            let seconds = seconds_from_f64(result.timestamp);
            let score = result
                .score
                .map(|s| format!(" ({s:.2})"))
                .unwrap_or_default();
            println!(
                "Best match at {}{score}: {}",
                format_timestamp(seconds),
                result.description
            );
            println!("{}", video.watch_url_at(seconds));
        }
        None => println!("No matching frame"),
    }

    Ok(())
}

fn run_cli_annotate(format: OutputFormat) -> Result<()> {
    let raw = io::read_to_string(io::stdin())?;
    let fragments = annotate::annotate(&raw);

    match format {
        OutputFormat::Html => println!("{}", annotate::to_html(&fragments)),
        OutputFormat::Text => println!("{}", annotate::to_text(&fragments)),
    }

    Ok(())
}

fn run_cli_key(store: &KeyStore, action: KeyAction) -> Result<()> {
    match action {
        KeyAction::Set { key } => {
            store.save_api_key(&key)?;
            println!("API key saved to {}", store.storage_path().display());
        }
        KeyAction::Show => match store.load_api_key()? {
            Some(key) => println!("{}", mask_key(&key)),
            None => println!("No API key stored."),
        },
        KeyAction::Clear => {
            if store.clear_api_key()? {
                println!("API key removed.");
            } else {
                println!("No API key stored.");
            }
        }
    }

    Ok(())
}

fn mask_key(key: &str) -> String {
    let count = key.chars().count();
    if count <= 8 {
        return "*".repeat(count);
    }
    let head: String = key.chars().take(4).collect();
    let tail: String = key.chars().skip(count - 4).collect();
    format!("{head}{}{tail}", "*".repeat(count - 8))
}

fn run_cli_chats(store: &KeyStore) -> Result<()> {
    let chats = store.list_chats()?;

    if chats.is_empty() {
        println!("No chats exported yet.");
        return Ok(());
    }

    println!("Found {} chats:", chats.len());
    println!();

    for chat in chats {
        let size_kb = chat.size / 1024;
        let size_str = if size_kb < 1024 {
            format!("{size_kb}KB")
        } else {
            format!("{:.1}MB", size_kb as f64 / 1024.0)
        };
        let modified: chrono::DateTime<chrono::Local> = chat.modified.into();

        println!(
            "{:<14} {:<18} {:>8}  {}",
            chat.video_id().unwrap_or("?"),
            modified.format("%Y-%m-%d %H:%M"),
            size_str,
            chat.path.display()
        );
    }

    Ok(())
}

async fn run_tui(config: &Config, store: KeyStore, video_url: Option<&str>) -> Result<()> {
    let mut app = App::new(config, store)?;
    if let Some(url) = video_url {
        app.open_initial(url);
    }

    let mut terminal = tui_init()?;
    let event_handler = EventHandler::new(Duration::from_millis(100));
    info!(backend = %config.backend_url, "tui started");

    // Main event loop
    let outcome = loop {
        let event = match event_handler.next_event() {
            Ok(event) => event,
            Err(e) => break Err(e),
        };
        if let Err(e) = app.handle_event(event) {
            break Err(e);
        }

        if let Err(e) = terminal.draw(|f| ui::draw(f, &mut app)) {
            break Err(e.into());
        }

        if app.should_quit {
            break Ok(());
        }
    };

    tui_restore()?;
    outcome
}
