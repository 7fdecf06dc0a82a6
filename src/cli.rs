use crate::core::{Config, DEFAULT_BACKEND_URL, DEFAULT_DATA_DIR, DEFAULT_TIMEOUT_SECS};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "vidchat")]
#[command(about = "Chat with a YouTube video: summaries, Q&A and visual search")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Backend origin serving /sections, /question and /visual-search
    #[arg(long, env = "VIDCHAT_BACKEND_URL", default_value = DEFAULT_BACKEND_URL, global = true)]
    pub backend: String,

    /// Gemini API key (falls back to the stored key)
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Directory for the stored key, exports and the TUI log
    #[arg(long, env = "VIDCHAT_DATA_DIR", default_value = DEFAULT_DATA_DIR, global = true)]
    pub data_dir: PathBuf,

    /// Request timeout in seconds
    #[arg(long, env = "VIDCHAT_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    pub timeout: u64,
}

impl Cli {
    pub fn config(&self) -> Config {
        Config {
            backend_url: self.backend.clone(),
            api_key: self.api_key.clone(),
            data_dir: self.data_dir.clone(),
            timeout: Duration::from_secs(self.timeout),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the interactive interface
    Tui {
        /// Start directly on this video
        video_url: Option<String>,
    },

    /// Print the section summaries of a video
    Sections {
        /// YouTube video URL or video ID
        video_url: String,
    },

    /// Ask a question about a video
    Ask {
        /// YouTube video URL or video ID
        video_url: String,

        /// The question
        question: String,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Find the moment that best matches a visual description
    Search {
        /// YouTube video URL or video ID
        video_url: String,

        /// What to look for
        query: String,
    },

    /// Annotate answer text read from stdin
    Annotate {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Html)]
        format: OutputFormat,
    },

    /// Manage the stored API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// List exported chats
    Chats,
}

#[derive(Subcommand)]
pub enum KeyAction {
    /// Store a key for later runs
    Set { key: String },
    /// Show the stored key (masked)
    Show,
    /// Remove the stored key
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Html,
}
