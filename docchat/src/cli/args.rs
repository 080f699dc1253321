//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Docchat - chat with your documents from the terminal
#[derive(Parser, Debug)]
#[command(name = "docchat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// REST base URL (overrides DOCCHAT_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Channel URL (overrides DOCCHAT_SOCKET_URL)
    #[arg(long, global = true)]
    pub socket_url: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List sessions grouped by recency
    Sessions,

    /// Rename a session
    Rename {
        /// Session ID
        id: String,

        /// New title
        #[arg(trailing_var_arg = true, required = true)]
        title: Vec<String>,
    },

    /// Pin or unpin a session
    Pin {
        /// Session ID
        id: String,
    },

    /// Delete a session
    Delete {
        /// Session ID
        id: String,
    },

    /// Start a session for an uploaded document
    New {
        /// Document ID
        document_id: String,
    },

    /// List uploaded documents
    Documents,

    /// Delete a document
    DocumentDelete {
        /// Document ID
        id: String,
    },

    /// Show the messages of a session
    History {
        /// Session ID
        session_id: String,
    },

    /// Upload a document (10 MB max)
    Upload {
        /// File to upload
        path: PathBuf,

        /// Send over the real-time channel and follow processing progress
        #[arg(long)]
        via_channel: bool,
    },

    /// Chat with a session interactively (one message per line)
    Chat {
        /// Session ID
        session_id: String,

        /// Ask through the chunked HTTP endpoint instead of the channel
        #[arg(long)]
        http_stream: bool,
    },
}
