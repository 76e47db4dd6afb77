mod commands;

pub use commands::{login_once, tail_log};

use clap::{Parser, Subcommand};

/// Course Runner - drives study tasks on the course portal with a saved browser session
#[derive(Parser)]
#[command(name = "course-runner")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the server (default)
    Serve,

    /// Validate cookies against the portal and save them for the next start
    Login {
        /// Cookie text copied from the browser, `name=value; name=value`
        #[arg(short, long)]
        cookies: String,
    },

    /// Show the newest lines of the persisted log
    Logs {
        /// Number of lines to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
}
