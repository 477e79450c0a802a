//! Skylark CLI
//!
//! Command-line client for the skylark network.
//!
//! # Commands
//!
//! - `login` - Save a profile and establish a session
//! - `post` - Create a post, optionally as a reply
//! - `like` / `repost` / `follow` / `delete` - One-shot repository actions
//! - `profile` - Show a profile view
//! - `stream` - Attach to the live event stream
//! - `profiles` - List saved profiles

mod commands;
mod config;
mod http;
mod ws;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::stream::StreamOpts;
use crate::config::Config;

/// Skylark command-line client.
#[derive(Parser)]
#[command(name = "skylark")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Use a named profile instead of the default one
    #[arg(global = true, short, long)]
    profile: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a profile and establish a session
    Login {
        /// Account identifier (handle)
        identifier: String,

        /// Account secret
        secret: String,

        /// Service host to log in against
        #[arg(long)]
        service: Option<String>,
    },

    /// Create a post
    Post {
        /// Post text
        #[arg(required = true)]
        text: Vec<String>,

        /// Reply to this record URI
        #[arg(short, long)]
        reply_to: Option<String>,
    },

    /// Like posts
    Like {
        /// Record URIs to like
        #[arg(required = true)]
        uris: Vec<String>,
    },

    /// Repost posts
    Repost {
        /// Record URIs to repost
        #[arg(required = true)]
        uris: Vec<String>,
    },

    /// Follow accounts
    Follow {
        /// Accounts to follow
        #[arg(required = true)]
        accounts: Vec<String>,
    },

    /// Delete records from your repository
    Delete {
        /// Record URIs to delete
        #[arg(required = true)]
        uris: Vec<String>,
    },

    /// Show a profile view
    Profile {
        /// Account to show (defaults to your own)
        actor: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Attach to the live event stream
    Stream {
        /// Resume from this cursor
        #[arg(short, long)]
        cursor: Option<u64>,

        /// Only surface posts matching this pattern
        #[arg(long)]
        pattern: Option<String>,

        /// Auto-reply to every surfaced post with this text
        #[arg(long)]
        reply: Option<String>,

        /// Output as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// List saved profiles
    Profiles,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::Login {
            identifier,
            secret,
            service,
        } => {
            commands::login::run(profile, identifier, secret, service)?;
        }
        Commands::Post { text, reply_to } => {
            let config = Config::load(profile)?;
            commands::post::run(&config, text.join(" "), reply_to)?;
        }
        Commands::Like { uris } => {
            let config = Config::load(profile)?;
            commands::actions::like(&config, &uris)?;
        }
        Commands::Repost { uris } => {
            let config = Config::load(profile)?;
            commands::actions::repost(&config, &uris)?;
        }
        Commands::Follow { accounts } => {
            let config = Config::load(profile)?;
            commands::actions::follow(&config, &accounts)?;
        }
        Commands::Delete { uris } => {
            let config = Config::load(profile)?;
            commands::actions::delete(&config, &uris)?;
        }
        Commands::Profile { actor, json } => {
            let config = Config::load(profile)?;
            commands::profile::run(&config, actor, json)?;
        }
        Commands::Stream {
            cursor,
            pattern,
            reply,
            json,
        } => {
            let config = Config::load(profile)?;
            commands::stream::run(
                &config,
                StreamOpts {
                    cursor,
                    pattern,
                    reply,
                    json,
                },
            )?;
        }
        Commands::Profiles => {
            for name in Config::profiles()? {
                println!("{name}");
            }
        }
        Commands::Version => {
            println!("skylark v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
