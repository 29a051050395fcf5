//! CLI entry point for PlayKit Auth.

pub mod login;

use clap::{Parser, Subcommand};

/// PlayKit device authorization CLI
#[derive(Parser, Debug)]
#[command(name = "playkit-auth", version, about = "Sign in to PlayKit from the terminal")]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the device authorization flow and print the player token
    Login(LoginArgs),
    /// Show the resolved configuration
    Config,
}

/// Arguments for `playkit-auth login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Game id sent as the OAuth client id (defaults to PLAYKIT_GAME_ID)
    #[arg(short, long)]
    pub game_id: Option<String>,

    /// Scope to request (defaults to player:play)
    #[arg(short, long)]
    pub scope: Option<String>,

    /// API base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Print the verification URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}
