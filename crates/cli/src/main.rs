//! ShopiForm CLI - Database migrations and shop management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! sf-cli migrate
//!
//! # Register an offline session for a development shop
//! sf-cli session add --shop dev-shop.myshopify.com --token shpat_... \
//!     --scope write_customers,write_companies
//!
//! # List a shop's forms
//! sf-cli forms list --shop dev-shop.myshopify.com
//!
//! # Draw a form code that no form holds yet
//! sf-cli code generate
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `session add` / `session list` / `session remove` - Manage shop sessions
//! - `forms list` - List a shop's forms
//! - `code generate` - Generate an unused form code

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sf-cli")]
#[command(author, version, about = "ShopiForm CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage shop sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Inspect forms
    Forms {
        #[command(subcommand)]
        action: FormsAction,
    },
    /// Form code utilities
    Code {
        #[command(subcommand)]
        action: CodeAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Store an access token for a shop
    Add {
        /// Shop domain (`<name>.myshopify.com`)
        #[arg(short, long)]
        shop: String,

        /// Admin API access token
        #[arg(short, long)]
        token: String,

        /// Comma-separated granted scopes
        #[arg(long, default_value = "write_customers")]
        scope: String,

        /// Store as an online (per-user) session
        #[arg(long)]
        online: bool,

        /// Session id (default: `offline_<shop>` or a random id for online sessions)
        #[arg(long)]
        id: Option<String>,
    },
    /// List a shop's sessions and show which one submissions would use
    List {
        #[arg(short, long)]
        shop: String,
    },
    /// Remove every session for a shop
    Remove {
        #[arg(short, long)]
        shop: String,
    },
}

#[derive(Subcommand)]
enum FormsAction {
    /// List a shop's forms, newest first
    List {
        #[arg(short, long)]
        shop: String,
    },
}

#[derive(Subcommand)]
enum CodeAction {
    /// Generate a code no form holds yet
    Generate,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Session { action } => match action {
            SessionAction::Add {
                shop,
                token,
                scope,
                online,
                id,
            } => {
                commands::session::add(&shop, token, &scope, online, id).await?;
            }
            SessionAction::List { shop } => commands::session::list(&shop).await?,
            SessionAction::Remove { shop } => commands::session::remove(&shop).await?,
        },
        Commands::Forms { action } => match action {
            FormsAction::List { shop } => commands::forms::list(&shop).await?,
        },
        Commands::Code { action } => match action {
            CodeAction::Generate => commands::forms::generate_code().await?,
        },
    }
    Ok(())
}
