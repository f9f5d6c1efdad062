//! civiq - civic issue reporting and triage from the terminal
//!
//! Operates directly on the configured record store; the API server is
//! only needed for HTTP clients and photo uploads.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use civiq_core::{Config, Engine};
use std::path::{Path, PathBuf};

mod commands;

#[derive(Parser)]
#[command(name = "civiq")]
#[command(about = "Civic issue reporting and triage")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config file and create the data directories
    Init,

    /// Report a new issue
    Create(CreateArgs),

    /// List issues, newest first
    List(ListArgs),

    /// Show issue details
    Show {
        /// Issue ID
        id: String,
    },

    /// Update an issue
    Update(UpdateArgs),

    /// Delete an issue and its comments
    Delete {
        /// Issue ID
        id: String,
    },

    /// Comment on an issue
    Comment {
        /// Issue ID
        id: String,

        /// Comment text
        content: String,

        /// Mark as an internal staff note
        #[arg(long)]
        internal: bool,
    },

    /// List comments on an issue, oldest first
    Comments {
        /// Issue ID
        id: String,
    },

    /// Show aggregate issue statistics
    Stats,

    /// Manage the civiq-api service
    Service {
        #[command(subcommand)]
        command: ServiceAction,
    },
}

#[derive(Args)]
struct CreateArgs {
    /// Issue title
    title: String,

    /// Detailed description
    #[arg(short, long)]
    description: String,

    /// Category (roads, sanitation, electricity, water, traffic, environment, other)
    #[arg(short, long, default_value = "other")]
    category: String,

    /// Priority (low, medium, high)
    #[arg(short, long, default_value = "low")]
    priority: String,

    /// State the issue is located in
    #[arg(long)]
    state: String,

    /// District within the state
    #[arg(long)]
    district: String,

    /// Free-text location description
    #[arg(short, long)]
    location: String,

    /// Latitude of the spot
    #[arg(long)]
    lat: Option<f64>,

    /// Longitude of the spot
    #[arg(long)]
    lng: Option<f64>,
}

#[derive(Args)]
struct ListArgs {
    /// Filter by state
    #[arg(long)]
    state: Option<String>,

    /// Filter by district
    #[arg(long)]
    district: Option<String>,

    /// Filter by category
    #[arg(short, long)]
    category: Option<String>,

    /// Filter by status
    #[arg(short, long)]
    status: Option<String>,

    /// Maximum number of issues to show
    #[arg(short, long)]
    limit: Option<usize>,

    /// Skip this many issues first
    #[arg(long)]
    offset: Option<usize>,
}

#[derive(Args)]
struct UpdateArgs {
    /// Issue ID
    id: String,

    /// New status (new, in_progress, resolved, closed)
    #[arg(short, long)]
    status: Option<String>,

    /// New category
    #[arg(short, long)]
    category: Option<String>,

    /// New priority
    #[arg(short, long)]
    priority: Option<String>,

    /// New title
    #[arg(long)]
    title: Option<String>,

    /// New description
    #[arg(short, long)]
    description: Option<String>,

    /// Assign to a department
    #[arg(short, long)]
    assign: Option<String>,

    /// New free-text location
    #[arg(short, long)]
    location: Option<String>,
}

#[derive(Subcommand)]
enum ServiceAction {
    /// Start the API service in the background
    Start,

    /// Run the API service in the foreground (for debugging)
    Run,

    /// Stop the API service
    Stop,

    /// Restart the API service
    Restart,

    /// Show service status
    Status,
}

fn open_engine(config: Option<&Path>) -> Result<Engine> {
    let config = Config::discover(config)?;
    let store = civiq_core::open_store(&config.storage)?;
    Ok(Engine::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let json = cli.json;
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Init => commands::init(config),
        Commands::Create(args) => commands::create(&open_engine(config)?, args, json).await,
        Commands::List(args) => commands::list(&open_engine(config)?, args, json).await,
        Commands::Show { id } => commands::show(&open_engine(config)?, &id, json).await,
        Commands::Update(args) => commands::update(&open_engine(config)?, args, json).await,
        Commands::Delete { id } => commands::delete(&open_engine(config)?, &id, json).await,
        Commands::Comment {
            id,
            content,
            internal,
        } => commands::comment(&open_engine(config)?, &id, content, internal, json).await,
        Commands::Comments { id } => commands::comments(&open_engine(config)?, &id, json).await,
        Commands::Stats => commands::stats(&open_engine(config)?, json).await,
        Commands::Service { command } => commands::service(command, config),
    }
}
