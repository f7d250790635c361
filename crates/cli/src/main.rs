//! feedreply CLI entry point.
//!
//! Commands:
//! - `run`: watch a chat feed and reply to new messages
//! - `serve`: start the HTTP suggestion / webhook server
//! - `onboard`: write a default config file
//! - `status`: show the effective configuration
//! - `doctor`: diagnose setup problems

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "feedreply",
    about = "feedreply: chat feed auto-responder",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a chat feed and reply to new messages
    Run {
        /// Open this conversation instead of the configured default
        #[arg(long)]
        url: Option<String>,

        /// Use the terminal as the feed instead of a browser
        #[arg(long)]
        console: bool,

        /// Also answer our own messages (bot talks to itself)
        #[arg(long)]
        test_mode: bool,

        /// Wait for complete replies instead of streaming
        #[arg(long)]
        no_stream: bool,

        /// Print reply fragments as they stream in
        #[arg(long)]
        echo_stream: bool,

        /// Conversation scenario (interview, social, business, general)
        #[arg(long)]
        scenario: Option<String>,
    },

    /// Start the HTTP suggestion / webhook server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Write a default config file
    Onboard,

    /// Show the effective configuration
    Status,

    /// Diagnose setup problems
    Doctor,
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    match cli.command {
        Commands::Run {
            url,
            console,
            test_mode,
            no_stream,
            echo_stream,
            scenario,
        } => {
            commands::run::run(commands::run::RunOptions {
                url,
                console,
                test_mode,
                no_stream,
                echo_stream,
                scenario,
            })
            .await?
        }
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Status => commands::status::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
