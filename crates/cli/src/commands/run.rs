//! `feedreply run`: watch a feed and reply until Ctrl+C.

use std::io::Write;
use std::sync::Arc;

use feedreply_agent::{LoopController, LoopEvent, ReplyGenerator, Scenario};
use feedreply_config::AppConfig;
use feedreply_core::error::AdapterError;
use feedreply_core::feed::FeedSurface;
use feedreply_core::session::SessionStore;
use feedreply_feed::{ChromiumFeed, ChromiumOptions, ConsoleFeed};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Command-line overrides for the loop.
#[derive(Debug, Default)]
pub struct RunOptions {
    pub url: Option<String>,
    pub console: bool,
    pub test_mode: bool,
    pub no_stream: bool,
    pub echo_stream: bool,
    pub scenario: Option<String>,
}

impl RunOptions {
    fn apply(&self, config: &mut AppConfig) -> Result<(), String> {
        if self.test_mode {
            config.monitor.test_mode = true;
        }
        if self.no_stream {
            config.reply.stream = false;
        }
        if self.echo_stream {
            config.reply.echo_stream = true;
        }
        if let Some(scenario) = &self.scenario {
            let parsed: Scenario = scenario.parse()?;
            config.reply.scenario = parsed.id().to_string();
        }
        Ok(())
    }
}

pub async fn run(options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    options.apply(&mut config)?;

    if !config.has_api_key() && config.default_provider != "backend" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    FEEDREPLY_API_KEY=sk-...   (generic)");
        eprintln!("    OPENAI_API_KEY=sk-...      (for OpenAI direct)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        eprintln!("  To route through a running `feedreply serve` instead, set");
        eprintln!("  default_provider = \"backend\".");
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let router = feedreply_providers::build_from_config(&config);
    let provider = router.default().ok_or("No default provider configured")?;

    let mut chromium: Option<Arc<ChromiumFeed>> = None;
    let feed: Arc<dyn FeedSurface> = if options.console {
        Arc::new(ConsoleFeed::start())
    } else {
        let session = SessionStore::load(&config.feed.session_path()).await?;
        if session.is_empty() {
            warn!(path = %config.feed.session_path().display(), "Session file has no cookies");
        }
        let browser_options = ChromiumOptions::from_config(&config.feed, options.url.as_deref());
        match ChromiumFeed::open(browser_options, &session).await {
            Ok(feed) => {
                let feed = Arc::new(feed);
                chromium = Some(feed.clone());
                feed
            }
            Err(AdapterError::NotLoggedIn { url }) => {
                eprintln!();
                eprintln!("  ERROR: The chat client asked for a login ({url}).");
                eprintln!("  Export fresh cookies to {}", config.feed.session_path().display());
                eprintln!("  and run again.");
                eprintln!();
                return Err("Not logged in".into());
            }
            Err(e) => return Err(e.into()),
        }
    };

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_events(event_rx, config.reply.echo_stream));

    let mut generator = ReplyGenerator::from_config(provider, &config);
    if config.reply.echo_stream {
        generator = generator.with_events(event_tx.clone());
    }
    let mut controller =
        LoopController::from_config(feed.clone(), generator, &config).with_events(event_tx);

    println!();
    println!("  feedreply");
    println!("  =========");
    println!("  Feed:      {}", feed.name());
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Scenario:  {}", config.reply.scenario);
    println!("  Streaming: {}", if config.reply.stream { "on" } else { "off" });
    if config.monitor.test_mode {
        println!("  Test mode: ON (own messages are answered too)");
    }
    println!();
    if options.console {
        println!("  Type messages as the other person. `/image <path> [caption]` sends an image.");
        println!("  Type 'exit' or press Ctrl+C to quit.");
    } else {
        println!("  Watching for new messages. Press Ctrl+C to stop.");
    }
    println!();

    let (stop_tx, stop_rx) = watch::channel(false);
    let result = {
        let run = controller.run(stop_rx);
        tokio::pin!(run);

        // Stop is observed between iterations, so a delivery in progress finishes
        tokio::select! {
            result = &mut run => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, stopping after the current iteration");
                let _ = stop_tx.send(true);
                run.await
            }
        }
    };

    if let Some(browser) = chromium {
        browser.close().await;
    }
    // Dropping the controller closes the event channel
    drop(controller);
    let _ = printer.await;

    let stats = result?;
    println!();
    println!(
        "  Stopped after {} iterations: {} replies, {} segments sent, {} ignored.",
        stats.iterations, stats.replies, stats.segments_sent, stats.ignored
    );
    println!();

    Ok(())
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<LoopEvent>, echo_fragments: bool) {
    let mut mid_line = false;
    while let Some(event) = rx.recv().await {
        match event {
            LoopEvent::Fragment { content } if echo_fragments => {
                if !mid_line {
                    print!("  ... ");
                    mid_line = true;
                }
                print!("{content}");
                let _ = std::io::stdout().flush();
            }
            LoopEvent::Replied { segments, .. } => {
                if mid_line {
                    println!();
                    mid_line = false;
                }
                println!("  sent > {}", segments.join(" | "));
            }
            LoopEvent::Failed { stage, message, .. } => {
                if mid_line {
                    println!();
                    mid_line = false;
                }
                eprintln!("  [{stage} failed] {message}");
            }
            _ => {}
        }
    }
}
