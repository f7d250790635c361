//! `feedreply status`: show the effective configuration.

use feedreply_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let on_off = |b: bool| if b { "on" } else { "off" };

    println!("  feedreply status");
    println!("  ================");
    println!("  Config dir:    {}", AppConfig::config_dir().display());
    println!("  Provider:      {}", config.default_provider);
    println!("  Model:         {}", config.default_model);
    println!("  Temperature:   {}", config.default_temperature);
    println!("  Max tokens:    {}", config.default_max_tokens);
    println!("  Scenario:      {}", config.reply.scenario);
    println!("  Streaming:     {}", on_off(config.reply.stream));
    println!("  Feed:          {} ({})", config.feed.kind, config.feed.default_url);
    println!("  Session file:  {}", config.feed.session_path().display());
    println!("  Poll interval: {} ms", config.monitor.poll_interval_ms);
    println!("  Test mode:     {}", on_off(config.monitor.test_mode));
    println!("  Gateway:       {}:{}", config.gateway.host, config.gateway.port);

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file; run `feedreply onboard` first");
    }

    Ok(())
}
