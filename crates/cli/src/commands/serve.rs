//! `feedreply serve`: start the HTTP front-end.

use feedreply_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("  feedreply gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "   Webhook verification: {}",
        if config.gateway.verify_token.is_some() { "enabled" } else { "disabled" }
    );
    println!(
        "   Signature check: {}",
        if config.gateway.app_secret.is_some() { "enabled" } else { "disabled" }
    );

    feedreply_gateway::start(config).await?;

    Ok(())
}
