//! `feedreply doctor`: diagnose setup problems.

use feedreply_config::AppConfig;
use feedreply_core::session::SessionStore;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("  feedreply doctor");
    println!("  ================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    let config = if config_path.exists() {
        match AppConfig::load() {
            Ok(config) => {
                println!("  [ok]   Config file valid");
                Some(config)
            }
            Err(e) => {
                println!("  [fail] Config file invalid: {e}");
                issues += 1;
                None
            }
        }
    } else {
        println!("  [warn] No config file; defaults in use (run `feedreply onboard`)");
        issues += 1;
        AppConfig::load().ok()
    };

    if let Some(config) = config {
        if config.has_api_key() || config.default_provider == "backend" {
            println!("  [ok]   Generation provider: {}", config.default_provider);
        } else {
            println!("  [warn] No API key configured; set OPENAI_API_KEY or api_key");
            issues += 1;
        }

        let session_path = config.feed.session_path();
        match SessionStore::load(&session_path).await {
            Ok(store) if store.iter().any(|(_, value)| !value.is_empty()) => {
                println!("  [ok]   Session file has {} cookies", store.len());
            }
            Ok(_) => {
                println!("  [warn] No cookies in {}", session_path.display());
                issues += 1;
            }
            Err(e) => {
                println!("  [fail] Session file unreadable: {e}");
                issues += 1;
            }
        }

        if let Some(chrome) = &config.feed.chrome_path {
            if std::path::Path::new(chrome).exists() {
                println!("  [ok]   Chrome binary: {chrome}");
            } else {
                println!("  [fail] Chrome binary not found: {chrome}");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
