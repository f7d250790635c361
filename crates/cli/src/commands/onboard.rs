//! `feedreply onboard`: first-time setup.

use feedreply_config::AppConfig;

const SESSION_TEMPLATE: &str = r#"{
  "facebook": {
    "cookies": {
      "c_user": "",
      "xs": "",
      "datr": ""
    }
  }
}
"#;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("  feedreply: first-time setup");
    println!("  ===========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("  Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("  Created config.toml at: {}", config_path.display());
    }

    let session_path = AppConfig::default().feed.session_path();
    if !session_path.exists() {
        std::fs::write(&session_path, SESSION_TEMPLATE)?;
        println!("  Created session template at: {}", session_path.display());
    }

    println!("\n  Next steps:");
    println!("   1. Add your API key to {} (or set OPENAI_API_KEY)", config_path.display());
    println!("   2. Paste your chat cookies into {}", session_path.display());
    println!("   3. Run: feedreply run --console   (try it in the terminal)");
    println!("   4. Run: feedreply run             (drive the real chat)\n");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedreply_core::session::SessionStore;

    #[test]
    fn session_template_parses() {
        let store = SessionStore::from_json(SESSION_TEMPLATE).unwrap();
        assert_eq!(store.get("c_user"), Some(""));
    }
}
