//! `taskpilot config`: Configuration management commands.

use taskpilot_config::AppConfig;

fn set_or_unset(value: bool) -> &'static str {
    if value { "set" } else { "not set" }
}

pub fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed successfully");

            let mut warnings = Vec::new();

            if !config.has_api_key() {
                warnings.push("No server API key set (TASKPILOT_API_KEY or OPENAI_API_KEY); `serve` only helps callers with their own key");
            }

            if config.gateway.host == "0.0.0.0" && config.has_api_key() {
                warnings.push("Gateway bound to 0.0.0.0 lets any host spend the server keys");
            }

            if config.gateway.rate_limit_per_minute == 0 {
                warnings.push("gateway.rate_limit_per_minute is 0; every capability request will be refused");
            }

            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let limits = config.loop_limits();

    println!("   Model:        {}", config.default_model);
    println!("   Temperature:  {}", config.default_temperature);
    println!("   Max tokens:   {}", config.default_max_tokens);
    println!("   API URL:      {}", config.api_url);
    println!(
        "   Server keys:  {} ({})",
        set_or_unset(config.has_api_key()),
        config.server_keys().len()
    );
    println!("   Guest keys:   {}", config.guest.keys.len());
    println!("   Loops:        {} free / {} keyed", limits.free, limits.keyed);
    println!(
        "   Pacing:       {} ms per task, {} ms per phase",
        config.pacing.task_delay_ms, config.pacing.phase_delay_ms
    );
    println!(
        "   Web search:   {}",
        set_or_unset(config.search.serper_api_key.is_some())
    );
    println!(
        "   Gateway:      {}:{}",
        config.gateway.host, config.gateway.port
    );
    println!("   Proxy URL:    {}", config.client.proxy_url);
    Ok(())
}

pub fn path() {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
}

pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if config_path.exists() {
        println!("Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete it and re-run `taskpilot config init`.");
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)?;
    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("Created config.toml at: {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("   1. Set OPENAI_API_KEY to serve other clients, or pass --api-key to `run`");
    println!("   2. Run: taskpilot run \"<your goal>\"");
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn config_path_is_valid() {
        let path = taskpilot_config::AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn default_toml_parses_back() {
        let text = taskpilot_config::AppConfig::default_toml();
        let parsed: taskpilot_config::AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.gateway.port, 3000);
    }
}
