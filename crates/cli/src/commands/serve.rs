//! `taskpilot serve`: Start the HTTP proxy gateway.

use taskpilot_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("TaskPilot Gateway");
    println!("   Listening:   {}:{}", config.gateway.host, config.gateway.port);
    println!("   Server keys: {}", config.server_keys().len());
    println!(
        "   Web search:  {}",
        if config.search.serper_api_key.is_some() { "enabled" } else { "disabled" }
    );
    println!("   Rate limit:  {}/min per client", config.gateway.rate_limit_per_minute);

    taskpilot_gateway::start(config).await?;

    Ok(())
}
