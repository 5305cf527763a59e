//! `taskpilot run`: Pursue a goal in the terminal.

use std::io::BufRead;
use std::sync::Arc;

use clap::Args;
use taskpilot_agent::{AgentRunContext, AutonomousAgent, MessageStore, Pacing, select_gateway};
use taskpilot_config::AppConfig;
use taskpilot_core::agent::{AgentState, ExecutionMode};
use taskpilot_core::settings::ModelSettings;
use taskpilot_providers::{SerperSearch, WebSearch};
use tokio::sync::mpsc;
use tracing::debug;

use crate::terminal::TerminalHost;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// The goal to pursue
    pub goal: String,

    /// A display name for the agent
    #[arg(long, default_value = "TaskPilot")]
    pub name: String,

    /// Pause after every task until Enter is pressed
    #[arg(long)]
    pub step: bool,

    /// Let the agent search the web for tasks that need it
    #[arg(long)]
    pub web_search: bool,

    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub temperature: Option<f32>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Loop ceiling, honoured only with a personal or accepted guest key
    #[arg(long)]
    pub max_loops: Option<u32>,

    /// Language the agent answers in
    #[arg(long)]
    pub language: Option<String>,

    /// Personal API key; calls go straight to the provider
    #[arg(long, env = "TASKPILOT_PERSONAL_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// OpenAI-compatible endpoint to use with the personal key
    #[arg(long)]
    pub endpoint: Option<String>,

    #[arg(long, env = "TASKPILOT_GUEST_KEY", hide_env_values = true)]
    pub guest_key: Option<String>,
}

impl RunArgs {
    /// Model settings: configured defaults overridden by flags.
    pub fn model_settings(&self, config: &AppConfig) -> ModelSettings {
        let mut settings = config.model_settings();
        if let Some(key) = &self.api_key {
            settings.custom_api_key = key.clone();
        }
        if let Some(model) = &self.model {
            settings.custom_model_name = model.clone();
        }
        if let Some(temperature) = self.temperature {
            settings.custom_temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            settings.custom_max_tokens = Some(max_tokens);
        }
        if let Some(language) = &self.language {
            settings.custom_language = language.clone();
        }
        settings.custom_max_loops = self.max_loops;
        settings.custom_endpoint = self.endpoint.clone();
        settings.custom_guest_key = self.guest_key.clone();
        settings
    }
}

/// Read stdin lines on a plain thread so a pending read never holds up
/// runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let settings = args.model_settings(&config);

    let search =
        SerperSearch::from_config(&config.search).map(|s| Arc::new(s) as Arc<dyn WebSearch>);
    let gateway = select_gateway(&settings, &config, search);
    let guest = config.guest_settings(settings.guest_key());

    let mode = if args.step {
        ExecutionMode::PauseBetweenSteps
    } else {
        ExecutionMode::Automatic
    };

    let ctx = AgentRunContext::new(&args.name, &args.goal, settings)
        .with_mode(mode)
        .with_web_search(args.web_search)
        .with_guest(guest)
        .with_limits(config.loop_limits())
        .with_pacing(Pacing::from_config(&config.pacing));

    println!();
    println!("  {} via {}", args.name, gateway.name());
    println!("  Model:      {}", ctx.settings.model());
    println!("  Max loops:  {}", ctx.max_loops());
    println!("  Web search: {}", if args.web_search { "on" } else { "off" });
    println!();

    let store = Arc::new(MessageStore::new());
    let mut agent = AutonomousAgent::new(ctx, gateway, store, Arc::new(TerminalHost));

    let handle = agent.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.stop();
        }
    });

    let mut state = agent.run().await;
    if state == AgentState::Paused {
        let mut lines = spawn_stdin_reader();
        while state == AgentState::Paused {
            tokio::select! {
                line = lines.recv() => {
                    if line.is_none() {
                        // stdin closed
                        state = agent.stop();
                        break;
                    }
                    state = agent.resume().await;
                }
                _ = tokio::signal::ctrl_c() => {
                    state = agent.stop();
                }
            }
        }
    }

    debug!(%state, "Run ended");
    println!();
    println!(
        "  {} finished: {} ({} tasks completed, {} loops)",
        args.name,
        state,
        agent.context().completed_tasks().len(),
        agent.context().num_loops()
    );
    Ok(())
}
