use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ethics_adventure::config::{self, ApiKeyStatus};
use ethics_adventure::server::{self, ApiState};
use ethics_adventure::ui::terminal::TerminalGame;
use ethics_adventure::{AppConfig, PlaythroughEngine, PromptSpec, StoryProvider};

/// AI ethics choose-your-own-adventure.
#[derive(Parser, Debug)]
#[command(name = "ethics_adventure")]
#[command(version)]
struct Args {
    /// Path to a JSON config file (defaults to the per-user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve POST /generate for other front ends
    Serve {
        /// First port to try
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Play in this terminal
    Play,
    /// Probe the configured endpoints and report the first live one
    Check,
    /// Write the default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    dotenvy::dotenv().ok();
    let args = Args::parse();

    if let Command::InitConfig { force } = args.command {
        return init_config(args.config, force);
    }

    let mut config = config::load_config(args.config.as_deref()).context("loading configuration")?;
    report_api_key(&config);

    match args.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(&config)
        }
        Command::Play => play(&config),
        Command::Check => check(&config),
        Command::InitConfig { .. } => Ok(()),
    }
}

fn report_api_key(config: &AppConfig) {
    match config.api_key_status() {
        ApiKeyStatus::Placeholder => warn!(status = %ApiKeyStatus::Placeholder, "API key"),
        status => info!(%status, "API key"),
    }
}

fn serve(config: &AppConfig) -> Result<()> {
    // Built outside the runtime: the blocking HTTP client must not be created
    // or dropped on an async thread.
    let provider = Arc::new(StoryProvider::from_config(config)?);
    let state = ApiState::new(Arc::clone(&provider), PromptSpec::from_config(config));

    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    runtime
        .block_on(server::serve(&config.server, state))
        .context("running server")?;
    Ok(())
}

fn play(config: &AppConfig) -> Result<()> {
    let provider = StoryProvider::from_config(config)?;
    let prompt = PromptSpec::from_config(config);
    let engine = PlaythroughEngine::new(&config.story);

    let stdin = io::stdin();
    TerminalGame::new(&provider, &prompt, engine).run(stdin.lock(), io::stdout())?;
    Ok(())
}

fn check(config: &AppConfig) -> Result<()> {
    let provider = StoryProvider::from_config(config)?;
    let endpoint = provider.discover_endpoint()?;
    println!("Story service found at {endpoint}");
    Ok(())
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = path.unwrap_or_else(config::config_path);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    config::save_config(&AppConfig::default(), &path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
