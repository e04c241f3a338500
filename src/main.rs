use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use recipe_bot::bot::{self, RecipeBot};
use recipe_bot::config::ConfigArgs;
use recipe_bot::generation::{GenerationClient, GenerationRequest, RecipeGenerator};
use recipe_bot::telegram::TelegramClient;
use recipe_bot::web_server;

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the Telegram bot and the debug HTTP server.
    Start {
        #[arg(long, env = "DEBUG_PORT", default_value_t = 8080, help = "Port for the debug server.")]
        port: u16,
    },
    /// Generate recipes once and print them as JSON.
    Generate {
        #[arg(long, help = "Ingredients to cook with.")]
        ingredients: String,
        #[arg(long, default_value_t = 1, help = "How many recipes to ask for (1-3).")]
        count: u32,
    },
}

// The main entry point of the application, using tokio's async runtime
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for environment variables like API keys)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG environment variable (e.g., RUST_LOG=info,recipe_bot=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    info!("recipe-bot starting with command: {:?}", cli.command);

    let generation_config = cli
        .config
        .generation()
        .context("Invalid generation settings")?;
    let generator: Arc<dyn RecipeGenerator> = Arc::new(
        GenerationClient::new(generation_config).context("Failed to build generation client")?,
    );

    match cli.command {
        Commands::Start { port } => start(&cli.config, port, generator).await?,
        Commands::Generate { ingredients, count } => {
            let recipes = generator
                .generate(&GenerationRequest::new(ingredients, count))
                .await
                .context("Recipe generation failed")?;
            println!("{}", serde_json::to_string_pretty(&recipes)?);
        }
    }

    Ok(())
}

async fn start(config: &ConfigArgs, port: u16, generator: Arc<dyn RecipeGenerator>) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let web_generator = generator.clone();
    let web_shutdown = shutdown_rx.clone();
    let mut web_server_handle = tokio::spawn(async move {
        if let Err(e) = web_server::start_web_server(port, web_generator, web_shutdown).await {
            error!("Debug server failed: {:?}", e);
        }
    });

    let telegram_config = config.telegram();
    let mut bot_handle = match telegram_config.validate() {
        Ok(()) => {
            let telegram = Arc::new(
                TelegramClient::new(&telegram_config).context("Failed to build Telegram client")?,
            );
            match telegram.get_me().await {
                Ok(username) => info!("Bot registered as @{}", username),
                Err(e) => warn!("Could not verify bot token: {}", e),
            }
            if !telegram_config.username.is_empty() {
                info!("Configured bot username: {}", telegram_config.username);
            }

            let recipe_bot = Arc::new(RecipeBot::new(
                generator,
                telegram.clone(),
                telegram_config.request_timeout,
            ));
            Some(tokio::spawn(bot::run_polling(
                recipe_bot,
                telegram,
                shutdown_rx,
            )))
        }
        Err(e) => {
            warn!("{}; skipping bot registration. Set TELEGRAM_BOT_TOKEN to enable it.", e);
            None
        }
    };

    tokio::select! {
        // Wait for Ctrl-C signal for graceful shutdown
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, initiating shutdown...");
        }
        res = &mut web_server_handle => {
            match res {
                Ok(_) => info!("Debug server task completed unexpectedly."),
                Err(e) if e.is_panic() => error!("Debug server task panicked: {:?}", e),
                Err(e) => error!("Debug server task failed: {:?}", e),
            }
        }
        res = async {
            match bot_handle.as_mut() {
                Some(handle) => handle.await,
                None => std::future::pending().await,
            }
        } => {
            match res {
                Ok(_) => info!("Bot task completed unexpectedly."),
                Err(e) if e.is_panic() => error!("Bot task panicked: {:?}", e),
                Err(e) => error!("Bot task failed: {:?}", e),
            }
        }
    }

    // Both tasks watch this channel and wind down on their own.
    let _ = shutdown_tx.send(true);
    if !web_server_handle.is_finished() {
        let _ = web_server_handle.await;
    }
    if let Some(handle) = bot_handle {
        if !handle.is_finished() {
            let _ = handle.await;
        }
    }
    info!("Shutdown complete.");
    Ok(())
}
