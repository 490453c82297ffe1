use tokio_util::sync::CancellationToken;
use tracing::info;

use parley::{ChatListener, Config};

#[tokio::main]
async fn main() -> parley::Result<()> {
    // Load configuration
    let config = match Config::load("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };

    // Initialize logging
    if let Err(e) = parley::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        parley::logging::init_console_only(&config.logging.level);
    }

    info!("parley chat relay");

    let listener = ChatListener::bind(&config.server).await?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            signal.cancel();
        }
    });

    listener.run(shutdown).await
}
