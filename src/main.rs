use bookfeed::cli::{run, Cli};
use clap::Parser;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    if cli.check {
        println!(
            "Configuration OK: {} with {} market(s)",
            config.exchange,
            config.markets.len()
        );
        return;
    }

    config.logging.init();
    info!(exchange = %config.exchange, markets = config.markets.len(), "bookfeed starting");

    if let Err(e) = run::execute(config, cli.depth).await {
        error!(error = %e, "Fatal error");
        std::process::exit(1);
    }

    info!("bookfeed stopped");
}
