//! Command-line interface definitions.

pub mod run;

use std::path::PathBuf;

use clap::Parser;

use crate::config::{Config, ExchangeKind};
use crate::error::Result;

/// Bookfeed - Stream exchange order books and keep them in memory.
#[derive(Parser, Debug)]
#[command(name = "bookfeed")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Exchange to stream from (overrides the config file)
    #[arg(short, long)]
    pub exchange: Option<ExchangeKind>,

    /// Market to stream as ASSET/CURRENCY; repeat for several markets
    /// (replaces the markets in the config file)
    #[arg(short, long = "market", value_name = "MARKET")]
    pub markets: Vec<String>,

    /// Levels per side to log on every book change
    #[arg(short, long, default_value_t = 5)]
    pub depth: usize,

    /// Validate the configuration and exit
    #[arg(long)]
    pub check: bool,
}

impl Cli {
    /// Load the config file and apply command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or the result is invalid.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(&self.config)?;
        if let Some(exchange) = self.exchange {
            config.exchange = exchange;
        }
        if !self.markets.is_empty() {
            config.markets.clone_from(&self.markets);
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_repeated_markets() {
        let cli = Cli::parse_from([
            "bookfeed", "--exchange", "kraken", "-m", "BTC/USD", "-m", "ETH/USD", "--depth", "3",
        ]);
        assert_eq!(cli.exchange, Some(ExchangeKind::Kraken));
        assert_eq!(cli.markets, vec!["BTC/USD", "ETH/USD"]);
        assert_eq!(cli.depth, 3);
        assert_eq!(cli.config, PathBuf::from("config.toml"));
    }

    #[test]
    fn rejects_unknown_exchange() {
        assert!(Cli::try_parse_from(["bookfeed", "--exchange", "bittrex"]).is_err());
    }

    #[test]
    fn overrides_replace_config_values() {
        let file = config_file("exchange = \"binance\"\nmarkets = [\"ETH/BTC\"]\n");
        let cli = Cli::parse_from([
            "bookfeed",
            "--config",
            file.path().to_str().unwrap(),
            "--exchange",
            "cobinhood",
            "--market",
            "LTC/BTC",
        ]);

        let config = cli.load_config().unwrap();
        assert_eq!(config.exchange, ExchangeKind::Cobinhood);
        assert_eq!(config.markets, vec!["LTC/BTC"]);
    }

    #[test]
    fn overrides_are_validated() {
        let file = config_file("");
        let cli = Cli::parse_from([
            "bookfeed",
            "--config",
            file.path().to_str().unwrap(),
            "--market",
            "LTCBTC",
        ]);
        assert!(cli.load_config().is_err());
    }
}
