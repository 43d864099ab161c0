use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

const DEFAULT_CONFIG: &str = "node_config/pricechain.yaml";

#[derive(Parser, Debug)]
#[command(name = "pricechain")]
#[command(about = "PriceChain - a price oracle that seals aggregated quotes into a hash chain")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the oracle node: rounds, query API and live feed
    Start {
        /// Path to the configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG, env = "PRICECHAIN_CONFIG")]
        config: PathBuf,
    },

    /// Validate configuration without starting the node
    Validate {
        #[arg(short, long, default_value = DEFAULT_CONFIG, env = "PRICECHAIN_CONFIG")]
        config: PathBuf,
    },

    /// Write a new configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = "pricechain.yaml")]
        output: PathBuf,
    },

    /// Look up sealed blocks in the configured ledger
    #[command(group(
        ArgGroup::new("lookup")
            .required(true)
            .args(["hash", "height", "timestamp", "latest", "verify"])
    ))]
    Block {
        #[arg(short, long, default_value = DEFAULT_CONFIG, env = "PRICECHAIN_CONFIG")]
        config: PathBuf,

        /// Block hash
        #[arg(long)]
        hash: Option<String>,

        /// Block height
        #[arg(long)]
        height: Option<u64>,

        /// Round timestamp, Unix milliseconds
        #[arg(long)]
        timestamp: Option<u64>,

        /// Newest N blocks
        #[arg(long, value_name = "N")]
        latest: Option<usize>,

        /// Re-hash the newest N blocks and check their links
        #[arg(long, value_name = "DEPTH")]
        verify: Option<usize>,
    },

    /// Split or rebuild a secret with Shamir secret sharing
    Shares {
        #[command(subcommand)]
        action: SharesCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum SharesCommand {
    /// Split a hex-encoded secret into hex-encoded shares
    Split {
        /// Secret as hex
        secret: String,

        /// Number of shares to produce
        #[arg(short, long, default_value_t = 5)]
        parts: usize,

        /// Shares needed to rebuild the secret
        #[arg(short, long, default_value_t = 3)]
        threshold: usize,
    },

    /// Rebuild a secret from hex-encoded shares
    Combine {
        #[arg(required = true, num_args = 2..)]
        shares: Vec<String>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_block_lookup_requires_one_key() {
        assert!(Cli::try_parse_from(["pricechain", "block"]).is_err());
        assert!(Cli::try_parse_from(["pricechain", "block", "--height", "1", "--hash", "dd00"]).is_err());

        let cli = Cli::try_parse_from(["pricechain", "block", "--height", "7"]).unwrap();
        match cli.command {
            Commands::Block { height, hash, .. } => {
                assert_eq!(height, Some(7));
                assert!(hash.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_shares_subcommands() {
        let cli = Cli::try_parse_from(["pricechain", "shares", "split", "deadbeef", "-p", "4", "-t", "2"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Shares {
                action: SharesCommand::Split { parts: 4, threshold: 2, .. }
            }
        ));

        assert!(Cli::try_parse_from(["pricechain", "shares", "combine", "aa01"]).is_err());
        assert!(Cli::try_parse_from(["pricechain", "shares", "combine", "aa01", "bb02"]).is_ok());
    }
}
