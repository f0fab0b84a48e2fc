//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{ConfigOverrides, LoadOptions};
use crate::segment::RfmRecord;

/// Customer segment prediction and product recommendations from pre-trained artifacts
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = None,
    after_help = "Examples:\n  shopper-spectrum segment 30,10,500.0\n  shopper-spectrum recommend \"WHITE HANGING HEART T-LIGHT HOLDER\" -n 3\n  shopper-spectrum products --search lantern"
)]
pub struct Args {
    /// Path to a TOML config file (default: shopper-spectrum.toml or config/shopper-spectrum.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Fitted scaler artifact (JSON)
    #[arg(long, global = true)]
    pub scaler: Option<PathBuf>,

    /// Fitted K-Means centroids artifact (JSON)
    #[arg(long, global = true)]
    pub model: Option<PathBuf>,

    /// Product similarity matrix (CSV)
    #[arg(long, global = true)]
    pub similarity: Option<PathBuf>,

    /// Historical RFM features with cluster assignments (CSV)
    #[arg(long, global = true)]
    pub rfm_history: Option<PathBuf>,

    /// Transactional dataset used for the product list (CSV)
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Log level: trace, debug, info, warn or error
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Predict the segment of one customer from "recency,frequency,monetary"
    Segment {
        /// Example: 30,10,500.0 for Recency=30 days, Frequency=10, Monetary=500.0
        #[arg(value_parser = parse_rfm)]
        rfm: RfmRecord,
    },
    /// Predict segments for every row of a CSV with Recency, Frequency, Monetary columns
    SegmentBatch {
        /// Input CSV; an optional CustomerID column labels the output
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Recommend products similar to the given one
    Recommend {
        /// Product name exactly as it appears in the catalog
        product: String,

        /// Number of recommendations (default from config)
        #[arg(short = 'n', long)]
        top_n: Option<usize>,
    },
    /// List catalog products
    Products {
        /// Only show products containing this text (case-insensitive)
        #[arg(short, long)]
        search: Option<String>,

        /// Maximum number of products to print
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show the segment, size and mean RFM values of every cluster
    Clusters,
}

impl Args {
    /// Config loading options carrying the command-line overrides.
    pub fn load_options(&self) -> LoadOptions {
        let log_level = self
            .log_level
            .clone()
            .or_else(|| self.verbose.then(|| "debug".to_string()));

        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                scaler: self.scaler.clone(),
                model: self.model.clone(),
                similarity: self.similarity.clone(),
                rfm_history: self.rfm_history.clone(),
                catalog: self.catalog.clone(),
                log_level,
            },
        }
    }
}

fn parse_rfm(value: &str) -> Result<RfmRecord, String> {
    value.parse().map_err(|e: crate::Error| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_segment_command() {
        let args = Args::try_parse_from(["shopper-spectrum", "segment", "30,10,500.0"]).unwrap();
        assert_eq!(
            args.command,
            Command::Segment {
                rfm: RfmRecord::new(30.0, 10, 500.0).unwrap()
            }
        );

        assert!(Args::try_parse_from(["shopper-spectrum", "segment", "invalid"]).is_err());
        assert!(Args::try_parse_from(["shopper-spectrum", "segment", "30,10,-5"]).is_err());
    }

    #[test]
    fn test_parse_recommend_command() {
        let args = Args::try_parse_from([
            "shopper-spectrum",
            "recommend",
            "WHITE HANGING HEART T-LIGHT HOLDER",
            "-n",
            "3",
            "--similarity",
            "sim.csv",
        ])
        .unwrap();
        assert_eq!(
            args.command,
            Command::Recommend {
                product: "WHITE HANGING HEART T-LIGHT HOLDER".to_string(),
                top_n: Some(3),
            }
        );
        assert_eq!(args.similarity, Some(PathBuf::from("sim.csv")));
    }

    #[test]
    fn test_load_options() {
        let args = Args::try_parse_from(["shopper-spectrum", "-v", "clusters"]).unwrap();
        let options = args.load_options();
        assert!(!options.require_file);
        assert_eq!(options.overrides.log_level.as_deref(), Some("debug"));

        let args = Args::try_parse_from([
            "shopper-spectrum",
            "--config",
            "custom.toml",
            "--log-level",
            "warn",
            "-v",
            "clusters",
        ])
        .unwrap();
        let options = args.load_options();
        assert!(options.require_file);
        assert_eq!(options.overrides.log_level.as_deref(), Some("warn"));
    }
}
