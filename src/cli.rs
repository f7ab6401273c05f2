//! CLI interface for job alerts

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "job-alerts")]
#[command(about = "Cluster job postings by skill profile and alert on keyword matches")]
#[command(long_about = "Normalize scraped skill tags, group postings with hierarchical clustering, store the fitted models and mail recipients whose keywords match")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch, cluster, store and alert once
    Run {
        /// Search keyword (empty matches every posting)
        #[arg(short, long)]
        keyword: Option<String>,

        /// Number of listing pages to collect
        #[arg(short, long)]
        pages: Option<usize>,

        /// Number of clusters
        #[arg(short = 'n', long)]
        clusters: Option<usize>,

        /// Linkage criterion: ward, complete, average, single
        #[arg(short, long)]
        linkage: Option<String>,

        /// Posting file (.json or .jsonl) to read instead of the configured one
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Log alerts instead of queueing them
        #[arg(long)]
        dry_run: bool,

        /// Do not overwrite stored artifacts
        #[arg(long)]
        no_save: bool,
    },

    /// Show the clusters of the last stored run
    Inspect {
        /// Postings shown per cluster
        #[arg(short, long, default_value_t = 5)]
        top: usize,

        /// Output format: console, json
        #[arg(short, long, default_value = "console")]
        format: String,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Print the configuration file location
    Path,

    /// Reset configuration to defaults
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_arguments() {
        let cli = Cli::parse_from([
            "job-alerts", "run", "--keyword", "data science", "-n", "3", "--linkage", "average", "--dry-run",
        ]);

        match cli.command {
            Commands::Run {
                keyword,
                clusters,
                linkage,
                dry_run,
                no_save,
                ..
            } => {
                assert_eq!(keyword.as_deref(), Some("data science"));
                assert_eq!(clusters, Some(3));
                assert_eq!(linkage.as_deref(), Some("average"));
                assert!(dry_run);
                assert!(!no_save);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["job-alerts", "inspect", "-v", "--config", "alt.toml"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
    }
}
