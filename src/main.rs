//! Job alerts: cluster job postings by skill profile and mail keyword matches

use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use job_alerts::cli::{Cli, Commands, ConfigAction};
use job_alerts::config::{Config, MailTransport};
use job_alerts::error::{JobAlertError, Result};
use job_alerts::input::FileSource;
use job_alerts::notify::{parse_sender, LogMailer, Mailer, OutboxMailer, SmtpMailer};
use job_alerts::output::formatter::{
    parse_output_format, ConsoleFormatter, JsonFormatter, OutputFormat, OutputFormatter,
};
use job_alerts::output::report::ClusterSummary;
use job_alerts::processing::cluster::Linkage;
use job_alerts::storage::ModelStore;
use job_alerts::{Pipeline, PipelineSettings, RunReport};
use log::{error, info};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    // Execute command
    if let Err(e) = run_command(cli.command, config, cli.config).await {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

async fn run_command(command: Commands, config: Config, config_path: Option<PathBuf>) -> Result<()> {
    match command {
        Commands::Run {
            keyword,
            pages,
            clusters,
            linkage,
            source,
            dry_run,
            no_save,
        } => {
            let keyword = keyword.unwrap_or_else(|| config.pipeline.keyword.clone());
            let pages = pages.unwrap_or(config.pipeline.pages);
            let clusters = clusters.unwrap_or(config.pipeline.clusters);
            let linkage = match linkage {
                Some(name) => name.parse::<Linkage>().map_err(JobAlertError::InvalidInput)?,
                None => config.pipeline.linkage,
            };
            let source_path = source.unwrap_or_else(|| config.source.path.clone());

            info!("Starting job alert run");
            println!("🔎 Keyword: {}", if keyword.is_empty() { "(all)" } else { keyword.as_str() });
            println!("📄 Pages: {}", pages);
            println!("🧩 Clusters: {} ({} linkage)", clusters, linkage);

            let settings = PipelineSettings {
                linkage,
                subject: config.mail.subject.clone(),
                only_new_postings: config.pipeline.only_new_postings,
                persist: !no_save,
            };
            let source = FileSource::new(source_path, config.source.page_size);
            let store = ModelStore::new(config.storage.artifacts_dir.clone());

            let mailer: Box<dyn Mailer> = if dry_run || config.mail.dry_run {
                println!("⚠️  Dry run: alerts are logged, not delivered");
                Box::new(LogMailer)
            } else {
                let sender = parse_sender(&config.mail.sender)?;
                let mailer: Box<dyn Mailer> = match config.mail.transport {
                    MailTransport::Outbox => Box::new(OutboxMailer::new(sender, config.mail.outbox_dir.clone())),
                    MailTransport::Smtp => {
                        let smtp = SmtpMailer::from_config(sender, &config.mail.smtp)?;
                        info!("Delivering alerts through {:?}", smtp);
                        Box::new(smtp)
                    }
                };
                mailer
            };

            let pipeline = Pipeline::new(source, mailer, store, settings);

            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.set_message("Scraping and clustering jobs...");
            spinner.enable_steady_tick(Duration::from_millis(120));

            let result = pipeline.run(&keyword, pages, clusters, &config.preferences).await;
            spinner.finish_and_clear();

            let report = result?;
            print_run_report(&report);

            if report.saved {
                let artifacts = pipeline.store().load()?;
                let summary = ClusterSummary::from_postings(&artifacts.postings, 5);
                println!();
                print!("{}", ConsoleFormatter::new(true).format_summary(&summary)?);
            }
        }

        Commands::Inspect { top, format } => {
            let format = parse_output_format(&format).map_err(JobAlertError::InvalidInput)?;
            let store = ModelStore::new(config.storage.artifacts_dir.clone());
            let manifest = store.manifest()?;
            let artifacts = store.load()?;
            let summary = ClusterSummary::from_postings(&artifacts.postings, top);

            match format {
                OutputFormat::Console => {
                    println!(
                        "📦 Generation {} saved {}",
                        manifest.generation,
                        manifest.saved_at.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                    println!(
                        "🧠 Vocabulary: {} terms from {} postings, {} linkage\n",
                        artifacts.vectorizer.vocabulary_size(),
                        artifacts.vectorizer.n_documents(),
                        artifacts.cluster_model.linkage
                    );
                    print!("{}", ConsoleFormatter::new(true).format_summary(&summary)?);
                }
                OutputFormat::Json => {
                    println!("{}", JsonFormatter::new(true).format_summary(&summary)?);
                }
            }
        }

        Commands::Config { action } => match action {
            Some(ConfigAction::Show) | None => {
                println!("⚙️  Current Configuration\n");
                println!("Keyword: {:?}", config.pipeline.keyword);
                println!("Pages: {}", config.pipeline.pages);
                println!("Clusters: {}", config.pipeline.clusters);
                println!("Linkage: {}", config.pipeline.linkage);
                println!("Only new postings: {}", config.pipeline.only_new_postings);
                println!("Source: {}", config.source.path.display());
                println!("Artifacts: {}", config.storage.artifacts_dir.display());
                println!("Mail transport: {:?}", config.mail.transport);
                println!("Outbox: {}", config.mail.outbox_dir.display());
                println!("SMTP: {} via {}:{} (password from ${})", config.mail.smtp.username, config.mail.smtp.host, config.mail.smtp.port, config.mail.smtp.password_env);
                println!("Dry run: {}", config.mail.dry_run);
                println!("\nRecipients:");
                for (recipient, keywords) in &config.preferences {
                    println!("  • {}: {}", recipient, keywords.join(", "));
                }
            }

            Some(ConfigAction::Path) => {
                let path = config_path.unwrap_or_else(Config::config_path);
                println!("{}", path.display());
            }

            Some(ConfigAction::Reset) => {
                println!("🔄 Resetting configuration to defaults...");
                let path = config_path.unwrap_or_else(Config::config_path);
                Config::default().save_to(&path)?;
                println!("✅ Configuration reset successfully!");
            }
        },
    }

    Ok(())
}

fn print_run_report(report: &RunReport) {
    println!("\n{}", "✅ Scraping and clustering complete!".green().bold());
    println!("  • Fetched: {} postings ({} skipped)", report.fetched, report.skipped);
    println!("  • Clustered: {} postings into {} clusters", report.clustered, report.cluster_count);
    println!("  • Vocabulary: {} terms", report.vocabulary_size);
    println!("  • New since last run: {}", report.new_postings);
    println!("  • Artifacts saved: {}", if report.saved { "yes" } else { "no" });
    println!("  • Processing time: {}ms", report.processing_time_ms);

    let deliveries = &report.deliveries;
    if !deliveries.delivered.is_empty() {
        println!("\n📧 Alerts sent: {}", deliveries.delivered.join(", "));
    }
    if !deliveries.no_matches.is_empty() {
        println!("❌ No matching jobs for: {}", deliveries.no_matches.join(", "));
    }
    for (recipient, reason) in &deliveries.failed {
        println!("{} {}: {}", "⚠️  Alert failed for".yellow(), recipient, reason);
    }
}
