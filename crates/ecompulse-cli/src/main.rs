mod config_display;
mod momentum;
mod pipeline;
mod rank_improvement;
mod report;
mod services;
mod week_rank;

#[cfg(test)]
mod test_support;

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use ecompulse_core::{AppConfig, TaskConfig};
use tracing_subscriber::EnvFilter;

use crate::pipeline::RunOptions;
use crate::services::Services;

#[derive(Debug, Parser)]
#[command(name = "ecompulse")]
#[command(about = "Best-seller trend pipelines over Merchant Center rankings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compare the latest rankings with an older snapshot and score momentum.
    Momentum {
        #[command(flatten)]
        task: TaskArgs,
    },
    /// List products whose precomputed rank improvement is positive.
    RankImprovement {
        #[command(flatten)]
        task: TaskArgs,
    },
    /// Enrich the current top products with images.
    WeekRank {
        #[command(flatten)]
        task: TaskArgs,
    },
    /// Print the effective configuration with secrets redacted.
    Config,
}

/// Per-run overrides for the `TASK_*` settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
struct TaskArgs {
    /// Ranking country, e.g. `US`.
    #[arg(long)]
    country: Option<String>,

    /// Numeric category id; `123456` means all categories for
    /// `rank-improvement`.
    #[arg(long, value_parser = parse_category)]
    category: Option<String>,

    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    limit: Option<u32>,

    /// Minimum age in days of the comparison snapshot.
    #[arg(long)]
    days_back: Option<u32>,

    /// Milliseconds between image searches.
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Skip the console report.
    #[arg(long)]
    no_report: bool,

    /// Compute and enrich but do not write results.
    #[arg(long)]
    dry_run: bool,
}

impl TaskArgs {
    fn apply(&self, task: &mut TaskConfig) {
        if let Some(country) = &self.country {
            task.country.clone_from(country);
        }
        if let Some(category) = &self.category {
            task.category_id.clone_from(category);
        }
        if let Some(limit) = self.limit {
            task.limit = limit;
        }
        if let Some(days_back) = self.days_back {
            task.days_back = days_back;
        }
        if let Some(delay_ms) = self.delay_ms {
            task.delay_between_requests_ms = delay_ms;
        }
    }

    fn options(&self) -> RunOptions {
        RunOptions {
            report: !self.no_report,
            dry_run: self.dry_run,
        }
    }
}

fn parse_category(raw: &str) -> Result<String, String> {
    raw.parse::<u64>()
        .map(|_| raw.to_string())
        .map_err(|_| format!("category id must be numeric, got \"{raw}\""))
}

fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

async fn run(command: Commands, mut config: AppConfig) -> anyhow::Result<()> {
    match command {
        Commands::Config => show_config(),
        Commands::Momentum { task } => {
            task.apply(&mut config.task);
            let services = Services::connect(&config)?;
            momentum::run(
                &services.ranking_source(),
                &services.search,
                &services.momentum_table(),
                &config.task,
                &services.enrich_options(),
                task.options(),
            )
            .await?;
        }
        Commands::RankImprovement { task } => {
            task.apply(&mut config.task);
            let services = Services::connect(&config)?;
            rank_improvement::run(
                &services.ranking_source(),
                &services.search,
                &services.momentum_table(),
                &config.task,
                &services.enrich_options(),
                task.options(),
            )
            .await?;
        }
        Commands::WeekRank { task } => {
            task.apply(&mut config.task);
            let services = Services::connect(&config)?;
            week_rank::run(
                &services.ranking_source(),
                &services.search,
                &services.week_rank_table(),
                &config.task,
                &services.enrich_options(),
                task.options(),
            )
            .await?;
        }
    }
    Ok(())
}

/// Prints the configuration the environment provides, whether or not it
/// passes validation.
fn show_config() {
    let status = ecompulse_core::load_app_config_from_env();
    println!(
        "{}",
        config_display::render_config(|var| std::env::var(var).ok(), status.as_ref().map(|_| ()))
    );
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if matches!(cli.command, Commands::Config) {
        ecompulse_core::load_dotenv();
        init_tracing(&std::env::var("ECOMPULSE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()));
        show_config();
        return ExitCode::SUCCESS;
    }

    let config = ecompulse_core::load_app_config();
    init_tracing(config.as_ref().map_or("info", |c| c.log_level.as_str()));

    let result = match config {
        Ok(config) => {
            tracing::debug!(?config, "configuration loaded");
            run(cli.command, config).await
        }
        Err(e) => Err(anyhow::Error::new(e).context("invalid configuration")),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "ecompulse failed");
            ExitCode::FAILURE
        }
    }
}
