use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;

use pipelinehealth::analysis::DurationSummary;
use pipelinehealth::api::tools;
use pipelinehealth::config::{Config, SourceConfig};
use pipelinehealth::query::{ExecutionStatus, QueryService, ReadinessReport, StatisticsReport};

#[derive(Parser)]
#[command(
    name = "pipelinehealth",
    about = "Execution health and dependency readiness for scheduled data pipelines",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Execution log to read (.db/.sqlite/.sqlite3 selects SQLite, otherwise CSV)
    #[arg(long, global = true)]
    source: Option<PathBuf>,

    /// JSON output for machine parsing
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Bind address (overrides [server] bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Show the execution of one pipeline on one day
    Status {
        #[arg(long)]
        region: String,

        #[arg(long)]
        pipeline: String,

        /// Day in YYYY-MM-DD format
        #[arg(long, value_parser = parse_day)]
        day: NaiveDate,
    },

    /// Duration statistics over an inclusive day range
    Stats {
        #[arg(long)]
        region: String,

        #[arg(long)]
        pipeline: String,

        /// First day, YYYY-MM-DD
        #[arg(long, value_parser = parse_day)]
        from: NaiveDate,

        /// Last day, YYYY-MM-DD
        #[arg(long, value_parser = parse_day)]
        to: NaiveDate,
    },

    /// Check whether upstream pipelines finished before this one started
    Readiness {
        #[arg(long)]
        region: String,

        #[arg(long)]
        pipeline: String,

        /// Day in YYYY-MM-DD format
        #[arg(long, value_parser = parse_day)]
        day: NaiveDate,

        /// Upstream pipeline name (repeatable)
        #[arg(long = "upstream")]
        upstreams: Vec<String>,
    },

    /// List the query tools exposed by the API
    Tools,
}

fn parse_day(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got '{raw}': {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, config_warnings) = Config::resolve(cli.config.as_deref())?;
    if let Some(path) = cli.source {
        let cache_snapshots = config.source.cache_snapshots;
        config.source = SourceConfig::from_path(path);
        config.source.cache_snapshots = cache_snapshots;
    }
    pipelinehealth::telemetry::init(&config.logging)?;
    for warning in &config_warnings {
        tracing::warn!("{warning}");
    }

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!(bind = %config.server.bind, "Starting pipelinehealth API");
            pipelinehealth::serve(&config).await?;
        }
        Commands::Status {
            region,
            pipeline,
            day,
        } => {
            let service = QueryService::from_config(&config)?;
            let status = service.execution_status(&region, &pipeline, day)?;
            if cli.json {
                print_json(&status)?;
            } else {
                print_status(&status);
            }
        }
        Commands::Stats {
            region,
            pipeline,
            from,
            to,
        } => {
            let service = QueryService::from_config(&config)?;
            let report = service.statistics(&region, &pipeline, from, to)?;
            if cli.json {
                print_json(&report)?;
            } else {
                print_statistics(&report);
            }
        }
        Commands::Readiness {
            region,
            pipeline,
            day,
            upstreams,
        } => {
            let service = QueryService::from_config(&config)?;
            let report = service.readiness(&region, &pipeline, day, &upstreams)?;
            if cli.json {
                print_json(&report)?;
            } else {
                print_readiness(&report);
            }
        }
        Commands::Tools => {
            let catalog = tools::catalog();
            if cli.json {
                print_json(&catalog)?;
            } else {
                println!("{:<22} | {:<6} | {:<30} | Description", "Tool", "Method", "Endpoint");
                println!("{:-<22}-|-{:-<6}-|-{:-<30}-|-{:-<40}", "", "", "", "");
                for tool in catalog {
                    println!(
                        "{:<22} | {:<6} | {:<30} | {}",
                        tool.name, tool.method, tool.endpoint, tool.description
                    );
                }
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn minutes(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |m| format!("{m:.1}"))
}

fn print_status(status: &ExecutionStatus) {
    println!("\n=== Execution Status ===");
    println!("Region:    {}", status.region);
    println!("Pipeline:  {}", status.pipeline);
    println!("Day:       {}", status.day);
    println!("Status:    {}", status.run_status);
    println!("Started:   {}", status.start_time);
    match status.end_time {
        Some(end) => println!("Ended:     {end}"),
        None => println!("Ended:     -"),
    }
    println!("Duration:  {} min", minutes(status.duration_minutes));
    println!("Log:       {}", status.log);
    println!();
}

fn print_statistics(report: &StatisticsReport) {
    println!(
        "\nExecution statistics for {} / {} ({} .. {})",
        report.region, report.pipeline, report.from, report.to
    );
    println!(
        "{:<16} | {:>5} | {:>9} | {:>9} | {:>9} | {:<13} | {:<13}",
        "Group", "Runs", "Mean min", "Max min", "Min min", "Start window", "End window"
    );
    println!(
        "{:-<16}-|-{:-<5}-|-{:-<9}-|-{:-<9}-|-{:-<9}-|-{:-<13}-|-{:-<13}",
        "", "", "", "", "", "", ""
    );
    print_summary_row("all", &report.stats.overall);
    for (code, summary) in &report.stats.by_status {
        print_summary_row(&format!("status {code}"), summary);
    }
    println!();
}

fn print_summary_row(group: &str, summary: &DurationSummary) {
    let end_window = match (&summary.earliest_end, &summary.latest_end) {
        (Some(lo), Some(hi)) => format!("{lo} - {hi}"),
        _ => "-".to_string(),
    };
    println!(
        "{:<16} | {:>5} | {:>9} | {:>9} | {:>9} | {:<13} | {:<13}",
        group,
        summary.record_count,
        minutes(summary.mean_minutes),
        minutes(summary.max_minutes),
        minutes(summary.min_minutes),
        format!("{} - {}", summary.earliest_start, summary.latest_start),
        end_window
    );
}

fn print_readiness(report: &ReadinessReport) {
    println!(
        "\nReadiness of {} / {} on {} (started {})",
        report.region, report.pipeline, report.day, report.dependent_start
    );
    if report.dependencies.is_empty() {
        println!("No upstream pipelines given.");
        println!();
        return;
    }
    println!("{:<24} | {:<4} | {:<8} | Assessment", "Upstream", "Code", "Level");
    println!("{:-<24}-|-{:-<4}-|-{:-<8}-|-{:-<20}", "", "", "", "");
    for dep in &report.dependencies {
        println!(
            "{:<24} | {:<4} | {:<8} | {}",
            dep.upstream,
            dep.code.code(),
            dep.code.label(),
            dep.assessment.label()
        );
    }
    println!();
}
