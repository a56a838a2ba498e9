//! Sales Report Binary - Monthly KPI report
//!
//! Pulls deals, activities and mail threads from the CRM, computes the monthly
//! metrics and writes two CSV files, a JSON report and a console summary.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin sales_report -- --month 10 --year 2024
//! cargo run --release --bin sales_report -- --snapshot capture.json --month 10 --year 2024
//! ```
//!
//! ## Environment Variables
//!
//! - API_TOKEN - CRM API token (required unless --snapshot is given)
//! - CRM_BASE_URL - API base URL (default: https://api.pipedrive.com/v1)
//! - REQUEST_TIMEOUT_SECS - Per-request timeout (default: 30)
//! - PAGE_LIMIT - Page size for collection endpoints (default: 500)
//! - ACTIVITIES_ENDPOINT - activities | activities/collection (default: activities)
//! - MATCH_STRATEGY - any-first-message | agent-reply (default: any-first-message)
//! - THREAD_SOURCE - person | deal (default: person)
//! - SLOW_THRESHOLD_HOURS - Slow response threshold (default: 12)
//! - SLOW_BOUNDARY - exclusive | inclusive (default: exclusive)
//! - MAX_IN_FLIGHT - Concurrent thread lookups (default: 4)
//! - DEAL_STATUS_FILTER - Optional status filter (open | won | lost | closed)
//! - APP_BASE_URL - Base for deal links (default: https://app.pipedrive.com)
//! - REPORT_OUTPUT_DIR - Directory for CSV output (default: .)
//! - RUST_LOG - Logging level (optional, default: info)

use chrono::{Datelike, Utc};
use clap::Parser;
use salespulse::config::{ClientConfig, ReportConfig};
use salespulse::crm::{CrmClient, CrmSource, SnapshotSource};
use salespulse::report_core::{render_summary, MatchStrategy, ReportPipeline, ReportWriter, ThreadSource};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sales_report", about = "Monthly sales KPI report from CRM data")]
struct Args {
    /// Report month, 1-12 (default: current month)
    #[arg(long)]
    month: Option<u32>,

    /// Report year (default: current year)
    #[arg(long)]
    year: Option<i32>,

    /// Directory for the CSV files (overrides REPORT_OUTPUT_DIR)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// any-first-message | agent-reply (overrides MATCH_STRATEGY)
    #[arg(long)]
    strategy: Option<MatchStrategy>,

    /// person | deal (overrides THREAD_SOURCE)
    #[arg(long)]
    thread_source: Option<ThreadSource>,

    /// Read a captured JSON snapshot instead of calling the API
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let args = Args::parse();
    let now = Utc::now();
    let month = args.month.unwrap_or_else(|| now.month());
    let year = args.year.unwrap_or_else(|| now.year());

    let mut report_config = ReportConfig::from_env()?;
    if let Some(dir) = args.output_dir {
        report_config.output_dir = dir;
    }
    if let Some(strategy) = args.strategy {
        report_config.correlator.strategy = strategy;
    }
    if let Some(thread_source) = args.thread_source {
        report_config.correlator.thread_source = thread_source;
    }

    log::info!("🚀 Starting Sales Report");
    log::info!("📊 Configuration:");
    log::info!("   Period: {}-{}", month, year);
    log::info!("   Match strategy: {}", report_config.correlator.strategy);
    log::info!("   Thread source: {}", report_config.correlator.thread_source);
    log::info!("   Slow threshold: {}h", report_config.correlator.slow_threshold_hours);
    log::info!("   Output dir: {}", report_config.output_dir.display());

    let source: Box<dyn CrmSource> = match &args.snapshot {
        Some(path) => {
            log::info!("   Source: snapshot {}", path.display());
            Box::new(SnapshotSource::from_json_file(path)?)
        }
        None => {
            let client_config = ClientConfig::from_env()?;
            log::info!("   Source: {}", client_config.base_url);
            Box::new(CrmClient::new(client_config)?)
        }
    };

    let pipeline = ReportPipeline::new(&report_config);
    let report = pipeline.run(source.as_ref(), month, year).await?;

    ReportWriter::new(&report_config.output_dir).write_all(&report)?;

    println!("{}", render_summary(&report));

    Ok(())
}
