//! Report output: per-deal CSV, summary CSV, JSON report, console summary
//!
//! File names follow the `response_times_{month}_{year}.csv`,
//! `sales_report_{month}_{year}.csv` and `sales_report_{month}_{year}.json`
//! convention inside the output directory.

use super::error::ReportError;
use super::report::Report;
use chrono::NaiveDateTime;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const NOT_AVAILABLE: &str = "N/A";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const RESPONSE_TIME_HEADERS: [&str; 7] = [
    "Deal ID",
    "Person ID",
    "Person Name",
    "Deal Creation Time",
    "First Email Response Time",
    "Response Time (Hours)",
    "Response Class",
];

pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn response_times_path(&self, report: &Report) -> PathBuf {
        self.output_dir
            .join(format!("response_times_{}_{}.csv", report.month, report.year))
    }

    pub fn summary_path(&self, report: &Report) -> PathBuf {
        self.output_dir
            .join(format!("sales_report_{}_{}.csv", report.month, report.year))
    }

    pub fn json_path(&self, report: &Report) -> PathBuf {
        self.output_dir
            .join(format!("sales_report_{}_{}.json", report.month, report.year))
    }

    /// Write the CSV files and the JSON report, creating the output directory
    /// if needed
    pub fn write_all(&self, report: &Report) -> Result<Vec<PathBuf>, ReportError> {
        fs::create_dir_all(&self.output_dir)?;

        let response_times = self.response_times_path(report);
        write_response_times(report, &response_times)?;
        log::info!("📝 Wrote per-deal response times to: {}", response_times.display());

        let summary = self.summary_path(report);
        write_summary(report, &summary)?;
        log::info!("📝 Wrote summary report to: {}", summary.display());

        let json = self.json_path(report);
        write_json(report, &json)?;
        log::info!("📝 Wrote JSON report to: {}", json.display());

        Ok(vec![response_times, summary, json])
    }
}

/// One row per correlated deal, in deal order
pub fn write_response_times(report: &Report, path: &Path) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(RESPONSE_TIME_HEADERS)?;

    for record in &report.response_records {
        writer.write_record([
            record.deal_id.to_string(),
            or_na(record.person_id),
            record
                .person_name
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            format_time(record.deal_created_at),
            record
                .first_response_at
                .map(format_time)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            or_na(record.elapsed_hours),
            record.class.as_str().to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// `Metric,Value` rows, then a blank line and the slow-response block when it
/// has entries
pub fn write_summary(report: &Report, path: &Path) -> Result<(), ReportError> {
    let mut file = File::create(path)?;

    {
        let mut writer = csv::Writer::from_writer(&mut file);
        writer.write_record(["Metric", "Value"])?;
        for (metric, value) in summary_rows(report) {
            writer.write_record([metric, value])?;
        }
        writer.flush()?;
    }

    if !report.slow_responses.is_empty() {
        // csv writes an empty record as `""`, so the separator goes in raw
        file.write_all(b"\n")?;

        // title row has one column, the block four
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(&mut file);
        writer.write_record([slow_label(report)])?;
        writer.write_record(["Deal ID", "Person Name", "Response Time (Hours)", "Deal Link"])?;
        for slow in &report.slow_responses {
            writer.write_record([
                slow.deal_id.to_string(),
                slow.person_name.clone(),
                slow.elapsed_hours.to_string(),
                slow.link.clone(),
            ])?;
        }
        writer.flush()?;
    }

    Ok(())
}

/// Whole report as pretty-printed JSON
pub fn write_json(report: &Report, path: &Path) -> Result<(), ReportError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Metric/value pairs shared by the summary CSV and the console output
pub fn summary_rows(report: &Report) -> Vec<(String, String)> {
    let deals = &report.deal_metrics;
    let activities = &report.activity_metrics;

    let rows: Vec<(&str, String)> = vec![
        ("Report Month", report.period_label()),
        ("Deals Created", deals.deals_created.to_string()),
        ("Total Deal Value", format!("€{}", deals.total_deal_value)),
        ("Deals Closed", deals.deals_closed.to_string()),
        ("Deals Won", deals.deals_won.to_string()),
        ("Deals Lost", deals.deals_lost.to_string()),
        ("Deals Open", deals.deals_open.to_string()),
        ("Won Deal IDs", format!("{:?}", deals.won_deal_ids)),
        ("Activities Created", activities.activities_created.to_string()),
        ("Activities Completed", activities.activities_completed.to_string()),
        ("Average Response Time (Hours)", or_na(report.average_response_hours)),
        ("Deals with No Customer Email", report.no_email_ids.len().to_string()),
        ("Deal IDs with No Customer Email", format!("{:?}", report.no_email_ids)),
        ("Deals with No Contact Person", report.no_contact_ids.len().to_string()),
        ("Deal IDs with No Contact Person", format!("{:?}", report.no_contact_ids)),
        ("Deals with Negative Response Time", report.negative_elapsed_ids.len().to_string()),
        ("Deal IDs with Negative Response Time", format!("{:?}", report.negative_elapsed_ids)),
        ("Deals with Unreadable Email Data", report.malformed_data_ids.len().to_string()),
        ("Deal IDs with Unreadable Email Data", format!("{:?}", report.malformed_data_ids)),
        ("Rejected Deal Records", report.rejected_deals.to_string()),
        ("Rejected Activity Records", report.rejected_activities.to_string()),
    ];

    let mut rows: Vec<(String, String)> =
        rows.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    rows.push((slow_label(report), report.slow_responses.len().to_string()));
    rows.push((
        "Retrieval Warnings".to_string(),
        report.retrieval_warnings.len().to_string(),
    ));
    rows
}

/// Plain-text report for the terminal
pub fn render_summary(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Sales Performance Report ===");

    let mut rows = summary_rows(report).into_iter();
    if let Some((metric, value)) = rows.next() {
        let _ = writeln!(out, "{}: {}", metric, value);
    }
    let _ = writeln!(out, "\nBasic Metrics:");
    for (metric, value) in rows {
        let _ = writeln!(out, "  {}: {}", metric, value);
    }

    if !report.slow_responses.is_empty() {
        let _ = writeln!(out, "\nDetails for {}:", slow_label(report));
        for slow in &report.slow_responses {
            let _ = writeln!(out, "  Deal ID: {}", slow.deal_id);
            let _ = writeln!(out, "  Contact: {}", slow.person_name);
            let _ = writeln!(out, "  Response Time: {} hours", slow.elapsed_hours);
            let _ = writeln!(out, "  Link: {}", slow.link);
            let _ = writeln!(out);
        }
    }

    if !report.retrieval_warnings.is_empty() {
        let _ = writeln!(out, "\nRetrieval warnings (report built from partial data):");
        for warning in &report.retrieval_warnings {
            let _ = writeln!(out, "  {}", warning);
        }
    }

    out
}

fn slow_label(report: &Report) -> String {
    format!(
        "Slow Response Deals ({}{}h)",
        report.slow_boundary.symbol(),
        report.slow_threshold_hours
    )
}

fn format_time(t: NaiveDateTime) -> String {
    t.format(TIME_FORMAT).to_string()
}

fn or_na<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}
