//! Errors that end a report run

use super::filter::PeriodError;
use thiserror::Error;

/// Retrieval problems never show up here; they degrade into warnings on the
/// report instead.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Invalid reporting period: {0}")]
    InvalidPeriod(#[from] PeriodError),
    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
