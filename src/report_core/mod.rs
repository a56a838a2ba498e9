//! Report Core - Monthly KPI computation
//!
//! Turns the raw CRM collections into one monthly sales report.
//!
//! # Architecture
//!
//! ```text
//! CrmSource (live API or snapshot)
//!     ↓
//! DealFilter (calendar month window, optional status)
//!     ↓
//! MetricsAggregator (deal + activity counts)
//!     ↓
//! ResponseTimeCorrelator (deal creation → first matching email)
//!     ↓
//! ReportAssembler → ReportWriter (CSV, JSON) + console summary
//! ```

pub mod correlator;
pub mod error;
pub mod filter;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod writer;

pub use correlator::{
    CorrelationOutcome, CorrelatorSettings, MatchStrategy, ResponseTimeCorrelator, SlowBoundary,
    SlowResponse, ThreadSource,
};
pub use error::ReportError;
pub use filter::{DealFilter, MonthWindow, PeriodError};
pub use metrics::{ActivityMetrics, DealMetrics, MetricsAggregator};
pub use model::{
    Activity, ContactPerson, Deal, DealStatus, EmailMessage, ResponseClass, ResponseRecord,
};
pub use pipeline::ReportPipeline;
pub use report::{Report, ReportAssembler, RetrievalSummary};
pub use writer::{render_summary, ReportWriter};
