//! One report run for a (month, year) pair
//!
//! ```text
//! CrmSource::deals() → DealFilter → MetricsAggregator::deal_metrics
//! CrmSource::activities(window) → MetricsAggregator::activity_metrics
//! filtered deals → ResponseTimeCorrelator (thread per deal)
//!     ↓
//! ReportAssembler → Report
//! ```

use super::correlator::ResponseTimeCorrelator;
use super::error::ReportError;
use super::filter::{DealFilter, MonthWindow};
use super::metrics::MetricsAggregator;
use super::report::{Report, ReportAssembler, RetrievalSummary};
use crate::config::ReportConfig;
use crate::crm::CrmSource;
use crate::report_core::model::DealStatus;

pub struct ReportPipeline {
    correlator: ResponseTimeCorrelator,
    status_filter: Option<DealStatus>,
}

impl ReportPipeline {
    pub fn new(config: &ReportConfig) -> Self {
        Self {
            correlator: ResponseTimeCorrelator::new(config.correlator.clone()),
            status_filter: config.status_filter,
        }
    }

    /// Only an invalid period fails; retrieval problems end up in
    /// `Report::retrieval_warnings`
    pub async fn run<S>(&self, source: &S, month: u32, year: i32) -> Result<Report, ReportError>
    where
        S: CrmSource + ?Sized,
    {
        let window = MonthWindow::new(month, year)?;
        log::info!(
            "🚀 Computing report for {} ({} to {})",
            window.label(),
            window.first_day,
            window.last_day
        );

        let mut retrieval = RetrievalSummary::default();

        log::info!("📥 Fetching deals...");
        let deals = source.deals().await;
        if deals.rejected > 0 {
            log::warn!("⚠️  {} deal records rejected at decode", deals.rejected);
        }
        retrieval.rejected_deals = deals.rejected;
        retrieval.warnings.extend(deals.warnings);

        let filter = DealFilter::new(window).with_status(self.status_filter);
        let filtered = filter.apply(&deals.records);
        log::info!("   {} of {} deals in window", filtered.len(), deals.records.len());

        let deal_metrics = MetricsAggregator::deal_metrics(&filtered);

        log::info!("📥 Fetching activities...");
        let activities = source.activities(&window).await;
        if activities.rejected > 0 {
            log::warn!("⚠️  {} activity records rejected at decode", activities.rejected);
        }
        retrieval.rejected_activities = activities.rejected;
        retrieval.warnings.extend(activities.warnings);
        let activity_metrics = MetricsAggregator::activity_metrics(&activities.records);

        let correlation = self.correlator.correlate(source, &filtered).await;

        let report = ReportAssembler::assemble(
            &window,
            deal_metrics,
            activity_metrics,
            correlation,
            self.correlator.settings(),
            retrieval,
        );

        if report.is_partial() {
            log::warn!(
                "⚠️  Report for {} built from partial data ({} retrieval warnings)",
                report.period_label(),
                report.retrieval_warnings.len()
            );
        }
        if report.has_data_anomalies() {
            log::warn!(
                "⚠️  Report for {} has data anomalies ({} deals, {} activities rejected, {} unreadable threads)",
                report.period_label(),
                report.rejected_deals,
                report.rejected_activities,
                report.malformed_data_ids.len()
            );
        }
        log::info!("✅ Report for {} complete", report.period_label());

        Ok(report)
    }
}
