//! Final report structure and its assembly

use super::correlator::{CorrelationOutcome, CorrelatorSettings, SlowBoundary, SlowResponse};
use super::filter::MonthWindow;
use super::metrics::{ActivityMetrics, DealMetrics};
use super::model::ResponseRecord;
use crate::crm::RetrievalWarning;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub month: u32,
    pub year: i32,
    pub deal_metrics: DealMetrics,
    pub activity_metrics: ActivityMetrics,
    pub average_response_hours: Option<f64>,
    pub no_contact_ids: Vec<i64>,
    pub no_email_ids: Vec<i64>,
    pub negative_elapsed_ids: Vec<i64>,
    /// Deals whose thread held unreadable messages
    pub malformed_data_ids: Vec<i64>,
    pub slow_responses: Vec<SlowResponse>,
    /// Rule the slow list was built with, for labelling output
    pub slow_threshold_hours: f64,
    pub slow_boundary: SlowBoundary,
    pub response_records: Vec<ResponseRecord>,
    /// Deal and activity records dropped because they failed validation
    pub rejected_deals: usize,
    pub rejected_activities: usize,
    pub retrieval_warnings: Vec<RetrievalWarning>,
}

impl Report {
    /// `M-YYYY`
    pub fn period_label(&self) -> String {
        format!("{}-{}", self.month, self.year)
    }

    pub fn is_partial(&self) -> bool {
        !self.retrieval_warnings.is_empty()
    }

    /// True when input records were dropped or threads were unreadable
    pub fn has_data_anomalies(&self) -> bool {
        self.rejected_deals > 0 || self.rejected_activities > 0 || !self.malformed_data_ids.is_empty()
    }
}

/// What went wrong while fetching deals and activities
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalSummary {
    pub warnings: Vec<RetrievalWarning>,
    pub rejected_deals: usize,
    pub rejected_activities: usize,
}

pub struct ReportAssembler;

impl ReportAssembler {
    /// Pure merge, no I/O and no new numbers
    ///
    /// The correlator's own warnings are appended after the fetch warnings in
    /// `retrieval`.
    pub fn assemble(
        window: &MonthWindow,
        deal_metrics: DealMetrics,
        activity_metrics: ActivityMetrics,
        correlation: CorrelationOutcome,
        settings: &CorrelatorSettings,
        retrieval: RetrievalSummary,
    ) -> Report {
        let mut warnings = retrieval.warnings;
        warnings.extend(correlation.warnings);

        Report {
            month: window.month,
            year: window.year,
            deal_metrics,
            activity_metrics,
            average_response_hours: correlation.average_response_hours,
            no_contact_ids: correlation.no_contact_ids,
            no_email_ids: correlation.no_email_ids,
            negative_elapsed_ids: correlation.negative_elapsed_ids,
            malformed_data_ids: correlation.malformed_data_ids,
            slow_responses: correlation.slow_responses,
            slow_threshold_hours: settings.slow_threshold_hours,
            slow_boundary: settings.slow_boundary,
            response_records: correlation.records,
            rejected_deals: retrieval.rejected_deals,
            rejected_activities: retrieval.rejected_activities,
            retrieval_warnings: warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::WarningReason;

    #[test]
    fn test_assemble_merges_without_recomputing() {
        let window = MonthWindow::new(10, 2024).unwrap();
        let deal_metrics = DealMetrics {
            deals_created: 3,
            total_deal_value: 900.0,
            ..DealMetrics::default()
        };
        let activity_metrics = ActivityMetrics {
            activities_created: 4,
            activities_completed: 1,
        };
        let correlation = CorrelationOutcome {
            average_response_hours: Some(5.25),
            no_contact_ids: vec![1],
            no_email_ids: vec![2],
            malformed_data_ids: vec![3],
            warnings: vec![RetrievalWarning {
                endpoint: "persons/9/mailMessages".to_string(),
                reason: WarningReason::Timeout,
            }],
            ..CorrelationOutcome::default()
        };
        let retrieval = RetrievalSummary {
            warnings: vec![RetrievalWarning {
                endpoint: "activities".to_string(),
                reason: WarningReason::Status(500),
            }],
            rejected_deals: 2,
            rejected_activities: 0,
        };
        let settings = CorrelatorSettings {
            slow_boundary: SlowBoundary::Inclusive,
            ..CorrelatorSettings::default()
        };

        let report = ReportAssembler::assemble(
            &window,
            deal_metrics.clone(),
            activity_metrics,
            correlation,
            &settings,
            retrieval,
        );

        assert_eq!(report.period_label(), "10-2024");
        assert_eq!(report.deal_metrics, deal_metrics);
        assert_eq!(report.activity_metrics, activity_metrics);
        assert_eq!(report.average_response_hours, Some(5.25));
        assert_eq!(report.no_contact_ids, vec![1]);
        assert_eq!(report.no_email_ids, vec![2]);
        assert_eq!(report.malformed_data_ids, vec![3]);
        assert_eq!(report.slow_threshold_hours, 12.0);
        assert_eq!(report.slow_boundary, SlowBoundary::Inclusive);
        assert_eq!(report.rejected_deals, 2);
        assert!(report.is_partial());
        assert!(report.has_data_anomalies());
        let endpoints: Vec<&str> = report
            .retrieval_warnings
            .iter()
            .map(|w| w.endpoint.as_str())
            .collect();
        assert_eq!(endpoints, vec!["activities", "persons/9/mailMessages"]);
    }
}
