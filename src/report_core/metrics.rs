//! Deal and activity counters for one reporting month

use super::model::{Activity, Deal, DealStatus};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DealMetrics {
    pub deals_created: usize,
    pub total_deal_value: f64,
    pub deals_closed: usize,
    pub deals_won: usize,
    pub deals_lost: usize,
    pub deals_open: usize,
    pub won_deal_ids: Vec<i64>,
}

impl DealMetrics {
    pub fn add_deal(&mut self, deal: &Deal) {
        self.deals_created += 1;

        // zero and missing values still count as created
        if let Some(value) = deal.value.filter(|v| *v != 0.0) {
            self.total_deal_value += value;
        }

        match deal.status {
            DealStatus::Closed => self.deals_closed += 1,
            DealStatus::Won => {
                self.deals_won += 1;
                self.won_deal_ids.push(deal.id);
            }
            DealStatus::Lost => self.deals_lost += 1,
            DealStatus::Open => self.deals_open += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActivityMetrics {
    pub activities_created: usize,
    pub activities_completed: usize,
}

impl ActivityMetrics {
    pub fn add_activity(&mut self, activity: &Activity) {
        self.activities_created += 1;
        if activity.done {
            self.activities_completed += 1;
        }
    }
}

pub struct MetricsAggregator;

impl MetricsAggregator {
    /// Expects deals already restricted to the reporting window
    pub fn deal_metrics(deals: &[Deal]) -> DealMetrics {
        let mut metrics = DealMetrics::default();
        for deal in deals {
            metrics.add_deal(deal);
        }

        log::info!(
            "📊 Deals created: {}, total value: {}, closed: {}, won: {}, lost: {}, open: {}",
            metrics.deals_created,
            metrics.total_deal_value,
            metrics.deals_closed,
            metrics.deals_won,
            metrics.deals_lost,
            metrics.deals_open
        );

        metrics
    }

    pub fn activity_metrics(activities: &[Activity]) -> ActivityMetrics {
        let mut metrics = ActivityMetrics::default();
        for activity in activities {
            metrics.add_activity(activity);
        }

        log::info!(
            "📊 Activities created: {}, completed: {}",
            metrics.activities_created,
            metrics.activities_completed
        );

        metrics
    }
}
