//! Deal → first-response correlation
//!
//! For every deal in the window: resolve the contact person and their email
//! addresses, pull the mail thread, pick the first qualifying message and turn
//! the gap into hours. Each deal ends up in exactly one [`ResponseClass`].
//!
//! Thread lookups are one request per deal. They run through an
//! order-preserving bounded stream so at most `max_in_flight` requests are
//! outstanding and the output order always matches the input order.

use super::model::{round2, Deal, EmailMessage, ResponseClass, ResponseRecord};
use crate::config::DEFAULT_APP_URL;
use crate::crm::{CrmSource, RetrievalWarning, ThreadKey};
use chrono::NaiveDateTime;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Which message in a thread counts as the first response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Oldest message, whatever its direction
    AnyFirstMessage,
    /// Oldest message with a sender and at least one customer recipient
    AgentReply,
}

impl MatchStrategy {
    /// `thread` must be ordered oldest first
    pub fn select<'a>(
        &self,
        thread: &'a [EmailMessage],
        customer_emails: &BTreeSet<String>,
    ) -> Option<&'a EmailMessage> {
        match self {
            MatchStrategy::AnyFirstMessage => thread.first(),
            MatchStrategy::AgentReply => thread
                .iter()
                .find(|m| !m.senders.is_empty() && m.is_addressed_to(customer_emails)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::AnyFirstMessage => "any-first-message",
            MatchStrategy::AgentReply => "agent-reply",
        }
    }
}

impl FromStr for MatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "any-first-message" | "any" | "a" => Ok(MatchStrategy::AnyFirstMessage),
            "agent-reply" | "agent" | "b" => Ok(MatchStrategy::AgentReply),
            other => Err(format!("unknown match strategy '{}'", other)),
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which thread a deal's first response is looked up in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadSource {
    /// The contact person's aggregate thread
    Person,
    /// The deal's own thread
    Deal,
}

impl FromStr for ThreadSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "person" => Ok(ThreadSource::Person),
            "deal" => Ok(ThreadSource::Deal),
            other => Err(format!("unknown thread source '{}'", other)),
        }
    }
}

impl fmt::Display for ThreadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadSource::Person => f.write_str("person"),
            ThreadSource::Deal => f.write_str("deal"),
        }
    }
}

/// Whether a response of exactly the threshold counts as slow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlowBoundary {
    Exclusive,
    Inclusive,
}

impl SlowBoundary {
    /// Comparison used in output labels
    pub fn symbol(&self) -> &'static str {
        match self {
            SlowBoundary::Exclusive => ">",
            SlowBoundary::Inclusive => ">=",
        }
    }
}

impl FromStr for SlowBoundary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exclusive" => Ok(SlowBoundary::Exclusive),
            "inclusive" => Ok(SlowBoundary::Inclusive),
            other => Err(format!("unknown slow boundary '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatorSettings {
    pub strategy: MatchStrategy,
    pub thread_source: ThreadSource,
    pub slow_threshold_hours: f64,
    pub slow_boundary: SlowBoundary,
    pub max_in_flight: usize,
    /// Deal permalinks are `{app_base_url}/deal/{id}`
    pub app_base_url: String,
}

impl Default for CorrelatorSettings {
    fn default() -> Self {
        Self {
            strategy: MatchStrategy::AnyFirstMessage,
            thread_source: ThreadSource::Person,
            slow_threshold_hours: 12.0,
            slow_boundary: SlowBoundary::Exclusive,
            max_in_flight: 4,
            app_base_url: DEFAULT_APP_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlowResponse {
    pub deal_id: i64,
    pub person_name: String,
    pub elapsed_hours: f64,
    pub link: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrelationOutcome {
    /// One per correlated deal, in deal order
    pub records: Vec<ResponseRecord>,
    pub average_response_hours: Option<f64>,
    pub no_contact_ids: Vec<i64>,
    pub no_email_ids: Vec<i64>,
    pub negative_elapsed_ids: Vec<i64>,
    pub malformed_data_ids: Vec<i64>,
    pub slow_responses: Vec<SlowResponse>,
    pub warnings: Vec<RetrievalWarning>,
}

pub struct ResponseTimeCorrelator {
    settings: CorrelatorSettings,
}

impl ResponseTimeCorrelator {
    pub fn new(settings: CorrelatorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &CorrelatorSettings {
        &self.settings
    }

    pub fn permalink(&self, deal_id: i64) -> String {
        format!("{}/deal/{}", self.settings.app_base_url, deal_id)
    }

    pub fn is_slow(&self, elapsed_hours: f64) -> bool {
        match self.settings.slow_boundary {
            SlowBoundary::Exclusive => elapsed_hours > self.settings.slow_threshold_hours,
            SlowBoundary::Inclusive => elapsed_hours >= self.settings.slow_threshold_hours,
        }
    }

    /// Correlate every deal against its thread
    ///
    /// Deals without a creation timestamp are skipped; the filter never lets
    /// them through, so this only matters for callers passing raw deals.
    pub async fn correlate<S>(&self, source: &S, deals: &[Deal]) -> CorrelationOutcome
    where
        S: CrmSource + ?Sized,
    {
        log::info!(
            "🔗 Correlating {} deals (strategy: {}, thread source: {}, max in flight: {})",
            deals.len(),
            self.settings.strategy,
            self.settings.thread_source,
            self.settings.max_in_flight
        );

        let timed = deals.iter().filter_map(|deal| match deal.created_at {
            Some(created_at) => Some((deal, created_at)),
            None => {
                log::debug!("Deal {} has no creation time, skipping correlation", deal.id);
                None
            }
        });

        let results: Vec<(ResponseRecord, Vec<RetrievalWarning>)> = stream::iter(timed)
            .map(|(deal, created_at)| self.correlate_deal(source, deal, created_at))
            .buffered(self.settings.max_in_flight.max(1))
            .collect()
            .await;

        let mut outcome = CorrelationOutcome::default();
        let mut resolved_hours = Vec::new();

        for (record, warnings) in results {
            outcome.warnings.extend(warnings);

            match record.class {
                ResponseClass::NoContact => outcome.no_contact_ids.push(record.deal_id),
                ResponseClass::NoEmail => outcome.no_email_ids.push(record.deal_id),
                ResponseClass::NegativeElapsed => outcome.negative_elapsed_ids.push(record.deal_id),
                ResponseClass::MalformedData => outcome.malformed_data_ids.push(record.deal_id),
                ResponseClass::Resolved => {
                    if let Some(hours) = record.elapsed_hours {
                        resolved_hours.push(hours);
                        if self.is_slow(hours) {
                            outcome.slow_responses.push(SlowResponse {
                                deal_id: record.deal_id,
                                person_name: record.person_name.clone().unwrap_or_default(),
                                elapsed_hours: hours,
                                link: self.permalink(record.deal_id),
                            });
                        }
                    }
                }
            }

            outcome.records.push(record);
        }

        outcome.average_response_hours = average(&resolved_hours);

        match outcome.average_response_hours {
            Some(avg) => log::info!(
                "⏱️  Average response time over {} deals: {} hours",
                resolved_hours.len(),
                avg
            ),
            None => log::info!("⏱️  No response times available"),
        }
        log::info!(
            "   No contact: {}, no email: {}, negative elapsed: {}, malformed data: {}, slow: {}",
            outcome.no_contact_ids.len(),
            outcome.no_email_ids.len(),
            outcome.negative_elapsed_ids.len(),
            outcome.malformed_data_ids.len(),
            outcome.slow_responses.len()
        );

        outcome
    }

    async fn correlate_deal<S>(
        &self,
        source: &S,
        deal: &Deal,
        created_at: NaiveDateTime,
    ) -> (ResponseRecord, Vec<RetrievalWarning>)
    where
        S: CrmSource + ?Sized,
    {
        let mut record = ResponseRecord {
            deal_id: deal.id,
            person_id: None,
            person_name: None,
            deal_created_at: created_at,
            first_response_at: None,
            elapsed_hours: None,
            class: ResponseClass::NoContact,
        };

        let Some(person) = deal.person.as_ref() else {
            log::debug!("Deal {}: no contact person", deal.id);
            return (record, Vec::new());
        };
        record.person_name = Some(person.name.clone());

        let Some(person_id) = person.id else {
            log::debug!("Deal {}: contact person has no id", deal.id);
            return (record, Vec::new());
        };
        record.person_id = Some(person_id);

        if person.emails.is_empty() {
            log::debug!("Deal {}: no customer email addresses", deal.id);
            record.class = ResponseClass::NoEmail;
            return (record, Vec::new());
        }

        let key = match self.settings.thread_source {
            ThreadSource::Person => ThreadKey::Person(person_id),
            ThreadSource::Deal => ThreadKey::Deal(deal.id),
        };

        let fetched = source.mail_thread(key).await;
        let mut thread = fetched.records;
        // server sends newest first
        thread.reverse();

        log::debug!("Deal {}: {} messages in {:?} thread", deal.id, thread.len(), key);

        // a dropped message may have been the real first response
        if fetched.rejected > 0 {
            log::warn!(
                "⚠️  Deal {}: {} unreadable message(s) in {} thread, response time not computed",
                deal.id,
                fetched.rejected,
                key.endpoint()
            );
            record.class = ResponseClass::MalformedData;
            return (record, fetched.warnings);
        }

        let Some(message) = self.settings.strategy.select(&thread, &person.emails) else {
            log::debug!("Deal {}: no qualifying email found", deal.id);
            record.class = ResponseClass::NoEmail;
            return (record, fetched.warnings);
        };

        let elapsed_secs = (message.timestamp - created_at).num_seconds();
        let hours = round2(elapsed_secs as f64 / 3600.0);
        record.first_response_at = Some(message.timestamp);
        record.elapsed_hours = Some(hours);

        if elapsed_secs < 0 {
            log::warn!(
                "⚠️  Deal {}: first email at {} predates deal creation at {} ({} hours)",
                deal.id,
                message.timestamp,
                created_at,
                hours
            );
            record.class = ResponseClass::NegativeElapsed;
        } else {
            log::debug!("Deal {}: response time {} hours", deal.id, hours);
            record.class = ResponseClass::Resolved;
        }

        (record, fetched.warnings)
    }
}

fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(round2(values.iter().sum::<f64>() / values.len() as f64))
    }
}
