//! In-memory CRM source
//!
//! Replays a captured API snapshot so a report can be re-run offline and
//! compared byte for byte. The file holds raw wire records, decoded through
//! the same validation as live responses:
//!
//! ```json
//! {
//!   "deals": [ { "id": 1, "add_time": "2024-10-01 08:00:00", "status": "open", ... } ],
//!   "activities": [ { "id": 9, "add_time": "2024-10-02 10:00:00", "done": true } ],
//!   "person_threads": { "7": [ { "timestamp": "...", "data": { "from": [...], "to": [...] } } ] },
//!   "deal_threads": { "1": [ ... ] }
//! }
//! ```
//!
//! Threads are stored newest first, like the server returns them.

use super::types::{decode_records, WireActivity, WireDeal, WireMailMessage};
use super::{CrmSource, Fetched, RetrievalWarning, ThreadKey, WarningReason};
use crate::report_core::filter::MonthWindow;
use crate::report_core::model::{Activity, Deal, EmailMessage};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    deals: Vec<serde_json::Value>,
    #[serde(default)]
    activities: Vec<serde_json::Value>,
    #[serde(default)]
    person_threads: BTreeMap<i64, Vec<serde_json::Value>>,
    #[serde(default)]
    deal_threads: BTreeMap<i64, Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotSource {
    deals: Vec<Deal>,
    activities: Vec<Activity>,
    threads: HashMap<ThreadKey, Vec<EmailMessage>>,
    failures: HashMap<ThreadKey, WarningReason>,
    /// Records that failed decoding, reported back on every read
    rejected_deals: usize,
    rejected_activities: usize,
    rejected_messages: HashMap<ThreadKey, usize>,
}

impl SnapshotSource {
    pub fn new(deals: Vec<Deal>, activities: Vec<Activity>) -> Self {
        Self {
            deals,
            activities,
            ..Self::default()
        }
    }

    /// `messages` newest first
    pub fn with_thread(mut self, key: ThreadKey, messages: Vec<EmailMessage>) -> Self {
        self.threads.insert(key, messages);
        self
    }

    /// Make the thread lookup for `key` degrade like a failed request
    pub fn with_thread_failure(mut self, key: ThreadKey, reason: WarningReason) -> Self {
        self.failures.insert(key, reason);
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, SnapshotError> {
        let file: SnapshotFile = serde_json::from_str(json)?;

        let deals = decode_records::<WireDeal, Deal>(Fetched::ok(file.deals), "deal");
        let activities =
            decode_records::<WireActivity, Activity>(Fetched::ok(file.activities), "activity");

        let mut source = Self::new(deals.records, activities.records);
        source.rejected_deals = deals.rejected;
        source.rejected_activities = activities.rejected;
        let mut rejected = deals.rejected + activities.rejected;

        let person_threads = file
            .person_threads
            .into_iter()
            .map(|(id, raw)| (ThreadKey::Person(id), raw));
        let deal_threads = file
            .deal_threads
            .into_iter()
            .map(|(id, raw)| (ThreadKey::Deal(id), raw));

        for (key, raw) in person_threads.chain(deal_threads) {
            let thread =
                decode_records::<WireMailMessage, EmailMessage>(Fetched::ok(raw), "mail message");
            rejected += thread.rejected;
            if thread.rejected > 0 {
                source.rejected_messages.insert(key, thread.rejected);
            }
            source.threads.insert(key, thread.records);
        }

        log::info!(
            "📂 Loaded snapshot: {} deals, {} activities, {} threads ({} records rejected)",
            source.deals.len(),
            source.activities.len(),
            source.threads.len(),
            rejected
        );

        Ok(source)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[async_trait]
impl CrmSource for SnapshotSource {
    async fn deals(&self) -> Fetched<Deal> {
        Fetched {
            rejected: self.rejected_deals,
            ..Fetched::ok(self.deals.clone())
        }
    }

    /// Mirrors the server-side date filter: activities created inside the window
    ///
    /// Rejected activities have no usable date, so all of them are reported.
    async fn activities(&self, window: &MonthWindow) -> Fetched<Activity> {
        Fetched {
            rejected: self.rejected_activities,
            ..Fetched::ok(
                self.activities
                    .iter()
                    .filter(|a| a.created_at.is_some_and(|t| window.contains(t.date())))
                    .cloned()
                    .collect(),
            )
        }
    }

    async fn mail_thread(&self, key: ThreadKey) -> Fetched<EmailMessage> {
        if let Some(reason) = self.failures.get(&key) {
            return Fetched {
                records: Vec::new(),
                warnings: vec![RetrievalWarning {
                    endpoint: key.endpoint().path(),
                    reason: reason.clone(),
                }],
                rejected: 0,
            };
        }

        Fetched {
            rejected: self.rejected_messages.get(&key).copied().unwrap_or(0),
            ..Fetched::ok(self.threads.get(&key).cloned().unwrap_or_default())
        }
    }
}
