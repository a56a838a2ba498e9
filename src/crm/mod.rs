//! CRM read API access
//!
//! - `client` - HTTP fetcher with cursor pagination (`CrmClient`)
//! - `snapshot` - in-memory source loaded from a JSON capture (`SnapshotSource`)
//! - `types` - wire records, validation, `ParseError`
//!
//! The rest of the crate only sees [`CrmSource`], so a run can be driven by
//! the live API or by an in-memory snapshot.

pub mod client;
pub mod snapshot;
pub mod types;

use crate::report_core::filter::MonthWindow;
use crate::report_core::model::{Activity, Deal, EmailMessage};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

pub use client::CrmClient;
pub use snapshot::SnapshotSource;
pub use types::ParseError;

/// Named collections of the read API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Deals,
    Activities,
    ActivitiesCollection,
    PersonMailMessages(i64),
    DealMailMessages(i64),
}

impl Endpoint {
    pub fn path(&self) -> String {
        match self {
            Endpoint::Deals => "deals".to_string(),
            Endpoint::Activities => "activities".to_string(),
            Endpoint::ActivitiesCollection => "activities/collection".to_string(),
            Endpoint::PersonMailMessages(id) => format!("persons/{}/mailMessages", id),
            Endpoint::DealMailMessages(id) => format!("deals/{}/mailMessages", id),
        }
    }

    /// Mail threads come back in one response and ignore `start`
    pub fn is_paginated(&self) -> bool {
        matches!(
            self,
            Endpoint::Deals | Endpoint::Activities | Endpoint::ActivitiesCollection
        )
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Why a fetch stopped early
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum WarningReason {
    Status(u16),
    Timeout,
    Transport(String),
    Decode(String),
    /// Server said there is more but sent no `next_start`
    MissingCursor,
}

impl fmt::Display for WarningReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningReason::Status(code) => write!(f, "HTTP status {}", code),
            WarningReason::Timeout => write!(f, "request timed out"),
            WarningReason::Transport(e) => write!(f, "transport error: {}", e),
            WarningReason::Decode(e) => write!(f, "undecodable response: {}", e),
            WarningReason::MissingCursor => write!(f, "pagination cursor missing"),
        }
    }
}

/// Non-fatal retrieval problem; the run keeps whatever was collected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievalWarning {
    pub endpoint: String,
    pub reason: WarningReason,
}

impl fmt::Display for RetrievalWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.endpoint, self.reason)
    }
}

/// Result of one fetch: records in page order plus anything that went wrong
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub records: Vec<T>,
    pub warnings: Vec<RetrievalWarning>,
    /// Records dropped at the wire boundary
    pub rejected: usize,
}

impl<T> Default for Fetched<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            warnings: Vec::new(),
            rejected: 0,
        }
    }
}

impl<T> Fetched<T> {
    pub fn ok(records: Vec<T>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Where a deal's email thread is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadKey {
    Person(i64),
    Deal(i64),
}

impl ThreadKey {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            ThreadKey::Person(id) => Endpoint::PersonMailMessages(*id),
            ThreadKey::Deal(id) => Endpoint::DealMailMessages(*id),
        }
    }
}

/// Read side of the CRM as the report pipeline needs it
#[async_trait]
pub trait CrmSource: Send + Sync {
    /// All deals, unfiltered
    async fn deals(&self) -> Fetched<Deal>;

    /// Activities the server attributes to the month
    async fn activities(&self, window: &MonthWindow) -> Fetched<Activity>;

    /// Thread as the server returns it (newest first)
    async fn mail_thread(&self, key: ThreadKey) -> Fetched<EmailMessage>;
}
