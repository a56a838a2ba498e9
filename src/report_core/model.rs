//! Domain records shared by the filter, aggregator and correlator
//!
//! These are the validated forms of CRM payloads. Wire decoding lives in
//! `crm::types`; nothing in here knows about JSON.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DealStatus {
    Open,
    Won,
    Lost,
    Closed,
}

impl DealStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::Open => "open",
            DealStatus::Won => "won",
            DealStatus::Lost => "lost",
            DealStatus::Closed => "closed",
        }
    }
}

impl FromStr for DealStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(DealStatus::Open),
            "won" => Ok(DealStatus::Won),
            "lost" => Ok(DealStatus::Lost),
            "closed" => Ok(DealStatus::Closed),
            other => Err(format!("unknown deal status '{}'", other)),
        }
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contact person attached to a deal
#[derive(Debug, Clone, PartialEq)]
pub struct ContactPerson {
    /// `None` when the CRM sent a person object without a usable id
    pub id: Option<i64>,
    pub name: String,
    /// Lowercased, trimmed, de-duplicated
    pub emails: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Deal {
    pub id: i64,
    pub created_at: Option<NaiveDateTime>,
    pub value: Option<f64>,
    pub status: DealStatus,
    pub person: Option<ContactPerson>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub id: i64,
    pub created_at: Option<NaiveDateTime>,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub timestamp: NaiveDateTime,
    pub senders: BTreeSet<String>,
    pub recipients: BTreeSet<String>,
}

impl EmailMessage {
    /// True when at least one recipient is in `addresses`
    pub fn is_addressed_to(&self, addresses: &BTreeSet<String>) -> bool {
        self.recipients.iter().any(|r| addresses.contains(r))
    }
}

/// Outcome of correlating one deal with its email thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseClass {
    Resolved,
    NoContact,
    NoEmail,
    /// First qualifying message predates the deal
    NegativeElapsed,
    /// Thread held messages that failed validation, so the first response
    /// cannot be trusted
    MalformedData,
}

impl ResponseClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseClass::Resolved => "resolved",
            ResponseClass::NoContact => "no-contact",
            ResponseClass::NoEmail => "no-email",
            ResponseClass::NegativeElapsed => "negative-elapsed",
            ResponseClass::MalformedData => "malformed-data",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseRecord {
    pub deal_id: i64,
    pub person_id: Option<i64>,
    pub person_name: Option<String>,
    pub deal_created_at: NaiveDateTime,
    pub first_response_at: Option<NaiveDateTime>,
    pub elapsed_hours: Option<f64>,
    pub class: ResponseClass,
}

/// Normalize a raw address for set membership checks
pub fn normalize_email(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Round to two decimal places, half away from zero
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
