//! Wire records for the CRM read API and their validated conversion
//!
//! Payloads are loosely typed and optional-heavy. Everything is decoded into
//! explicit `Wire*` structs first, then converted with `TryFrom` so a missing
//! required field surfaces as a named [`ParseError`] instead of a panic further
//! down the pipeline.
//!
//! ## Envelope
//!
//! ```json
//! { "data": [ ... ],
//!   "additional_data": { "pagination": { "more_items_in_collection": true, "next_start": 500 } } }
//! ```

use super::Fetched;
use crate::report_core::model::{
    normalize_email, Activity, ContactPerson, Deal, DealStatus, EmailMessage,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{record} is missing required field '{field}'")]
    MissingField {
        record: &'static str,
        field: &'static str,
    },
    #[error("malformed timestamp '{0}'")]
    MalformedTimestamp(String),
    #[error("unknown deal status '{0}'")]
    UnknownStatus(String),
    #[error("deal {0} has a negative value")]
    NegativeValue(i64),
    #[error("unexpected record shape: {0}")]
    Shape(#[from] serde_json::Error),
}

#[derive(Debug, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub data: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub additional_data: Option<AdditionalData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdditionalData {
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub more_items_in_collection: bool,
    #[serde(default)]
    pub next_start: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct WireDeal {
    pub id: Option<i64>,
    #[serde(default)]
    pub add_time: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub person_id: Option<WirePersonRef>,
}

/// `person_id` is an expanded object on list endpoints, a bare id elsewhere
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WirePersonRef {
    Expanded(WirePerson),
    Id(i64),
}

#[derive(Debug, Deserialize)]
pub struct WirePerson {
    #[serde(default)]
    pub value: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<Vec<WireEmailField>>,
}

#[derive(Debug, Deserialize)]
pub struct WireEmailField {
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireActivity {
    pub id: Option<i64>,
    #[serde(default)]
    pub add_time: Option<String>,
    #[serde(default)]
    pub done: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct WireMailMessage {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub data: Option<WireMailData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WireMailData {
    #[serde(default)]
    pub from: Option<Vec<WireMailParty>>,
    #[serde(default)]
    pub to: Option<Vec<WireMailParty>>,
}

#[derive(Debug, Deserialize)]
pub struct WireMailParty {
    #[serde(default)]
    pub email_address: Option<String>,
}

/// Parse a CRM timestamp as UTC-naive, truncated to whole seconds
///
/// Accepts `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS[.fff][Z|+hh:mm]` and a
/// bare `YYYY-MM-DD` (midnight). Anything past the seconds field is dropped.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, ParseError> {
    let raw = raw.trim();
    let malformed = || ParseError::MalformedTimestamp(raw.to_string());

    if raw.len() == 10 {
        return NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(malformed);
    }

    let head = raw.get(..19).ok_or_else(malformed)?;
    let normalized = head.replacen('T', " ", 1);
    NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S").map_err(|_| malformed())
}

fn optional_timestamp(raw: Option<&str>) -> Result<Option<NaiveDateTime>, ParseError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_timestamp(s).map(Some),
    }
}

fn address_set<'a>(parties: impl Iterator<Item = Option<&'a str>>) -> BTreeSet<String> {
    parties.flatten().filter_map(normalize_email).collect()
}

impl From<WirePersonRef> for ContactPerson {
    fn from(person: WirePersonRef) -> Self {
        match person {
            WirePersonRef::Expanded(p) => ContactPerson {
                // zero is how the CRM spells "no person"
                id: p.value.filter(|id| *id != 0),
                name: p.name.unwrap_or_else(|| "Unknown".to_string()),
                emails: address_set(
                    p.email
                        .iter()
                        .flatten()
                        .map(|e| e.value.as_deref()),
                ),
            },
            WirePersonRef::Id(id) => ContactPerson {
                id: Some(id).filter(|id| *id != 0),
                name: "Unknown".to_string(),
                emails: BTreeSet::new(),
            },
        }
    }
}

impl TryFrom<WireDeal> for Deal {
    type Error = ParseError;

    fn try_from(wire: WireDeal) -> Result<Self, Self::Error> {
        let id = wire.id.ok_or(ParseError::MissingField {
            record: "deal",
            field: "id",
        })?;
        let status = wire
            .status
            .as_deref()
            .ok_or(ParseError::MissingField {
                record: "deal",
                field: "status",
            })?;
        let status: DealStatus = status
            .parse()
            .map_err(|_| ParseError::UnknownStatus(status.to_string()))?;

        if wire.value.is_some_and(|v| v < 0.0) {
            return Err(ParseError::NegativeValue(id));
        }

        Ok(Deal {
            id,
            created_at: optional_timestamp(wire.add_time.as_deref())?,
            value: wire.value,
            status,
            person: wire.person_id.map(ContactPerson::from),
        })
    }
}

impl TryFrom<WireActivity> for Activity {
    type Error = ParseError;

    fn try_from(wire: WireActivity) -> Result<Self, Self::Error> {
        Ok(Activity {
            id: wire.id.ok_or(ParseError::MissingField {
                record: "activity",
                field: "id",
            })?,
            created_at: optional_timestamp(wire.add_time.as_deref())?,
            done: wire.done.unwrap_or(false),
        })
    }
}

impl TryFrom<WireMailMessage> for EmailMessage {
    type Error = ParseError;

    fn try_from(wire: WireMailMessage) -> Result<Self, Self::Error> {
        let raw_ts = wire.timestamp.ok_or(ParseError::MissingField {
            record: "mail message",
            field: "timestamp",
        })?;
        let data = wire.data.unwrap_or_default();

        Ok(EmailMessage {
            timestamp: parse_timestamp(&raw_ts)?,
            senders: address_set(
                data.from
                    .iter()
                    .flatten()
                    .map(|p| p.email_address.as_deref()),
            ),
            recipients: address_set(
                data.to
                    .iter()
                    .flatten()
                    .map(|p| p.email_address.as_deref()),
            ),
        })
    }
}

/// Decode raw records into domain records, skipping the ones that fail
///
/// Order is preserved. Rejected records are logged and counted; warnings from
/// retrieval are carried over untouched.
pub fn decode_records<W, T>(raw: Fetched<serde_json::Value>, what: &str) -> Fetched<T>
where
    W: DeserializeOwned,
    T: TryFrom<W, Error = ParseError>,
{
    let mut decoded = Fetched {
        records: Vec::with_capacity(raw.records.len()),
        warnings: raw.warnings,
        rejected: raw.rejected,
    };

    for value in raw.records {
        let result = serde_json::from_value::<W>(value)
            .map_err(ParseError::from)
            .and_then(T::try_from);

        match result {
            Ok(record) => decoded.records.push(record),
            Err(e) => {
                log::warn!("⚠️  Skipping {} record: {}", what, e);
                decoded.rejected += 1;
            }
        }
    }

    decoded
}
