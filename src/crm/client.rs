//! CRM read API client
//!
//! Wraps a `reqwest::Client` built once from an immutable [`ClientConfig`].
//! Authentication is the static `api_token` query parameter.
//!
//! ## Pagination
//!
//! Collection endpoints return
//! `additional_data.pagination.{more_items_in_collection, next_start}`. The
//! fetcher keeps requesting with `start = next_start` while the flag is true.
//! Mail thread endpoints are fetched with exactly one request.
//!
//! ## Failure
//!
//! A non-success status, timeout, transport error or undecodable body stops the
//! current fetch. Records gathered so far are returned together with a
//! [`RetrievalWarning`]; the caller decides what a partial result means.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use salespulse::config::ClientConfig;
//! use salespulse::crm::{CrmClient, Endpoint};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = CrmClient::new(ClientConfig::from_env()?)?;
//! let deals = client.fetch(Endpoint::Deals, &[]).await;
//! println!("{} deals, partial: {}", deals.records.len(), deals.is_partial());
//! # Ok(())
//! # }
//! ```

use super::types::{
    decode_records, Envelope, WireActivity, WireDeal, WireMailMessage,
};
use super::{CrmSource, Endpoint, Fetched, RetrievalWarning, ThreadKey, WarningReason};
use crate::config::ClientConfig;
use crate::report_core::filter::MonthWindow;
use crate::report_core::model::{Activity, Deal, EmailMessage};
use async_trait::async_trait;

pub struct CrmClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl CrmClient {
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { http, config })
    }

    /// Fetch every record of `endpoint`
    ///
    /// `query` is copied into a fresh parameter list for each request; the
    /// pagination cursor lives only inside this call.
    pub async fn fetch(
        &self,
        endpoint: Endpoint,
        query: &[(&str, String)],
    ) -> Fetched<serde_json::Value> {
        let url = format!("{}/{}", self.config.base_url, endpoint.path());
        let paginated = endpoint.is_paginated();

        let mut fetched = Fetched::default();
        let mut start: Option<u64> = None;
        let mut pages = 0usize;

        loop {
            let mut params: Vec<(&str, String)> = query.to_vec();
            params.push(("api_token", self.config.api_token.clone()));
            if paginated {
                params.push(("limit", self.config.page_limit.to_string()));
                if let Some(start) = start {
                    params.push(("start", start.to_string()));
                }
            }

            log::debug!("GET {} (page {}, start {:?})", endpoint, pages + 1, start);

            let response = match self.http.get(&url).query(&params).send().await {
                Ok(response) => response,
                Err(e) => {
                    let reason = if e.is_timeout() {
                        WarningReason::Timeout
                    } else {
                        // strip the URL, it carries the token
                        WarningReason::Transport(e.without_url().to_string())
                    };
                    self.warn(&mut fetched, endpoint, reason);
                    break;
                }
            };

            let status = response.status();
            if !status.is_success() {
                self.warn(&mut fetched, endpoint, WarningReason::Status(status.as_u16()));
                break;
            }

            let envelope: Envelope = match response.json().await {
                Ok(envelope) => envelope,
                Err(e) => {
                    let reason = if e.is_timeout() {
                        WarningReason::Timeout
                    } else {
                        WarningReason::Decode(e.without_url().to_string())
                    };
                    self.warn(&mut fetched, endpoint, reason);
                    break;
                }
            };

            pages += 1;
            fetched.records.extend(envelope.data.unwrap_or_default());

            if !paginated {
                break;
            }

            let pagination = envelope.additional_data.and_then(|a| a.pagination);
            match pagination {
                Some(p) if p.more_items_in_collection => match p.next_start {
                    Some(next) => start = Some(next),
                    None => {
                        self.warn(&mut fetched, endpoint, WarningReason::MissingCursor);
                        break;
                    }
                },
                _ => break,
            }
        }

        log::debug!(
            "Fetched {} records from {} in {} page(s)",
            fetched.records.len(),
            endpoint,
            pages
        );

        fetched
    }

    fn warn(&self, fetched: &mut Fetched<serde_json::Value>, endpoint: Endpoint, reason: WarningReason) {
        log::warn!(
            "⚠️  Error fetching {}: {} (keeping {} records)",
            endpoint,
            reason,
            fetched.records.len()
        );
        fetched.warnings.push(RetrievalWarning {
            endpoint: endpoint.path(),
            reason,
        });
    }
}

#[async_trait]
impl CrmSource for CrmClient {
    async fn deals(&self) -> Fetched<Deal> {
        let raw = self.fetch(Endpoint::Deals, &[]).await;
        decode_records::<WireDeal, Deal>(raw, "deal")
    }

    async fn activities(&self, window: &MonthWindow) -> Fetched<Activity> {
        let endpoint = self.config.activities_endpoint;
        let query = match endpoint {
            Endpoint::ActivitiesCollection => vec![
                ("since", format!("{} 00:00:00", window.first_day)),
                ("until", format!("{} 23:59:59", window.last_day)),
            ],
            _ => vec![
                ("start_date", window.first_day.to_string()),
                ("end_date", window.last_day.to_string()),
            ],
        };

        let raw = self.fetch(endpoint, &query).await;
        decode_records::<WireActivity, Activity>(raw, "activity")
    }

    async fn mail_thread(&self, key: ThreadKey) -> Fetched<EmailMessage> {
        let raw = self.fetch(key.endpoint(), &[]).await;
        decode_records::<WireMailMessage, EmailMessage>(raw, "mail message")
    }
}
