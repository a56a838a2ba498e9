//! SalesPulse - monthly sales KPI reports from CRM data
//!
//! - `config` - environment-driven client and report settings
//! - `crm` - read API client, offline snapshot source, wire decoding
//! - `report_core` - filtering, metrics, response-time correlation, output

pub mod config;
pub mod crm;
pub mod report_core;
