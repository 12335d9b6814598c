//! Shared domain types for cases, travellers, and the values extracted from
//! an inbound request. These are the data-model counterparts of spec.md §3.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Outbound => "OUTBOUND",
            Direction::Inbound => "INBOUND",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "WORLDWIDE")]
    Worldwide,
    #[serde(rename = "WW_EXCL_US_CA")]
    WwExclUsCa,
    #[serde(rename = "INBOUND")]
    Inbound,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Worldwide => "WORLDWIDE",
            Scope::WwExclUsCa => "WW_EXCL_US_CA",
            Scope::Inbound => "INBOUND",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Plan {
    Silver,
    Gold,
    #[serde(rename = "Gold Plus")]
    GoldPlus,
    Platinum,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Silver => "Silver",
            Plan::Gold => "Gold",
            Plan::GoldPlus => "Gold Plus",
            Plan::Platinum => "Platinum",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Plan> {
        match s {
            "Silver" => Some(Plan::Silver),
            "Gold" => Some(Plan::Gold),
            "Gold Plus" => Some(Plan::GoldPlus),
            "Platinum" => Some(Plan::Platinum),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Success,
    Missing,
    Ignore,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Success => "success",
            Route::Missing => "missing",
            Route::Ignore => "ignore",
        }
    }
}

/// Fields pulled out of the free-text email body by the field extractor
/// (spec.md §4.3). Every field is nullable by design.
#[derive(Debug, Clone, Default)]
pub struct ExtractedFields {
    pub intent_ok: bool,
    pub direction: Option<Direction>,
    pub scope: Option<Scope>,
    pub plan: Option<Plan>,
    pub coverage_limit: Option<i64>,
    pub days: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub sports_coverage: bool,
}

/// A fully parsed MRZ record (spec.md §4.2), retained in full for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MrzRecord {
    pub passport_number: String,
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub nationality: String,
    pub sex: String,
    pub expiry_date: Option<NaiveDate>,
    pub mrz_line1: String,
    pub mrz_line2: String,
}

/// A persisted case row (spec.md §3).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CaseRow {
    pub case_id: Uuid,
    pub message_id: String,
    pub thread_id: String,
    pub idempotency_key: String,
    pub from_email: String,
    pub subject: String,
    pub body: String,
    pub received_at: NaiveDateTime,
    pub direction: Option<String>,
    pub scope: Option<String>,
    pub plan: Option<String>,
    pub coverage_limit: Option<i32>,
    pub days: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub sports_coverage: bool,
    pub premium_base: Option<rust_decimal::Decimal>,
    pub premium_subtotal: Option<rust_decimal::Decimal>,
    pub premium_group_discount: Option<rust_decimal::Decimal>,
    pub premium_net: Option<rust_decimal::Decimal>,
    pub premium_tax: Option<rust_decimal::Decimal>,
    pub premium_fees: Option<rust_decimal::Decimal>,
    pub premium_total: Option<rust_decimal::Decimal>,
    pub currency: String,
    pub route: String,
    pub missing_fields: serde_json::Value,
    pub intent_ok: bool,
    pub email_storage_url: Option<String>,
    pub attachments_storage_urls: serde_json::Value,
    pub policy_pdf_url: Option<String>,
    pub audit_json_url: Option<String>,
    pub kb_version: String,
    pub trace_id: Uuid,
    pub latency_ms: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A persisted traveller row, one-to-many with `cases`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TravellerRow {
    pub id: Uuid,
    pub case_id: Uuid,
    pub full_name: String,
    pub passport_number: String,
    pub date_of_birth: Option<NaiveDate>,
    pub age_at_travel: Option<i32>,
    pub is_senior: bool,
    pub mrz_data: Option<serde_json::Value>,
}
