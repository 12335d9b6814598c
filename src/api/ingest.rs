//! `POST /ingest` (spec.md §4.1) — the nine-step intake contract: idempotency,
//! intent gate, persist, MRZ parse, completeness check, age derivation, price.

use crate::extract;
use crate::issuance;
use crate::models::{CaseRow, Direction};
use crate::mrz;
use crate::pricing::{self, TravellerInput};
use crate::store::{CaseStore, NewCase, NewTraveller, PricingUpdate};
use crate::AppState;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::{http::StatusCode, Json};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub message_id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ocr_results: Vec<String>,
}

pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestRequest>,
) -> Response {
    let start = Instant::now();
    let idempotency_key = compute_idempotency_key(&req.message_id, &req.body);

    match state.db.find_by_idempotency_key(&idempotency_key).await {
        Ok(Some(existing)) => return duplicate_response(&existing, &idempotency_key),
        Ok(None) => {}
        Err(e) => return crate::errors::AppError::Database(e).into_response(),
    }

    let extracted = extract::extract(&req.body);
    if !extracted.intent_ok {
        return Json(json!({ "route": "ignore", "intent_ok": false })).into_response();
    }

    let thread_id = req.thread_id.clone().unwrap_or_else(|| req.message_id.clone());
    let received_at = req.received_at.unwrap_or_else(Utc::now).naive_utc();

    let new_case = NewCase {
        message_id: req.message_id.clone(),
        thread_id: thread_id.clone(),
        idempotency_key: idempotency_key.clone(),
        from_email: req.from.clone(),
        subject: req.subject.clone(),
        body: req.body.clone(),
        received_at,
        direction: extracted.direction.map(|d| d.as_str().to_string()),
        scope: extracted.scope.map(|s| s.as_str().to_string()),
        plan: extracted.plan.map(|p| p.as_str().to_string()),
        coverage_limit: extracted.coverage_limit.map(|c| c as i32),
        days: extracted.days,
        start_date: extracted.start_date,
        end_date: extracted.end_date,
        sports_coverage: extracted.sports_coverage,
        intent_ok: true,
        kb_version: state.rules.kb_version.clone(),
        trace_id: Uuid::new_v4(),
    };

    let mut tx = match state.db.begin().await {
        Ok(tx) => tx,
        Err(e) => return crate::errors::AppError::Database(e).into_response(),
    };

    let case = match CaseStore::insert_case(&mut tx, &new_case).await {
        Ok(Some(case)) => case,
        Ok(None) => {
            // Lost the idempotency race; the winner's row is already committed.
            drop(tx);
            return match state.db.find_by_idempotency_key(&idempotency_key).await {
                Ok(Some(existing)) => duplicate_response(&existing, &idempotency_key),
                Ok(None) => crate::errors::AppError::Internal(anyhow::anyhow!(
                    "idempotency race lost but winner row not found"
                ))
                .into_response(),
                Err(e) => crate::errors::AppError::Database(e).into_response(),
            };
        }
        Err(e) => return crate::errors::AppError::Database(e).into_response(),
    };

    let mut travellers = Vec::new();
    for ocr_text in &req.ocr_results {
        if let Some(record) = mrz::parse(ocr_text) {
            let mrz_json = serde_json::to_value(&record).unwrap_or_default();
            let new_traveller = NewTraveller {
                case_id: case.case_id,
                full_name: record.full_name.clone(),
                passport_number: record.passport_number.clone(),
                date_of_birth: record.date_of_birth,
                mrz_data: mrz_json,
            };
            match CaseStore::insert_traveller(&mut tx, &new_traveller).await {
                Ok(row) => travellers.push((row, record)),
                Err(e) => return crate::errors::AppError::Database(e).into_response(),
            }
        }
    }

    let is_inbound = extracted.direction == Some(Direction::Inbound);
    let mut missing = Vec::new();
    let required: &[&str] = if is_inbound {
        &["direction", "plan", "days", "start_date"]
    } else {
        &["direction", "scope", "plan", "days", "start_date"]
    };
    for name in required {
        let present = match *name {
            "direction" => extracted.direction.is_some(),
            "scope" => extracted.scope.is_some(),
            "plan" => extracted.plan.is_some(),
            "days" => extracted.days.is_some(),
            "start_date" => extracted.start_date.is_some(),
            _ => true,
        };
        if !present {
            missing.push(name.to_string());
        }
    }
    if travellers.is_empty() {
        missing.push("passport_numbers".to_string());
        missing.push("traveller_names".to_string());
    }

    if !missing.is_empty() {
        let latency_ms = start.elapsed().as_millis() as i32;
        if let Err(e) = CaseStore::mark_missing(&mut tx, case.case_id, &missing, latency_ms).await
        {
            return crate::errors::AppError::Database(e).into_response();
        }
        if let Err(e) = tx.commit().await {
            return crate::errors::AppError::Database(e).into_response();
        }
        return Json(json!({
            "route": "missing",
            "case_id": case.case_id,
            "to": req.from,
            "missing": missing,
            "original_subject": req.subject,
            "thread_id": thread_id,
        }))
        .into_response();
    }

    let mut traveller_inputs = Vec::with_capacity(travellers.len());
    let mut senior_flags = Vec::with_capacity(travellers.len());
    for (row, _) in &travellers {
        let age_at_travel = match (row.date_of_birth, case.start_date) {
            (Some(dob), Some(start_date)) => Some(age_in_years(dob, start_date)),
            _ => None,
        };
        let is_senior = age_at_travel.map(|a| (76..=86).contains(&a)).unwrap_or(false);
        if let Some(age) = age_at_travel {
            if let Err(e) =
                CaseStore::update_traveller_age(&mut tx, row.id, age, is_senior).await
            {
                return crate::errors::AppError::Database(e).into_response();
            }
        }
        senior_flags.push((age_at_travel, is_senior));
        traveller_inputs.push(TravellerInput {
            age_at_travel: age_at_travel.unwrap_or(0),
        });
    }

    let scope = case.scope.clone().unwrap_or_default();
    let plan = case.plan.clone().unwrap_or_default();
    let days = case.days.unwrap_or(0);

    let pricing_result = pricing::calculate_premium(
        &state.tariff,
        &state.rules,
        &scope,
        &plan,
        days,
        &traveller_inputs,
        case.sports_coverage,
    );

    let latency_ms = start.elapsed().as_millis() as i32;

    match pricing_result {
        Ok(priced) => {
            let update = PricingUpdate {
                premium_base: priced.base_per_traveller,
                premium_subtotal: priced.subtotal,
                premium_group_discount: priced.group_discount,
                premium_net: priced.net,
                premium_tax: priced.tax,
                premium_fees: priced.fees,
                premium_total: priced.total,
                currency: priced.currency.clone(),
            };
            if let Err(e) = CaseStore::mark_success(&mut tx, case.case_id, &update, latency_ms).await
            {
                return crate::errors::AppError::Database(e).into_response();
            }
            if let Err(e) = tx.commit().await {
                return crate::errors::AppError::Database(e).into_response();
            }

            let traveller_json: Vec<_> = travellers
                .iter()
                .zip(senior_flags.iter())
                .map(|((row, _), (age, is_senior))| {
                    json!({
                        "name": row.full_name,
                        "passport": row.passport_number,
                        "age": age,
                        "is_senior": is_senior,
                    })
                })
                .collect();

            Json(json!({
                "route": "success",
                "case_id": case.case_id,
                "extracted": extracted_json(&case),
                "pricing": {
                    "base_per_traveller": format_money(priced.base_per_traveller),
                    "subtotal": format_money(priced.subtotal),
                    "group_discount": format_money(priced.group_discount),
                    "net": format_money(priced.net),
                    "tax": format_money(priced.tax),
                    "fees": format_money(priced.fees),
                    "total": format_money(priced.total),
                    "currency": priced.currency,
                },
                "travellers": traveller_json,
            }))
            .into_response()
        }
        Err(err) => {
            let missing_fields = vec!["pricing_error".to_string()];
            if let Err(e) =
                CaseStore::mark_missing(&mut tx, case.case_id, &missing_fields, latency_ms).await
            {
                return crate::errors::AppError::Database(e).into_response();
            }
            if let Err(e) = tx.commit().await {
                return crate::errors::AppError::Database(e).into_response();
            }
            (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "route": "missing",
                    "case_id": case.case_id,
                    "error": err.to_string(),
                })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SimulateIssuanceRequest {
    pub case_id: Uuid,
}

pub async fn simulate_issuance(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SimulateIssuanceRequest>,
) -> Response {
    let case = match state.db.get_case(req.case_id).await {
        Ok(Some(case)) => case,
        Ok(None) => return crate::errors::AppError::CaseNotFound.into_response(),
        Err(e) => return crate::errors::AppError::Database(e).into_response(),
    };

    match issuance::simulate(&state.config.screenshot_dir, case.case_id, Utc::now()) {
        Ok(result) => Json(json!({
            "screenshot_url": result.screenshot_path.to_string_lossy(),
            "policy_number": result.policy_number,
            "simulation_timestamp": result.timestamp.to_rfc3339(),
        }))
        .into_response(),
        Err(e) => crate::errors::AppError::Internal(anyhow::anyhow!(e)).into_response(),
    }
}

fn compute_idempotency_key(message_id: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(message_id.as_bytes());
    hasher.update(b"|");
    hasher.update(body.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// `(start_date - dob).days // 365`, preserved verbatim from the original
/// implementation including its leap-year off-by-one near birthdays.
fn age_in_years(dob: NaiveDate, start_date: NaiveDate) -> i32 {
    let days = (start_date - dob).num_days();
    (days / 365) as i32
}

fn format_money(d: rust_decimal::Decimal) -> String {
    format!("{:.2}", d)
}

fn duplicate_response(existing: &CaseRow, idempotency_key: &str) -> Response {
    Json(json!({
        "status": "duplicate",
        "case_id": existing.case_id,
        "idempotency_key": idempotency_key,
    }))
    .into_response()
}

fn extracted_json(case: &CaseRow) -> serde_json::Value {
    json!({
        "direction": case.direction,
        "scope": case.scope,
        "plan": case.plan,
        "coverage_limit": case.coverage_limit,
        "days": case.days,
        "start_date": case.start_date,
        "end_date": case.end_date,
        "sports_coverage": case.sports_coverage,
        "intent_ok": case.intent_ok,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_is_stable_for_same_inputs() {
        let a = compute_idempotency_key("msg-1", "hello world");
        let b = compute_idempotency_key("msg-1", "hello world");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn idempotency_key_differs_on_whitespace_change() {
        let a = compute_idempotency_key("msg-1", "hello world");
        let b = compute_idempotency_key("msg-1", "hello  world");
        assert_ne!(a, b);
    }

    #[test]
    fn age_in_years_matches_floor_division_not_calendar_years() {
        let dob = NaiveDate::from_ymd_opt(1990, 6, 15).unwrap();
        let start = NaiveDate::from_ymd_opt(2026, 6, 10).unwrap();
        // Five days short of the 36th birthday: floor((days)/365) still gives 35.
        assert_eq!(age_in_years(dob, start), 35);
    }

    #[test]
    fn format_money_always_two_decimals() {
        use std::str::FromStr;
        assert_eq!(format_money(rust_decimal::Decimal::from_str("30").unwrap()), "30.00");
        assert_eq!(format_money(rust_decimal::Decimal::from_str("30.5").unwrap()), "30.50");
    }
}
