//! Relational persistence for cases and travellers (spec.md §3, §5). The
//! unique constraint on `idempotency_key` is the only cross-request
//! synchronization; concurrent ingests of the same key resolve to at most
//! one insert, with the loser re-reading the winner's row.

use crate::models::{CaseRow, TravellerRow};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CaseStore {
    pool: PgPool,
}

pub struct NewCase {
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
    pub intent_ok: bool,
    pub kb_version: String,
    pub trace_id: Uuid,
}

pub struct NewTraveller {
    pub case_id: Uuid,
    pub full_name: String,
    pub passport_number: String,
    pub date_of_birth: Option<NaiveDate>,
    pub mrz_data: serde_json::Value,
}

pub struct PricingUpdate {
    pub premium_base: Decimal,
    pub premium_subtotal: Decimal,
    pub premium_group_discount: Decimal,
    pub premium_net: Decimal,
    pub premium_tax: Decimal,
    pub premium_fees: Decimal,
    pub premium_total: Decimal,
    pub currency: String,
}

impl CaseStore {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(CaseStore { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<CaseRow>, sqlx::Error> {
        sqlx::query_as::<_, CaseRow>("SELECT * FROM cases WHERE idempotency_key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_case(&self, case_id: Uuid) -> Result<Option<CaseRow>, sqlx::Error> {
        sqlx::query_as::<_, CaseRow>("SELECT * FROM cases WHERE case_id = $1")
            .bind(case_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_travellers(&self, case_id: Uuid) -> Result<Vec<TravellerRow>, sqlx::Error> {
        sqlx::query_as::<_, TravellerRow>(
            "SELECT * FROM travellers WHERE case_id = $1 ORDER BY full_name",
        )
        .bind(case_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Inserts a new case. On a unique-violation against `idempotency_key`
    /// (a concurrent winner beat this request to it), returns `Ok(None)` so
    /// the caller can re-read the winner's row and respond with `duplicate`.
    pub async fn insert_case(
        tx: &mut Transaction<'_, Postgres>,
        new_case: &NewCase,
    ) -> Result<Option<CaseRow>, sqlx::Error> {
        let result = sqlx::query_as::<_, CaseRow>(
            r#"
            INSERT INTO cases (
                message_id, thread_id, idempotency_key, from_email, subject, body,
                received_at, direction, scope, plan, coverage_limit, days,
                start_date, end_date, sports_coverage, intent_ok, kb_version, trace_id
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18
            )
            RETURNING *
            "#,
        )
        .bind(&new_case.message_id)
        .bind(&new_case.thread_id)
        .bind(&new_case.idempotency_key)
        .bind(&new_case.from_email)
        .bind(&new_case.subject)
        .bind(&new_case.body)
        .bind(new_case.received_at)
        .bind(&new_case.direction)
        .bind(&new_case.scope)
        .bind(&new_case.plan)
        .bind(new_case.coverage_limit)
        .bind(new_case.days)
        .bind(new_case.start_date)
        .bind(new_case.end_date)
        .bind(new_case.sports_coverage)
        .bind(new_case.intent_ok)
        .bind(&new_case.kb_version)
        .bind(new_case.trace_id)
        .fetch_one(&mut **tx)
        .await;

        match result {
            Ok(row) => Ok(Some(row)),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn insert_traveller(
        tx: &mut Transaction<'_, Postgres>,
        traveller: &NewTraveller,
    ) -> Result<TravellerRow, sqlx::Error> {
        sqlx::query_as::<_, TravellerRow>(
            r#"
            INSERT INTO travellers (case_id, full_name, passport_number, date_of_birth, mrz_data)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(traveller.case_id)
        .bind(&traveller.full_name)
        .bind(&traveller.passport_number)
        .bind(traveller.date_of_birth)
        .bind(&traveller.mrz_data)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn update_traveller_age(
        tx: &mut Transaction<'_, Postgres>,
        traveller_id: Uuid,
        age_at_travel: i32,
        is_senior: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE travellers SET age_at_travel = $2, is_senior = $3 WHERE id = $1")
            .bind(traveller_id)
            .bind(age_at_travel)
            .bind(is_senior)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn mark_missing(
        tx: &mut Transaction<'_, Postgres>,
        case_id: Uuid,
        missing_fields: &[String],
        latency_ms: i32,
    ) -> Result<(), sqlx::Error> {
        let missing_json = serde_json::to_value(missing_fields).unwrap_or_default();
        sqlx::query(
            "UPDATE cases SET route = 'missing', missing_fields = $2, latency_ms = $3, \
             updated_at = now() WHERE case_id = $1",
        )
        .bind(case_id)
        .bind(missing_json)
        .bind(latency_ms)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn mark_success(
        tx: &mut Transaction<'_, Postgres>,
        case_id: Uuid,
        pricing: &PricingUpdate,
        latency_ms: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE cases SET
                route = 'success',
                missing_fields = '[]'::jsonb,
                premium_base = $2,
                premium_subtotal = $3,
                premium_group_discount = $4,
                premium_net = $5,
                premium_tax = $6,
                premium_fees = $7,
                premium_total = $8,
                currency = $9,
                latency_ms = $10,
                updated_at = now()
            WHERE case_id = $1
            "#,
        )
        .bind(case_id)
        .bind(pricing.premium_base)
        .bind(pricing.premium_subtotal)
        .bind(pricing.premium_group_discount)
        .bind(pricing.premium_net)
        .bind(pricing.premium_tax)
        .bind(pricing.premium_fees)
        .bind(pricing.premium_total)
        .bind(&pricing.currency)
        .bind(latency_ms)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
