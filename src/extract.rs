//! Regex-driven extraction of policy parameters from a free-text email body
//! (spec.md §4.3). Deliberately shallow: it is known to over-match (e.g. the
//! bare word "insurance" satisfies the intent gate) and under-match non-English
//! text. That behavior is intentional and must not be "improved" — see
//! spec.md §9.

use crate::models::{Direction, ExtractedFields, Plan, Scope};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static INTENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)travel\s+insurance|insurance|polic(y|ies)|cover(age)?|issue|arrange|provide|insure|quote",
    )
    .unwrap()
});

static INBOUND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\binbound\b").unwrap());
static OUTBOUND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\boutbound\b").unwrap());

static SCOPE_WW_EXCL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)worldwide\s+excluding|world\s+except|excl\.?\s*us/usa/canada|excluding\s+us/usa/canada|excluding\s+country\s+of\s+residence",
    )
    .unwrap()
});
static SCOPE_WORLDWIDE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)worldwide").unwrap());
static SCOPE_EUROPE_FALLBACK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)europe|greece").unwrap());

static PLATINUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bplatinum\b").unwrap());
static GOLD_PLUS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)gold\s+plus").unwrap());
static GOLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bgold\b").unwrap());
static SILVER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bsilver\b").unwrap());

static COVERAGE_LIMIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$?(\d+),?(\d+)").unwrap());

static DAYS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+)\s+days?").unwrap());
static WEEKS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+)\s+weeks?").unwrap());
static MONTHS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+)\s+months?").unwrap());

static ISO_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap());
static DMY_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2})[/-](\d{1,2})[/-](\d{4})").unwrap());
static YMD_SLASH_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})[/-](\d{1,2})[/-](\d{1,2})").unwrap());

static SPORTS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)sports?\s+coverage|sports?\s+activit\w*|motorcycle").unwrap());

/// Extract everything the field extractor can find from a lower-cased body.
/// Never raises; absence of a field simply yields `None`.
pub fn extract(body: &str) -> ExtractedFields {
    let lower = body.to_lowercase();

    let intent_ok = INTENT_RE.is_match(&lower);

    let (direction, mut scope) = extract_direction_and_scope(&lower);
    if direction != Some(Direction::Inbound) {
        scope = extract_outbound_scope(&lower);
    }

    let mut plan = extract_plan(&lower);
    let coverage_limit = extract_coverage_limit(body);
    if plan.is_none() {
        if let Some(limit) = coverage_limit {
            plan = plan_from_coverage_limit(limit);
        }
    }

    let days = extract_days(&lower);
    let (start_date, end_date) = extract_dates(body);
    let sports_coverage = SPORTS_RE.is_match(&lower);

    ExtractedFields {
        intent_ok,
        direction,
        scope,
        plan,
        coverage_limit,
        days,
        start_date,
        end_date,
        sports_coverage,
    }
}

fn extract_direction_and_scope(lower: &str) -> (Option<Direction>, Option<Scope>) {
    if INBOUND_RE.is_match(lower) {
        return (Some(Direction::Inbound), Some(Scope::Inbound));
    }
    if OUTBOUND_RE.is_match(lower) {
        return (Some(Direction::Outbound), None);
    }
    (None, None)
}

fn extract_outbound_scope(lower: &str) -> Option<Scope> {
    if SCOPE_WW_EXCL_RE.is_match(lower) {
        Some(Scope::WwExclUsCa)
    } else if SCOPE_WORLDWIDE_RE.is_match(lower) {
        Some(Scope::Worldwide)
    } else if SCOPE_EUROPE_FALLBACK_RE.is_match(lower) {
        Some(Scope::WwExclUsCa)
    } else {
        None
    }
}

fn extract_plan(lower: &str) -> Option<Plan> {
    if PLATINUM_RE.is_match(lower) {
        Some(Plan::Platinum)
    } else if GOLD_PLUS_RE.is_match(lower) {
        Some(Plan::GoldPlus)
    } else if GOLD_RE.is_match(lower) {
        Some(Plan::Gold)
    } else if SILVER_RE.is_match(lower) {
        Some(Plan::Silver)
    } else {
        None
    }
}

fn extract_coverage_limit(body: &str) -> Option<i64> {
    let caps = COVERAGE_LIMIT_RE.captures(body)?;
    let combined = format!("{}{}", &caps[1], &caps[2]);
    combined.parse::<i64>().ok()
}

fn plan_from_coverage_limit(limit: i64) -> Option<Plan> {
    match limit {
        50 | 50_000 => Some(Plan::Silver),
        100 | 100_000 => Some(Plan::Gold),
        300 | 300_000 => Some(Plan::GoldPlus),
        500 | 500_000 => Some(Plan::Platinum),
        _ => None,
    }
}

fn extract_days(lower: &str) -> Option<i32> {
    if let Some(caps) = DAYS_RE.captures(lower) {
        return caps[1].parse().ok();
    }
    if let Some(caps) = WEEKS_RE.captures(lower) {
        let weeks: i32 = caps[1].parse().ok()?;
        return Some(weeks * 7);
    }
    if let Some(caps) = MONTHS_RE.captures(lower) {
        let months: i32 = caps[1].parse().ok()?;
        return Some(months * 30);
    }
    None
}

fn extract_dates(body: &str) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let iso_matches: Vec<_> = ISO_DATE_RE.captures_iter(body).collect();
    if iso_matches.len() >= 2 {
        let start = build_date(&iso_matches[0][1], &iso_matches[0][2], &iso_matches[0][3]);
        let end = build_date(&iso_matches[1][1], &iso_matches[1][2], &iso_matches[1][3]);
        return (start, end);
    }

    let dmy_matches: Vec<_> = DMY_DATE_RE.captures_iter(body).collect();
    if dmy_matches.len() >= 2 {
        let start = build_date(&dmy_matches[0][3], &dmy_matches[0][2], &dmy_matches[0][1]);
        let end = build_date(&dmy_matches[1][3], &dmy_matches[1][2], &dmy_matches[1][1]);
        return (start, end);
    }

    let ymd_matches: Vec<_> = YMD_SLASH_DATE_RE.captures_iter(body).collect();
    if ymd_matches.len() >= 2 {
        let start = build_date(&ymd_matches[0][1], &ymd_matches[0][2], &ymd_matches[0][3]);
        let end = build_date(&ymd_matches[1][1], &ymd_matches[1][2], &ymd_matches[1][3]);
        return (start, end);
    }

    (None, None)
}

fn build_date(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_word_insurance_satisfies_intent() {
        let f = extract("please send me insurance for my trip");
        assert!(f.intent_ok);
    }

    #[test]
    fn unrelated_email_fails_intent() {
        let f = extract("hey, are we still on for lunch tomorrow?");
        assert!(!f.intent_ok);
    }

    #[test]
    fn inbound_sets_direction_and_scope() {
        let f = extract("we need inbound coverage for a visitor");
        assert_eq!(f.direction, Some(Direction::Inbound));
        assert_eq!(f.scope, Some(Scope::Inbound));
    }

    #[test]
    fn outbound_worldwide_scope() {
        let f = extract("outbound travel insurance, worldwide coverage");
        assert_eq!(f.direction, Some(Direction::Outbound));
        assert_eq!(f.scope, Some(Scope::Worldwide));
    }

    #[test]
    fn outbound_worldwide_excluding_us_canada() {
        let f = extract("outbound insurance, worldwide excluding US/Canada please");
        assert_eq!(f.scope, Some(Scope::WwExclUsCa));
    }

    #[test]
    fn europe_fallback_scope() {
        let f = extract("outbound insurance quote for our trip to greece");
        assert_eq!(f.scope, Some(Scope::WwExclUsCa));
    }

    #[test]
    fn plan_keyword_precedence() {
        assert_eq!(extract("gold plus policy please").plan, Some(Plan::GoldPlus));
        assert_eq!(extract("gold policy please").plan, Some(Plan::Gold));
        assert_eq!(extract("silver policy please").plan, Some(Plan::Silver));
        assert_eq!(extract("platinum policy please").plan, Some(Plan::Platinum));
    }

    #[test]
    fn plan_from_coverage_limit_when_no_keyword() {
        let f = extract("need a quote for $100,000 coverage limit");
        assert_eq!(f.plan, Some(Plan::Gold));
    }

    #[test]
    fn plan_from_short_form_coverage_limit() {
        let f = extract("need $300 insurance");
        assert_eq!(f.coverage_limit, Some(300));
        assert_eq!(f.plan, Some(Plan::GoldPlus));
    }

    #[test]
    fn days_weeks_months() {
        assert_eq!(extract("trip insurance for 10 days").days, Some(10));
        assert_eq!(extract("trip insurance for 2 weeks").days, Some(14));
        assert_eq!(extract("trip insurance for 1 month").days, Some(30));
    }

    #[test]
    fn iso_dates_in_order() {
        let f = extract("policy travel 2026-01-10 to 2026-01-20 please");
        assert_eq!(f.start_date, NaiveDate::from_ymd_opt(2026, 1, 10));
        assert_eq!(f.end_date, NaiveDate::from_ymd_opt(2026, 1, 20));
    }

    #[test]
    fn single_date_is_not_enough() {
        let f = extract("policy starting 2026-01-10, need insurance");
        assert_eq!(f.start_date, None);
        assert_eq!(f.end_date, None);
    }

    #[test]
    fn sports_coverage_detection() {
        assert!(extract("need sports coverage please, issue policy").sports_coverage);
        assert!(extract("will be riding a motorcycle, insurance please").sports_coverage);
        assert!(!extract("standard outbound insurance").sports_coverage);
    }

    #[test]
    fn missing_fields_are_null_not_panicking() {
        let f = extract("");
        assert!(!f.intent_ok);
        assert_eq!(f.direction, None);
        assert_eq!(f.plan, None);
        assert_eq!(f.days, None);
    }
}
