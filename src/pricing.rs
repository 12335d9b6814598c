//! Banded tariff lookup, per-traveller loads, group discount tiering, tax/fees
//! and rounding (spec.md §6 / §4.5). Grounded on
//! `original_source/travel_rpa/apps/pricing/engine.py`; all arithmetic runs on
//! `rust_decimal::Decimal` — binary floating point never touches a premium.

use crate::tariff::{Rules, Tariff, TariffKey};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("invalid trip length: {0} days (must be 1-92)")]
    InvalidDays(i32),
    #[error("no tariff for scope={scope} plan={plan} days={days}")]
    NoTariff {
        scope: String,
        plan: String,
        days: i32,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct TravellerBreakdown {
    pub base: Decimal,
    pub age_load: Decimal,
    pub sports_load: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PricingResult {
    pub base_per_traveller: Decimal,
    pub traveller_breakdown: Vec<TravellerBreakdown>,
    pub subtotal: Decimal,
    pub group_discount: Decimal,
    pub group_discount_rate: Decimal,
    pub net: Decimal,
    pub tax: Decimal,
    pub tax_rate: Decimal,
    pub fees: Decimal,
    pub total: Decimal,
    pub currency: String,
}

pub struct TravellerInput {
    pub age_at_travel: i32,
}

/// Inclusive day bands, half-open in spec language but closed in practice:
/// 1-7, 8-15, 16-31, 32-45, 46-92.
fn day_band(days: i32) -> Option<(i32, i32)> {
    match days {
        1..=7 => Some((1, 7)),
        8..=15 => Some((8, 15)),
        16..=31 => Some((16, 31)),
        32..=45 => Some((32, 45)),
        46..=92 => Some((46, 92)),
        _ => None,
    }
}

pub fn calculate_premium(
    tariff: &Tariff,
    rules: &Rules,
    scope: &str,
    plan: &str,
    days: i32,
    travellers: &[TravellerInput],
    sports_flag: bool,
) -> Result<PricingResult, PricingError> {
    let (band_min, band_max) = day_band(days).ok_or(PricingError::InvalidDays(days))?;

    let key = TariffKey {
        scope: scope.to_string(),
        plan: plan.to_string(),
        band_min,
        band_max,
    };
    let row = tariff.lookup(&key).ok_or_else(|| PricingError::NoTariff {
        scope: scope.to_string(),
        plan: plan.to_string(),
        days,
    })?;

    let base_premium = row.premium_usd;

    let mut traveller_breakdown = Vec::with_capacity(travellers.len());
    let mut subtotal = Decimal::ZERO;
    for traveller in travellers {
        let base_i = base_premium;
        let is_senior = traveller.age_at_travel >= rules.age_load.senior_age_min
            && traveller.age_at_travel <= rules.age_load.senior_age_max;
        let age_load_i = if is_senior {
            base_i * rules.age_load.senior_multiplier
        } else {
            Decimal::ZERO
        };
        let sports_load_i = if sports_flag {
            (base_i + age_load_i) * rules.sports_load.multiplier
        } else {
            Decimal::ZERO
        };
        let total = base_i + age_load_i + sports_load_i;
        subtotal += total;
        traveller_breakdown.push(TravellerBreakdown {
            base: base_i,
            age_load: age_load_i,
            sports_load: sports_load_i,
            total,
        });
    }

    let group_discount_rate = rules.group_discount_rate(travellers.len());
    let group_discount = subtotal * group_discount_rate;
    let net = subtotal - group_discount;

    let tax_rate = rules.default_tax_rate;
    let tax = net * tax_rate;

    let fees = rules.fees.issue_fee_usd + rules.fees.payment_fee_usd;

    let gross = net + tax + fees;
    let total = gross.round_dp_with_strategy(
        rules.rounding_rule,
        RoundingStrategy::MidpointNearestEven,
    );

    Ok(PricingResult {
        base_per_traveller: base_premium,
        traveller_breakdown,
        subtotal,
        group_discount,
        group_discount_rate,
        net,
        tax,
        tax_rate,
        fees,
        total,
        currency: row.currency.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tariff::{AgeLoad, Fees, GroupDiscountTier, Rules, SportsLoad, Tariff, TariffRow};
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn test_tariff() -> Tariff {
        let scopes = ["WORLDWIDE", "WW_EXCL_US_CA", "INBOUND"];
        let plans = [
            ("Silver", d("1.0")),
            ("Gold", d("1.8")),
            ("Gold Plus", d("2.6")),
            ("Platinum", d("3.6")),
        ];
        let scope_mult = [
            ("WORLDWIDE", d("1")),
            ("WW_EXCL_US_CA", d("0.8333333333")),
            ("INBOUND", d("0.6")),
        ];
        let bands = [
            (1, 7, d("30.00")),
            (8, 15, d("55.00")),
            (16, 31, d("95.00")),
            (32, 45, d("130.00")),
            (46, 92, d("220.00")),
        ];
        let mut rows = Vec::new();
        for scope in scopes {
            let sm = scope_mult.iter().find(|(s, _)| *s == scope).unwrap().1;
            for (plan, pm) in plans {
                for (min, max, base) in bands {
                    let premium = (base * sm * pm).round_dp(2);
                    rows.push(TariffRow {
                        scope: scope.to_string(),
                        plan: plan.to_string(),
                        band_min: min,
                        band_max: max,
                        premium_usd: premium,
                        currency: "USD".to_string(),
                        coverage_limit: 100_000,
                    });
                }
            }
        }
        Tariff::from_rows(rows)
    }

    fn test_rules() -> Rules {
        Rules {
            age_load: AgeLoad {
                senior_age_min: 76,
                senior_age_max: 86,
                senior_multiplier: d("0.75"),
            },
            sports_load: SportsLoad {
                multiplier: d("0.50"),
            },
            group_discount_tiers: vec![
                GroupDiscountTier {
                    min_travellers: 1,
                    max_travellers: Some(4),
                    discount_rate: d("0"),
                },
                GroupDiscountTier {
                    min_travellers: 5,
                    max_travellers: Some(10),
                    discount_rate: d("0.025"),
                },
                GroupDiscountTier {
                    min_travellers: 11,
                    max_travellers: None,
                    discount_rate: d("0.05"),
                },
            ],
            default_tax_rate: Decimal::ZERO,
            fees: Fees {
                issue_fee_usd: Decimal::ZERO,
                payment_fee_usd: Decimal::ZERO,
            },
            rounding_rule: 2,
            kb_version: "v1.0".to_string(),
        }
    }

    #[test]
    fn scenario_1_silver_worldwide_single_traveller() {
        let tariff = test_tariff();
        let rules = test_rules();
        let travellers = vec![TravellerInput { age_at_travel: 30 }];
        let result =
            calculate_premium(&tariff, &rules, "WORLDWIDE", "Silver", 7, &travellers, false)
                .unwrap();
        assert_eq!(result.base_per_traveller, d("30.00"));
        assert_eq!(result.subtotal, d("30.00"));
        assert_eq!(result.group_discount, d("0.00"));
        assert_eq!(result.net, d("30.00"));
        assert_eq!(result.tax, d("0.00"));
        assert_eq!(result.fees, d("0.00"));
        assert_eq!(result.total, d("30.00"));
    }

    #[test]
    fn scenario_4_group_discount_tier_ge11() {
        let tariff = test_tariff();
        let rules = test_rules();
        let travellers: Vec<_> = (0..15).map(|_| TravellerInput { age_at_travel: 30 }).collect();
        let result =
            calculate_premium(&tariff, &rules, "WORLDWIDE", "Silver", 7, &travellers, false)
                .unwrap();
        assert_eq!(result.subtotal, d("450.00"));
        assert_eq!(result.group_discount, d("22.50"));
        assert_eq!(result.total, d("427.50"));
    }

    #[test]
    fn invalid_days_rejected() {
        let tariff = test_tariff();
        let rules = test_rules();
        let travellers = vec![TravellerInput { age_at_travel: 30 }];
        let err =
            calculate_premium(&tariff, &rules, "WORLDWIDE", "Silver", 93, &travellers, false)
                .unwrap_err();
        assert_eq!(err, PricingError::InvalidDays(93));
    }

    #[test]
    fn unknown_scope_plan_combo_fails() {
        let tariff = Tariff::from_rows(vec![]);
        let rules = test_rules();
        let travellers = vec![TravellerInput { age_at_travel: 30 }];
        let err =
            calculate_premium(&tariff, &rules, "WORLDWIDE", "Silver", 7, &travellers, false)
                .unwrap_err();
        assert!(matches!(err, PricingError::NoTariff { .. }));
    }

    #[test]
    fn senior_age_load_applies_within_band() {
        let tariff = test_tariff();
        let rules = test_rules();
        let travellers = vec![TravellerInput { age_at_travel: 80 }];
        let result =
            calculate_premium(&tariff, &rules, "WORLDWIDE", "Silver", 7, &travellers, false)
                .unwrap();
        assert_eq!(result.traveller_breakdown[0].age_load, d("22.50"));
        assert_eq!(result.total, d("52.50"));
    }

    #[test]
    fn sports_load_compounds_on_age_load() {
        let tariff = test_tariff();
        let rules = test_rules();
        let travellers = vec![TravellerInput { age_at_travel: 80 }];
        let result =
            calculate_premium(&tariff, &rules, "WORLDWIDE", "Silver", 7, &travellers, true)
                .unwrap();
        // base 30 + age_load 22.50 = 52.50, sports_load = 52.50 * 0.5 = 26.25
        assert_eq!(result.traveller_breakdown[0].sports_load, d("26.25"));
        assert_eq!(result.total, d("78.75"));
    }

    #[test]
    fn group_discount_identity_matches_p2() {
        let tariff = test_tariff();
        let rules = test_rules();
        let travellers: Vec<_> = (0..6).map(|_| TravellerInput { age_at_travel: 40 }).collect();
        let result =
            calculate_premium(&tariff, &rules, "WORLDWIDE", "Silver", 7, &travellers, false)
                .unwrap();
        let expected_total = ((result.subtotal - result.group_discount)
            * (Decimal::ONE + result.tax_rate)
            + result.fees)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
        assert_eq!(result.total, expected_total);
    }
}
