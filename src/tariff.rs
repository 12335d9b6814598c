//! Immutable tariff table and pricing rules, loaded once at startup from a
//! CSV file and a YAML file respectively (spec.md §4.4). Neither is ever
//! mutated after `load`; both are handed to handlers behind an `Arc`.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TariffKey {
    pub scope: String,
    pub plan: String,
    pub band_min: i32,
    pub band_max: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TariffRow {
    pub scope: String,
    pub plan: String,
    pub band_min: i32,
    pub band_max: i32,
    pub premium_usd: Decimal,
    pub currency: String,
    pub coverage_limit: i32,
}

#[derive(Debug, Clone)]
pub struct Tariff {
    rows: HashMap<TariffKey, TariffRow>,
}

impl Tariff {
    pub fn from_rows(rows: Vec<TariffRow>) -> Self {
        let mut map = HashMap::with_capacity(rows.len());
        for row in rows {
            let key = TariffKey {
                scope: row.scope.clone(),
                plan: row.plan.clone(),
                band_min: row.band_min,
                band_max: row.band_max,
            };
            map.insert(key, row);
        }
        Tariff { rows: map }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut rows = Vec::new();
        for record in reader.deserialize() {
            let row: TariffRow = record?;
            rows.push(row);
        }
        Ok(Self::from_rows(rows))
    }

    pub fn lookup(&self, key: &TariffKey) -> Option<&TariffRow> {
        self.rows.get(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgeLoad {
    pub senior_age_min: i32,
    pub senior_age_max: i32,
    pub senior_multiplier: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SportsLoad {
    pub multiplier: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupDiscountTier {
    pub min_travellers: i32,
    #[serde(default)]
    pub max_travellers: Option<i32>,
    pub discount_rate: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Fees {
    #[serde(default)]
    pub issue_fee_usd: Decimal,
    #[serde(default)]
    pub payment_fee_usd: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rules {
    pub age_load: AgeLoad,
    pub sports_load: SportsLoad,
    pub group_discount_tiers: Vec<GroupDiscountTier>,
    #[serde(default)]
    pub default_tax_rate: Decimal,
    pub fees: Fees,
    #[serde(default = "default_rounding_rule")]
    pub rounding_rule: u32,
    pub kb_version: String,
}

fn default_rounding_rule() -> u32 {
    2
}

impl Rules {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let rules: Rules = serde_yaml::from_str(&raw)?;
        Ok(rules)
    }

    /// First matching tier wins; an unbounded tier (`max_travellers: None`)
    /// matches any `n` at or above its minimum. Unmatched falls back to 0.
    pub fn group_discount_rate(&self, num_travellers: usize) -> Decimal {
        let n = num_travellers as i32;
        for tier in &self.group_discount_tiers {
            match tier.max_travellers {
                Some(max) if n >= tier.min_travellers && n <= max => return tier.discount_rate,
                None if n >= tier.min_travellers => return tier.discount_rate,
                _ => continue,
            }
        }
        Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn sample_rules() -> Rules {
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
    fn group_discount_tier_boundaries() {
        let rules = sample_rules();
        assert_eq!(rules.group_discount_rate(1), d("0"));
        assert_eq!(rules.group_discount_rate(4), d("0"));
        assert_eq!(rules.group_discount_rate(5), d("0.025"));
        assert_eq!(rules.group_discount_rate(10), d("0.025"));
        assert_eq!(rules.group_discount_rate(11), d("0.05"));
        assert_eq!(rules.group_discount_rate(1000), d("0.05"));
    }

    #[test]
    fn tariff_lookup_misses_return_none() {
        let tariff = Tariff::from_rows(vec![]);
        let key = TariffKey {
            scope: "WORLDWIDE".to_string(),
            plan: "Silver".to_string(),
            band_min: 1,
            band_max: 7,
        };
        assert!(tariff.lookup(&key).is_none());
    }

    #[test]
    fn tariff_lookup_hits_exact_key() {
        let row = TariffRow {
            scope: "WORLDWIDE".to_string(),
            plan: "Silver".to_string(),
            band_min: 1,
            band_max: 7,
            premium_usd: d("30.00"),
            currency: "USD".to_string(),
            coverage_limit: 50_000,
        };
        let tariff = Tariff::from_rows(vec![row]);
        let key = TariffKey {
            scope: "WORLDWIDE".to_string(),
            plan: "Silver".to_string(),
            band_min: 1,
            band_max: 7,
        };
        let found = tariff.lookup(&key).expect("row should be present");
        assert_eq!(found.premium_usd, d("30.00"));
        assert_eq!(found.coverage_limit, 50_000);
    }
}
