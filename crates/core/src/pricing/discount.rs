//! Volume and bundle discounts.
//!
//! Both discounts are percentages of the pre-discount subtotal and add up:
//! `total = subtotal * (1 - (volume_pct + bundle_pct) / 100)`, clamped at zero
//! and rounded to cents. Only one bundle ever applies: the first declared
//! bundle whose required services are all selected.

use std::collections::BTreeSet;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::service::ServiceId;
use crate::pricing::catalog::{CatalogError, ServiceCatalog};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountTier {
    pub threshold: Decimal,
    pub percentage: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub name: String,
    pub services: BTreeSet<ServiceId>,
    pub percentage: Decimal,
    #[serde(default)]
    pub description: String,
}

impl Bundle {
    pub fn applies_to(&self, selected: &BTreeSet<ServiceId>) -> bool {
        self.services.is_subset(selected)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedBundle {
    pub name: String,
    pub percentage: Decimal,
}

/// Next volume tier above the current subtotal and how far away it is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierProgress {
    pub tier: DiscountTier,
    pub gap: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountBreakdown {
    pub volume_tier: Option<DiscountTier>,
    pub bundle: Option<AppliedBundle>,
    pub discount_percent: Decimal,
    pub discount_total: Decimal,
    pub total: Decimal,
    pub next_tier: Option<TierProgress>,
}

/// Highest tier whose threshold the subtotal reaches. Order of `tiers` does
/// not matter.
pub fn best_tier(tiers: &[DiscountTier], subtotal: Decimal) -> Option<&DiscountTier> {
    tiers.iter().filter(|tier| tier.threshold <= subtotal).max_by_key(|tier| tier.threshold)
}

pub fn next_tier(tiers: &[DiscountTier], subtotal: Decimal) -> Option<TierProgress> {
    tiers
        .iter()
        .filter(|tier| tier.threshold > subtotal)
        .min_by_key(|tier| tier.threshold)
        .map(|tier| TierProgress { tier: tier.clone(), gap: tier.threshold - subtotal })
}

pub fn matching_bundle<'a>(
    bundles: &'a [Bundle],
    selected: &BTreeSet<ServiceId>,
) -> Option<&'a Bundle> {
    bundles.iter().find(|bundle| bundle.applies_to(selected))
}

pub fn discounted_total(subtotal: Decimal, volume_pct: Decimal, bundle_pct: Decimal) -> Decimal {
    let hundred = Decimal::ONE_HUNDRED;
    let remaining = (hundred - volume_pct - bundle_pct).max(Decimal::ZERO);
    let total = (subtotal * remaining / hundred).max(Decimal::ZERO);
    total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Validated tier and bundle configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiscountSchedule {
    tiers: Vec<DiscountTier>,
    bundles: Vec<Bundle>,
}

impl DiscountSchedule {
    pub fn new(
        catalog: &ServiceCatalog,
        mut tiers: Vec<DiscountTier>,
        bundles: Vec<Bundle>,
    ) -> Result<Self, CatalogError> {
        tiers.sort_by_key(|tier| tier.threshold);

        for (index, tier) in tiers.iter().enumerate() {
            if tier.threshold < Decimal::ZERO {
                return Err(CatalogError::InvalidTier {
                    threshold: tier.threshold,
                    reason: "threshold must not be negative".to_owned(),
                });
            }
            if !is_percentage(tier.percentage) {
                return Err(CatalogError::InvalidTier {
                    threshold: tier.threshold,
                    reason: format!("percentage {} is outside 0..=100", tier.percentage),
                });
            }
            if index > 0 && tiers[index - 1].threshold == tier.threshold {
                return Err(CatalogError::InvalidTier {
                    threshold: tier.threshold,
                    reason: "threshold is declared twice".to_owned(),
                });
            }
        }

        for bundle in &bundles {
            if bundle.services.is_empty() {
                return Err(CatalogError::InvalidBundle {
                    name: bundle.name.clone(),
                    reason: "bundle must require at least one service".to_owned(),
                });
            }
            if !is_percentage(bundle.percentage) {
                return Err(CatalogError::InvalidBundle {
                    name: bundle.name.clone(),
                    reason: format!("percentage {} is outside 0..=100", bundle.percentage),
                });
            }
            if let Some(unknown) = bundle.services.iter().find(|id| !catalog.contains(id)) {
                return Err(CatalogError::UnknownService {
                    context: format!("bundle `{}`", bundle.name),
                    service_id: unknown.clone(),
                });
            }
        }

        Ok(Self { tiers, bundles })
    }

    pub fn tiers(&self) -> &[DiscountTier] {
        &self.tiers
    }

    pub fn bundles(&self) -> &[Bundle] {
        &self.bundles
    }

    pub fn evaluate(&self, subtotal: Decimal, selected: &BTreeSet<ServiceId>) -> DiscountBreakdown {
        let volume_tier = best_tier(&self.tiers, subtotal).cloned();
        let bundle = matching_bundle(&self.bundles, selected)
            .map(|bundle| AppliedBundle { name: bundle.name.clone(), percentage: bundle.percentage });

        let volume_pct = volume_tier.as_ref().map_or(Decimal::ZERO, |tier| tier.percentage);
        let bundle_pct = bundle.as_ref().map_or(Decimal::ZERO, |bundle| bundle.percentage);
        let total = discounted_total(subtotal, volume_pct, bundle_pct);

        DiscountBreakdown {
            volume_tier,
            bundle,
            discount_percent: volume_pct + bundle_pct,
            discount_total: subtotal - total,
            total,
            next_tier: next_tier(&self.tiers, subtotal),
        }
    }
}

fn is_percentage(value: Decimal) -> bool {
    value >= Decimal::ZERO && value <= Decimal::ONE_HUNDRED
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;
    use rust_decimal::Decimal;

    use super::{
        best_tier, discounted_total, matching_bundle, next_tier, Bundle, DiscountSchedule,
        DiscountTier,
    };
    use crate::domain::service::{ServiceDefinition, ServiceId};
    use crate::pricing::catalog::{CatalogError, ServiceCatalog};

    fn tier(threshold: i64, percentage: i64) -> DiscountTier {
        DiscountTier { threshold: Decimal::new(threshold, 0), percentage: Decimal::new(percentage, 0) }
    }

    fn bundle(name: &str, services: &[&str], percentage: i64) -> Bundle {
        Bundle {
            name: name.to_owned(),
            services: services.iter().map(|id| ServiceId::new(*id)).collect(),
            percentage: Decimal::new(percentage, 0),
            description: String::new(),
        }
    }

    fn ids(values: &[&str]) -> BTreeSet<ServiceId> {
        values.iter().map(|id| ServiceId::new(*id)).collect()
    }

    fn catalog() -> ServiceCatalog {
        ServiceCatalog::new(
            ["hdr_photos", "drone", "floor_plan"]
                .into_iter()
                .map(|id| ServiceDefinition {
                    id: ServiceId::new(id),
                    name: id.to_owned(),
                    default_price: Decimal::new(100, 0),
                })
                .collect(),
        )
        .expect("valid catalog")
    }

    #[test]
    fn best_tier_picks_highest_reached_threshold_not_first_match() {
        let tiers = vec![tier(1000, 5), tier(2000, 10), tier(3000, 15), tier(4000, 20)];

        assert_eq!(best_tier(&tiers, Decimal::new(999, 0)), None);
        assert_eq!(best_tier(&tiers, Decimal::new(1000, 0)), Some(&tier(1000, 5)));
        assert_eq!(best_tier(&tiers, Decimal::new(3500, 0)), Some(&tier(3000, 15)));
        assert_eq!(best_tier(&tiers, Decimal::new(9000, 0)), Some(&tier(4000, 20)));
    }

    #[test]
    fn next_tier_reports_gap_to_smallest_unreached_threshold() {
        let tiers = vec![tier(200, 2), tier(500, 5)];

        let progress = next_tier(&tiers, Decimal::new(250, 0)).expect("500 still ahead");
        assert_eq!(progress.tier, tier(500, 5));
        assert_eq!(progress.gap, Decimal::new(250, 0));
        assert_eq!(next_tier(&tiers, Decimal::new(500, 0)), None);
    }

    #[test]
    fn first_declared_bundle_wins_and_percentages_never_stack() {
        let bundles = vec![
            bundle("Aerial", &["hdr_photos", "drone"], 10),
            bundle("Everything", &["hdr_photos", "drone", "floor_plan"], 25),
        ];
        let selected = ids(&["hdr_photos", "drone", "floor_plan"]);

        let applied = matching_bundle(&bundles, &selected).expect("both bundles match");
        assert_eq!(applied.name, "Aerial");

        let schedule =
            DiscountSchedule::new(&catalog(), Vec::new(), bundles).expect("valid schedule");
        let breakdown = schedule.evaluate(Decimal::new(400, 0), &selected);
        assert_eq!(breakdown.discount_percent, Decimal::new(10, 0));
        assert_eq!(breakdown.total, Decimal::new(360, 0));
    }

    #[test]
    fn bundle_requires_every_listed_service() {
        let bundles = vec![bundle("Aerial", &["hdr_photos", "drone"], 10)];
        assert!(matching_bundle(&bundles, &ids(&["hdr_photos"])).is_none());
        assert!(matching_bundle(&bundles, &ids(&[])).is_none());
    }

    #[test]
    fn volume_and_bundle_combine_additively() {
        let schedule = DiscountSchedule::new(
            &catalog(),
            vec![tier(200, 2), tier(500, 5)],
            vec![bundle("Aerial", &["hdr_photos", "drone"], 10)],
        )
        .expect("valid schedule");

        let breakdown = schedule.evaluate(Decimal::new(600, 0), &ids(&["hdr_photos", "drone"]));
        assert_eq!(breakdown.volume_tier, Some(tier(500, 5)));
        assert_eq!(breakdown.discount_percent, Decimal::new(15, 0));
        assert_eq!(breakdown.total, Decimal::new(510, 0));
        assert_eq!(breakdown.discount_total, Decimal::new(90, 0));
    }

    #[test]
    fn totals_round_to_cents() {
        assert_eq!(
            discounted_total(Decimal::new(3333, 2), Decimal::new(5, 0), Decimal::ZERO),
            Decimal::new(3166, 2)
        );
        // 10.50 * 0.95 = 9.975 rounds half away from zero
        assert_eq!(
            discounted_total(Decimal::new(1050, 2), Decimal::new(5, 0), Decimal::ZERO),
            Decimal::new(998, 2)
        );
    }

    #[test]
    fn schedule_rejects_out_of_range_and_duplicate_definitions() {
        let error = DiscountSchedule::new(&catalog(), vec![tier(100, 101)], Vec::new())
            .expect_err("percentage over 100");
        assert!(matches!(error, CatalogError::InvalidTier { .. }));

        let error = DiscountSchedule::new(&catalog(), vec![tier(100, 5), tier(100, 7)], Vec::new())
            .expect_err("duplicate threshold");
        assert!(matches!(error, CatalogError::InvalidTier { .. }));

        let error =
            DiscountSchedule::new(&catalog(), Vec::new(), vec![bundle("Ghost", &["ghost"], 5)])
                .expect_err("unknown service");
        assert!(matches!(error, CatalogError::UnknownService { .. }));

        let error = DiscountSchedule::new(&catalog(), Vec::new(), vec![bundle("Empty", &[], 5)])
            .expect_err("empty bundle");
        assert!(matches!(error, CatalogError::InvalidBundle { .. }));
    }

    #[test]
    fn schedule_sorts_tiers_ascending() {
        let schedule =
            DiscountSchedule::new(&catalog(), vec![tier(2000, 10), tier(1000, 5)], Vec::new())
                .expect("valid schedule");
        assert_eq!(schedule.tiers(), &[tier(1000, 5), tier(2000, 10)]);
    }

    #[test]
    fn maximal_percentages_clamp_total_at_zero() {
        let schedule = DiscountSchedule::new(
            &catalog(),
            vec![tier(0, 100)],
            vec![bundle("Free", &["drone"], 100)],
        )
        .expect("each percentage is individually valid");

        let breakdown = schedule.evaluate(Decimal::new(250, 0), &ids(&["drone"]));
        assert_eq!(breakdown.total, Decimal::ZERO);
        assert_eq!(breakdown.discount_total, Decimal::new(250, 0));
    }

    proptest! {
        #[test]
        fn applied_tier_is_the_best_reachable_one(
            thresholds in proptest::collection::btree_set(0i64..10_000, 1..8),
            subtotal_cents in 0i64..1_500_000,
        ) {
            let tiers: Vec<_> = thresholds.iter().map(|threshold| tier(*threshold, 5)).collect();
            let subtotal = Decimal::new(subtotal_cents, 2);

            match best_tier(&tiers, subtotal) {
                Some(applied) => {
                    prop_assert!(applied.threshold <= subtotal);
                    prop_assert!(tiers
                        .iter()
                        .filter(|tier| tier.threshold <= subtotal)
                        .all(|tier| tier.threshold <= applied.threshold));
                }
                None => prop_assert!(tiers.iter().all(|tier| tier.threshold > subtotal)),
            }
        }

        #[test]
        fn discounted_total_is_never_negative(
            subtotal_cents in 0i64..10_000_000,
            volume in 0i64..1_000,
            bundle in 0i64..1_000,
        ) {
            let total = discounted_total(
                Decimal::new(subtotal_cents, 2),
                Decimal::new(volume, 0),
                Decimal::new(bundle, 0),
            );
            prop_assert!(total >= Decimal::ZERO);
            prop_assert!(total <= Decimal::new(subtotal_cents, 2));
        }
    }
}
