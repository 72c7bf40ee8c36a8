pub mod catalog;
pub mod discount;
pub mod table;

use std::fs;
use std::path::Path;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::property::PropertySizeBucket;
use crate::domain::selection::Selection;
use crate::domain::service::ServiceDefinition;

use self::{
    catalog::{CatalogDocument, CatalogError, ServiceCatalog, DEFAULT_CATALOG},
    discount::{AppliedBundle, DiscountBreakdown, DiscountSchedule, DiscountTier, TierProgress},
    table::PricingTable,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTrace {
    pub currency: String,
    pub steps: Vec<PricingTraceStep>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingResult {
    pub subtotal: Decimal,
    pub volume_tier: Option<DiscountTier>,
    pub bundle: Option<AppliedBundle>,
    pub discount_percent: Decimal,
    pub discount_total: Decimal,
    pub total: Decimal,
    pub next_tier: Option<TierProgress>,
    pub trace: PricingTrace,
}

/// Renders an amount with exactly two decimals, e.g. `150.00`.
pub fn format_money(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

/// Catalog, size-based price table and discount schedule, validated together
/// and read-only once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceBook {
    catalog: ServiceCatalog,
    table: PricingTable,
    discounts: DiscountSchedule,
    currency: String,
}

impl PriceBook {
    pub fn new(catalog: ServiceCatalog, table: PricingTable, discounts: DiscountSchedule) -> Self {
        Self { catalog, table, discounts, currency: "USD".to_owned() }
    }

    /// The catalog compiled into the crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml_str(DEFAULT_CATALOG)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path).map_err(|error| CatalogError::Read {
            path: path.display().to_string(),
            message: error.to_string(),
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, CatalogError> {
        let document = CatalogDocument::parse(raw)?;
        let rows = document.pricing_rows()?;
        let catalog = ServiceCatalog::new(document.services)?;
        let table = PricingTable::new(&catalog, rows)?;
        let discounts = DiscountSchedule::new(&catalog, document.discount_tiers, document.bundles)?;
        Ok(Self::new(catalog, table, discounts))
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    pub fn table(&self) -> &PricingTable {
        &self.table
    }

    pub fn discounts(&self) -> &DiscountSchedule {
        &self.discounts
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Table price when a size is chosen, otherwise the catalog default.
    pub fn unit_price(
        &self,
        bucket: Option<PropertySizeBucket>,
        service: &ServiceDefinition,
    ) -> Decimal {
        match bucket {
            Some(bucket) => self.table.price_of(bucket, service),
            None => service.default_price,
        }
    }

    pub fn price(&self, selection: &Selection) -> PricingResult {
        let subtotal = selection.subtotal();
        let DiscountBreakdown {
            volume_tier,
            bundle,
            discount_percent,
            discount_total,
            total,
            next_tier,
        } = self.discounts.evaluate(subtotal, &selection.service_ids());

        let mut steps = vec![PricingTraceStep {
            stage: "subtotal".to_owned(),
            detail: format!("sum(unit_price * quantity) over {} services", selection.len()),
            amount: subtotal,
        }];
        if let Some(tier) = &volume_tier {
            steps.push(PricingTraceStep {
                stage: "volume_discount".to_owned(),
                detail: format!("{}% for subtotal >= {}", tier.percentage, tier.threshold),
                amount: -(subtotal * tier.percentage / Decimal::ONE_HUNDRED),
            });
        }
        if let Some(bundle) = &bundle {
            steps.push(PricingTraceStep {
                stage: "bundle_discount".to_owned(),
                detail: format!("{}% for bundle `{}`", bundle.percentage, bundle.name),
                amount: -(subtotal * bundle.percentage / Decimal::ONE_HUNDRED),
            });
        }
        if discount_percent > Decimal::ONE_HUNDRED {
            steps.push(PricingTraceStep {
                stage: "clamp".to_owned(),
                detail: format!("combined {discount_percent}% exceeds 100%, total floored at 0"),
                amount: Decimal::ZERO,
            });
        }
        steps.push(PricingTraceStep {
            stage: "total".to_owned(),
            detail: "rounded to cents".to_owned(),
            amount: total,
        });

        PricingResult {
            subtotal,
            volume_tier,
            bundle,
            discount_percent,
            discount_total,
            total,
            next_tier,
            trace: PricingTrace { currency: self.currency.clone(), steps },
        }
    }
}
