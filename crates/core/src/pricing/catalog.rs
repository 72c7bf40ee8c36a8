use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::property::PropertySizeBucket;
use crate::domain::service::{ServiceDefinition, ServiceId};
use crate::pricing::discount::{Bundle, DiscountTier};

pub(crate) const DEFAULT_CATALOG: &str = include_str!("../../catalog/default.toml");

/// Largest unit price a catalog may carry. Together with
/// [`MAX_QUANTITY`](crate::domain::selection::MAX_QUANTITY) it keeps every
/// subtotal and discount product far inside `Decimal` range.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Data-definition failures. These are raised while a catalog is being built,
/// never while a price is being looked up.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog must define at least one service")]
    EmptyCatalog,
    #[error("service id `{0}` is defined more than once")]
    DuplicateService(ServiceId),
    #[error("service `{0}` has an empty id or name")]
    BlankService(ServiceId),
    #[error("service `{0}` has a negative default price")]
    NegativeDefaultPrice(ServiceId),
    #[error("unknown property size `{0}` in pricing table")]
    UnknownBucket(String),
    #[error("pricing table has no row for property size `{0}`")]
    MissingRow(PropertySizeBucket),
    #[error("pricing table has no price for `{service_id}` at size `{bucket}`")]
    MissingPrice { bucket: PropertySizeBucket, service_id: ServiceId },
    #[error("pricing table has a negative price for `{service_id}` at size `{bucket}`: {price}")]
    NegativePrice { bucket: PropertySizeBucket, service_id: ServiceId, price: Decimal },
    #[error("price {price} for `{service_id}` in {context} exceeds the maximum of {max}", max = MAX_UNIT_PRICE)]
    PriceOutOfRange { context: String, service_id: ServiceId, price: Decimal },
    #[error("`{context}` references unknown service `{service_id}`")]
    UnknownService { context: String, service_id: ServiceId },
    #[error("discount tier at threshold {threshold} is invalid: {reason}")]
    InvalidTier { threshold: Decimal, reason: String },
    #[error("bundle `{name}` is invalid: {reason}")]
    InvalidBundle { name: String, reason: String },
    #[error("could not read catalog `{path}`: {message}")]
    Read { path: String, message: String },
    #[error("could not parse catalog: {0}")]
    Parse(String),
}

/// Read-only list of purchasable services, fixed once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceCatalog {
    services: Vec<ServiceDefinition>,
}

impl ServiceCatalog {
    pub fn new(services: Vec<ServiceDefinition>) -> Result<Self, CatalogError> {
        if services.is_empty() {
            return Err(CatalogError::EmptyCatalog);
        }

        let mut seen = HashSet::new();
        for service in &services {
            if service.id.as_str().trim().is_empty() || service.name.trim().is_empty() {
                return Err(CatalogError::BlankService(service.id.clone()));
            }
            if !seen.insert(service.id.clone()) {
                return Err(CatalogError::DuplicateService(service.id.clone()));
            }
            if service.default_price < Decimal::ZERO {
                return Err(CatalogError::NegativeDefaultPrice(service.id.clone()));
            }
            if service.default_price > MAX_UNIT_PRICE {
                return Err(CatalogError::PriceOutOfRange {
                    context: "services".to_owned(),
                    service_id: service.id.clone(),
                    price: service.default_price,
                });
            }
        }

        Ok(Self { services })
    }

    pub fn find(&self, service_id: &ServiceId) -> Option<&ServiceDefinition> {
        self.services.iter().find(|service| &service.id == service_id)
    }

    /// Matches a display name case-insensitively, for callers that key by name.
    pub fn find_by_name(&self, name: &str) -> Option<&ServiceDefinition> {
        let name = name.trim();
        self.services.iter().find(|service| service.name.eq_ignore_ascii_case(name))
    }

    /// Resolves either an id or a display name.
    pub fn resolve(&self, key: &str) -> Option<&ServiceDefinition> {
        self.find(&ServiceId::new(key.trim())).or_else(|| self.find_by_name(key))
    }

    pub fn contains(&self, service_id: &ServiceId) -> bool {
        self.find(service_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceDefinition> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CatalogDocument {
    pub services: Vec<ServiceDefinition>,
    #[serde(default)]
    pub pricing: BTreeMap<String, BTreeMap<ServiceId, Decimal>>,
    #[serde(default)]
    pub discount_tiers: Vec<DiscountTier>,
    #[serde(default)]
    pub bundles: Vec<Bundle>,
}

impl CatalogDocument {
    pub fn parse(raw: &str) -> Result<Self, CatalogError> {
        toml::from_str(raw).map_err(|error| CatalogError::Parse(error.to_string()))
    }

    pub fn pricing_rows(
        &self,
    ) -> Result<BTreeMap<PropertySizeBucket, BTreeMap<ServiceId, Decimal>>, CatalogError> {
        self.pricing
            .iter()
            .map(|(raw_bucket, row)| {
                let bucket = raw_bucket
                    .parse::<PropertySizeBucket>()
                    .map_err(|_| CatalogError::UnknownBucket(raw_bucket.clone()))?;
                Ok((bucket, row.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{CatalogDocument, CatalogError, ServiceCatalog, DEFAULT_CATALOG};
    use crate::domain::service::{ServiceDefinition, ServiceId};

    fn service(id: &str, name: &str, price: i64) -> ServiceDefinition {
        ServiceDefinition {
            id: ServiceId::new(id),
            name: name.to_owned(),
            default_price: Decimal::new(price, 0),
        }
    }

    #[test]
    fn rejects_duplicate_and_negative_definitions() {
        let duplicate = ServiceCatalog::new(vec![
            service("drone", "Drone", 100),
            service("drone", "Drone Video", 120),
        ]);
        assert_eq!(duplicate, Err(CatalogError::DuplicateService(ServiceId::new("drone"))));

        let negative = ServiceCatalog::new(vec![service("drone", "Drone", -1)]);
        assert_eq!(negative, Err(CatalogError::NegativeDefaultPrice(ServiceId::new("drone"))));

        let oversized = ServiceCatalog::new(vec![service("drone", "Drone", 1_000_001)]);
        assert!(matches!(
            oversized,
            Err(CatalogError::PriceOutOfRange { ref context, .. }) if context == "services"
        ));

        assert_eq!(ServiceCatalog::new(Vec::new()), Err(CatalogError::EmptyCatalog));
    }

    #[test]
    fn resolves_by_id_or_display_name() {
        let catalog = ServiceCatalog::new(vec![
            service("hdr_photos", "HDR Photos", 150),
            service("drone", "Drone", 100),
        ])
        .expect("valid catalog");

        assert_eq!(catalog.resolve("drone").map(|s| s.name.as_str()), Some("Drone"));
        assert_eq!(catalog.resolve("hdr photos").map(|s| s.id.as_str()), Some("hdr_photos"));
        assert!(catalog.resolve("twilight").is_none());
    }

    #[test]
    fn builtin_document_parses_every_bucket() {
        let document = CatalogDocument::parse(DEFAULT_CATALOG).expect("embedded catalog parses");
        let rows = document.pricing_rows().expect("bucket keys are valid");

        assert_eq!(rows.len(), 5);
        assert_eq!(document.services.len(), 7);
        assert_eq!(document.discount_tiers.len(), 4);
    }

    #[test]
    fn unknown_bucket_key_is_a_definition_error() {
        let document = CatalogDocument::parse(
            r#"
[[services]]
id = "drone"
name = "Drone"
default_price = 100

[pricing."5000+"]
drone = 175
"#,
        )
        .expect("syntactically valid");

        assert_eq!(document.pricing_rows(), Err(CatalogError::UnknownBucket("5000+".to_owned())));
    }
}
