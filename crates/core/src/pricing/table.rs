use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::domain::property::PropertySizeBucket;
use crate::domain::service::{ServiceDefinition, ServiceId};
use crate::pricing::catalog::{CatalogError, ServiceCatalog, MAX_UNIT_PRICE};

/// Unit prices by property size. Construction checks that every
/// `(bucket, service)` pair of the catalog is present and within
/// `0..=MAX_UNIT_PRICE`, so lookups for catalog services cannot miss.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricingTable {
    rows: BTreeMap<PropertySizeBucket, BTreeMap<ServiceId, Decimal>>,
}

impl PricingTable {
    pub fn new(
        catalog: &ServiceCatalog,
        rows: BTreeMap<PropertySizeBucket, BTreeMap<ServiceId, Decimal>>,
    ) -> Result<Self, CatalogError> {
        for bucket in PropertySizeBucket::ALL {
            let row = rows.get(&bucket).ok_or(CatalogError::MissingRow(bucket))?;

            for service_id in row.keys() {
                if !catalog.contains(service_id) {
                    return Err(CatalogError::UnknownService {
                        context: format!("pricing.\"{bucket}\""),
                        service_id: service_id.clone(),
                    });
                }
            }

            for service in catalog.iter() {
                let price = row.get(&service.id).copied().ok_or_else(|| {
                    CatalogError::MissingPrice { bucket, service_id: service.id.clone() }
                })?;
                if price < Decimal::ZERO {
                    return Err(CatalogError::NegativePrice {
                        bucket,
                        service_id: service.id.clone(),
                        price,
                    });
                }
                if price > MAX_UNIT_PRICE {
                    return Err(CatalogError::PriceOutOfRange {
                        context: format!("pricing.\"{bucket}\""),
                        service_id: service.id.clone(),
                        price,
                    });
                }
            }
        }

        Ok(Self { rows })
    }

    /// Price of `service` at `bucket`. Services outside the validated catalog
    /// fall back to their default price.
    pub fn price_of(&self, bucket: PropertySizeBucket, service: &ServiceDefinition) -> Decimal {
        self.rows
            .get(&bucket)
            .and_then(|row| row.get(&service.id))
            .copied()
            .unwrap_or(service.default_price)
    }

    pub fn row(&self, bucket: PropertySizeBucket) -> Option<&BTreeMap<ServiceId, Decimal>> {
        self.rows.get(&bucket)
    }
}
