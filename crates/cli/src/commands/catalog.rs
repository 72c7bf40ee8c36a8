use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use shutterbook_core::config::{AppConfig, LoadOptions};
use shutterbook_core::domain::property::PropertySizeBucket;
use shutterbook_core::pricing::discount::{Bundle, DiscountTier};

use crate::commands::{config_failure, load_price_book, CommandResult};

#[derive(Debug, Serialize)]
struct CatalogListing {
    currency: String,
    services: Vec<ServiceListing>,
    discount_tiers: Vec<DiscountTier>,
    bundles: Vec<Bundle>,
}

#[derive(Debug, Serialize)]
struct ServiceListing {
    id: String,
    name: String,
    default_price: Decimal,
    prices: BTreeMap<&'static str, Decimal>,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return config_failure("catalog", error),
    };

    let book = match load_price_book(&config) {
        Ok(book) => book,
        Err(error) => return CommandResult::failure("catalog", "catalog", error.to_string(), 4),
    };

    let services = book
        .catalog()
        .iter()
        .map(|service| ServiceListing {
            id: service.id.to_string(),
            name: service.name.clone(),
            default_price: service.default_price,
            prices: PropertySizeBucket::ALL
                .into_iter()
                .map(|bucket| (bucket.as_str(), book.table().price_of(bucket, service)))
                .collect(),
        })
        .collect::<Vec<_>>();

    let listing = CatalogListing {
        currency: book.currency().to_string(),
        discount_tiers: book.discounts().tiers().to_vec(),
        bundles: book.discounts().bundles().to_vec(),
        services,
    };

    CommandResult::success_with_data(
        "catalog",
        format!(
            "{} services, {} discount tiers, {} bundles",
            listing.services.len(),
            listing.discount_tiers.len(),
            listing.bundles.len()
        ),
        listing,
    )
}
