use std::sync::Arc;

use serde::Serialize;
use shutterbook_core::config::{AppConfig, LoadOptions};
use shutterbook_core::domain::property::PropertySizeBucket;
use shutterbook_core::pricing::{format_money, PricingResult};
use shutterbook_core::session::{OrderSession, SnapshotLine};

use crate::commands::{config_failure, load_price_book, parse_service_spec, CommandResult};

#[derive(Debug, Clone, Default)]
pub struct QuoteArgs {
    pub size: Option<String>,
    pub services: Vec<String>,
}

#[derive(Debug, Serialize)]
struct QuoteReport {
    property_size: Option<PropertySizeBucket>,
    lines: Vec<SnapshotLine>,
    pricing: PricingResult,
    next_tier_hint: Option<String>,
}

/// Prices a selection without collecting an address.
pub fn run(args: QuoteArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return config_failure("quote", error),
    };
    let book = match load_price_book(&config) {
        Ok(book) => Arc::new(book),
        Err(error) => return CommandResult::failure("quote", "catalog", error.to_string(), 4),
    };

    let mut session = OrderSession::new(Arc::clone(&book), config.session_settings());
    if let Some(raw_size) = &args.size {
        match raw_size.parse::<PropertySizeBucket>() {
            Ok(bucket) => {
                session.select_size(bucket);
            }
            Err(error) => return CommandResult::failure("quote", "invalid_input", error.to_string(), 4),
        }
    }

    for spec in &args.services {
        let (service_id, quantity) = match parse_service_spec(&book, spec) {
            Ok(parsed) => parsed,
            Err(message) => return CommandResult::failure("quote", "invalid_input", message, 4),
        };
        if session.selection().contains(&service_id) {
            return CommandResult::failure(
                "quote",
                "invalid_input",
                format!("service `{service_id}` listed more than once"),
                4,
            );
        }
        if let Err(error) = session.toggle_service(&service_id, quantity) {
            return CommandResult::failure("quote", "invalid_input", error.to_string(), 4);
        }
    }

    let snapshot = session.snapshot();
    let next_tier_hint = snapshot.pricing.next_tier.as_ref().map(|progress| {
        format!(
            "add ${} more to reach {}% off",
            format_money(progress.gap),
            progress.tier.percentage
        )
    });
    let message = format!(
        "total {} {} ({} services, {}% off)",
        format_money(snapshot.pricing.total),
        book.currency(),
        snapshot.lines.len(),
        snapshot.pricing.discount_percent
    );

    CommandResult::success_with_data(
        "quote",
        message,
        QuoteReport {
            property_size: snapshot.property_size,
            lines: snapshot.lines,
            pricing: snapshot.pricing,
            next_tier_hint,
        },
    )
}
