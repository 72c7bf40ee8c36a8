use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use shutterbook_core::config::{AppConfig, LoadOptions};
use shutterbook_core::domain::order::{AddressField, FormField, OccupancyStatus};
use shutterbook_core::domain::property::PropertySizeBucket;
use shutterbook_core::errors::ApplicationError;
use shutterbook_core::gateway::{InMemorySubmissionGateway, SubmissionGateway};
use shutterbook_core::pricing::{format_money, PriceBook};
use shutterbook_core::session::{OrderSession, SubmitOutcome};
use shutterbook_gateway::HttpSubmissionGateway;
use uuid::Uuid;

use crate::commands::{config_failure, load_price_book, parse_service_spec, CommandResult};

#[derive(Debug, Clone, Default)]
pub struct BookArgs {
    pub size: Option<String>,
    pub services: Vec<String>,
    pub street: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub date: Option<String>,
    pub occupancy: Option<String>,
    pub notes: Option<String>,
    pub dry_run: bool,
}

pub fn run(args: BookArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return config_failure("book", error),
    };
    let book = match load_price_book(&config) {
        Ok(book) => Arc::new(book),
        Err(error) => return CommandResult::failure("book", "catalog", error.to_string(), 4),
    };

    let correlation_id = format!("cli-{}", Uuid::new_v4());
    let mut session = OrderSession::new(Arc::clone(&book), config.session_settings())
        .with_correlation_id(correlation_id.clone());
    if let Err(message) = fill_session(&mut session, &book, &args) {
        return CommandResult::failure("book", "invalid_input", message, 4);
    }

    let gateway: Box<dyn SubmissionGateway> = if args.dry_run {
        Box::new(InMemorySubmissionGateway::default())
    } else {
        match HttpSubmissionGateway::from_config(&config.gateway) {
            Ok(gateway) => Box::new(gateway),
            Err(error) => {
                return CommandResult::failure(
                    "book",
                    "gateway_config",
                    format!("{error}; set gateway.endpoint or pass --dry-run"),
                    2,
                );
            }
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "book",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    match runtime.block_on(session.submit(gateway.as_ref())) {
        SubmitOutcome::Submitted(receipt) => CommandResult::success_with_data(
            "book",
            format!(
                "booking {} accepted, total {} {}",
                receipt.reference,
                format_money(receipt.total),
                book.currency()
            ),
            json!({
                "dry_run": args.dry_run,
                "correlation_id": correlation_id,
                "receipt": receipt,
            }),
        ),
        SubmitOutcome::Invalid(errors) => CommandResult::failure_with_data(
            "book",
            "validation",
            errors.join("; "),
            5,
            Some(json!({ "validation_errors": errors })),
        ),
        SubmitOutcome::Failed { notice, error } => {
            let interface = ApplicationError::from(error).into_interface(correlation_id.clone());
            CommandResult::failure_with_data(
                "book",
                "gateway",
                notice,
                6,
                Some(json!({ "correlation_id": correlation_id, "cause": interface.to_string() })),
            )
        }
        SubmitOutcome::Ignored(reason) => CommandResult::failure(
            "book",
            "ignored",
            format!("submission ignored: {reason:?}"),
            1,
        ),
    }
}

fn fill_session(
    session: &mut OrderSession,
    book: &PriceBook,
    args: &BookArgs,
) -> Result<(), String> {
    if let Some(raw_size) = &args.size {
        let bucket = raw_size.parse::<PropertySizeBucket>().map_err(|error| error.to_string())?;
        session.select_size(bucket);
    }

    for spec in &args.services {
        let (service_id, quantity) = parse_service_spec(book, spec)?;
        if session.selection().contains(&service_id) {
            return Err(format!("service `{service_id}` listed more than once"));
        }
        session.toggle_service(&service_id, quantity).map_err(|error| error.to_string())?;
    }

    let address = [
        (AddressField::Street, &args.street),
        (AddressField::Street2, &args.street2),
        (AddressField::City, &args.city),
        (AddressField::State, &args.state),
        (AddressField::ZipCode, &args.zip_code),
    ];
    for (field, value) in address {
        if let Some(value) = value {
            session.change_address_field(field, value.clone());
        }
    }

    if let Some(raw_date) = &args.date {
        let date = NaiveDate::parse_from_str(raw_date.trim(), "%Y-%m-%d")
            .map_err(|_| format!("invalid date `{raw_date}` (expected YYYY-MM-DD)"))?;
        session.change_form_field(FormField::PreferredDate(Some(date)));
    }
    if let Some(raw_occupancy) = &args.occupancy {
        let status = raw_occupancy.parse::<OccupancyStatus>().map_err(|error| error.to_string())?;
        session.change_form_field(FormField::OccupancyStatus(status));
    }
    if let Some(notes) = &args.notes {
        session.change_form_field(FormField::Notes(notes.clone()));
    }

    Ok(())
}
