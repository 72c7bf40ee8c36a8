pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod gateway;
pub mod pricing;
pub mod session;

pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, PayloadEncoding};
pub use domain::order::{Address, AddressField, FormField, OccupancyStatus, OrderFormData};
pub use domain::property::PropertySizeBucket;
pub use domain::selection::{SelectedService, Selection};
pub use domain::service::{ServiceDefinition, ServiceId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use gateway::{
    GatewayError, InMemorySubmissionGateway, PayloadLine, SubmissionAck, SubmissionGateway,
    SubmissionPayload,
};
pub use pricing::catalog::{CatalogError, ServiceCatalog};
pub use pricing::discount::{Bundle, DiscountSchedule, DiscountTier};
pub use pricing::{format_money, PriceBook, PricingResult};
pub use session::{
    BookingIntent, IgnoredReason, IntentOutcome, OrderSession, SessionSettings, SessionSnapshot,
    SubmissionReceipt, SubmissionStatus, SubmitOutcome,
};
