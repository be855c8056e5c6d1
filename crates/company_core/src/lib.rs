//! Core domain logic for the company registry.
//! This crate is the single source of truth for company invariants.

pub mod config;
pub mod context;
pub mod db;
pub mod events;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{AppConfig, ConfigError};
pub use context::{ContextError, RequestContext};
pub use events::{
    ChannelEventsWriter, EventMessage, EventsError, EventsWriter, MutationEvent, MutationKind,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::company::{Company, CompanyId, FieldViolation, ValidationError, COMPANY_TYPES};
pub use model::patch::{CompanyField, CompanyPatch};
pub use repo::company_repo::{CompanyRepository, RepoError, RepoResult, SqliteCompanyRepository};
pub use service::company_service::{CompanyService, CompanyServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
