//! Company mutation service.
//!
//! # Responsibility
//! - Validate caller input, delegate persistence, publish mutation events.
//! - Classify every failure into the four service error kinds.
//!
//! # Invariants
//! - `NotFound`, `Conflict` and `Validation` pass through unchanged.
//! - Any other repository failure is logged here and surfaced only as
//!   `Internal`.
//! - Events are published only after the repository reports success, and a
//!   publishing failure never changes the result of the mutation.

use crate::context::RequestContext;
use crate::events::{EventsWriter, MutationEvent, MutationKind};
use crate::model::company::{Company, CompanyId, ValidationError};
use crate::model::patch::{CompanyPatch, FIELD_NAME};
use crate::repo::company_repo::{CompanyRepository, RepoError};
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Error returned across the service boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompanyServiceError {
    /// Caller input broke a field rule or carried the wrong type.
    Validation(ValidationError),
    NotFound(CompanyId),
    /// The name is already used by another company.
    Conflict(String),
    /// Opaque failure; details are only in the server log.
    Internal,
}

impl Display for CompanyServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "validation error: {err}"),
            Self::NotFound(id) => write!(f, "company with id \"{id}\" does not exist"),
            Self::Conflict(name) => write!(f, "company with the name \"{name}\" already exists"),
            Self::Internal => write!(f, "internal server error"),
        }
    }
}

impl Error for CompanyServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for CompanyServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

pub type ServiceResult<T> = Result<T, CompanyServiceError>;

/// Use-case service for company mutations.
///
/// Holds no per-request state; one instance can serve concurrent callers.
pub struct CompanyService<R: CompanyRepository, W: EventsWriter> {
    app_name: String,
    repo: R,
    events: W,
}

impl<R: CompanyRepository, W: EventsWriter> CompanyService<R, W> {
    /// `app_name` becomes the producer label of every emitted event.
    pub fn new(app_name: impl Into<String>, repo: R, events: W) -> Self {
        Self {
            app_name: app_name.into(),
            repo,
            events,
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Gets one company by id.
    pub fn get(&self, ctx: &RequestContext, id: CompanyId) -> ServiceResult<Company> {
        self.repo
            .get_company(ctx, id)
            .map_err(|err| classify("get", id, err))
    }

    /// Validates and persists a new company, then emits `CompanyCreated`.
    ///
    /// # Contract
    /// - Any caller-supplied id is replaced by a freshly generated one.
    /// - Returns the assigned id; `company.id` holds it as well.
    pub fn create(&self, ctx: &RequestContext, company: &mut Company) -> ServiceResult<CompanyId> {
        if let Err(err) = company.validate() {
            debug!(
                "event=company_create module=service status=rejected violations={}",
                err.violations().len()
            );
            return Err(err.into());
        }

        let id = company.set_id();
        self.repo
            .create_company(ctx, company)
            .map_err(|err| classify("create", id, err))?;
        info!("event=company_create module=service status=ok company_id={id}");

        self.notify(ctx, MutationKind::Created, id, &*company);
        Ok(id)
    }

    /// Decodes a dynamic field map and applies it as a partial update.
    ///
    /// Unrecognized keys are dropped; no repository call is made when any
    /// recognized key fails decoding or validation.
    pub fn update_fields(
        &self,
        ctx: &RequestContext,
        id: CompanyId,
        fields: Map<String, Value>,
    ) -> ServiceResult<()> {
        let received = fields.len();
        let patch = CompanyPatch::decode(fields).map_err(|err| {
            debug!(
                "event=company_update module=service status=rejected company_id={id} violations={}",
                err.violations().len()
            );
            CompanyServiceError::from(err)
        })?;

        if patch.len() < received {
            debug!(
                "event=company_update module=service status=filtered company_id={id} dropped_keys={}",
                received - patch.len()
            );
        }

        self.update(ctx, id, &patch)
    }

    /// Applies a validated partial update, then emits `CompanyUpdated`.
    ///
    /// The event payload is the normalized patch plus `id`.
    pub fn update(
        &self,
        ctx: &RequestContext,
        id: CompanyId,
        patch: &CompanyPatch,
    ) -> ServiceResult<()> {
        self.repo
            .update_company(ctx, id, patch)
            .map_err(|err| classify("update", id, err))?;
        info!(
            "event=company_update module=service status=ok company_id={id} fields={} name_changed={}",
            patch.len(),
            patch.name().is_some()
        );

        let mut payload = patch.to_json_map();
        payload.insert("id".to_string(), Value::String(id.to_string()));
        self.notify(ctx, MutationKind::Updated, id, &payload);
        Ok(())
    }

    /// Deletes a company, then emits `CompanyDeleted` carrying only its id.
    pub fn delete(&self, ctx: &RequestContext, id: CompanyId) -> ServiceResult<()> {
        self.repo
            .delete_company(ctx, id)
            .map_err(|err| classify("delete", id, err))?;
        info!("event=company_delete module=service status=ok company_id={id}");

        self.notify(ctx, MutationKind::Deleted, id, &json!({ "id": id.to_string() }));
        Ok(())
    }

    /// Publishes one event; failures are logged and swallowed.
    fn notify<T: Serialize + ?Sized>(
        &self,
        ctx: &RequestContext,
        kind: MutationKind,
        id: CompanyId,
        data: &T,
    ) {
        let result = MutationEvent::new(kind, &self.app_name, data)
            .and_then(|event| self.events.write(ctx, std::slice::from_ref(&event)));

        if let Err(err) = result {
            warn!(
                "event=company_notify module=service status=error kind={} company_id={id} error={err}",
                kind.event_name()
            );
        }
    }
}

/// Passes domain errors through; logs and hides everything else.
fn classify(operation: &str, id: CompanyId, err: RepoError) -> CompanyServiceError {
    match err {
        RepoError::NotFound(missing) => CompanyServiceError::NotFound(missing),
        RepoError::Conflict { column, value } if column == FIELD_NAME => {
            CompanyServiceError::Conflict(value)
        }
        RepoError::Validation(err) => CompanyServiceError::Validation(err),
        other => {
            error!(
                "event=company_{operation} module=service status=error company_id={id} error={other}"
            );
            CompanyServiceError::Internal
        }
    }
}
