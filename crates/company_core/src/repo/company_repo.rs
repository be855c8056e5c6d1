//! Company repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide context-scoped get/create/update/delete over `companies`.
//! - Translate SQLite failures into domain-level repository errors.
//!
//! # Invariants
//! - Write paths never store a company that fails `Company::validate()`.
//! - Partial updates only touch columns present in the patch.
//! - `Conflict` is reported only for a UNIQUE failure on `companies.name`;
//!   every other constraint failure stays a storage error.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::context::{ContextError, RequestContext};
use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::company::{Company, CompanyId, ValidationError};
use crate::model::patch::{CompanyField, CompanyPatch};
use rusqlite::types::Value;
use rusqlite::{ffi, params, params_from_iter, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

const COMPANY_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    employee_cnt,
    registered,
    type
FROM companies";

const COMPANIES_TABLE: &str = "companies";
const NAME_COLUMN: &str = "name";
const UNIQUE_FAILURE_PREFIX: &str = "UNIQUE constraint failed: ";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for company persistence operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound(CompanyId),
    /// A uniqueness rule rejected `value` for `column`.
    Conflict { column: String, value: String },
    InvalidData(String),
    Cancelled(ContextError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "company not found: {id}"),
            Self::Conflict { column, value } => {
                write!(f, "company {column} `{value}` is already taken")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted company data: {message}"),
            Self::Cancelled(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Cancelled(err) => Some(err),
            Self::NotFound(_) | Self::Conflict { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ContextError> for RepoError {
    fn from(value: ContextError) -> Self {
        Self::Cancelled(value)
    }
}

/// Repository interface for company CRUD operations.
///
/// Implementations must be safe to share across worker threads.
pub trait CompanyRepository: Send + Sync {
    fn get_company(&self, ctx: &RequestContext, id: CompanyId) -> RepoResult<Company>;
    fn create_company(&self, ctx: &RequestContext, company: &Company) -> RepoResult<()>;
    /// Applies `patch` to the stored row; `NotFound` when no row matches.
    fn update_company(
        &self,
        ctx: &RequestContext,
        id: CompanyId,
        patch: &CompanyPatch,
    ) -> RepoResult<()>;
    fn delete_company(&self, ctx: &RequestContext, id: CompanyId) -> RepoResult<()>;
}

/// SQLite-backed company repository.
///
/// Owns one connection; statements from concurrent callers are serialized.
pub struct SqliteCompanyRepository {
    conn: Mutex<Connection>,
}

impl SqliteCompanyRepository {
    /// Wraps a connection produced by `db::open_db` / `db::open_db_in_memory`.
    ///
    /// # Errors
    /// - `InvalidData` when the connection schema is not fully migrated.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        let version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if version != latest_version() {
            return Err(RepoError::InvalidData(format!(
                "connection schema version {version} does not match expected {}",
                latest_version()
            )));
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquires the connection, honoring cancellation before and after waiting.
    fn connection(&self, ctx: &RequestContext) -> RepoResult<MutexGuard<'_, Connection>> {
        ctx.check()?;
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        ctx.check()?;
        Ok(conn)
    }
}

impl CompanyRepository for SqliteCompanyRepository {
    fn get_company(&self, ctx: &RequestContext, id: CompanyId) -> RepoResult<Company> {
        let conn = self.connection(ctx)?;
        let mut stmt = conn.prepare(&format!("{COMPANY_SELECT_SQL} WHERE id = ?1;"))?;

        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return parse_company_row(row);
        }

        Err(RepoError::NotFound(id))
    }

    fn create_company(&self, ctx: &RequestContext, company: &Company) -> RepoResult<()> {
        company.validate()?;

        let conn = self.connection(ctx)?;
        conn.execute(
            "INSERT INTO companies (
                id,
                name,
                description,
                employee_cnt,
                registered,
                type
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                company.id.to_string(),
                company.name.as_str(),
                company.description.as_str(),
                company.employee_cnt,
                bool_to_int(company.registered),
                company.kind.as_str(),
            ],
        )
        .map_err(|err| classify_write_error(err, Some(company.name.as_str())))?;

        Ok(())
    }

    fn update_company(
        &self,
        ctx: &RequestContext,
        id: CompanyId,
        patch: &CompanyPatch,
    ) -> RepoResult<()> {
        let conn = self.connection(ctx)?;

        if patch.is_empty() {
            return ensure_exists(&conn, id);
        }

        let (sql, bind_values) = build_update_statement(id, patch);
        let changed = conn
            .execute(&sql, params_from_iter(bind_values))
            .map_err(|err| classify_write_error(err, patch.name()))?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn delete_company(&self, ctx: &RequestContext, id: CompanyId) -> RepoResult<()> {
        let conn = self.connection(ctx)?;
        let changed = conn.execute("DELETE FROM companies WHERE id = ?1;", [id.to_string()])?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }
}

/// Builds `UPDATE companies SET ... WHERE id = ?` for the patched columns only.
fn build_update_statement(id: CompanyId, patch: &CompanyPatch) -> (String, Vec<Value>) {
    let mut assignments = Vec::with_capacity(patch.len());
    let mut bind_values = Vec::with_capacity(patch.len() + 1);

    for (index, field) in patch.fields().iter().enumerate() {
        assignments.push(format!("{} = ?{}", field.key(), index + 1));
        bind_values.push(field_to_db(field));
    }
    bind_values.push(Value::Text(id.to_string()));

    let sql = format!(
        "UPDATE companies SET {} WHERE id = ?{};",
        assignments.join(", "),
        bind_values.len()
    );
    (sql, bind_values)
}

fn ensure_exists(conn: &Connection, id: CompanyId) -> RepoResult<()> {
    let found = conn
        .query_row(
            "SELECT 1 FROM companies WHERE id = ?1;",
            [id.to_string()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;

    match found {
        Some(_) => Ok(()),
        None => Err(RepoError::NotFound(id)),
    }
}

/// Maps a failed write to a repository error.
///
/// Only a UNIQUE failure whose sole column is `companies.name` becomes a
/// `Conflict`, and only when the write carried a name to report.
pub fn classify_write_error(err: rusqlite::Error, attempted_name: Option<&str>) -> RepoError {
    let name_conflict = unique_violation_columns(&err).is_some_and(|columns| {
        matches!(
            columns.as_slice(),
            [(table, column)] if *table == COMPANIES_TABLE && column == NAME_COLUMN
        )
    });

    match attempted_name {
        Some(name) if name_conflict => RepoError::Conflict {
            column: NAME_COLUMN.to_string(),
            value: name.to_string(),
        },
        _ => RepoError::from(err),
    }
}

/// Returns the `(table, column)` pairs of a failed UNIQUE constraint.
///
/// Returns `None` for every other error, including primary-key failures.
pub fn unique_violation_columns(err: &rusqlite::Error) -> Option<Vec<(&str, String)>> {
    let rusqlite::Error::SqliteFailure(code, message) = err else {
        return None;
    };
    if code.extended_code != ffi::SQLITE_CONSTRAINT_UNIQUE {
        return None;
    }

    let detail = message.as_deref()?.strip_prefix(UNIQUE_FAILURE_PREFIX)?;
    let columns = detail
        .split(',')
        .map(str::trim)
        .filter_map(|qualified| qualified.split_once('.'))
        .map(|(table, column)| (table, column.to_string()))
        .collect::<Vec<_>>();

    Some(columns)
}

fn parse_company_row(row: &Row<'_>) -> RepoResult<Company> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in companies.id"))
    })?;

    let registered = match row.get::<_, i64>("registered")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid registered value `{other}` in companies.registered"
            )));
        }
    };

    let company = Company {
        id,
        name: row.get("name")?,
        description: row.get("description")?,
        employee_cnt: row.get("employee_cnt")?,
        registered,
        kind: row.get("type")?,
    };
    company
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("company {id}: {err}")))?;
    Ok(company)
}

fn field_to_db(field: &CompanyField) -> Value {
    match field {
        CompanyField::Name(value) | CompanyField::Description(value) | CompanyField::Type(value) => {
            Value::Text(value.clone())
        }
        CompanyField::EmployeeCnt(value) => Value::Integer(*value),
        CompanyField::Registered(value) => Value::Integer(bool_to_int(*value)),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
