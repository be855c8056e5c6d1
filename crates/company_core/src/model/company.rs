//! Company domain model.
//!
//! # Responsibility
//! - Define the single persisted company record and its wire shape.
//! - Provide pure per-field validators plus the composite `validate`.
//!
//! # Invariants
//! - A company is valid only when every field rule passes at once.
//! - `validate` never short-circuits; all violations are reported together,
//!   ordered name, description, type, employee_cnt.
//! - `id` is assigned only through `set_id`; constructors leave it nil.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a persisted company.
pub type CompanyId = Uuid;

pub const NAME_MIN_CHARS: usize = 3;
pub const NAME_MAX_CHARS: usize = 15;
pub const DESCRIPTION_MAX_CHARS: usize = 3000;
pub const EMPLOYEE_CNT_MIN: i64 = 0;
pub const EMPLOYEE_CNT_MAX: i64 = 10_000_000_000;

/// Closed set of category labels accepted in `Company::kind`.
///
/// Read-only for the lifetime of the process.
pub const COMPANY_TYPES: &[&str] = &[
    "Corporations",
    "NonProfit",
    "Cooperative",
    "Sole Proprietorship",
];

/// Canonical company record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Company {
    /// Server-assigned identifier; nil until `set_id` runs.
    pub id: CompanyId,
    /// Unique display name (uniqueness enforced by storage).
    pub name: String,
    pub description: String,
    pub employee_cnt: i64,
    pub registered: bool,
    /// Serialized as `type` to match external schema naming.
    #[serde(rename = "type")]
    pub kind: String,
}

impl Company {
    /// Builds an unidentified company from its field values.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        employee_cnt: i64,
        registered: bool,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::nil(),
            name: name.into(),
            description: description.into(),
            employee_cnt,
            registered,
            kind: kind.into(),
        }
    }

    /// Assigns a freshly generated identifier, replacing any existing one.
    pub fn set_id(&mut self) -> CompanyId {
        self.id = Uuid::new_v4();
        self.id
    }

    /// Runs every field validator and aggregates all failures.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let violations: Vec<FieldViolation> = [
            validate_name(&self.name),
            validate_description(&self.description),
            validate_type(&self.kind),
            validate_employee_cnt(self.employee_cnt),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        match ValidationError::from_violations(violations) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// One broken field rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldViolation {
    NameLength { chars: usize },
    DescriptionLength { chars: usize },
    UnknownType(String),
    EmployeeCntOutOfRange(i64),
    /// A partial-update value carried the wrong dynamic type.
    UnsupportedType { field: String },
}

impl FieldViolation {
    /// Wire name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            Self::NameLength { .. } => "name",
            Self::DescriptionLength { .. } => "description",
            Self::UnknownType(_) => "type",
            Self::EmployeeCntOutOfRange(_) => "employee_cnt",
            Self::UnsupportedType { field } => field.as_str(),
        }
    }
}

impl Display for FieldViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NameLength { chars } => write!(
                f,
                "name must be between {NAME_MIN_CHARS} and {NAME_MAX_CHARS} characters, got {chars}"
            ),
            Self::DescriptionLength { chars } => write!(
                f,
                "description must be at most {DESCRIPTION_MAX_CHARS} characters, got {chars}"
            ),
            Self::UnknownType(value) => write!(
                f,
                "type `{value}` is not one of: {}",
                COMPANY_TYPES.join(", ")
            ),
            Self::EmployeeCntOutOfRange(value) => write!(
                f,
                "employee_cnt must be between {EMPLOYEE_CNT_MIN} and {EMPLOYEE_CNT_MAX}, got {value}"
            ),
            Self::UnsupportedType { field } => write!(f, "unsupported type for field {field}"),
        }
    }
}

impl Error for FieldViolation {}

/// Caller input failed one or more field rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    violations: Vec<FieldViolation>,
}

impl ValidationError {
    /// Returns `None` when nothing was violated.
    pub(crate) fn from_violations(violations: Vec<FieldViolation>) -> Option<Self> {
        if violations.is_empty() {
            None
        } else {
            Some(Self { violations })
        }
    }

    /// Violations in field declaration order.
    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }
}

impl From<FieldViolation> for ValidationError {
    fn from(value: FieldViolation) -> Self {
        Self {
            violations: vec![value],
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<String> = self.violations.iter().map(ToString::to_string).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl Error for ValidationError {}

pub fn validate_name(name: &str) -> Result<(), FieldViolation> {
    let chars = name.chars().count();
    if (NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&chars) {
        Ok(())
    } else {
        Err(FieldViolation::NameLength { chars })
    }
}

pub fn validate_description(description: &str) -> Result<(), FieldViolation> {
    let chars = description.chars().count();
    if chars <= DESCRIPTION_MAX_CHARS {
        Ok(())
    } else {
        Err(FieldViolation::DescriptionLength { chars })
    }
}

/// Accepts only exact (case-sensitive) members of `COMPANY_TYPES`.
pub fn validate_type(kind: &str) -> Result<(), FieldViolation> {
    if COMPANY_TYPES.contains(&kind) {
        Ok(())
    } else {
        Err(FieldViolation::UnknownType(kind.to_string()))
    }
}

pub fn validate_employee_cnt(employee_cnt: i64) -> Result<(), FieldViolation> {
    if (EMPLOYEE_CNT_MIN..=EMPLOYEE_CNT_MAX).contains(&employee_cnt) {
        Ok(())
    } else {
        Err(FieldViolation::EmployeeCntOutOfRange(employee_cnt))
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_description, validate_name, validate_type, Company, FieldViolation};

    #[test]
    fn name_bounds_are_inclusive() {
        assert!(validate_name("qwe").is_ok());
        assert!(validate_name("fifteen chars!!").is_ok());
        assert_eq!(
            validate_name("very long company name"),
            Err(FieldViolation::NameLength { chars: 22 })
        );
        assert!(validate_name("").is_err());
    }

    #[test]
    fn name_length_counts_characters_not_bytes() {
        assert!(validate_name("ÄÖÜ").is_ok());
        assert!(validate_name(&"é".repeat(15)).is_ok());
        assert!(validate_name(&"é".repeat(16)).is_err());
    }

    #[test]
    fn description_allows_exactly_the_limit() {
        let at_limit = "a".repeat(3000);
        assert!(validate_description(&at_limit).is_ok());
        assert!(validate_description(&format!("{at_limit}a")).is_err());
        assert!(validate_description("").is_ok());
    }

    #[test]
    fn type_must_match_exactly() {
        assert!(validate_type("Sole Proprietorship").is_ok());
        assert!(validate_type("Sole Proprietorshi").is_err());
        assert!(validate_type("nonprofit").is_err());
    }

    #[test]
    fn set_id_replaces_existing_identifier() {
        let mut company = Company::new("acme", "", 1, false, "NonProfit");
        assert!(company.id.is_nil());

        let first = company.set_id();
        let second = company.set_id();
        assert_ne!(first, second);
        assert_eq!(company.id, second);
    }
}
