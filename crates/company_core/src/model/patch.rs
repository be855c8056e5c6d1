//! Typed partial updates for companies.
//!
//! # Responsibility
//! - Decode a caller-supplied dynamic field map into a closed set of typed
//!   field assignments.
//! - Apply the same per-field rules used by `Company::validate`.
//!
//! # Invariants
//! - Only `name`, `description`, `type`, `employee_cnt` and `registered`
//!   survive decoding; any other key is dropped silently.
//! - Presence in the map is what marks a field for update, never its value.
//! - A decoded `CompanyPatch` holds at most one assignment per field.

use crate::model::company::{
    validate_description, validate_employee_cnt, validate_name, validate_type, FieldViolation,
    ValidationError,
};
use serde_json::{Map, Value};

pub const FIELD_NAME: &str = "name";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_TYPE: &str = "type";
pub const FIELD_EMPLOYEE_CNT: &str = "employee_cnt";
pub const FIELD_REGISTERED: &str = "registered";

/// Recognized update keys in declaration order.
pub const UPDATABLE_FIELDS: &[&str] = &[
    FIELD_NAME,
    FIELD_DESCRIPTION,
    FIELD_TYPE,
    FIELD_EMPLOYEE_CNT,
    FIELD_REGISTERED,
];

/// One typed field assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompanyField {
    Name(String),
    Description(String),
    Type(String),
    EmployeeCnt(i64),
    Registered(bool),
}

impl CompanyField {
    /// Wire key, which is also the storage column name.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Name(_) => FIELD_NAME,
            Self::Description(_) => FIELD_DESCRIPTION,
            Self::Type(_) => FIELD_TYPE,
            Self::EmployeeCnt(_) => FIELD_EMPLOYEE_CNT,
            Self::Registered(_) => FIELD_REGISTERED,
        }
    }

    /// Runs the field rule shared with composite validation.
    pub fn validate(&self) -> Result<(), FieldViolation> {
        match self {
            Self::Name(value) => validate_name(value),
            Self::Description(value) => validate_description(value),
            Self::Type(value) => validate_type(value),
            Self::EmployeeCnt(value) => validate_employee_cnt(*value),
            Self::Registered(_) => Ok(()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Name(value) | Self::Description(value) | Self::Type(value) => {
                Value::String(value.clone())
            }
            Self::EmployeeCnt(value) => Value::from(*value),
            Self::Registered(value) => Value::Bool(*value),
        }
    }

    /// Decodes a value for a recognized key.
    ///
    /// Returns `None` for unrecognized keys.
    fn decode(key: &str, value: &Value) -> Option<Result<Self, FieldViolation>> {
        let unsupported = || FieldViolation::UnsupportedType {
            field: key.to_string(),
        };

        let decoded = match key {
            FIELD_NAME => value
                .as_str()
                .map(|text| Self::Name(text.to_string()))
                .ok_or_else(unsupported),
            FIELD_DESCRIPTION => value
                .as_str()
                .map(|text| Self::Description(text.to_string()))
                .ok_or_else(unsupported),
            FIELD_TYPE => value
                .as_str()
                .map(|text| Self::Type(text.to_string()))
                .ok_or_else(unsupported),
            FIELD_EMPLOYEE_CNT => normalize_integer(value)
                .map(Self::EmployeeCnt)
                .ok_or_else(unsupported),
            FIELD_REGISTERED => value
                .as_bool()
                .map(Self::Registered)
                .ok_or_else(unsupported),
            _ => return None,
        };

        Some(decoded.and_then(|field| field.validate().map(|()| field)))
    }
}

/// Validated set of field assignments for one update request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyPatch {
    fields: Vec<CompanyField>,
}

impl CompanyPatch {
    /// Decodes and validates a dynamic field map.
    ///
    /// Every violation is collected before failing, in `UPDATABLE_FIELDS`
    /// order. Unrecognized keys are discarded together with the map.
    pub fn decode(fields: Map<String, Value>) -> Result<Self, ValidationError> {
        let mut decoded = Vec::new();
        let mut violations = Vec::new();

        for key in UPDATABLE_FIELDS {
            let Some(value) = fields.get(*key) else {
                continue;
            };
            match CompanyField::decode(key, value) {
                Some(Ok(field)) => decoded.push(field),
                Some(Err(violation)) => violations.push(violation),
                None => {}
            }
        }

        match ValidationError::from_violations(violations) {
            Some(err) => Err(err),
            None => Ok(Self { fields: decoded }),
        }
    }

    /// Builds a patch from typed assignments.
    ///
    /// A later assignment to the same field replaces the earlier one.
    pub fn from_fields(
        fields: impl IntoIterator<Item = CompanyField>,
    ) -> Result<Self, ValidationError> {
        let mut patch = Self::default();
        let mut violations = Vec::new();

        for field in fields {
            if let Err(violation) = field.validate() {
                violations.push(violation);
                continue;
            }
            patch.fields.retain(|existing| existing.key() != field.key());
            patch.fields.push(field);
        }

        match ValidationError::from_violations(violations) {
            Some(err) => Err(err),
            None => Ok(patch),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[CompanyField] {
        &self.fields
    }

    /// New name carried by this patch, if any.
    pub fn name(&self) -> Option<&str> {
        self.fields.iter().find_map(|field| match field {
            CompanyField::Name(value) => Some(value.as_str()),
            _ => None,
        })
    }

    /// Normalized field map, as stored and as published in events.
    pub fn to_json_map(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|field| (field.key().to_string(), field.to_json()))
            .collect()
    }
}

/// Accepts integral or floating JSON numbers; floats truncate toward zero.
fn normalize_integer(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(integer) = number.as_i64() {
        return Some(integer);
    }
    if let Some(unsigned) = number.as_u64() {
        return Some(i64::try_from(unsigned).unwrap_or(i64::MAX));
    }
    number.as_f64().map(|float| float.trunc() as i64)
}
