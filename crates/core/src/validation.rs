//! Business-rule validation results and the schema collaborator seam
//!
//! Schema definition is not part of the store. A schema is plugged in as a
//! [`SchemaValidator`]; when none is configured every node validates.

use serde::{Deserialize, Serialize};

use crate::types::Node;

/// Outcome of a business-rule check: `{ valid, errors }`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the check passed
    pub valid: bool,
    /// Human-readable reasons, empty when valid
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ValidationResult {
    /// A passing result
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// A failing result with a single reason
    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            errors: vec![error.into()],
        }
    }

    /// A failing result with several reasons
    ///
    /// An empty list still yields `valid: false`.
    pub fn with_errors(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }

    /// Whether the check passed
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Combine with another result; valid only if both are
    pub fn merge(mut self, other: ValidationResult) -> Self {
        self.valid &= other.valid;
        self.errors.extend(other.errors);
        self
    }
}

/// A value produced by a write that was subject to validation
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Validated<T> {
    /// The write was applied
    Accepted(T),
    /// The write was rejected and nothing changed
    Rejected(ValidationResult),
}

impl<T> Validated<T> {
    /// Whether the write was applied
    pub fn is_accepted(&self) -> bool {
        matches!(self, Validated::Accepted(_))
    }

    /// The applied value, if any
    pub fn accepted(self) -> Option<T> {
        match self {
            Validated::Accepted(value) => Some(value),
            Validated::Rejected(_) => None,
        }
    }

    /// Convert into a standard result
    pub fn into_result(self) -> std::result::Result<T, ValidationResult> {
        match self {
            Validated::Accepted(value) => Ok(value),
            Validated::Rejected(result) => Err(result),
        }
    }

    /// The validation view of this outcome
    pub fn validation(&self) -> ValidationResult {
        match self {
            Validated::Accepted(_) => ValidationResult::ok(),
            Validated::Rejected(result) => result.clone(),
        }
    }
}

/// Pluggable schema check: `validate(node, schema) -> { valid, errors }`
///
/// Implementors are the schema; the store shares one instance across clones.
pub trait SchemaValidator: Send + Sync {
    /// Validate a node candidate against the schema
    fn validate(&self, node: &Node) -> ValidationResult;
}

impl<F> SchemaValidator for F
where
    F: Fn(&Node) -> ValidationResult + Send + Sync,
{
    fn validate(&self, node: &Node) -> ValidationResult {
        self(node)
    }
}

/// Validate against an optional schema; an absent schema always passes
pub fn validate_with(schema: Option<&dyn SchemaValidator>, node: &Node) -> ValidationResult {
    match schema {
        Some(schema) => schema.validate(node),
        None => ValidationResult::ok(),
    }
}
