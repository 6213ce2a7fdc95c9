//! Adapter-declared option schemas.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::ClientError;

/// Type/range constraint for one canonical option key.
#[derive(Debug, Clone)]
pub struct OptionConstraint {
    pub kind: OptionKind,
    /// Adapter-declared default, merged below user-supplied values.
    pub default: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionKind {
    Float { min: f64, max: f64 },
    Integer { min: i64, max: i64 },
    Boolean,
    Text,
    List,
}

impl OptionConstraint {
    pub const fn float(min: f64, max: f64) -> Self {
        Self {
            kind: OptionKind::Float { min, max },
            default: None,
        }
    }

    pub const fn integer(min: i64, max: i64) -> Self {
        Self {
            kind: OptionKind::Integer { min, max },
            default: None,
        }
    }

    pub const fn boolean() -> Self {
        Self {
            kind: OptionKind::Boolean,
            default: None,
        }
    }

    pub const fn text() -> Self {
        Self {
            kind: OptionKind::Text,
            default: None,
        }
    }

    pub const fn list() -> Self {
        Self {
            kind: OptionKind::List,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Validate a user-supplied value against this constraint.
    pub fn validate(&self, key: &str, value: &Value) -> Result<(), ClientError> {
        let fail = |detail: String| Err(ClientError::InvalidOption(format!("'{key}': {detail}")));
        match self.kind {
            OptionKind::Float { min, max } => match value.as_f64() {
                Some(v) if (min..=max).contains(&v) => Ok(()),
                Some(v) => fail(format!("{v} is outside [{min}, {max}]")),
                None => fail("expected a number".to_string()),
            },
            OptionKind::Integer { min, max } => match value.as_i64() {
                Some(v) if (min..=max).contains(&v) => Ok(()),
                Some(v) => fail(format!("{v} is outside [{min}, {max}]")),
                None => fail("expected an integer".to_string()),
            },
            OptionKind::Boolean => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    fail("expected a boolean".to_string())
                }
            }
            OptionKind::Text => {
                if value.is_string() {
                    Ok(())
                } else {
                    fail("expected a string".to_string())
                }
            }
            OptionKind::List => {
                if value.is_array() {
                    Ok(())
                } else {
                    fail("expected an array".to_string())
                }
            }
        }
    }
}

/// The closed world of canonical option keys an adapter accepts, with their
/// constraints and defaults. Keys outside this schema are caller programming
/// errors (except the provider-specific passthrough bucket).
#[derive(Debug, Clone, Default)]
pub struct OptionSchema {
    constraints: BTreeMap<String, OptionConstraint>,
}

impl OptionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(mut self, key: impl Into<String>, constraint: OptionConstraint) -> Self {
        self.constraints.insert(key.into(), constraint);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.constraints.contains_key(key)
    }

    pub fn constraint(&self, key: &str) -> Option<&OptionConstraint> {
        self.constraints.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.constraints.keys()
    }

    /// Keys with adapter-declared defaults.
    pub fn defaults(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.constraints
            .iter()
            .filter_map(|(k, c)| c.default.as_ref().map(|d| (k, d)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn float_constraint_enforces_range() {
        let c = OptionConstraint::float(0.0, 2.0);
        assert!(c.validate("temperature", &json!(0.7)).is_ok());
        assert!(c.validate("temperature", &json!(2.0)).is_ok());
        assert!(c.validate("temperature", &json!(2.5)).is_err());
        assert!(c.validate("temperature", &json!("hot")).is_err());
    }

    #[test]
    fn integer_constraint_rejects_floats() {
        let c = OptionConstraint::integer(1, 100);
        assert!(c.validate("max_tokens", &json!(50)).is_ok());
        assert!(c.validate("max_tokens", &json!(0.5)).is_err());
    }
}
