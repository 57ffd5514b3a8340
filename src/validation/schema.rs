//! Declarative record schemas
//!
//! A schema is a static table of field rules. Checking a record walks the
//! table and reports the first rule the record breaks.

use serde_json::Value;

/// Expected JSON type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    NonEmptyString,
    /// A number or numeric string within `min..=max`
    Integer { min: i64, max: i64 },
    Boolean,
    Array,
    Object,
}

/// One field of a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldRule {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Artist objects from search and playlist responses
pub const ARTIST_SCHEMA: &[FieldRule] = &[
    FieldRule::required("id", FieldKind::NonEmptyString),
    FieldRule::optional("name", FieldKind::String),
    FieldRule::optional("popularity", FieldKind::Integer { min: 0, max: 100 }),
    FieldRule::optional("genres", FieldKind::Array),
];

/// Track objects from the top-tracks response
pub const TRACK_SCHEMA: &[FieldRule] = &[
    FieldRule::required("id", FieldKind::NonEmptyString),
    FieldRule::required("name", FieldKind::NonEmptyString),
    FieldRule::required("popularity", FieldKind::Integer { min: 0, max: 100 }),
    FieldRule::optional("duration_ms", FieldKind::Integer { min: 0, max: i64::MAX }),
    FieldRule::optional("explicit", FieldKind::Boolean),
    FieldRule::optional("preview_url", FieldKind::String),
    FieldRule::optional("album", FieldKind::Object),
    FieldRule::optional("artists", FieldKind::Array),
];

/// A broken rule: the field name and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub reason: String,
}

/// Checks a record against a schema
///
/// Null counts as absent, so an optional field may be null.
pub fn check(record: &Value, schema: &[FieldRule]) -> Result<(), FieldError> {
    let Some(object) = record.as_object() else {
        return Err(FieldError {
            field: "$",
            reason: format!("expected an object, got {}", type_name(record)),
        });
    };

    for rule in schema {
        match object.get(rule.name) {
            None | Some(Value::Null) => {
                if rule.required {
                    return Err(FieldError {
                        field: rule.name,
                        reason: "is missing".to_string(),
                    });
                }
            }
            Some(value) => {
                if let Err(reason) = check_kind(value, rule.kind) {
                    return Err(FieldError {
                        field: rule.name,
                        reason,
                    });
                }
            }
        }
    }

    Ok(())
}

fn check_kind(value: &Value, kind: FieldKind) -> Result<(), String> {
    match kind {
        FieldKind::String if value.is_string() => Ok(()),
        FieldKind::NonEmptyString => match value.as_str() {
            Some(s) if !s.trim().is_empty() => Ok(()),
            Some(_) => Err("is empty".to_string()),
            None => Err(format!("expected a string, got {}", type_name(value))),
        },
        FieldKind::Integer { min, max } => match as_integer(value) {
            Some(n) if n >= min && n <= max => Ok(()),
            Some(n) => Err(format!("{} is outside {}..={}", n, min, max)),
            None => Err(format!("expected an integer, got {}", type_name(value))),
        },
        FieldKind::Boolean if value.is_boolean() => Ok(()),
        FieldKind::Array if value.is_array() => Ok(()),
        FieldKind::Object if value.is_object() => Ok(()),
        _ => Err(format!("expected {:?}, got {}", kind, type_name(value))),
    }
}

/// Reads an integer from a number or a numeric string
///
/// `"42"`, `42` and `42.0` all read as 42; `42.5` and `"abc"` do not.
pub fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
