//! Declarative request validation.
//!
//! A [`Shape`] is a static list of [`FieldSpec`]s. Validating a merged
//! parameter bag against a shape either yields a normalized JSON object that
//! contains only the declared fields, or a [`ValidationError`] listing every
//! violated constraint.
//!
//! # Normalization Rules
//!
//! - Fields not declared by the shape are dropped.
//! - Missing optional fields stay absent unless the field declares a default.
//! - Integers declared with `coerce` accept numeric-looking strings, so query
//!   and path values can be range-checked as numbers.
//! - Dates are normalized to `YYYY-MM-DD`.
//! - `null` is rejected like any other value of the wrong type.
//!
//! Validation is pure: the notion of "today" comes from [`ValidationContext`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

// =============================================================================
// Validation Error
// =============================================================================

/// Field-level error for validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Path of the field that failed validation, e.g. `tags[2]`.
    pub field: String,
    /// Error message for this field.
    pub message: String,
}

impl FieldError {
    /// Creates a new field error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every constraint violated by one parameter bag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed for {} field(s)", .errors.len())]
pub struct ValidationError {
    /// Field-level errors, in shape declaration order.
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub const fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    /// Creates a validation error with a single field error.
    #[must_use]
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(vec![FieldError::new(field, message)])
    }

    /// Returns `true` if the given field path has at least one error.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|error| error.field == field)
    }
}

// =============================================================================
// Shape Declarations
// =============================================================================

/// The kind of value a field accepts, with its bounds.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// A string whose length in characters lies in `min..=max`.
    Text { min: usize, max: usize },
    /// An integer in `min..=max`; strings are parsed first when `coerce` is set.
    Integer { min: i64, max: i64, coerce: bool },
    /// An ISO-8601 date; optionally rejected when before today.
    Date { not_before_today: bool },
    /// One of a fixed set of strings.
    Choice(&'static [&'static str]),
    /// A list of at most `max_items` values of `item` kind.
    List {
        item: &'static FieldKind,
        max_items: usize,
    },
    /// A nested object with its own shape.
    Object(Shape),
}

/// Value inserted when an optional field is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    Integer(i64),
    Text(&'static str),
}

impl FieldDefault {
    fn to_value(self) -> Value {
        match self {
            Self::Integer(value) => Value::from(value),
            Self::Text(value) => Value::from(value),
        }
    }
}

/// Declaration of one field of a shape.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<FieldDefault>,
}

impl FieldSpec {
    /// Declares a field that must be present.
    #[must_use]
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
        }
    }

    /// Declares a field that may be absent.
    #[must_use]
    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
        }
    }

    /// Sets the value used when the field is absent.
    #[must_use]
    pub const fn with_default(self, default: FieldDefault) -> Self {
        Self {
            default: Some(default),
            ..self
        }
    }
}

/// A declared parameter shape.
#[derive(Debug, Clone, Copy)]
pub struct Shape {
    fields: &'static [FieldSpec],
}

impl Shape {
    /// A shape with no fields; every bag validates to an empty object.
    pub const EMPTY: Self = Self::new(&[]);

    /// Creates a shape from its field declarations.
    #[must_use]
    pub const fn new(fields: &'static [FieldSpec]) -> Self {
        Self { fields }
    }

    /// Returns the declared fields.
    #[must_use]
    pub const fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Validates `bag` against this shape.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] with one entry per violated constraint.
    pub fn validate(
        &self,
        bag: &Map<String, Value>,
        context: &ValidationContext,
    ) -> Result<Map<String, Value>, ValidationError> {
        let mut errors = Vec::new();
        let normalized = self.validate_fields(bag, "", context, &mut errors);

        if errors.is_empty() {
            Ok(normalized)
        } else {
            Err(ValidationError::new(errors))
        }
    }

    fn validate_fields(
        &self,
        bag: &Map<String, Value>,
        prefix: &str,
        context: &ValidationContext,
        errors: &mut Vec<FieldError>,
    ) -> Map<String, Value> {
        let mut normalized = Map::new();

        for spec in self.fields {
            let path = if prefix.is_empty() {
                spec.name.to_string()
            } else {
                format!("{prefix}.{}", spec.name)
            };

            match bag.get(spec.name) {
                Some(value) => {
                    if let Some(value) = check_value(&spec.kind, value, &path, context, errors) {
                        normalized.insert(spec.name.to_string(), value);
                    }
                }
                None => {
                    if let Some(default) = spec.default {
                        normalized.insert(spec.name.to_string(), default.to_value());
                    } else if spec.required {
                        errors.push(FieldError::new(path, "Required"));
                    }
                }
            }
        }

        normalized
    }
}

/// Ambient facts validation depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationContext {
    today: NaiveDate,
}

impl ValidationContext {
    /// Creates a context with an explicit current date.
    #[must_use]
    pub const fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    /// Creates a context for the current UTC date.
    #[must_use]
    pub fn current() -> Self {
        Self::new(Utc::now().date_naive())
    }

    /// Returns the date treated as today.
    #[must_use]
    pub const fn today(&self) -> NaiveDate {
        self.today
    }
}

// =============================================================================
// Value Checks
// =============================================================================

fn check_value(
    kind: &FieldKind,
    value: &Value,
    path: &str,
    context: &ValidationContext,
    errors: &mut Vec<FieldError>,
) -> Option<Value> {
    let outcome = match kind {
        FieldKind::Text { min, max } => check_text(value, *min, *max),
        FieldKind::Integer { min, max, coerce } => check_integer(value, *min, *max, *coerce),
        FieldKind::Date { not_before_today } => check_date(value, *not_before_today, context),
        FieldKind::Choice(options) => check_choice(value, options),
        FieldKind::List { item, max_items } => {
            return check_list(value, item, *max_items, path, context, errors);
        }
        FieldKind::Object(shape) => {
            let Some(object) = value.as_object() else {
                errors.push(FieldError::new(path, "Expected an object"));
                return None;
            };
            let before = errors.len();
            let normalized = shape.validate_fields(object, path, context, errors);
            return (errors.len() == before).then_some(Value::Object(normalized));
        }
    };

    match outcome {
        Ok(value) => Some(value),
        Err(message) => {
            errors.push(FieldError::new(path, message));
            None
        }
    }
}

fn check_text(value: &Value, min: usize, max: usize) -> Result<Value, String> {
    let Some(text) = value.as_str() else {
        return Err("Expected text".to_string());
    };

    let length = text.chars().count();
    if length < min {
        return Err(format!("Must be at least {min} characters"));
    }
    if length > max {
        return Err(format!("Must be at most {max} characters"));
    }

    Ok(Value::from(text))
}

fn check_integer(value: &Value, min: i64, max: i64, coerce: bool) -> Result<Value, String> {
    let number = match value {
        Value::Number(number) => integer_from_number(number)?,
        Value::String(text) if coerce => integer_from_text(text)?,
        _ => return Err("Expected a number".to_string()),
    };

    if number < min {
        return Err(format!("Must be at least {min}"));
    }
    if number > max {
        return Err(format!("Must be at most {max}"));
    }

    Ok(Value::from(number))
}

/// Largest magnitude an `f64` represents without losing integer precision.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

#[allow(clippy::cast_possible_truncation)]
fn integer_from_float(float: f64) -> Result<i64, String> {
    if !float.is_finite() {
        return Err("Expected a number".to_string());
    }
    if float.fract() != 0.0 {
        return Err("Expected an integer".to_string());
    }
    if float.abs() > MAX_EXACT_FLOAT {
        return Err("Number is out of range".to_string());
    }
    Ok(float as i64)
}

fn integer_from_number(number: &serde_json::Number) -> Result<i64, String> {
    if let Some(integer) = number.as_i64() {
        return Ok(integer);
    }
    if number.is_u64() {
        return Err("Number is out of range".to_string());
    }
    number
        .as_f64()
        .ok_or_else(|| "Expected a number".to_string())
        .and_then(integer_from_float)
}

fn integer_from_text(text: &str) -> Result<i64, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("Expected a number".to_string());
    }
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Ok(integer);
    }
    trimmed
        .parse::<f64>()
        .map_err(|_| "Expected a number".to_string())
        .and_then(integer_from_float)
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|datetime| datetime.with_timezone(&Utc).date_naive())
        })
}

fn check_date(
    value: &Value,
    not_before_today: bool,
    context: &ValidationContext,
) -> Result<Value, String> {
    let date = value
        .as_str()
        .and_then(parse_date)
        .ok_or_else(|| "Expected an ISO date (YYYY-MM-DD)".to_string())?;

    if not_before_today && date < context.today() {
        return Err("Date cannot be in the past".to_string());
    }

    Ok(Value::from(date.format("%Y-%m-%d").to_string()))
}

fn check_choice(value: &Value, options: &[&str]) -> Result<Value, String> {
    match value.as_str() {
        Some(choice) if options.contains(&choice) => Ok(Value::from(choice)),
        _ => Err(format!("Expected one of: {}", options.join(", "))),
    }
}

fn check_list(
    value: &Value,
    item: &FieldKind,
    max_items: usize,
    path: &str,
    context: &ValidationContext,
    errors: &mut Vec<FieldError>,
) -> Option<Value> {
    let Some(items) = value.as_array() else {
        errors.push(FieldError::new(path, "Expected a list"));
        return None;
    };

    let before = errors.len();
    if items.len() > max_items {
        errors.push(FieldError::new(
            path,
            format!("At most {max_items} items allowed"),
        ));
    }

    let normalized: Vec<Value> = items
        .iter()
        .enumerate()
        .filter_map(|(index, element)| {
            check_value(item, element, &format!("{path}[{index}]"), context, errors)
        })
        .collect();

    (errors.len() == before).then_some(Value::Array(normalized))
}

// =============================================================================
// Tests
// =============================================================================
