//! Schema validation
//!
//! `validate(schema, raw)` checks an author-supplied value tree against an
//! [`AttributeSchema`] and produces [`NormalizedAttributes`]: coerced,
//! defaulted, and ordered by schema field order.
//!
//! Validation is fail-fast and deterministic. The first violation found is
//! the single error returned, checked in this order for each object:
//!
//! 1. undeclared keys (input order), unless the schema is open
//! 2. declared fields (schema order), recursing into nested values
//! 3. defaults for absent fields
//! 4. cross-field invariants (declaration order), on the defaulted map
//!
//! Nested failures keep their full path (`ingress[1].from_port`).

use std::fmt;

use crate::error::{ValidationError, Violation};
use crate::schema::{AttributeSchema, Constraint, FieldType, Invariant, TypeSpec};
use crate::value::{AttributeMap, Value};

type VResult<T> = std::result::Result<T, ValidationError>;

// =============================================================================
// Field paths
// =============================================================================

/// One step of a field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// Dotted address of a value inside an attribute tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn field(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Field(name.into()));
        Self(segments)
    }

    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if i == 0 => write!(f, "{}", name)?,
                PathSegment::Field(name) => write!(f, ".{}", name)?,
                PathSegment::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

// =============================================================================
// Normalized attributes
// =============================================================================

/// Validated, defaulted and coerced attributes of one declaration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedAttributes(AttributeMap);

impl NormalizedAttributes {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &AttributeMap {
        &self.0
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Validate raw attributes against a schema
pub fn validate(schema: &AttributeSchema, raw: &Value) -> VResult<NormalizedAttributes> {
    match raw {
        Value::Map(map) => validate_object(schema, map, &FieldPath::root()).map(NormalizedAttributes),
        other => Err(type_error(&FieldPath::root(), "map", other)),
    }
}

fn validate_object(schema: &AttributeSchema, raw: &AttributeMap, path: &FieldPath) -> VResult<AttributeMap> {
    if !schema.is_open() {
        if let Some(key) = raw.keys().find(|k| !schema.has_field(k)) {
            return Err(ValidationError::new(
                path.field(key.as_str()),
                Violation::UnknownField,
                format!("unknown field '{}'", key),
            ));
        }
    }

    let mut normalized = AttributeMap::new();
    for field in schema.fields() {
        let field_path = path.field(field.name.as_str());
        match raw.get(&field.name) {
            Some(value) if !value.is_null() => {
                let value = validate_value(&field.spec, value, &field_path)?;
                normalized.insert(field.name.clone(), value);
            }
            _ => {
                if let Some(default) = &field.default {
                    let value = validate_value(&field.spec, default, &field_path)?;
                    normalized.insert(field.name.clone(), value);
                } else if field.required {
                    return Err(ValidationError::new(
                        field_path,
                        Violation::Required,
                        format!("missing required field '{}'", field.name),
                    ));
                }
            }
        }
    }

    if schema.is_open() {
        for (key, value) in raw {
            if !schema.has_field(key) && !value.is_null() {
                normalized.insert(key.clone(), value.clone());
            }
        }
    }

    for invariant in schema.invariants() {
        check_invariant(invariant, &normalized, path)?;
    }

    Ok(normalized)
}

fn validate_value(spec: &TypeSpec, value: &Value, path: &FieldPath) -> VResult<Value> {
    if let Value::Ref(_) = value {
        return match spec.ty {
            FieldType::Object(_) | FieldType::OneOf(_) => Err(type_error(path, &spec.to_string(), value)),
            _ => Ok(value.clone()),
        };
    }

    let normalized = match &spec.ty {
        FieldType::String => match value {
            Value::String(_) => value.clone(),
            other => return Err(type_error(path, "string", other)),
        },
        FieldType::Integer => coerce_integer(value).ok_or_else(|| type_error(path, "integer", value))?,
        FieldType::Number => coerce_number(value).ok_or_else(|| type_error(path, "number", value))?,
        FieldType::Bool => coerce_bool(value).ok_or_else(|| type_error(path, "bool", value))?,
        FieldType::Any => {
            check_finite(value, path)?;
            value.clone()
        }
        FieldType::Enum(allowed) => match value {
            Value::String(s) if allowed.iter().any(|a| a == s) => value.clone(),
            Value::String(s) => {
                return Err(ValidationError::new(
                    path.clone(),
                    Violation::Enum {
                        allowed: allowed.clone(),
                    },
                    format!("'{}' is not one of {:?}", s, allowed),
                ))
            }
            other => return Err(type_error(path, &spec.to_string(), other)),
        },
        FieldType::List(element) => match value {
            Value::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(validate_value(element, item, &path.index(i))?);
                }
                Value::List(out)
            }
            other => return Err(type_error(path, "list", other)),
        },
        FieldType::Map(element) => match value {
            Value::Map(entries) => {
                let mut out = AttributeMap::new();
                for (key, item) in entries {
                    out.insert(key.clone(), validate_value(element, item, &path.field(key.as_str()))?);
                }
                Value::Map(out)
            }
            other => return Err(type_error(path, "map", other)),
        },
        FieldType::Object(schema) => match value {
            Value::Map(entries) => Value::Map(validate_object(schema, entries, path)?),
            other => return Err(type_error(path, "object", other)),
        },
        FieldType::OneOf(variants) => match value {
            Value::Map(entries) => {
                let mut matched = Vec::new();
                for variant in variants {
                    if let Ok(normalized) = validate_object(&variant.schema, entries, path) {
                        matched.push((variant.name.as_str(), normalized));
                    }
                }
                match matched.len() {
                    1 => Value::Map(matched.remove(0).1),
                    0 => {
                        return Err(ValidationError::new(
                            path.clone(),
                            Violation::Variant,
                            format!("value matches none of the allowed shapes ({})", spec),
                        ))
                    }
                    _ => {
                        let names: Vec<_> = matched.iter().map(|(name, _)| *name).collect();
                        return Err(ValidationError::new(
                            path.clone(),
                            Violation::Variant,
                            format!("value is ambiguous, it matches {:?}", names),
                        ));
                    }
                }
            }
            other => return Err(type_error(path, "object", other)),
        },
    };

    for constraint in &spec.constraints {
        check_constraint(constraint, &normalized, path)?;
    }
    Ok(normalized)
}

fn coerce_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Int(_) => Some(value.clone()),
        Value::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            Some(Value::Int(*f as i64))
        }
        Value::String(s) => s.trim().parse::<i64>().ok().map(Value::Int),
        _ => None,
    }
}

fn coerce_number(value: &Value) -> Option<Value> {
    match value {
        Value::Int(_) => Some(value.clone()),
        Value::Float(f) if f.is_finite() => Some(value.clone()),
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(i) => Some(Value::Int(i)),
            Err(_) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::Float),
        },
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::String(s) if s == "true" => Some(Value::Bool(true)),
        Value::String(s) if s == "false" => Some(Value::Bool(false)),
        _ => None,
    }
}

fn check_constraint(constraint: &Constraint, value: &Value, path: &FieldPath) -> VResult<()> {
    match constraint {
        Constraint::Pattern(re) => {
            if let Value::String(s) = value {
                if !re.is_match(s) {
                    return Err(ValidationError::new(
                        path.clone(),
                        Violation::Pattern {
                            pattern: re.as_str().to_string(),
                        },
                        format!("'{}' does not match pattern {}", s, re.as_str()),
                    ));
                }
            }
        }
        Constraint::Range { min, max } => {
            if let Some(n) = value.as_f64() {
                if min.is_some_and(|m| n < m) || max.is_some_and(|m| n > m) {
                    return Err(ValidationError::new(
                        path.clone(),
                        Violation::Range,
                        format!("{} is outside {}", n, bounds(min, max)),
                    ));
                }
            }
        }
        Constraint::Length { min, max } => {
            if let Value::String(s) = value {
                let len = s.chars().count();
                if min.is_some_and(|m| len < m) || max.is_some_and(|m| len > m) {
                    return Err(ValidationError::new(
                        path.clone(),
                        Violation::Length,
                        format!("length {} is outside {}", len, bounds(min, max)),
                    ));
                }
            }
        }
        Constraint::Size { min, max } => {
            let len = match value {
                Value::List(items) => Some(items.len()),
                Value::Map(entries) => Some(entries.len()),
                _ => None,
            };
            if let Some(len) = len {
                if min.is_some_and(|m| len < m) || max.is_some_and(|m| len > m) {
                    return Err(ValidationError::new(
                        path.clone(),
                        Violation::Size,
                        format!("{} entries is outside {}", len, bounds(min, max)),
                    ));
                }
            }
        }
        Constraint::KeyPattern(re) => {
            if let Value::Map(entries) = value {
                if let Some(key) = entries.keys().find(|k| !re.is_match(k)) {
                    return Err(ValidationError::new(
                        path.field(key.as_str()),
                        Violation::KeyPattern {
                            pattern: re.as_str().to_string(),
                        },
                        format!("key '{}' does not match pattern {}", key, re.as_str()),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn bounds<T: fmt::Display>(min: &Option<T>, max: &Option<T>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("[{}, {}]", min, max),
        (Some(min), None) => format!("[{}, ..)", min),
        (None, Some(max)) => format!("(.., {}]", max),
        (None, None) => "(.., ..)".to_string(),
    }
}

fn check_finite(value: &Value, path: &FieldPath) -> VResult<()> {
    match value {
        Value::Float(f) if !f.is_finite() => Err(type_error(path, "finite number", value)),
        Value::List(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| check_finite(item, &path.index(i))),
        Value::Map(entries) => entries
            .iter()
            .try_for_each(|(key, item)| check_finite(item, &path.field(key.as_str()))),
        _ => Ok(()),
    }
}

fn is_present(map: &AttributeMap, field: &str) -> bool {
    map.get(field).is_some_and(|v| !v.is_null())
}

fn check_invariant(invariant: &Invariant, map: &AttributeMap, path: &FieldPath) -> VResult<()> {
    match invariant {
        Invariant::Requires { field, companion } => {
            if is_present(map, field) && !is_present(map, companion) {
                return Err(ValidationError::new(
                    path.field(field.as_str()),
                    Violation::Requires {
                        companion: companion.clone(),
                    },
                    format!("'{}' requires '{}' to be set", field, companion),
                ));
            }
        }
        Invariant::MutuallyExclusive(fields) => {
            let set: Vec<_> = fields.iter().filter(|f| is_present(map, f)).collect();
            if set.len() > 1 {
                return Err(ValidationError::new(
                    path.field(set[0].as_str()),
                    Violation::MutuallyExclusive {
                        fields: fields.clone(),
                    },
                    format!("fields {:?} are mutually exclusive, but {:?} are set", fields, set),
                ));
            }
        }
        Invariant::ExactlyOneOf(fields) => {
            let set: Vec<_> = fields.iter().filter(|f| is_present(map, f)).collect();
            if set.len() != 1 {
                let at = set
                    .first()
                    .copied()
                    .or_else(|| fields.first())
                    .map(|f| path.field(f.as_str()))
                    .unwrap_or_else(|| path.clone());
                return Err(ValidationError::new(
                    at,
                    Violation::ExactlyOneOf {
                        fields: fields.clone(),
                    },
                    format!("exactly one of {:?} must be set, found {}", fields, set.len()),
                ));
            }
        }
        Invariant::AtLeastOneOf(fields) => {
            if !fields.iter().any(|f| is_present(map, f)) {
                let at = fields
                    .first()
                    .map(|f| path.field(f.as_str()))
                    .unwrap_or_else(|| path.clone());
                return Err(ValidationError::new(
                    at,
                    Violation::AtLeastOneOf {
                        fields: fields.clone(),
                    },
                    format!("at least one of {:?} must be set", fields),
                ));
            }
        }
        Invariant::Custom { name, check } => {
            if let Err(message) = check(map) {
                return Err(ValidationError::new(
                    path.clone(),
                    Violation::Invariant { name: name.clone() },
                    message,
                ));
            }
        }
    }
    Ok(())
}

fn type_error(path: &FieldPath, expected: &str, found: &Value) -> ValidationError {
    ValidationError::new(
        path.clone(),
        Violation::Type {
            expected: expected.to_string(),
        },
        format!("expected {}, found {}", expected, found.kind()),
    )
}
