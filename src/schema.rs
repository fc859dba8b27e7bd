//! Attribute schemas
//!
//! Immutable structural contracts for a resource type's configuration.
//! Schemas are assembled with builders, wrapped in `Arc` once built, and
//! never mutated afterwards.
//!
//! ## Example
//!
//! ```
//! use infra_synth::schema::{AttributeSchema, Field};
//! use infra_synth::formats;
//!
//! let schema = AttributeSchema::builder()
//!     .field(Field::string("cidr_block").required().pattern(formats::ipv4_cidr()))
//!     .field(Field::boolean("enable_dns_support").default(true))
//!     .field(Field::map_of_strings("tags").accumulate())
//!     .build();
//!
//! assert!(schema.field("cidr_block").unwrap().required);
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;

use crate::value::{AttributeMap, Value};

// =============================================================================
// Types and constraints
// =============================================================================

/// Structural type of a field or element
#[derive(Debug, Clone)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Bool,
    /// Any value, copied through unvalidated
    Any,
    /// One of a fixed set of string literals
    Enum(Vec<String>),
    List(Box<TypeSpec>),
    /// String-keyed map with typed values
    Map(Box<TypeSpec>),
    /// Nested block with its own schema
    Object(Arc<AttributeSchema>),
    /// Tagged union: exactly one named shape must match
    OneOf(Vec<Variant>),
}

/// Constraint applied after the type check succeeds
#[derive(Debug, Clone)]
pub enum Constraint {
    Pattern(Regex),
    /// Inclusive numeric bounds
    Range { min: Option<f64>, max: Option<f64> },
    /// String length bounds, in characters
    Length { min: Option<usize>, max: Option<usize> },
    /// List or map entry count bounds
    Size { min: Option<usize>, max: Option<usize> },
    KeyPattern(Regex),
}

/// A type plus the constraints on values of that type
#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub ty: FieldType,
    pub constraints: Vec<Constraint>,
}

impl TypeSpec {
    pub fn new(ty: FieldType) -> Self {
        Self {
            ty,
            constraints: Vec::new(),
        }
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn integer() -> Self {
        Self::new(FieldType::Integer)
    }

    pub fn number() -> Self {
        Self::new(FieldType::Number)
    }

    pub fn boolean() -> Self {
        Self::new(FieldType::Bool)
    }

    pub fn any() -> Self {
        Self::new(FieldType::Any)
    }

    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(FieldType::Enum(values.into_iter().map(Into::into).collect()))
    }

    pub fn list(element: TypeSpec) -> Self {
        Self::new(FieldType::List(Box::new(element)))
    }

    pub fn map(value: TypeSpec) -> Self {
        Self::new(FieldType::Map(Box::new(value)))
    }

    pub fn object(schema: impl Into<Arc<AttributeSchema>>) -> Self {
        Self::new(FieldType::Object(schema.into()))
    }

    pub fn one_of(variants: Vec<Variant>) -> Self {
        Self::new(FieldType::OneOf(variants))
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn pattern(self, re: Regex) -> Self {
        self.constraint(Constraint::Pattern(re))
    }

    pub fn range(self, min: impl Into<f64>, max: impl Into<f64>) -> Self {
        self.constraint(Constraint::Range {
            min: Some(min.into()),
            max: Some(max.into()),
        })
    }

    pub fn min(self, min: impl Into<f64>) -> Self {
        self.constraint(Constraint::Range {
            min: Some(min.into()),
            max: None,
        })
    }

    pub fn max(self, max: impl Into<f64>) -> Self {
        self.constraint(Constraint::Range {
            min: None,
            max: Some(max.into()),
        })
    }

    pub fn length(self, min: usize, max: usize) -> Self {
        self.constraint(Constraint::Length {
            min: Some(min),
            max: Some(max),
        })
    }

    pub fn size(self, min: usize, max: usize) -> Self {
        self.constraint(Constraint::Size {
            min: Some(min),
            max: Some(max),
        })
    }

    pub fn min_size(self, min: usize) -> Self {
        self.constraint(Constraint::Size {
            min: Some(min),
            max: None,
        })
    }

    pub fn key_pattern(self, re: Regex) -> Self {
        self.constraint(Constraint::KeyPattern(re))
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ty {
            FieldType::String => write!(f, "string"),
            FieldType::Integer => write!(f, "integer"),
            FieldType::Number => write!(f, "number"),
            FieldType::Bool => write!(f, "bool"),
            FieldType::Any => write!(f, "any"),
            FieldType::Enum(values) => write!(f, "one of {:?}", values),
            FieldType::List(inner) => write!(f, "list of {}", inner),
            FieldType::Map(inner) => write!(f, "map of {}", inner),
            FieldType::Object(_) => write!(f, "object"),
            FieldType::OneOf(variants) => {
                let names: Vec<_> = variants.iter().map(|v| v.name.as_str()).collect();
                write!(f, "exactly one of {:?}", names)
            }
        }
    }
}

/// A named shape in a tagged union
#[derive(Debug, Clone)]
pub struct Variant {
    pub name: String,
    pub schema: Arc<AttributeSchema>,
}

impl Variant {
    pub fn new(name: impl Into<String>, schema: impl Into<Arc<AttributeSchema>>) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
        }
    }
}

// =============================================================================
// Fields
// =============================================================================

/// One named field of a schema
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub spec: TypeSpec,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
    /// Map field merged with the template's base tags at synthesis
    pub accumulate: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, spec: TypeSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            required: false,
            default: None,
            description: None,
            accumulate: false,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, TypeSpec::string())
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, TypeSpec::integer())
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, TypeSpec::number())
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, TypeSpec::boolean())
    }

    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, TypeSpec::any())
    }

    pub fn enumeration<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, TypeSpec::enumeration(values))
    }

    pub fn list(name: impl Into<String>, element: TypeSpec) -> Self {
        Self::new(name, TypeSpec::list(element))
    }

    pub fn map(name: impl Into<String>, value: TypeSpec) -> Self {
        Self::new(name, TypeSpec::map(value))
    }

    /// Free-form string map, the usual shape of `tags`
    pub fn map_of_strings(name: impl Into<String>) -> Self {
        Self::map(name, TypeSpec::string())
    }

    /// Singleton nested block
    pub fn object(name: impl Into<String>, schema: impl Into<Arc<AttributeSchema>>) -> Self {
        Self::new(name, TypeSpec::object(schema))
    }

    /// Repeated nested block
    pub fn objects(name: impl Into<String>, schema: impl Into<Arc<AttributeSchema>>) -> Self {
        Self::new(name, TypeSpec::list(TypeSpec::object(schema)))
    }

    pub fn one_of(name: impl Into<String>, variants: Vec<Variant>) -> Self {
        Self::new(name, TypeSpec::one_of(variants))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn accumulate(mut self) -> Self {
        self.accumulate = true;
        self
    }

    pub fn pattern(mut self, re: Regex) -> Self {
        self.spec = self.spec.pattern(re);
        self
    }

    pub fn range(mut self, min: impl Into<f64>, max: impl Into<f64>) -> Self {
        self.spec = self.spec.range(min, max);
        self
    }

    pub fn min(mut self, min: impl Into<f64>) -> Self {
        self.spec = self.spec.min(min);
        self
    }

    pub fn max(mut self, max: impl Into<f64>) -> Self {
        self.spec = self.spec.max(max);
        self
    }

    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.spec = self.spec.length(min, max);
        self
    }

    pub fn size(mut self, min: usize, max: usize) -> Self {
        self.spec = self.spec.size(min, max);
        self
    }

    pub fn min_size(mut self, min: usize) -> Self {
        self.spec = self.spec.min_size(min);
        self
    }

    pub fn key_pattern(mut self, re: Regex) -> Self {
        self.spec = self.spec.key_pattern(re);
        self
    }
}

// =============================================================================
// Cross-field invariants
// =============================================================================

/// Predicate over the normalized sibling map; `Err` carries the message
pub type InvariantFn = Arc<dyn Fn(&AttributeMap) -> Result<(), String> + Send + Sync>;

/// Constraint spanning two or more sibling fields
#[derive(Clone)]
pub enum Invariant {
    Requires { field: String, companion: String },
    MutuallyExclusive(Vec<String>),
    ExactlyOneOf(Vec<String>),
    AtLeastOneOf(Vec<String>),
    Custom { name: String, check: InvariantFn },
}

impl fmt::Debug for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invariant::Requires { field, companion } => f
                .debug_struct("Requires")
                .field("field", field)
                .field("companion", companion)
                .finish(),
            Invariant::MutuallyExclusive(fields) => {
                f.debug_tuple("MutuallyExclusive").field(fields).finish()
            }
            Invariant::ExactlyOneOf(fields) => f.debug_tuple("ExactlyOneOf").field(fields).finish(),
            Invariant::AtLeastOneOf(fields) => f.debug_tuple("AtLeastOneOf").field(fields).finish(),
            Invariant::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish(),
        }
    }
}

// =============================================================================
// Schema
// =============================================================================

/// Closed (by default) mapping from field name to field contract
#[derive(Debug, Clone, Default)]
pub struct AttributeSchema {
    fields: IndexMap<String, Field>,
    invariants: Vec<Invariant>,
    open: bool,
}

impl AttributeSchema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Fields in declaration order
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn invariants(&self) -> &[Invariant] {
        &self.invariants
    }

    /// Whether undeclared keys are passed through instead of rejected
    pub fn is_open(&self) -> bool {
        self.open
    }
}

/// Builder for [`AttributeSchema`]
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    schema: AttributeSchema,
}

impl SchemaBuilder {
    /// Add a field; a later field with the same name replaces the earlier one
    pub fn field(mut self, field: Field) -> Self {
        self.schema.fields.insert(field.name.clone(), field);
        self
    }

    pub fn invariant(mut self, invariant: Invariant) -> Self {
        self.schema.invariants.push(invariant);
        self
    }

    pub fn requires(self, field: impl Into<String>, companion: impl Into<String>) -> Self {
        self.invariant(Invariant::Requires {
            field: field.into(),
            companion: companion.into(),
        })
    }

    pub fn mutually_exclusive<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invariant(Invariant::MutuallyExclusive(
            fields.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn exactly_one_of<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invariant(Invariant::ExactlyOneOf(
            fields.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn at_least_one_of<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invariant(Invariant::AtLeastOneOf(
            fields.into_iter().map(Into::into).collect(),
        ))
    }

    /// Named custom invariant over the normalized sibling values
    pub fn check<F>(self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&AttributeMap) -> Result<(), String> + Send + Sync + 'static,
    {
        self.invariant(Invariant::Custom {
            name: name.into(),
            check: Arc::new(check),
        })
    }

    /// Accept undeclared keys (provider-specific free-form metadata)
    pub fn open(mut self) -> Self {
        self.schema.open = true;
        self
    }

    pub fn build(self) -> AttributeSchema {
        self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_preserves_field_order() {
        let schema = AttributeSchema::builder()
            .field(Field::string("b"))
            .field(Field::integer("a"))
            .field(Field::boolean("c"))
            .build();
        let names: Vec<_> = schema.fields().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert!(!schema.is_open());
    }

    #[test]
    fn test_field_modifiers() {
        let field = Field::integer("port").required().range(0, 65535).description("listener port");
        assert!(field.required);
        assert_eq!(field.description.as_deref(), Some("listener port"));
        assert!(matches!(
            field.spec.constraints.as_slice(),
            [Constraint::Range { min: Some(min), max: Some(max) }] if *min == 0.0 && *max == 65535.0
        ));
    }

    #[test]
    fn test_type_spec_display() {
        let spec = TypeSpec::list(TypeSpec::enumeration(["tcp", "udp"]));
        assert_eq!(spec.to_string(), "list of one of [\"tcp\", \"udp\"]");
    }

    #[test]
    fn test_invariants_recorded_in_order() {
        let schema = AttributeSchema::builder()
            .field(Field::string("csr"))
            .field(Field::string("certificate_pem"))
            .mutually_exclusive(["csr", "certificate_pem"])
            .check("noop", |_| Ok(()))
            .build();
        assert_eq!(schema.invariants().len(), 2);
        assert!(matches!(schema.invariants()[0], Invariant::MutuallyExclusive(_)));
        assert_eq!(format!("{:?}", schema.invariants()[1]), "Custom { name: \"noop\" }");
    }
}
