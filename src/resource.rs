//! Resource type definitions and declared nodes
//!
//! A [`ResourceType`] pairs a block type name (`aws_vpc`) with its
//! attribute schema, the output fields the provisioning engine will know
//! after apply, and any computed properties derived from validated input.
//! Per-type definitions are thin consumers of this module.

use std::fmt;
use std::sync::Arc;

use crate::error::ValidationError;
use crate::reference::BlockKind;
use crate::schema::AttributeSchema;
use crate::validate::{self, NormalizedAttributes};
use crate::value::Value;

/// Pure function of a declaration's normalized attributes
pub type ComputedFn = Arc<dyn Fn(&NormalizedAttributes) -> Value + Send + Sync>;

/// Named computed property of a resource type
#[derive(Clone)]
pub struct ComputedProperty {
    pub name: String,
    pub compute: ComputedFn,
}

impl fmt::Debug for ComputedProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedProperty").field("name", &self.name).finish()
    }
}

/// Definition of one resource or data source type
#[derive(Debug, Clone)]
pub struct ResourceType {
    kind: BlockKind,
    name: String,
    schema: Arc<AttributeSchema>,
    outputs: Vec<String>,
    computed: Vec<ComputedProperty>,
}

impl ResourceType {
    /// Managed resource type
    pub fn resource(name: impl Into<String>, schema: impl Into<Arc<AttributeSchema>>) -> Self {
        Self::new(BlockKind::Resource, name, schema)
    }

    /// Read-only data source type
    pub fn data_source(name: impl Into<String>, schema: impl Into<Arc<AttributeSchema>>) -> Self {
        Self::new(BlockKind::Data, name, schema)
    }

    fn new(kind: BlockKind, name: impl Into<String>, schema: impl Into<Arc<AttributeSchema>>) -> Self {
        Self {
            kind,
            name: name.into(),
            schema: schema.into(),
            outputs: Vec::new(),
            computed: Vec::new(),
        }
    }

    /// Output fields known only after apply (`id`, `arn`, `endpoint`, ...)
    pub fn outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs.extend(outputs.into_iter().map(Into::into));
        self
    }

    /// Register a computed property evaluated lazily by the façade
    pub fn computed<F>(mut self, name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&NormalizedAttributes) -> Value + Send + Sync + 'static,
    {
        self.computed.push(ComputedProperty {
            name: name.into(),
            compute: Arc::new(compute),
        });
        self
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    pub fn output_fields(&self) -> &[String] {
        &self.outputs
    }

    pub fn computed_properties(&self) -> &[ComputedProperty] {
        &self.computed
    }

    /// Provider kind, by convention the type prefix (`aws_vpc` -> `aws`)
    pub fn provider_kind(&self) -> &str {
        self.name.split('_').next().unwrap_or(&self.name)
    }

    pub fn has_output(&self, field: &str) -> bool {
        self.outputs.iter().any(|o| o == field)
    }

    /// Whether `field` (possibly dotted) starts at a declared output or
    /// schema attribute
    pub fn exposes(&self, field: &str) -> bool {
        let head = field.split('.').next().unwrap_or(field);
        self.has_output(head) || self.schema.has_field(head)
    }

    pub fn validate(&self, raw: &Value) -> Result<NormalizedAttributes, ValidationError> {
        validate::validate(&self.schema, raw)
    }
}

/// One accepted declaration inside a template
#[derive(Debug, Clone)]
pub struct ResourceNode {
    resource_type: Arc<ResourceType>,
    name: String,
    attributes: Arc<NormalizedAttributes>,
    provider: Option<String>,
}

impl ResourceNode {
    pub(crate) fn new(
        resource_type: Arc<ResourceType>,
        name: impl Into<String>,
        attributes: NormalizedAttributes,
        provider: Option<String>,
    ) -> Self {
        Self {
            resource_type,
            name: name.into(),
            attributes: Arc::new(attributes),
            provider,
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.resource_type.kind()
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    pub(crate) fn resource_type_arc(&self) -> &Arc<ResourceType> {
        &self.resource_type
    }

    pub fn type_name(&self) -> &str {
        self.resource_type.name()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &NormalizedAttributes {
        &self.attributes
    }

    pub(crate) fn attributes_arc(&self) -> &Arc<NormalizedAttributes> {
        &self.attributes
    }

    /// Alternate provider alias selected at declaration, if any
    pub fn provider_alias(&self) -> Option<&str> {
        self.provider.as_deref()
    }
}
