//! Resource reference façade
//!
//! The read-only handle returned by a successful declaration. It exposes
//! the normalized attributes, the references minted for the type's output
//! fields, and computed properties evaluated on first access.

use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::unsync::OnceCell;

use crate::reference::{BlockKind, Reference};
use crate::resource::{ResourceNode, ResourceType};
use crate::validate::NormalizedAttributes;
use crate::value::Value;

/// Handle to an accepted declaration
#[derive(Debug, Clone)]
pub struct ResourceRef {
    resource_type: Arc<ResourceType>,
    name: String,
    attributes: Arc<NormalizedAttributes>,
    outputs: IndexMap<String, Reference>,
    computed: Vec<OnceCell<Value>>,
}

impl ResourceRef {
    pub(crate) fn from_node(node: &ResourceNode) -> Self {
        let resource_type = Arc::clone(node.resource_type_arc());
        let outputs = resource_type
            .output_fields()
            .iter()
            .map(|field| {
                let reference = Reference::new(resource_type.kind(), resource_type.name(), node.name(), field.as_str());
                (field.clone(), reference)
            })
            .collect();
        let computed = resource_type.computed_properties().iter().map(|_| OnceCell::new()).collect();

        Self {
            resource_type,
            name: node.name().to_string(),
            attributes: Arc::clone(node.attributes_arc()),
            outputs,
            computed,
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.resource_type.kind()
    }

    pub fn resource_type(&self) -> &str {
        self.resource_type.name()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `aws_vpc.main` / `data.aws_ami.ubuntu`
    pub fn address(&self) -> String {
        match self.kind() {
            BlockKind::Resource => format!("{}.{}", self.resource_type(), self.name),
            BlockKind::Data => format!("data.{}.{}", self.resource_type(), self.name),
        }
    }

    pub fn attributes(&self) -> &NormalizedAttributes {
        &self.attributes
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Minted reference for a declared output field
    pub fn output(&self, field: &str) -> Option<&Reference> {
        self.outputs.get(field)
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&str, &Reference)> {
        self.outputs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Literal attribute when the author supplied one, otherwise the
    /// deferred output reference
    pub fn get(&self, field: &str) -> Option<Value> {
        self.attributes
            .get(field)
            .cloned()
            .or_else(|| self.outputs.get(field).cloned().map(Value::Ref))
    }

    pub fn id(&self) -> Option<&Reference> {
        self.output("id")
    }

    pub fn arn(&self) -> Option<&Reference> {
        self.output("arn")
    }

    /// Computed property, evaluated on first access and cached
    pub fn computed(&self, name: &str) -> Option<&Value> {
        let properties = self.resource_type.computed_properties();
        let idx = properties.iter().position(|p| p.name == name)?;
        Some(self.computed[idx].get_or_init(|| (properties[idx].compute)(&self.attributes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::schema::{AttributeSchema, Field};
    use serde_json::json;

    fn db_type() -> Arc<ResourceType> {
        Arc::new(
            ResourceType::resource(
                "aws_db_instance",
                AttributeSchema::builder()
                    .field(Field::string("instance_class").required())
                    .field(Field::boolean("multi_az").default(false))
                    .field(Field::integer("allocated_storage").default(20))
                    .build(),
            )
            .outputs(["id", "arn", "endpoint", "address"])
            .computed("monthly_storage_cost", |attrs| {
                let gb = attrs.get("allocated_storage").and_then(Value::as_i64).unwrap_or(0);
                let multiplier = if attrs.get("multi_az") == Some(&Value::Bool(true)) { 2.0 } else { 1.0 };
                Value::Float(gb as f64 * 0.115 * multiplier)
            }),
        )
    }

    fn facade(raw: serde_json::Value) -> ResourceRef {
        let ty = db_type();
        let attrs = ty.validate(&Value::from(raw)).unwrap();
        ResourceRef::from_node(&ResourceNode::new(ty, "primary", attrs, None))
    }

    #[test]
    fn test_outputs_minted() {
        let db = facade(json!({"instance_class": "db.t3.micro"}));
        assert_eq!(db.output("endpoint").unwrap().render(), "${aws_db_instance.primary.endpoint}");
        assert_eq!(db.id().unwrap().render(), "${aws_db_instance.primary.id}");
        assert!(db.output("nonexistent").is_none());
        assert_eq!(db.address(), "aws_db_instance.primary");
        assert_eq!(db.outputs().count(), 4);
    }

    #[test]
    fn test_get_prefers_literal() {
        let db = facade(json!({"instance_class": "db.t3.micro"}));
        assert_eq!(db.get("instance_class"), Some(Value::from("db.t3.micro")));
        assert_eq!(db.get("multi_az"), Some(Value::Bool(false)));
        assert!(matches!(db.get("address"), Some(Value::Ref(_))));
        assert_eq!(db.get("unknown"), None);
    }

    #[test]
    fn test_computed_property() {
        let db = facade(json!({"instance_class": "db.r5.large", "multi_az": true, "allocated_storage": 100}));
        let cost = db.computed("monthly_storage_cost").and_then(Value::as_f64).unwrap();
        assert!((cost - 23.0).abs() < 1e-9);
        assert!(db.computed("missing").is_none());
    }

    #[test]
    fn test_computed_evaluated_once() {
        thread_local! {
            static CALLS: Cell<u32> = const { Cell::new(0) };
        }
        let ty = Arc::new(
            ResourceType::resource("null_resource", AttributeSchema::default()).computed("n", |_| {
                CALLS.with(|c| c.set(c.get() + 1));
                Value::Int(1)
            }),
        );
        let node = ResourceNode::new(ty, "x", NormalizedAttributes::default(), None);
        let handle = ResourceRef::from_node(&node);
        assert_eq!(handle.computed("n"), Some(&Value::Int(1)));
        assert_eq!(handle.computed("n"), Some(&Value::Int(1)));
        assert_eq!(CALLS.with(Cell::get), 1);
    }
}
