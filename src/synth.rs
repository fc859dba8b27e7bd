//! Tree synthesis
//!
//! Walks a declaration's normalized attributes and produces the JSON body
//! emitted for it. Nested blocks stay nested maps, repeated blocks stay
//! arrays of maps, and scalars stay scalar leaves. References are rendered
//! here, at walk time, rather than when they were minted.
//!
//! Map fields flagged `accumulate` are merged with the template's base tags
//! (base first, then the author's map; last writer wins per key).

use serde_json::{Map, Number, Value as JsonValue};

use crate::resource::ResourceNode;
use crate::value::{AttributeMap, Value};

/// Meta-argument selecting an aliased provider
pub const PROVIDER_META: &str = "provider";

/// Per-template synthesizer
#[derive(Debug, Clone, Copy)]
pub struct Synthesizer<'a> {
    base_tags: &'a AttributeMap,
}

impl<'a> Synthesizer<'a> {
    pub fn new(base_tags: &'a AttributeMap) -> Self {
        Self { base_tags }
    }

    /// Emitted body for one node
    pub fn synthesize(&self, node: &ResourceNode) -> JsonValue {
        let schema = node.resource_type().schema();
        let mut body = Map::new();

        for (key, value) in node.attributes().iter() {
            let accumulate = schema.field(key).is_some_and(|f| f.accumulate);
            let rendered = match value {
                Value::Map(author) if accumulate => {
                    render(&Value::Map(merge_maps([self.base_tags, author])))
                }
                other => render(other),
            };
            body.insert(key.clone(), rendered);
        }

        if !self.base_tags.is_empty() {
            for field in schema.fields().filter(|f| f.accumulate) {
                if !body.contains_key(&field.name) {
                    body.insert(field.name.clone(), render(&Value::Map(self.base_tags.clone())));
                }
            }
        }

        if let Some(alias) = node.provider_alias() {
            body.insert(
                PROVIDER_META.to_string(),
                JsonValue::String(format!("{}.{}", node.resource_type().provider_kind(), alias)),
            );
        }

        JsonValue::Object(body)
    }
}

/// Render an attribute value to its document form
pub fn render(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(i) => JsonValue::Number(Number::from(*i)),
        Value::Float(f) => Number::from_f64(*f).map(JsonValue::Number).unwrap_or(JsonValue::Null),
        Value::String(s) => JsonValue::String(s.clone()),
        Value::List(items) => JsonValue::Array(items.iter().map(render).collect()),
        Value::Map(map) => JsonValue::Object(render_map(map)),
        Value::Ref(reference) => JsonValue::String(reference.render()),
    }
}

pub(crate) fn render_map(map: &AttributeMap) -> Map<String, JsonValue> {
    map.iter().map(|(k, v)| (k.clone(), render(v))).collect()
}

/// Merge maps in order; a later layer overwrites earlier keys in place
pub fn merge_maps<'m, I>(layers: I) -> AttributeMap
where
    I: IntoIterator<Item = &'m AttributeMap>,
{
    let mut merged = AttributeMap::new();
    for layer in layers {
        for (key, value) in layer {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}
