//! Emitted documents
//!
//! One [`Document`] per closed template. The body is the resource tree
//! (type → name → attributes); provider, data source, output and engine
//! settings sit beside it as sibling sections of the serialized form:
//!
//! ```text
//! {
//!   "terraform": { "required_version": ..., "required_providers": ..., "backend": ... },
//!   "provider":  { "aws": [ {...}, { "alias": "west", ... } ] },
//!   "data":      { "<type>": { "<name>": {...} } },
//!   "resource":  { "<type>": { "<name>": {...} } },
//!   "output":    { "<name>": { "value": ... } }
//! }
//! ```
//!
//! Empty sections are omitted. Key order is insertion order, so the same
//! declarations always serialize to the same bytes.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};
use tracing::info;

use crate::checksum::Checksum;
use crate::config::{OutputConfig, OutputFormat};
use crate::error::Result;
use crate::reference::BlockKind;

type Blocks = IndexMap<String, IndexMap<String, JsonValue>>;

/// Synthesized configuration for one scope
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    scope: String,
    terraform: Map<String, JsonValue>,
    providers: IndexMap<String, Vec<JsonValue>>,
    data: Blocks,
    resources: Blocks,
    outputs: IndexMap<String, JsonValue>,
}

impl Document {
    pub(crate) fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            terraform: Map::new(),
            providers: IndexMap::new(),
            data: IndexMap::new(),
            resources: IndexMap::new(),
            outputs: IndexMap::new(),
        }
    }

    pub(crate) fn set_setting(&mut self, key: &str, value: JsonValue) {
        self.terraform.insert(key.to_string(), value);
    }

    pub(crate) fn push_provider(&mut self, kind: &str, body: JsonValue) {
        self.providers.entry(kind.to_string()).or_default().push(body);
    }

    pub(crate) fn insert_block(&mut self, kind: BlockKind, resource_type: &str, name: &str, body: JsonValue) {
        let blocks = match kind {
            BlockKind::Resource => &mut self.resources,
            BlockKind::Data => &mut self.data,
        };
        blocks
            .entry(resource_type.to_string())
            .or_default()
            .insert(name.to_string(), body);
    }

    pub(crate) fn insert_output(&mut self, name: &str, body: JsonValue) {
        self.outputs.insert(name.to_string(), body);
    }

    /// Name of the template this document was closed from
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Resource types in first-declaration order
    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// Resource names of one type in declaration order
    pub fn resource_names(&self, resource_type: &str) -> Vec<&str> {
        self.resources
            .get(resource_type)
            .map(|names| names.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn resource(&self, resource_type: &str, name: &str) -> Option<&JsonValue> {
        self.resources.get(resource_type)?.get(name)
    }

    pub fn data_source(&self, resource_type: &str, name: &str) -> Option<&JsonValue> {
        self.data.get(resource_type)?.get(name)
    }

    pub fn providers(&self, kind: &str) -> &[JsonValue] {
        self.providers.get(kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn output(&self, name: &str) -> Option<&JsonValue> {
        self.outputs.get(name)
    }

    pub fn setting(&self, key: &str) -> Option<&JsonValue> {
        self.terraform.get(key)
    }

    /// Number of resource blocks
    pub fn len(&self) -> usize {
        self.resources.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full serialized form
    pub fn to_json(&self) -> JsonValue {
        let mut root = Map::new();
        if !self.terraform.is_empty() {
            root.insert("terraform".to_string(), JsonValue::Object(self.terraform.clone()));
        }
        if !self.providers.is_empty() {
            let providers = self
                .providers
                .iter()
                .map(|(kind, bodies)| (kind.clone(), JsonValue::Array(bodies.clone())))
                .collect();
            root.insert("provider".to_string(), JsonValue::Object(providers));
        }
        if !self.data.is_empty() {
            root.insert(BlockKind::Data.section().to_string(), blocks_to_json(&self.data));
        }
        if !self.resources.is_empty() {
            root.insert(BlockKind::Resource.section().to_string(), blocks_to_json(&self.resources));
        }
        if !self.outputs.is_empty() {
            let outputs = self.outputs.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            root.insert("output".to_string(), JsonValue::Object(outputs));
        }
        JsonValue::Object(root)
    }

    pub fn to_string_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_json())?)
    }

    pub fn to_string_compact(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_json())?)
    }

    pub fn checksum(&self) -> Checksum {
        Checksum::from_json(&self.to_json())
    }

    /// Write `<dir>/<scope>/<file_name>` (and the checksum sidecar, if
    /// configured). Returns the document path.
    pub fn write(&self, dir: impl AsRef<Path>, output: &OutputConfig) -> Result<PathBuf> {
        let scope_dir = dir.as_ref().join(&self.scope);
        fs::create_dir_all(&scope_dir)?;

        let content = match output.format {
            OutputFormat::Pretty => self.to_string_pretty()?,
            OutputFormat::Compact => self.to_string_compact()?,
        };
        let path = scope_dir.join(&output.file_name);
        fs::write(&path, &content)?;

        if output.include_checksum {
            let checksum = Checksum::from_bytes(content.as_bytes());
            let sidecar = scope_dir.join(format!("{}.sha256", output.file_name));
            fs::write(&sidecar, checksum.sidecar_line(&output.file_name))?;
        }

        info!(scope = %self.scope, path = %path.display(), resources = self.len(), "wrote document");
        Ok(path)
    }
}

fn blocks_to_json(blocks: &Blocks) -> JsonValue {
    let by_type = blocks
        .iter()
        .map(|(resource_type, names)| {
            let by_name = names.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            (resource_type.clone(), JsonValue::Object(by_name))
        })
        .collect();
    JsonValue::Object(by_type)
}
