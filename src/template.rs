//! Templates
//!
//! A [`Template`] is one independently-applicable scope: an ordered set of
//! declarations plus the provider bindings, state backend and exports that
//! go with them.
//!
//! ```text
//!   open(name, providers)
//!        │
//!        ▼
//!   declare(type, name, attrs) ──► validate ──► register node ──► ResourceRef
//!        │                                                          │
//!   mint(type, name, field)  ◄──── only registered targets ─────────┘
//!        │
//!   export / remote(manifest, output)
//!        │
//!        ▼
//!   close() ──► Document
//! ```
//!
//! Declarations are append-only. A failed declaration leaves the template
//! exactly as it was before the call.
//!
//! Another template's values are never reachable through a live
//! [`Reference`]. A template reads them through [`Template::remote`],
//! which goes through the producing template's [`ExportManifest`] and a
//! `terraform_remote_state` data block.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use tracing::{debug, info, warn};

use crate::config::SynthConfig;
use crate::document::Document;
use crate::error::{Result, SynthError};
use crate::facade::ResourceRef;
use crate::formats;
use crate::namespace::Backend;
use crate::provider::{self, ProviderBinding};
use crate::reference::{BlockKind, Reference};
use crate::resource::{ResourceNode, ResourceType};
use crate::synth::{self, Synthesizer};
use crate::value::{AttributeMap, Value};
use crate::version::VersionConstraint;

const REMOTE_STATE: &str = "terraform_remote_state";
const REMOTE_OUTPUTS: &str = "outputs";

/// How `mint` treats fields a resource type does not expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferencePolicy {
    /// Unknown fields are `UnknownOutput`
    #[default]
    Strict,
    /// Unknown fields are minted with a warning
    Permissive,
}

/// A named output of a template
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub value: Value,
    pub description: Option<String>,
    pub sensitive: bool,
}

impl Export {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            description: None,
            sensitive: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// What one template makes available to others
#[derive(Debug, Clone, PartialEq)]
pub struct ExportManifest {
    scope: String,
    outputs: Vec<String>,
    backend: Option<Backend>,
}

impl ExportManifest {
    /// Manifest for a scope synthesized elsewhere
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            outputs: Vec::new(),
            backend: None,
        }
    }

    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(name.into());
        self
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn exports(&self, output: &str) -> bool {
        self.outputs.iter().any(|o| o == output)
    }

    pub fn state_backend(&self) -> Option<&Backend> {
        self.backend.as_ref()
    }

    /// `{ backend, config }` body of the remote-state data block
    fn remote_state_body(&self) -> JsonValue {
        match &self.backend {
            Some(backend) => json!({
                "backend": backend.kind,
                "config": JsonValue::Object(synth::render_map(&backend.config)),
            }),
            None => json!({
                "backend": "local",
                "config": { "path": format!("../{}/terraform.tfstate", self.scope) },
            }),
        }
    }
}

type NodeKey = (BlockKind, String, String);

/// An open declaration scope
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    providers: Vec<ProviderBinding>,
    backend: Option<Backend>,
    required_version: Option<VersionConstraint>,
    base_tags: AttributeMap,
    policy: ReferencePolicy,
    nodes: IndexMap<NodeKey, ResourceNode>,
    exports: IndexMap<String, Export>,
    remote_states: IndexMap<String, ExportManifest>,
}

impl Template {
    // ========================================================================
    // Opening
    // ========================================================================

    /// Open a scope with its provider bindings
    pub fn open(name: impl Into<String>, providers: Vec<ProviderBinding>) -> Result<Self> {
        let name = name.into();
        formats::require_identifier("template", &name)?;
        provider::check_bindings(&providers)?;

        debug!(template = %name, providers = providers.len(), "opened template");
        Ok(Self {
            name,
            providers,
            backend: None,
            required_version: None,
            base_tags: AttributeMap::new(),
            policy: ReferencePolicy::default(),
            nodes: IndexMap::new(),
            exports: IndexMap::new(),
            remote_states: IndexMap::new(),
        })
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Engine version constraint, e.g. `>= 1.5.0`
    pub fn with_required_version(mut self, constraint: &str) -> Result<Self> {
        self.required_version = Some(VersionConstraint::parse(constraint)?);
        Ok(self)
    }

    /// Tags merged under every accumulating map field. Later calls
    /// overwrite earlier keys.
    pub fn with_base_tags<I, K, V>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in tags {
            self.base_tags.insert(key.into(), value.into());
        }
        self
    }

    pub fn with_reference_policy(mut self, policy: ReferencePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Apply the reference policy and base tags from loaded configuration.
    /// Tags already set on the template take precedence.
    pub fn configure(mut self, config: &SynthConfig) -> Self {
        self.policy = config.references.policy;
        let configured: AttributeMap = config
            .tags
            .base
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect();
        self.base_tags = synth::merge_maps([&configured, &self.base_tags]);
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn providers(&self) -> &[ProviderBinding] {
        &self.providers
    }

    pub fn backend(&self) -> Option<&Backend> {
        self.backend.as_ref()
    }

    pub fn required_version(&self) -> Option<&VersionConstraint> {
        self.required_version.as_ref()
    }

    pub fn base_tags(&self) -> &AttributeMap {
        &self.base_tags
    }

    pub fn reference_policy(&self) -> ReferencePolicy {
        self.policy
    }

    /// Declared nodes in declaration order
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    pub fn get(&self, resource_type: &str, name: &str) -> Option<&ResourceNode> {
        self.node(BlockKind::Resource, resource_type, name)
    }

    pub fn get_data(&self, resource_type: &str, name: &str) -> Option<&ResourceNode> {
        self.node(BlockKind::Data, resource_type, name)
    }

    pub fn exports(&self) -> impl Iterator<Item = (&str, &Export)> {
        self.exports.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of declared nodes (resources and data sources)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, kind: BlockKind, resource_type: &str, name: &str) -> Option<&ResourceNode> {
        self.nodes
            .get(&(kind, resource_type.to_string(), name.to_string()))
    }

    // ========================================================================
    // Declaring
    // ========================================================================

    /// Declare a resource or data source using its provider's default binding
    pub fn declare(
        &mut self,
        resource_type: &Arc<ResourceType>,
        name: &str,
        raw: impl Into<Value>,
    ) -> Result<ResourceRef> {
        self.register(resource_type, name, None, raw.into())
    }

    /// Declare against an aliased provider binding
    pub fn declare_with_provider(
        &mut self,
        resource_type: &Arc<ResourceType>,
        name: &str,
        alias: &str,
        raw: impl Into<Value>,
    ) -> Result<ResourceRef> {
        self.register(resource_type, name, Some(alias), raw.into())
    }

    fn register(
        &mut self,
        resource_type: &Arc<ResourceType>,
        name: &str,
        alias: Option<&str>,
        raw: Value,
    ) -> Result<ResourceRef> {
        let kind = resource_type.kind();
        formats::require_identifier(kind.section(), name)?;

        let key = (kind, resource_type.name().to_string(), name.to_string());
        let shadows_remote_state =
            kind == BlockKind::Data && resource_type.name() == REMOTE_STATE && self.remote_states.contains_key(name);
        if self.nodes.contains_key(&key) || shadows_remote_state {
            return Err(SynthError::DuplicateDeclaration {
                scope: self.name.clone(),
                resource_type: qualified_type(kind, resource_type.name()),
                name: name.to_string(),
            });
        }

        if let Some(alias) = alias {
            let provider_kind = resource_type.provider_kind();
            let bound = self
                .providers
                .iter()
                .any(|p| p.kind == provider_kind && p.alias.as_deref() == Some(alias));
            if !bound {
                return Err(SynthError::UnknownProvider {
                    kind: provider_kind.to_string(),
                    alias: alias.to_string(),
                });
            }
        }

        let attributes = resource_type.validate(&raw)?;
        for (_, value) in attributes.iter() {
            self.check_visible(value)?;
        }

        let node = ResourceNode::new(
            Arc::clone(resource_type),
            name,
            attributes,
            alias.map(String::from),
        );
        let handle = ResourceRef::from_node(&node);
        self.nodes.insert(key, node);

        debug!(
            template = %self.name,
            address = %handle.address(),
            provider = alias.unwrap_or("default"),
            "declared"
        );
        Ok(handle)
    }

    /// Every reference inside a declaration must target this template
    fn check_visible(&self, value: &Value) -> Result<()> {
        match value {
            Value::Ref(reference) => {
                let visible = match (reference.kind(), reference.resource_type()) {
                    (BlockKind::Data, REMOTE_STATE) => self.remote_states.contains_key(reference.name()),
                    (kind, resource_type) => self.node(kind, resource_type, reference.name()).is_some(),
                };
                if visible {
                    Ok(())
                } else {
                    Err(SynthError::UnknownReferenceTarget {
                        scope: self.name.clone(),
                        resource_type: qualified_type(reference.kind(), reference.resource_type()),
                        name: reference.name().to_string(),
                        field: reference.field().to_string(),
                    })
                }
            }
            Value::List(items) => items.iter().try_for_each(|v| self.check_visible(v)),
            Value::Map(map) => map.values().try_for_each(|v| self.check_visible(v)),
            _ => Ok(()),
        }
    }

    // ========================================================================
    // References
    // ========================================================================

    /// Reference to an output of a declared resource
    pub fn mint(&self, resource_type: &str, name: &str, field: &str) -> Result<Reference> {
        self.mint_in(BlockKind::Resource, resource_type, name, field)
    }

    /// Reference to an attribute of a declared data source
    pub fn mint_data(&self, resource_type: &str, name: &str, field: &str) -> Result<Reference> {
        self.mint_in(BlockKind::Data, resource_type, name, field)
    }

    fn mint_in(&self, kind: BlockKind, resource_type: &str, name: &str, field: &str) -> Result<Reference> {
        let node = self
            .node(kind, resource_type, name)
            .ok_or_else(|| SynthError::UnknownReferenceTarget {
                scope: self.name.clone(),
                resource_type: qualified_type(kind, resource_type),
                name: name.to_string(),
                field: field.to_string(),
            })?;

        if !node.resource_type().exposes(field) {
            match self.policy {
                ReferencePolicy::Strict => {
                    return Err(SynthError::UnknownOutput {
                        resource_type: qualified_type(kind, resource_type),
                        name: name.to_string(),
                        field: field.to_string(),
                    });
                }
                ReferencePolicy::Permissive => {
                    warn!(
                        template = %self.name,
                        resource_type,
                        name,
                        field,
                        "minting reference to an undeclared output"
                    );
                }
            }
        }

        let reference = Reference::new(kind, resource_type, name, field);
        debug!(template = %self.name, reference = %reference, "minted");
        Ok(reference)
    }

    // ========================================================================
    // Exports and remote lookups
    // ========================================================================

    /// Export a value under `name`
    pub fn export(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.export_output(name, Export::new(value))
    }

    /// Export with a description or the sensitive flag
    pub fn export_output(&mut self, name: &str, export: Export) -> Result<()> {
        formats::require_identifier("output", name)?;
        if self.exports.contains_key(name) {
            return Err(SynthError::DuplicateDeclaration {
                scope: self.name.clone(),
                resource_type: "output".to_string(),
                name: name.to_string(),
            });
        }
        self.check_visible(&export.value)?;

        debug!(template = %self.name, output = name, "exported");
        self.exports.insert(name.to_string(), export);
        Ok(())
    }

    /// Snapshot of this template's exports and state location
    pub fn manifest(&self) -> ExportManifest {
        ExportManifest {
            scope: self.name.clone(),
            outputs: self.exports.keys().cloned().collect(),
            backend: self.backend.clone(),
        }
    }

    /// Read an exported value of another template through its applied state.
    ///
    /// A later manifest for an already looked-up scope replaces the earlier
    /// one as long as both name the same backend; a different backend is a
    /// `DuplicateDeclaration` of the remote-state block.
    pub fn remote(&mut self, manifest: &ExportManifest, output: &str) -> Result<Reference> {
        if manifest.scope == self.name || !manifest.exports(output) {
            return Err(SynthError::UnsupportedDestination {
                scope: manifest.scope.clone(),
                output: output.to_string(),
            });
        }
        let key = (BlockKind::Data, REMOTE_STATE.to_string(), manifest.scope.clone());
        if self.nodes.contains_key(&key) {
            return Err(SynthError::DuplicateDeclaration {
                scope: self.name.clone(),
                resource_type: qualified_type(BlockKind::Data, REMOTE_STATE),
                name: manifest.scope.clone(),
            });
        }

        match self.remote_states.get_mut(&manifest.scope) {
            Some(known) if known.backend != manifest.backend => {
                return Err(SynthError::DuplicateDeclaration {
                    scope: self.name.clone(),
                    resource_type: qualified_type(BlockKind::Data, REMOTE_STATE),
                    name: manifest.scope.clone(),
                });
            }
            Some(known) => *known = manifest.clone(),
            None => {
                self.remote_states.insert(manifest.scope.clone(), manifest.clone());
            }
        }

        let reference =
            Reference::new(BlockKind::Data, REMOTE_STATE, manifest.scope.as_str(), REMOTE_OUTPUTS).nested(output);
        debug!(template = %self.name, reference = %reference, "remote lookup");
        Ok(reference)
    }

    // ========================================================================
    // Closing
    // ========================================================================

    /// Synthesize the document for this template. Closing does not consume
    /// or modify the template.
    pub fn close(&self) -> Document {
        let mut doc = Document::new(&self.name);

        if let Some(version) = &self.required_version {
            doc.set_setting("required_version", JsonValue::String(version.as_str().to_string()));
        }
        let required = self.required_providers();
        if !required.is_empty() {
            doc.set_setting("required_providers", JsonValue::Object(required));
        }
        if let Some(backend) = &self.backend {
            let mut body = Map::new();
            body.insert(backend.kind.clone(), JsonValue::Object(synth::render_map(&backend.config)));
            doc.set_setting("backend", JsonValue::Object(body));
        }

        for binding in &self.providers {
            let mut body = synth::render_map(&binding.config);
            if let Some(alias) = &binding.alias {
                body.insert("alias".to_string(), JsonValue::String(alias.clone()));
            }
            doc.push_provider(&binding.kind, JsonValue::Object(body));
        }

        for (scope, manifest) in &self.remote_states {
            doc.insert_block(BlockKind::Data, REMOTE_STATE, scope, manifest.remote_state_body());
        }

        let synthesizer = Synthesizer::new(&self.base_tags);
        for node in self.nodes.values() {
            doc.insert_block(node.kind(), node.type_name(), node.name(), synthesizer.synthesize(node));
        }

        for (name, export) in &self.exports {
            let mut body = Map::new();
            body.insert("value".to_string(), synth::render(&export.value));
            if let Some(description) = &export.description {
                body.insert("description".to_string(), JsonValue::String(description.clone()));
            }
            if export.sensitive {
                body.insert("sensitive".to_string(), JsonValue::Bool(true));
            }
            doc.insert_output(name, JsonValue::Object(body));
        }

        info!(
            template = %self.name,
            resources = doc.len(),
            outputs = self.exports.len(),
            "closed template"
        );
        doc
    }

    /// `{ kind: { source, version } }` for bindings that pin either
    fn required_providers(&self) -> Map<String, JsonValue> {
        let mut pinned: IndexMap<&str, Map<String, JsonValue>> = IndexMap::new();
        for binding in &self.providers {
            if binding.source.is_none() && binding.version.is_none() {
                continue;
            }
            let entry = pinned.entry(binding.kind.as_str()).or_default();
            if let Some(source) = &binding.source {
                entry
                    .entry("source")
                    .or_insert_with(|| JsonValue::String(source.clone()));
            }
            if let Some(version) = &binding.version {
                entry
                    .entry("version")
                    .or_insert_with(|| JsonValue::String(version.as_str().to_string()));
            }
        }
        pinned
            .into_iter()
            .map(|(kind, body)| (kind.to_string(), JsonValue::Object(body)))
            .collect()
    }
}

fn qualified_type(kind: BlockKind, resource_type: &str) -> String {
    match kind {
        BlockKind::Resource => resource_type.to_string(),
        BlockKind::Data => format!("data.{}", resource_type),
    }
}
