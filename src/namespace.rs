//! Namespaces and state backends
//!
//! A namespace names where provisioning state lives. Every template opened
//! in a namespace gets its own backend location derived from the namespace
//! and template names, so templates applied independently never share
//! state:
//!
//! | backend | derived setting |
//! |---|---|
//! | `s3` | `key = "<namespace>/<template>/terraform.tfstate"` |
//! | `gcs` | `prefix = "<namespace>/<template>"` |
//! | `local` | `path = "<path>/<namespace>/<template>/terraform.tfstate"` |
//!
//! Other backend kinds are passed through unchanged.

use crate::error::Result;
use crate::formats;
use crate::provider::ProviderBinding;
use crate::template::Template;
use crate::value::{AttributeMap, Value};

const STATE_FILE: &str = "terraform.tfstate";

/// State backend configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Backend {
    pub kind: String,
    pub config: AttributeMap,
}

impl Backend {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            config: AttributeMap::new(),
        }
    }

    pub fn s3(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self::new("s3").config("bucket", bucket.into()).config("region", region.into())
    }

    pub fn gcs(bucket: impl Into<String>) -> Self {
        Self::new("gcs").config("bucket", bucket.into())
    }

    pub fn local(path: impl Into<String>) -> Self {
        Self::new("local").config("path", path.into())
    }

    pub fn config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Backend location for one template of a namespace
    pub fn for_template(&self, namespace: &str, template: &str) -> Backend {
        let mut derived = self.clone();
        match self.kind.as_str() {
            "s3" => {
                derived.config.insert(
                    "key".to_string(),
                    Value::from(format!("{}/{}/{}", namespace, template, STATE_FILE)),
                );
            }
            "gcs" => {
                derived
                    .config
                    .insert("prefix".to_string(), Value::from(format!("{}/{}", namespace, template)));
            }
            "local" => {
                let root = self.config.get("path").and_then(Value::as_str).unwrap_or("state");
                derived.config.insert(
                    "path".to_string(),
                    Value::from(format!("{}/{}/{}/{}", root, namespace, template, STATE_FILE)),
                );
            }
            _ => {}
        }
        derived
    }
}

/// Named state-backend scope that templates are opened in
#[derive(Debug, Clone, PartialEq)]
pub struct Namespace {
    name: String,
    backend: Backend,
}

impl Namespace {
    pub fn new(name: impl Into<String>, backend: Backend) -> Result<Self> {
        let name = name.into();
        formats::require_identifier("namespace", &name)?;
        Ok(Self { name, backend })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn backend_for(&self, template: &str) -> Backend {
        self.backend.for_template(&self.name, template)
    }

    /// Open a template whose state lives in this namespace
    pub fn open(&self, template: &str, providers: Vec<ProviderBinding>) -> Result<Template> {
        Ok(Template::open(template, providers)?.with_backend(self.backend_for(template)))
    }
}
