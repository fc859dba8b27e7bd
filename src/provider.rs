//! Provider bindings
//!
//! A binding attaches provider configuration (region, account role, ...)
//! to a template. Each kind has at most one default (un-aliased) binding;
//! additional bindings of the same kind must carry distinct aliases and are
//! selected per declaration for multi-region or multi-account templates.

use crate::error::{Result, SynthError};
use crate::formats;
use crate::value::{AttributeMap, Value};
use crate::version::VersionConstraint;

/// Provider configuration bound to a template
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderBinding {
    pub kind: String,
    pub config: AttributeMap,
    pub alias: Option<String>,
    /// Registry source address (`hashicorp/aws`)
    pub source: Option<String>,
    pub version: Option<VersionConstraint>,
}

impl ProviderBinding {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            config: AttributeMap::new(),
            alias: None,
            source: None,
            version: None,
        }
    }

    pub fn config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach a version constraint, failing on malformed syntax
    pub fn version(mut self, constraint: &str) -> Result<Self> {
        self.version = Some(VersionConstraint::parse(constraint)?);
        Ok(self)
    }

    /// `kind` or `kind.alias`, the form used by the `provider` meta-argument
    pub fn address(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{}.{}", self.kind, alias),
            None => self.kind.clone(),
        }
    }
}

/// Check a set of bindings for a template
pub(crate) fn check_bindings(bindings: &[ProviderBinding]) -> Result<()> {
    for (i, binding) in bindings.iter().enumerate() {
        if !formats::is_identifier(&binding.kind) {
            return Err(SynthError::InvalidProviderBinding(format!(
                "provider kind '{}' is not an identifier",
                binding.kind
            )));
        }
        if let Some(alias) = &binding.alias {
            if !formats::is_identifier(alias) {
                return Err(SynthError::InvalidProviderBinding(format!(
                    "alias '{}' for provider '{}' is not an identifier",
                    alias, binding.kind
                )));
            }
        }
        if binding.config.contains_key("alias") {
            return Err(SynthError::InvalidProviderBinding(format!(
                "provider '{}' sets 'alias' in its config; use ProviderBinding::alias",
                binding.kind
            )));
        }
        let clash = bindings[..i]
            .iter()
            .any(|other| other.kind == binding.kind && other.alias == binding.alias);
        if clash {
            return Err(SynthError::InvalidProviderBinding(match &binding.alias {
                Some(alias) => format!("provider '{}' alias '{}' bound twice", binding.kind, alias),
                None => format!("provider '{}' has more than one default binding", binding.kind),
            }));
        }
        let version_conflict = bindings[..i].iter().any(|other| {
            other.kind == binding.kind
                && other.version.is_some()
                && binding.version.is_some()
                && other.version != binding.version
        });
        if version_conflict {
            return Err(SynthError::InvalidProviderBinding(format!(
                "provider '{}' bound with conflicting version constraints",
                binding.kind
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address() {
        assert_eq!(ProviderBinding::new("aws").address(), "aws");
        assert_eq!(ProviderBinding::new("aws").alias("west").address(), "aws.west");
    }

    #[test]
    fn test_default_and_aliases_allowed() {
        let bindings = vec![
            ProviderBinding::new("aws").config("region", "us-east-1"),
            ProviderBinding::new("aws").alias("west").config("region", "us-west-2"),
            ProviderBinding::new("random"),
        ];
        assert!(check_bindings(&bindings).is_ok());
    }

    #[test]
    fn test_two_defaults_rejected() {
        let bindings = vec![ProviderBinding::new("aws"), ProviderBinding::new("aws")];
        assert!(matches!(
            check_bindings(&bindings),
            Err(SynthError::InvalidProviderBinding(_))
        ));
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let bindings = vec![
            ProviderBinding::new("aws").alias("west"),
            ProviderBinding::new("aws").alias("west"),
        ];
        assert!(check_bindings(&bindings).is_err());
    }

    #[test]
    fn test_conflicting_versions_rejected() {
        let bindings = vec![
            ProviderBinding::new("aws").version("~> 5.0").unwrap(),
            ProviderBinding::new("aws").alias("west").version("~> 4.0").unwrap(),
        ];
        assert!(check_bindings(&bindings).is_err());
    }
}
