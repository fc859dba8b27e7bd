//! Configuration for document synthesis
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (synth.toml)
//! - Environment variables (INFRA_SYNTH__*)
//!
//! ## Example config file (synth.toml):
//! ```toml
//! [output]
//! directory = "out"
//! format = "pretty"
//! file_name = "main.tf.json"
//! include_checksum = true
//!
//! [references]
//! policy = "strict"
//!
//! [tags]
//! ManagedBy = "infra-synth"
//! Team = "platform"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::template::ReferencePolicy;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthConfig {
    /// Document output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Reference minting settings
    #[serde(default)]
    pub references: ReferenceConfig,

    /// Base tags applied to every accumulating tag map
    #[serde(default)]
    pub tags: TagsConfig,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory documents are written under, one subdirectory per scope
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,

    /// Output format (pretty or compact)
    #[serde(default)]
    pub format: OutputFormat,

    /// Document file name inside each scope directory
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Write a `.sha256` sidecar next to each document
    #[serde(default = "default_true")]
    pub include_checksum: bool,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

/// Reference configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// strict or permissive
    #[serde(default)]
    pub policy: ReferencePolicy,
}

/// Base tags
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagsConfig {
    #[serde(flatten)]
    pub base: BTreeMap<String, String>,
}

// Default value functions
fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

fn default_file_name() -> String {
    "main.tf.json".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            format: OutputFormat::Pretty,
            file_name: default_file_name(),
            include_checksum: true,
        }
    }
}

impl SynthConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        let mut files = Vec::new();

        // Load from default locations
        let config_locations = ["synth.toml", ".synth.toml", "config/synth.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
            files.push(PathBuf::from(location));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "infra-synth") {
            let xdg_config = config_dir.config_dir().join("synth.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config.clone()).required(false));
                files.push(xdg_config);
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
            let explicit = PathBuf::from(path);
            if explicit.exists() {
                files.push(explicit);
            } else {
                files.push(PathBuf::from(format!("{}.toml", path)));
            }
        }

        // Load from environment variables (INFRA_SYNTH__OUTPUT__FORMAT=compact)
        builder = builder.add_source(
            Environment::with_prefix("INFRA_SYNTH")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut loaded: SynthConfig = config.try_deserialize()?;
        loaded.tags.base = case_preserved_tags(&files, &loaded.tags.base)?;
        Ok(loaded)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Get the output directory (resolves relative paths)
    pub fn output_dir(&self) -> PathBuf {
        if self.output.directory.is_absolute() {
            self.output.directory.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.output.directory)
        }
    }
}

/// Tag keys as written in the config files.
///
/// The layered loader lowercases every key, so `[tags]` is read again from
/// each file in precedence order. Keys only known to the loader (set through
/// `INFRA_SYNTH__TAGS__*`) keep their lowercased form; a value from the
/// loader overrides the file value of the same key.
fn case_preserved_tags(
    files: &[PathBuf],
    loaded: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, ConfigError> {
    #[derive(Deserialize)]
    struct TagsTable {
        #[serde(default)]
        tags: BTreeMap<String, String>,
    }

    let mut tags = BTreeMap::new();
    for path in files.iter().filter(|p| p.is_file()) {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Message(format!("{}: {}", path.display(), e)))?;
        let table: TagsTable = toml::from_str(&content)
            .map_err(|e| ConfigError::Message(format!("{}: {}", path.display(), e)))?;
        tags.extend(table.tags);
    }

    for (key, value) in loaded {
        let written = tags
            .keys()
            .find(|k| k.to_lowercase() == *key)
            .cloned()
            .unwrap_or_else(|| key.clone());
        tags.insert(written, value.clone());
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = SynthConfig::default();
        assert_eq!(config.output.file_name, "main.tf.json");
        assert_eq!(config.output.format, OutputFormat::Pretty);
        assert!(config.output.include_checksum);
        assert_eq!(config.references.policy, ReferencePolicy::Strict);
        assert!(config.tags.base.is_empty());
    }

    #[test]
    fn test_serialize_config() {
        let config = SynthConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[output]"));
        assert!(toml_str.contains("[references]"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
[output]
format = "compact"
include_checksum = false

[references]
policy = "permissive"

[tags]
Team = "platform"
"#,
        )
        .unwrap();

        let config = SynthConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.output.format, OutputFormat::Compact);
        assert!(!config.output.include_checksum);
        assert_eq!(config.output.file_name, "main.tf.json");
        assert_eq!(config.references.policy, ReferencePolicy::Permissive);
        assert_eq!(config.tags.base.get("Team").map(String::as_str), Some("platform"));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = SynthConfig::default();
        config.tags.base.insert("Env".to_string(), "dev".to_string());
        config.save(path.to_str().unwrap()).unwrap();

        let loaded = SynthConfig::load_from(path.to_str()).unwrap();
        assert_eq!(loaded.tags.base.get("Env").map(String::as_str), Some("dev"));
    }

    #[test]
    fn test_tag_keys_keep_their_case() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tags.toml");
        std::fs::write(
            &path,
            r#"
[tags]
ManagedBy = "infra-synth"
CostCenter = "42"
"#,
        )
        .unwrap();

        let config = SynthConfig::load_from(path.to_str()).unwrap();
        let keys: Vec<_> = config.tags.base.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["CostCenter", "ManagedBy"]);
        assert_eq!(config.tags.base["ManagedBy"], "infra-synth");
    }

    #[test]
    fn test_loader_value_overrides_file_tag() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("synth.toml");
        std::fs::write(&path, "[tags]\nManagedBy = \"infra-synth\"\n").unwrap();

        let mut loaded = BTreeMap::new();
        loaded.insert("managedby".to_string(), "ci".to_string());
        loaded.insert("owner".to_string(), "ops".to_string());

        let tags = case_preserved_tags(&[path], &loaded).unwrap();
        assert_eq!(tags.get("ManagedBy").map(String::as_str), Some("ci"));
        assert_eq!(tags.get("owner").map(String::as_str), Some("ops"));
        assert!(!tags.contains_key("managedby"));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        assert!(SynthConfig::load_from(Some("/nonexistent/synth.toml")).is_err());
    }
}
