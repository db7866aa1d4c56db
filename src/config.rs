//! Configuration for the model builder and schema linter
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (models.toml)
//! - Environment variables (FAMILIAR_MODELS__*)
//!
//! ## Example config file (models.toml):
//! ```toml
//! [builder]
//! allow_undefined_array_items = false
//! allow_undefined_type = false
//! default_discriminator = "type"
//! default_model_name = "DynamicModel"
//!
//! [lint]
//! warn_unsupported_keywords = true
//! strict_formats = false
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Flags that change how schemas are compiled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Arrays without `items` resolve to lists of any
    #[serde(default)]
    pub allow_undefined_array_items: bool,

    /// Field schemas without type information resolve to any
    #[serde(default)]
    pub allow_undefined_type: bool,

    /// Discriminator field for oneOf when the node does not name one
    #[serde(default = "default_discriminator")]
    pub default_discriminator: String,

    /// Name for records without a `title`
    #[serde(default = "default_model_name")]
    pub default_model_name: String,
}

/// Schema linter settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintConfig {
    /// Warn on keywords the compiler accepts but does not enforce
    #[serde(default = "default_true")]
    pub warn_unsupported_keywords: bool,

    /// Treat unknown string formats as errors instead of warnings
    #[serde(default)]
    pub strict_formats: bool,
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default)]
    pub builder: BuildOptions,

    #[serde(default)]
    pub lint: LintConfig,
}

fn default_true() -> bool {
    true
}

fn default_discriminator() -> String {
    "type".to_string()
}

fn default_model_name() -> String {
    "DynamicModel".to_string()
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            allow_undefined_array_items: false,
            allow_undefined_type: false,
            default_discriminator: default_discriminator(),
            default_model_name: default_model_name(),
        }
    }
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            warn_unsupported_keywords: true,
            strict_formats: false,
        }
    }
}

impl BuildOptions {
    pub fn allow_undefined_array_items(mut self, allow: bool) -> Self {
        self.allow_undefined_array_items = allow;
        self
    }

    pub fn allow_undefined_type(mut self, allow: bool) -> Self {
        self.allow_undefined_type = allow;
        self
    }

    pub fn default_discriminator(mut self, name: impl Into<String>) -> Self {
        self.default_discriminator = name.into();
        self
    }
}

impl ModelsConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for location in ["models.toml", ".models.toml", "config/models.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("dev", "familiar", "models") {
            let xdg_config = dirs.config_dir().join("models.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("FAMILIAR_MODELS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let loaded: Self = config.try_deserialize()?;
        tracing::debug!(?loaded, "loaded models config");
        Ok(loaded)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ModelsConfig::default();
        assert!(!config.builder.allow_undefined_array_items);
        assert_eq!(config.builder.default_discriminator, "type");
        assert_eq!(config.builder.default_model_name, "DynamicModel");
        assert!(config.lint.warn_unsupported_keywords);
    }

    #[test]
    fn test_serialize_config() {
        let config = ModelsConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[builder]"));
        assert!(toml_str.contains("[lint]"));
    }

    #[test]
    fn test_save_and_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        let path_str = path.to_str().unwrap();

        let mut config = ModelsConfig::default();
        config.builder.allow_undefined_type = true;
        config.builder.default_discriminator = "kind".to_string();
        config.save(path_str).unwrap();

        let loaded = ModelsConfig::load_from(Some(path_str)).unwrap();
        assert!(loaded.builder.allow_undefined_type);
        assert_eq!(loaded.builder.default_discriminator, "kind");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[builder]\nallow_undefined_array_items = true\n").unwrap();

        let loaded = ModelsConfig::load_from(path.to_str()).unwrap();
        assert!(loaded.builder.allow_undefined_array_items);
        assert_eq!(loaded.builder.default_model_name, "DynamicModel");
        assert!(loaded.lint.warn_unsupported_keywords);
    }
}
