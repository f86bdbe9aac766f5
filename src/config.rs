//! Engine settings
//!
//! Supports loading settings from:
//! - Default values
//! - Settings file (router-schema.toml)
//! - Environment variables (ROUTER_SCHEMA__*)
//!
//! ## Example settings file (router-schema.toml):
//! ```toml
//! [schema]
//! path = "./qdrouterd.json"
//!
//! [deprecation]
//! enabled = true
//! fix_fanout_lookup = false
//!
//! [parser]
//! profile_type = "sslProfile"
//! profile_reference = "sslProfile"
//!
//! [logging]
//! filter = "warn"
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

/// Main settings for the schema engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Schema source settings
    #[serde(default)]
    pub schema: SchemaSourceConfig,

    /// Deprecation rewrite settings
    #[serde(default)]
    pub deprecation: DeprecationConfig,

    /// Parser settings
    #[serde(default)]
    pub parser: ParserConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the schema declaration comes from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaSourceConfig {
    /// Path to the JSON schema declaration
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Deprecation rewrite settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeprecationConfig {
    /// Run rewrites at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Read `fixedAddress` fanout from `fanout` rather than the historical
    /// `faddr_attrs` key. Changes which addresses become multicast.
    #[serde(default)]
    pub fix_fanout_lookup: bool,
}

/// Parser settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Section type holding reusable profiles
    #[serde(default = "default_profile")]
    pub profile_type: String,

    /// Attribute by which other sections reference a profile
    #[serde(default = "default_profile")]
    pub profile_reference: String,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive, overridden by RUST_LOG
    #[serde(default = "default_filter")]
    pub filter: String,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_profile() -> String {
    "sslProfile".to_string()
}

fn default_filter() -> String {
    "warn".to_string()
}

impl Default for DeprecationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fix_fanout_lookup: false,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            profile_type: default_profile(),
            profile_reference: default_profile(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl Settings {
    /// Load settings from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = [
            "router-schema.toml",
            ".router-schema.toml",
            "config/router-schema.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "router", "router-schema") {
            let xdg_config = config_dir.config_dir().join("router-schema.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (ROUTER_SCHEMA__*)
        builder = builder.add_source(
            Environment::with_prefix("ROUTER_SCHEMA")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save settings to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Schema path, resolved against the working directory
    pub fn schema_path(&self) -> Option<PathBuf> {
        self.schema.path.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                std::env::current_dir().unwrap_or_default().join(p)
            }
        })
    }
}
