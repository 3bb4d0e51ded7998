//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Generate `SiteBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("site.toml")).unwrap();
//! println!("Site: {}", blueprint.site.id);
//! ```

mod parser;
mod validator;

pub use contracts::SiteBlueprint;
pub use parser::ConfigFormat;

use contracts::FusionError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<SiteBlueprint, FusionError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<SiteBlueprint, FusionError> {
        Self::parse_and_validate(content, format)
    }

    /// Serialize SiteBlueprint to TOML string
    pub fn to_toml(blueprint: &SiteBlueprint) -> Result<String, FusionError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| FusionError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize SiteBlueprint to JSON string
    pub fn to_json(blueprint: &SiteBlueprint) -> Result<String, FusionError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| FusionError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, FusionError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            FusionError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext)
            .ok_or_else(|| FusionError::config_parse(format!("unsupported config format: .{ext}")))
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, FusionError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<SiteBlueprint, FusionError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }
}
