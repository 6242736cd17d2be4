//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/reqforge/config.toml)
//! 3. Project config (.reqforge/config.toml)
//! 4. Environment variables (REQFORGE_* prefix)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{ForgeError, Result};

/// Output format for `config show`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
    Yaml,
}

impl std::str::FromStr for ConfigFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "toml" | "text" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            "yaml" => Ok(Self::Yaml),
            _ => Err(format!(
                "Unknown config format: {}. Valid values: toml, json, yaml",
                s
            )),
        }
    }
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        Self::finish(figment)
    }

    /// Load configuration from a specific file plus environment overrides
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path));
        Self::finish(figment)
    }

    fn finish(figment: Figment) -> Result<Config> {
        // Only the first '_' separates section from key:
        // REQFORGE_LLM_TIMEOUT_SECS -> llm.timeout_secs
        let config: Config = figment
            .merge(
                Env::prefixed("REQFORGE_")
                    .map(|key| key.as_str().replacen('_', ".", 1).into())
                    .lowercase(true),
            )
            .extract()
            .map_err(|e| ForgeError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/reqforge/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("reqforge"))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    /// Get project data directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".reqforge")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Render config file locations with an existence marker
    pub fn describe_paths() -> Vec<(String, String)> {
        let mark = |p: &Path| if p.exists() { "✓" } else { "✗" };

        let mut lines = Vec::new();
        match Self::global_config_path() {
            Some(global) => lines.push((
                "Global".to_string(),
                format!("{} {}", mark(&global), global.display()),
            )),
            None => lines.push(("Global".to_string(), "(not available)".to_string())),
        }

        let project = Self::project_config_path();
        lines.push((
            "Project".to_string(),
            format!("{} {}", mark(&project), project.display()),
        ));
        lines
    }

    /// Render the effective configuration
    pub fn render(config: &Config, format: ConfigFormat) -> Result<String> {
        match format {
            ConfigFormat::Json => Ok(serde_json::to_string_pretty(config)?),
            ConfigFormat::Yaml => Ok(serde_yaml::to_string(config)?),
            ConfigFormat::Toml => {
                toml::to_string_pretty(config).map_err(|e| ForgeError::Config(e.to_string()))
            }
        }
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            ForgeError::Config("Cannot determine global config directory".to_string())
        })?;
        Self::write_default(&global_dir, force)?;
        Ok(global_dir)
    }

    /// Initialize project configuration
    pub fn init_project(force: bool) -> Result<PathBuf> {
        let project_dir = Self::project_dir();
        Self::write_default(&project_dir, force)?;
        Ok(project_dir)
    }

    fn write_default(dir: &Path, force: bool) -> Result<()> {
        fs::create_dir_all(dir)?;

        let config_path = dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_config_toml())?;
            info!("Created config: {}", config_path.display());
        } else {
            info!("Config exists: {}", config_path.display());
        }
        Ok(())
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Default config content (TOML)
    fn default_config_toml() -> String {
        let defaults = Config::default();
        format!(
            r#"# ReqForge Configuration
# Project settings in .reqforge/config.toml override global ones.
# Environment variables use the REQFORGE_<SECTION>_<KEY> form, e.g. REQFORGE_LLM_MODEL.

version = "1.0"

[llm]
provider = "{}"
model = "{}"
timeout_secs = {}
temperature = {:.1}
validation_temperature = {:.1}
max_retries = {}
# api_key = "..."   # or GROQ_API_KEY / OPENAI_API_KEY

[pipeline]
output_dir = "{}"
max_regenerations = {}
run_timeout_secs = {}
concurrent_extraction = false
"#,
            defaults.llm.provider,
            defaults.llm.model,
            defaults.llm.timeout_secs,
            defaults.llm.temperature,
            defaults.llm.validation_temperature,
            defaults.llm.max_retries,
            defaults.pipeline.output_dir.display(),
            defaults.pipeline.max_regenerations,
            defaults.pipeline.run_timeout_secs,
        )
    }
}
