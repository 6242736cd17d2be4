//! Config Command
//!
//! Manage reqforge configuration.
//!
//! Usage:
//!   reqforge config show [-f toml|json|yaml]
//!   reqforge config path
//!   reqforge config init [-g] [--force]

use crate::cli::ui::Output;
use crate::config::{ConfigFormat, ConfigLoader};
use crate::types::{ForgeError, Result};

/// Show the merged effective configuration
pub fn show(format: &str) -> Result<()> {
    let format: ConfigFormat = format.parse().map_err(ForgeError::Config)?;
    let config = ConfigLoader::load()?;
    println!("{}", ConfigLoader::render(&config, format)?);
    Ok(())
}

/// Show configuration file paths
pub fn path() -> Result<()> {
    let out = Output::new();
    out.section("Configuration files");
    for (scope, location) in ConfigLoader::describe_paths() {
        println!("  {:<8} {}", scope, location);
    }
    Ok(())
}

/// Initialize global configuration
pub fn init_global(force: bool) -> Result<()> {
    let dir = ConfigLoader::init_global(force)?;
    let out = Output::new();
    out.success("Initialized global configuration");
    println!("  Directory: {}", dir.display());
    if let Some(config_path) = ConfigLoader::global_config_path() {
        println!("  Config:    {}", config_path.display());
    }
    Ok(())
}

/// Initialize project configuration
pub fn init_project(force: bool) -> Result<()> {
    let dir = ConfigLoader::init_project(force)?;
    let out = Output::new();
    out.success("Initialized project configuration");
    println!("  Directory: {}", dir.display());
    println!(
        "  Config:    {}",
        ConfigLoader::project_config_path().display()
    );
    Ok(())
}
