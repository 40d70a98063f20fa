//! Configuration loader for IdeaForge.
//!
//! Reads `config.toml` from the data directory (`~/.ideaforge/` in production)
//! and deserializes it into [`ForgeConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use ideaforge_types::config::ForgeConfig;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "IDEAFORGE_DATA_DIR";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `IDEAFORGE_DATA_DIR` environment variable
/// 2. `~/.ideaforge`
/// 3. `.ideaforge` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".ideaforge");
    }

    PathBuf::from(".ideaforge")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`ForgeConfig::default()`].
/// - Unreadable or unparseable file: logs a warning and returns the default.
/// - `retry.max_retries = 0` is raised to 1, since every invocation makes at
///   least one call.
pub async fn load_forge_config(data_dir: &Path) -> ForgeConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ForgeConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ForgeConfig::default();
        }
    };

    match toml::from_str::<ForgeConfig>(&content) {
        Ok(mut config) => {
            if config.retry.max_retries == 0 {
                tracing::warn!(
                    "{}: retry.max_retries must be at least 1, using 1",
                    config_path.display()
                );
                config.retry.max_retries = 1;
            }
            tracing::debug!(
                max_retries = config.retry.max_retries,
                delay_ms = config.retry.delay_ms,
                model = %config.models.default,
                "loaded {}",
                config_path.display()
            );
            config
        }
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ForgeConfig::default()
        }
    }
}
