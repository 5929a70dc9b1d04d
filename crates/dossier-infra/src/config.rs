//! Configuration loader for Dossier.
//!
//! Reads `config.toml` from the data directory (`~/.dossier/` in production)
//! and deserializes it into [`DossierConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use dossier_types::config::DossierConfig;
use dossier_types::error::ConfigError;

/// Resolve the data directory.
///
/// `DOSSIER_DATA_DIR` wins; otherwise `~/.dossier`, or `.dossier` in the
/// current directory when no home directory is known.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("DOSSIER_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".dossier");
    }

    PathBuf::from(".dossier")
}

/// Read and parse `{data_dir}/config.toml`.
///
/// Returns `Ok(None)` if the file does not exist.
pub async fn read_config(data_dir: &Path) -> Result<Option<DossierConfig>, ConfigError> {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(ConfigError::Read {
                path: config_path.display().to_string(),
                reason: err.to_string(),
            });
        }
    };

    toml::from_str::<DossierConfig>(&content)
        .map(Some)
        .map_err(|err| ConfigError::Parse {
            path: config_path.display().to_string(),
            reason: err.to_string(),
        })
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`DossierConfig::default()`].
/// - Unreadable or malformed file: logs a warning and returns the default.
/// - Otherwise: the parsed config, with an empty section list replaced by
///   the default sections.
pub async fn load_config(data_dir: &Path) -> DossierConfig {
    match read_config(data_dir).await {
        Ok(Some(mut config)) => {
            if config.sections.is_empty() {
                tracing::warn!("config.toml lists no sections, using the default questionnaire");
                config.sections = dossier_types::config::default_sections();
            }
            config
        }
        Ok(None) => {
            tracing::debug!("No config.toml found in {}, using defaults", data_dir.display());
            DossierConfig::default()
        }
        Err(err) => {
            tracing::warn!("{err}, using defaults");
            DossierConfig::default()
        }
    }
}
