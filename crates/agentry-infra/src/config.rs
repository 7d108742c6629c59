//! Global configuration loader for Agentry.
//!
//! Reads `config.toml` from the data directory (`~/.agentry/` in production)
//! and deserializes it into [`GlobalConfig`]. Falls back to sensible defaults
//! when the file is missing or malformed.

use std::path::{Path, PathBuf};

use agentry_types::config::GlobalConfig;

/// Database file name inside the data directory.
const DATABASE_FILE: &str = "agentry.db";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `AGENTRY_DATA_DIR` environment variable
/// 2. `~/.agentry`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AGENTRY_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".agentry");
    }

    // Last resort: current directory
    PathBuf::from(".agentry")
}

/// Load global configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`GlobalConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    }
}

/// SQLite URL for the configured storage.
///
/// An explicit `[storage] database_url` wins; otherwise the database lives at
/// `{data_dir}/agentry.db` and is created on first use.
pub fn resolve_database_url(config: &GlobalConfig, data_dir: &Path) -> String {
    match config.storage.database_url.as_deref() {
        Some(url) if !url.trim().is_empty() => url.to_string(),
        _ => format!("sqlite://{}?mode=rwc", data_dir.join(DATABASE_FILE).display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentry_types::config::StorageBackend;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_global_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.cache.max_size, 50);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    }

    #[tokio::test]
    async fn load_global_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        tokio::fs::write(
            &config_path,
            r#"
[cache]
max_size = 5
max_idle_secs = 120

[storage]
backend = "memory"

[engine]
model = "gpt-4o-mini"
"#,
        )
        .await
        .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.cache.max_size, 5);
        assert_eq!(config.cache.max_idle_secs, 120);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.engine.model, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn load_global_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        tokio::fs::write(&config_path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.cache.max_size, 50);
        assert_eq!(config.engine.model, "gpt-4o");
    }

    #[test]
    fn resolve_database_url_defaults_to_data_dir() {
        let config = GlobalConfig::default();
        let url = resolve_database_url(&config, Path::new("/var/lib/agentry"));
        assert_eq!(url, "sqlite:///var/lib/agentry/agentry.db?mode=rwc");
    }

    #[test]
    fn resolve_database_url_prefers_explicit_url() {
        let mut config = GlobalConfig::default();
        config.storage.database_url = Some("sqlite::memory:".to_string());
        assert_eq!(
            resolve_database_url(&config, Path::new("/unused")),
            "sqlite::memory:"
        );
    }

    #[test]
    fn resolve_data_dir_from_env() {
        // SAFETY: This test is the only one touching AGENTRY_DATA_DIR and restores it immediately.
        unsafe {
            std::env::set_var("AGENTRY_DATA_DIR", "/tmp/test-agentry");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-agentry"));
        unsafe {
            std::env::remove_var("AGENTRY_DATA_DIR");
        }
    }
}
