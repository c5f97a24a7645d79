//! Configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.switchyard/` by default)
//! or an explicit path, and deserializes it into [`SwitchyardConfig`]. Falls
//! back to defaults when the file is missing or malformed.

use std::path::{Path, PathBuf};

use switchyard_types::config::SwitchyardConfig;

pub const CONFIG_FILE: &str = "config.toml";

/// Resolve the data directory.
///
/// Priority:
/// 1. `SWITCHYARD_DATA_DIR` environment variable
/// 2. `~/.switchyard`
/// 3. `./.switchyard`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SWITCHYARD_DATA_DIR") {
        return PathBuf::from(dir);
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".switchyard");
    }
    PathBuf::from(".switchyard")
}

/// Load configuration from `path`, or from `{data_dir}/config.toml`.
///
/// - Missing file: [`SwitchyardConfig::default()`].
/// - Unreadable or unparsable file: warning, then the default.
pub async fn load_config(path: Option<&Path>) -> SwitchyardConfig {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => resolve_data_dir().join(CONFIG_FILE),
    };

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", config_path.display());
            return SwitchyardConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return SwitchyardConfig::default();
        }
    };

    match toml::from_str::<SwitchyardConfig>(&content) {
        Ok(config) => {
            tracing::debug!(
                path = %config_path.display(),
                backends = config.backends.len(),
                "Loaded config"
            );
            config
        }
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", config_path.display());
            SwitchyardConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(Some(&tmp.path().join(CONFIG_FILE))).await;
        assert_eq!(config.budget.max_tokens_per_hour, 100_000);
        assert!(config.backends.is_empty());
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(CONFIG_FILE);
        tokio::fs::write(
            &config_path,
            r#"
[budget]
max_cost_per_hour = 0.5

[conversation]
max_messages = 6
summarize = true

[[backends]]
name = "deepseek"
provider_type = "openai_compatible"
api_key_env = "DEEPSEEK_API_KEY"
model = "deepseek-chat"
"#,
        )
        .await
        .unwrap();

        let config = load_config(Some(&config_path)).await;
        assert!((config.budget.max_cost_per_hour - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.conversation.max_messages, 6);
        assert!(config.conversation.summarize);
        assert_eq!(config.backends[0].name, "deepseek");
        assert_eq!(config.backends[0].priority, 0);
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(CONFIG_FILE);
        tokio::fs::write(&config_path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(Some(&config_path)).await;
        assert_eq!(config.cache.max_entries, 1000);
        assert!(config.backends.is_empty());
    }

    #[tokio::test]
    async fn load_config_wrong_types_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(CONFIG_FILE);
        tokio::fs::write(&config_path, "[budget]\nmax_tokens_per_hour = \"lots\"\n")
            .await
            .unwrap();

        let config = load_config(Some(&config_path)).await;
        assert_eq!(config.budget.max_tokens_per_hour, 100_000);
    }
}
