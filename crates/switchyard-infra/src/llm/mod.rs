//! Backend adapters.
//!
//! Concrete [`LlmProvider`](switchyard_core::llm::provider::LlmProvider)
//! implementations plus the factory ([`create_provider`]) that builds the
//! right adapter from a [`BackendConfig`], and a connection probe
//! ([`test_provider_connection`]).

pub mod anthropic;
pub mod http;
pub mod local;
pub mod openai_compat;

use std::time::Duration;

use secrecy::SecretString;

use switchyard_core::llm::box_provider::BoxLlmProvider;
use switchyard_core::llm::registry::BackendSettings;
use switchyard_types::config::BackendConfig;
use switchyard_types::llm::{CompletionRequest, LlmError, Message, ProviderType};

use self::anthropic::AnthropicProvider;
use self::local::LocalProvider;
use self::openai_compat::OpenAiCompatibleProvider;

/// Read the API key from the environment variable a backend names.
///
/// `Ok(None)` when the backend names no variable. A named but unset or
/// empty variable is an authentication failure.
pub fn resolve_api_key(config: &BackendConfig) -> Result<Option<SecretString>, LlmError> {
    let Some(var) = config.api_key_env.as_deref() else {
        return Ok(None);
    };
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(Some(SecretString::from(value))),
        _ => {
            tracing::warn!(backend = %config.name, env = %var, "API key variable is not set");
            Err(LlmError::AuthenticationFailed)
        }
    }
}

/// Build a [`BoxLlmProvider`] for a configured backend.
///
/// The adapter is registered under `config.name`.
pub fn create_provider(config: &BackendConfig) -> Result<BoxLlmProvider, LlmError> {
    match config.provider_type {
        ProviderType::Anthropic => {
            let key = resolve_api_key(config)?.ok_or(LlmError::AuthenticationFailed)?;
            let mut provider =
                AnthropicProvider::new(key, config.model.clone())?.with_name(config.name.clone());
            if let Some(base_url) = config.base_url.as_deref() {
                provider = provider.with_base_url(base_url);
            }
            Ok(BoxLlmProvider::new(provider))
        }
        ProviderType::OpenAiCompatible => {
            let key = resolve_api_key(config)?;
            let mut oai_config = openai_compat::config::defaults_for(&config.name, key, &config.model);
            if let Some(base_url) = config.base_url.as_deref() {
                oai_config.base_url = base_url.to_string();
            }
            Ok(BoxLlmProvider::new(OpenAiCompatibleProvider::new(oai_config)?))
        }
        ProviderType::Local => Ok(BoxLlmProvider::new(LocalProvider::new(
            config.name.clone(),
            config.model.clone(),
        ))),
    }
}

/// Dispatch settings for a configured backend.
pub fn settings_for(config: &BackendConfig) -> BackendSettings {
    BackendSettings {
        priority: config.priority,
        timeout: config.timeout_ms.map(Duration::from_millis),
        model: Some(config.model.clone()).filter(|m| !m.is_empty()),
    }
}

/// Build every enabled backend, skipping (and logging) those that fail.
pub fn build_backends(configs: &[BackendConfig]) -> Vec<(BoxLlmProvider, BackendSettings)> {
    configs
        .iter()
        .filter(|c| {
            if !c.enabled {
                tracing::debug!(backend = %c.name, "Backend disabled in config");
            }
            c.enabled
        })
        .filter_map(|c| match create_provider(c) {
            Ok(provider) => Some((provider, settings_for(c))),
            Err(e) => {
                tracing::warn!(backend = %c.name, error = %e, "Skipping backend");
                None
            }
        })
        .collect()
}

/// Send a minimal completion to verify the key and endpoint.
pub async fn test_provider_connection(provider: &BoxLlmProvider) -> Result<(), LlmError> {
    let request = CompletionRequest {
        model: String::new(),
        messages: vec![Message::user("Hello")],
        system: None,
        max_tokens: 10,
        temperature: Some(0.0),
        stream: false,
        stop_sequences: None,
        tools: Vec::new(),
    };
    provider.complete(&request).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(name: &str, provider_type: ProviderType, key_env: Option<&str>) -> BackendConfig {
        BackendConfig {
            name: name.to_string(),
            provider_type,
            base_url: None,
            api_key_env: key_env.map(str::to_string),
            model: "m".to_string(),
            priority: 2,
            timeout_ms: Some(1500),
            enabled: true,
        }
    }

    #[test]
    fn test_local_backend_needs_no_key() {
        let provider = create_provider(&backend("offline", ProviderType::Local, None)).unwrap();
        assert_eq!(provider.name(), "offline");
    }

    #[test]
    fn test_keyless_openai_compatible_backend() {
        let provider =
            create_provider(&backend("ollama", ProviderType::OpenAiCompatible, None)).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn test_missing_key_variable_is_auth_failure() {
        let config = backend(
            "deepseek",
            ProviderType::OpenAiCompatible,
            Some("SWITCHYARD_TEST_UNSET_KEY_VAR"),
        );
        assert!(matches!(
            create_provider(&config),
            Err(LlmError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_anthropic_requires_key() {
        let config = backend("anthropic", ProviderType::Anthropic, None);
        assert!(matches!(
            create_provider(&config),
            Err(LlmError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_settings_for() {
        let settings = settings_for(&backend("offline", ProviderType::Local, None));
        assert_eq!(settings.priority, 2);
        assert_eq!(settings.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(settings.model.as_deref(), Some("m"));
    }

    #[test]
    fn test_build_backends_skips_disabled_and_broken() {
        let mut disabled = backend("off", ProviderType::Local, None);
        disabled.enabled = false;
        let broken = backend("anthropic", ProviderType::Anthropic, None);
        let ok = backend("offline", ProviderType::Local, None);

        let built = build_backends(&[disabled, broken, ok]);
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].0.name(), "offline");
    }

    #[tokio::test]
    async fn test_connection_probe_against_local() {
        let provider = create_provider(&backend("offline", ProviderType::Local, None)).unwrap();
        assert!(test_provider_connection(&provider).await.is_ok());
    }
}
