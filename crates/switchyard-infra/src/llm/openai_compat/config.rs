//! Configuration types and per-vendor defaults for OpenAI-compatible backends.
//!
//! Every vendor that speaks the chat completions protocol gets a factory
//! function returning an [`OpenAiCompatConfig`] with its base URL and
//! capabilities.

use secrecy::SecretString;

use switchyard_types::llm::ProviderCapabilities;

/// Configuration for an OpenAI-compatible backend.
///
/// Used to construct an [`super::OpenAiCompatibleProvider`].
pub struct OpenAiCompatConfig {
    /// Registry identifier (e.g., "deepseek", "openai").
    pub provider_name: String,
    /// Base URL for the API (e.g., "https://api.deepseek.com/v1").
    pub base_url: String,
    /// Bearer token. `None` for keyless local servers.
    pub api_key: Option<SecretString>,
    /// Default model when the request leaves it empty.
    pub model: String,
    pub capabilities: ProviderCapabilities,
}

/// DeepSeek default configuration.
///
/// Base URL: `https://api.deepseek.com/v1`
pub fn deepseek_defaults(api_key: Option<SecretString>, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: "deepseek".into(),
        base_url: "https://api.deepseek.com/v1".into(),
        api_key,
        model: model.into(),
        capabilities: ProviderCapabilities {
            streaming: true,
            cacheable: true,
            tool_calling: true,
            max_context_tokens: 64_000,
            max_output_tokens: 8_192,
        },
    }
}

/// OpenAI default configuration.
///
/// Base URL: `https://api.openai.com/v1`
pub fn openai_defaults(api_key: Option<SecretString>, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: "openai".into(),
        base_url: "https://api.openai.com/v1".into(),
        api_key,
        model: model.into(),
        capabilities: ProviderCapabilities {
            streaming: true,
            cacheable: true,
            tool_calling: true,
            max_context_tokens: 128_000,
            max_output_tokens: 16_384,
        },
    }
}

/// Mistral AI default configuration.
///
/// Base URL: `https://api.mistral.ai/v1`
pub fn mistral_defaults(api_key: Option<SecretString>, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: "mistral".into(),
        base_url: "https://api.mistral.ai/v1".into(),
        api_key,
        model: model.into(),
        capabilities: ProviderCapabilities {
            streaming: true,
            cacheable: true,
            tool_calling: true,
            max_context_tokens: 128_000,
            max_output_tokens: 32_768,
        },
    }
}

/// Ollama's OpenAI-compatible endpoint on localhost. No key.
pub fn ollama_defaults(model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: "ollama".into(),
        base_url: "http://localhost:11434/v1".into(),
        api_key: None,
        model: model.into(),
        capabilities: ProviderCapabilities {
            streaming: true,
            cacheable: true,
            tool_calling: false,
            max_context_tokens: 8_192,
            max_output_tokens: 4_096,
        },
    }
}

/// Defaults for a well-known vendor name, falling back to OpenAI's endpoint.
pub fn defaults_for(name: &str, api_key: Option<SecretString>, model: &str) -> OpenAiCompatConfig {
    let mut config = match name {
        "deepseek" => deepseek_defaults(api_key, model),
        "mistral" => mistral_defaults(api_key, model),
        "ollama" => ollama_defaults(model),
        _ => openai_defaults(api_key, model),
    };
    config.provider_name = name.to_string();
    config
}
