//! Application state: configuration plus a wired [`Orchestrator`].

use std::path::{Path, PathBuf};

use anyhow::Context;

use switchyard_core::orchestrator::Orchestrator;
use switchyard_infra::config::{CONFIG_FILE, load_config, resolve_data_dir};
use switchyard_infra::embedding::default_embedder;
use switchyard_infra::llm::build_backends;

pub struct AppState {
    pub orchestrator: Orchestrator,
    pub config_path: PathBuf,
}

impl AppState {
    /// Load configuration, pick an embedder, and register every enabled
    /// backend that can be built.
    pub async fn init(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_dir.join(CONFIG_FILE));

        let config = load_config(Some(&config_path)).await;
        if config.cache.enabled {
            tokio::fs::create_dir_all(&data_dir)
                .await
                .with_context(|| format!("failed to create {}", data_dir.display()))?;
        }
        let embedder = config.cache.enabled.then(|| default_embedder(&data_dir));
        let backends = build_backends(&config.backends);

        let orchestrator = Orchestrator::new(config, embedder);
        for (provider, settings) in backends {
            orchestrator.register_provider_with(provider, settings);
        }

        tracing::info!(
            backends = orchestrator.registry().len(),
            config = %config_path.display(),
            "Switchyard ready"
        );

        Ok(Self {
            orchestrator,
            config_path,
        })
    }

    /// Fail early with guidance when nothing can serve a request.
    pub fn ensure_backends(&self) -> anyhow::Result<()> {
        if self.orchestrator.registry().is_empty() {
            anyhow::bail!(
                "no usable backends in {}; add a [[backends]] entry (a provider_type = \"local\" \
                 backend needs no key)",
                self.config_path.display()
            );
        }
        Ok(())
    }
}
