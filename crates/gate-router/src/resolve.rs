//! Target resolution for outbound inference calls

use gate_core::{ComputeTarget, Config};
use gate_store::{ModeStore, RegistryStore};
use tracing::debug;

/// The dispatch target a request resolved to
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTarget {
    /// Base URL of the chosen backend, no trailing slash
    pub base_url: String,

    /// Classification of the chosen URL
    pub mode: ComputeTarget,

    /// Target recorded in the mode store before this request, defaulting to
    /// gpu when the mode document does not exist yet. Only used to flag a
    /// silent downgrade in the response metadata.
    pub original_target: ComputeTarget,
}

/// Resolve the target base URL, later sources winning:
///
/// 1. the configured default GPU URL,
/// 2. the mode store's `gpu_url` when present,
/// 3. the registry's preferred endpoint (active first, then most recent).
///
/// Store read failures leave the earlier choice standing; resolution itself
/// never fails.
pub async fn resolve_target(
    config: &Config,
    mode: &ModeStore,
    registry: &RegistryStore,
) -> ResolvedTarget {
    let mut base_url = config.upstream.default_gpu_url.trim_end_matches('/').to_string();
    let mut original_target = ComputeTarget::Gpu;

    match mode.peek().await {
        Ok(Some(current)) => {
            original_target = current.target;
            if let Some(gpu_url) = current.gpu_url {
                if !gpu_url.trim().is_empty() {
                    base_url = gpu_url.trim_end_matches('/').to_string();
                }
            }
        }
        Ok(None) => {}
        Err(err) => debug!(error = %err, "mode store unreadable, keeping default target"),
    }

    match registry.latest().await {
        Ok(Some(record)) => {
            base_url = record.url.trim_end_matches('/').to_string();
        }
        Ok(None) => {}
        Err(err) => debug!(error = %err, "registry unreadable, keeping current target"),
    }

    ResolvedTarget {
        mode: ComputeTarget::classify(&base_url),
        base_url,
        original_target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_core::{Config, EndpointStatus};
    use gate_store::{EndpointUpsert, EventLog};

    fn fixtures(dir: &tempfile::TempDir) -> (Config, ModeStore, RegistryStore) {
        let mut config = Config::default();
        config.data = gate_core::config::DataConfig::with_dir(dir.path());
        config.upstream.default_gpu_url = "https://default.ngrok-free.dev".to_string();

        let events = EventLog::new(config.events_path());
        let mode = ModeStore::new(config.mode_path(), events);
        let registry = RegistryStore::new(config.registry_path(), config.registry_log_path());
        (config, mode, registry)
    }

    #[tokio::test]
    async fn test_defaults_to_configured_gpu_url() {
        let dir = tempfile::tempdir().unwrap();
        let (config, mode, registry) = fixtures(&dir);

        let resolved = resolve_target(&config, &mode, &registry).await;
        assert_eq!(resolved.base_url, "https://default.ngrok-free.dev");
        assert_eq!(resolved.mode, ComputeTarget::Gpu);
        // Absent mode document reads as gpu
        assert_eq!(resolved.original_target, ComputeTarget::Gpu);
    }

    #[tokio::test]
    async fn test_mode_gpu_url_overrides_default() {
        let dir = tempfile::tempdir().unwrap();
        let (config, mode, registry) = fixtures(&dir);

        mode.set(
            ComputeTarget::Gpu,
            Some("https://from-mode.ngrok-free.dev/".to_string()),
        )
        .await
        .unwrap();

        let resolved = resolve_target(&config, &mode, &registry).await;
        assert_eq!(resolved.base_url, "https://from-mode.ngrok-free.dev");
        assert_eq!(resolved.original_target, ComputeTarget::Gpu);
    }

    #[tokio::test]
    async fn test_registry_latest_wins_over_mode() {
        let dir = tempfile::tempdir().unwrap();
        let (config, mode, registry) = fixtures(&dir);

        mode.set(
            ComputeTarget::Gpu,
            Some("https://from-mode.ngrok-free.dev".to_string()),
        )
        .await
        .unwrap();
        registry
            .upsert(EndpointUpsert {
                id: "colab-ngrok".to_string(),
                url: "https://from-registry.ngrok-free.dev".to_string(),
                name: None,
                status: Some(EndpointStatus::Active),
            })
            .await
            .unwrap();

        let resolved = resolve_target(&config, &mode, &registry).await;
        assert_eq!(resolved.base_url, "https://from-registry.ngrok-free.dev");
    }

    #[tokio::test]
    async fn test_cpu_mode_is_reported_as_original_target() {
        let dir = tempfile::tempdir().unwrap();
        let (config, mode, registry) = fixtures(&dir);

        mode.set(ComputeTarget::Cpu, None).await.unwrap();

        let resolved = resolve_target(&config, &mode, &registry).await;
        assert_eq!(resolved.original_target, ComputeTarget::Cpu);
        // No gpu_url stored, so the default URL still stands
        assert_eq!(resolved.base_url, "https://default.ngrok-free.dev");
    }

    #[tokio::test]
    async fn test_loopback_registry_url_classifies_cpu() {
        let dir = tempfile::tempdir().unwrap();
        let (config, mode, registry) = fixtures(&dir);

        registry
            .upsert(EndpointUpsert {
                id: "local".to_string(),
                url: "http://127.0.0.1:8000".to_string(),
                name: None,
                status: Some(EndpointStatus::Active),
            })
            .await
            .unwrap();

        let resolved = resolve_target(&config, &mode, &registry).await;
        assert_eq!(resolved.mode, ComputeTarget::Cpu);
    }
}
