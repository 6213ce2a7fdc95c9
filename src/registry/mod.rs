//! Provider registry.
//!
//! The registry is the authority on which providers exist, which of them have
//! a live adapter, and what each one's model catalog says. Reads are lock-free
//! snapshots: lookups clone an `Arc` to an immutable table, and writers swap
//! in a new table, so an in-flight request always sees a consistent view.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::adapter::{ProviderAdapter, ProviderMetadata};
use crate::error::ClientError;
use crate::types::{ModelDescriptor, ModelInfo};

/// One registered provider: identity, catalog, and (when backed by an
/// adapter) the callable implementation.
#[derive(Clone)]
pub struct RegistryEntry {
    pub metadata: ProviderMetadata,
    /// `None` for catalog-only entries the client can describe but not call.
    pub adapter: Option<Arc<dyn ProviderAdapter>>,
}

impl RegistryEntry {
    pub fn is_callable(&self) -> bool {
        self.adapter.is_some()
    }
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("provider_id", &self.metadata.id)
            .field("callable", &self.is_callable())
            .field("models", &self.metadata.models.len())
            .finish()
    }
}

type EntryTable = HashMap<String, RegistryEntry>;

/// Thread-safe provider table.
#[derive(Default)]
pub struct ProviderRegistry {
    inner: RwLock<Arc<EntryTable>>,
}

/// Outcome of a discovery pass: who made it in and who did not.
#[derive(Debug, Default)]
pub struct RegistryBuildReport {
    pub registered: Vec<String>,
    pub failures: Vec<BuildFailure>,
}

/// A provider that failed discovery. Discovery failures never abort the
/// build; the provider is simply absent from the registry.
#[derive(Debug)]
pub struct BuildFailure {
    pub provider_id: String,
    pub error: ClientError,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Arc<EntryTable> {
        self.inner.read().expect("registry lock poisoned").clone()
    }

    fn swap(&self, table: EntryTable) {
        *self.inner.write().expect("registry lock poisoned") = Arc::new(table);
    }

    fn mutate(&self, f: impl FnOnce(&mut EntryTable)) {
        let mut guard = self.inner.write().expect("registry lock poisoned");
        let mut table = (**guard).clone();
        f(&mut table);
        *guard = Arc::new(table);
    }

    /// Register an adapter-backed provider.
    ///
    /// Re-registering the same adapter instance is a no-op. A different
    /// adapter under an already-taken id is rejected and the original kept.
    /// An adapter always displaces a catalog-only entry with the same id,
    /// absorbing its catalog.
    pub fn register_adapter(
        &self,
        adapter: Arc<dyn ProviderAdapter>,
        metadata: ProviderMetadata,
    ) -> Result<(), ClientError> {
        let id = metadata.id.clone();
        let snapshot = self.snapshot();
        if let Some(existing) = snapshot.get(&id) {
            match &existing.adapter {
                Some(current) if Arc::ptr_eq(current, &adapter) => return Ok(()),
                Some(_) => {
                    warn!(provider_id = %id, "rejected duplicate adapter registration");
                    return Err(ClientError::AlreadyRegistered(id));
                }
                None => {
                    debug!(provider_id = %id, "adapter displacing catalog-only entry");
                }
            }
        }
        let mut metadata = metadata;
        if let Some(existing) = snapshot.get(&id) {
            merge_models(&mut metadata.models, &existing.metadata.models);
        }
        self.mutate(|table| {
            table.insert(
                id,
                RegistryEntry {
                    metadata,
                    adapter: Some(adapter),
                },
            );
        });
        Ok(())
    }

    /// Register or enrich a catalog-only provider. When the id is already
    /// adapter-backed, only the catalog is merged; the adapter stays.
    pub fn register_metadata(&self, metadata: ProviderMetadata) {
        self.mutate(|table| match table.get_mut(&metadata.id) {
            Some(existing) => {
                merge_models(&mut existing.metadata.models, &metadata.models);
                if existing.metadata.base_url.is_none() {
                    existing.metadata.base_url = metadata.base_url;
                }
            }
            None => {
                table.insert(
                    metadata.id.clone(),
                    RegistryEntry {
                        metadata,
                        adapter: None,
                    },
                );
            }
        });
    }

    pub fn get(&self, provider_id: &str) -> Option<RegistryEntry> {
        self.snapshot().get(provider_id).cloned()
    }

    /// The callable adapter for a provider, or why there is none.
    pub fn get_adapter(&self, provider_id: &str) -> Result<Arc<dyn ProviderAdapter>, ClientError> {
        let entry = self
            .get(provider_id)
            .ok_or_else(|| ClientError::NotFound(format!("unknown provider '{provider_id}'")))?;
        entry.adapter.ok_or_else(|| {
            ClientError::NotImplemented(format!(
                "provider '{provider_id}' is catalog-only and cannot serve requests"
            ))
        })
    }

    /// Resolve a model reference. An unknown provider is an error; an
    /// unlisted model of a known provider resolves to a bare descriptor so
    /// newly-shipped models work before the catalog catches up.
    pub fn get_model(&self, provider_id: &str, name: &str) -> Result<ModelDescriptor, ClientError> {
        let entry = self
            .get(provider_id)
            .ok_or_else(|| ClientError::NotFound(format!("unknown provider '{provider_id}'")))?;
        Ok(entry
            .metadata
            .models
            .iter()
            .find(|m| m.name == name)
            .map(|info| ModelDescriptor::from_info(provider_id, info))
            .unwrap_or_else(|| ModelDescriptor::bare(provider_id, name)))
    }

    /// The cataloged models of a provider. Empty for providers whose catalog
    /// has not been populated; callers can still use unlisted models.
    pub fn list_models(&self, provider_id: &str) -> Result<Vec<ModelInfo>, ClientError> {
        let entry = self
            .get(provider_id)
            .ok_or_else(|| ClientError::NotFound(format!("unknown provider '{provider_id}'")))?;
        Ok(entry.metadata.models)
    }

    pub fn provider_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.snapshot().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Run discovery over a set of adapters concurrently, each bounded by
    /// `timeout`, then overlay static catalog entries. Replaces the current
    /// table in one atomic swap.
    pub async fn rebuild(
        &self,
        adapters: Vec<Arc<dyn ProviderAdapter>>,
        catalog: Vec<ProviderMetadata>,
        timeout: Duration,
    ) -> RegistryBuildReport {
        let mut report = RegistryBuildReport::default();
        let mut join_set = JoinSet::new();
        for adapter in adapters {
            join_set.spawn(async move {
                let id = adapter.provider_id().to_string();
                let described = match tokio::time::timeout(timeout, adapter.describe()).await {
                    Ok(result) => result,
                    Err(_) => Err(ClientError::TimeoutError(format!(
                        "provider '{id}' discovery exceeded {timeout:?}"
                    ))),
                };
                (id, adapter, described)
            });
        }

        let mut table = EntryTable::new();
        while let Some(joined) = join_set.join_next().await {
            let Ok((id, adapter, described)) = joined else {
                // A panicked discovery task only loses its own provider.
                warn!("provider discovery task panicked");
                continue;
            };
            match described {
                Ok(metadata) => {
                    debug!(provider_id = %id, models = metadata.models.len(), "provider discovered");
                    report.registered.push(id.clone());
                    table.insert(
                        id,
                        RegistryEntry {
                            metadata,
                            adapter: Some(adapter),
                        },
                    );
                }
                Err(error) => {
                    warn!(provider_id = %id, %error, "provider discovery failed");
                    report.failures.push(BuildFailure {
                        provider_id: id,
                        error,
                    });
                }
            }
        }

        for metadata in catalog {
            match table.get_mut(&metadata.id) {
                Some(existing) => {
                    merge_models(&mut existing.metadata.models, &metadata.models);
                }
                None => {
                    table.insert(
                        metadata.id.clone(),
                        RegistryEntry {
                            metadata,
                            adapter: None,
                        },
                    );
                }
            }
        }

        report.registered.sort();
        info!(
            registered = report.registered.len(),
            failed = report.failures.len(),
            "registry rebuilt"
        );
        self.swap(table);
        report
    }
}

/// Union by model name; entries already in `models` win.
fn merge_models(models: &mut Vec<ModelInfo>, additions: &[ModelInfo]) {
    for info in additions {
        if !models.iter().any(|m| m.name == info.name) {
            models.push(info.clone());
        }
    }
}

/// Process-wide registry for callers that do not thread their own through.
pub fn global() -> Arc<ProviderRegistry> {
    static GLOBAL: OnceLock<Arc<ProviderRegistry>> = OnceLock::new();
    GLOBAL
        .get_or_init(|| Arc::new(ProviderRegistry::new()))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::DefaultAdapter;
    use crate::types::{ModelCapabilities, ModelLimit};

    fn adapter(id: &str) -> Arc<dyn ProviderAdapter> {
        Arc::new(DefaultAdapter::new(id, "https://api.test/v1"))
    }

    fn metadata(id: &str, models: Vec<ModelInfo>) -> ProviderMetadata {
        ProviderMetadata {
            id: id.to_string(),
            name: id.to_string(),
            base_url: None,
            models,
        }
    }

    fn model_info(name: &str) -> ModelInfo {
        ModelInfo {
            name: name.to_string(),
            capabilities: Some(ModelCapabilities::default()),
            limit: ModelLimit {
                context: 128_000,
                output: 4_096,
            },
            cost: None,
        }
    }

    #[test]
    fn same_adapter_registers_idempotently() {
        let registry = ProviderRegistry::new();
        let a = adapter("acme");
        registry
            .register_adapter(a.clone(), metadata("acme", vec![]))
            .unwrap();
        registry
            .register_adapter(a, metadata("acme", vec![]))
            .unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn different_adapter_under_same_id_is_rejected() {
        let registry = ProviderRegistry::new();
        registry
            .register_adapter(adapter("acme"), metadata("acme", vec![model_info("m1")]))
            .unwrap();
        let err = registry
            .register_adapter(adapter("acme"), metadata("acme", vec![]))
            .unwrap_err();
        assert!(matches!(err, ClientError::AlreadyRegistered(_)));
        // Original entry survives intact.
        assert_eq!(registry.get("acme").unwrap().metadata.models.len(), 1);
    }

    #[test]
    fn adapter_displaces_catalog_only_entry_and_keeps_catalog() {
        let registry = ProviderRegistry::new();
        registry.register_metadata(metadata("acme", vec![model_info("m1")]));
        assert!(registry.get_adapter("acme").is_err());

        registry
            .register_adapter(adapter("acme"), metadata("acme", vec![model_info("m2")]))
            .unwrap();
        let entry = registry.get("acme").unwrap();
        assert!(entry.is_callable());
        assert_eq!(entry.metadata.models.len(), 2);
    }

    #[test]
    fn model_lookup_falls_back_to_bare_descriptor() {
        let registry = ProviderRegistry::new();
        registry.register_metadata(metadata("acme", vec![model_info("listed")]));

        let listed = registry.get_model("acme", "listed").unwrap();
        assert!(listed.capabilities.is_some());

        let unlisted = registry.get_model("acme", "brand-new").unwrap();
        assert!(unlisted.capabilities.is_none());

        assert!(matches!(
            registry.get_model("nowhere", "m"),
            Err(ClientError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rebuild_registers_adapters_and_overlays_catalog() {
        let registry = ProviderRegistry::new();
        let report = registry
            .rebuild(
                vec![adapter("acme"), adapter("other")],
                vec![
                    metadata("acme", vec![model_info("m1")]),
                    metadata("catalog-only", vec![model_info("m2")]),
                ],
                Duration::from_secs(5),
            )
            .await;
        assert_eq!(report.registered, vec!["acme", "other"]);
        assert!(report.failures.is_empty());
        assert_eq!(registry.len(), 3);
        assert!(registry.get("acme").unwrap().is_callable());
        assert!(!registry.get("catalog-only").unwrap().is_callable());
    }
}
