//! Model descriptors and static catalog metadata.

use serde::{Deserialize, Serialize};

/// Capability flags a model declares.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelCapabilities {
    /// Exposes internal reasoning ("thinking") output.
    pub reasoning: bool,
    /// Supports tool/function calling.
    pub tool_call: bool,
    /// Accepts a temperature parameter.
    pub temperature: bool,
}

/// Token limits.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelLimit {
    /// Maximum context window in tokens.
    pub context: u32,
    /// Maximum output tokens per response.
    pub output: u32,
}

/// Per-1000-token rates in the provider's billing currency.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelCost {
    pub input: f64,
    pub output: f64,
    pub cache_read: f64,
}

/// Catalog record for one model of a provider, as stored in registry
/// metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    pub capabilities: Option<ModelCapabilities>,
    #[serde(default)]
    pub limit: ModelLimit,
    pub cost: Option<ModelCost>,
}

/// A fully-resolved model reference.
///
/// Immutable once constructed: the registry enriches it from catalog
/// metadata at lookup time and nothing mutates it afterward. `capabilities`
/// is `None` when the catalog carries no capability metadata for the model;
/// downstream consumers (notably option translation) then fall back to
/// model-name pattern matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDescriptor {
    pub provider_id: String,
    pub name: String,
    pub capabilities: Option<ModelCapabilities>,
    pub limit: ModelLimit,
    pub cost: Option<ModelCost>,
}

impl ModelDescriptor {
    /// A bare descriptor with no catalog enrichment.
    pub fn bare(provider_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            name: name.into(),
            capabilities: None,
            limit: ModelLimit::default(),
            cost: None,
        }
    }

    /// Descriptor enriched from a catalog record.
    pub fn from_info(provider_id: impl Into<String>, info: &ModelInfo) -> Self {
        Self {
            provider_id: provider_id.into(),
            name: info.name.clone(),
            capabilities: info.capabilities,
            limit: info.limit,
            cost: info.cost,
        }
    }
}
