//! Option preparation pipeline.
//!
//! Callers pass canonical option keys plus an optional provider-specific
//! passthrough bucket. `prepare` validates the canonical keys against the
//! adapter's declared schema, layers defaults, and runs translation profiles,
//! producing the exact option map the encoder will serialize.

mod schema;
pub mod translation;

pub use schema::{OptionConstraint, OptionKind, OptionSchema};
pub use translation::{TranslationProfile, TranslationRule};

use serde_json::{Map, Value};
use tracing::debug;

use crate::adapter::ProviderAdapter;
use crate::error::ClientError;
use crate::types::{ModelDescriptor, Operation};

/// Canonical options are an open JSON object keyed by canonical names.
pub type OptionMap = Map<String, Value>;

/// Key under which callers tunnel provider-specific options. Its contents
/// bypass schema validation and land in the request body verbatim.
pub const PASSTHROUGH_KEY: &str = "provider_options";

/// Non-fatal note produced during preparation, surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionWarning {
    pub key: String,
    pub message: String,
}

/// The outcome of option preparation, consumed by the encode step.
#[derive(Debug, Clone)]
pub struct PreparedOptions {
    /// Validated, merged, translated canonical options.
    pub opts: OptionMap,
    /// Provider-specific keys forwarded without validation.
    pub passthrough: OptionMap,
    pub warnings: Vec<OptionWarning>,
}

/// Run the full preparation flow for one request.
///
/// Unknown canonical keys are rejected rather than silently ignored; the
/// passthrough bucket is the escape hatch for provider-specific knobs.
/// Precedence when merging: caller > adapter defaults > global defaults.
pub fn prepare(
    adapter: &dyn ProviderAdapter,
    operation: Operation,
    model: &ModelDescriptor,
    mut user: OptionMap,
    global_defaults: &OptionMap,
) -> Result<PreparedOptions, ClientError> {
    let schema = adapter.supported_options(operation);

    // Split off the passthrough bucket before validation.
    let passthrough = match user.remove(PASSTHROUGH_KEY) {
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(ClientError::InvalidOption(format!(
                "'{PASSTHROUGH_KEY}' must be an object, got {other}"
            )));
        }
        None => OptionMap::new(),
    };

    // Closed world: every remaining caller key must be in the schema.
    for (key, value) in &user {
        let Some(constraint) = schema.constraint(key) else {
            return Err(ClientError::InvalidOption(format!(
                "unknown option '{key}' for provider '{}' (use '{PASSTHROUGH_KEY}' for \
                 provider-specific keys)",
                adapter.provider_id()
            )));
        };
        constraint.validate(key, value)?;
    }

    // Layer defaults under the caller's values.
    let mut opts = OptionMap::new();
    for (key, value) in global_defaults {
        if schema.contains(key) {
            opts.insert(key.clone(), value.clone());
        }
    }
    for (key, default) in schema.defaults() {
        opts.insert(key.clone(), default.clone());
    }
    for (key, value) in user {
        opts.insert(key, value);
    }

    // Translation: the adapter may take over entirely; otherwise the built-in
    // profiles run.
    let mut warnings = Vec::new();
    match adapter.translate_options(operation, model, opts) {
        (translated, Some(adapter_warnings)) => {
            opts = translated;
            warnings = adapter_warnings;
        }
        (untranslated, None) => {
            opts = untranslated;
            for profile in translation::resolve_profiles(operation, model) {
                debug!(profile = profile.name, model = %model.name, "applying translation profile");
                profile.apply(&mut opts, &mut warnings);
            }
        }
    }

    opts.insert("model".to_string(), Value::String(model.name.clone()));

    Ok(PreparedOptions {
        opts,
        passthrough,
        warnings,
    })
}
