//! Option translation profiles.
//!
//! A profile is a named, ordered list of rewrite rules applied after merging
//! and before encoding. Profiles paper over model families that accept the
//! canonical keys under different names or not at all, so callers can keep
//! writing the canonical form.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};

use crate::types::{ModelDescriptor, Operation};

use super::{OptionMap, OptionWarning};

/// One rewrite applied to the merged option map.
#[derive(Clone)]
pub enum TranslationRule {
    /// Move the value under a different key, emitting a warning.
    Rename {
        from: &'static str,
        to: &'static str,
    },
    /// Remove the key entirely, emitting a warning with the reason.
    Drop {
        key: &'static str,
        reason: &'static str,
    },
    /// Rewrite the value in place with a pure function. No warning.
    Transform {
        key: &'static str,
        apply: fn(Value) -> Value,
    },
}

impl std::fmt::Debug for TranslationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rename { from, to } => write!(f, "Rename({from} -> {to})"),
            Self::Drop { key, .. } => write!(f, "Drop({key})"),
            Self::Transform { key, .. } => write!(f, "Transform({key})"),
        }
    }
}

/// A named bundle of translation rules for one model family.
#[derive(Debug, Clone)]
pub struct TranslationProfile {
    pub name: &'static str,
    pub rules: Vec<TranslationRule>,
}

impl TranslationProfile {
    /// Apply every rule in order. Rules whose key is absent are no-ops;
    /// applying the same profile twice yields the same map and no duplicate
    /// warnings.
    pub fn apply(&self, opts: &mut OptionMap, warnings: &mut Vec<OptionWarning>) {
        for rule in &self.rules {
            match rule {
                TranslationRule::Rename { from, to } => {
                    if let Some(value) = opts.remove(*from) {
                        opts.insert((*to).to_string(), value);
                        warnings.push(OptionWarning {
                            key: (*from).to_string(),
                            message: format!(
                                "'{from}' renamed to '{to}' by profile '{}'",
                                self.name
                            ),
                        });
                    }
                }
                TranslationRule::Drop { key, reason } => {
                    if opts.remove(*key).is_some() {
                        warnings.push(OptionWarning {
                            key: (*key).to_string(),
                            message: format!("'{key}' dropped: {reason}"),
                        });
                    }
                }
                TranslationRule::Transform { key, apply } => {
                    if let Some(value) = opts.remove(*key) {
                        opts.insert((*key).to_string(), apply(value));
                    }
                }
            }
        }
    }
}

// Model families whose names mark them as reasoning models when the catalog
// carries no capability metadata.
static REASONING_MODEL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(o[0-9](-mini|-preview)?|gpt-5)").unwrap());

fn is_reasoning_model(model: &ModelDescriptor) -> bool {
    match model.capabilities {
        Some(caps) => caps.reasoning,
        None => REASONING_MODEL_PATTERN.is_match(&model.name),
    }
}

/// Qualitative effort levels map to fixed reasoning-token budgets.
fn effort_to_budget(value: Value) -> Value {
    match value.as_str() {
        Some("low") => json!(1024),
        Some("medium") => json!(8192),
        Some("high") => json!(24576),
        _ => value,
    }
}

fn reasoning_profile() -> TranslationProfile {
    TranslationProfile {
        name: "reasoning-model",
        rules: vec![
            TranslationRule::Rename {
                from: "max_tokens",
                to: "max_completion_tokens",
            },
            TranslationRule::Drop {
                key: "temperature",
                reason: "reasoning models do not accept sampling temperature",
            },
            TranslationRule::Transform {
                key: "reasoning_effort",
                apply: effort_to_budget,
            },
        ],
    }
}

/// Built-in profiles that apply to an operation/model pair. Selection is
/// deterministic: same model and operation, same profiles in the same order.
pub fn resolve_profiles(operation: Operation, model: &ModelDescriptor) -> Vec<TranslationProfile> {
    let mut profiles = Vec::new();
    if matches!(operation, Operation::Chat | Operation::Object) && is_reasoning_model(model) {
        profiles.push(reasoning_profile());
    }
    profiles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModelCapabilities;

    fn reasoning_model() -> ModelDescriptor {
        let mut model = ModelDescriptor::bare("acme", "custom-deep-think");
        model.capabilities = Some(ModelCapabilities {
            reasoning: true,
            tool_call: true,
            temperature: false,
        });
        model
    }

    #[test]
    fn rename_and_drop_warn_exactly_once_per_key() {
        let mut opts = OptionMap::new();
        opts.insert("max_tokens".into(), json!(256));
        opts.insert("temperature".into(), json!(0.7));
        let mut warnings = Vec::new();

        reasoning_profile().apply(&mut opts, &mut warnings);

        assert_eq!(opts.get("max_completion_tokens"), Some(&json!(256)));
        assert!(!opts.contains_key("max_tokens"));
        assert!(!opts.contains_key("temperature"));
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn applying_twice_is_idempotent() {
        let mut opts = OptionMap::new();
        opts.insert("max_tokens".into(), json!(256));
        let mut warnings = Vec::new();

        let profile = reasoning_profile();
        profile.apply(&mut opts, &mut warnings);
        let snapshot = opts.clone();
        profile.apply(&mut opts, &mut warnings);

        assert_eq!(opts, snapshot);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn effort_levels_become_token_budgets() {
        let mut opts = OptionMap::new();
        opts.insert("reasoning_effort".into(), json!("medium"));
        let mut warnings = Vec::new();

        reasoning_profile().apply(&mut opts, &mut warnings);

        assert_eq!(opts.get("reasoning_effort"), Some(&json!(8192)));
        assert!(warnings.is_empty());
    }

    #[test]
    fn selection_uses_capabilities_then_name_pattern() {
        assert_eq!(
            resolve_profiles(Operation::Chat, &reasoning_model()).len(),
            1
        );
        let by_name = ModelDescriptor::bare("acme", "o3-mini");
        assert_eq!(resolve_profiles(Operation::Chat, &by_name).len(), 1);
        let plain = ModelDescriptor::bare("acme", "standard-chat");
        assert!(resolve_profiles(Operation::Chat, &plain).is_empty());
        assert!(resolve_profiles(Operation::Embedding, &reasoning_model()).is_empty());
    }
}
