//! Effect lookup by identifier.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::effect::EffectDefinition;

/// Resolves effect identifiers to definitions. Spawn requests and
/// chained events go through this, so one loader backs a whole system.
pub trait EffectLoader: Send + Sync {
    /// Returns the definition for `identifier`, or `None` if unknown.
    /// Identifiers are matched after [`normalize_effect_path`].
    fn load(&self, identifier: &str) -> Option<Arc<EffectDefinition>>;
}

/// Expands a bare effect name to its canonical resource path:
/// `"mod:flame"` becomes `"mod:particles/flame.json"`. Already-canonical
/// paths pass through unchanged, so normalization is idempotent.
pub fn normalize_effect_path(identifier: &str) -> String {
    let (namespace, path) = match identifier.split_once(':') {
        Some((ns, p)) => (ns, p),
        None => ("", identifier),
    };
    let mut path = path.to_string();
    if !path.starts_with("particles/") {
        path = format!("particles/{path}");
    }
    if !path.ends_with(".json") {
        path.push_str(".json");
    }
    if namespace.is_empty() {
        path
    } else {
        format!("{namespace}:{path}")
    }
}

/// In-memory loader backed by a hash map of registered definitions
#[derive(Debug, Default)]
pub struct MemoryEffectLoader {
    effects: FxHashMap<String, Arc<EffectDefinition>>,
}

impl MemoryEffectLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition under its own identifier
    pub fn register(&mut self, definition: Arc<EffectDefinition>) {
        let key = normalize_effect_path(&definition.identifier);
        self.effects.insert(key, definition);
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

impl EffectLoader for MemoryEffectLoader {
    fn load(&self, identifier: &str) -> Option<Arc<EffectDefinition>> {
        self.effects.get(&normalize_effect_path(identifier)).cloned()
    }
}
