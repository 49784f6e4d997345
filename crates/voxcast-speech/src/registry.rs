//! Provider registry: resolves configured provider blocks into constructed
//! providers.
//!
//! The registry is read-mostly process-wide state populated at startup and
//! replaced wholesale on administrative reload. Reads take a snapshot
//! (`Arc` clone) so in-flight sessions keep the providers they resolved
//! even while a reload swaps the state underneath them.

use crate::catalog::{self, DASHSCOPE, DASHSCOPE_DOUBLE_STREAM};
use crate::error::{TtsError, TtsResult};
use crate::provider::Provider;
use crate::providers::dashscope::{DashScopeConfig, DashScopeProvider};
use crate::providers::dashscope_duplex::{DashScopeDuplexConfig, DashScopeDuplexProvider};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// The resolved {type, fields} tuple for one configured provider block.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(rename = "type")]
    pub type_key: String,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

#[derive(Default)]
struct RegistryState {
    providers: HashMap<String, Provider>,
    selected: Option<String>,
}

/// Process-wide provider registry.
pub struct ProviderRegistry {
    state: RwLock<Arc<RegistryState>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry").finish_non_exhaustive()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Arc::new(RegistryState::default())),
        }
    }

    /// Build a registry from named provider blocks and the active-provider
    /// pointer. Fails if any block is invalid; a partially valid registry
    /// is never installed.
    pub fn from_settings(
        settings: &HashMap<String, ProviderSettings>,
        selected: Option<&str>,
    ) -> TtsResult<Self> {
        let registry = Self::new();
        registry.reload(settings, selected)?;
        Ok(registry)
    }

    /// Validate a settings block and construct the matching provider.
    pub fn resolve(type_key: &str, settings: &ProviderSettings) -> TtsResult<Provider> {
        let descriptor = catalog::descriptor(type_key)
            .ok_or_else(|| TtsError::UnknownProvider(type_key.to_string()))?;
        descriptor.validate(&settings.options)?;

        match type_key {
            DASHSCOPE => {
                let config = DashScopeConfig::from_settings(settings)?;
                Ok(Provider::OneShot(Arc::new(DashScopeProvider::new(config)?)))
            }
            DASHSCOPE_DOUBLE_STREAM => {
                let config = DashScopeDuplexConfig::from_settings(settings)?;
                Ok(Provider::Duplex(Arc::new(DashScopeDuplexProvider::new(
                    config,
                )?)))
            }
            other => Err(TtsError::UnknownProvider(other.to_string())),
        }
    }

    /// Replace the registry contents. The swap happens only after every
    /// block resolved, so readers never observe a half-built state.
    pub fn reload(
        &self,
        settings: &HashMap<String, ProviderSettings>,
        selected: Option<&str>,
    ) -> TtsResult<()> {
        let mut providers = HashMap::with_capacity(settings.len());
        for (name, block) in settings {
            let provider = Self::resolve(&block.type_key, block)?;
            log::info!(
                "registered provider '{name}' (type {}, {:?})",
                block.type_key,
                provider.kind()
            );
            providers.insert(name.clone(), provider);
        }

        if let Some(name) = selected {
            if !providers.contains_key(name) {
                return Err(TtsError::Config(format!(
                    "selected provider '{name}' is not configured"
                )));
            }
        }

        let next = Arc::new(RegistryState {
            providers,
            selected: selected.map(str::to_string),
        });
        *self.state.write().expect("registry lock poisoned") = next;
        Ok(())
    }

    /// Install a pre-built provider under `name`, optionally selecting it.
    /// Lets embedders wire backends the static catalog does not know.
    pub fn register_provider(&self, name: &str, provider: Provider, select: bool) {
        let mut guard = self.state.write().expect("registry lock poisoned");
        let mut next = RegistryState {
            providers: guard.providers.clone(),
            selected: guard.selected.clone(),
        };
        next.providers.insert(name.to_string(), provider);
        if select {
            next.selected = Some(name.to_string());
        }
        *guard = Arc::new(next);
    }

    fn snapshot(&self) -> Arc<RegistryState> {
        self.state.read().expect("registry lock poisoned").clone()
    }

    /// Look up a configured provider by its block name.
    pub fn get(&self, name: &str) -> TtsResult<Provider> {
        self.snapshot()
            .providers
            .get(name)
            .cloned()
            .ok_or_else(|| TtsError::UnknownProvider(name.to_string()))
    }

    /// The provider the active-module pointer selects.
    pub fn active(&self) -> TtsResult<Provider> {
        let snapshot = self.snapshot();
        let name = snapshot
            .selected
            .as_deref()
            .ok_or_else(|| TtsError::Config("no provider selected".into()))?;
        snapshot
            .providers
            .get(name)
            .cloned()
            .ok_or_else(|| TtsError::UnknownProvider(name.to_string()))
    }

    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot().providers.keys().cloned().collect();
        names.sort();
        names
    }
}
