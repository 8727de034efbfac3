// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider registry: static cascade configuration paired with adapters.

use std::sync::Arc;

use parley_config::model::ProviderSettings;
use parley_core::ProviderAdapter;

/// One configured provider: its static settings plus the adapter that
/// speaks its wire format.
pub struct RegisteredProvider {
    pub settings: ProviderSettings,
    pub adapter: Arc<dyn ProviderAdapter>,
}

/// Ordered collection of configured providers.
///
/// Providers are kept in declaration order; priority ties among the primary
/// pool are broken by that order (stable sort), so the cascade sequence is
/// fully determined by configuration.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<RegisteredProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider. Call in configuration declaration order.
    pub fn register(&mut self, settings: ProviderSettings, adapter: Arc<dyn ProviderAdapter>) {
        self.providers.push(RegisteredProvider { settings, adapter });
    }

    /// Look up a provider by configured name.
    pub fn get(&self, name: &str) -> Option<&RegisteredProvider> {
        self.providers.iter().find(|p| p.settings.name == name)
    }

    /// The primary pool: enabled, non-fallback providers in ascending
    /// priority order.
    pub fn primaries(&self) -> Vec<&RegisteredProvider> {
        let mut primaries: Vec<&RegisteredProvider> = self
            .providers
            .iter()
            .filter(|p| p.settings.enabled && !p.settings.fallback_only)
            .collect();
        primaries.sort_by_key(|p| p.settings.priority);
        primaries
    }

    /// The fallback pool: enabled, fallback-only providers. Raced
    /// concurrently, so order carries no meaning here.
    pub fn fallbacks(&self) -> Vec<&RegisteredProvider> {
        self.providers
            .iter()
            .filter(|p| p.settings.enabled && p.settings.fallback_only)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
