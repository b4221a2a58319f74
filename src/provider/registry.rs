//! In-session provider registry

use super::{LiquidityProvider, ProviderId};
use crate::error::SelectionError;

use tracing::{debug, info};

/// Cached provider set plus the currently selected provider.
///
/// Owned by the orchestrator session state; never shared directly.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: Vec<LiquidityProvider>,
    selected: Option<ProviderId>,
    loaded: bool,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached provider set wholesale.
    ///
    /// Returns `true` if the previously selected provider is no longer
    /// present and active, in which case the selection has been cleared.
    pub fn replace(&mut self, providers: Vec<LiquidityProvider>) -> bool {
        info!("Loaded {} liquidity providers", providers.len());
        self.providers = providers;
        self.loaded = true;

        let still_usable = self
            .selected
            .map(|id| self.get(id).map(|p| p.active).unwrap_or(false))
            .unwrap_or(true);

        if !still_usable {
            debug!(
                "Selected provider {:?} dropped out of the provider set",
                self.selected
            );
            self.selected = None;
            return true;
        }
        false
    }

    /// Validate and select `id`.
    ///
    /// Returns `true` if the selection actually changed.
    pub fn select(&mut self, id: ProviderId) -> Result<bool, SelectionError> {
        let provider = self
            .get(id)
            .ok_or(SelectionError::UnknownProvider { provider_id: id })?;

        if !provider.active {
            return Err(SelectionError::ProviderInactive { provider_id: id });
        }

        let changed = self.selected != Some(id);
        self.selected = Some(id);
        Ok(changed)
    }

    pub fn get(&self, id: ProviderId) -> Option<&LiquidityProvider> {
        self.providers.iter().find(|p| p.id == id)
    }

    pub fn selected_id(&self) -> Option<ProviderId> {
        self.selected
    }

    pub fn selected(&self) -> Option<&LiquidityProvider> {
        self.selected.and_then(|id| self.get(id))
    }

    pub fn providers(&self) -> &[LiquidityProvider] {
        &self.providers
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}
