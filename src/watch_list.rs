use serde_json::json;
use std::sync::Arc;

use crate::blockchain::WatchSet;
use crate::error::{DatabaseError, ScannerError};
use crate::logging::{ErrorLogger, LogContext};

/// Dynamic source of watched addresses
pub trait AddressRegistry: Send + Sync {
    fn list_addresses(&self) -> Result<Vec<String>, DatabaseError>;
}

/// Where the current watch-list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchListSource {
    Registry,
    Static,
}

/// Resolves the watch-list each tick: registry first, static list as fallback
#[derive(Clone)]
pub struct WatchListProvider {
    registry: Option<Arc<dyn AddressRegistry>>,
    static_wallets: Vec<String>,
}

impl WatchListProvider {
    pub fn new(registry: Option<Arc<dyn AddressRegistry>>, static_wallets: Vec<String>) -> Self {
        Self {
            registry,
            static_wallets,
        }
    }

    pub fn static_only(static_wallets: Vec<String>) -> Self {
        Self::new(None, static_wallets)
    }

    pub fn has_registry(&self) -> bool {
        self.registry.is_some()
    }

    /// Current watch set. Never fails; registry problems fall back to the static list.
    pub fn current(&self) -> WatchSet {
        self.resolve().0
    }

    /// Current watch set together with the source it was built from
    pub fn resolve(&self) -> (WatchSet, WatchListSource) {
        if let Some(registry) = &self.registry {
            match registry.list_addresses() {
                Ok(addresses) => {
                    let set = WatchSet::from_addresses(&addresses);
                    if !set.is_empty() {
                        return (set, WatchListSource::Registry);
                    }
                    LogContext::new("watch_list", "resolve")
                        .debug("Registry returned no usable addresses, using static wallets");
                }
                Err(e) => {
                    ErrorLogger::log_error(
                        &ScannerError::Database(e),
                        Some(LogContext::new("watch_list", "resolve")),
                    );
                }
            }
        }

        let set = WatchSet::from_addresses(&self.static_wallets);
        LogContext::new("watch_list", "resolve")
            .with_metadata("address_count", json!(set.len()))
            .trace("Using static wallet list");
        (set, WatchListSource::Static)
    }
}
