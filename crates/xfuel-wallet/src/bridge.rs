//! Wiring between the CLI shell and the wallet crates.
//! The shell only talks to the connection manager through this module.

use async_trait::async_trait;
use tracing::debug;

use xfuel_wallet_adapters::{
    ConfigError, Eip1193Adapter, FileStorage, HttpPriceOracle, LinkOpenerAdapter, MemoryStorage,
    SystemClockAdapter, WalletAdapterConfig, WalletConnectAdapter,
};
use xfuel_wallet_core::{ConnectionManager, PortError, StoragePort};

/// Session storage picked at startup: a file when configured, otherwise
/// process memory.
#[derive(Debug, Clone)]
pub enum SessionStorage {
    File(FileStorage),
    Memory(MemoryStorage),
}

#[async_trait(?Send)]
impl StoragePort for SessionStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, PortError> {
        match self {
            SessionStorage::File(s) => s.get(key).await,
            SessionStorage::Memory(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PortError> {
        match self {
            SessionStorage::File(s) => s.set(key, value).await,
            SessionStorage::Memory(s) => s.set(key, value).await,
        }
    }

    async fn remove(&self, key: &str) -> Result<(), PortError> {
        match self {
            SessionStorage::File(s) => s.remove(key).await,
            SessionStorage::Memory(s) => s.remove(key).await,
        }
    }
}

pub type WalletManager = ConnectionManager<
    Eip1193Adapter,
    WalletConnectAdapter,
    SessionStorage,
    LinkOpenerAdapter,
    SystemClockAdapter,
>;

pub struct WalletBridge {
    pub manager: WalletManager,
    pub oracle: HttpPriceOracle,
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Port(#[from] PortError),
}

impl WalletBridge {
    pub fn from_config(config: &WalletAdapterConfig) -> Result<Self, BridgeError> {
        let storage = match &config.session_file {
            Some(path) => SessionStorage::File(FileStorage::open(path)?),
            None => SessionStorage::Memory(MemoryStorage::default()),
        };
        let injected = Eip1193Adapter::with_config(config);
        let relay = WalletConnectAdapter::with_config(config, Eip1193Adapter::with_config(config));
        let manager = ConnectionManager::new(
            injected,
            relay,
            storage,
            LinkOpenerAdapter::with_config(config),
            SystemClockAdapter,
            config.manager_config(),
        );
        Ok(Self {
            manager,
            oracle: HttpPriceOracle::with_config(config)?,
        })
    }

    /// Pulls account and chain changes from proxied wallets into their event
    /// queues. Deterministic wallets push theirs directly.
    pub async fn poll_wallets(&self) {
        if let Err(e) = self.manager.injected().poll_events().await {
            debug!(error = %e, "injected wallet poll failed");
        }
        if self.manager.relay().session().ok().flatten().is_some() {
            if let Err(e) = self.manager.relay().remote().poll_events().await {
                debug!(error = %e, "relay wallet poll failed");
            }
        }
    }
}
