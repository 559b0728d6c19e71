use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{ChainConfig, PriceSnapshot, ProviderEvent, ProviderMarkers};

/// EIP-1193 code for a request the user declined.
pub const USER_REJECTED_CODE: i64 = 4001;
/// EIP-1193 code returned by `wallet_switchEthereumChain` for a chain the wallet does not know.
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("policy rejected: {0}")]
    Policy(String),
    #[error("provider rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
}

impl PortError {
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        PortError::Rpc {
            code,
            message: message.into(),
        }
    }

    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            PortError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        self.rpc_code() == Some(USER_REJECTED_CODE)
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        self.rpc_code() == Some(UNRECOGNIZED_CHAIN_CODE)
    }
}

/// Injected (EIP-1193 style) wallet provider.
#[async_trait(?Send)]
pub trait ProviderPort {
    /// Vendor markers; must not trigger any user-visible prompt.
    fn markers(&self) -> ProviderMarkers;
    async fn request_accounts(&self) -> Result<Vec<Address>, PortError>;
    async fn chain_id(&self) -> Result<u64, PortError>;
    async fn switch_chain(&self, chain_id_hex: &str) -> Result<(), PortError>;
    async fn add_chain(&self, chain: &ChainConfig) -> Result<(), PortError>;
    async fn get_balance(&self, address: Address) -> Result<U256, PortError>;
    async fn send_transaction(&self, tx_payload: &Value) -> Result<B256, PortError>;
    async fn personal_sign(&self, payload: &[u8], signer: Address) -> Result<Bytes, PortError>;
    fn watch_events(&self) -> Result<(), PortError>;
    fn unwatch_events(&self) -> Result<(), PortError>;
    fn drain_events(&self) -> Result<Vec<ProviderEvent>, PortError>;
}

/// WalletConnect-style relay. Once paired it behaves like any other provider.
#[async_trait(?Send)]
pub trait RelayPort: ProviderPort {
    /// Whether the relay is configured at all (e.g. a project id is present).
    fn is_available(&self) -> bool;
    /// Starts a pairing and returns the `wc:` URI to show or deep-link.
    async fn create_pairing(&self) -> Result<String, PortError>;
    /// Resolves once the wallet approves the pairing.
    async fn await_approval(&self) -> Result<Vec<Address>, PortError>;
    /// Accounts of a relay session that survived a restart; `NotFound` when none did.
    async fn resume(&self) -> Result<Vec<Address>, PortError>;
    async fn close(&self) -> Result<(), PortError>;
}

#[async_trait(?Send)]
pub trait StoragePort {
    async fn get(&self, key: &str) -> Result<Option<String>, PortError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), PortError>;
    async fn remove(&self, key: &str) -> Result<(), PortError>;
}

#[async_trait(?Send)]
pub trait LinkOpenerPort {
    async fn can_open(&self, url: &str) -> Result<bool, PortError>;
    async fn open(&self, url: &str) -> Result<(), PortError>;
}

#[async_trait(?Send)]
pub trait PriceOraclePort {
    async fn get_prices(&self, bypass_cache: bool) -> Result<PriceSnapshot, PortError>;
}

pub trait ClockPort {
    fn now_ms(&self) -> Result<u64, PortError>;
}
