use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::balance::ZERO_BALANCE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimestampMs(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionMethod {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "theta_extension")]
    ThetaExtension,
    #[serde(rename = "metamask")]
    MetaMask,
    #[serde(rename = "walletconnect")]
    WalletConnect,
}

impl ConnectionMethod {
    /// Value written to durable storage.
    pub fn storage_key(self) -> &'static str {
        match self {
            ConnectionMethod::None => "",
            ConnectionMethod::ThetaExtension => "theta_extension",
            ConnectionMethod::MetaMask => "metamask",
            ConnectionMethod::WalletConnect => "walletconnect",
        }
    }

    pub fn from_storage_key(raw: &str) -> Option<Self> {
        match raw {
            "theta_extension" => Some(ConnectionMethod::ThetaExtension),
            "metamask" => Some(ConnectionMethod::MetaMask),
            "walletconnect" => Some(ConnectionMethod::WalletConnect),
            _ => None,
        }
    }

    pub fn is_injected(self) -> bool {
        matches!(
            self,
            ConnectionMethod::ThetaExtension | ConnectionMethod::MetaMask
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Snapshot of the wallet connection as exposed to the rest of the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletState {
    pub address: Option<Address>,
    pub balance: String,
    pub balance_wei: U256,
    pub is_connected: bool,
    pub is_connecting: bool,
    pub connection_method: ConnectionMethod,
    pub chain_id: Option<u64>,
}

impl Default for WalletState {
    fn default() -> Self {
        Self::disconnected()
    }
}

impl WalletState {
    pub fn disconnected() -> Self {
        Self {
            address: None,
            balance: ZERO_BALANCE.to_owned(),
            balance_wei: U256::ZERO,
            is_connected: false,
            is_connecting: false,
            connection_method: ConnectionMethod::None,
            chain_id: None,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        if self.is_connected {
            ConnectionStatus::Connected
        } else if self.is_connecting {
            ConnectionStatus::Connecting
        } else {
            ConnectionStatus::Disconnected
        }
    }

    /// Shortened `0xABCD...1234` form, recomputed from `address` on every call.
    pub fn display_address(&self) -> Option<String> {
        self.address.map(shorten_address)
    }
}

pub fn shorten_address(address: Address) -> String {
    let full = address.to_string();
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub address: Address,
    pub connection_method: ConnectionMethod,
    pub created_at_ms: TimestampMs,
}

impl SessionRecord {
    pub fn age_ms(&self, now: TimestampMs) -> u64 {
        now.0.saturating_sub(self.created_at_ms.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub chain_name: String,
    rpc_urls: Vec<Url>,
    pub native_currency: NativeCurrency,
    pub explorer_url: Url,
}

impl ChainConfig {
    /// Builds a config; `None` when no RPC URL is given.
    pub fn new(
        chain_id: u64,
        chain_name: impl Into<String>,
        rpc_urls: Vec<Url>,
        native_currency: NativeCurrency,
        explorer_url: Url,
    ) -> Option<Self> {
        if rpc_urls.is_empty() {
            return None;
        }
        Some(Self {
            chain_id,
            chain_name: chain_name.into(),
            rpc_urls,
            native_currency,
            explorer_url,
        })
    }

    pub fn theta_mainnet() -> Self {
        Self::theta_preset(
            361,
            "Theta Mainnet",
            "https://eth-rpc-api.thetatoken.org/rpc",
            "https://explorer.thetatoken.org",
        )
    }

    pub fn theta_testnet() -> Self {
        Self::theta_preset(
            365,
            "Theta Testnet",
            "https://eth-rpc-api-testnet.thetatoken.org/rpc",
            "https://testnet-explorer.thetatoken.org",
        )
    }

    fn theta_preset(chain_id: u64, name: &str, rpc: &str, explorer: &str) -> Self {
        Self {
            chain_id,
            chain_name: name.to_owned(),
            rpc_urls: vec![Url::parse(rpc).expect("valid built-in rpc url")],
            native_currency: NativeCurrency {
                name: "TFUEL".to_owned(),
                symbol: "TFUEL".to_owned(),
                decimals: 18,
            },
            explorer_url: Url::parse(explorer).expect("valid built-in explorer url"),
        }
    }

    pub fn chain_id_hex(&self) -> String {
        format!("{:#x}", self.chain_id)
    }

    pub fn rpc_urls(&self) -> &[Url] {
        &self.rpc_urls
    }

    pub fn primary_rpc_url(&self) -> &Url {
        &self.rpc_urls[0]
    }

    /// Replaces the RPC list, keeping it non-empty.
    pub fn with_rpc_url(mut self, url: Url) -> Self {
        self.rpc_urls = vec![url];
        self
    }

    /// `wallet_addEthereumChain` parameter object.
    pub fn add_chain_params(&self) -> serde_json::Value {
        serde_json::json!({
            "chainId": self.chain_id_hex(),
            "chainName": self.chain_name,
            "nativeCurrency": {
                "name": self.native_currency.name,
                "symbol": self.native_currency.symbol,
                "decimals": self.native_currency.decimals,
            },
            "rpcUrls": self.rpc_urls.iter().map(|u| u.as_str()).collect::<Vec<_>>(),
            "blockExplorerUrls": [self.explorer_url.as_str()],
        })
    }
}

/// Vendor flags read off the injected provider without prompting the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderMarkers {
    pub theta: bool,
    pub metamask: bool,
}

impl ProviderMarkers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn any(&self) -> bool {
        self.theta || self.metamask
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderEventKind {
    AccountsChanged,
    ChainChanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderEvent {
    AccountsChanged { sequence: u64, accounts: Vec<Address> },
    ChainChanged { sequence: u64, chain_id: u64 },
}

impl ProviderEvent {
    pub fn kind(&self) -> ProviderEventKind {
        match self {
            ProviderEvent::AccountsChanged { .. } => ProviderEventKind::AccountsChanged,
            ProviderEvent::ChainChanged { .. } => ProviderEventKind::ChainChanged,
        }
    }

    pub fn sequence(&self) -> u64 {
        match self {
            ProviderEvent::AccountsChanged { sequence, .. }
            | ProviderEvent::ChainChanged { sequence, .. } => *sequence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub tfuel_usd: f64,
    pub fetched_at_ms: TimestampMs,
}

/// Connection details handed to the swap feature once connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub address: Address,
    pub chain_id: u64,
    pub method: ConnectionMethod,
    pub router_address: Option<Address>,
    pub explorer_url: Url,
}
