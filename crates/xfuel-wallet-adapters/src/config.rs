use std::path::PathBuf;

use alloy::primitives::Address;
use thiserror::Error;
use url::Url;

use xfuel_wallet_core::{ChainConfig, ManagerConfig, ProviderMarkers, SESSION_TTL_MS};

pub const COINGECKO_TFUEL_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=theta-fuel&vs_currencies=usd";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

fn invalid(var: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct WalletAdapterConfig {
    pub chain: ChainConfig,
    /// JSON-RPC endpoint standing in for the injected provider. Deterministic mode when unset.
    pub eip1193_proxy_url: Option<Url>,
    pub provider_markers: ProviderMarkers,
    pub walletconnect_project_id: Option<String>,
    /// Deterministic relay approves every pairing with the remote wallet's accounts.
    pub relay_auto_approve: bool,
    pub user_agent: String,
    pub session_file: Option<PathBuf>,
    /// URI schemes the link opener treats as installed apps.
    pub installed_schemes: Vec<String>,
    pub relay_pairing_timeout_ms: u64,
    pub rpc_timeout_ms: u64,
    pub price_primary_url: Url,
    pub price_secondary_url: Option<Url>,
    pub price_cache_ttl_ms: u64,
    pub router_address: Option<Address>,
}

impl Default for WalletAdapterConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig::theta_mainnet(),
            eip1193_proxy_url: None,
            provider_markers: ProviderMarkers {
                theta: true,
                metamask: false,
            },
            walletconnect_project_id: None,
            relay_auto_approve: false,
            user_agent: String::new(),
            session_file: None,
            installed_schemes: Vec::new(),
            relay_pairing_timeout_ms: 120_000,
            rpc_timeout_ms: 15_000,
            price_primary_url: Url::parse(COINGECKO_TFUEL_URL).expect("valid built-in price url"),
            price_secondary_url: None,
            price_cache_ttl_ms: 60_000,
            router_address: None,
        }
    }
}

impl WalletAdapterConfig {
    /// Reads `XFUEL_*` variables, loading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        let mut cfg = Self::default();

        if let Some(chain) = get("XFUEL_CHAIN") {
            cfg.chain = match chain.to_ascii_lowercase().as_str() {
                "mainnet" => ChainConfig::theta_mainnet(),
                "testnet" => ChainConfig::theta_testnet(),
                other => return Err(invalid("XFUEL_CHAIN", format!("unknown chain {other}"))),
            };
        }
        if let Some(raw) = get("XFUEL_RPC_URL") {
            let url = Url::parse(&raw).map_err(|e| invalid("XFUEL_RPC_URL", e))?;
            cfg.chain = cfg.chain.with_rpc_url(url);
        }
        if let Some(raw) = get("XFUEL_EIP1193_PROXY_URL") {
            cfg.eip1193_proxy_url =
                Some(Url::parse(&raw).map_err(|e| invalid("XFUEL_EIP1193_PROXY_URL", e))?);
        }
        if let Some(raw) = get("XFUEL_PROVIDER_MARKERS") {
            cfg.provider_markers = parse_markers(&raw)?;
        }
        cfg.walletconnect_project_id = get("XFUEL_WALLETCONNECT_PROJECT_ID");
        if let Some(raw) = get("XFUEL_RELAY_AUTO_APPROVE") {
            cfg.relay_auto_approve = parse_bool("XFUEL_RELAY_AUTO_APPROVE", &raw)?;
        }
        if let Some(ua) = get("XFUEL_USER_AGENT") {
            cfg.user_agent = ua;
        }
        cfg.session_file = get("XFUEL_SESSION_FILE").map(PathBuf::from);
        if let Some(raw) = get("XFUEL_INSTALLED_SCHEMES") {
            cfg.installed_schemes = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    let s = s.to_ascii_lowercase();
                    if s.ends_with(':') {
                        s
                    } else {
                        format!("{s}:")
                    }
                })
                .collect();
        }
        if let Some(raw) = get("XFUEL_RELAY_PAIRING_TIMEOUT_MS") {
            cfg.relay_pairing_timeout_ms = parse_ms("XFUEL_RELAY_PAIRING_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = get("XFUEL_RPC_TIMEOUT_MS") {
            cfg.rpc_timeout_ms = parse_ms("XFUEL_RPC_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = get("XFUEL_PRICE_PRIMARY_URL") {
            cfg.price_primary_url =
                Url::parse(&raw).map_err(|e| invalid("XFUEL_PRICE_PRIMARY_URL", e))?;
        }
        if let Some(raw) = get("XFUEL_PRICE_SECONDARY_URL") {
            cfg.price_secondary_url =
                Some(Url::parse(&raw).map_err(|e| invalid("XFUEL_PRICE_SECONDARY_URL", e))?);
        }
        if let Some(raw) = get("XFUEL_PRICE_CACHE_TTL_MS") {
            cfg.price_cache_ttl_ms = parse_ms("XFUEL_PRICE_CACHE_TTL_MS", &raw)?;
        }
        if let Some(raw) = get("XFUEL_ROUTER_ADDRESS") {
            cfg.router_address = Some(
                raw.parse()
                    .map_err(|e| invalid("XFUEL_ROUTER_ADDRESS", e))?,
            );
        }
        Ok(cfg)
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            chain: self.chain.clone(),
            user_agent: self.user_agent.clone(),
            session_ttl_ms: SESSION_TTL_MS,
            relay_pairing_timeout_ms: self.relay_pairing_timeout_ms,
            router_address: self.router_address,
        }
    }
}

fn parse_markers(raw: &str) -> Result<ProviderMarkers, ConfigError> {
    let mut markers = ProviderMarkers::none();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.to_ascii_lowercase().as_str() {
            "theta" => markers.theta = true,
            "metamask" => markers.metamask = true,
            "none" => {}
            other => {
                return Err(invalid(
                    "XFUEL_PROVIDER_MARKERS",
                    format!("unknown marker {other}"),
                ))
            }
        }
    }
    Ok(markers)
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(invalid(var, format!("expected a boolean, got {other}"))),
    }
}

fn parse_ms(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    let ms: u64 = raw.parse().map_err(|e| invalid(var, e))?;
    if ms == 0 {
        return Err(invalid(var, "must be greater than zero"));
    }
    Ok(ms)
}
