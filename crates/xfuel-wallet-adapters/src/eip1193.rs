use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use url::Url;

use xfuel_wallet_core::{
    ChainConfig, PortError, ProviderEvent, ProviderMarkers, ProviderPort, USER_REJECTED_CODE,
    UNRECOGNIZED_CHAIN_CODE,
};

use crate::WalletAdapterConfig;

/// Balance the deterministic wallet reports for its built-in account.
pub const DETERMINISTIC_BALANCE_TFUEL: u64 = 1_000;

#[derive(Debug, Clone)]
pub struct Eip1193Adapter {
    mode: ProviderMode,
    markers: ProviderMarkers,
    state: Arc<Mutex<ProviderState>>,
}

#[derive(Debug, Clone)]
enum ProviderMode {
    Disabled(String),
    Deterministic,
    Proxy(ProxyRuntime),
}

#[derive(Debug, Clone)]
struct ProxyRuntime {
    base_url: Url,
    client: reqwest::Client,
}

#[derive(Debug, Clone)]
struct ProviderState {
    accounts: Vec<Address>,
    chain_id: u64,
    known_chains: BTreeSet<u64>,
    balances: HashMap<Address, U256>,
    reject_requests: bool,
    watching: bool,
    event_seq: u64,
    events: Vec<ProviderEvent>,
}

impl ProviderState {
    fn deterministic(chain_id: u64) -> Self {
        let account: Address = "0x1000000000000000000000000000000000000001"
            .parse()
            .expect("valid built-in deterministic account");
        let balance =
            U256::from(DETERMINISTIC_BALANCE_TFUEL) * U256::from(10u64).pow(U256::from(18u64));
        Self {
            accounts: vec![account],
            chain_id,
            known_chains: BTreeSet::from([chain_id]),
            balances: HashMap::from([(account, balance)]),
            reject_requests: false,
            watching: false,
            event_seq: 0,
            events: Vec::new(),
        }
    }

    /// Events are only queued while someone is subscribed.
    fn record(&mut self, event: impl FnOnce(u64) -> ProviderEvent) {
        if !self.watching {
            return;
        }
        self.event_seq = self.event_seq.saturating_add(1);
        let seq = self.event_seq;
        self.events.push(event(seq));
    }

    fn set_accounts(&mut self, accounts: Vec<Address>) {
        if self.accounts == accounts {
            return;
        }
        self.accounts = accounts.clone();
        self.record(|sequence| ProviderEvent::AccountsChanged { sequence, accounts });
    }

    fn set_chain(&mut self, chain_id: u64) {
        if self.chain_id == chain_id {
            return;
        }
        self.chain_id = chain_id;
        self.record(|sequence| ProviderEvent::ChainChanged { sequence, chain_id });
    }
}

impl Default for Eip1193Adapter {
    fn default() -> Self {
        Self::with_config(&WalletAdapterConfig::default())
    }
}

impl Eip1193Adapter {
    pub fn with_config(config: &WalletAdapterConfig) -> Self {
        let mode = match config.eip1193_proxy_url {
            Some(ref base_url) => {
                let timeout = Duration::from_millis(config.rpc_timeout_ms);
                match reqwest::Client::builder().timeout(timeout).build() {
                    Ok(client) => ProviderMode::Proxy(ProxyRuntime {
                        base_url: base_url.clone(),
                        client,
                    }),
                    Err(e) => ProviderMode::Disabled(format!(
                        "failed to initialize EIP-1193 proxy client: {e}"
                    )),
                }
            }
            None => ProviderMode::Deterministic,
        };

        Self {
            mode,
            markers: config.provider_markers,
            state: Arc::new(Mutex::new(ProviderState::deterministic(config.chain.chain_id))),
        }
    }

    pub fn is_deterministic(&self) -> bool {
        matches!(self.mode, ProviderMode::Deterministic)
    }

    fn check_mode(&self) -> Result<(), PortError> {
        if let ProviderMode::Disabled(reason) = &self.mode {
            return Err(PortError::Policy(reason.clone()));
        }
        Ok(())
    }

    fn state(&self) -> Result<MutexGuard<'_, ProviderState>, PortError> {
        self.state
            .lock()
            .map_err(|e| PortError::Transport(format!("provider lock poisoned: {e}")))
    }

    fn proxy(&self) -> Option<&ProxyRuntime> {
        match &self.mode {
            ProviderMode::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    fn rejection() -> PortError {
        PortError::rpc(USER_REJECTED_CODE, "User rejected the request.")
    }

    fn deterministic_signature(&self, payload: &[u8], expected_signer: Address) -> Bytes {
        let mut seed = Vec::with_capacity(payload.len() + 33);
        seed.extend_from_slice(b"personal_sign");
        seed.extend_from_slice(expected_signer.as_slice());
        seed.extend_from_slice(payload);
        let hash = keccak256(seed);
        let mut sig = Vec::with_capacity(65);
        sig.extend_from_slice(hash.as_slice());
        sig.extend_from_slice(hash.as_slice());
        sig.push(27);
        Bytes::from(sig)
    }

    pub fn debug_inject_accounts_changed(&self, accounts: Vec<Address>) -> Result<(), PortError> {
        self.state()?.set_accounts(accounts);
        Ok(())
    }

    pub fn debug_inject_chain_changed(&self, chain_id: u64) -> Result<(), PortError> {
        self.state()?.set_chain(chain_id);
        Ok(())
    }

    pub fn debug_set_balance(&self, address: Address, wei: U256) -> Result<(), PortError> {
        self.state()?.balances.insert(address, wei);
        Ok(())
    }

    /// Replaces the chains the deterministic wallet can switch to without adding them first.
    pub fn debug_set_known_chains(&self, chains: &[u64]) -> Result<(), PortError> {
        self.state()?.known_chains = chains.iter().copied().collect();
        Ok(())
    }

    /// Makes every prompting request fail with the user-rejected code.
    pub fn debug_reject_requests(&self, reject: bool) -> Result<(), PortError> {
        self.state()?.reject_requests = reject;
        Ok(())
    }

    /// Proxy mode has no push channel; compares the wallet's current account
    /// and chain with the last seen values and queues the differences.
    pub async fn poll_events(&self) -> Result<(), PortError> {
        self.check_mode()?;
        if self.proxy().is_none() {
            return Ok(());
        }
        let accounts = self.proxy_call("eth_accounts", serde_json::json!([])).await?;
        let accounts = parse_accounts(&accounts)?;
        let chain_id = self.proxy_call("eth_chainId", serde_json::json!([])).await?;
        let chain_id = json_chain_id_to_u64(&chain_id)?;
        let mut g = self.state()?;
        g.set_accounts(accounts);
        g.set_chain(chain_id);
        Ok(())
    }

    async fn proxy_call(&self, method: &str, params: Value) -> Result<Value, PortError> {
        let proxy = match &self.mode {
            ProviderMode::Proxy(proxy) => proxy,
            ProviderMode::Disabled(reason) => return Err(PortError::Policy(reason.clone())),
            ProviderMode::Deterministic => {
                return Err(PortError::NotImplemented(
                    "eip1193 proxy runtime not enabled",
                ))
            }
        };

        debug!(method, "eip1193 proxy call");
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = proxy
            .client
            .post(proxy.base_url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("eip1193 proxy request failed: {e}")))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| PortError::Transport(format!("eip1193 proxy json decode failed: {e}")))?;
        if let Some(err) = body.get("error") {
            let code = err.get("code").and_then(Value::as_i64);
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("provider error")
                .to_owned();
            return Err(match code {
                Some(code) => PortError::rpc(code, message),
                None => PortError::Transport(format!("eip1193 proxy returned error: {err}")),
            });
        }
        if !status.is_success() {
            return Err(PortError::Transport(format!(
                "eip1193 proxy status {status}: {body}"
            )));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| PortError::Transport("eip1193 proxy missing result".to_owned()))
    }
}

#[async_trait(?Send)]
impl ProviderPort for Eip1193Adapter {
    fn markers(&self) -> ProviderMarkers {
        match self.mode {
            ProviderMode::Disabled(_) => ProviderMarkers::none(),
            _ => self.markers,
        }
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, PortError> {
        self.check_mode()?;
        if self.proxy().is_some() {
            let result = self
                .proxy_call("eth_requestAccounts", serde_json::json!([]))
                .await?;
            let accounts = parse_accounts(&result)?;
            self.state()?.accounts = accounts.clone();
            return Ok(accounts);
        }

        let g = self.state()?;
        if g.reject_requests {
            return Err(Self::rejection());
        }
        Ok(g.accounts.clone())
    }

    async fn chain_id(&self) -> Result<u64, PortError> {
        self.check_mode()?;
        if self.proxy().is_some() {
            let result = self.proxy_call("eth_chainId", serde_json::json!([])).await?;
            let chain_id = json_chain_id_to_u64(&result)?;
            self.state()?.chain_id = chain_id;
            return Ok(chain_id);
        }
        Ok(self.state()?.chain_id)
    }

    async fn switch_chain(&self, chain_id_hex: &str) -> Result<(), PortError> {
        self.check_mode()?;
        if self.proxy().is_some() {
            self.proxy_call(
                "wallet_switchEthereumChain",
                serde_json::json!([{ "chainId": chain_id_hex }]),
            )
            .await?;
            return Ok(());
        }

        let target = parse_chain_id_str(chain_id_hex)?;
        let mut g = self.state()?;
        if g.reject_requests {
            return Err(Self::rejection());
        }
        if !g.known_chains.contains(&target) {
            return Err(PortError::rpc(
                UNRECOGNIZED_CHAIN_CODE,
                format!("Unrecognized chain ID \"{chain_id_hex}\""),
            ));
        }
        g.set_chain(target);
        Ok(())
    }

    async fn add_chain(&self, chain: &ChainConfig) -> Result<(), PortError> {
        self.check_mode()?;
        if self.proxy().is_some() {
            self.proxy_call(
                "wallet_addEthereumChain",
                serde_json::json!([chain.add_chain_params()]),
            )
            .await?;
            return Ok(());
        }

        let mut g = self.state()?;
        if g.reject_requests {
            return Err(Self::rejection());
        }
        g.known_chains.insert(chain.chain_id);
        Ok(())
    }

    async fn get_balance(&self, address: Address) -> Result<U256, PortError> {
        self.check_mode()?;
        if self.proxy().is_some() {
            let result = self
                .proxy_call(
                    "eth_getBalance",
                    serde_json::json!([address.to_string(), "latest"]),
                )
                .await?;
            let raw = result.as_str().ok_or_else(|| {
                PortError::Transport("eth_getBalance must return hex quantity".to_owned())
            })?;
            return raw
                .parse()
                .map_err(|e| PortError::Validation(format!("invalid balance quantity: {e}")));
        }
        Ok(self
            .state()?
            .balances
            .get(&address)
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn send_transaction(&self, tx_payload: &Value) -> Result<B256, PortError> {
        self.check_mode()?;
        if self.proxy().is_some() {
            let result = self
                .proxy_call("eth_sendTransaction", serde_json::json!([tx_payload]))
                .await?;
            let hash = result.as_str().ok_or_else(|| {
                PortError::Transport("eth_sendTransaction must return hash".to_owned())
            })?;
            return hash
                .parse()
                .map_err(|e| PortError::Validation(format!("invalid tx hash: {e}")));
        }

        if self.state()?.reject_requests {
            return Err(Self::rejection());
        }
        let canonical = serde_json::to_vec(tx_payload)
            .map_err(|e| PortError::Validation(format!("tx payload serialization failed: {e}")))?;
        Ok(keccak256(canonical))
    }

    async fn personal_sign(&self, payload: &[u8], signer: Address) -> Result<Bytes, PortError> {
        self.check_mode()?;
        if self.proxy().is_some() {
            let payload_hex = format!("0x{}", alloy::hex::encode(payload));
            let result = self
                .proxy_call(
                    "personal_sign",
                    serde_json::json!([payload_hex, signer.to_string()]),
                )
                .await?;
            let sig_raw = result.as_str().ok_or_else(|| {
                PortError::Transport("sign response must be hex string".to_owned())
            })?;
            return sig_raw
                .parse()
                .map_err(|e| PortError::Validation(format!("invalid signature hex: {e}")));
        }

        if self.state()?.reject_requests {
            return Err(Self::rejection());
        }
        Ok(self.deterministic_signature(payload, signer))
    }

    fn watch_events(&self) -> Result<(), PortError> {
        self.check_mode()?;
        let mut g = self.state()?;
        g.watching = true;
        g.events.clear();
        Ok(())
    }

    fn unwatch_events(&self) -> Result<(), PortError> {
        let mut g = self.state()?;
        g.watching = false;
        g.events.clear();
        Ok(())
    }

    fn drain_events(&self) -> Result<Vec<ProviderEvent>, PortError> {
        self.check_mode()?;
        let mut g = self.state()?;
        Ok(std::mem::take(&mut g.events))
    }
}

fn parse_accounts(value: &Value) -> Result<Vec<Address>, PortError> {
    let arr = value
        .as_array()
        .ok_or_else(|| PortError::Transport("accounts: array expected".to_owned()))?;
    arr.iter()
        .map(|item| {
            let raw = item
                .as_str()
                .ok_or_else(|| PortError::Transport("accounts: string expected".to_owned()))?;
            raw.parse()
                .map_err(|e| PortError::Validation(format!("invalid account address: {e}")))
        })
        .collect()
}

fn json_chain_id_to_u64(value: &Value) -> Result<u64, PortError> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    let s = value
        .as_str()
        .ok_or_else(|| PortError::Validation("chain id must be string or number".to_owned()))?;
    parse_chain_id_str(s)
}

fn parse_chain_id_str(raw: &str) -> Result<u64, PortError> {
    if raw.starts_with("0x") || raw.starts_with("0X") {
        u64::from_str_radix(&raw[2..], 16)
            .map_err(|e| PortError::Validation(format!("invalid hex chain id: {e}")))
    } else {
        raw.parse()
            .map_err(|e| PortError::Validation(format!("invalid chain id: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_ids_parse_hex_and_decimal() {
        assert_eq!(parse_chain_id_str("0x169").expect("hex"), 361);
        assert_eq!(parse_chain_id_str("0X16D").expect("upper hex"), 365);
        assert_eq!(parse_chain_id_str("361").expect("decimal"), 361);
        assert!(parse_chain_id_str("0xzz").is_err());
        assert_eq!(
            json_chain_id_to_u64(&serde_json::json!(361)).expect("number"),
            361
        );
    }
}
