#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use xfuel_wallet_core::{
    ChainConfig, ClockPort, ConnectionManager, LinkOpenerPort, ManagerConfig, PortError,
    PriceOraclePort, PriceSnapshot, ProviderEvent, ProviderMarkers, ProviderPort, RelayPort,
    StoragePort, TimestampMs, UNRECOGNIZED_CHAIN_CODE, USER_REJECTED_CODE,
};

pub const THETA: u64 = 361;
pub const DESKTOP_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_5) Chrome/126.0";
pub const IOS_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) Safari/604.1";
pub const ANDROID_UA: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) Chrome/126.0 Mobile";
pub const START_MS: u64 = 1_760_000_000_000;

pub fn owner_address() -> Address {
    "0x1000000000000000000000000000000000000001"
        .parse()
        .expect("valid owner address")
}

pub fn other_address() -> Address {
    "0x2000000000000000000000000000000000000002"
        .parse()
        .expect("valid other address")
}

pub fn tfuel(whole: u64) -> U256 {
    tfuel_milli(whole, 0)
}

pub fn tfuel_milli(whole: u64, milli: u64) -> U256 {
    U256::from(whole) * U256::from(10u64).pow(U256::from(18u64))
        + U256::from(milli) * U256::from(10u64).pow(U256::from(15u64))
}

#[derive(Debug)]
struct ProviderScript {
    markers: ProviderMarkers,
    accounts: Vec<Address>,
    accounts_error: Option<PortError>,
    chain_id: u64,
    known_chains: HashSet<u64>,
    decline_switch: bool,
    balance: Result<U256, String>,
    watching: bool,
    events: Vec<ProviderEvent>,
    sequence: u64,
    gate: Option<Arc<Notify>>,
    balance_gate: Option<Arc<Notify>>,
    calls: Vec<&'static str>,
}

/// Scripted EIP-1193 provider. Every call is recorded by name.
#[derive(Debug)]
pub struct FakeProvider {
    script: Mutex<ProviderScript>,
}

impl FakeProvider {
    pub fn theta(account: Address) -> Self {
        Self::with_markers(
            ProviderMarkers {
                theta: true,
                metamask: false,
            },
            vec![account],
        )
    }

    pub fn metamask(account: Address) -> Self {
        Self::with_markers(
            ProviderMarkers {
                theta: false,
                metamask: true,
            },
            vec![account],
        )
    }

    pub fn absent() -> Self {
        Self::with_markers(ProviderMarkers::none(), Vec::new())
    }

    pub fn with_markers(markers: ProviderMarkers, accounts: Vec<Address>) -> Self {
        Self {
            script: Mutex::new(ProviderScript {
                markers,
                accounts,
                accounts_error: None,
                chain_id: THETA,
                known_chains: HashSet::from([THETA]),
                decline_switch: false,
                balance: Ok(tfuel_milli(1234, 567)),
                watching: false,
                events: Vec::new(),
                sequence: 0,
                gate: None,
                balance_gate: None,
                calls: Vec::new(),
            }),
        }
    }

    fn script(&self) -> std::sync::MutexGuard<'_, ProviderScript> {
        self.script.lock().expect("provider script lock")
    }

    pub fn on_chain(self, chain_id: u64) -> Self {
        self.script().chain_id = chain_id;
        self
    }

    /// Replaces the set of chains the wallet recognises.
    pub fn knowing(self, chains: &[u64]) -> Self {
        self.script().known_chains = chains.iter().copied().collect();
        self
    }

    pub fn declining_switch(self) -> Self {
        self.script().decline_switch = true;
        self
    }

    pub fn rejecting_accounts(self) -> Self {
        self.script().accounts_error =
            Some(PortError::rpc(USER_REJECTED_CODE, "User rejected the request."));
        self
    }

    /// `request_accounts` suspends until the returned gate is notified.
    pub fn gated(self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.script().gate = Some(gate.clone());
        (self, gate)
    }

    /// `get_balance` suspends until the returned gate is notified.
    pub fn gate_balance(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.script().balance_gate = Some(gate.clone());
        gate
    }

    pub fn ungate_balance(&self) {
        self.script().balance_gate = None;
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        self.script().accounts = accounts;
    }

    pub fn set_balance(&self, balance: Result<U256, String>) {
        self.script().balance = balance;
    }

    pub fn set_chain(&self, chain_id: u64) {
        self.script().chain_id = chain_id;
    }

    pub fn emit_accounts_changed(&self, accounts: Vec<Address>) {
        let mut s = self.script();
        if !s.watching {
            return;
        }
        s.sequence += 1;
        let sequence = s.sequence;
        s.events.push(ProviderEvent::AccountsChanged { sequence, accounts });
    }

    pub fn emit_chain_changed(&self, chain_id: u64) {
        let mut s = self.script();
        s.chain_id = chain_id;
        if !s.watching {
            return;
        }
        s.sequence += 1;
        let sequence = s.sequence;
        s.events.push(ProviderEvent::ChainChanged { sequence, chain_id });
    }

    pub fn is_watching(&self) -> bool {
        self.script().watching
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.script().calls.clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.script().calls.iter().filter(|c| **c == name).count()
    }

    fn record(&self, name: &'static str) {
        self.script().calls.push(name);
    }
}

#[async_trait(?Send)]
impl ProviderPort for FakeProvider {
    fn markers(&self) -> ProviderMarkers {
        self.script().markers
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, PortError> {
        self.record("eth_requestAccounts");
        let gate = self.script().gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let s = self.script();
        match &s.accounts_error {
            Some(PortError::Rpc { code, message }) => Err(PortError::rpc(*code, message.clone())),
            Some(other) => Err(PortError::Transport(other.to_string())),
            None => Ok(s.accounts.clone()),
        }
    }

    async fn chain_id(&self) -> Result<u64, PortError> {
        self.record("eth_chainId");
        Ok(self.script().chain_id)
    }

    async fn switch_chain(&self, chain_id_hex: &str) -> Result<(), PortError> {
        self.record("wallet_switchEthereumChain");
        let mut s = self.script();
        if s.decline_switch {
            return Err(PortError::rpc(USER_REJECTED_CODE, "User rejected the request."));
        }
        let target = u64::from_str_radix(chain_id_hex.trim_start_matches("0x"), 16)
            .map_err(|e| PortError::Validation(e.to_string()))?;
        if !s.known_chains.contains(&target) {
            return Err(PortError::rpc(UNRECOGNIZED_CHAIN_CODE, "Unrecognized chain ID"));
        }
        s.chain_id = target;
        Ok(())
    }

    async fn add_chain(&self, chain: &ChainConfig) -> Result<(), PortError> {
        self.record("wallet_addEthereumChain");
        self.script().known_chains.insert(chain.chain_id);
        Ok(())
    }

    async fn get_balance(&self, _address: Address) -> Result<U256, PortError> {
        self.record("eth_getBalance");
        let gate = self.script().balance_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.script().balance.clone().map_err(PortError::Transport)
    }

    async fn send_transaction(&self, _tx_payload: &Value) -> Result<B256, PortError> {
        self.record("eth_sendTransaction");
        Ok(B256::repeat_byte(0xab))
    }

    async fn personal_sign(&self, payload: &[u8], _signer: Address) -> Result<Bytes, PortError> {
        self.record("personal_sign");
        Ok(Bytes::copy_from_slice(payload))
    }

    fn watch_events(&self) -> Result<(), PortError> {
        let mut s = self.script();
        s.watching = true;
        s.events.clear();
        Ok(())
    }

    fn unwatch_events(&self) -> Result<(), PortError> {
        let mut s = self.script();
        s.watching = false;
        s.events.clear();
        Ok(())
    }

    fn drain_events(&self) -> Result<Vec<ProviderEvent>, PortError> {
        Ok(std::mem::take(&mut self.script().events))
    }
}

/// Relay whose pairing is approved (or not) by the test script.
#[derive(Debug)]
pub struct FakeRelay {
    available: bool,
    approval: Mutex<Option<Vec<Address>>>,
    resumable: Mutex<Option<Vec<Address>>>,
    pub provider: FakeProvider,
    closes: AtomicU64,
    pairings: AtomicU64,
}

impl FakeRelay {
    pub fn unavailable() -> Self {
        Self {
            available: false,
            approval: Mutex::new(None),
            resumable: Mutex::new(None),
            provider: FakeProvider::absent(),
            closes: AtomicU64::new(0),
            pairings: AtomicU64::new(0),
        }
    }

    /// Approves pairing with `account` as soon as it is requested.
    pub fn approving(account: Address) -> Self {
        Self {
            available: true,
            approval: Mutex::new(Some(vec![account])),
            ..Self::unavailable()
        }
    }

    /// Never answers the pairing request.
    pub fn silent() -> Self {
        Self {
            available: true,
            ..Self::unavailable()
        }
    }

    pub fn with_live_session(self, account: Address) -> Self {
        *self.resumable.lock().expect("resumable lock") = Some(vec![account]);
        self
    }

    pub fn closes(&self) -> u64 {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn pairings(&self) -> u64 {
        self.pairings.load(Ordering::SeqCst)
    }
}

#[async_trait(?Send)]
impl ProviderPort for FakeRelay {
    fn markers(&self) -> ProviderMarkers {
        ProviderMarkers::none()
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, PortError> {
        self.provider.request_accounts().await
    }

    async fn chain_id(&self) -> Result<u64, PortError> {
        self.provider.chain_id().await
    }

    async fn switch_chain(&self, chain_id_hex: &str) -> Result<(), PortError> {
        self.provider.switch_chain(chain_id_hex).await
    }

    async fn add_chain(&self, chain: &ChainConfig) -> Result<(), PortError> {
        self.provider.add_chain(chain).await
    }

    async fn get_balance(&self, address: Address) -> Result<U256, PortError> {
        self.provider.get_balance(address).await
    }

    async fn send_transaction(&self, tx_payload: &Value) -> Result<B256, PortError> {
        self.provider.send_transaction(tx_payload).await
    }

    async fn personal_sign(&self, payload: &[u8], signer: Address) -> Result<Bytes, PortError> {
        self.provider.personal_sign(payload, signer).await
    }

    fn watch_events(&self) -> Result<(), PortError> {
        self.provider.watch_events()
    }

    fn unwatch_events(&self) -> Result<(), PortError> {
        self.provider.unwatch_events()
    }

    fn drain_events(&self) -> Result<Vec<ProviderEvent>, PortError> {
        let events = self.provider.drain_events()?;
        for event in &events {
            if let ProviderEvent::AccountsChanged { accounts, .. } = event {
                let mut live = self.resumable.lock().expect("resumable lock");
                if live.is_some() {
                    *live = Some(accounts.clone());
                }
            }
        }
        Ok(events)
    }
}

#[async_trait(?Send)]
impl RelayPort for FakeRelay {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn create_pairing(&self) -> Result<String, PortError> {
        let n = self.pairings.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("wc:topic{n}@2?relay-protocol=irn&symKey=secret"))
    }

    async fn await_approval(&self) -> Result<Vec<Address>, PortError> {
        let approval = self.approval.lock().expect("approval lock").clone();
        match approval {
            Some(accounts) => Ok(accounts),
            None => std::future::pending().await,
        }
    }

    async fn resume(&self) -> Result<Vec<Address>, PortError> {
        self.resumable
            .lock()
            .expect("resumable lock")
            .clone()
            .ok_or_else(|| PortError::NotFound("no live relay session".to_owned()))
    }

    async fn close(&self) -> Result<(), PortError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        *self.resumable.lock().expect("resumable lock") = None;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: bool,
    fail_reads: AtomicBool,
}

impl MemoryStorage {
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn set_failing_reads(&self, failing: bool) {
        self.fail_reads.store(failing, Ordering::SeqCst);
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .expect("storage lock")
            .insert(key.to_owned(), value.to_owned());
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.entries.lock().expect("storage lock").get(key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().expect("storage lock").is_empty()
    }
}

#[async_trait(?Send)]
impl StoragePort for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, PortError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PortError::Transport("storage locked".to_owned()));
        }
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PortError> {
        if self.fail_writes {
            return Err(PortError::Transport("quota exceeded".to_owned()));
        }
        self.insert(key, value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PortError> {
        self.entries.lock().expect("storage lock").remove(key);
        Ok(())
    }
}

/// Opener that only succeeds for links with a whitelisted prefix.
#[derive(Debug, Default)]
pub struct RecordingOpener {
    openable: Vec<String>,
    checked: Mutex<Vec<String>>,
    opened: Mutex<Vec<String>>,
}

impl RecordingOpener {
    pub fn accepting(prefixes: &[&str]) -> Self {
        Self {
            openable: prefixes.iter().map(|p| (*p).to_owned()).collect(),
            ..Self::default()
        }
    }

    pub fn checked(&self) -> Vec<String> {
        self.checked.lock().expect("checked lock").clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().expect("opened lock").clone()
    }
}

#[async_trait(?Send)]
impl LinkOpenerPort for RecordingOpener {
    async fn can_open(&self, url: &str) -> Result<bool, PortError> {
        self.checked.lock().expect("checked lock").push(url.to_owned());
        Ok(self.openable.iter().any(|p| url.starts_with(p.as_str())))
    }

    async fn open(&self, url: &str) -> Result<(), PortError> {
        self.opened.lock().expect("opened lock").push(url.to_owned());
        Ok(())
    }
}

#[derive(Debug)]
pub struct TestClock {
    now: AtomicU64,
}

impl Default for TestClock {
    fn default() -> Self {
        Self {
            now: AtomicU64::new(START_MS),
        }
    }
}

impl TestClock {
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl ClockPort for TestClock {
    fn now_ms(&self) -> Result<u64, PortError> {
        Ok(self.now.load(Ordering::SeqCst))
    }
}

#[derive(Debug)]
pub struct FixedOracle(pub Option<f64>);

#[async_trait(?Send)]
impl PriceOraclePort for FixedOracle {
    async fn get_prices(&self, _bypass_cache: bool) -> Result<PriceSnapshot, PortError> {
        let tfuel_usd = self
            .0
            .ok_or_else(|| PortError::Transport("price feeds down".to_owned()))?;
        Ok(PriceSnapshot {
            tfuel_usd,
            fetched_at_ms: TimestampMs(START_MS),
        })
    }
}

pub type TestManager =
    ConnectionManager<FakeProvider, FakeRelay, MemoryStorage, RecordingOpener, TestClock>;

pub fn manager(provider: FakeProvider, relay: FakeRelay, user_agent: &str) -> TestManager {
    manager_with(
        provider,
        relay,
        MemoryStorage::default(),
        RecordingOpener::default(),
        user_agent,
    )
}

pub fn manager_with(
    provider: FakeProvider,
    relay: FakeRelay,
    storage: MemoryStorage,
    opener: RecordingOpener,
    user_agent: &str,
) -> TestManager {
    ConnectionManager::new(
        provider,
        relay,
        storage,
        opener,
        TestClock::default(),
        ManagerConfig {
            user_agent: user_agent.to_owned(),
            ..ManagerConfig::default()
        },
    )
}

/// Writes a session record directly, as a previous page load would have.
pub fn seed_session(storage: &MemoryStorage, address: Address, method: &str, ts: u64) {
    storage.insert("xfuel_wallet_address", &address.to_string());
    storage.insert("xfuel_connection_method", method);
    storage.insert("xfuel_session_ts", &ts.to_string());
}
