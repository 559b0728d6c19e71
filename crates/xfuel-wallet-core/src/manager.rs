use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use alloy::primitives::{Address, Bytes, B256};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::balance::{format_usd, BalanceFetcher, ZERO_BALANCE};
use crate::chain::ChainConfigManager;
use crate::deep_link::DeepLinkOpener;
use crate::domain::{
    shorten_address, ChainConfig, ConnectionMethod, ProviderEvent, SessionHandle, SessionRecord,
    WalletState,
};
use crate::error::ConnectError;
use crate::platform::{detect_platform, EnvironmentSignals, Platform};
use crate::ports::{
    ClockPort, LinkOpenerPort, PriceOraclePort, ProviderPort, RelayPort, StoragePort,
};
use crate::session::{SessionStore, SESSION_TTL_MS};
use crate::state_machine::{connection_transition, ConnectionAction};
use crate::strategy::{
    attempt_injected, resume_relay, select_strategies, Connection, RelayAttempt, Strategy,
};

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub chain: ChainConfig,
    pub user_agent: String,
    pub session_ttl_ms: u64,
    pub relay_pairing_timeout_ms: u64,
    pub router_address: Option<Address>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig::theta_mainnet(),
            user_agent: String::new(),
            session_ttl_ms: SESSION_TTL_MS,
            relay_pairing_timeout_ms: 120_000,
            router_address: None,
        }
    }
}

/// What the event bridge did with the pending provider events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// Not connected, or nothing pending.
    Idle,
    /// Events drained but none changed the session.
    Ignored,
    Disconnected,
    Reconnected(Result<WalletState, ConnectError>),
    Reloaded(WalletState),
}

#[derive(Debug, Default)]
struct Inner {
    state: WalletState,
    generation: u64,
    restore_attempted: bool,
    watching: Option<ConnectionMethod>,
}

/// Owns the [`WalletState`] and is its only writer.
pub struct ConnectionManager<P, R, S, L, C>
where
    P: ProviderPort,
    R: RelayPort,
    S: StoragePort,
    L: LinkOpenerPort,
    C: ClockPort,
{
    injected: P,
    relay: R,
    sessions: SessionStore<S, C>,
    deep_link: DeepLinkOpener<L>,
    chain: ChainConfigManager,
    balances: BalanceFetcher,
    config: ManagerConfig,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<WalletState>,
    pairing_tx: watch::Sender<Option<String>>,
}

impl<P, R, S, L, C> ConnectionManager<P, R, S, L, C>
where
    P: ProviderPort,
    R: RelayPort,
    S: StoragePort,
    L: LinkOpenerPort,
    C: ClockPort,
{
    pub fn new(
        injected: P,
        relay: R,
        storage: S,
        link_opener: L,
        clock: C,
        config: ManagerConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(WalletState::disconnected());
        let (pairing_tx, _) = watch::channel(None);
        Self {
            injected,
            relay,
            sessions: SessionStore::with_ttl(storage, clock, config.session_ttl_ms),
            deep_link: DeepLinkOpener::new(link_opener),
            chain: ChainConfigManager::new(config.chain.clone()),
            balances: BalanceFetcher::new(config.chain.native_currency.decimals),
            config,
            inner: Mutex::new(Inner::default()),
            state_tx,
            pairing_tx,
        }
    }

    pub fn injected(&self) -> &P {
        &self.injected
    }

    pub fn relay(&self) -> &R {
        &self.relay
    }

    pub fn sessions(&self) -> &SessionStore<S, C> {
        &self.sessions
    }

    pub fn link_opener(&self) -> &L {
        self.deep_link.opener()
    }

    pub fn chain(&self) -> &ChainConfigManager {
        &self.chain
    }

    pub fn state(&self) -> WalletState {
        self.lock().state.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WalletState> {
        self.state_tx.subscribe()
    }

    /// Pairing URI to render as a QR code while a relay attempt is pending.
    pub fn pairing_uri(&self) -> Option<String> {
        self.pairing_tx.borrow().clone()
    }

    pub fn subscribe_pairing_uri(&self) -> watch::Receiver<Option<String>> {
        self.pairing_tx.subscribe()
    }

    pub fn platform(&self) -> Platform {
        detect_platform(&self.signals())
    }

    pub async fn connect(&self) -> Result<WalletState, ConnectError> {
        let generation = self.begin_connect()?;
        let signals = self.signals();
        let platform = detect_platform(&signals);
        let plan = select_strategies(platform, signals.markers, self.relay.is_available());
        info!(?platform, ?plan, generation, "connecting wallet");

        let result = match self.run_plan(generation, &plan, platform).await {
            Ok(connection) => self.complete(generation, connection).await,
            Err(err) => Err(err),
        };
        result.map_err(|err| {
            let err = self.fail(generation, err);
            warn!(error = %err, "wallet connect failed");
            err
        })
    }

    /// Always succeeds. Any in-flight attempt becomes stale.
    pub async fn disconnect(&self) {
        let previous = {
            let mut inner = self.lock();
            if let Ok(t) = connection_transition(inner.state.status(), ConnectionAction::Disconnect) {
                debug!(reason = t.reason, from = ?t.from, "wallet state transition");
            }
            inner.generation += 1;
            inner.state = WalletState::disconnected();
            self.publish(&inner.state);
            inner.watching.take()
        };
        let was_pairing = self.pairing_tx.send_replace(None).is_some();
        self.unwatch(previous);
        if was_pairing || previous == Some(ConnectionMethod::WalletConnect) {
            if let Err(e) = self.relay.close().await {
                debug!(error = %e, "relay close on disconnect");
            }
        }
        self.sessions.clear().await;
        info!("wallet disconnected");
    }

    /// Refetches the balance of the connected account. Only `balance` and
    /// `balance_wei` ever change here; a failed fetch keeps the old value.
    pub async fn refresh_balance(&self) -> WalletState {
        let (generation, address, method) = {
            let inner = self.lock();
            match (inner.state.is_connected, inner.state.address) {
                (true, Some(address)) => {
                    (inner.generation, address, inner.state.connection_method)
                }
                _ => return inner.state.clone(),
            }
        };
        let Some(provider) = self.provider_for(method) else {
            return self.state();
        };

        match self.balances.fetch(provider, address).await {
            Ok(fetched) => {
                let mut inner = self.lock();
                if inner.generation == generation && inner.state.is_connected {
                    inner.state.balance = fetched.formatted;
                    inner.state.balance_wei = fetched.wei;
                    self.publish(&inner.state);
                } else {
                    debug!("discarding balance for a superseded session");
                }
                inner.state.clone()
            }
            Err(e) => {
                warn!(error = %e, "balance refresh failed, keeping previous value");
                self.state()
            }
        }
    }

    /// Silent background restore. Runs once; never reports an error.
    pub async fn restore_session_on_startup(&self) -> WalletState {
        {
            let mut inner = self.lock();
            if inner.restore_attempted || inner.state.is_connected {
                inner.restore_attempted = true;
                return inner.state.clone();
            }
            inner.restore_attempted = true;
        }

        let Some(record) = self.sessions.load().await else {
            debug!("no stored session to restore");
            return self.state();
        };
        let generation = match self.begin_connect() {
            Ok(generation) => generation,
            Err(e) => {
                debug!(error = %e, "restore skipped");
                return self.state();
            }
        };
        info!(
            address = %shorten_address(record.address),
            method = ?record.connection_method,
            "restoring wallet session"
        );
        self.resume(generation, record).await
    }

    pub async fn process_provider_events(&self) -> BridgeOutcome {
        let (method, current_address, current_chain) = {
            let inner = self.lock();
            if !inner.state.is_connected {
                return BridgeOutcome::Idle;
            }
            (inner.watching, inner.state.address, inner.state.chain_id)
        };
        let Some(method) = method else {
            return BridgeOutcome::Idle;
        };
        let Some(provider) = self.provider_for(method) else {
            return BridgeOutcome::Idle;
        };
        let events = match provider.drain_events() {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "failed to drain provider events");
                return BridgeOutcome::Idle;
            }
        };
        if events.is_empty() {
            return BridgeOutcome::Idle;
        }

        for event in events {
            match event {
                ProviderEvent::AccountsChanged { accounts, .. } => match accounts.first() {
                    None => {
                        info!("wallet reported no accounts");
                        self.disconnect().await;
                        return BridgeOutcome::Disconnected;
                    }
                    Some(account) if Some(*account) == current_address => continue,
                    Some(account) => {
                        info!(address = %shorten_address(*account), "account changed, reconnecting");
                        return BridgeOutcome::Reconnected(self.reconnect(method).await);
                    }
                },
                ProviderEvent::ChainChanged { chain_id, .. } => {
                    if Some(chain_id) == current_chain {
                        continue;
                    }
                    info!(chain_id, "chain changed, reloading session");
                    return BridgeOutcome::Reloaded(self.reload().await);
                }
            }
        }
        BridgeOutcome::Ignored
    }

    pub fn session_handle(&self) -> Option<SessionHandle> {
        let inner = self.lock();
        self.handle_from(&inner.state)
    }

    pub fn signer(&self) -> Option<Signer<'_, P, R, S, L, C>> {
        let inner = self.lock();
        let handle = self.handle_from(&inner.state)?;
        Some(Signer {
            manager: self,
            generation: inner.generation,
            handle,
        })
    }

    /// Connected balance valued in USD, `None` when disconnected or the oracle fails.
    pub async fn balance_usd<O>(&self, oracle: &O) -> Option<String>
    where
        O: PriceOraclePort + ?Sized,
    {
        let wei = {
            let inner = self.lock();
            if !inner.state.is_connected {
                return None;
            }
            inner.state.balance_wei
        };
        match oracle.get_prices(false).await {
            Ok(prices) => format_usd(
                wei,
                self.config.chain.native_currency.decimals,
                prices.tfuel_usd,
            ),
            Err(e) => {
                warn!(error = %e, "price oracle unavailable");
                None
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &WalletState) {
        self.state_tx.send_replace(state.clone());
    }

    fn signals(&self) -> EnvironmentSignals {
        EnvironmentSignals {
            user_agent: self.config.user_agent.clone(),
            markers: self.injected.markers(),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    fn provider_for(&self, method: ConnectionMethod) -> Option<&dyn ProviderPort> {
        match method {
            ConnectionMethod::ThetaExtension | ConnectionMethod::MetaMask => Some(&self.injected),
            ConnectionMethod::WalletConnect => Some(&self.relay),
            ConnectionMethod::None => None,
        }
    }

    fn handle_from(&self, state: &WalletState) -> Option<SessionHandle> {
        if !state.is_connected {
            return None;
        }
        Some(SessionHandle {
            address: state.address?,
            chain_id: state.chain_id?,
            method: state.connection_method,
            router_address: self.config.router_address,
            explorer_url: self.chain.canonical().explorer_url.clone(),
        })
    }

    fn unwatch(&self, method: Option<ConnectionMethod>) {
        let Some(provider) = method.and_then(|m| self.provider_for(m)) else {
            return;
        };
        if let Err(e) = provider.unwatch_events() {
            debug!(error = %e, "provider unwatch failed");
        }
    }

    /// Enters `Connecting` and stamps a new generation. The view is reset, not patched.
    fn begin_connect(&self) -> Result<u64, ConnectError> {
        let (generation, previous) = {
            let mut inner = self.lock();
            let t = connection_transition(inner.state.status(), ConnectionAction::Begin)?;
            inner.generation += 1;
            inner.state = WalletState {
                is_connecting: true,
                ..WalletState::disconnected()
            };
            self.publish(&inner.state);
            debug!(reason = t.reason, generation = inner.generation, "wallet state transition");
            (inner.generation, inner.watching.take())
        };
        self.unwatch(previous);
        Ok(generation)
    }

    async fn run_plan(
        &self,
        generation: u64,
        plan: &[Strategy],
        platform: Platform,
    ) -> Result<Connection, ConnectError> {
        for &strategy in plan {
            if !self.is_current(generation) {
                return Err(ConnectError::Superseded);
            }
            debug!(?strategy, "trying connection strategy");
            match self.attempt(strategy, platform).await {
                Ok(connection) => return Ok(connection),
                // Only a missing provider falls through to the next strategy.
                Err(ConnectError::NoProviderAvailable) => {
                    debug!(?strategy, "strategy has no provider, trying next");
                }
                Err(err) => {
                    warn!(?strategy, error = %err, "connection strategy failed");
                    return Err(err);
                }
            }
        }
        Err(ConnectError::NoProviderAvailable)
    }

    async fn attempt(&self, strategy: Strategy, platform: Platform) -> Result<Connection, ConnectError> {
        match strategy {
            Strategy::ThetaExtension | Strategy::MetaMask => {
                attempt_injected(strategy, &self.injected, &self.chain).await
            }
            Strategy::WalletConnect => {
                let attempt = RelayAttempt {
                    relay: &self.relay,
                    deep_link: &self.deep_link,
                    chain: &self.chain,
                    platform,
                    pairing_timeout: Duration::from_millis(self.config.relay_pairing_timeout_ms),
                };
                attempt
                    .run(|uri| {
                        self.pairing_tx.send_replace(uri);
                    })
                    .await
            }
        }
    }

    /// Binds to `method` again without pairing or trying other strategies.
    async fn reattach(&self, method: ConnectionMethod) -> Result<Connection, ConnectError> {
        match Strategy::from_method(method) {
            Some(Strategy::WalletConnect) => resume_relay(&self.relay, &self.chain).await,
            Some(strategy) => attempt_injected(strategy, &self.injected, &self.chain).await,
            None => Err(ConnectError::SessionInvalid(
                "no connection method recorded".to_owned(),
            )),
        }
    }

    async fn reconnect(&self, method: ConnectionMethod) -> Result<WalletState, ConnectError> {
        let generation = self.begin_connect()?;
        let result = match self.reattach(method).await {
            Ok(connection) => self.complete(generation, connection).await,
            Err(err) => Err(err),
        };
        result.map_err(|err| {
            let err = self.fail(generation, err);
            warn!(error = %err, "wallet reconnect failed");
            err
        })
    }

    /// Re-runs the recorded method only. Failures clear the stored session.
    async fn resume(&self, generation: u64, record: SessionRecord) -> WalletState {
        let result = match self.reattach(record.connection_method).await {
            Ok(connection) => self.complete(generation, connection).await,
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            let err = self.fail(generation, err);
            warn!(error = %err, "session restore failed");
            if err != ConnectError::Superseded {
                self.sessions.clear().await;
            }
        }
        self.state()
    }

    /// Full reload after a chain change: drop the view and resume the stored session.
    async fn reload(&self) -> WalletState {
        let generation = match self.begin_connect() {
            Ok(generation) => generation,
            Err(_) => return self.state(),
        };
        match self.sessions.load().await {
            Some(record) => self.resume(generation, record).await,
            None => {
                self.fail(generation, ConnectError::SessionExpired);
                self.state()
            }
        }
    }

    async fn complete(
        &self,
        generation: u64,
        connection: Connection,
    ) -> Result<WalletState, ConnectError> {
        let provider = self
            .provider_for(connection.method)
            .ok_or(ConnectError::NoProviderAvailable)?;
        let balance = match self.balances.fetch(provider, connection.address).await {
            Ok(fetched) => Some(fetched),
            Err(e) => {
                warn!(error = %e, "initial balance fetch failed");
                None
            }
        };

        let state = {
            let mut inner = self.lock();
            if inner.generation != generation {
                return Err(ConnectError::Superseded);
            }
            let t = connection_transition(inner.state.status(), ConnectionAction::Succeed)?;
            let (formatted, wei) = match balance {
                Some(b) => (b.formatted, b.wei),
                None => (ZERO_BALANCE.to_owned(), Default::default()),
            };
            inner.state = WalletState {
                address: Some(connection.address),
                balance: formatted,
                balance_wei: wei,
                is_connected: true,
                is_connecting: false,
                connection_method: connection.method,
                chain_id: Some(connection.chain_id),
            };
            inner.watching = Some(connection.method);
            self.publish(&inner.state);
            debug!(reason = t.reason, generation, "wallet state transition");
            inner.state.clone()
        };
        if let Err(e) = provider.watch_events() {
            warn!(error = %e, "could not subscribe to provider events");
        }
        info!(
            address = %shorten_address(connection.address),
            method = ?connection.method,
            "wallet connected"
        );

        self.sessions
            .save(connection.address, connection.method)
            .await;
        // A disconnect that landed while saving has already cleared storage once.
        if !self.is_current(generation) && !self.lock().state.is_connected {
            self.sessions.clear().await;
        }
        Ok(state)
    }

    /// Resets to `Disconnected` if `generation` is still current; returns the error to report.
    fn fail(&self, generation: u64, err: ConnectError) -> ConnectError {
        let mut inner = self.lock();
        if inner.generation != generation {
            return ConnectError::Superseded;
        }
        if let Ok(t) = connection_transition(inner.state.status(), ConnectionAction::Fail) {
            debug!(reason = t.reason, generation, "wallet state transition");
            inner.state = WalletState::disconnected();
            self.publish(&inner.state);
        }
        err
    }
}

/// Forwards signing calls to the provider that owns the session it was created for.
pub struct Signer<'a, P, R, S, L, C>
where
    P: ProviderPort,
    R: RelayPort,
    S: StoragePort,
    L: LinkOpenerPort,
    C: ClockPort,
{
    manager: &'a ConnectionManager<P, R, S, L, C>,
    generation: u64,
    handle: SessionHandle,
}

impl<P, R, S, L, C> Signer<'_, P, R, S, L, C>
where
    P: ProviderPort,
    R: RelayPort,
    S: StoragePort,
    L: LinkOpenerPort,
    C: ClockPort,
{
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub async fn send_transaction(&self, tx_payload: &Value) -> Result<B256, ConnectError> {
        let provider = self.live_provider()?;
        Ok(provider.send_transaction(tx_payload).await?)
    }

    pub async fn personal_sign(&self, payload: &[u8]) -> Result<Bytes, ConnectError> {
        let provider = self.live_provider()?;
        Ok(provider.personal_sign(payload, self.handle.address).await?)
    }

    fn live_provider(&self) -> Result<&dyn ProviderPort, ConnectError> {
        let inner = self.manager.lock();
        if inner.generation != self.generation || !inner.state.is_connected {
            return Err(ConnectError::Superseded);
        }
        self.manager
            .provider_for(self.handle.method)
            .ok_or(ConnectError::NoProviderAvailable)
    }
}
