use std::time::Duration;

use alloy::primitives::Address;
use tracing::{debug, info, warn};

use crate::chain::ChainConfigManager;
use crate::deep_link::{DeepLinkOpener, DeepLinkOutcome};
use crate::domain::{shorten_address, ConnectionMethod, ProviderMarkers};
use crate::error::ConnectError;
use crate::platform::Platform;
use crate::ports::{LinkOpenerPort, ProviderPort, RelayPort};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    ThetaExtension,
    MetaMask,
    WalletConnect,
}

impl Strategy {
    pub fn method(self) -> ConnectionMethod {
        match self {
            Strategy::ThetaExtension => ConnectionMethod::ThetaExtension,
            Strategy::MetaMask => ConnectionMethod::MetaMask,
            Strategy::WalletConnect => ConnectionMethod::WalletConnect,
        }
    }

    pub fn from_method(method: ConnectionMethod) -> Option<Self> {
        match method {
            ConnectionMethod::ThetaExtension => Some(Strategy::ThetaExtension),
            ConnectionMethod::MetaMask => Some(Strategy::MetaMask),
            ConnectionMethod::WalletConnect => Some(Strategy::WalletConnect),
            ConnectionMethod::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub address: Address,
    pub chain_id: u64,
    pub method: ConnectionMethod,
}

/// Mobile browsers never get an injected provider; the relay is the only option there.
pub fn select_strategies(
    platform: Platform,
    markers: ProviderMarkers,
    relay_available: bool,
) -> Vec<Strategy> {
    let mut strategies = Vec::with_capacity(3);
    match platform {
        Platform::DesktopWithExtension | Platform::DesktopWithoutExtension => {
            if markers.theta {
                strategies.push(Strategy::ThetaExtension);
            }
            if markers.metamask {
                strategies.push(Strategy::MetaMask);
            }
        }
        Platform::MobileIos | Platform::MobileAndroid | Platform::MobileNoApp => {}
    }
    if relay_available {
        strategies.push(Strategy::WalletConnect);
    }
    strategies
}

fn marker_present(strategy: Strategy, markers: ProviderMarkers) -> bool {
    match strategy {
        Strategy::ThetaExtension => markers.theta,
        Strategy::MetaMask => markers.metamask,
        Strategy::WalletConnect => true,
    }
}

pub async fn attempt_injected<P>(
    strategy: Strategy,
    provider: &P,
    chain: &ChainConfigManager,
) -> Result<Connection, ConnectError>
where
    P: ProviderPort + ?Sized,
{
    if !marker_present(strategy, provider.markers()) {
        return Err(ConnectError::NoProviderAvailable);
    }
    debug!(?strategy, "requesting accounts from injected provider");
    let accounts = provider.request_accounts().await?;
    let address = *accounts.first().ok_or(ConnectError::UserRejected)?;
    let chain_id = chain.ensure_canonical(provider).await?;
    Ok(Connection {
        address,
        chain_id,
        method: strategy.method(),
    })
}

pub async fn resume_relay<R>(relay: &R, chain: &ChainConfigManager) -> Result<Connection, ConnectError>
where
    R: RelayPort,
{
    if !relay.is_available() {
        return Err(ConnectError::NoProviderAvailable);
    }
    let accounts = relay.resume().await?;
    let address = *accounts
        .first()
        .ok_or_else(|| ConnectError::SessionInvalid("relay session has no accounts".to_owned()))?;
    let chain_id = chain.ensure_canonical(relay).await?;
    Ok(Connection {
        address,
        chain_id,
        method: ConnectionMethod::WalletConnect,
    })
}

pub struct RelayAttempt<'a, R, L> {
    pub relay: &'a R,
    pub deep_link: &'a DeepLinkOpener<L>,
    pub chain: &'a ChainConfigManager,
    pub platform: Platform,
    pub pairing_timeout: Duration,
}

impl<R, L> RelayAttempt<'_, R, L>
where
    R: RelayPort,
    L: LinkOpenerPort,
{
    /// `publish_uri` receives `None` once the attempt is over.
    pub async fn run(&self, publish_uri: impl Fn(Option<String>)) -> Result<Connection, ConnectError> {
        if !self.relay.is_available() {
            return Err(ConnectError::NoProviderAvailable);
        }
        let result = self.pair(&publish_uri).await;
        publish_uri(None);
        if result.is_err() {
            if let Err(e) = self.relay.close().await {
                debug!(error = %e, "relay close after failed pairing");
            }
        }
        result
    }

    async fn pair(&self, publish_uri: &impl Fn(Option<String>)) -> Result<Connection, ConnectError> {
        let uri = self.relay.create_pairing().await?;
        publish_uri(Some(uri.clone()));

        if self.platform.is_mobile() {
            match self.deep_link.open(&uri, self.platform).await {
                DeepLinkOutcome::Opened(_) => {}
                DeepLinkOutcome::StoreFallback(store) => {
                    info!(store, "wallet app not installed, QR pairing still pending")
                }
                DeepLinkOutcome::Unavailable => warn!("no deep link target, QR pairing only"),
            }
        }

        let accounts = tokio::time::timeout(self.pairing_timeout, self.relay.await_approval())
            .await
            .map_err(|_| ConnectError::Timeout)??;
        let address = *accounts.first().ok_or(ConnectError::UserRejected)?;
        let chain_id = self.chain.ensure_canonical(self.relay).await?;
        info!(address = %shorten_address(address), "relay pairing approved");
        Ok(Connection {
            address,
            chain_id,
            method: ConnectionMethod::WalletConnect,
        })
    }
}
