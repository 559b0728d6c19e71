use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info};

use xfuel_wallet_core::{
    shorten_address, ChainConfig, PortError, ProviderEvent, ProviderMarkers, ProviderPort,
    RelayPort, USER_REJECTED_CODE,
};

use crate::{Eip1193Adapter, WalletAdapterConfig};

/// In-process WalletConnect relay. Provider calls go to the remote wallet once a
/// session is live.
#[derive(Debug, Clone)]
pub struct WalletConnectAdapter {
    project_id: Option<String>,
    auto_approve: bool,
    remote: Eip1193Adapter,
    inner: Arc<Mutex<RelayState>>,
    answers: watch::Sender<Option<PairingAnswer>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PairingAnswer {
    Approved(Vec<Address>),
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySession {
    pub topic: String,
    pub accounts: Vec<Address>,
}

#[derive(Debug, Default)]
struct RelayState {
    pairing_seq: u64,
    pending_topic: Option<String>,
    session: Option<RelaySession>,
}

impl WalletConnectAdapter {
    pub fn with_config(config: &WalletAdapterConfig, remote: Eip1193Adapter) -> Self {
        let (answers, _) = watch::channel(None);
        Self {
            project_id: config.walletconnect_project_id.clone(),
            auto_approve: config.relay_auto_approve,
            remote,
            inner: Arc::new(Mutex::new(RelayState::default())),
            answers,
        }
    }

    pub fn in_memory(project_id: &str) -> Self {
        let config = WalletAdapterConfig {
            walletconnect_project_id: Some(project_id.to_owned()),
            ..WalletAdapterConfig::default()
        };
        Self::with_config(&config, Eip1193Adapter::with_config(&config))
    }

    pub fn remote(&self) -> &Eip1193Adapter {
        &self.remote
    }

    fn state(&self) -> Result<MutexGuard<'_, RelayState>, PortError> {
        self.inner
            .lock()
            .map_err(|e| PortError::Transport(format!("wc lock poisoned: {e}")))
    }

    pub fn session(&self) -> Result<Option<RelaySession>, PortError> {
        Ok(self.state()?.session.clone())
    }

    pub fn pending_topic(&self) -> Result<Option<String>, PortError> {
        Ok(self.state()?.pending_topic.clone())
    }

    pub fn approve(&self, accounts: Vec<Address>) -> Result<(), PortError> {
        self.answer(PairingAnswer::Approved(accounts))
    }

    pub fn reject(&self) -> Result<(), PortError> {
        self.answer(PairingAnswer::Rejected)
    }

    fn answer(&self, answer: PairingAnswer) -> Result<(), PortError> {
        if self.state()?.pending_topic.is_none() {
            return Err(PortError::NotFound("no pending wc pairing".to_owned()));
        }
        self.answers.send_replace(Some(answer));
        Ok(())
    }

    fn live_session(&self) -> Result<RelaySession, PortError> {
        self.state()?
            .session
            .clone()
            .ok_or_else(|| PortError::NotFound("no live wc session".to_owned()))
    }
}

#[async_trait(?Send)]
impl ProviderPort for WalletConnectAdapter {
    fn markers(&self) -> ProviderMarkers {
        ProviderMarkers::none()
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, PortError> {
        Ok(self.live_session()?.accounts)
    }

    async fn chain_id(&self) -> Result<u64, PortError> {
        self.live_session()?;
        self.remote.chain_id().await
    }

    async fn switch_chain(&self, chain_id_hex: &str) -> Result<(), PortError> {
        self.live_session()?;
        self.remote.switch_chain(chain_id_hex).await
    }

    async fn add_chain(&self, chain: &ChainConfig) -> Result<(), PortError> {
        self.live_session()?;
        self.remote.add_chain(chain).await
    }

    async fn get_balance(&self, address: Address) -> Result<U256, PortError> {
        self.live_session()?;
        self.remote.get_balance(address).await
    }

    async fn send_transaction(&self, tx_payload: &Value) -> Result<B256, PortError> {
        self.live_session()?;
        self.remote.send_transaction(tx_payload).await
    }

    async fn personal_sign(&self, payload: &[u8], signer: Address) -> Result<Bytes, PortError> {
        self.live_session()?;
        self.remote.personal_sign(payload, signer).await
    }

    fn watch_events(&self) -> Result<(), PortError> {
        self.live_session()?;
        self.remote.watch_events()
    }

    fn unwatch_events(&self) -> Result<(), PortError> {
        self.remote.unwatch_events()
    }

    fn drain_events(&self) -> Result<Vec<ProviderEvent>, PortError> {
        let events = self.remote.drain_events()?;
        let switched = events.iter().rev().find_map(|event| match event {
            ProviderEvent::AccountsChanged { accounts, .. } => Some(accounts.clone()),
            ProviderEvent::ChainChanged { .. } => None,
        });
        if let Some(accounts) = switched {
            if let Some(session) = self.state()?.session.as_mut() {
                session.accounts = accounts;
            }
        }
        Ok(events)
    }
}

#[async_trait(?Send)]
impl RelayPort for WalletConnectAdapter {
    fn is_available(&self) -> bool {
        self.project_id.is_some()
    }

    async fn create_pairing(&self) -> Result<String, PortError> {
        let project_id = self
            .project_id
            .as_deref()
            .ok_or(PortError::NotImplemented("walletconnect project id not configured"))?;
        let uri = {
            let mut g = self.state()?;
            g.pairing_seq = g.pairing_seq.saturating_add(1);
            let topic = keccak256(format!("{project_id}:topic:{}", g.pairing_seq));
            let sym_key = keccak256(format!("{project_id}:key:{}", g.pairing_seq));
            let topic = alloy::hex::encode(topic);
            let uri = format!(
                "wc:{topic}@2?relay-protocol=irn&symKey={}",
                alloy::hex::encode(sym_key)
            );
            g.pending_topic = Some(topic);
            uri
        };
        self.answers.send_replace(None);
        debug!("wc pairing created");

        if self.auto_approve {
            let accounts = self.remote.request_accounts().await?;
            self.approve(accounts)?;
        }
        Ok(uri)
    }

    async fn await_approval(&self) -> Result<Vec<Address>, PortError> {
        let mut rx = self.answers.subscribe();
        let answer = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|e| PortError::Transport(format!("wc pairing channel closed: {e}")))?
            .clone();

        let mut g = self.state()?;
        let topic = g
            .pending_topic
            .take()
            .ok_or_else(|| PortError::NotFound("wc pairing was closed".to_owned()))?;
        match answer {
            Some(PairingAnswer::Approved(accounts)) => {
                if let Some(first) = accounts.first() {
                    info!(account = %shorten_address(*first), "wc session approved");
                }
                g.session = Some(RelaySession {
                    topic,
                    accounts: accounts.clone(),
                });
                Ok(accounts)
            }
            Some(PairingAnswer::Rejected) | None => Err(PortError::rpc(
                USER_REJECTED_CODE,
                "User rejected the session proposal.",
            )),
        }
    }

    async fn resume(&self) -> Result<Vec<Address>, PortError> {
        Ok(self.live_session()?.accounts)
    }

    async fn close(&self) -> Result<(), PortError> {
        {
            let mut g = self.state()?;
            g.pending_topic = None;
            g.session = None;
        }
        self.answers.send_replace(None);
        self.remote.unwatch_events()?;
        debug!("wc session closed");
        Ok(())
    }
}
