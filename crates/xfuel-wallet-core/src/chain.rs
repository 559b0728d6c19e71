use tracing::{debug, warn};

use crate::domain::ChainConfig;
use crate::error::ConnectError;
use crate::ports::{PortError, ProviderPort};

#[derive(Debug, Clone)]
pub struct ChainConfigManager {
    canonical: ChainConfig,
}

impl ChainConfigManager {
    pub fn new(canonical: ChainConfig) -> Self {
        Self { canonical }
    }

    pub fn canonical(&self) -> &ChainConfig {
        &self.canonical
    }

    pub fn is_canonical(&self, chain_id: u64) -> bool {
        chain_id == self.canonical.chain_id
    }

    /// Makes sure `provider` is on the canonical chain, switching (and adding
    /// the chain once if the wallet does not know it) when it is not.
    /// Returns the verified chain id.
    pub async fn ensure_canonical<P>(&self, provider: &P) -> Result<u64, ConnectError>
    where
        P: ProviderPort + ?Sized,
    {
        let current = provider.chain_id().await?;
        if self.is_canonical(current) {
            return Ok(current);
        }

        debug!(
            current,
            target = self.canonical.chain_id,
            "provider on foreign chain, requesting switch"
        );
        let hex = self.canonical.chain_id_hex();
        match provider.switch_chain(&hex).await {
            Ok(()) => {}
            Err(err) if err.is_unrecognized_chain() => {
                provider
                    .add_chain(&self.canonical)
                    .await
                    .map_err(|e| switch_failed("add chain", e))?;
                provider
                    .switch_chain(&hex)
                    .await
                    .map_err(|e| switch_failed("switch after add", e))?;
            }
            Err(err) => return Err(switch_failed("switch", err)),
        }

        let after = provider
            .chain_id()
            .await
            .map_err(|e| switch_failed("read chain after switch", e))?;
        if !self.is_canonical(after) {
            return Err(ConnectError::ChainSwitchFailed(format!(
                "provider still on chain {after} after switch"
            )));
        }
        Ok(after)
    }
}

fn switch_failed(step: &str, err: PortError) -> ConnectError {
    warn!(step, error = %err, "chain switch step failed");
    ConnectError::ChainSwitchFailed(format!("{step}: {err}"))
}
