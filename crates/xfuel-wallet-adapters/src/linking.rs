use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::info;

use xfuel_wallet_core::{LinkOpenerPort, PortError};

use crate::WalletAdapterConfig;

/// Opens links through the OS handler. Custom wallet schemes count as
/// openable only when configured as installed; web links always are.
#[derive(Debug, Clone)]
pub struct LinkOpenerAdapter {
    installed_schemes: Vec<String>,
    launch: bool,
    opened: Arc<Mutex<Vec<String>>>,
}

impl LinkOpenerAdapter {
    pub fn with_config(config: &WalletAdapterConfig) -> Self {
        Self {
            installed_schemes: config.installed_schemes.clone(),
            launch: true,
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Records links without handing them to the OS.
    pub fn recording(installed_schemes: &[&str]) -> Self {
        Self {
            installed_schemes: installed_schemes.iter().map(|s| (*s).to_owned()).collect(),
            launch: false,
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn opened(&self) -> Result<Vec<String>, PortError> {
        self.opened
            .lock()
            .map(|g| g.clone())
            .map_err(|e| PortError::Transport(format!("link opener lock poisoned: {e}")))
    }

    fn scheme_of(url: &str) -> Option<String> {
        url.split_once(':')
            .map(|(scheme, _)| format!("{}:", scheme.to_ascii_lowercase()))
    }
}

#[async_trait(?Send)]
impl LinkOpenerPort for LinkOpenerAdapter {
    async fn can_open(&self, url: &str) -> Result<bool, PortError> {
        let scheme = Self::scheme_of(url)
            .ok_or_else(|| PortError::Validation(format!("link without scheme: {url}")))?;
        if scheme == "https:" || scheme == "http:" {
            return Ok(true);
        }
        Ok(self.installed_schemes.iter().any(|s| *s == scheme))
    }

    async fn open(&self, url: &str) -> Result<(), PortError> {
        if self.launch {
            open::that(url).map_err(|e| PortError::Transport(format!("open link failed: {e}")))?;
        }
        info!(scheme = Self::scheme_of(url).as_deref().unwrap_or("?"), "link opened");
        self.opened
            .lock()
            .map_err(|e| PortError::Transport(format!("link opener lock poisoned: {e}")))?
            .push(url.to_owned());
        Ok(())
    }
}
