use thiserror::Error;

use crate::ports::PortError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("a connection attempt is already in progress")]
    AlreadyConnecting,
    #[error("user rejected the wallet request")]
    UserRejected,
    #[error("no wallet provider available on this platform")]
    NoProviderAvailable,
    #[error("chain switch failed: {0}")]
    ChainSwitchFailed(String),
    #[error("stored session expired")]
    SessionExpired,
    #[error("stored session invalid: {0}")]
    SessionInvalid(String),
    #[error("wallet pairing timed out")]
    Timeout,
    #[error("connection attempt superseded by a newer action")]
    Superseded,
    #[error("illegal connection transition: {0}")]
    IllegalTransition(String),
    #[error("wallet error: {0}")]
    Unknown(String),
}

impl ConnectError {
    /// Single user-facing message per error case.
    pub fn user_message(&self) -> &'static str {
        match self {
            ConnectError::AlreadyConnecting => "Connection already in progress",
            ConnectError::UserRejected => "Connection rejected by user",
            ConnectError::NoProviderAvailable => {
                "No wallet detected. Scan the QR code or open Theta Wallet"
            }
            ConnectError::ChainSwitchFailed(_) => "Please switch to Theta network",
            ConnectError::SessionExpired | ConnectError::SessionInvalid(_) => {
                "Session expired, please reconnect"
            }
            ConnectError::Timeout => "Wallet did not respond in time",
            ConnectError::Superseded => "Connection cancelled",
            ConnectError::IllegalTransition(_) | ConnectError::Unknown(_) => {
                "Failed to connect wallet"
            }
        }
    }

    /// The attempt was replaced by a newer user action; nothing to show.
    pub fn is_silent(&self) -> bool {
        matches!(self, ConnectError::Superseded)
    }

    /// Whether the caller may simply try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConnectError::UserRejected
                | ConnectError::ChainSwitchFailed(_)
                | ConnectError::Timeout
                | ConnectError::Unknown(_)
        )
    }
}

impl From<PortError> for ConnectError {
    fn from(err: PortError) -> Self {
        if err.is_user_rejection() {
            return ConnectError::UserRejected;
        }
        ConnectError::Unknown(err.to_string())
    }
}
