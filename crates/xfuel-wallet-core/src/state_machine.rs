use crate::domain::ConnectionStatus;
use crate::error::ConnectError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionAction {
    Begin,
    Succeed,
    Fail,
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub from: ConnectionStatus,
    pub to: ConnectionStatus,
    pub reason: &'static str,
}

pub fn connection_transition(
    from: ConnectionStatus,
    action: ConnectionAction,
) -> Result<StateTransition, ConnectError> {
    use ConnectionAction as A;
    use ConnectionStatus as S;

    let (to, reason) = match (from, action) {
        (S::Connecting, A::Begin) => return Err(ConnectError::AlreadyConnecting),
        (S::Disconnected, A::Begin) => (S::Connecting, "connect_started"),
        // Account switch: a connected wallet is revalidated by a fresh cycle.
        (S::Connected, A::Begin) => (S::Connecting, "reconnect_started"),
        (S::Connecting, A::Succeed) => (S::Connected, "connect_succeeded"),
        (S::Connecting, A::Fail) => (S::Disconnected, "connect_failed"),
        (_, A::Disconnect) => (S::Disconnected, "disconnected"),
        (from, action) => {
            return Err(ConnectError::IllegalTransition(format!(
                "{from:?} --{action:?}-->"
            )))
        }
    };
    Ok(StateTransition { from, to, reason })
}
