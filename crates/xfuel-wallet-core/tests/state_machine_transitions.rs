use xfuel_wallet_core::{
    connection_transition, ConnectError, ConnectionAction, ConnectionStatus, WalletState,
};

#[test]
fn connect_happy_path_transitions() {
    let t1 = connection_transition(ConnectionStatus::Disconnected, ConnectionAction::Begin)
        .expect("disconnected -> connecting");
    assert_eq!(t1.to, ConnectionStatus::Connecting);
    let t2 =
        connection_transition(t1.to, ConnectionAction::Succeed).expect("connecting -> connected");
    assert_eq!(t2.to, ConnectionStatus::Connected);
    let t3 = connection_transition(t2.to, ConnectionAction::Disconnect)
        .expect("connected -> disconnected");
    assert_eq!(t3.to, ConnectionStatus::Disconnected);
}

#[test]
fn begin_while_connecting_is_already_connecting() {
    let err = connection_transition(ConnectionStatus::Connecting, ConnectionAction::Begin)
        .expect_err("must fail");
    assert_eq!(err, ConnectError::AlreadyConnecting);
    assert_eq!(err.user_message(), "Connection already in progress");
}

#[test]
fn connected_may_begin_a_fresh_cycle() {
    let t = connection_transition(ConnectionStatus::Connected, ConnectionAction::Begin)
        .expect("connected -> connecting");
    assert_eq!(t.to, ConnectionStatus::Connecting);
    assert_eq!(t.reason, "reconnect_started");
}

#[test]
fn disconnect_is_legal_from_every_state() {
    for from in [
        ConnectionStatus::Disconnected,
        ConnectionStatus::Connecting,
        ConnectionStatus::Connected,
    ] {
        let t = connection_transition(from, ConnectionAction::Disconnect).expect("disconnect");
        assert_eq!(t.to, ConnectionStatus::Disconnected);
    }
}

#[test]
fn outcomes_outside_connecting_are_rejected() {
    for action in [ConnectionAction::Succeed, ConnectionAction::Fail] {
        let err = connection_transition(ConnectionStatus::Disconnected, action)
            .expect_err("must fail");
        assert!(err.to_string().contains("illegal connection transition"));
    }
}

#[test]
fn connected_and_connecting_are_exclusive_in_status() {
    let mut state = WalletState::disconnected();
    assert_eq!(state.status(), ConnectionStatus::Disconnected);
    assert_eq!(state.balance, "0.00");
    state.is_connecting = true;
    assert_eq!(state.status(), ConnectionStatus::Connecting);
    state.is_connecting = false;
    state.is_connected = true;
    assert_eq!(state.status(), ConnectionStatus::Connected);
}
