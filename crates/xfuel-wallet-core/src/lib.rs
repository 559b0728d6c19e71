pub mod balance;
pub mod chain;
pub mod deep_link;
pub mod domain;
pub mod error;
pub mod manager;
pub mod platform;
pub mod ports;
pub mod session;
pub mod state_machine;
pub mod strategy;

pub use balance::{format_balance, format_usd, BalanceFetcher, FetchedBalance, ZERO_BALANCE};
pub use chain::ChainConfigManager;
pub use deep_link::{DeepLinkOpener, DeepLinkOutcome};
pub use domain::{
    shorten_address, ChainConfig, ConnectionMethod, ConnectionStatus, NativeCurrency,
    PriceSnapshot, ProviderEvent, ProviderEventKind, ProviderMarkers, SessionHandle,
    SessionRecord, TimestampMs, WalletState,
};
pub use error::ConnectError;
pub use manager::{BridgeOutcome, ConnectionManager, ManagerConfig, Signer};
pub use platform::{detect_platform, EnvironmentSignals, Platform};
pub use ports::{
    ClockPort, LinkOpenerPort, PortError, PriceOraclePort, ProviderPort, RelayPort, StoragePort,
    UNRECOGNIZED_CHAIN_CODE, USER_REJECTED_CODE,
};
pub use session::{SessionStore, SESSION_TTL_MS};
pub use state_machine::{connection_transition, ConnectionAction, StateTransition};
pub use strategy::{select_strategies, Connection, Strategy};
