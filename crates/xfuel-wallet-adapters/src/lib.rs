pub mod clock;
pub mod config;
pub mod eip1193;
pub mod linking;
pub mod price;
pub mod storage;
pub mod wc;

pub use clock::SystemClockAdapter;
pub use config::{ConfigError, WalletAdapterConfig, COINGECKO_TFUEL_URL};
pub use eip1193::Eip1193Adapter;
pub use linking::LinkOpenerAdapter;
pub use price::HttpPriceOracle;
pub use storage::{FileStorage, MemoryStorage};
pub use wc::{RelaySession, WalletConnectAdapter};
