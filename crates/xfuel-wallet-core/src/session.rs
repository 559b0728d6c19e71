use alloy::primitives::Address;
use tracing::{debug, warn};

use crate::domain::{shorten_address, ConnectionMethod, SessionRecord, TimestampMs};
use crate::error::ConnectError;
use crate::ports::{ClockPort, PortError, StoragePort};

pub const ADDRESS_KEY: &str = "xfuel_wallet_address";
pub const METHOD_KEY: &str = "xfuel_connection_method";
pub const TIMESTAMP_KEY: &str = "xfuel_session_ts";

pub const SESSION_TTL_MS: u64 = 24 * 60 * 60 * 1000;

/// Persisted `{address, method, timestamp}` triple with a fixed TTL.
///
/// Every storage failure degrades to "no session"; nothing here returns an error.
pub struct SessionStore<S, C> {
    storage: S,
    clock: C,
    ttl_ms: u64,
}

impl<S, C> SessionStore<S, C>
where
    S: StoragePort,
    C: ClockPort,
{
    pub fn new(storage: S, clock: C) -> Self {
        Self::with_ttl(storage, clock, SESSION_TTL_MS)
    }

    pub fn with_ttl(storage: S, clock: C, ttl_ms: u64) -> Self {
        Self {
            storage,
            clock,
            ttl_ms,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub async fn save(&self, address: Address, method: ConnectionMethod) {
        let now = match self.clock.now_ms() {
            Ok(now) => now,
            Err(e) => {
                warn!(error = %e, "clock unavailable, session not saved");
                return;
            }
        };
        let writes = [
            (ADDRESS_KEY, address.to_string()),
            (METHOD_KEY, method.storage_key().to_owned()),
            (TIMESTAMP_KEY, now.to_string()),
        ];
        for (key, value) in &writes {
            if let Err(e) = self.storage.set(key, value).await {
                warn!(key, error = %e, "failed to save session, clearing partial record");
                self.clear().await;
                return;
            }
        }
        debug!(address = %shorten_address(address), ?method, "session saved");
    }

    /// Returns the stored session if it is present, well-formed and fresh.
    /// Stale or malformed records are deleted.
    pub async fn load(&self) -> Option<SessionRecord> {
        let raw = match self.read_raw().await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "session storage unavailable, treating as no session");
                return None;
            }
        };
        if raw.iter().all(Option::is_none) {
            return None;
        }
        let now = match self.clock.now_ms() {
            Ok(now) => now,
            Err(e) => {
                warn!(error = %e, "clock unavailable, treating as no session");
                return None;
            }
        };
        match self.parse(raw, now) {
            Ok(record) => Some(record),
            Err(reason) => {
                debug!(%reason, "dropping stored session");
                self.clear().await;
                None
            }
        }
    }

    pub async fn clear(&self) {
        for key in [ADDRESS_KEY, METHOD_KEY, TIMESTAMP_KEY] {
            if let Err(e) = self.storage.remove(key).await {
                warn!(key, error = %e, "failed to clear session key");
            }
        }
    }

    async fn read_raw(&self) -> Result<[Option<String>; 3], PortError> {
        let mut raw: [Option<String>; 3] = Default::default();
        for (slot, key) in raw.iter_mut().zip([ADDRESS_KEY, METHOD_KEY, TIMESTAMP_KEY]) {
            *slot = self.storage.get(key).await?.filter(|v| !v.is_empty());
        }
        Ok(raw)
    }

    fn parse(
        &self,
        [address, method, timestamp]: [Option<String>; 3],
        now: u64,
    ) -> Result<SessionRecord, ConnectError> {
        let (Some(address), Some(timestamp)) = (address, timestamp) else {
            return Err(ConnectError::SessionInvalid(
                "partial session record".to_owned(),
            ));
        };

        let address: Address = address
            .parse()
            .map_err(|e| ConnectError::SessionInvalid(format!("bad address: {e}")))?;
        let connection_method = method
            .as_deref()
            .and_then(ConnectionMethod::from_storage_key)
            .ok_or_else(|| ConnectError::SessionInvalid(format!("bad method: {method:?}")))?;
        let created_at_ms = timestamp
            .parse::<u64>()
            .map(TimestampMs)
            .map_err(|e| ConnectError::SessionInvalid(format!("bad timestamp: {e}")))?;

        let record = SessionRecord {
            address,
            connection_method,
            created_at_ms,
        };
        if record.age_ms(TimestampMs(now)) > self.ttl_ms {
            return Err(ConnectError::SessionExpired);
        }
        Ok(record)
    }
}
