use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use xfuel_wallet_core::{ClockPort, PortError, PriceOraclePort, PriceSnapshot, TimestampMs};

use crate::{SystemClockAdapter, WalletAdapterConfig};

/// TFUEL/USD quotes from a primary CoinGecko-style endpoint with an optional
/// DEX fallback, cached in memory.
#[derive(Debug, Clone)]
pub struct HttpPriceOracle<C = SystemClockAdapter> {
    client: reqwest::Client,
    primary: Url,
    secondary: Option<Url>,
    cache_ttl_ms: u64,
    clock: C,
    cache: Arc<Mutex<Option<PriceSnapshot>>>,
}

impl HttpPriceOracle<SystemClockAdapter> {
    pub fn with_config(config: &WalletAdapterConfig) -> Result<Self, PortError> {
        Self::with_clock(config, SystemClockAdapter)
    }
}

impl<C: ClockPort> HttpPriceOracle<C> {
    pub fn with_clock(config: &WalletAdapterConfig, clock: C) -> Result<Self, PortError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.rpc_timeout_ms))
            .build()
            .map_err(|e| PortError::Transport(format!("failed to initialize price client: {e}")))?;
        Ok(Self {
            client,
            primary: config.price_primary_url.clone(),
            secondary: config.price_secondary_url.clone(),
            cache_ttl_ms: config.price_cache_ttl_ms,
            clock,
            cache: Arc::new(Mutex::new(None)),
        })
    }

    fn cached(&self) -> Result<Option<PriceSnapshot>, PortError> {
        self.cache
            .lock()
            .map(|g| *g)
            .map_err(|e| PortError::Transport(format!("price cache lock poisoned: {e}")))
    }

    fn store(&self, snapshot: PriceSnapshot) -> Result<(), PortError> {
        *self
            .cache
            .lock()
            .map_err(|e| PortError::Transport(format!("price cache lock poisoned: {e}")))? =
            Some(snapshot);
        Ok(())
    }

    async fn fetch_json(&self, url: &Url) -> Result<Value, PortError> {
        let response = self
            .client
            .get(url.clone())
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("price request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PortError::Transport(format!(
                "price endpoint returned {status}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| PortError::Transport(format!("price json decode failed: {e}")))
    }

    async fn fetch_price(&self) -> Result<f64, PortError> {
        let primary = match self.fetch_json(&self.primary).await {
            Ok(body) => parse_coingecko(&body),
            Err(e) => Err(e),
        };
        let err = match primary {
            Ok(price) => return Ok(price),
            Err(e) => e,
        };
        let Some(secondary) = &self.secondary else {
            return Err(err);
        };
        warn!(error = %err, "primary price source failed, trying secondary");
        let body = self.fetch_json(secondary).await?;
        parse_dex(&body)
    }
}

fn positive(price: f64) -> Result<f64, PortError> {
    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(PortError::Validation(format!("unusable price {price}")))
    }
}

/// `{"theta-fuel":{"usd":0.05}}`
fn parse_coingecko(body: &Value) -> Result<f64, PortError> {
    let price = body
        .get("theta-fuel")
        .and_then(|v| v.get("usd"))
        .and_then(Value::as_f64)
        .ok_or_else(|| PortError::Validation(format!("unexpected price payload: {body}")))?;
    positive(price)
}

/// `{"price": "0.05"}` or `{"price": 0.05}`
fn parse_dex(body: &Value) -> Result<f64, PortError> {
    let price = match body.get("price") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| PortError::Validation(format!("unexpected dex price payload: {body}")))?;
    positive(price)
}

#[async_trait(?Send)]
impl<C: ClockPort> PriceOraclePort for HttpPriceOracle<C> {
    async fn get_prices(&self, bypass_cache: bool) -> Result<PriceSnapshot, PortError> {
        let now = self.clock.now_ms()?;
        let cached = self.cached()?;
        if !bypass_cache {
            if let Some(snapshot) = cached {
                if now.saturating_sub(snapshot.fetched_at_ms.0) < self.cache_ttl_ms {
                    debug!("price served from cache");
                    return Ok(snapshot);
                }
            }
        }

        match self.fetch_price().await {
            Ok(tfuel_usd) => {
                let snapshot = PriceSnapshot {
                    tfuel_usd,
                    fetched_at_ms: TimestampMs(now),
                };
                self.store(snapshot)?;
                Ok(snapshot)
            }
            Err(e) => match cached {
                Some(stale) => {
                    warn!(error = %e, "price sources failed, serving stale quote");
                    Ok(stale)
                }
                None => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_both_payload_shapes() {
        let cg = parse_coingecko(&json!({"theta-fuel": {"usd": 0.0512}})).expect("coingecko");
        assert!((cg - 0.0512).abs() < f64::EPSILON);
        let dex = parse_dex(&json!({"price": "0.049"})).expect("dex string");
        assert!((dex - 0.049).abs() < f64::EPSILON);
        assert!(parse_dex(&json!({"price": 0.049})).is_ok());
        assert!(parse_coingecko(&json!({"theta": {"usd": 1.0}})).is_err());
        assert!(parse_dex(&json!({"price": "0"})).is_err());
    }
}
