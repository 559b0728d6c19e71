use alloy::primitives::{Address, U256};

use crate::ports::{PortError, ProviderPort};

/// Balance shown when nothing has been fetched yet.
pub const ZERO_BALANCE: &str = "0.00";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBalance {
    pub wei: U256,
    pub formatted: String,
}

/// Stateless native-balance lookup.
#[derive(Debug, Clone, Copy)]
pub struct BalanceFetcher {
    decimals: u8,
}

impl BalanceFetcher {
    pub fn new(decimals: u8) -> Self {
        Self { decimals }
    }

    pub async fn fetch<P>(&self, provider: &P, address: Address) -> Result<FetchedBalance, PortError>
    where
        P: ProviderPort + ?Sized,
    {
        let wei = provider.get_balance(address).await?;
        Ok(FetchedBalance {
            wei,
            formatted: format_balance(wei, self.decimals),
        })
    }
}

/// Formats a base-unit amount with two decimals (half-up) and thousands separators.
pub fn format_balance(amount: U256, decimals: u8) -> String {
    let cents = scale_to_cents(amount, decimals);
    format_cents(cents)
}

/// Formats `amount × price_usd` as `$1,234.56`.
pub fn format_usd(amount: U256, decimals: u8, price_usd: f64) -> Option<String> {
    if !price_usd.is_finite() || price_usd < 0.0 {
        return None;
    }
    // Price carried with 6 decimals of precision.
    let micro_price = U256::from((price_usd * 1_000_000.0).round() as u128);
    let scaled = amount.checked_mul(micro_price)?;
    let cents = scale_to_cents(scaled, decimals.saturating_add(6));
    Some(format!("${}", format_cents(cents)))
}

fn scale_to_cents(amount: U256, decimals: u8) -> U256 {
    if decimals < 2 {
        let factor = U256::from(10u64).pow(U256::from(2 - decimals));
        return amount.saturating_mul(factor);
    }
    let divisor = U256::from(10u64).pow(U256::from(decimals - 2));
    let half = divisor / U256::from(2u64);
    amount.saturating_add(half) / divisor
}

fn format_cents(cents: U256) -> String {
    let hundred = U256::from(100u64);
    let whole = (cents / hundred).to_string();
    let frac = (cents % hundred).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{grouped}.{frac:0>2}")
}
