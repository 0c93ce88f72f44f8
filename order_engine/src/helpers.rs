//! Small shared helpers: price parsing, retry backoff and shop-domain validation.
use chrono::Duration;
use oms_common::Money;
use regex::Regex;
use thiserror::Error;

/// Ceiling on the retry delay, per the backoff schedule `min(60 * 2^(attempts-1), 960)` seconds.
pub const MAX_BACKOFF_SECS: i64 = 960;
const BASE_BACKOFF_SECS: i64 = 60;

#[derive(Debug, Clone, Error)]
#[error("Invalid price value: {0}")]
pub struct PriceParseError(String);

/// The platform expresses prices as decimal strings ("50.00"). Convert to minor units.
pub fn parse_decimal_price(price: &str) -> Result<Money, PriceParseError> {
    let mut parts = price.trim().split('.');
    let whole_units = parts
        .next()
        .ok_or_else(|| PriceParseError(price.to_string()))?
        .parse::<i64>()
        .map_err(|e| PriceParseError(format!("{price}. {e}.")))?;
    let cents = match parts.next() {
        None => 0,
        Some(frac) => {
            // Normalize the fractional part to exactly two digits so "50.5" means 50 cents, not 5.
            let padded = format!("{frac:0<2}");
            padded[..2].parse::<i64>().map_err(|e| PriceParseError(format!("{price}. {e}.")))?
        },
    };
    if parts.next().is_some() {
        return Err(PriceParseError(price.to_string()));
    }
    let sign = if whole_units < 0 { -1 } else { 1 };
    Ok(Money::from_cents(whole_units * 100 + sign * cents))
}

/// Delay before the next delivery attempt. `attempts` is the number of attempts already made (>= 1).
/// The sequence is 60s, 120s, 240s, 480s, 960s, 960s, ... — non-decreasing and capped.
pub fn retry_backoff(attempts: i64) -> Duration {
    let exponent = (attempts - 1).clamp(0, 32) as u32;
    let delay = BASE_BACKOFF_SECS.saturating_mul(2i64.saturating_pow(exponent)).min(MAX_BACKOFF_SECS);
    Duration::seconds(delay)
}

/// Sanity check on the shop-domain header before it is used to look up an integration.
pub fn is_valid_shop_domain(domain: &str) -> bool {
    if domain.len() > 255 {
        return false;
    }
    let re = Regex::new(r"^[a-z0-9][a-z0-9-]*(\.[a-z0-9][a-z0-9-]*)+$").unwrap();
    re.is_match(&domain.to_ascii_lowercase())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_prices() {
        assert_eq!(parse_decimal_price("50.00").unwrap().value(), 5_000);
        assert_eq!(parse_decimal_price("398").unwrap().value(), 39_800);
        assert_eq!(parse_decimal_price("0.99").unwrap().value(), 99);
        assert_eq!(parse_decimal_price("50.5").unwrap().value(), 5_050);
        assert_eq!(parse_decimal_price("-12.25").unwrap().value(), -1_225);
        assert!(parse_decimal_price("1.2.3").is_err());
        assert!(parse_decimal_price("free").is_err());
    }

    #[test]
    fn backoff_schedule_is_monotone_and_capped() {
        let delays: Vec<i64> = (1..=8).map(|n| retry_backoff(n).num_seconds()).collect();
        assert_eq!(delays, vec![60, 120, 240, 480, 960, 960, 960, 960]);
        for pair in delays.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn shop_domain_validation() {
        assert!(is_valid_shop_domain("my-shop.myshopify.com"));
        assert!(is_valid_shop_domain("store.example.co"));
        assert!(!is_valid_shop_domain("no_dots"));
        assert!(!is_valid_shop_domain("bad domain.com"));
        assert!(!is_valid_shop_domain(""));
    }
}
