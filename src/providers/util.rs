use crate::core::error::RatesError;
use crate::core::rates::RateSnapshot;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Response shape shared by the supported providers:
/// `{ "base": "USD", "rates": { "EUR": 0.92, ... } }`.
#[derive(Debug, Deserialize)]
pub struct RatesBody {
    pub base: Option<String>,
    pub rates: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: bool,
    message: Option<String>,
    description: Option<String>,
}

/// Parses a provider body into its base currency and rate snapshot.
pub fn decode_rates(
    provider: &str,
    body: &str,
) -> Result<(Option<String>, RateSnapshot), RatesError> {
    if body.trim().is_empty() {
        return Err(RatesError::decode(provider, "empty response body"));
    }

    if let Ok(ErrorBody {
        error: true,
        message,
        description,
    }) = serde_json::from_str::<ErrorBody>(body)
    {
        let reason = description
            .or(message)
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(RatesError::decode(provider, format!("provider error: {reason}")));
    }

    let parsed: RatesBody = serde_json::from_str(body)
        .map_err(|e| RatesError::decode(provider, format!("{e}. Response: '{body}'")))?;

    let rates = parsed
        .rates
        .iter()
        .map(|(code, value)| {
            to_decimal(value)
                .map(|rate| (code.as_str(), rate))
                .ok_or_else(|| {
                    RatesError::decode(provider, format!("invalid rate for {code}: {value}"))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let snapshot = RateSnapshot::try_new(rates).map_err(|e| RatesError::decode(provider, e))?;
    let base = parsed.base.map(|b| b.trim().to_uppercase());
    Ok((base, snapshot))
}

/// Converts one JSON rate into a non-negative decimal.
///
/// Strings and integers convert exactly. Fractional JSON numbers have already
/// been read as `f64`, so they go through `float_to_decimal`.
fn to_decimal(value: &Value) -> Option<Decimal> {
    let rate = match value {
        Value::String(s) => Decimal::from_str_exact(s.trim())
            .or_else(|_| Decimal::from_scientific(s.trim()))
            .ok()?,
        Value::Number(n) => match (n.as_u64(), n.as_i64()) {
            (Some(u), _) => Decimal::from(u),
            (None, Some(i)) => Decimal::from(i),
            _ => float_to_decimal(n.as_f64()?)?,
        },
        _ => return None,
    };
    (!rate.is_sign_negative() || rate.is_zero()).then_some(rate)
}

/// Explicit lossy step from binary float to decimal.
pub fn float_to_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value)
}
