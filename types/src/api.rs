//! JSON bodies of the wallet endpoints.

use serde::{Deserialize, Serialize};

/// Play-money currency reported alongside the wallet balance.
pub const CURRENCY: &str = "FUN";

/// Body of `GET /api/wallet/balance`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub balance: f64,
    pub currency: String,
}

impl BalanceResponse {
    pub fn new(balance: f64) -> Self {
        Self {
            balance,
            currency: CURRENCY.to_string(),
        }
    }
}

/// Body of `POST /api/wallet/sync`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SyncRequest {
    pub balance: BalanceValue,
}

/// The page sends a number, but hand-written clients often send a string.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BalanceValue {
    Number(f64),
    Text(String),
}

impl BalanceValue {
    /// The finite value carried, if any.
    pub fn to_finite(&self) -> Option<f64> {
        let value = match self {
            Self::Number(value) => *value,
            Self::Text(text) => text.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

/// Reply of `POST /api/wallet/sync`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub balance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl SyncResponse {
    pub fn ok(balance: f64) -> Self {
        Self {
            success: true,
            balance: Some(balance),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            balance: None,
            error: Some(error.into()),
        }
    }
}
