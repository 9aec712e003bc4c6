use std::sync::{Mutex, PoisonError};

/// Process-wide play-money balance.
///
/// Writers race on last-write-wins terms; the lock only keeps each read and
/// write whole.
#[derive(Debug)]
pub struct Wallet {
    balance: Mutex<f64>,
}

impl Wallet {
    pub fn new(initial: f64) -> Self {
        Self {
            balance: Mutex::new(clamp(initial)),
        }
    }

    pub fn get(&self) -> f64 {
        *self.balance.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrite the balance and return the stored value.
    pub fn set(&self, value: f64) -> f64 {
        let value = clamp(value);
        *self.balance.lock().unwrap_or_else(PoisonError::into_inner) = value;
        value
    }
}

fn clamp(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}
