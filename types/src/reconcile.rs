//! Balance reconciliation between the game frame and the local wallet.
//!
//! The game reports its own balance in minor units whenever it changes. The
//! first report only establishes a baseline; every later report moves the
//! wallet by the difference from the previous report. The launcher page runs
//! this logic in the browser, rendered from the constants below.

use serde_json::Value;
use std::time::Duration;

/// Minor units per major unit in game balance reports.
pub const MINOR_UNITS_PER_MAJOR: f64 = 100.0;

/// `name` of a balance report posted by the game client.
pub const BALANCE_UPDATE_NAME: &str = "post_updateBalance";

/// `event` of a balance report carried as a generic event.
pub const BALANCE_UPDATE_EVENT: &str = "updateBalance";

/// `type` of the message the launcher page posts into the game frame.
pub const BROADCAST_TYPE: &str = "WALLET_BALANCE_UPDATE";

/// How often the launcher page re-announces the wallet value.
pub const BROADCAST_INTERVAL: Duration = Duration::from_secs(1);

/// A cross-frame message the reconciler recognizes.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameMessage {
    /// `{"name": "post_updateBalance", "params": {"total": {"amount": ..}}}`
    BalanceUpdateByName { amount: Option<f64> },
    /// `{"event": "updateBalance", "params": {"total": {"amount": ..}}}`
    BalanceUpdateByEvent { amount: Option<f64> },
    /// `{"type": "WALLET_BALANCE_UPDATE", "balance": ..}`
    Broadcast { balance: Option<f64> },
}

impl FrameMessage {
    /// Classify a message. Frames post either objects or JSON-encoded strings.
    pub fn parse(data: &Value) -> Option<Self> {
        if let Value::String(raw) = data {
            let inner: Value = serde_json::from_str(raw).ok()?;
            return match inner {
                Value::String(_) => None,
                inner => Self::parse(&inner),
            };
        }
        let object = data.as_object()?;

        let amount = || {
            data.pointer("/params/total/amount")
                .and_then(Value::as_f64)
        };
        if object.get("name").and_then(Value::as_str) == Some(BALANCE_UPDATE_NAME) {
            return Some(Self::BalanceUpdateByName { amount: amount() });
        }
        if object.get("event").and_then(Value::as_str) == Some(BALANCE_UPDATE_EVENT)
            && data.pointer("/params/total").is_some_and(is_truthy)
        {
            return Some(Self::BalanceUpdateByEvent { amount: amount() });
        }
        if object.get("type").and_then(Value::as_str) == Some(BROADCAST_TYPE) {
            return Some(Self::Broadcast {
                balance: object.get("balance").and_then(Value::as_f64),
            });
        }
        None
    }

    /// Game balance in minor units, for balance reports carrying a numeric amount.
    pub fn game_amount(&self) -> Option<f64> {
        match self {
            Self::BalanceUpdateByName { amount } | Self::BalanceUpdateByEvent { amount } => *amount,
            Self::Broadcast { .. } => None,
        }
    }
}

// Browser truthiness, as the page script tests `params.total`.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub fn minor_to_major(amount: f64) -> f64 {
    amount / MINOR_UNITS_PER_MAJOR
}

/// Move a wallet balance by `delta`, never below zero.
pub fn apply_delta(wallet: f64, delta: f64) -> f64 {
    (wallet + delta).max(0.0)
}

/// Outcome of one game balance observation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Observation {
    /// First observation; recorded with no wallet effect.
    Baseline,
    /// Same as the previous observation.
    Unchanged,
    /// Difference from the previous observation, in major units.
    Delta(f64),
}

/// Per-frame reconciliation state.
///
/// The baseline is set once and then only moves with each observation; it is
/// never cleared for the lifetime of the frame.
#[derive(Clone, Debug, Default)]
pub struct Reconciler {
    baseline: Option<f64>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn baseline(&self) -> Option<f64> {
        self.baseline
    }

    /// Record a game balance in major units.
    pub fn observe(&mut self, game_balance: f64) -> Observation {
        match self.baseline.replace(game_balance) {
            None => Observation::Baseline,
            Some(previous) => {
                let delta = game_balance - previous;
                if delta == 0.0 {
                    Observation::Unchanged
                } else {
                    Observation::Delta(delta)
                }
            }
        }
    }

    /// Feed a frame message. Broadcasts and reports without a numeric amount
    /// are ignored and leave the baseline untouched.
    pub fn handle(&mut self, message: &FrameMessage) -> Option<Observation> {
        let amount = message.game_amount()?;
        Some(self.observe(minor_to_major(amount)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const EPSILON: f64 = 1e-9;

    fn report(amount: u64) -> Value {
        json!({
            "name": BALANCE_UPDATE_NAME,
            "params": { "total": { "amount": amount, "currency": "FUN" } },
        })
    }

    #[test]
    fn test_reconciles_noisy_report_sequence() {
        let mut reconciler = Reconciler::new();
        let mut wallet = 1000.0;
        let mut writes = 0;

        let mut observations = Vec::new();
        for amount in [500, 500, 620, 620, 580] {
            let message = FrameMessage::parse(&report(amount)).unwrap();
            let observation = reconciler.handle(&message).unwrap();
            if let Observation::Delta(delta) = observation {
                wallet = apply_delta(wallet, delta);
                writes += 1;
            }
            observations.push(observation);
        }

        assert_eq!(observations[0], Observation::Baseline);
        assert_eq!(observations[1], Observation::Unchanged);
        assert!(matches!(observations[2], Observation::Delta(d) if (d - 1.2).abs() < EPSILON));
        assert_eq!(observations[3], Observation::Unchanged);
        assert!(matches!(observations[4], Observation::Delta(d) if (d + 0.4).abs() < EPSILON));
        assert_eq!(writes, 2);
        assert!((wallet - 1000.80).abs() < EPSILON, "wallet = {wallet}");
    }

    #[test]
    fn test_baseline_never_rearms() {
        let mut reconciler = Reconciler::new();
        assert_eq!(reconciler.observe(5.0), Observation::Baseline);
        assert_eq!(reconciler.observe(0.0), Observation::Delta(-5.0));
        // A zero game balance is still a baseline, not an empty one.
        assert_eq!(reconciler.baseline(), Some(0.0));
        assert_eq!(reconciler.observe(3.0), Observation::Delta(3.0));
    }

    #[test]
    fn test_parses_event_shape() {
        let message = json!({
            "event": BALANCE_UPDATE_EVENT,
            "params": { "total": { "amount": 1234 } },
        });
        assert_eq!(
            FrameMessage::parse(&message),
            Some(FrameMessage::BalanceUpdateByEvent { amount: Some(1234.0) })
        );

        // Event shape requires a truthy total.
        for total in [json!(null), json!(0), json!(""), json!(false)] {
            let message = json!({ "event": BALANCE_UPDATE_EVENT, "params": { "total": total } });
            assert_eq!(FrameMessage::parse(&message), None);
        }
        let message = json!({ "event": BALANCE_UPDATE_EVENT, "params": {} });
        assert_eq!(FrameMessage::parse(&message), None);
    }

    #[test]
    fn test_parses_json_string_messages() {
        let raw = Value::String(report(250).to_string());
        assert_eq!(
            FrameMessage::parse(&raw),
            Some(FrameMessage::BalanceUpdateByName { amount: Some(250.0) })
        );
        assert_eq!(FrameMessage::parse(&json!("not json")), None);
        assert_eq!(FrameMessage::parse(&json!("\"nested\"")), None);
    }

    #[test]
    fn test_broadcasts_do_not_feed_back() {
        let mut reconciler = Reconciler::new();
        let broadcast = FrameMessage::parse(&json!({ "type": BROADCAST_TYPE, "balance": 42.5 }));
        assert_eq!(broadcast, Some(FrameMessage::Broadcast { balance: Some(42.5) }));
        assert_eq!(reconciler.handle(&broadcast.unwrap()), None);
        assert_eq!(reconciler.baseline(), None);
    }

    #[test]
    fn test_non_numeric_amount_is_ignored() {
        let mut reconciler = Reconciler::new();
        let message = json!({
            "name": BALANCE_UPDATE_NAME,
            "params": { "total": { "amount": "500" } },
        });
        let message = FrameMessage::parse(&message).unwrap();
        assert_eq!(message, FrameMessage::BalanceUpdateByName { amount: None });
        assert_eq!(reconciler.handle(&message), None);
        assert_eq!(reconciler.baseline(), None);
    }

    #[test]
    fn test_unrecognized_shapes() {
        for data in [
            json!(null),
            json!(17),
            json!([1, 2]),
            json!({ "name": "post_gameRound" }),
            json!({ "event": "spin" }),
            json!({ "type": "SOMETHING_ELSE", "balance": 1 }),
        ] {
            assert_eq!(FrameMessage::parse(&data), None, "{data}");
        }
    }

    #[test]
    fn test_apply_delta_clamps_at_zero() {
        assert_eq!(apply_delta(1.0, -5.0), 0.0);
        assert!((apply_delta(10.0, 2.5) - 12.5).abs() < EPSILON);
        assert!((minor_to_major(580.0) - 5.8).abs() < EPSILON);
    }
}
