use std::time::Duration;

use serde::Deserialize;
use serde::de::{self, Deserializer};
use serde_json::{Map, Value};
use tracing::warn;

use crate::controller::MIN_PERIOD;

/// Per-key settings from the property inspector.
///
/// The inspector may send numbers and booleans as strings; both forms are
/// accepted.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CounterSettings {
    #[serde(deserialize_with = "lenient_u64")]
    pub period_ms: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub long_press_ms: u64,
    #[serde(deserialize_with = "lenient_bool")]
    pub lock_reset_while_running: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub start_on_appear: bool,
}

impl Default for CounterSettings {
    fn default() -> Self {
        Self {
            period_ms: 1000,
            long_press_ms: 500,
            lock_reset_while_running: true,
            start_on_appear: false,
        }
    }
}

impl CounterSettings {
    /// Tick period, raised to the controller's minimum.
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms).max(MIN_PERIOD)
    }

    pub fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }
}

pub fn parse_settings(v: &Map<String, Value>) -> CounterSettings {
    match serde_json::from_value(Value::Object(v.clone())) {
        Ok(settings) => settings,
        Err(err) => {
            warn!(%err, "invalid counter settings, using defaults");
            CounterSettings::default()
        }
    }
}

fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| de::Error::custom(format!("expected a non-negative integer, got {n}"))),
        Value::String(s) => s.trim().parse().map_err(de::Error::custom),
        other => Err(de::Error::custom(format!("expected a number, got {other}"))),
    }
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    match Value::deserialize(d)? {
        Value::Bool(b) => Ok(b),
        Value::String(s) => match s.trim() {
            "true" | "on" | "1" => Ok(true),
            "false" | "off" | "0" | "" => Ok(false),
            other => Err(de::Error::custom(format!("expected a boolean, got {other:?}"))),
        },
        Value::Number(n) => Ok(n.as_u64().is_some_and(|n| n != 0)),
        other => Err(de::Error::custom(format!("expected a boolean, got {other}"))),
    }
}
