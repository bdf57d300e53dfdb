//! Client-side mirror of device state and the inbound reconciler.
//!
//! Inbound frames are partial JSON objects. Each recognised key is applied on
//! its own; missing keys leave the mirror alone and unknown keys are skipped.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::render::{render_gauge, Paint, SliderView, SLIDER_DEFAULT};

pub const KEY_LED1: &str = "led1";
pub const KEY_BRIGHTNESS: &str = "brightness";
pub const KEY_POT_PCT: &str = "potPct";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("inbound frame is not valid JSON: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
    #[error("inbound frame is JSON but not an object")]
    NotAnObject,
}

/// Partial state update carried by one inbound frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    pub led1: Option<bool>,
    pub brightness: Option<f64>,
    pub pot_pct: Option<f64>,
}

impl StateDelta {
    pub fn parse(raw: &str) -> Result<Self, ReconcileError> {
        match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => Ok(Self::from_object(&map)),
            _ => Err(ReconcileError::NotAnObject),
        }
    }

    pub fn from_object(map: &Map<String, Value>) -> Self {
        let mut delta = StateDelta::default();
        if let Some(v) = map.get(KEY_LED1) {
            delta.led1 = Some(truthy(v));
        }
        if let Some(v) = map.get(KEY_BRIGHTNESS) {
            // A slider handed something it cannot read falls back to its default.
            delta.brightness = Some(numeric(v).unwrap_or_else(|| {
                debug!(value = %v, "non-numeric brightness; using slider default");
                f64::from(SLIDER_DEFAULT)
            }));
        }
        if let Some(v) = map.get(KEY_POT_PCT) {
            delta.pot_pct = Some(gauge_number(v).unwrap_or_else(|| {
                debug!(value = %v, "non-numeric potPct; rendering as 0");
                0.0
            }));
        }
        delta
    }

    pub fn is_empty(&self) -> bool {
        self.led1.is_none() && self.brightness.is_none() && self.pot_pct.is_none()
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn numeric(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Numeric coercion for the gauge: `null` and `false` read as 0, `true` as 1,
/// an empty string as 0.
fn gauge_number(v: &Value) -> Option<f64> {
    match v {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        _ => numeric(v),
    }
}

/// Local, non-authoritative mirror of the device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceState {
    pub led1: Option<bool>,
    pub brightness: Option<f64>,
    pub pot_pct: Option<f64>,
}

impl DeviceState {
    /// Pure reducer: the state after `delta` has been applied.
    pub fn reconcile(&self, delta: &StateDelta) -> DeviceState {
        DeviceState {
            led1: delta.led1.or(self.led1),
            brightness: delta.brightness.or(self.brightness),
            pot_pct: delta.pot_pct.or(self.pot_pct),
        }
    }

    /// Apply `delta` in place and return the widget updates it implies, one
    /// per key present in the delta.
    pub fn apply(&mut self, delta: &StateDelta) -> Vec<Paint> {
        *self = self.reconcile(delta);

        let mut paints = Vec::with_capacity(3);
        if let Some(on) = delta.led1 {
            paints.push(Paint::Led1(on));
        }
        if let Some(level) = delta.brightness {
            paints.push(Paint::Brightness(SliderView::from_value(level)));
        }
        if let Some(pct) = delta.pot_pct {
            paints.push(Paint::Gauge(render_gauge(pct)));
        }
        paints
    }

    /// Parse a raw inbound frame and apply it. On error the mirror is untouched.
    pub fn apply_frame(&mut self, raw: &str) -> Result<Vec<Paint>, ReconcileError> {
        let delta = StateDelta::parse(raw)?;
        Ok(self.apply(&delta))
    }
}
