//! In-memory device that honours the dashboard wire contract and nothing more.

use std::f64::consts::TAU;
use std::sync::Arc;
use std::time::Duration;

use iotdash_core::OutboundCommand;
use prometheus::{IntCounter, IntGauge, Registry};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Snapshot {
    pub led1: bool,
    pub brightness: u8,
    #[serde(rename = "potPct")]
    pub pot_pct: f64,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self { led1: true, brightness: 50, pot_pct: 0.0 }
    }
}

impl Snapshot {
    pub fn to_frame(self) -> DeviceFrame {
        DeviceFrame {
            led1: Some(self.led1),
            brightness: Some(self.brightness),
            pot_pct: Some(self.pot_pct),
        }
    }
}

/// State push as it goes over the wire; absent keys are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceFrame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub led1: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(rename = "potPct", skip_serializing_if = "Option::is_none")]
    pub pot_pct: Option<f64>,
}

impl DeviceFrame {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

pub struct Metrics {
    pub registry: Registry,
    pub clients: IntGauge,
    pub commands_total: IntCounter,
    pub updates_total: IntCounter,
}

impl Metrics {
    fn new() -> Result<Self, prometheus::Error> {
        let clients = IntGauge::new("iotdash_sim_clients", "Number of connected control clients")?;
        let commands_total = IntCounter::new("iotdash_sim_commands_total", "Total control commands received")?;
        let updates_total = IntCounter::new("iotdash_sim_updates_total", "Total state updates pushed")?;

        let registry = Registry::new();
        registry.register(Box::new(clients.clone()))?;
        registry.register(Box::new(commands_total.clone()))?;
        registry.register(Box::new(updates_total.clone()))?;

        Ok(Self { registry, clients, commands_total, updates_total })
    }
}

#[derive(Clone)]
pub struct DeviceSim {
    state: Arc<RwLock<Snapshot>>,
    updates_tx: broadcast::Sender<DeviceFrame>,
    metrics: Arc<Metrics>,
}

impl DeviceSim {
    pub fn new() -> Result<Self, prometheus::Error> {
        let (updates_tx, _) = broadcast::channel(256);
        Ok(Self {
            state: Arc::new(RwLock::new(Snapshot::default())),
            updates_tx,
            metrics: Arc::new(Metrics::new()?),
        })
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub async fn snapshot(&self) -> Snapshot {
        *self.state.read().await
    }

    /// Partial updates pushed to every connected client.
    pub fn updates(&self) -> broadcast::Receiver<DeviceFrame> {
        self.updates_tx.subscribe()
    }

    /// Apply a control command. `hello` changes nothing and yields `None`;
    /// the caller answers it with a full snapshot.
    pub async fn apply(&self, command: OutboundCommand) -> Option<DeviceFrame> {
        self.metrics.commands_total.inc();
        let frame = {
            let mut state = self.state.write().await;
            match command {
                OutboundCommand::Hello => return None,
                OutboundCommand::SetLed1 { value } => {
                    state.led1 = value;
                    DeviceFrame { led1: Some(value), ..Default::default() }
                }
                OutboundCommand::SetBrightness { value } => {
                    state.brightness = value.min(100);
                    DeviceFrame { brightness: Some(state.brightness), ..Default::default() }
                }
            }
        };
        info!(?command, "Applied control command");
        self.publish(frame.clone());
        Some(frame)
    }

    pub async fn set_pot(&self, pct: f64) {
        let pct = pct.clamp(0.0, 100.0);
        {
            let mut state = self.state.write().await;
            if state.pot_pct == pct {
                return;
            }
            state.pot_pct = pct;
        }
        self.publish(DeviceFrame { pot_pct: Some(pct), ..Default::default() });
    }

    fn publish(&self, frame: DeviceFrame) {
        self.metrics.updates_total.inc();
        if self.updates_tx.send(frame).is_err() {
            debug!("No control clients connected");
        }
    }
}

/// Sensor reading for a sweep of the given period, one decimal place.
pub fn pot_reading(elapsed: Duration, period: Duration) -> f64 {
    let phase = elapsed.as_secs_f64() / period.as_secs_f64().max(f64::EPSILON);
    let raw = 50.0 - 50.0 * (phase * TAU).cos();
    (raw * 10.0).round() / 10.0
}

/// Push simulated potentiometer readings forever.
pub async fn sensor_loop(sim: DeviceSim, every: Duration, period: Duration) {
    let started = Instant::now();
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        sim.set_pot(pot_reading(started.elapsed(), period)).await;
    }
}
