//! Outbound producers for the two controls.
//!
//! Both emitters push into the session's outbound queue and never look at the
//! result; delivery failure is invisible to them.

use std::time::Duration;

use iotdash_core::{OutboundCommand, SliderView};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

pub type Outbound = UnboundedSender<OutboundCommand>;

#[derive(Debug, Clone)]
pub struct ToggleEmitter {
    tx: Outbound,
}

impl ToggleEmitter {
    pub fn new(tx: Outbound) -> Self {
        Self { tx }
    }

    pub fn changed(&self, checked: bool) {
        if self.tx.send(OutboundCommand::SetLed1 { value: checked }).is_err() {
            debug!("outbound queue closed; dropping set_led1");
        }
    }
}

/// Single pending delayed send. Arming aborts whatever was armed before.
#[derive(Debug, Default)]
pub struct DebounceSlot {
    pending: Option<JoinHandle<()>>,
}

impl DebounceSlot {
    pub fn arm(&mut self, delay: Duration, tx: Outbound, command: OutboundCommand) {
        self.cancel();
        self.pending = Some(tokio::spawn(async move {
            sleep(delay).await;
            if tx.send(command).is_err() {
                debug!(?command, "outbound queue closed; dropping debounced send");
            }
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

#[derive(Debug)]
pub struct BrightnessEmitter {
    tx: Outbound,
    window: Duration,
    slot: DebounceSlot,
}

impl BrightnessEmitter {
    pub fn new(tx: Outbound, window: Duration) -> Self {
        Self { tx, window, slot: DebounceSlot::default() }
    }

    /// Handle one slider input event. Returns the local repaint immediately;
    /// the command goes out once input has been quiet for the window.
    pub fn input(&mut self, value: u8) -> SliderView {
        let view = SliderView::from_value(f64::from(value));
        self.slot.arm(
            self.window,
            self.tx.clone(),
            OutboundCommand::SetBrightness { value: view.value },
        );
        view
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_pending()
    }
}
