//! Pure view computations for the dashboard widgets.
//!
//! Nothing in here touches a drawing surface: inputs are raw values from the
//! device mirror or from user input, outputs are the visual parameters a
//! presentation layer needs.

use std::f64::consts::PI;

/// Radius of the gauge's half-circle path in its 100x60 viewport.
pub const GAUGE_RADIUS: f64 = 40.0;

/// Stroke length of the full gauge arc. Fixed for the drawn geometry.
pub const GAUGE_ARC_LEN: f64 = PI * GAUGE_RADIUS;

pub fn clamp_pct(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct GaugeView {
    /// Filled dash length along the arc.
    pub fill: f64,
    /// Total dash pattern length (always [`GAUGE_ARC_LEN`]).
    pub total: f64,
    pub label: String,
}

impl GaugeView {
    pub fn ratio(&self) -> f64 {
        self.fill / self.total
    }
}

impl Default for GaugeView {
    fn default() -> Self {
        render_gauge(0.0)
    }
}

/// Map a percentage onto the gauge arc. Out-of-range input is clamped.
pub fn render_gauge(percent: f64) -> GaugeView {
    let clamped = clamp_pct(percent);
    GaugeView {
        fill: clamped / 100.0 * GAUGE_ARC_LEN,
        total: GAUGE_ARC_LEN,
        label: format!("{}%", clamped.round() as u8),
    }
}

/// Slider position before any state has arrived, and the fallback for input
/// the slider cannot read.
pub const SLIDER_DEFAULT: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliderView {
    pub value: u8,
}

impl SliderView {
    /// Snap an arbitrary value onto the 0..=100 integer slider.
    pub fn from_value(value: f64) -> Self {
        Self { value: clamp_pct(value).round() as u8 }
    }

    pub fn label(&self) -> String {
        format!("{}%", self.value)
    }
}

impl Default for SliderView {
    fn default() -> Self {
        Self { value: SLIDER_DEFAULT }
    }
}

/// A single widget update produced by the reconciler or by user input.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Led1(bool),
    Brightness(SliderView),
    Gauge(GaugeView),
}

/// Local UI state as currently shown. User input changes it optimistically,
/// inbound device state overwrites it.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelView {
    pub led1: bool,
    pub slider: SliderView,
    pub gauge: GaugeView,
}

impl Default for PanelView {
    fn default() -> Self {
        Self {
            led1: true,
            slider: SliderView::default(),
            gauge: GaugeView::default(),
        }
    }
}

impl PanelView {
    pub fn paint(&mut self, paint: &Paint) {
        match paint {
            Paint::Led1(on) => self.led1 = *on,
            Paint::Brightness(view) => self.slider = *view,
            Paint::Gauge(view) => self.gauge = view.clone(),
        }
    }
}
