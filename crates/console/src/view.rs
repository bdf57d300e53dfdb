//! Text rendering of the panel for a terminal.

use iotdash_core::{ConnectionState, GaugeView, Paint, PanelView, SliderView};

const BAR_WIDTH: usize = 24;

pub fn bar(ratio: f64, width: usize) -> String {
    let filled = ((ratio.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

pub fn gauge_line(view: &GaugeView) -> String {
    format!("sensor     {} {:>4}", bar(view.ratio(), BAR_WIDTH), view.label)
}

pub fn slider_line(view: &SliderView) -> String {
    format!("brightness {} {:>4}", bar(f64::from(view.value) / 100.0, BAR_WIDTH), view.label())
}

pub fn led_line(on: bool) -> String {
    format!("led1       {}", if on { "ON" } else { "OFF" })
}

pub fn paint_line(paint: &Paint) -> String {
    match paint {
        Paint::Led1(on) => led_line(*on),
        Paint::Brightness(view) => slider_line(view),
        Paint::Gauge(view) => gauge_line(view),
    }
}

pub fn connection_line(state: ConnectionState) -> String {
    let text = match state {
        ConnectionState::Connecting => "connecting",
        ConnectionState::Open => "open",
        ConnectionState::Closed => "closed",
    };
    format!("link       {text}")
}

pub fn panel_lines(panel: &PanelView, connection: ConnectionState) -> Vec<String> {
    vec![
        connection_line(connection),
        gauge_line(&panel.gauge),
        led_line(panel.led1),
        slider_line(&panel.slider),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use iotdash_core::render_gauge;

    #[test]
    fn bar_fills_proportionally() {
        assert_eq!(bar(0.0, 4), "[----]");
        assert_eq!(bar(0.5, 4), "[##--]");
        assert_eq!(bar(1.0, 4), "[####]");
        assert_eq!(bar(3.0, 4), "[####]");
    }

    #[test]
    fn gauge_line_shows_clamped_label() {
        let line = gauge_line(&render_gauge(130.0));
        assert!(line.ends_with("100%"));
        assert!(line.contains(&"#".repeat(BAR_WIDTH)));
    }

    #[test]
    fn panel_lists_every_widget() {
        let lines = panel_lines(&PanelView::default(), ConnectionState::Open);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "link       open");
        assert_eq!(lines[2], "led1       ON");
        assert!(lines[3].ends_with(" 50%"));
    }
}
