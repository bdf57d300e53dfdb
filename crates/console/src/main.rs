use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use iotdash_core::{ConnectionState, PanelView};
use iotdash_link::{LinkConfig, Session, SessionEvent, UiEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod input;
mod view;

use input::Input;

/// Terminal control surface for the dashboard device.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Host the dashboard was served from; any `:port` suffix is dropped.
    #[arg(long)]
    host: Option<String>,
    /// Device control socket port.
    #[arg(long)]
    port: Option<u16>,
    /// Slider quiet period before brightness is sent, in milliseconds.
    #[arg(long)]
    debounce_ms: Option<u64>,
    /// Reconnect attempts after the link drops (0 disables).
    #[arg(long)]
    reconnect_attempts: Option<u32>,
}

impl Cli {
    fn link_config(&self) -> LinkConfig {
        let mut cfg = LinkConfig::from_env();
        if let Some(host) = &self.host {
            cfg.page_host = host.clone();
        }
        if let Some(port) = self.port {
            cfg.control_port = port;
        }
        if let Some(ms) = self.debounce_ms {
            cfg.debounce = Duration::from_millis(ms);
        }
        if let Some(n) = self.reconnect_attempts {
            cfg.reconnect.max_attempts = n;
        }
        cfg
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing()?;
    let cli = Cli::parse();

    let session = Session::new(cli.link_config());
    eprintln!("Connecting to {}", session.endpoint());
    let mut events = session.events();
    let (ui_tx, ui_rx) = mpsc::channel(64);
    let link = tokio::spawn(session.run(ui_rx));

    let mut panel = PanelView::default();
    let mut connection = ConnectionState::Connecting;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", input::HELP);
    for line in view::panel_lines(&panel, connection) {
        println!("{line}");
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SessionEvent::Paint(paint)) => {
                    panel.paint(&paint);
                    println!("{}", view::paint_line(&paint));
                }
                Ok(SessionEvent::Connection(state)) => {
                    connection = state;
                    println!("{}", view::connection_line(state));
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Display fell behind session events"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                let parsed = match input::parse(&line) {
                    Ok(Some(parsed)) => parsed,
                    Ok(None) => continue,
                    Err(e) => {
                        eprintln!("{e}");
                        continue;
                    }
                };
                let ui_events = match parsed {
                    Input::Led(action) => vec![UiEvent::Led1Changed(action.resolve(panel.led1))],
                    Input::Brightness(v) => vec![UiEvent::BrightnessInput(v)],
                    Input::Drag(values) => values.into_iter().map(UiEvent::BrightnessInput).collect(),
                    Input::State => {
                        for l in view::panel_lines(&panel, connection) {
                            println!("{l}");
                        }
                        Vec::new()
                    }
                    Input::Help => {
                        println!("{}", input::HELP);
    for line in view::panel_lines(&panel, connection) {
        println!("{line}");
    }
                        Vec::new()
                    }
                    Input::Quit => break,
                };
                for event in ui_events {
                    ui_tx.send(event).await.context("device link task stopped")?;
                }
            }
        }
    }

    drop(ui_tx);
    link.await.context("device link task panicked")?;
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,tokio_tungstenite=warn,tungstenite=warn"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
    Ok(())
}
