use std::error::Error;
use std::time::Duration;

use iotdash_core::{ConnectionState, OutboundCommand, Paint, SliderView};
use iotdash_link::{LinkConfig, ReconnectPolicy, Session, SessionEvent, UiEvent};
use iotdash_sim::{router, DeviceSim};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, timeout};

type TestResult<T = ()> = Result<T, Box<dyn Error>>;

async fn serve_sim(listener: TcpListener) -> TestResult<DeviceSim> {
    let sim = DeviceSim::new()?;
    let app = router(sim.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(sim)
}

async fn spawn_sim() -> TestResult<(DeviceSim, u16)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    Ok((serve_sim(listener).await?, port))
}

fn config(port: u16) -> LinkConfig {
    LinkConfig {
        page_host: "127.0.0.1:8080".into(),
        control_port: port,
        reconnect: ReconnectPolicy::disabled(),
        ..LinkConfig::default()
    }
}

async fn wait_for<F>(events: &mut broadcast::Receiver<SessionEvent>, mut pred: F) -> TestResult<SessionEvent>
where
    F: FnMut(&SessionEvent) -> bool,
{
    let found = timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return Ok(event),
                Ok(_) => continue,
                Err(e) => return Err(e),
            }
        }
    })
    .await??;
    Ok(found)
}

async fn wait_until_device<F>(sim: &DeviceSim, mut pred: F) -> TestResult
where
    F: FnMut(&iotdash_sim::Snapshot) -> bool,
{
    timeout(Duration::from_secs(5), async {
        while !pred(&sim.snapshot().await) {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;
    Ok(())
}

#[tokio::test]
async fn open_sends_hello_and_receives_snapshot() -> TestResult {
    let (sim, port) = spawn_sim().await?;
    let mut session = Session::new(config(port));
    session.open().await?;
    assert_eq!(session.connection(), ConnectionState::Open);

    // hello is the only command so far
    timeout(Duration::from_secs(5), async {
        while sim.metrics().commands_total.get() < 1 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;
    assert_eq!(sim.metrics().commands_total.get(), 1);

    session.send(&OutboundCommand::SetLed1 { value: false }).await?;
    wait_until_device(&sim, |s| !s.led1).await?;
    session.close().await;
    assert_eq!(session.connection(), ConnectionState::Closed);
    Ok(())
}

#[tokio::test]
async fn run_mirrors_snapshot_and_forwards_controls() -> TestResult {
    let (sim, port) = spawn_sim().await?;
    let session = Session::new(config(port));
    let mut events = session.events();
    let (ui_tx, ui_rx) = mpsc::channel(16);
    let task = tokio::spawn(session.run(ui_rx));

    wait_for(&mut events, |e| matches!(e, SessionEvent::Connection(ConnectionState::Open))).await?;
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::Paint(Paint::Brightness(SliderView { value: 50 })))
    })
    .await?;

    ui_tx.send(UiEvent::Led1Changed(false)).await?;
    wait_until_device(&sim, |s| !s.led1).await?;

    sim.set_pot(64.4).await;
    // the snapshot's own gauge paint may still be queued ahead of this one
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::Paint(Paint::Gauge(view)) if view.label == "64%")
    })
    .await?;

    drop(ui_tx);
    timeout(Duration::from_secs(5), task).await??;
    Ok(())
}

#[tokio::test]
async fn slider_burst_reaches_device_as_one_command() -> TestResult {
    let (sim, port) = spawn_sim().await?;
    let session = Session::new(config(port));
    let mut events = session.events();
    let (ui_tx, ui_rx) = mpsc::channel(16);
    let task = tokio::spawn(session.run(ui_rx));

    wait_for(&mut events, |e| matches!(e, SessionEvent::Connection(ConnectionState::Open))).await?;

    for v in [10, 20, 30] {
        ui_tx.send(UiEvent::BrightnessInput(v)).await?;
    }
    wait_until_device(&sim, |s| s.brightness == 30).await?;
    sleep(Duration::from_millis(100)).await;

    // hello plus a single set_brightness
    assert_eq!(sim.metrics().commands_total.get(), 2);
    assert_eq!(sim.snapshot().await.brightness, 30);

    drop(ui_tx);
    timeout(Duration::from_secs(5), task).await??;
    Ok(())
}

#[tokio::test]
async fn unreachable_device_keeps_ui_responsive() -> TestResult {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        listener.local_addr()?.port()
    };
    let session = Session::new(config(port));
    let mut events = session.events();
    let (ui_tx, ui_rx) = mpsc::channel(16);
    let task = tokio::spawn(session.run(ui_rx));

    wait_for(&mut events, |e| matches!(e, SessionEvent::Connection(ConnectionState::Closed))).await?;

    ui_tx.send(UiEvent::Led1Changed(true)).await?;
    wait_for(&mut events, |e| matches!(e, SessionEvent::Paint(Paint::Led1(true)))).await?;

    drop(ui_tx);
    timeout(Duration::from_secs(5), task).await??;
    Ok(())
}

#[tokio::test]
async fn reconnects_once_device_appears() -> TestResult {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        listener.local_addr()?
    };
    let mut cfg = config(addr.port());
    cfg.reconnect = ReconnectPolicy {
        max_attempts: 50,
        initial_backoff: Duration::from_millis(20),
        max_backoff: Duration::from_millis(100),
    };
    let session = Session::new(cfg);
    let mut events = session.events();
    let (ui_tx, ui_rx) = mpsc::channel(16);
    let task = tokio::spawn(session.run(ui_rx));

    wait_for(&mut events, |e| matches!(e, SessionEvent::Connection(ConnectionState::Closed))).await?;

    let _sim = serve_sim(TcpListener::bind(addr).await?).await?;
    wait_for(&mut events, |e| matches!(e, SessionEvent::Connection(ConnectionState::Open))).await?;
    wait_for(&mut events, |e| matches!(e, SessionEvent::Paint(Paint::Led1(true)))).await?;

    drop(ui_tx);
    timeout(Duration::from_secs(5), task).await??;
    Ok(())
}
