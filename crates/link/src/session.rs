use futures_util::{SinkExt, StreamExt};
use iotdash_core::{ConnectionState, DeviceState, OutboundCommand, Paint, PanelView};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep_until, Instant};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::config::LinkConfig;
use crate::emitter::{BrightnessEmitter, ToggleEmitter};
use crate::error::LinkError;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type ConnectResult = Result<Socket, tungstenite::Error>;

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Connection(ConnectionState),
    Paint(Paint),
}

/// User interaction coming from the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    Led1Changed(bool),
    BrightnessInput(u8),
}

pub struct Session {
    config: LinkConfig,
    endpoint: String,
    connection: ConnectionState,
    device: DeviceState,
    panel: PanelView,
    socket: Option<Socket>,
    connecting: Option<JoinHandle<ConnectResult>>,
    retry_at: Option<Instant>,
    failed_attempts: u32,
    outbound_rx: mpsc::UnboundedReceiver<OutboundCommand>,
    toggle: ToggleEmitter,
    brightness: BrightnessEmitter,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new(config: LinkConfig) -> Self {
        let endpoint = config.endpoint();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(256);
        Self {
            toggle: ToggleEmitter::new(outbound_tx.clone()),
            brightness: BrightnessEmitter::new(outbound_tx, config.debounce),
            config,
            endpoint,
            connection: ConnectionState::Connecting,
            device: DeviceState::default(),
            panel: PanelView::default(),
            socket: None,
            connecting: None,
            retry_at: None,
            failed_attempts: 0,
            outbound_rx,
            events_tx,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn device(&self) -> &DeviceState {
        &self.device
    }

    pub fn panel(&self) -> &PanelView {
        &self.panel
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// Connect and request a full snapshot with `hello`.
    pub async fn open(&mut self) -> Result<(), LinkError> {
        self.set_connection(ConnectionState::Connecting);
        info!(endpoint = %self.endpoint, "Connecting to device");
        let result = connect_async(self.endpoint.as_str()).await.map(|(socket, _)| socket);
        self.finish_connect(result).await
    }

    pub async fn send(&mut self, command: &OutboundCommand) -> Result<(), LinkError> {
        let socket = match (self.connection, self.socket.as_mut()) {
            (ConnectionState::Open, Some(socket)) => socket,
            _ => return Err(LinkError::NotOpen),
        };
        let frame = command.to_frame()?;
        debug!(%frame, "Sending command");
        socket
            .send(Message::Text(frame))
            .await
            .map_err(|source| LinkError::Send { source })
    }

    /// Apply one inbound text frame. Malformed frames are logged and dropped;
    /// returns whether the frame was accepted.
    pub fn on_message(&mut self, raw: &str) -> bool {
        match self.device.apply_frame(raw) {
            Ok(paints) => {
                for paint in paints {
                    self.repaint(paint);
                }
                true
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed device frame");
                false
            }
        }
    }

    /// Optimistic local update plus the matching outbound command. The device
    /// mirror is left alone until the device reports back.
    pub fn handle_ui(&mut self, event: UiEvent) {
        let paint = match event {
            UiEvent::Led1Changed(checked) => {
                self.toggle.changed(checked);
                Paint::Led1(checked)
            }
            UiEvent::BrightnessInput(value) => Paint::Brightness(self.brightness.input(value)),
        };
        self.repaint(paint);
    }

    pub async fn close(&mut self) {
        if let Some(handle) = self.connecting.take() {
            handle.abort();
        }
        self.retry_at = None;
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = socket.close(None).await {
                debug!(error = %e, "Close handshake failed");
            }
        }
        self.set_connection(ConnectionState::Closed);
    }

    /// Drive the session until the UI side hangs up. Inbound frames, UI
    /// events, debounced commands and reconnects all run on this one task.
    pub async fn run(mut self, mut ui: mpsc::Receiver<UiEvent>) {
        if self.connection != ConnectionState::Open && self.connecting.is_none() {
            self.begin_connect();
        }

        loop {
            let retry_at = self.retry_at;
            tokio::select! {
                frame = next_frame(&mut self.socket) => self.on_frame(frame),
                joined = pending_connect(&mut self.connecting) => {
                    self.connecting = None;
                    let result = joined.map_err(LinkError::from);
                    let outcome = match result {
                        Ok(connected) => self.finish_connect(connected).await,
                        Err(e) => {
                            self.set_connection(ConnectionState::Closed);
                            Err(e)
                        }
                    };
                    if let Err(e) = outcome {
                        warn!(error = %e, "Device connect failed");
                        self.drop_link();
                    }
                }
                _ = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                    self.retry_at = None;
                    self.begin_connect();
                }
                Some(command) = self.outbound_rx.recv() => {
                    match self.send(&command).await {
                        Ok(()) => {}
                        Err(LinkError::NotOpen) => {
                            debug!(?command, "Link not open; dropping command");
                        }
                        Err(e @ LinkError::Send { .. }) => {
                            warn!(error = %e, "Send failed; treating link as dropped");
                            self.drop_link();
                        }
                        Err(e) => warn!(error = %e, "Failed to send command"),
                    }
                }
                event = ui.recv() => match event {
                    Some(event) => self.handle_ui(event),
                    None => {
                        info!("UI closed; shutting down device link");
                        self.close().await;
                        return;
                    }
                },
            }
        }
    }

    fn begin_connect(&mut self) {
        self.set_connection(ConnectionState::Connecting);
        info!(endpoint = %self.endpoint, "Connecting to device");
        let endpoint = self.endpoint.clone();
        self.connecting = Some(tokio::spawn(async move {
            connect_async(endpoint.as_str()).await.map(|(socket, _)| socket)
        }));
    }

    async fn finish_connect(&mut self, result: ConnectResult) -> Result<(), LinkError> {
        match result {
            Ok(socket) => {
                self.socket = Some(socket);
                self.failed_attempts = 0;
                self.retry_at = None;
                self.set_connection(ConnectionState::Open);
                info!(endpoint = %self.endpoint, "Device link open");
                if let Err(e) = self.send(&OutboundCommand::Hello).await {
                    self.socket = None;
                    self.set_connection(ConnectionState::Closed);
                    return Err(e);
                }
                Ok(())
            }
            Err(source) => {
                self.set_connection(ConnectionState::Closed);
                Err(LinkError::Connect { endpoint: self.endpoint.clone(), source })
            }
        }
    }

    fn on_frame(&mut self, frame: Option<Result<Message, tungstenite::Error>>) {
        match frame {
            Some(Ok(Message::Text(text))) => {
                self.on_message(&text);
            }
            Some(Ok(Message::Close(reason))) => {
                info!(?reason, "Device closed the link");
                self.drop_link();
            }
            Some(Ok(other)) => debug!(?other, "Ignoring non-text frame"),
            Some(Err(e)) => {
                warn!(error = %e, "Device link error");
                self.drop_link();
            }
            None => {
                info!("Device link stream ended");
                self.drop_link();
            }
        }
    }

    fn drop_link(&mut self) {
        self.socket = None;
        self.set_connection(ConnectionState::Closed);
        self.schedule_retry();
    }

    fn schedule_retry(&mut self) {
        let policy = &self.config.reconnect;
        if self.failed_attempts >= policy.max_attempts {
            if policy.max_attempts == 0 {
                info!("Reconnect disabled; device link stays closed");
            } else {
                error!(attempts = self.failed_attempts, "Giving up on device link");
            }
            self.retry_at = None;
            return;
        }
        let delay = policy.backoff(self.failed_attempts);
        self.failed_attempts += 1;
        info!(attempt = self.failed_attempts, ?delay, "Scheduling reconnect");
        self.retry_at = Some(Instant::now() + delay);
    }

    fn set_connection(&mut self, state: ConnectionState) {
        if self.connection != state {
            self.connection = state;
            let _ = self.events_tx.send(SessionEvent::Connection(state));
        }
    }

    fn repaint(&mut self, paint: Paint) {
        self.panel.paint(&paint);
        let _ = self.events_tx.send(SessionEvent::Paint(paint));
    }
}

async fn next_frame(socket: &mut Option<Socket>) -> Option<Result<Message, tungstenite::Error>> {
    match socket.as_mut() {
        Some(socket) => socket.next().await,
        None => std::future::pending().await,
    }
}

async fn pending_connect(handle: &mut Option<JoinHandle<ConnectResult>>) -> Result<ConnectResult, JoinError> {
    match handle.as_mut() {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iotdash_core::{render_gauge, SliderView};
    use tokio::sync::mpsc::error::TryRecvError;

    fn session() -> Session {
        Session::new(LinkConfig {
            page_host: "192.168.4.1:80".into(),
            ..LinkConfig::default()
        })
    }

    #[test]
    fn endpoint_is_derived_from_page_host() {
        let s = session();
        assert_eq!(s.endpoint(), "ws://192.168.4.1:81/");
        assert_eq!(s.connection(), ConnectionState::Connecting);
    }

    #[test]
    fn malformed_frame_changes_nothing() {
        let mut s = session();
        let mut events = s.events();
        assert!(!s.on_message("not json"));
        assert!(!s.on_message(r#""just a string""#));
        assert_eq!(s.device(), &DeviceState::default());
        assert_eq!(s.panel(), &PanelView::default());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn inbound_frame_repaints_without_echo() {
        let mut s = session();
        let mut events = s.events();
        assert!(s.on_message(r#"{"led1":false,"brightness":80,"potPct":42.4}"#));

        assert_eq!(s.device().led1, Some(false));
        assert!(!s.panel().led1);
        assert_eq!(s.panel().slider, SliderView { value: 80 });
        assert_eq!(s.panel().gauge, render_gauge(42.4));

        let mut painted = 0;
        while let Ok(event) = events.try_recv() {
            assert!(matches!(event, SessionEvent::Paint(_)));
            painted += 1;
        }
        assert_eq!(painted, 3);
        assert!(matches!(s.outbound_rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn ui_changes_are_optimistic_only() {
        let mut s = session();
        s.on_message(r#"{"led1":true,"brightness":10}"#);

        s.handle_ui(UiEvent::Led1Changed(false));
        s.handle_ui(UiEvent::BrightnessInput(70));

        assert!(!s.panel().led1);
        assert_eq!(s.panel().slider.value, 70);
        assert_eq!(s.device().led1, Some(true));
        assert_eq!(s.device().brightness, Some(10.0));
        assert_eq!(s.outbound_rx.try_recv(), Ok(OutboundCommand::SetLed1 { value: false }));
    }

    #[tokio::test]
    async fn send_requires_open_link() {
        let mut s = session();
        let err = s.send(&OutboundCommand::Hello).await;
        assert!(matches!(err, Err(LinkError::NotOpen)));
    }

    #[tokio::test]
    async fn open_failure_leaves_session_closed() -> Result<(), Box<dyn std::error::Error>> {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
            listener.local_addr()?.port()
        };
        let mut s = Session::new(LinkConfig {
            page_host: "127.0.0.1".into(),
            control_port: port,
            ..LinkConfig::default()
        });
        let result = s.open().await;
        assert!(matches!(result, Err(LinkError::Connect { .. })));
        assert_eq!(s.connection(), ConnectionState::Closed);
        Ok(())
    }

    #[tokio::test]
    async fn failed_hello_leaves_session_closed() -> Result<(), Box<dyn std::error::Error>> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let app = iotdash_sim::router(iotdash_sim::DeviceSim::new()?);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let mut s = Session::new(LinkConfig {
            page_host: "127.0.0.1".into(),
            control_port: port,
            ..LinkConfig::default()
        });
        let (mut socket, _) = connect_async(s.endpoint()).await?;
        // a socket that has started closing refuses further writes
        socket.close(None).await?;

        let result = s.finish_connect(Ok(socket)).await;
        assert!(matches!(result, Err(LinkError::Send { .. })));
        assert_eq!(s.connection(), ConnectionState::Closed);
        assert!(s.socket.is_none());
        assert!(matches!(s.send(&OutboundCommand::Hello).await, Err(LinkError::NotOpen)));
        Ok(())
    }

    #[test]
    fn retries_are_bounded() {
        let mut s = session();
        for _ in 0..5 {
            s.schedule_retry();
            assert!(s.retry_at.is_some());
        }
        s.schedule_retry();
        assert!(s.retry_at.is_none());
    }

    #[test]
    fn disabled_reconnect_never_schedules() {
        let mut s = Session::new(LinkConfig {
            reconnect: crate::ReconnectPolicy::disabled(),
            ..LinkConfig::default()
        });
        s.drop_link();
        assert_eq!(s.connection(), ConnectionState::Closed);
        assert!(s.retry_at.is_none());
    }
}
