//! Bidirectional text channel carrying presence frames.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("already connected")]
    AlreadyConnected,
    #[error("not connected")]
    NotConnected,
    #[error("send failed: {0}")]
    Send(String),
}

/// Events from a transport, drained by polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    Message(String),
    Error(String),
}

/// A room-scoped event channel. Reconnecting is up to the implementation.
pub trait PresenceTransport: Send {
    /// Queue a text frame. Never blocks on the network.
    fn send(&mut self, frame: String) -> Result<(), TransportError>;

    /// Pending events (non-blocking).
    fn poll(&mut self) -> Vec<TransportEvent>;

    fn is_connected(&self) -> bool;

    fn close(&mut self);
}

#[derive(Debug, Default)]
struct LoopbackState {
    connected: bool,
    sent: Vec<String>,
    inbound: VecDeque<TransportEvent>,
}

/// In-process transport whose far end is a [`LoopbackHandle`].
pub struct LoopbackTransport {
    state: Arc<Mutex<LoopbackState>>,
}

/// Far end of a [`LoopbackTransport`].
#[derive(Clone)]
pub struct LoopbackHandle {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackTransport {
    /// A connected transport and the handle that drives it.
    pub fn pair() -> (Self, LoopbackHandle) {
        let state = Arc::new(Mutex::new(LoopbackState {
            connected: true,
            inbound: VecDeque::from([TransportEvent::Connected]),
            ..Default::default()
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            LoopbackHandle { state },
        )
    }
}

impl PresenceTransport for LoopbackTransport {
    fn send(&mut self, frame: String) -> Result<(), TransportError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| TransportError::Send(e.to_string()))?;
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        state.sent.push(frame);
        Ok(())
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        match self.state.lock() {
            Ok(mut state) => state.inbound.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn is_connected(&self) -> bool {
        self.state.lock().map(|s| s.connected).unwrap_or(false)
    }

    fn close(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.connected = false;
        }
    }
}

impl LoopbackHandle {
    /// Deliver a text frame to the transport.
    pub fn push_frame(&self, frame: impl Into<String>) {
        self.push_event(TransportEvent::Message(frame.into()));
    }

    pub fn push_event(&self, event: TransportEvent) {
        if let Ok(mut state) = self.state.lock() {
            match event {
                TransportEvent::Connected => state.connected = true,
                TransportEvent::Disconnected => state.connected = false,
                _ => {}
            }
            state.inbound.push_back(event);
        }
    }

    /// Take every frame sent so far.
    pub fn take_sent(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|mut s| std::mem::take(&mut s.sent))
            .unwrap_or_default()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().map(|s| s.connected).unwrap_or(false)
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::WsTransport;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use super::{PresenceTransport, TransportError, TransportEvent};
    use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::{Message, connect};
    use url::Url;

    enum WsCommand {
        Send(String),
        Close,
    }

    /// WebSocket transport running the socket on a background thread.
    pub struct WsTransport {
        connected: bool,
        cmd_tx: Option<Sender<WsCommand>>,
        event_rx: Option<Receiver<TransportEvent>>,
        _thread: Option<JoinHandle<()>>,
    }

    impl WsTransport {
        /// Start connecting to a `ws://` or `wss://` URL.
        pub fn connect(url: &str) -> Result<Self, TransportError> {
            let parsed = Url::parse(url).map_err(|e| TransportError::Url(e.to_string()))?;
            if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
                return Err(TransportError::Url(format!(
                    "unsupported scheme {}",
                    parsed.scheme()
                )));
            }

            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<TransportEvent>();
            let url = url.to_string();
            let handle = thread::spawn(move || run_socket(&url, cmd_rx, event_tx));

            Ok(Self {
                connected: false,
                cmd_tx: Some(cmd_tx),
                event_rx: Some(event_rx),
                _thread: Some(handle),
            })
        }
    }

    /// How long a read waits before queued frames get another turn.
    const READ_TIMEOUT: Duration = Duration::from_millis(10);

    fn is_timeout(error: &tungstenite::Error) -> bool {
        match error {
            tungstenite::Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    fn run_socket(url: &str, cmd_rx: Receiver<WsCommand>, event_tx: Sender<TransportEvent>) {
        log::info!("presence socket connecting to {url}");
        let mut socket = match connect(url) {
            Ok((socket, response)) => {
                log::info!("presence socket connected, status {}", response.status());
                socket
            }
            Err(e) => {
                log::warn!("presence socket failed to connect: {e}");
                let _ = event_tx.send(TransportEvent::Error(e.to_string()));
                let _ = event_tx.send(TransportEvent::Disconnected);
                return;
            }
        };
        let _ = event_tx.send(TransportEvent::Connected);

        if let tungstenite::stream::MaybeTlsStream::Plain(tcp) = socket.get_mut() {
            let _ = tcp.set_read_timeout(Some(READ_TIMEOUT));
            let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
        }

        'io: loop {
            // Everything queued since the last pass goes out in one flush.
            let mut queued = false;
            loop {
                match cmd_rx.try_recv() {
                    Ok(WsCommand::Send(frame)) => {
                        if let Err(e) = socket.write(Message::Text(frame)) {
                            log::warn!("presence send error: {e}");
                            break 'io;
                        }
                        queued = true;
                    }
                    Ok(WsCommand::Close) | Err(TryRecvError::Disconnected) => {
                        let _ = socket.close(None);
                        let _ = socket.flush();
                        break 'io;
                    }
                    Err(TryRecvError::Empty) => break,
                }
            }
            if queued {
                if let Err(e) = socket.flush() {
                    if !is_timeout(&e) {
                        log::warn!("presence flush error: {e}");
                        break;
                    }
                }
            }

            match socket.read() {
                Ok(Message::Text(text)) => {
                    let _ = event_tx.send(TransportEvent::Message(text));
                }
                Ok(Message::Ping(data)) => {
                    let _ = socket.send(Message::Pong(data));
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(ref e) if is_timeout(e) => {}
                Err(e) => {
                    log::warn!("presence read error: {e}");
                    break;
                }
            }
        }

        log::info!("presence socket closed");
        let _ = event_tx.send(TransportEvent::Disconnected);
    }

    impl PresenceTransport for WsTransport {
        fn send(&mut self, frame: String) -> Result<(), TransportError> {
            let tx = self.cmd_tx.as_ref().ok_or(TransportError::NotConnected)?;
            tx.send(WsCommand::Send(frame))
                .map_err(|e| TransportError::Send(e.to_string()))
        }

        fn poll(&mut self) -> Vec<TransportEvent> {
            let Some(rx) = self.event_rx.as_ref() else {
                return Vec::new();
            };
            let events: Vec<TransportEvent> = rx.try_iter().collect();
            for event in &events {
                match event {
                    TransportEvent::Connected => self.connected = true,
                    TransportEvent::Disconnected => self.connected = false,
                    _ => {}
                }
            }
            events
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn close(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.connected = false;
        }
    }

    impl Drop for WsTransport {
        fn drop(&mut self) {
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_round_trip() {
        let (mut transport, handle) = LoopbackTransport::pair();
        assert_eq!(transport.poll(), vec![TransportEvent::Connected]);
        transport.send("hello".to_string()).unwrap();
        assert_eq!(handle.take_sent(), vec!["hello".to_string()]);

        handle.push_frame("world");
        assert_eq!(
            transport.poll(),
            vec![TransportEvent::Message("world".to_string())]
        );
    }

    #[test]
    fn test_loopback_refuses_when_closed() {
        let (mut transport, handle) = LoopbackTransport::pair();
        transport.close();
        assert!(!handle.is_connected());
        assert!(matches!(
            transport.send("x".to_string()),
            Err(TransportError::NotConnected)
        ));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_ws_sends_queued_frames_promptly() {
        use std::net::TcpListener;
        use std::thread;
        use std::time::{Duration, Instant};
        use tungstenite::Message;

        const FRAMES: usize = 60;
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut socket = tungstenite::accept(stream).unwrap();
            let mut received = Vec::new();
            while received.len() < FRAMES {
                if let Message::Text(text) = socket.read().unwrap() {
                    received.push(text.to_string());
                }
            }
            received
        });

        let mut transport = WsTransport::connect(&format!("ws://{addr}")).unwrap();
        let start = Instant::now();
        for i in 0..FRAMES {
            transport
                .send(format!(r#"{{"type":"cursor_move","roomId":"p","point":[{i},0],"id":"u"}}"#))
                .unwrap();
        }
        let received = server.join().unwrap();
        let elapsed = start.elapsed();

        assert_eq!(received.len(), FRAMES);
        assert!(received[FRAMES - 1].contains("[59,0]"));
        assert!(elapsed < Duration::from_secs(1), "took {elapsed:?}");
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_ws_rejects_bad_urls() {
        assert!(matches!(
            WsTransport::connect("http://localhost:3001"),
            Err(TransportError::Url(_))
        ));
        assert!(matches!(
            WsTransport::connect("not a url"),
            Err(TransportError::Url(_))
        ));
    }
}
