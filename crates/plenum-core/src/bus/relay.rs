//! Loopback relay bus for surfaces running as separate processes.
//!
//! Each subscription holds its own WebSocket connection to `plenum-relay` and
//! joins the channel; publications go out over one shared connection. The
//! relay forwards payloads verbatim, so envelopes are filtered by sender on
//! receipt.

use super::{BusError, BusResult, ChannelId, PeerId, SessionBus, Subscription};
use crate::protocol::BusMessage;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tungstenite::{Message, connect};
use url::Url;

/// Frames sent to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum RelayClientFrame {
    /// Start receiving a channel on this connection.
    Join { channel: String },
    /// Stop receiving.
    Leave,
    /// Forward `payload` to every other connection joined to `channel`.
    Publish {
        channel: String,
        from: PeerId,
        payload: serde_json::Value,
    },
}

/// Frames received from the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum RelayServerFrame {
    Joined { channel: String, peer_count: usize },
    PeerJoined { connection: String },
    PeerLeft { connection: String },
    Message {
        channel: String,
        from: PeerId,
        payload: serde_json::Value,
    },
    Error { message: String },
}

/// How long to wait for the relay to accept a connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
/// How long to wait for the relay to confirm a join.
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);
/// How long a closing connection may take to flush queued frames.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);
/// Minimum spacing between publisher reconnect attempts.
const RECONNECT_INTERVAL: Duration = Duration::from_secs(1);

/// Commands sent to a connection thread.
enum WsCommand {
    Send(String),
    Close,
}

/// Outgoing frames collected from the command queue.
#[derive(Debug, PartialEq)]
struct Outgoing {
    frames: Vec<String>,
    /// Close after sending `frames`.
    close: bool,
}

/// One WebSocket connection driven by a background thread.
struct RelayConnection {
    cmd_tx: Sender<WsCommand>,
    /// Disconnects when the thread exits.
    done_rx: Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

impl RelayConnection {
    /// Connect and wait until the relay accepted the socket. Frames are
    /// handed to `on_frame` on the connection thread.
    fn open<F>(url: &Url, mut on_frame: F) -> BusResult<Self>
    where
        F: FnMut(RelayServerFrame) + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel::<WsCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let target = url.to_string();

        let handle = thread::spawn(move || {
            let _done = done_tx;
            log::debug!("Relay thread: connecting to {}", target);

            let mut socket = match connect(target.as_str()) {
                Ok((socket, response)) => {
                    log::debug!("Relay connected, status: {}", response.status());
                    socket
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };

            match socket.get_mut() {
                tungstenite::stream::MaybeTlsStream::Plain(tcp) => {
                    let _ = tcp.set_read_timeout(Some(Duration::from_millis(20)));
                    let _ = tcp.set_write_timeout(Some(Duration::from_secs(2)));
                }
                #[allow(unreachable_patterns)]
                _ => log::debug!("Non-plain relay stream, using default timeouts"),
            }
            let _ = ready_tx.send(Ok(()));

            loop {
                let outgoing = drain_commands(&cmd_rx);
                for text in outgoing.frames {
                    if let Err(e) = socket.send(Message::Text(text)) {
                        log::warn!("Relay send error: {}", e);
                        return;
                    }
                }
                if outgoing.close {
                    let _ = socket.close(None);
                    let _ = socket.flush();
                    break;
                }

                match socket.read() {
                    Ok(Message::Text(txt)) => match serde_json::from_str::<RelayServerFrame>(&txt) {
                        Ok(frame) => on_frame(frame),
                        Err(e) => log::debug!("Ignoring relay frame: {}", e),
                    },
                    Ok(Message::Ping(data)) => {
                        let _ = socket.send(Message::Pong(data));
                    }
                    Ok(Message::Close(_)) => {
                        log::debug!("Relay closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(tungstenite::Error::Io(ref e))
                        if e.kind() == std::io::ErrorKind::WouldBlock
                            || e.kind() == std::io::ErrorKind::TimedOut =>
                    {
                        continue;
                    }
                    Err(e) => {
                        log::warn!("Relay read error: {}", e);
                        break;
                    }
                }
            }

            log::debug!("Relay thread exiting");
        });

        match ready_rx.recv_timeout(CONNECT_TIMEOUT) {
            Ok(Ok(())) => Ok(Self {
                cmd_tx,
                done_rx,
                thread: Some(handle),
            }),
            Ok(Err(e)) => Err(BusError::Connection(format!("Relay at {} unavailable: {}", url, e))),
            Err(_) => Err(BusError::Connection(format!("Relay at {} did not answer", url))),
        }
    }

    /// Queue a frame. Returns false once the connection thread is gone.
    fn send(&self, frame: &RelayClientFrame) -> bool {
        match serde_json::to_string(frame) {
            Ok(json) => self.cmd_tx.send(WsCommand::Send(json)).is_ok(),
            Err(e) => {
                log::warn!("Failed to encode relay frame: {}", e);
                true
            }
        }
    }

    fn close(&self) {
        let _ = self.cmd_tx.send(WsCommand::Close);
    }
}

impl Drop for RelayConnection {
    /// Flush queued frames, waiting a bounded time for the thread.
    fn drop(&mut self) {
        self.close();
        let _ = self.done_rx.recv_timeout(FLUSH_TIMEOUT);
        if let Some(handle) = self.thread.take() {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                log::warn!("Relay connection did not close in time");
            }
        }
    }
}

/// Collect queued outgoing frames, noting whether close was requested or the
/// owner went away. Frames queued before the close are kept.
fn drain_commands(cmd_rx: &Receiver<WsCommand>) -> Outgoing {
    let mut frames = Vec::new();
    loop {
        match cmd_rx.try_recv() {
            Ok(WsCommand::Send(text)) => frames.push(text),
            Ok(WsCommand::Close) | Err(TryRecvError::Disconnected) => return Outgoing { frames, close: true },
            Err(TryRecvError::Empty) => return Outgoing { frames, close: false },
        }
    }
}

/// Publishing side of a [`RelayBus`].
struct Publisher {
    conn: Option<RelayConnection>,
    last_attempt: Option<Instant>,
}

/// Bus endpoint talking to a `plenum-relay` instance.
pub struct RelayBus {
    url: Url,
    peer: PeerId,
    publisher: Mutex<Publisher>,
}

impl RelayBus {
    /// Validate the relay URL and open the publishing connection.
    ///
    /// Fails when the relay cannot be reached.
    pub fn connect(url: &str) -> BusResult<Self> {
        let url = Url::parse(url).map_err(|e| BusError::InvalidAddress(format!("{}: {}", url, e)))?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(BusError::InvalidAddress(format!(
                "Invalid WebSocket URL scheme: {}",
                url.scheme()
            )));
        }

        let conn = Self::open_publisher(&url)?;
        Ok(Self {
            url,
            peer: PeerId::new_random(),
            publisher: Mutex::new(Publisher {
                conn: Some(conn),
                last_attempt: None,
            }),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn open_publisher(url: &Url) -> BusResult<RelayConnection> {
        RelayConnection::open(url, |frame| {
            if let RelayServerFrame::Error { message } = frame {
                log::warn!("Relay rejected publication: {}", message);
            }
        })
    }
}

impl SessionBus for RelayBus {
    fn peer_id(&self) -> PeerId {
        self.peer
    }

    fn publish(&self, channel: &ChannelId, message: &BusMessage) {
        let Some(payload) = message.to_value() else {
            return;
        };
        let frame = RelayClientFrame::Publish {
            channel: channel.as_str().to_string(),
            from: self.peer,
            payload,
        };

        let Ok(mut publisher) = self.publisher.lock() else {
            log::warn!("Relay publisher lock poisoned, dropping {}", message.kind());
            return;
        };
        if publisher.conn.as_ref().is_some_and(|conn| conn.send(&frame)) {
            return;
        }

        // The connection is gone. Reconnect at most once per interval.
        publisher.conn = None;
        if publisher
            .last_attempt
            .is_some_and(|at| at.elapsed() < RECONNECT_INTERVAL)
        {
            log::debug!("Relay down, dropping {}", message.kind());
            return;
        }
        publisher.last_attempt = Some(Instant::now());
        log::info!("Relay publisher disconnected, reconnecting to {}", self.url);
        match Self::open_publisher(&self.url) {
            Ok(conn) => {
                conn.send(&frame);
                publisher.conn = Some(conn);
            }
            Err(e) => log::warn!("Dropping {}: {}", message.kind(), e),
        }
    }

    /// Join `channel` on a dedicated connection, returning once the relay
    /// confirmed the join.
    fn subscribe(&self, channel: &ChannelId) -> BusResult<Subscription> {
        let (tx, rx) = mpsc::channel::<BusMessage>();
        let (joined_tx, joined_rx) = mpsc::channel::<()>();
        let own = self.peer;
        let wanted = channel.as_str().to_string();

        let conn = RelayConnection::open(&self.url, move |frame| match frame {
            RelayServerFrame::Message { channel, from, payload } => {
                if channel != wanted || from == own {
                    return;
                }
                if let Some(msg) = BusMessage::from_value(payload) {
                    let _ = tx.send(msg);
                }
            }
            RelayServerFrame::Joined { channel, peer_count } => {
                log::info!("Joined channel {} ({} connections)", channel, peer_count);
                let _ = joined_tx.send(());
            }
            RelayServerFrame::Error { message } => {
                log::warn!("Relay error: {}", message);
            }
            RelayServerFrame::PeerJoined { .. } | RelayServerFrame::PeerLeft { .. } => {}
        })?;

        if !conn.send(&RelayClientFrame::Join {
            channel: channel.as_str().to_string(),
        }) {
            return Err(BusError::Connection(format!("Relay at {} unavailable", self.url)));
        }
        if joined_rx.recv_timeout(JOIN_TIMEOUT).is_err() {
            return Err(BusError::Connection(format!(
                "Relay at {} did not confirm joining {}",
                self.url, channel
            )));
        }

        Ok(Subscription::new(channel.clone(), rx, move || {
            conn.send(&RelayClientFrame::Leave);
            drop(conn);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, TcpStream};
    use std::sync::Arc;

    #[test]
    fn test_connect_rejects_bad_scheme() {
        assert!(matches!(
            RelayBus::connect("http://localhost:3030/ws"),
            Err(BusError::InvalidAddress(_))
        ));
        assert!(matches!(
            RelayBus::connect("not a url"),
            Err(BusError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_publish_frame_shape() {
        let peer = PeerId::new_random();
        let frame = RelayClientFrame::Publish {
            channel: "s42".to_string(),
            from: peer,
            payload: BusMessage::RequestInit.to_value().unwrap(),
        };
        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "publish");
        assert_eq!(json["channel"], "s42");
        assert_eq!(json["from"], peer.to_string());
        assert_eq!(json["payload"]["type"], "request-init");
    }

    #[test]
    fn test_server_frame_decode() {
        let json = r#"{"type":"joined","channel":"s42","peerCount":3}"#;
        match serde_json::from_str::<RelayServerFrame>(json).unwrap() {
            RelayServerFrame::Joined { channel, peer_count } => {
                assert_eq!(channel, "s42");
                assert_eq!(peer_count, 3);
            }
            other => panic!("Wrong frame: {:?}", other),
        }
    }

    #[test]
    fn test_drain_commands_keeps_frames_queued_before_close() {
        let (tx, rx) = mpsc::channel();
        tx.send(WsCommand::Send("a".to_string())).unwrap();
        assert_eq!(
            drain_commands(&rx),
            Outgoing {
                frames: vec!["a".to_string()],
                close: false
            }
        );

        tx.send(WsCommand::Send("release".to_string())).unwrap();
        tx.send(WsCommand::Close).unwrap();
        assert_eq!(
            drain_commands(&rx),
            Outgoing {
                frames: vec!["release".to_string()],
                close: true
            }
        );

        drop(tx);
        assert!(drain_commands(&rx).close);
    }

    /// Connections joined to a channel: (connection, channel, outbox).
    type Members = Arc<Mutex<Vec<(usize, String, Sender<String>)>>>;

    /// Start a minimal relay on an ephemeral port and return its URL.
    fn start_relay() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("ws://{}/ws", listener.local_addr().unwrap());
        let members: Members = Arc::default();
        thread::spawn(move || {
            for (id, stream) in listener.incoming().enumerate() {
                let Ok(stream) = stream else { continue };
                let members = members.clone();
                thread::spawn(move || serve(id, stream, members));
            }
        });
        url
    }

    fn serve(id: usize, stream: TcpStream, members: Members) {
        let Ok(mut ws) = tungstenite::accept(stream) else {
            return;
        };
        ws.get_mut()
            .set_read_timeout(Some(Duration::from_millis(10)))
            .unwrap();
        let (tx, rx) = mpsc::channel::<String>();

        'conn: loop {
            for text in rx.try_iter() {
                if ws.send(Message::Text(text)).is_err() {
                    break 'conn;
                }
            }
            match ws.read() {
                Ok(Message::Text(text)) => match serde_json::from_str::<RelayClientFrame>(&text) {
                    Ok(RelayClientFrame::Join { channel }) => {
                        let peer_count = {
                            let mut members = members.lock().unwrap();
                            members.push((id, channel.clone(), tx.clone()));
                            members.len()
                        };
                        let joined = RelayServerFrame::Joined { channel, peer_count };
                        let _ = ws.send(Message::Text(serde_json::to_string(&joined).unwrap()));
                    }
                    Ok(RelayClientFrame::Leave) => members.lock().unwrap().retain(|(m, ..)| *m != id),
                    Ok(RelayClientFrame::Publish { channel, from, payload }) => {
                        let frame = RelayServerFrame::Message {
                            channel: channel.clone(),
                            from,
                            payload,
                        };
                        let text = serde_json::to_string(&frame).unwrap();
                        for (member, joined, outbox) in members.lock().unwrap().iter() {
                            if *member != id && *joined == channel {
                                let _ = outbox.send(text.clone());
                            }
                        }
                    }
                    Err(_) => {}
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(tungstenite::Error::Io(ref e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(_) => break,
            }
        }
        members.lock().unwrap().retain(|(m, ..)| *m != id);
    }

    /// Drain until `count` messages arrived or five seconds passed.
    fn wait_for(sub: &Subscription, count: usize) -> Vec<BusMessage> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut got = Vec::new();
        while got.len() < count && Instant::now() < deadline {
            got.extend(sub.drain());
            thread::sleep(Duration::from_millis(10));
        }
        got
    }

    #[test]
    fn test_connect_fails_without_relay() {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let result = RelayBus::connect(&format!("ws://127.0.0.1:{}/ws", port));

        assert!(matches!(result, Err(BusError::Connection(_))));
    }

    #[test]
    fn test_relay_delivers_to_other_endpoints_only() {
        let url = start_relay();
        let a = RelayBus::connect(&url).unwrap();
        let b = RelayBus::connect(&url).unwrap();
        let session = ChannelId::new("s42");
        let sub_a = a.subscribe(&session).unwrap();
        let sub_b = b.subscribe(&session).unwrap();
        let elsewhere = b.subscribe(&ChannelId::new("s7")).unwrap();

        a.publish(&session, &BusMessage::RequestInit);
        assert_eq!(wait_for(&sub_b, 1), vec![BusMessage::RequestInit]);

        // a's own request-init reached its subscription first and was dropped.
        b.publish(&session, &BusMessage::PresenterWindowCloseRequest);
        assert_eq!(wait_for(&sub_a, 1), vec![BusMessage::PresenterWindowCloseRequest]);
        assert!(elsewhere.drain().is_empty());
    }

    #[test]
    fn test_frames_published_before_drop_are_flushed() {
        let url = start_relay();
        let a = RelayBus::connect(&url).unwrap();
        let b = RelayBus::connect(&url).unwrap();
        let session = ChannelId::new("s42");
        let sub_b = b.subscribe(&session).unwrap();

        let release = BusMessage::PresenterDrawing {
            active: false,
            origin: crate::protocol::Origin::Presenter,
        };
        let clear = BusMessage::DrawingClear {
            source_id: "presenter-s42-toggle-off".to_string(),
        };
        a.publish(&session, &release);
        a.publish(&session, &clear);
        drop(a);

        assert_eq!(wait_for(&sub_b, 2), vec![release, clear]);
    }
}
