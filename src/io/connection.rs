//! Connection lifecycle manager
//!
//! One `Connection` owns one TCP peer relationship, in either client or
//! server role, and runs it on a dedicated worker thread. The worker owns
//! the socket, the framing state machine, the dispatcher and the outbound
//! queues exclusively; other threads talk to it only through channels
//! (commands in, [`StreamEvent`]s out), so the actual socket traffic always
//! happens on the connection's own thread.
//!
//! State changes are the sole externally observable lifecycle signal:
//! `Inactive -> Connecting -> Connected` for clients,
//! `Inactive -> Listening -> Connected` for servers, and the reverse on
//! teardown. A server accepts at most one concurrent peer; further
//! connection attempts are rejected without disturbing the existing one.

use crate::dialect::{DialectKind, Dispatcher, StreamEvent};
use crate::error::{LinkError, Result};
use crate::io::framer::{FramerPoll, MessageFramer};
use crate::io::outbound::{OutboundQueues, RetryPolicy, SendGate, MAX_PENDING_WRITE_BYTES};
use crate::protocol::message::WireMessage;
use crate::protocol::types::{ImageMessage, StatusMessage, UsStatusMessage};
use bytes::{Buf, BytesMut};
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Default port for tracked-data servers
pub const DEFAULT_TRACKING_PORT: u16 = 18944;

/// Default port for image-only servers
pub const DEFAULT_IMAGE_PORT: u16 = 18333;

/// Bounded wait used by "connect and wait for confirmation" callers
pub const CONNECT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Worker poll cadence while waiting for commands or socket readiness
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Which end of the TCP relationship this connection plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Client,
    Server,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => f.write_str("client"),
            Role::Server => f.write_str("server"),
        }
    }
}

/// Observable lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Inactive,
    Connecting,
    Connected,
    Listening,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Inactive => f.write_str("inactive"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Connected => f.write_str("connected"),
            ConnectionState::Listening => f.write_str("listening"),
        }
    }
}

/// Everything needed to set a connection up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub role: Role,
    pub host: String,
    pub port: u16,
    pub dialect: DialectKind,
    /// Verify body CRCs on receive
    pub verify_crc: bool,
}

impl ConnectionConfig {
    /// Client connecting out to a scanner or streaming server
    pub fn client(host: impl Into<String>, port: u16) -> Self {
        ConnectionConfig {
            role: Role::Client,
            host: host.into(),
            port,
            dialect: DialectKind::default(),
            verify_crc: true,
        }
    }

    /// Server waiting for one incoming peer
    pub fn server(port: u16) -> Self {
        ConnectionConfig {
            role: Role::Server,
            host: "0.0.0.0".to_string(),
            port,
            dialect: DialectKind::default(),
            verify_crc: true,
        }
    }

    pub fn with_dialect(mut self, dialect: DialectKind) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn without_crc(mut self) -> Self {
        self.verify_crc = false;
        self
    }

    /// Human-readable summary for status display and failure reporting
    pub fn describe(&self) -> String {
        format!(
            "{} {}:{} ({} dialect)",
            self.role, self.host, self.port, self.dialect
        )
    }
}

enum Command {
    Connect,
    Disconnect,
    SendImage(Vec<u8>),
    SendStatus(Vec<u8>),
    Shutdown,
}

/// Outcome tracking for the most recent connect request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectAttempt {
    Idle,
    Pending,
    Done(bool),
}

struct Lifecycle {
    state: ConnectionState,
    attempt: ConnectAttempt,
}

struct Shared {
    lifecycle: Mutex<Lifecycle>,
    changed: Condvar,
    local_addr: Mutex<Option<std::net::SocketAddr>>,
}

/// Handle to a connection running on its own worker thread
///
/// Producers on any thread enqueue outbound messages through this handle;
/// decoded events and lifecycle notifications arrive on [`events`]. The
/// worker shuts down when the handle is dropped.
///
/// [`events`]: Connection::events
pub struct Connection {
    config: ConnectionConfig,
    cmd_tx: Sender<Command>,
    event_rx: Receiver<StreamEvent>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Connection {
    /// Create the connection and move its worker onto a dedicated thread
    ///
    /// The connection starts `Inactive`; call [`request_connect`] to bring
    /// it up.
    ///
    /// [`request_connect`]: Connection::request_connect
    pub fn spawn(config: ConnectionConfig) -> Self {
        let (cmd_tx, cmd_rx) = channel();
        let (event_tx, event_rx) = channel();
        let shared = Arc::new(Shared {
            lifecycle: Mutex::new(Lifecycle {
                state: ConnectionState::Inactive,
                attempt: ConnectAttempt::Idle,
            }),
            changed: Condvar::new(),
            local_addr: Mutex::new(None),
        });

        let worker = Worker {
            config: config.clone(),
            cmd_rx,
            event_tx,
            shared: Arc::clone(&shared),
            listener: None,
            stream: None,
            recv_buf: BytesMut::with_capacity(64 * 1024),
            framer: MessageFramer::new(config.verify_crc),
            dispatcher: Dispatcher::new(config.dialect),
            queues: OutboundQueues::new(),
            gate: SendGate::default(),
            pending_write: BytesMut::new(),
        };

        let handle = std::thread::Builder::new()
            .name(format!("sonolink-{}", config.role))
            .spawn(move || worker.run())
            .expect("failed to spawn connection worker thread");

        Connection {
            config,
            cmd_tx,
            event_rx,
            shared,
            worker: Some(handle),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.shared.lifecycle.lock().unwrap().state
    }

    /// Local socket address once listening or connected
    ///
    /// Mainly useful for servers bound to port 0.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        *self.shared.local_addr.lock().unwrap()
    }

    /// Ask the worker to connect (client) or start listening (server)
    ///
    /// Idempotent: requesting while already connecting or connected is a
    /// no-op beyond re-logging the intent.
    pub fn request_connect(&self) -> Result<()> {
        self.send_command(Command::Connect)
    }

    /// Tear down the active socket and, for servers, stop listening
    pub fn request_disconnect(&self) -> Result<()> {
        self.send_command(Command::Disconnect)
    }

    /// Enqueue an image frame for transmission
    ///
    /// Encoding happens on the caller's thread; the worker only moves
    /// bytes. When the image queue is full the oldest frame is dropped.
    pub fn send_image(&self, device: &str, image: ImageMessage) -> Result<()> {
        let bytes = WireMessage::new(image, device)?.encode()?;
        self.send_command(Command::SendImage(bytes))
    }

    /// Enqueue a probe status update
    ///
    /// The status does not get its own transmission slot; it is bundled
    /// in front of the next image frame.
    pub fn send_us_status(&self, device: &str, status: UsStatusMessage) -> Result<()> {
        let bytes = WireMessage::new(status, device)?.encode()?;
        self.send_command(Command::SendStatus(bytes))
    }

    /// Enqueue a generic status message
    pub fn send_status(&self, device: &str, status: StatusMessage) -> Result<()> {
        let bytes = WireMessage::new(status, device)?.encode()?;
        self.send_command(Command::SendStatus(bytes))
    }

    /// Receiver for decoded events and lifecycle notifications
    pub fn events(&self) -> &Receiver<StreamEvent> {
        &self.event_rx
    }

    /// Non-blocking event fetch
    pub fn try_event(&self) -> Option<StreamEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Block until the connection reaches `want`, up to `timeout`
    pub fn wait_for_state(&self, want: ConnectionState, timeout: Duration) -> bool {
        self.wait_where(|s| s == want, timeout)
    }

    /// Connect and block until the attempt concludes, bounded by `timeout`
    ///
    /// The one intentionally blocking call in the engine; keep it off
    /// latency-sensitive threads. Success means `Connected` for clients
    /// and `Listening` for servers; a failed attempt returns as soon as
    /// the worker has given up rather than waiting out the timeout.
    pub fn connect_and_wait(&self, timeout: Duration) -> Result<()> {
        self.shared.lifecycle.lock().unwrap().attempt = ConnectAttempt::Idle;
        self.request_connect()?;

        let deadline = Instant::now() + timeout;
        let mut lifecycle = self.shared.lifecycle.lock().unwrap();
        loop {
            if let ConnectAttempt::Done(ok) = lifecycle.attempt {
                return if ok {
                    Ok(())
                } else {
                    Err(LinkError::NotConnected(self.config.describe()))
                };
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(LinkError::NotConnected(self.config.describe()));
            }
            let (guard, _) = self
                .shared
                .changed
                .wait_timeout(lifecycle, deadline - now)
                .unwrap();
            lifecycle = guard;
        }
    }

    fn wait_where<F: Fn(ConnectionState) -> bool>(&self, pred: F, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut lifecycle = self.shared.lifecycle.lock().unwrap();
        loop {
            if pred(lifecycle.state) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .shared
                .changed
                .wait_timeout(lifecycle, deadline - now)
                .unwrap();
            lifecycle = guard;
        }
    }

    fn send_command(&self, cmd: Command) -> Result<()> {
        self.cmd_tx.send(cmd).map_err(|_| LinkError::ChannelClosed)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

/// Establish a stream with bounded linear-backoff retries
///
/// Each attempt spawns a fresh connection and waits for confirmation;
/// exhausting the policy is a terminal failure for the session, reported
/// without crashing the process.
pub fn connect_with_retry(config: &ConnectionConfig, policy: &RetryPolicy) -> Result<Connection> {
    for attempt in 1..=policy.max_attempts {
        let conn = Connection::spawn(config.clone());
        match conn.connect_and_wait(CONNECT_WAIT_TIMEOUT) {
            Ok(()) => {
                info!(attempt, target = %config.describe(), "Stream established");
                return Ok(conn);
            }
            Err(e) => {
                warn!(attempt, error = %e, "Stream establishment attempt failed");
                drop(conn);
                if attempt < policy.max_attempts {
                    std::thread::sleep(policy.delay_for_attempt(attempt));
                }
            }
        }
    }

    Err(LinkError::NotConnected(format!(
        "{} unreachable after {} attempts",
        config.describe(),
        policy.max_attempts
    )))
}

struct Worker {
    config: ConnectionConfig,
    cmd_rx: Receiver<Command>,
    event_tx: Sender<StreamEvent>,
    shared: Arc<Shared>,
    listener: Option<TcpListener>,
    stream: Option<TcpStream>,
    recv_buf: BytesMut,
    framer: MessageFramer,
    dispatcher: Dispatcher,
    queues: OutboundQueues,
    gate: SendGate,
    pending_write: BytesMut,
}

impl Worker {
    fn run(mut self) {
        loop {
            match self.cmd_rx.recv_timeout(POLL_INTERVAL) {
                Ok(Command::Shutdown) => break,
                Ok(cmd) => {
                    self.handle_command(cmd);
                    // Drain anything else queued behind it
                    let mut shutdown = false;
                    while let Ok(cmd) = self.cmd_rx.try_recv() {
                        if matches!(cmd, Command::Shutdown) {
                            shutdown = true;
                            break;
                        }
                        self.handle_command(cmd);
                    }
                    if shutdown {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            self.accept_incoming();
            self.pump_recv();
            self.pump_send();
        }

        self.teardown();
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect => {
                let state = self.state();
                if state != ConnectionState::Inactive {
                    debug!(%state, "Connect requested while active, ignoring");
                    self.finish_attempt(true);
                    return;
                }
                self.begin_attempt();
                self.do_connect();
                let up = matches!(
                    self.state(),
                    ConnectionState::Connected | ConnectionState::Listening
                );
                self.finish_attempt(up);
            }
            Command::Disconnect => self.do_disconnect(),
            Command::SendImage(bytes) => self.queues.enqueue_image(bytes),
            Command::SendStatus(bytes) => self.queues.enqueue_status(bytes),
            Command::Shutdown => unreachable!("handled by the run loop"),
        }
    }

    fn do_connect(&mut self) {
        match self.config.role {
            Role::Client => {
                self.set_state(ConnectionState::Connecting);
                info!(target = %self.config.describe(), "Connecting");

                match self.open_client_stream() {
                    Ok(stream) => {
                        tune_stream(&stream);
                        *self.shared.local_addr.lock().unwrap() = stream.local_addr().ok();
                        self.stream = Some(stream);
                        self.set_state(ConnectionState::Connected);
                    }
                    Err(e) => {
                        error!(target = %self.config.describe(), error = %e, "Connect failed");
                        self.emit(StreamEvent::Error(format!(
                            "{}: {}",
                            self.config.describe(),
                            e
                        )));
                        self.set_state(ConnectionState::Inactive);
                    }
                }
            }
            Role::Server => {
                let addr = format!("{}:{}", self.config.host, self.config.port);
                match TcpListener::bind(&addr) {
                    Ok(listener) => {
                        if let Err(e) = listener.set_nonblocking(true) {
                            warn!(error = %e, "Failed to set listener non-blocking");
                        }
                        info!(%addr, "Listening");
                        *self.shared.local_addr.lock().unwrap() = listener.local_addr().ok();
                        self.listener = Some(listener);
                        self.set_state(ConnectionState::Listening);
                    }
                    Err(e) => {
                        error!(%addr, error = %e, "Bind failed");
                        self.emit(StreamEvent::Error(format!(
                            "{}: {}",
                            self.config.describe(),
                            e
                        )));
                        self.set_state(ConnectionState::Inactive);
                    }
                }
            }
        }
    }

    fn open_client_stream(&self) -> std::io::Result<TcpStream> {
        let addr = (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(ErrorKind::AddrNotAvailable, "host did not resolve")
            })?;
        TcpStream::connect_timeout(&addr, CONNECT_WAIT_TIMEOUT)
    }

    fn do_disconnect(&mut self) {
        if self.stream.is_none() && self.listener.is_none() {
            debug!("Disconnect requested while inactive, ignoring");
            return;
        }

        info!(target = %self.config.describe(), "Disconnecting");
        self.drop_session();
        self.listener = None;
        self.set_state(ConnectionState::Inactive);
    }

    /// Discard the active peer and all in-flight per-session state
    fn drop_session(&mut self) {
        self.stream = None;
        self.framer.reset();
        self.recv_buf.clear();
        self.pending_write.clear();
        self.queues.clear();
    }

    fn accept_incoming(&mut self) {
        let Some(listener) = self.listener.as_ref() else {
            return;
        };

        match listener.accept() {
            Ok((peer, addr)) => {
                if self.stream.is_some() {
                    // Single-connection policy: the existing session wins
                    error!(%addr, "Rejecting second incoming connection");
                    self.emit(StreamEvent::Error(format!(
                        "rejected second incoming connection from {addr}"
                    )));
                    drop(peer);
                } else {
                    info!(%addr, "Peer connected");
                    tune_stream(&peer);
                    self.stream = Some(peer);
                    self.set_state(ConnectionState::Connected);
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => {
                warn!(error = %e, "Accept failed");
            }
        }
    }

    fn pump_recv(&mut self) {
        if self.stream.is_none() {
            return;
        }

        // Drain the socket into the receive buffer
        let failure = {
            let stream = self.stream.as_mut().unwrap();
            let mut chunk = [0u8; 8192];
            loop {
                match stream.read(&mut chunk) {
                    Ok(0) => break Some("connection closed by peer".to_string()),
                    Ok(n) => self.recv_buf.extend_from_slice(&chunk[..n]),
                    Err(e) if e.kind() == ErrorKind::WouldBlock => break None,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => break Some(e.to_string()),
                }
            }
        };

        if let Some(msg) = failure {
            self.handle_socket_error(&msg);
            return;
        }

        // Process as many complete messages as the buffered bytes allow
        loop {
            match self.framer.poll_message(&mut self.recv_buf) {
                Ok(FramerPoll::Message(raw)) => match self.dispatcher.dispatch(&raw) {
                    Ok(events) => {
                        for event in events {
                            self.emit(event);
                        }
                    }
                    Err(e) => {
                        warn!(
                            device_type = raw.device_type(),
                            device = raw.device_name(),
                            error = %e,
                            "Failed to decode message body"
                        );
                        self.emit(StreamEvent::Error(e.to_string()));
                    }
                },
                Ok(FramerPoll::NotReady) => break,
                Err(e @ LinkError::CrcMismatch { .. }) => {
                    // Body was consumed; framing is still synchronized
                    error!(error = %e, "Dropping corrupt message");
                    self.emit(StreamEvent::Error(e.to_string()));
                }
                Err(e) => {
                    // Framing is beyond repair (e.g. absurd body size)
                    self.handle_socket_error(&e.to_string());
                    break;
                }
            }
        }
    }

    fn pump_send(&mut self) {
        if self.stream.is_none() {
            return;
        }

        if let Some(msg) = self.flush_pending() {
            self.handle_socket_error(&msg);
            return;
        }

        while self
            .gate
            .is_ready(self.stream.is_some(), self.pending_write.len())
        {
            match self.queues.next_bundle() {
                Some(bytes) => {
                    self.pending_write.extend_from_slice(&bytes);
                    if let Some(msg) = self.flush_pending() {
                        self.handle_socket_error(&msg);
                        return;
                    }
                }
                None => break,
            }
        }
    }

    /// Write as much pending data as the socket accepts right now
    ///
    /// Returns an error description when the socket failed.
    fn flush_pending(&mut self) -> Option<String> {
        let stream = self.stream.as_mut()?;

        while !self.pending_write.is_empty() {
            match stream.write(&self.pending_write) {
                Ok(0) => return Some("socket accepted zero bytes".to_string()),
                Ok(n) => self.pending_write.advance(n),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Some(e.to_string()),
            }
        }
        None
    }

    fn handle_socket_error(&mut self, msg: &str) {
        error!(target = %self.config.describe(), error = msg, "Socket error");
        self.emit(StreamEvent::Error(format!(
            "{}: {}",
            self.config.describe(),
            msg
        )));

        self.drop_session();

        // A server goes back to waiting for the next peer; a client is done
        if self.listener.is_some() {
            self.set_state(ConnectionState::Listening);
        } else {
            self.set_state(ConnectionState::Inactive);
        }
    }

    fn teardown(&mut self) {
        self.drop_session();
        self.listener = None;
        self.set_state(ConnectionState::Inactive);
    }

    fn state(&self) -> ConnectionState {
        self.shared.lifecycle.lock().unwrap().state
    }

    fn set_state(&self, new_state: ConnectionState) {
        {
            let mut lifecycle = self.shared.lifecycle.lock().unwrap();
            if lifecycle.state == new_state {
                return;
            }
            info!(from = %lifecycle.state, to = %new_state, "Connection state changed");
            lifecycle.state = new_state;
            self.shared.changed.notify_all();
        }
        self.emit(StreamEvent::StateChanged(new_state));
    }

    fn begin_attempt(&self) {
        self.shared.lifecycle.lock().unwrap().attempt = ConnectAttempt::Pending;
        self.shared.changed.notify_all();
    }

    fn finish_attempt(&self, up: bool) {
        self.shared.lifecycle.lock().unwrap().attempt = ConnectAttempt::Done(up);
        self.shared.changed.notify_all();
    }

    fn emit(&self, event: StreamEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// Apply the engine's socket tuning to a connected stream
///
/// Non-blocking mode is required by the poll loop; TCP_NODELAY keeps frame
/// latency down; the kernel send buffer is sized to the backpressure
/// threshold so the gate, not the kernel, decides when to drop.
fn tune_stream(stream: &TcpStream) {
    if let Err(e) = stream.set_nonblocking(true) {
        warn!(error = %e, "Failed to set stream non-blocking");
    }
    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "Failed to set TCP_NODELAY");
    }
    if let Err(e) = set_socket_buffer(stream, libc::SO_SNDBUF, MAX_PENDING_WRITE_BYTES) {
        debug!(error = %e, "Failed to set send buffer size");
    }
    if let Err(e) = set_socket_buffer(stream, libc::SO_RCVBUF, 1 << 20) {
        debug!(error = %e, "Failed to set receive buffer size");
    }
}

fn set_socket_buffer(
    stream: &TcpStream,
    option: libc::c_int,
    size: usize,
) -> std::io::Result<()> {
    use std::os::fd::AsRawFd;

    let fd = stream.as_raw_fd();
    let size = size as libc::c_int;

    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            option,
            &size as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };

    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}
