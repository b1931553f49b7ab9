//! Connection lifecycle: dial, register, run the sender and listener tasks,
//! and tear the session down again.
//!
//! State flows `Disconnected → Connecting → Handshaking → Connected →
//! Disconnecting → Disconnected`. It lives in a `watch` channel so callers,
//! the listener and the sender all observe the same value.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::builders;
use super::message::{Message, Prefix};

/// How long `connect` waits for `001` after sending the handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(3);

/// Default bound of the outbound queue.
pub const QUEUE_CAPACITY: usize = 25;

/// Consecutive read failures after which the stream is treated as closed.
const MAX_READ_ERRORS: usize = 8;

/// Longest inbound line kept, terminator included. Longer lines are dropped.
pub const MAX_LINE_LENGTH: usize = 8191;

/// Upper bound on flushing the outbound queue once the session is closing.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// How long `disconnect` waits for the session tasks before aborting them.
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Handshaking,
    Connected,
    Disconnecting,
}

impl ConnectionState {
    /// Whether the sender and listener tasks should keep running.
    fn is_live(self) -> bool {
        matches!(self, Self::Handshaking | Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("client is already connected")]
    AlreadyConnected,
    #[error("session has ended; a client connects only once")]
    SessionEnded,
    #[error("client is not connected")]
    NotConnected,
    #[error("handshake received no reply within {0:?}")]
    HandshakeTimeout(Duration),
    #[error("connection closed before registration completed")]
    HandshakeAborted,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("connection task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Tunables for a [`Client`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub queue_capacity: usize,
    pub handshake_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            queue_capacity: QUEUE_CAPACITY,
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }
}

struct Shared {
    state: watch::Sender<ConnectionState>,
    quit_sent: AtomicBool,
}

impl Shared {
    fn set(&self, next: ConnectionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(from = %prev, to = %next, "connection state changed");
        }
    }

    /// Move `from → to`; returns false if the state had already moved on.
    fn advance(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    fn begin_disconnect(&self) {
        self.state.send_if_modified(|state| {
            if state.is_live() {
                *state = ConnectionState::Disconnecting;
                true
            } else {
                false
            }
        });
    }
}

/// Handles for one physical connection.
struct Session {
    outbound: mpsc::Sender<Message>,
    stop: oneshot::Sender<()>,
    sender: JoinHandle<()>,
    listener: JoinHandle<()>,
}

/// A single IRC session with one server.
///
/// Messages other than `PING` and `001` are forwarded to the inbound sink
/// given to [`Client::connect`]; the sink is closed when the listener exits.
pub struct Client {
    identity: Prefix,
    realname: String,
    options: ClientOptions,
    shared: Arc<Shared>,
    session: Option<Session>,
    registered: bool,
}

impl Client {
    /// `identity` supplies the nick and user sent during registration.
    pub fn new(identity: Prefix, realname: impl Into<String>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            identity,
            realname: realname.into(),
            options: ClientOptions::default(),
            shared: Arc::new(Shared {
                state,
                quit_sent: AtomicBool::new(false),
            }),
            session: None,
            registered: false,
        }
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn identity(&self) -> &Prefix {
        &self.identity
    }

    pub fn realname(&self) -> &str {
        &self.realname
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Subscribe to connection state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Dial `addr` over TCP and register. Returns once the server sends `001`.
    pub async fn connect(
        &mut self,
        addr: &str,
        password: &str,
        inbound: mpsc::Sender<Message>,
    ) -> Result<(), ClientError> {
        self.ensure_unused()?;

        self.shared.set(ConnectionState::Connecting);
        info!(%addr, "connecting");
        let stream = match TcpStream::connect(addr).await {
            Ok(stream) => stream,
            Err(e) => {
                self.shared.set(ConnectionState::Disconnected);
                return Err(e.into());
            }
        };

        self.register(stream, password, inbound).await
    }

    /// Register over an already-established byte stream.
    pub async fn connect_stream<S>(
        &mut self,
        stream: S,
        password: &str,
        inbound: mpsc::Sender<Message>,
    ) -> Result<(), ClientError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        self.ensure_unused()?;
        self.register(stream, password, inbound).await
    }

    /// A client registers at most once. A failed dial does not count.
    fn ensure_unused(&self) -> Result<(), ClientError> {
        if self.session.is_some() && self.state().is_live() {
            return Err(ClientError::AlreadyConnected);
        }
        if self.registered {
            return Err(ClientError::SessionEnded);
        }
        Ok(())
    }

    async fn register<S>(
        &mut self,
        stream: S,
        password: &str,
        inbound: mpsc::Sender<Message>,
    ) -> Result<(), ClientError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        self.registered = true;
        self.shared.quit_sent.store(false, Ordering::SeqCst);
        self.shared.set(ConnectionState::Handshaking);

        let (reader, writer) = tokio::io::split(stream);
        let (outbound, queue) = mpsc::channel(self.options.queue_capacity.max(1));
        let (welcome_tx, welcome_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = oneshot::channel();

        let sender = tokio::spawn(send_loop(queue, writer, Arc::clone(&self.shared)));
        let listener = Listener {
            outbound: outbound.clone(),
            inbound,
            welcome: Some(welcome_tx),
            shared: Arc::clone(&self.shared),
            read_errors: 0,
            discarding: false,
        };
        let listener = tokio::spawn(listener.run(BufReader::new(reader), stop_rx));

        self.session = Some(Session {
            outbound,
            stop: stop_tx,
            sender,
            listener,
        });

        if self.send_handshake(password).await.is_err() {
            self.disconnect().await?;
            return Err(ClientError::HandshakeAborted);
        }

        let timeout = self.options.handshake_timeout;
        let welcomed = tokio::time::timeout(timeout, welcome_rx).await;
        match welcomed {
            Ok(Ok(()))
                if self
                    .shared
                    .advance(ConnectionState::Handshaking, ConnectionState::Connected) =>
            {
                info!("connection established");
                Ok(())
            }
            Ok(_) => {
                warn!("stream closed before registration completed");
                self.disconnect().await?;
                Err(ClientError::HandshakeAborted)
            }
            Err(_) => {
                warn!(?timeout, "handshake received no reply");
                self.disconnect().await?;
                Err(ClientError::HandshakeTimeout(timeout))
            }
        }
    }

    async fn send_handshake(&self, password: &str) -> Result<(), ClientError> {
        if !password.is_empty() {
            self.send(builders::pass(Prefix::default(), password)).await?;
        }
        self.send(builders::nick(Prefix::default(), &self.identity.nick))
            .await?;
        self.send(builders::user(
            Prefix::default(),
            &self.identity.user,
            "0",
            &self.realname,
        ))
        .await
    }

    /// Queue a message for the sender task. Waits while the queue is full.
    pub async fn send(&self, message: Message) -> Result<(), ClientError> {
        let session = self.session.as_ref().ok_or(ClientError::NotConnected)?;
        session
            .outbound
            .send(message)
            .await
            .map_err(|_| ClientError::NotConnected)
    }

    /// Queue a QUIT. The session ends when the server answers with ERROR,
    /// closes the stream, or [`Client::disconnect`] is called.
    pub async fn quit(&self, reason: &str) -> Result<(), ClientError> {
        if self.session.is_none() {
            return Err(ClientError::NotConnected);
        }
        self.shared.quit_sent.store(true, Ordering::SeqCst);
        self.send(builders::quit(Prefix::default(), reason)).await
    }

    /// Stop the listener, flush and close the outbound queue, and close the
    /// transport. Calling it with no session is a no-op.
    ///
    /// Queued messages get [`DRAIN_TIMEOUT`] to reach a peer that is not
    /// reading; after that the transport is closed regardless.
    pub async fn disconnect(&mut self) -> Result<(), ClientError> {
        let Some(Session {
            outbound,
            stop,
            mut sender,
            mut listener,
        }) = self.session.take()
        else {
            debug!("disconnect without a session");
            return Ok(());
        };

        self.shared.begin_disconnect();
        let _ = stop.send(());
        drop(outbound);

        let joined = tokio::time::timeout(JOIN_TIMEOUT, async {
            let (listener, sender) = tokio::join!(&mut listener, &mut sender);
            listener.and(sender)
        })
        .await;
        let result = match joined {
            Ok(result) => result,
            Err(_) => {
                warn!("session tasks did not stop in time, aborting");
                listener.abort();
                sender.abort();
                Ok(())
            }
        };
        self.shared.set(ConnectionState::Disconnected);
        info!("disconnected from server");

        result?;
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.shared.begin_disconnect();
            let _ = session.stop.send(());
        }
    }
}

enum Flow {
    Continue,
    Disconnect,
}

struct Listener {
    outbound: mpsc::Sender<Message>,
    inbound: mpsc::Sender<Message>,
    welcome: Option<oneshot::Sender<()>>,
    shared: Arc<Shared>,
    read_errors: usize,
    /// Inside an over-long line; skip input up to the next newline.
    discarding: bool,
}

impl Listener {
    async fn run<R>(mut self, mut reader: R, mut stop: oneshot::Receiver<()>)
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buf = Vec::new();
        loop {
            let flow = tokio::select! {
                biased;
                _ = &mut stop => break,
                flow = self.next_line(&mut reader, &mut buf) => flow,
            };
            if let Flow::Disconnect = flow {
                // The sender completes the move to Disconnected once the
                // transport is closed.
                self.shared.begin_disconnect();
                break;
            }
        }
        debug!("listener stopped");
    }

    async fn next_line<R>(&mut self, reader: &mut R, buf: &mut Vec<u8>) -> Flow
    where
        R: AsyncBufRead + Unpin,
    {
        buf.clear();
        let read = (&mut *reader)
            .take(MAX_LINE_LENGTH as u64)
            .read_until(b'\n', buf)
            .await;
        match read {
            Ok(0) => {
                info!("reached end of stream, disconnecting");
                Flow::Disconnect
            }
            Ok(n) => {
                self.read_errors = 0;
                let complete = buf.last() == Some(&b'\n');
                if self.discarding {
                    self.discarding = !complete;
                    return Flow::Continue;
                }
                if !complete && n >= MAX_LINE_LENGTH {
                    warn!(limit = MAX_LINE_LENGTH, "dropping over-long line");
                    self.discarding = true;
                    return Flow::Continue;
                }
                let line = String::from_utf8_lossy(buf).into_owned();
                self.dispatch(&line).await
            }
            Err(e) => {
                self.read_errors += 1;
                warn!(error = %e, "read error");
                if self.read_errors >= MAX_READ_ERRORS {
                    warn!("too many consecutive read errors, disconnecting");
                    Flow::Disconnect
                } else {
                    Flow::Continue
                }
            }
        }
    }

    async fn dispatch(&mut self, line: &str) -> Flow {
        if line.trim().is_empty() {
            return Flow::Continue;
        }
        let message = match Message::parse(line) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, line = line.trim_end(), "dropping unparseable line");
                return Flow::Continue;
            }
        };
        debug!(%message, "recv");

        match message.command() {
            // RPL_WELCOME
            "001" => {
                if let Some(welcome) = self.welcome.take() {
                    let _ = welcome.send(());
                }
            }
            "PING" => {
                let token = message.field("server1").unwrap_or_default();
                let pong = builders::pong(Prefix::default(), token, "");
                if self.outbound.send(pong).await.is_err() {
                    debug!("outbound queue closed, PONG dropped");
                }
            }
            "ERROR" if self.shared.quit_sent.load(Ordering::SeqCst) => {
                info!(reason = ?message.params().first(), "server closed session after QUIT");
                return Flow::Disconnect;
            }
            _ => {
                if self.inbound.send(message).await.is_err() {
                    debug!("inbound sink closed, message dropped");
                }
            }
        }
        Flow::Continue
    }
}

async fn send_loop<W>(mut queue: mpsc::Receiver<Message>, mut writer: W, shared: Arc<Shared>)
where
    W: AsyncWrite + Unpin,
{
    let mut state = shared.state.subscribe();
    let mut stalled = false;
    loop {
        let next = tokio::select! {
            biased;
            next = queue.recv() => next,
            () = closing(&mut state) => break,
        };
        let Some(message) = next else { break };

        let write = write_message(&mut writer, &message);
        tokio::pin!(write);
        tokio::select! {
            biased;
            () = &mut write => continue,
            () = closing(&mut state) => {}
        }
        // Closing with a write in flight: a peer that stopped reading gets
        // one grace period, then the transport is closed under it.
        stalled = tokio::time::timeout(DRAIN_TIMEOUT, write).await.is_err();
        break;
    }

    // Flush whatever was queued before the session started closing.
    queue.close();
    if !stalled {
        let drain = async {
            while let Some(message) = queue.recv().await {
                write_message(&mut writer, &message).await;
            }
        };
        stalled = tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err();
    }
    if stalled {
        warn!("peer is not reading, dropping queued messages");
    } else if let Err(e) = writer.shutdown().await {
        debug!(error = %e, "transport shutdown failed");
    }

    drop(writer);
    shared.advance(ConnectionState::Disconnecting, ConnectionState::Disconnected);
    debug!("sender stopped");
}

async fn closing(state: &mut watch::Receiver<ConnectionState>) {
    let _ = state.wait_for(|state| !state.is_live()).await;
}

async fn write_message<W>(writer: &mut W, message: &Message)
where
    W: AsyncWrite + Unpin,
{
    let wire = message.to_wire();
    debug!(line = wire.trim_end(), "send");
    let written = async {
        writer.write_all(wire.as_bytes()).await?;
        writer.flush().await
    };
    if let Err(e) = written.await {
        warn!(error = %e, "write failed");
    }
}
