//! Streaming server - pushes full pose snapshots to every connected client
//!
//! One tokio task per connection. Tasks share nothing but the
//! [`PoseStateStore`], so a slow or dead client only ever ends its own task.
//!
//! Per connection:
//!
//! ```text
//! Accepted ──► Streaming ──► Closed
//!                 │  ▲
//!                 └──┘ snapshot → encode → write → wait send_interval
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use posestream_core::{JointSet, PoseError, PoseResult, PoseSnapshot};
use posestream_state::PoseStateStore;
use posestream_wire::{encode_frame_into, StreamFrame};

/// Default listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5001";

/// Streaming server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address `serve_forever` binds when none is given
    pub listen_addr: String,
    /// Pause between two frames on one connection
    pub send_interval: Duration,
    /// Longest a single frame write may block before the client is dropped
    pub send_timeout: Duration,
    /// Authoritative set of valid joints
    pub joints: JointSet,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            send_interval: Duration::from_millis(50),
            send_timeout: Duration::from_secs(1),
            joints: JointSet::all(),
        }
    }
}

impl ServerConfig {
    /// Reject values the send loop cannot run with
    pub fn validate(&self) -> PoseResult<()> {
        if self.send_interval.is_zero() {
            return Err(PoseError::Config("send_interval must be > 0".into()));
        }
        if self.send_timeout.is_zero() {
            return Err(PoseError::Config("send_timeout must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ServerStats {
    pub active_connections: usize,
    pub accepted: u64,
    pub closed: u64,
    pub frames_sent: u64,
}

#[derive(Debug, Default)]
struct Counters {
    active: AtomicUsize,
    accepted: AtomicU64,
    closed: AtomicU64,
    frames_sent: AtomicU64,
}

/// Lifecycle of one client link
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Accepted,
    Streaming,
    Closed,
}

struct Connection {
    peer: SocketAddr,
    state: ConnectionState,
    started: Instant,
    seq: u64,
}

impl Connection {
    fn new(peer: SocketAddr) -> Self {
        Connection {
            peer,
            state: ConnectionState::Accepted,
            started: Instant::now(),
            seq: 0,
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        debug_assert!(
            matches!(
                (self.state, next),
                (ConnectionState::Accepted, ConnectionState::Streaming)
                    | (ConnectionState::Streaming, ConnectionState::Closed)
            ),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!("Client {}: {:?} -> {:?}", self.peer, self.state, next);
        self.state = next;
    }

    fn next_frame(&mut self, pose: PoseSnapshot) -> StreamFrame {
        let frame = StreamFrame::new(self.seq, self.started.elapsed().as_micros() as u64, pose);
        self.seq += 1;
        frame
    }
}

/// A bound, not yet serving, listener
pub struct Listener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// TCP server streaming the current pose to every client
pub struct StreamingServer {
    config: ServerConfig,
    store: Arc<PoseStateStore>,
    shutdown: watch::Sender<bool>,
    counters: Arc<Counters>,
}

impl StreamingServer {
    /// Fails with `Config` if `config` does not validate
    pub fn new(config: ServerConfig) -> PoseResult<Self> {
        config.validate()?;
        let (shutdown, _) = watch::channel(false);
        Ok(StreamingServer {
            store: Arc::new(PoseStateStore::new(config.joints)),
            config,
            shutdown,
            counters: Arc::new(Counters::default()),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Shared handle to the pose store
    pub fn store(&self) -> Arc<PoseStateStore> {
        Arc::clone(&self.store)
    }

    /// Merge producer angles into the served pose. Callable from any thread.
    pub fn update_joint_angles(&self, partial: &PoseSnapshot) -> PoseResult<()> {
        self.store.update(partial)
    }

    /// Same as `update_joint_angles`, keyed by joint name
    pub fn update_joint_angles_named<S: AsRef<str>>(
        &self,
        entries: &[(S, [f64; 3])],
    ) -> PoseResult<()> {
        self.store.update_named(entries)
    }

    /// Current full pose
    pub fn snapshot(&self) -> PoseSnapshot {
        self.store.snapshot()
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            active_connections: self.counters.active.load(Ordering::Relaxed),
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            closed: self.counters.closed.load(Ordering::Relaxed),
            frames_sent: self.counters.frames_sent.load(Ordering::Relaxed),
        }
    }

    pub fn active_connections(&self) -> usize {
        self.counters.active.load(Ordering::Relaxed)
    }

    /// Bind the listening socket. Failure is fatal and not retried.
    pub async fn bind(&self, addr: &str) -> PoseResult<Listener> {
        let listener = TcpListener::bind(addr).await.map_err(|e| PoseError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
        let local_addr = listener.local_addr().map_err(|e| PoseError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

        info!("Pose stream listening on {}", local_addr);
        Ok(Listener {
            listener,
            local_addr,
        })
    }

    /// Bind `addr` and serve until [`stop`](Self::stop)
    pub async fn serve_forever(&self, addr: &str) -> PoseResult<()> {
        let listener = self.bind(addr).await?;
        self.serve(listener).await
    }

    /// Bind and serve on a tokio runtime owned by the calling thread
    ///
    /// For producers without an async runtime: run this on a dedicated
    /// `std::thread` and keep calling `update_joint_angles` elsewhere.
    pub fn serve_forever_blocking(&self, addr: &str) -> PoseResult<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("posestream-server")
            .enable_all()
            .build()
            .map_err(|e| PoseError::TransportError(e.to_string()))?;
        runtime.block_on(self.serve_forever(addr))
    }

    /// Bind synchronously, then run the accept loop on a spawned task
    pub async fn start(
        self: &Arc<Self>,
        addr: &str,
    ) -> PoseResult<(SocketAddr, tokio::task::JoinHandle<PoseResult<()>>)> {
        let listener = self.bind(addr).await?;
        let local_addr = listener.local_addr();
        let server = Arc::clone(self);
        let handle = tokio::spawn(async move { server.serve(listener).await });
        Ok((local_addr, handle))
    }

    /// Accept loop; returns once stopped and every connection has closed
    pub async fn serve(&self, listener: Listener) -> PoseResult<()> {
        let Listener {
            listener,
            local_addr,
        } = listener;
        let mut shutdown = self.shutdown.subscribe();
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = stopped(&mut shutdown) => break,
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                        info!("Client connected from {}", peer);
                        connections.spawn(handle_client(
                            stream,
                            peer,
                            Arc::clone(&self.store),
                            self.config.clone(),
                            self.shutdown.subscribe(),
                            Arc::clone(&self.counters),
                        ));
                    }
                    Err(e) => {
                        warn!("Accept on {} failed: {}", local_addr, e);
                        time::sleep(Duration::from_millis(10)).await;
                    }
                },
            }
        }

        drop(listener);
        while connections.join_next().await.is_some() {}
        info!("Pose stream on {} stopped", local_addr);
        Ok(())
    }

    /// Stop accepting and close every active connection
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
        info!("Pose stream shutdown requested");
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Resolves once the shutdown flag is set (or its sender is gone)
pub(crate) async fn stopped(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn handle_client(
    mut stream: TcpStream,
    peer: SocketAddr,
    store: Arc<PoseStateStore>,
    config: ServerConfig,
    mut shutdown: watch::Receiver<bool>,
    counters: Arc<Counters>,
) {
    let mut conn = Connection::new(peer);
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Client {}: set_nodelay failed: {}", peer, e);
    }

    counters.active.fetch_add(1, Ordering::Relaxed);
    conn.transition(ConnectionState::Streaming);

    let result = stream_frames(&mut stream, &mut conn, &store, &config, &mut shutdown, &counters).await;
    match &result {
        Ok(()) => debug!("Client {}: closing on shutdown", peer),
        Err(e) => warn!("Client {} dropped after {} frames: {}", peer, conn.seq, e),
    }

    let _ = stream.shutdown().await;
    conn.transition(ConnectionState::Closed);
    counters.active.fetch_sub(1, Ordering::Relaxed);
    counters.closed.fetch_add(1, Ordering::Relaxed);
    info!("Client {} disconnected", peer);
}

async fn stream_frames(
    stream: &mut TcpStream,
    conn: &mut Connection,
    store: &PoseStateStore,
    config: &ServerConfig,
    shutdown: &mut watch::Receiver<bool>,
    counters: &Counters,
) -> PoseResult<()> {
    let mut ticker = time::interval(config.send_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut buf = BytesMut::with_capacity(1024);

    loop {
        tokio::select! {
            _ = stopped(shutdown) => return Ok(()),
            _ = ticker.tick() => {}
        }

        let frame = conn.next_frame(store.snapshot());
        buf.clear();
        encode_frame_into(&frame, &mut buf);

        match time::timeout(config.send_timeout, stream.write_all(&buf)).await {
            Ok(Ok(())) => {
                counters.frames_sent.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => return Err(PoseError::TransportError(e.to_string())),
            Err(_) => {
                return Err(PoseError::TransportError(format!(
                    "send blocked longer than {:?}",
                    config.send_timeout
                )))
            }
        }
    }
}
