//! Connection lifecycle for the live event channel.
//!
//! A [`Connection`] owns the websocket and the [`Dispatcher`]. Each session:
//! 1. opens the socket
//! 2. fetches a [`Snapshot`] from the [`Bootstrapper`] and seeds the mirror
//! 3. feeds text frames to the dispatcher until the socket closes
//! 4. clears the mirror
//!
//! Between sessions it waits with exponential backoff and jitter. Control
//! goes through a [`ConnectionHandle`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::{RwLock, mpsc};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::dispatch::{Dispatcher, FrameStats, StateReader};
use crate::error::{ClientError, ClientResult};
use crate::state::Snapshot;

/// A boxed future that is Send.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Source of the full-state snapshot applied on every (re)connect.
///
/// The server exposes the snapshot out of band (HTTP); the connection only
/// needs it delivered as a [`Snapshot`].
pub trait Bootstrapper: Send + Sync {
    /// Fetches the current server state.
    fn snapshot(&self) -> BoxFuture<'_, ClientResult<Snapshot>>;
}

/// Bootstrapper that always starts from an empty mirror.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyBootstrap;

impl Bootstrapper for EmptyBootstrap {
    fn snapshot(&self) -> BoxFuture<'_, ClientResult<Snapshot>> {
        Box::pin(async { Ok(Snapshot::default()) })
    }
}

/// Reconnect timing.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    pub initial_backoff: Duration,
    /// Upper bound for the delay.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
    /// Maximum jitter as a fraction of the delay (0.0-1.0).
    pub jitter_fraction: f64,
    /// Give up after this many consecutive failed attempts. `None` retries forever.
    pub max_consecutive_failures: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_fraction: 0.1,
            max_consecutive_failures: None,
        }
    }
}

impl ReconnectPolicy {
    /// Builder: set backoff parameters.
    pub fn with_backoff(mut self, initial: Duration, max: Duration, multiplier: f64) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self.multiplier = multiplier;
        self
    }

    /// Builder: set jitter fraction.
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Builder: set the failure limit.
    pub fn with_max_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = Some(max);
        self
    }

    /// Calculates the backoff delay, without jitter, after `consecutive_failures`
    /// failed attempts. A clean close counts as zero failures and waits the
    /// initial delay.
    pub fn backoff_delay(&self, consecutive_failures: u32) -> Duration {
        let base = self.initial_backoff.as_secs_f64();
        let exponent = consecutive_failures.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay = base * self.multiplier.powi(exponent);
        let max = self.max_backoff.as_secs_f64();

        Duration::try_from_secs_f64(delay.min(max)).unwrap_or(self.max_backoff)
    }

    /// Calculates the backoff delay with jitter applied.
    pub fn next_delay(&self, consecutive_failures: u32) -> Duration {
        let base = self.backoff_delay(consecutive_failures).as_secs_f64();
        let jitter = rand_jitter(base * self.jitter_fraction);
        Duration::try_from_secs_f64((base + jitter).max(0.0)).unwrap_or(self.max_backoff)
    }

    /// Returns true once the failure limit is reached.
    pub fn exhausted(&self, consecutive_failures: u32) -> bool {
        self.max_consecutive_failures
            .is_some_and(|max| consecutive_failures >= max)
    }
}

/// Pseudo-random value in [-range, range] derived from the clock.
fn rand_jitter(range: f64) -> f64 {
    use std::time::SystemTime;

    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();

    let fraction = (nanos as f64) / (1_000_000_000.0);
    (fraction * 2.0 - 1.0) * range
}

/// Connection settings.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Websocket endpoint, `ws://` or `wss://`.
    pub url: Url,
    /// Timeout for the websocket handshake.
    pub connect_timeout: Duration,
    pub policy: ReconnectPolicy,
}

impl ConnectionConfig {
    /// Creates a config with default timeout and policy.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            connect_timeout: Duration::from_secs(10),
            policy: ReconnectPolicy::default(),
        }
    }

    /// Builder: set the reconnect policy.
    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builder: set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Observable connection status.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectionState {
    pub connected: bool,
    /// Failed attempts since the last successful session.
    pub consecutive_failures: u32,
    /// Sessions that completed the bootstrap.
    pub sessions: u64,
    pub last_connected: Option<DateTime<Utc>>,
    pub last_disconnected: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ConnectionState {
    /// Records a session that connected and bootstrapped.
    pub fn record_connected(&mut self) {
        self.connected = true;
        self.consecutive_failures = 0;
        self.sessions += 1;
        self.last_connected = Some(Utc::now());
        self.last_error = None;
    }

    /// Records the end of a session.
    pub fn record_disconnected(&mut self) {
        if self.connected {
            self.connected = false;
            self.last_disconnected = Some(Utc::now());
        }
    }

    /// Records a failed connect or bootstrap attempt.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.consecutive_failures += 1;
        self.last_error = Some(error.into());
    }
}

/// Shared connection state.
pub type SharedConnectionState = Arc<RwLock<ConnectionState>>;

/// Commands that can be sent to a running connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionCommand {
    /// Drop the current session (if any) and connect again right away.
    Reconnect,
    /// Close the socket and stop.
    Stop,
}

/// Handle for controlling a running [`Connection`].
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    command_tx: mpsc::Sender<ConnectionCommand>,
    state: SharedConnectionState,
}

impl ConnectionHandle {
    /// Forces a reconnect with a fresh bootstrap.
    pub async fn reconnect(&self) -> ClientResult<()> {
        self.send(ConnectionCommand::Reconnect).await
    }

    /// Stops the connection.
    pub async fn stop(&self) -> ClientResult<()> {
        self.send(ConnectionCommand::Stop).await
    }

    /// Returns the current connection state.
    pub async fn state(&self) -> ConnectionState {
        self.state.read().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.connected
    }

    async fn send(&self, command: ConnectionCommand) -> ClientResult<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| ClientError::Connection("connection task has stopped".into()))
    }
}

enum SessionEnd {
    Stopped,
    Closed,
    Reconnect,
}

/// Keeps the mirror in sync with the server across reconnects.
pub struct Connection {
    config: ConnectionConfig,
    bootstrapper: Arc<dyn Bootstrapper>,
    dispatcher: Dispatcher,
    state: SharedConnectionState,
    command_tx: mpsc::Sender<ConnectionCommand>,
    command_rx: mpsc::Receiver<ConnectionCommand>,
}

impl Connection {
    pub fn new(config: ConnectionConfig, bootstrapper: impl Bootstrapper + 'static) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        Self {
            config,
            bootstrapper: Arc::new(bootstrapper),
            dispatcher: Dispatcher::new(),
            state: SharedConnectionState::default(),
            command_tx,
            command_rx,
        }
    }

    /// Returns a handle for controlling the connection.
    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            command_tx: self.command_tx.clone(),
            state: self.state.clone(),
        }
    }

    /// Returns a read-only view of the mirror.
    pub fn reader(&self) -> StateReader {
        self.dispatcher.reader()
    }

    /// Runs sessions until stopped.
    ///
    /// Returns the dispatcher so callers can inspect the frame counters.
    ///
    /// # Errors
    ///
    /// Returns an error once the reconnect policy's failure limit is reached.
    pub async fn run(mut self) -> ClientResult<Dispatcher> {
        info!(url = %self.config.url, "connection manager started");

        loop {
            match self.session().await {
                Ok(SessionEnd::Stopped) => break,
                Ok(SessionEnd::Reconnect) => {
                    debug!("reconnect requested");
                    continue;
                }
                Ok(SessionEnd::Closed) => {}
                Err(e) => {
                    warn!(error = %e, "connection attempt failed");
                    self.state.write().await.record_failure(e.to_string());
                }
            }

            let failures = self.state.read().await.consecutive_failures;
            if self.config.policy.exhausted(failures) {
                error!(failures, "giving up after too many consecutive failures");
                return Err(ClientError::Connection(format!(
                    "giving up after {failures} consecutive failures"
                )));
            }

            let delay = self.config.policy.next_delay(failures);
            debug!(
                failures,
                delay_ms = delay.as_millis() as u64,
                "waiting before reconnect"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                // The connection keeps a sender of its own, so `recv` never yields `None`.
                Some(cmd) = self.command_rx.recv() => match cmd {
                    ConnectionCommand::Reconnect => debug!("reconnect requested during backoff"),
                    ConnectionCommand::Stop => break,
                }
            }
        }

        info!("connection manager stopped");
        Ok(self.dispatcher)
    }

    /// One connect, bootstrap, read cycle. Errors are returned only for
    /// failures before the session was established.
    async fn session(&mut self) -> ClientResult<SessionEnd> {
        let url = self.config.url.as_str();
        debug!(url, "connecting");
        let (mut ws, _) = tokio::time::timeout(self.config.connect_timeout, connect_async(url))
            .await
            .map_err(|_| ClientError::Timeout(format!("connecting to {url}")))??;

        let snapshot = self.bootstrapper.snapshot().await?;
        self.dispatcher.bootstrap(snapshot).await;
        self.state.write().await.record_connected();
        info!(url, "connected");

        let end = loop {
            tokio::select! {
                msg = ws.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        // Failures are counted and logged by the dispatcher.
                        let _ = self.dispatcher.handle_frame(text.as_str()).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        debug!(len = data.len(), "ignoring binary frame");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "server closed the connection");
                        break SessionEnd::Closed;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "connection lost");
                        self.state.write().await.last_error = Some(e.to_string());
                        break SessionEnd::Closed;
                    }
                    None => {
                        info!("connection closed");
                        break SessionEnd::Closed;
                    }
                },
                Some(cmd) = self.command_rx.recv() => match cmd {
                    ConnectionCommand::Reconnect => break SessionEnd::Reconnect,
                    ConnectionCommand::Stop => {
                        if let Err(e) = ws.close(None).await {
                            debug!(error = %e, "error closing websocket");
                        }
                        break SessionEnd::Stopped;
                    }
                }
            }
        };

        self.dispatcher.disconnect().await;
        self.state.write().await.record_disconnected();
        log_session_stats(self.dispatcher.stats());
        Ok(end)
    }
}

fn log_session_stats(stats: FrameStats) {
    debug!(
        accepted = stats.accepted,
        dropped = stats.total_dropped(),
        "session ended"
    );
}
