//! Transport controller
//!
//! MQTT client lifecycle state machine — INIT/CONNECTING/CONNECTED/
//! RECONNECTING/SHUTDOWN — with auto-reconnect (backoff+jitter), proactive
//! token refresh, and generation-based rejection of stale inbound messages.
//! Grounded in `vibemq::bridge::client::BridgeClient`'s connect/retry split
//! (`connection_loop` / `connect_and_run`), adapted from a bidirectional
//! bridge to a subscribe-only feed client and split further so `connect()`
//! can report the outcome of the first handshake synchronously while
//! reconnects continue in a background task.

mod auth;
mod backoff;
mod client;
mod error;
mod tls;
mod websocket;

pub use auth::{AuthError, AuthProvider, HostToken};
pub use error::TransportError;
pub use websocket::WsStream;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, Notify};
use tracing::{info, warn};

use crate::config::TransportConfig;
use crate::normalizer::Normalizer;

use client::{Command, Connector, Disconnect, WsConnector};

/// Lifecycle state. `connect()` only succeeds from `Init`; `shutdown()` is
/// legal from any state and idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Init,
    Connecting,
    Connected,
    Reconnecting,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportStats {
    pub messages_received: u64,
    pub callback_errors: u64,
    pub reconnect_count: u64,
    pub current_state: ControllerState,
}

struct Shared {
    state: Mutex<ControllerState>,
    /// Test-and-set guard: at most one reconnect procedure runs at a time.
    reconnecting: AtomicBool,
    shutdown_signal: AtomicBool,
    shutdown_notify: Notify,
    client_generation: AtomicU64,
    connection_epoch: AtomicU64,
    reconnect_count: AtomicU64,
    current_token_expiry_ns: AtomicU64,
    subscriptions: Mutex<HashSet<String>>,
    command_tx: Mutex<Option<mpsc::UnboundedSender<Command>>>,
}

/// MQTT-on-WebSocket+TLS transport controller.
pub struct TransportController {
    config: TransportConfig,
    client_id: String,
    auth: Arc<dyn AuthProvider>,
    normalizer: Arc<Normalizer>,
    shared: Arc<Shared>,
}

impl TransportController {
    pub fn new(
        config: TransportConfig,
        client_id: impl Into<String>,
        auth: Arc<dyn AuthProvider>,
        normalizer: Arc<Normalizer>,
    ) -> Self {
        Self {
            config,
            client_id: client_id.into(),
            auth,
            normalizer,
            shared: Arc::new(Shared {
                state: Mutex::new(ControllerState::Init),
                reconnecting: AtomicBool::new(false),
                shutdown_signal: AtomicBool::new(false),
                shutdown_notify: Notify::new(),
                client_generation: AtomicU64::new(0),
                connection_epoch: AtomicU64::new(0),
                reconnect_count: AtomicU64::new(0),
                current_token_expiry_ns: AtomicU64::new(0),
                subscriptions: Mutex::new(HashSet::new()),
                command_tx: Mutex::new(None),
            }),
        }
    }

    /// Authenticate, connect, and spawn the background reconnect and
    /// token-refresh workers. Valid only from `Init`; fails with
    /// `InvalidState` from any other state.
    pub async fn connect(&self) -> Result<(), TransportError> {
        {
            let mut state = self.shared.state.lock();
            if *state != ControllerState::Init {
                return Err(TransportError::InvalidState(
                    "connect() is only valid from Init",
                ));
            }
            *state = ControllerState::Connecting;
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        *self.shared.command_tx.lock() = Some(command_tx);

        let (ready_tx, ready_rx) = oneshot::channel();

        tokio::spawn(connection_loop(
            WsConnector,
            self.shared.clone(),
            self.config.clone(),
            self.auth.clone(),
            self.normalizer.clone(),
            self.client_id.clone(),
            command_rx,
            ready_tx,
        ));

        tokio::spawn(token_refresh_worker(self.shared.clone(), self.config.clone()));

        ready_rx.await.unwrap_or(Err(TransportError::TransientNetwork(
            "controller task ended before connecting".to_string(),
        )))
    }

    /// Normalize to upper case, record in the authoritative subscription
    /// map, and issue an MQTT SUBSCRIBE on the current client. Idempotent:
    /// a duplicate subscribe is silently skipped.
    pub fn subscribe(&self, symbol: &str) -> Result<(), TransportError> {
        let symbol = symbol.to_uppercase();
        let inserted = self.shared.subscriptions.lock().insert(symbol.clone());
        if !inserted {
            return Ok(());
        }
        self.send_command(Command::Subscribe(symbol))
    }

    /// Normalize to upper case, remove from the authoritative subscription
    /// map, and issue an MQTT UNSUBSCRIBE on the current client.
    pub fn unsubscribe(&self, symbol: &str) -> Result<(), TransportError> {
        let symbol = symbol.to_uppercase();
        let removed = self.shared.subscriptions.lock().remove(&symbol);
        if !removed {
            return Ok(());
        }
        self.send_command(Command::Unsubscribe(symbol))
    }

    pub fn subscribed_symbols(&self) -> Vec<String> {
        self.shared.subscriptions.lock().iter().cloned().collect()
    }

    /// Idempotent; legal from every state. Sets the process-wide shutdown
    /// signal, wakes the reconnect worker, and asks the live connection (if
    /// any) to send DISCONNECT and stop its IO loop.
    pub fn shutdown(&self) {
        self.shared.shutdown_signal.store(true, Ordering::Release);
        self.shared.shutdown_notify.notify_waiters();

        let delivered = self
            .shared
            .command_tx
            .lock()
            .as_ref()
            .map(|tx| tx.send(Command::Shutdown).is_ok())
            .unwrap_or(false);

        if !delivered {
            *self.shared.state.lock() = ControllerState::Shutdown;
        }
    }

    pub fn stats(&self) -> TransportStats {
        let normalizer_stats = self.normalizer.stats();
        TransportStats {
            messages_received: normalizer_stats.messages_parsed
                + normalizer_stats.parse_errors
                + normalizer_stats.callback_errors,
            callback_errors: normalizer_stats.callback_errors,
            reconnect_count: self.shared.reconnect_count.load(Ordering::Relaxed),
            current_state: *self.shared.state.lock(),
        }
    }

    pub fn connection_epoch(&self) -> u64 {
        self.shared.connection_epoch.load(Ordering::Acquire)
    }

    fn send_command(&self, command: Command) -> Result<(), TransportError> {
        match self.shared.command_tx.lock().as_ref() {
            Some(tx) => tx
                .send(command)
                .map_err(|_| TransportError::InvalidState("connection task is not running")),
            None => Err(TransportError::InvalidState("connect() has not been called")),
        }
    }
}

/// The retry wrapper: owns the single background task that performs both
/// the initial connect and every subsequent reconnect. Reports the outcome
/// of the first handshake through `ready_tx`, then keeps running silently.
/// Generic over `Connector` so the whole reconnect cycle — handshake,
/// subscription replay, epoch/generation bookkeeping — can be driven
/// against an in-memory stream in tests.
async fn connection_loop<C: Connector>(
    connector: C,
    shared: Arc<Shared>,
    config: TransportConfig,
    auth: Arc<dyn AuthProvider>,
    normalizer: Arc<Normalizer>,
    client_id: String,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
    mut ready_tx: Option<oneshot::Sender<Result<(), TransportError>>>,
) {
    let mut delay = config.reconnect_min_delay();

    loop {
        let is_initial = ready_tx.is_some();
        let generation = shared.client_generation.load(Ordering::Acquire);

        let host_token = match auth.fetch_host_token().await {
            Ok(token) => token,
            Err(e) => {
                if finish_failed_attempt(
                    &shared,
                    is_initial,
                    &mut ready_tx,
                    TransportError::Unauthenticated(e.to_string()),
                ) {
                    return;
                }
                if !wait_for_retry(&shared, &mut delay, &config).await {
                    return;
                }
                continue;
            }
        };
        shared
            .current_token_expiry_ns
            .store(host_token.expiry_wall_clock_ns, Ordering::Release);

        let stream = match connector.connect(&host_token.host).await {
            Ok(stream) => stream,
            Err(e) => {
                if finish_failed_attempt(&shared, is_initial, &mut ready_tx, e) {
                    return;
                }
                if !wait_for_retry(&shared, &mut delay, &config).await {
                    return;
                }
                continue;
            }
        };

        let subscriptions = shared.subscriptions.lock().clone();
        let session = match client::handshake(
            stream,
            &client_id,
            config.keepalive,
            &host_token.token,
            &subscriptions,
        )
        .await
        {
            Ok(session) => session,
            Err(e) => {
                if finish_failed_attempt(&shared, is_initial, &mut ready_tx, e) {
                    return;
                }
                if !wait_for_retry(&shared, &mut delay, &config).await {
                    return;
                }
                continue;
            }
        };

        let epoch = if is_initial {
            0
        } else {
            let epoch = shared.connection_epoch.fetch_add(1, Ordering::AcqRel) + 1;
            shared.reconnect_count.fetch_add(1, Ordering::Relaxed);
            info!(connection_epoch = epoch, "reconnected");
            epoch
        };

        *shared.state.lock() = ControllerState::Connected;
        shared.reconnecting.store(false, Ordering::Release);
        delay = config.reconnect_min_delay();

        if let Some(tx) = ready_tx.take() {
            let _ = tx.send(Ok(()));
        }

        let outcome = client::run_message_loop(
            session,
            config.keepalive,
            &normalizer,
            epoch,
            generation,
            &shared.client_generation,
            &mut command_rx,
        )
        .await;

        let lost = match outcome {
            Ok(Disconnect::Shutdown) => {
                *shared.state.lock() = ControllerState::Shutdown;
                return;
            }
            Ok(Disconnect::Lost(err)) => err,
            Err(err) => err,
        };

        if shared.shutdown_signal.load(Ordering::Acquire) {
            *shared.state.lock() = ControllerState::Shutdown;
            return;
        }

        warn!(error = %lost, "connection lost, entering reconnect loop");
        *shared.state.lock() = ControllerState::Reconnecting;
        shared.reconnecting.store(true, Ordering::Release);
        shared.client_generation.fetch_add(1, Ordering::AcqRel);

        if !wait_for_retry(&shared, &mut delay, &config).await {
            return;
        }
    }
}

/// On the very first connect attempt, resolve `ready_tx` with `err` and
/// reset state to `Init` (per the spec: initial-connect failure raises the
/// error outward and leaves the controller in `Init`, retryable). Returns
/// `true` when the caller should stop the task entirely (only true for the
/// initial attempt — reconnect attempts always keep looping).
fn finish_failed_attempt(
    shared: &Shared,
    is_initial: bool,
    ready_tx: &mut Option<oneshot::Sender<Result<(), TransportError>>>,
    err: TransportError,
) -> bool {
    if !is_initial {
        warn!(error = %err, "reconnect attempt failed, retrying");
        return false;
    }
    *shared.state.lock() = ControllerState::Init;
    if let Some(tx) = ready_tx.take() {
        let _ = tx.send(Err(err));
    }
    true
}

/// Sleep for the current backoff delay, interruptible by shutdown, then
/// grow the delay for the next attempt. Returns `false` if shutdown fired.
async fn wait_for_retry(shared: &Shared, delay: &mut Duration, config: &TransportConfig) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(*delay) => {}
        _ = shared.shutdown_notify.notified() => {
            *shared.state.lock() = ControllerState::Shutdown;
            return false;
        }
    }
    if shared.shutdown_signal.load(Ordering::Acquire) {
        *shared.state.lock() = ControllerState::Shutdown;
        return false;
    }
    *delay = backoff::next_delay(*delay, config);
    true
}

/// Polls the most recently observed token expiry and forces a reconnect
/// once the remaining lifetime drops to `token_refresh_lead_time`. Reuses
/// the `reconnecting` guard flag so a concurrent network disconnect never
/// produces two reconnects for the same event.
async fn token_refresh_worker(shared: Arc<Shared>, config: TransportConfig) {
    loop {
        tokio::select! {
            _ = shared.shutdown_notify.notified() => return,
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
        if shared.shutdown_signal.load(Ordering::Acquire) {
            return;
        }
        if *shared.state.lock() != ControllerState::Connected {
            continue;
        }

        let expiry_ns = shared.current_token_expiry_ns.load(Ordering::Acquire);
        if expiry_ns == 0 {
            continue;
        }
        let remaining_ns = expiry_ns.saturating_sub(wall_clock_nanos());
        if remaining_ns > config.token_refresh_lead_time.as_nanos() as u64 {
            continue;
        }

        if shared
            .reconnecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            info!("token refresh lead time reached, forcing reconnect");
            let _ = shared
                .command_tx
                .lock()
                .as_ref()
                .map(|tx| tx.send(Command::Reconnect));
        }
    }
}

fn wall_clock_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
