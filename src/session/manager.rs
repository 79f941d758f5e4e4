//! The session manager.
//!
//! Owns the single WhatsApp driver instance and its state machine. Callers
//! interact through a cloneable [`SessionManager`] handle; driver events are
//! drained by a per-driver pump task and applied under a short critical
//! section.
//!
//! Locking:
//! - `inner` (std mutex) guards the session fields and is never held across
//!   an `.await`.
//! - `lifecycle` (async mutex) serializes driver retirement, profile wipes and
//!   driver construction, so at most one driver is attached to the profile.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::error::Elapsed;
use tracing::{debug, error, info, warn};

use super::phone::PhoneNumber;
use super::profile::SessionProfile;
use super::qr::{QrEncoder, SvgDataUrlEncoder};
use super::state::SessionState;
use super::status::{SendReceipt, SessionNotification, SessionStatus};
use crate::driver::{bounded, Driver, DriverEvent, DriverFactory, EventSink};
use crate::error::{Result, SendFailure, WaSenderError};

/// Error text of an initialization that a reset made obsolete.
pub const SUPERSEDED: &str = "initialization superseded by a session reset";

const NOTIFICATION_CAPACITY: usize = 32;

type InitResult = std::result::Result<(), String>;
type InitOutcome = Shared<BoxFuture<'static, InitResult>>;

/// Session manager tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Fixed auth profile identifier.
    pub client_id: String,
    /// Root of the on-disk session profile.
    pub profile_dir: PathBuf,
    /// Delay before a recovery attempt after a disconnect.
    pub recovery_delay: Duration,
    /// Pause between a hard reset's wipe and the new initialization.
    pub settle_delay: Duration,
    /// Upper bound for each driver teardown step.
    pub cleanup_timeout: Duration,
    /// How long initialization waits for a QR code or readiness.
    pub pairing_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            client_id: "wa-sender-client".to_string(),
            profile_dir: PathBuf::from("./wa-session"),
            recovery_delay: Duration::from_secs(5),
            settle_delay: Duration::from_millis(1000),
            cleanup_timeout: Duration::from_millis(5000),
            pairing_timeout: Duration::from_secs(60),
        }
    }
}

struct ActiveDriver {
    driver: Arc<dyn Driver>,
    generation: u64,
    pump: JoinHandle<()>,
}

struct InFlight {
    id: u64,
    outcome: InitOutcome,
}

#[derive(Default)]
struct SessionInner {
    state: SessionState,
    driver: Option<ActiveDriver>,
    pending_qr: Option<String>,
    last_error: Option<String>,
    in_flight: Option<InFlight>,
    generation: u64,
    next_init_id: u64,
    recovery: Option<JoinHandle<()>>,
}

struct ManagerCore {
    settings: SessionSettings,
    factory: Arc<dyn DriverFactory>,
    encoder: Arc<dyn QrEncoder>,
    profile: SessionProfile,
    inner: Mutex<SessionInner>,
    lifecycle: tokio::sync::Mutex<()>,
    /// Set by the first initialization; never cleared.
    started: AtomicBool,
    state_tx: watch::Sender<SessionState>,
    notify: broadcast::Sender<SessionNotification>,
}

/// Handle to the WhatsApp session.
#[derive(Clone)]
pub struct SessionManager {
    core: Arc<ManagerCore>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("client_id", &self.core.settings.client_id)
            .field("state", &self.state())
            .finish()
    }
}

impl SessionManager {
    /// Create a manager that renders QR codes as SVG data URLs.
    pub fn new(settings: SessionSettings, factory: Arc<dyn DriverFactory>) -> Self {
        Self::with_qr_encoder(settings, factory, Arc::new(SvgDataUrlEncoder::default()))
    }

    pub fn with_qr_encoder(
        settings: SessionSettings,
        factory: Arc<dyn DriverFactory>,
        encoder: Arc<dyn QrEncoder>,
    ) -> Self {
        let profile = SessionProfile::new(settings.client_id.clone(), settings.profile_dir.clone());
        let (state_tx, _) = watch::channel(SessionState::Uninitialized);
        let (notify, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        Self {
            core: Arc::new(ManagerCore {
                settings,
                factory,
                encoder,
                profile,
                inner: Mutex::new(SessionInner::default()),
                lifecycle: tokio::sync::Mutex::new(()),
                started: AtomicBool::new(false),
                state_tx,
                notify,
            }),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.core.settings
    }

    pub fn profile(&self) -> &SessionProfile {
        &self.core.profile
    }

    /// Kick off the first initialization in the background.
    pub fn start(&self) {
        let outcome = self.core.begin_initialization(false);
        tokio::spawn(async move {
            if let Err(e) = outcome.await {
                warn!(error = %e, "initial WhatsApp initialization failed");
            }
        });
    }

    /// Start the first initialization unless one was ever begun.
    ///
    /// Resets, refreshes and failed attempts do not make the session eligible
    /// again. Returns whether an initialization was started.
    pub fn start_once(&self) -> bool {
        if self.core.started.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.start();
        true
    }

    /// Cancel pending recovery and retire the driver.
    pub async fn shutdown(&self) {
        let _lifecycle = self.core.lifecycle.lock().await;
        {
            let mut inner = self.core.lock();
            inner.generation += 1;
            if let Some(recovery) = inner.recovery.take() {
                recovery.abort();
            }
        }
        self.core.retire_driver().await;

        let mut inner = self.core.lock();
        inner.pending_qr = None;
        self.core.set_state(&mut inner, SessionState::Uninitialized);
        info!("WhatsApp session shut down");
    }

    /// Current status snapshot.
    pub fn status(&self) -> SessionStatus {
        let inner = self.core.lock();
        SessionStatus {
            ready: inner.state.is_ready(),
            initializing: inner.state.is_pairing(),
            last_error: inner.last_error.clone(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.core.lock().state
    }

    /// Latest pairing image, if one is waiting to be scanned.
    pub fn qr_code(&self) -> Option<String> {
        let inner = self.core.lock();
        if inner.state.is_pairing() {
            inner.pending_qr.clone()
        } else {
            None
        }
    }

    /// Receive QR, ready, auth failure and disconnect notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotification> {
        self.core.notify.subscribe()
    }

    /// Watch the raw state.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.core.state_tx.subscribe()
    }

    /// Start a driver, or join the initialization already running.
    ///
    /// Resolves at the first QR code or readiness, or once the pairing timeout
    /// passes with the driver still starting. `destructive` wipes the profile
    /// first; it has no effect when joining a running initialization.
    pub async fn initialize(&self, destructive: bool) -> Result<()> {
        self.core
            .begin_initialization(destructive)
            .await
            .map_err(WaSenderError::Initialization)
    }

    /// Fire-and-forget re-initialization.
    pub fn force_refresh(&self, hard_reset: bool) {
        if hard_reset {
            let manager = self.clone();
            tokio::spawn(async move {
                info!("hard reset requested");
                if let Err(e) = manager.clear_session().await {
                    warn!(error = %e, "clearing session during hard reset failed");
                }
                tokio::time::sleep(manager.core.settings.settle_delay).await;
                manager.core.settle_in_flight().await;
                if let Err(e) = manager.initialize(true).await {
                    warn!(error = %e, "re-initialization after hard reset failed");
                }
            });
        } else {
            let outcome = self.core.begin_initialization(false);
            tokio::spawn(async move {
                if let Err(e) = outcome.await {
                    warn!(error = %e, "refresh failed");
                }
            });
        }
    }

    /// Retire the driver, delete the profile and reset every field.
    ///
    /// The in-memory reset always happens; a filesystem failure is returned
    /// afterwards.
    pub async fn clear_session(&self) -> Result<()> {
        let _lifecycle = self.core.lifecycle.lock().await;
        {
            let mut inner = self.core.lock();
            inner.generation += 1;
            if let Some(recovery) = inner.recovery.take() {
                recovery.abort();
            }
        }

        self.core.retire_driver().await;
        let wiped = self.core.profile.wipe().await;

        {
            let mut inner = self.core.lock();
            inner.pending_qr = None;
            inner.last_error = None;
            self.core.set_state(&mut inner, SessionState::Uninitialized);
        }

        match wiped {
            Ok(()) => {
                info!(path = %self.core.profile.root().display(), "session cleared");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "failed to delete session profile");
                Err(e.into())
            }
        }
    }

    /// Send a text message to a phone number.
    pub async fn send_message(&self, to: &str, text: &str) -> Result<SendReceipt> {
        let driver = {
            let inner = self.core.lock();
            match (&inner.driver, inner.state) {
                (Some(active), SessionState::Ready) => Arc::clone(&active.driver),
                _ => return Err(WaSenderError::NotReady),
            }
        };

        let number = PhoneNumber::normalize(to)?;
        let chat_id = number.chat_id();

        match driver.lookup_contact(&chat_id).await {
            Ok(contact) => debug!(to = %number, known = contact.is_known_contact, "contact lookup"),
            Err(e) => debug!(to = %number, error = %e, "contact lookup failed"),
        }

        match driver.send_to(&chat_id, text).await {
            Ok(sent) => {
                info!(to = %number, message_id = %sent.id, "message sent");
                Ok(SendReceipt {
                    success: true,
                    message_id: sent.id,
                    normalized_to: number.into_string(),
                })
            }
            Err(e) => {
                let message = e.to_string();
                let reason = SendFailure::classify(&message);
                warn!(to = %number, reason = %reason, error = %message, "send failed");
                Err(WaSenderError::send(reason, message))
            }
        }
    }
}

/// Clears the in-flight handle when an initialization task ends, however it ends.
struct InFlightGuard {
    core: Arc<ManagerCore>,
    id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut inner = self.core.lock();
        if inner.in_flight.as_ref().is_some_and(|f| f.id == self.id) {
            inner.in_flight = None;
        }
    }
}

impl ManagerCore {
    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply a transition and publish it. Invalid transitions are dropped.
    fn set_state(&self, inner: &mut SessionInner, target: SessionState) -> bool {
        if inner.state == target {
            return true;
        }

        let from = inner.state;
        match inner.state.transition_to(target) {
            Ok(()) => {
                debug!(from = ?from, to = ?target, "session state");
                self.state_tx.send_replace(target);
                true
            }
            Err(e) => {
                debug!(error = %e, "ignoring transition");
                false
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    fn begin_initialization(self: &Arc<Self>, destructive: bool) -> InitOutcome {
        let mut inner = self.lock();
        if let Some(in_flight) = &inner.in_flight {
            debug!("joining initialization in flight");
            return in_flight.outcome.clone();
        }

        self.started.store(true, Ordering::SeqCst);
        inner.generation += 1;
        inner.next_init_id += 1;
        let generation = inner.generation;
        let id = inner.next_init_id;

        if let Some(recovery) = inner.recovery.take() {
            recovery.abort();
        }
        inner.pending_qr = None;
        inner.last_error = None;
        self.set_state(&mut inner, SessionState::Initializing);

        let guard = InFlightGuard {
            core: Arc::clone(self),
            id,
        };
        let (release, released) = oneshot::channel();
        tokio::spawn(Arc::clone(self).run_initialization(guard, release, generation, destructive));

        let outcome = async move {
            released
                .await
                .unwrap_or_else(|_| Err("initialization task ended unexpectedly".to_string()))
        }
        .boxed()
        .shared();

        inner.in_flight = Some(InFlight {
            id,
            outcome: outcome.clone(),
        });
        outcome
    }

    /// The initialization task.
    ///
    /// Callers are released at the first QR code, readiness, failure or the
    /// pairing timeout. The driver's own initialize keeps running after that
    /// and a late failure is still recorded.
    async fn run_initialization(
        self: Arc<Self>,
        guard: InFlightGuard,
        release: oneshot::Sender<InitResult>,
        generation: u64,
        destructive: bool,
    ) {
        info!(generation, destructive, "initializing WhatsApp session");

        let driver = match self.prepare_driver(generation, destructive).await {
            Ok(driver) => driver,
            Err(e) => {
                warn!(generation, error = %e, "initialization failed");
                self.record_failure(generation, &e);
                drop(guard);
                let _ = release.send(Err(e));
                return;
            }
        };

        let mut states = self.state_tx.subscribe();
        let started = driver.initialize();
        let pairing_timeout = self.settings.pairing_timeout;
        let first_signal =
            tokio::time::timeout(pairing_timeout, wait_past_initializing(&mut states));
        tokio::pin!(started, first_signal);

        let (outcome, still_starting) = tokio::select! {
            result = &mut started => {
                let outcome = match result {
                    Ok(()) => self.settled((&mut first_signal).await),
                    Err(e) => Err(format!("failed to initialize WhatsApp client: {e}")),
                };
                (outcome, false)
            }
            signal = &mut first_signal => (self.settled(signal), true),
        };

        if let Err(e) = &outcome {
            warn!(generation, error = %e, "initialization failed");
            self.record_failure(generation, e);
            self.retire_if_current(generation).await;
        } else {
            debug!(generation, "initialization settled");
        }

        drop(guard);
        let _ = release.send(outcome.clone());

        if !still_starting || outcome.is_err() {
            return;
        }

        match started.await {
            Ok(()) => debug!(generation, "WhatsApp client started"),
            Err(e) => {
                let message = format!("failed to initialize WhatsApp client: {e}");
                if self.record_failure(generation, &message) {
                    warn!(generation, error = %message, "WhatsApp client failed while pairing");
                    self.retire_if_current(generation).await;
                } else {
                    debug!(generation, error = %message, "late start failure of a retired client");
                }
            }
        }
    }

    /// Retire the previous driver, prepare the profile and attach a new driver.
    async fn prepare_driver(
        self: &Arc<Self>,
        generation: u64,
        destructive: bool,
    ) -> std::result::Result<Arc<dyn Driver>, String> {
        let _lifecycle = self.lifecycle.lock().await;
        self.retire_driver().await;

        if destructive {
            if let Err(e) = self.profile.wipe().await {
                warn!(error = %e, "failed to wipe session profile");
            }
        }
        if let Err(e) = self.profile.ensure().await {
            warn!(error = %e, "failed to create session profile directory");
        }

        if !self.is_current(generation) {
            return Err(SUPERSEDED.to_string());
        }

        let (sink, events) = EventSink::channel();
        let driver = self
            .factory
            .create(&self.profile.driver_options(), sink)
            .await
            .map_err(|e| format!("failed to create WhatsApp client: {e}"))?;

        if !self.attach(generation, Arc::clone(&driver), events) {
            Self::dispose(&driver, self.settings.cleanup_timeout).await;
            return Err(SUPERSEDED.to_string());
        }
        Ok(driver)
    }

    fn attach(
        self: &Arc<Self>,
        generation: u64,
        driver: Arc<dyn Driver>,
        events: mpsc::UnboundedReceiver<DriverEvent>,
    ) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }

        let pump = tokio::spawn(pump_events(Arc::downgrade(self), generation, events));
        inner.driver = Some(ActiveDriver {
            driver,
            generation,
            pump,
        });
        true
    }

    /// Map the first state after `Initializing` (or the timeout) to a result.
    fn settled(
        &self,
        signal: std::result::Result<std::result::Result<SessionState, String>, Elapsed>,
    ) -> InitResult {
        let state = match signal {
            Ok(state) => state?,
            Err(_) => {
                warn!(
                    timeout_secs = self.settings.pairing_timeout.as_secs(),
                    "no QR code or ready signal yet; still initializing"
                );
                return Ok(());
            }
        };

        match state {
            SessionState::AwaitingScan | SessionState::Ready | SessionState::Initializing => Ok(()),
            SessionState::Uninitialized => Err(SUPERSEDED.to_string()),
            SessionState::AuthFailed | SessionState::Disconnected => Err(self
                .lock()
                .last_error
                .clone()
                .unwrap_or_else(|| format!("session ended in {state:?}"))),
        }
    }

    /// Record a failed attempt. Returns `false` when the attempt is stale or
    /// the session already left pairing.
    fn record_failure(&self, generation: u64, message: &str) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation || !inner.state.is_pairing() {
            return false;
        }
        inner.last_error = Some(message.to_string());
        inner.pending_qr = None;
        self.set_state(&mut inner, SessionState::Uninitialized)
    }

    async fn retire_if_current(&self, generation: u64) {
        let _lifecycle = self.lifecycle.lock().await;
        if self.is_current(generation) {
            self.retire_driver().await;
        }
    }

    /// Detach and tear down the current driver. Caller holds `lifecycle`.
    async fn retire_driver(&self) {
        let active = self.lock().driver.take();
        if let Some(active) = active {
            active.pump.abort();
            debug!(generation = active.generation, "retiring WhatsApp client");
            Self::dispose(&active.driver, self.settings.cleanup_timeout).await;
        }
    }

    async fn dispose(driver: &Arc<dyn Driver>, limit: Duration) {
        if let Err(e) = bounded("close", limit, driver.close()).await {
            warn!(error = %e, "closing WhatsApp client failed");
        }
        if let Err(e) = bounded("destroy", limit, driver.destroy()).await {
            warn!(error = %e, "destroying WhatsApp client failed");
        }
    }

    /// Wait for any initialization in flight to finish, ignoring its result.
    async fn settle_in_flight(&self) {
        let outcome = self.lock().in_flight.as_ref().map(|f| f.outcome.clone());
        if let Some(outcome) = outcome {
            let _ = outcome.await;
        }
    }

    fn handle_event(self: &Arc<Self>, generation: u64, event: DriverEvent) {
        let image = match &event {
            DriverEvent::Qr(payload) => Some(self.encoder.encode(payload)),
            _ => None,
        };

        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(generation, current = inner.generation, "dropping event from retired client");
            return;
        }

        match event {
            DriverEvent::Qr(_) => {
                if !inner.state.is_pairing() {
                    debug!(state = ?inner.state, "ignoring QR code outside pairing");
                    return;
                }
                match image {
                    Some(Ok(image)) => {
                        info!("QR code received, waiting for scan");
                        inner.pending_qr = Some(image.clone());
                        self.set_state(&mut inner, SessionState::AwaitingScan);
                        let _ = self.notify.send(SessionNotification::Qr(image));
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "failed to render QR code");
                        inner.last_error = Some("Error converting QR code".to_string());
                    }
                    None => {}
                }
            }
            DriverEvent::Ready => {
                if self.set_state(&mut inner, SessionState::Ready) {
                    info!("WhatsApp client is ready");
                    inner.pending_qr = None;
                    inner.last_error = None;
                    let _ = self.notify.send(SessionNotification::Ready);
                }
            }
            DriverEvent::AuthFailure(reason) => {
                error!(reason = %reason, "WhatsApp authentication failed");
                inner.pending_qr = None;
                inner.last_error = Some(format!("Authentication failed: {reason}"));
                self.set_state(&mut inner, SessionState::AuthFailed);
                let _ = self.notify.send(SessionNotification::AuthFailure(reason));
            }
            DriverEvent::Disconnected(reason) => {
                let was_ready = inner.state.is_ready();
                if !self.set_state(&mut inner, SessionState::Disconnected) {
                    return;
                }
                warn!(reason = %reason, "WhatsApp client disconnected");
                inner.pending_qr = None;
                inner.last_error = Some(format!("Disconnected: {reason}"));
                let _ = self.notify.send(SessionNotification::Disconnected(reason));

                if was_ready {
                    self.schedule_recovery(&mut inner);
                }
            }
        }
    }

    fn schedule_recovery(self: &Arc<Self>, inner: &mut SessionInner) {
        if let Some(previous) = inner.recovery.take() {
            previous.abort();
        }

        let generation = inner.generation;
        let delay = self.settings.recovery_delay;
        let core = Arc::downgrade(self);
        info!(delay_ms = delay.as_millis() as u64, "scheduling reconnect");

        inner.recovery = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(core) = core.upgrade() {
                core.recover(generation).await;
            }
        }));
    }

    async fn recover(self: Arc<Self>, generation: u64) {
        let skip = {
            let mut inner = self.lock();
            inner.recovery = None;
            if inner.generation != generation {
                Some("session was reset")
            } else if inner.in_flight.is_some() {
                Some("initialization already in flight")
            } else if inner.state.is_ready() {
                Some("session already ready")
            } else {
                None
            }
        };

        if let Some(reason) = skip {
            debug!(reason, "skipping reconnect");
            return;
        }

        info!("attempting to reconnect");
        if let Err(e) = self.begin_initialization(false).await {
            warn!(error = %e, "reconnect failed");
        }
    }
}

async fn wait_past_initializing(
    states: &mut watch::Receiver<SessionState>,
) -> std::result::Result<SessionState, String> {
    states
        .wait_for(|state| *state != SessionState::Initializing)
        .await
        .map(|state| *state)
        .map_err(|_| "session manager dropped".to_string())
}

async fn pump_events(
    core: Weak<ManagerCore>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<DriverEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(core) = core.upgrade() else {
            break;
        };
        core.handle_event(generation, event);
    }
}
