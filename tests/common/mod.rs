//! Shared test fixtures: a scripted in-memory driver and helpers.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use wa_sender::driver::{
    ContactInfo, Driver, DriverError, DriverEvent, DriverFactory, DriverOptions, DriverResult,
    EventSink, SentMessage,
};
use wa_sender::session::{QrEncoder, SessionManager, SessionSettings};

/// What the next drivers do.
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Events emitted from inside `initialize`.
    pub on_initialize: Vec<DriverEvent>,
    /// Make `initialize` fail with this message.
    pub init_error: Option<String>,
    /// Sleep at the start of `initialize`.
    pub init_delay: Duration,
    /// Make `send_to` fail with this message.
    pub send_error: Option<String>,
}

#[derive(Default)]
struct Shared {
    script: Mutex<Script>,
    sinks: Mutex<Vec<EventSink>>,
    options: Mutex<Vec<DriverOptions>>,
    chat_ids: Mutex<Vec<String>>,
    created: AtomicUsize,
    destroyed: AtomicUsize,
    sends: AtomicUsize,
    lookups: AtomicUsize,
}

/// Factory producing [`MockDriver`]s and recording what they were asked to do.
#[derive(Clone, Default)]
pub struct MockFactory {
    shared: Arc<Shared>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.shared.script.lock().unwrap());
    }

    pub fn created(&self) -> usize {
        self.shared.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.shared.destroyed.load(Ordering::SeqCst)
    }

    pub fn sends(&self) -> usize {
        self.shared.sends.load(Ordering::SeqCst)
    }

    pub fn lookups(&self) -> usize {
        self.shared.lookups.load(Ordering::SeqCst)
    }

    pub fn chat_ids(&self) -> Vec<String> {
        self.shared.chat_ids.lock().unwrap().clone()
    }

    pub fn options(&self) -> Vec<DriverOptions> {
        self.shared.options.lock().unwrap().clone()
    }

    /// Emit an event from the most recently created driver.
    pub fn emit(&self, event: DriverEvent) -> bool {
        let sinks = self.shared.sinks.lock().unwrap();
        sinks.last().map(|sink| sink.emit(event)).unwrap_or(false)
    }

    /// Emit an event from the n-th created driver (0-based).
    pub fn emit_from(&self, index: usize, event: DriverEvent) -> bool {
        let sinks = self.shared.sinks.lock().unwrap();
        sinks.get(index).map(|sink| sink.emit(event)).unwrap_or(false)
    }
}

#[async_trait]
impl DriverFactory for MockFactory {
    async fn create(
        &self,
        options: &DriverOptions,
        events: EventSink,
    ) -> DriverResult<Arc<dyn Driver>> {
        self.shared.created.fetch_add(1, Ordering::SeqCst);
        self.shared.options.lock().unwrap().push(options.clone());
        self.shared.sinks.lock().unwrap().push(events.clone());

        Ok(Arc::new(MockDriver {
            shared: Arc::clone(&self.shared),
            events,
        }))
    }
}

pub struct MockDriver {
    shared: Arc<Shared>,
    events: EventSink,
}

#[async_trait]
impl Driver for MockDriver {
    async fn initialize(&self) -> DriverResult<()> {
        let script = self.shared.script.lock().unwrap().clone();
        if !script.init_delay.is_zero() {
            tokio::time::sleep(script.init_delay).await;
        }
        for event in script.on_initialize {
            self.events.emit(event);
        }
        match script.init_error {
            Some(message) => Err(DriverError::Failed(message)),
            None => Ok(()),
        }
    }

    async fn destroy(&self) -> DriverResult<()> {
        self.shared.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_to(&self, chat_id: &str, _text: &str) -> DriverResult<SentMessage> {
        self.shared.sends.fetch_add(1, Ordering::SeqCst);
        self.shared.chat_ids.lock().unwrap().push(chat_id.to_string());

        let error = self.shared.script.lock().unwrap().send_error.clone();
        match error {
            Some(message) => Err(DriverError::Failed(message)),
            None => Ok(SentMessage {
                id: format!("MSG{}", self.shared.sends.load(Ordering::SeqCst)),
            }),
        }
    }

    async fn lookup_contact(&self, _chat_id: &str) -> DriverResult<ContactInfo> {
        self.shared.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(ContactInfo {
            is_known_contact: true,
        })
    }
}

/// Renders payloads as `qr:<payload>` so assertions can compare them.
pub struct PlainEncoder;

impl QrEncoder for PlainEncoder {
    fn encode(&self, payload: &str) -> wa_sender::Result<String> {
        Ok(format!("qr:{payload}"))
    }
}

/// Settings with delays short enough for tests.
pub fn settings(profile_dir: &Path) -> SessionSettings {
    SessionSettings {
        client_id: "test-client".to_string(),
        profile_dir: profile_dir.to_path_buf(),
        recovery_delay: Duration::from_millis(100),
        settle_delay: Duration::from_millis(20),
        cleanup_timeout: Duration::from_millis(200),
        pairing_timeout: Duration::from_millis(500),
    }
}

pub fn manager(factory: &MockFactory, settings: SessionSettings) -> SessionManager {
    SessionManager::with_qr_encoder(settings, Arc::new(factory.clone()), Arc::new(PlainEncoder))
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
