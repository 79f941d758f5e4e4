//! Process-backed driver.
//!
//! The browser automation runs in a bridge program (for example a small
//! Node.js script around whatsapp-web.js). The service spawns it with the
//! profile location on its command line and exchanges line-delimited JSON
//! over stdio; see [`super::protocol`] for the message shapes.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::protocol::{Message, Request};
use super::{
    bounded, ContactInfo, Driver, DriverError, DriverEvent, DriverFactory, DriverOptions,
    DriverResult, EventSink, SentMessage,
};

/// Reason reported when the bridge goes away on its own.
pub const BRIDGE_EXITED: &str = "BRIDGE_EXITED";

type Reply = oneshot::Sender<DriverResult<Value>>;
type Pending = Arc<Mutex<HashMap<u32, Reply>>>;

/// How to launch and talk to the bridge program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    /// Program to execute.
    pub program: String,
    /// Arguments placed before the profile arguments.
    pub args: Vec<String>,
    /// Upper bound for ordinary requests.
    pub request_timeout: Duration,
    /// Upper bound for the `initialize` request.
    pub init_timeout: Duration,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            program: "node".to_string(),
            args: vec!["bridge/index.js".to_string()],
            request_timeout: Duration::from_secs(30),
            init_timeout: Duration::from_secs(120),
        }
    }
}

/// Request/response correlation over a pair of byte streams.
pub struct BridgeConnection<W> {
    last_id: AtomicU32,
    pending: Pending,
    writer: tokio::sync::Mutex<W>,
    closing: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl<W> BridgeConnection<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap the bridge's stdin/stdout. Events are forwarded to `events`.
    pub fn new<R>(writer: W, reader: R, events: EventSink) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let pending: Pending = Arc::default();
        let closing = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_loop(
            BufReader::new(reader),
            Arc::clone(&pending),
            events,
            Arc::clone(&closing),
        ));

        Self {
            last_id: AtomicU32::new(1),
            pending,
            writer: tokio::sync::Mutex::new(writer),
            closing,
            reader,
        }
    }

    /// Send a request and wait for its response.
    pub async fn call(&self, method: &str, params: Value, limit: Duration) -> DriverResult<Value> {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending_map().insert(id, tx);

        let request = Request {
            id,
            method: method.to_string(),
            params,
        };

        if let Err(e) = self.write(&request).await {
            self.pending_map().remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(limit, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(DriverError::Closed),
            Err(_) => {
                self.pending_map().remove(&id);
                Err(DriverError::Timeout(method.to_string()))
            }
        }
    }

    /// Suppress the disconnect event the reader would emit on EOF.
    pub fn mark_closing(&self) {
        self.closing.store(true, Ordering::SeqCst);
    }

    async fn write(&self, request: &Request) -> DriverResult<()> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        trace!(id = request.id, method = %request.method, "bridge request");

        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    fn pending_map(&self) -> std::sync::MutexGuard<'_, HashMap<u32, Reply>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W> Drop for BridgeConnection<W> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop<R>(
    reader: BufReader<R>,
    pending: Pending,
    events: EventSink,
    closing: Arc<AtomicBool>,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => dispatch(&line, &pending, &events),
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "bridge read failed");
                break;
            }
        }
    }

    let orphaned: Vec<_> = pending
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .drain()
        .collect();
    for (_, tx) in orphaned {
        let _ = tx.send(Err(DriverError::Closed));
    }

    if closing.load(Ordering::SeqCst) {
        debug!("bridge output closed");
    } else {
        warn!("bridge output closed unexpectedly");
        events.emit(DriverEvent::Disconnected(BRIDGE_EXITED.to_string()));
    }
}

fn dispatch(line: &str, pending: &Pending, events: &EventSink) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let message = match serde_json::from_str::<Message>(line) {
        Ok(message) => message,
        Err(_) => {
            debug!(output = line, "bridge");
            return;
        }
    };

    match message {
        Message::Response(response) => {
            let callback = pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&response.id);
            let Some(callback) = callback else {
                warn!(id = response.id, "bridge response for unknown request");
                return;
            };

            let result = match response.error {
                Some(error) => Err(DriverError::Failed(error.message)),
                None => Ok(response.result.unwrap_or(Value::Null)),
            };
            let _ = callback.send(result);
        }
        Message::Event(event) => {
            let name = event.event.clone();
            match event.into_driver_event() {
                Some(event) => {
                    debug!(event = %name, "bridge event");
                    events.emit(event);
                }
                None => debug!(event = %name, "ignoring bridge event"),
            }
        }
    }
}

/// A driver backed by a running bridge process.
pub struct BridgeDriver {
    connection: BridgeConnection<ChildStdin>,
    child: tokio::sync::Mutex<Child>,
    settings: BridgeSettings,
}

impl BridgeDriver {
    /// Wrap an already spawned bridge whose stdin/stdout are piped.
    pub fn from_child(
        mut child: Child,
        settings: BridgeSettings,
        events: EventSink,
    ) -> DriverResult<Self> {
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DriverError::Protocol("bridge stdin is not piped".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DriverError::Protocol("bridge stdout is not piped".into()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "wa_sender::bridge", "{}", line);
                }
            });
        }

        Ok(Self {
            connection: BridgeConnection::new(stdin, stdout, events),
            child: tokio::sync::Mutex::new(child),
            settings,
        })
    }

    async fn call(&self, method: &str, params: Value) -> DriverResult<Value> {
        self.connection
            .call(method, params, self.settings.request_timeout)
            .await
    }
}

#[async_trait]
impl Driver for BridgeDriver {
    async fn initialize(&self) -> DriverResult<()> {
        self.connection
            .call("initialize", json!({}), self.settings.init_timeout)
            .await
            .map(|_| ())
    }

    async fn close(&self) -> DriverResult<()> {
        self.call("close", json!({})).await.map(|_| ())
    }

    async fn destroy(&self) -> DriverResult<()> {
        self.connection.mark_closing();
        let result = self.call("destroy", json!({})).await.map(|_| ());

        let mut child = self.child.lock().await;
        let reaped = bounded("reap bridge", self.settings.request_timeout, async {
            child.kill().await.map_err(DriverError::from)
        })
        .await;
        if let Err(e) = reaped {
            debug!(error = %e, "bridge process already gone");
        }

        result
    }

    async fn send_to(&self, chat_id: &str, text: &str) -> DriverResult<SentMessage> {
        let result = self
            .call("sendMessage", json!({ "chatId": chat_id, "text": text }))
            .await?;

        let id = result
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::Protocol("sendMessage result has no id".into()))?;

        Ok(SentMessage { id: id.to_string() })
    }

    async fn lookup_contact(&self, chat_id: &str) -> DriverResult<ContactInfo> {
        let result = self.call("getContact", json!({ "chatId": chat_id })).await?;
        let is_known_contact = result
            .get("isKnownContact")
            .or_else(|| result.get("isMyContact"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(ContactInfo { is_known_contact })
    }
}

/// Spawns one bridge process per driver instance.
#[derive(Debug, Clone, Default)]
pub struct BridgeDriverFactory {
    settings: BridgeSettings,
}

impl BridgeDriverFactory {
    pub fn new(settings: BridgeSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }
}

#[async_trait]
impl DriverFactory for BridgeDriverFactory {
    async fn create(
        &self,
        options: &DriverOptions,
        events: EventSink,
    ) -> DriverResult<Arc<dyn Driver>> {
        info!(
            program = %self.settings.program,
            client_id = %options.client_id,
            data_path = %options.data_path.display(),
            "starting WhatsApp bridge"
        );

        let child = Command::new(&self.settings.program)
            .args(&self.settings.args)
            .arg("--client-id")
            .arg(&options.client_id)
            .arg("--data-path")
            .arg(&options.data_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let driver = BridgeDriver::from_child(child, self.settings.clone(), events)?;
        Ok(Arc::new(driver))
    }
}
