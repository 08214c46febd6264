//! The connect chain, the byte bridges and the session controller.
//!
//! [`SessionController`] owns at most one [`Session`]. Connecting is a single
//! linear `async fn`; once it succeeds two tasks run beside the session:
//!
//! - the inbound pump, which decodes every notification and prints it to the
//!   [`OutputSink`] in delivery order;
//! - the disconnect watcher, which waits for the platform's link-loss signal.
//!
//! Both observe the session's [`CancellationToken`]. Cancelling the token is
//! how a session dies, whether the user asked for it or the link dropped, and
//! every write checks it first.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use nusterm_types::{PRIMER, chunk, decode_fragment, encode_text};

use crate::error::{Error, Result};
use crate::events::{DeviceId, DisconnectReason, EventDispatcher, EventReceiver, SessionEvent};
use crate::output::OutputSink;
use crate::traits::{
    DisconnectSignal, Endpoint, NotificationStream, RemoteDevice, RequestOptions, Service,
    Transport,
};

/// Where the controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "Disconnected"),
            SessionState::Connecting => write!(f, "Connecting"),
            SessionState::Connected => write!(f, "Connected"),
        }
    }
}

/// Session settings.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// What to ask the transport for.
    pub request: RequestOptions,
    /// Split outbound payloads into writes of at most this many bytes.
    /// `None` sends every line as a single write.
    pub write_chunk_size: Option<usize>,
}

impl SessionConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the device request options.
    #[must_use]
    pub fn request(mut self, request: RequestOptions) -> Self {
        self.request = request;
        self
    }

    /// Set the outbound chunk size.
    #[must_use]
    pub fn write_chunk_size(mut self, size: Option<usize>) -> Self {
        self.write_chunk_size = size;
        self
    }

    /// Validate the config and return an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.write_chunk_size == Some(0) {
            return Err(Error::invalid_config("write_chunk_size must be > 0"));
        }
        Ok(())
    }
}

/// An established link to one peripheral.
pub struct Session {
    id: u64,
    device: Arc<dyn RemoteDevice>,
    device_id: DeviceId,
    service: Service,
    rx: Endpoint,
    alive: CancellationToken,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("device", &self.device_id)
            .field("service", &self.service)
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// The connected device.
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// False once the session has been torn down or the link dropped.
    pub fn is_alive(&self) -> bool {
        !self.alive.is_cancelled()
    }
}

/// Parts gathered by the connect chain before they become a [`Session`].
struct Link {
    service: Service,
    rx: Endpoint,
    signal: DisconnectSignal,
    notifications: NotificationStream,
}

#[derive(Debug, Default)]
struct Slot {
    state: SessionState,
    session: Option<Arc<Session>>,
}

struct Shared {
    slot: RwLock<Slot>,
    output: Arc<dyn OutputSink>,
    events: EventDispatcher,
    next_id: AtomicU64,
}

impl Shared {
    fn announce(&self, device: &DeviceId, what: &str) {
        self.output
            .print(&format!("\r\n{} {}.\r\n", device.display_name(), what));
    }
}

/// Drives one session at a time and binds it to an output surface.
///
/// Cheap to clone; clones share the same session.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use nusterm_core::{BleTransport, BufferSink, MatchPicker, SessionConfig, SessionController};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let transport = BleTransport::new(Arc::new(MatchPicker::new("Zephyr")));
///     let output = BufferSink::new();
///     let controller =
///         SessionController::new(Arc::new(transport), Arc::new(output), SessionConfig::new());
///     controller.connect().await?;
///     controller.send_text("help\n").await?;
///     controller.disconnect().await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct SessionController {
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    shared: Arc<Shared>,
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionController {
    pub fn new(
        transport: Arc<dyn Transport>,
        output: Arc<dyn OutputSink>,
        config: SessionConfig,
    ) -> Self {
        Self {
            transport,
            config,
            shared: Arc::new(Shared {
                slot: RwLock::new(Slot::default()),
                output,
                events: EventDispatcher::default(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> EventReceiver {
        self.shared.events.subscribe()
    }

    pub async fn state(&self) -> SessionState {
        self.shared.slot.read().await.state
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await == SessionState::Connected
    }

    /// The current session, including a stale one left by a dropped link.
    pub async fn session(&self) -> Option<Arc<Session>> {
        self.shared.slot.read().await.session.clone()
    }

    /// Label for the connect button.
    pub async fn button_label(&self) -> &'static str {
        if self.is_connected().await {
            "Disconnect"
        } else {
            "Connect"
        }
    }

    /// Disconnect when connected, otherwise connect.
    pub async fn toggle(&self) -> Result<()> {
        if self.is_connected().await {
            self.disconnect().await
        } else {
            self.connect().await
        }
    }

    /// Run the connect chain.
    ///
    /// Failures are logged, printed to the output surface and published as
    /// [`SessionEvent::Error`] before being returned. Nothing is retried.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn connect(&self) -> Result<()> {
        {
            let mut slot = self.shared.slot.write().await;
            if slot.state != SessionState::Disconnected {
                debug!("Connect rejected while {}", slot.state);
                return Err(Error::Busy);
            }
            slot.state = SessionState::Connecting;
        }
        self.shared.events.send(SessionEvent::Connecting);

        let result = match self.config.validate() {
            Ok(()) => self.establish().await,
            Err(e) => Err(e),
        };

        match result {
            Ok((device, link)) => {
                self.activate(device, link).await;
                Ok(())
            }
            Err(e) => {
                warn!("Connect failed: {}", e);
                self.shared.output.println(&e.to_string());
                self.shared.slot.write().await.state = SessionState::Disconnected;
                self.shared.events.send(SessionEvent::Error {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn establish(&self) -> Result<(Arc<dyn RemoteDevice>, Link)> {
        info!("Requesting device...");
        let device = self.transport.request_device(&self.config.request).await?;

        match self.open_link(device.as_ref()).await {
            Ok(link) => Ok((device, link)),
            Err(e) => {
                if device.is_open().await
                    && let Err(close_err) = device.close().await
                {
                    debug!("Closing after failed connect: {}", close_err);
                }
                Err(e)
            }
        }
    }

    async fn open_link(&self, device: &dyn RemoteDevice) -> Result<Link> {
        let ids = self.config.request.ids;

        info!("Connecting to {}...", device.display_name());
        device.open().await?;
        let signal = device.disconnect_signal().await?;

        debug!("Getting service...");
        let service = device.resolve_service(ids.service).await?;

        debug!("Getting characteristics...");
        let rx = device.resolve_endpoint(&service, ids.rx).await?;
        let tx = device.resolve_endpoint(&service, ids.tx).await?;

        debug!("Starting notifications...");
        let notifications = device.start_notifications(&tx).await?;

        Ok(Link {
            service,
            rx,
            signal,
            notifications,
        })
    }

    async fn activate(&self, device: Arc<dyn RemoteDevice>, link: Link) {
        let device_id = match device.name() {
            Some(name) => DeviceId::with_name(device.identifier(), name),
            None => DeviceId::new(device.identifier()),
        };
        let session = Arc::new(Session {
            id: self.shared.next_id.fetch_add(1, Ordering::Relaxed),
            device,
            device_id: device_id.clone(),
            service: link.service,
            rx: link.rx,
            alive: CancellationToken::new(),
        });

        {
            let mut slot = self.shared.slot.write().await;
            slot.session = Some(Arc::clone(&session));
            slot.state = SessionState::Connected;
        }

        tokio::spawn(pump_notifications(
            Arc::clone(&self.shared.output),
            link.notifications,
            session.alive.clone(),
        ));
        tokio::spawn(watch_link(
            Arc::clone(&self.shared),
            Arc::clone(&session),
            link.signal,
        ));

        info!("{} connected", device_id.display_name());
        self.shared.announce(&device_id, "Connected");
        self.shared.events.send(SessionEvent::Connected {
            device: device_id,
        });

        if let Err(e) = self.send_text(PRIMER).await {
            warn!("Primer write failed: {}", e);
        }
    }

    /// Tear the session down at the user's request.
    ///
    /// Calling this with no session is a no-op.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn disconnect(&self) -> Result<()> {
        let (session, was_alive) = {
            let mut slot = self.shared.slot.write().await;
            let Some(session) = slot.session.take() else {
                debug!("Disconnect requested but no device connected");
                return Ok(());
            };
            // A connect is in flight; the session here is stale and the
            // Connecting state must hold until that chain finishes.
            if slot.state == SessionState::Connecting {
                session.alive.cancel();
                debug!("Cleared stale session while connecting");
                return Ok(());
            }
            slot.state = SessionState::Disconnected;
            let was_alive = session.is_alive();
            session.alive.cancel();
            (session, was_alive)
        };

        if !was_alive && !session.device.is_open().await {
            info!("{} already disconnected", session.device_id.display_name());
            return Ok(());
        }

        let result = session.device.close().await;
        if let Err(e) = &result {
            warn!("Close failed: {}", e);
        }

        self.shared.announce(&session.device_id, "Disconnected");
        self.shared.events.send(SessionEvent::Disconnected {
            device: session.device_id.clone(),
            reason: DisconnectReason::UserRequested,
        });
        result
    }

    /// Send text to the peripheral.
    ///
    /// When no session is connected the advisory is printed and nothing is
    /// written.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        let session = {
            let slot = self.shared.slot.read().await;
            match &slot.session {
                Some(session) if slot.state == SessionState::Connected && session.is_alive() => {
                    Arc::clone(session)
                }
                _ => {
                    self.shared.output.println(&Error::NotConnected.to_string());
                    return Err(Error::NotConnected);
                }
            }
        };

        let payload = encode_text(text);
        let parts = match self.config.write_chunk_size {
            Some(size) => chunk(&payload, size)?,
            None => vec![payload],
        };

        for part in parts {
            if !session.is_alive() {
                return Err(Error::NotConnected);
            }
            if let Err(e) = session.device.write(&session.rx, &part).await {
                if !session.is_alive() {
                    debug!("Write failed after link loss: {}", e);
                    return Err(Error::NotConnected);
                }
                warn!("Write failed: {}", e);
                self.shared.output.println(&e.to_string());
                return Err(e);
            }
        }
        Ok(())
    }
}

async fn pump_notifications(
    output: Arc<dyn OutputSink>,
    mut notifications: NotificationStream,
    alive: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = alive.cancelled() => break,
            fragment = notifications.next() => match fragment {
                Some(bytes) => output.print(&decode_fragment(&bytes)),
                None => break,
            },
        }
    }
    debug!("Notification pump stopped");
}

async fn watch_link(shared: Arc<Shared>, session: Arc<Session>, signal: DisconnectSignal) {
    tokio::select! {
        biased;
        _ = session.alive.cancelled() => return,
        _ = signal => {}
    }

    {
        let mut slot = shared.slot.write().await;
        if !session.is_alive() {
            return;
        }
        session.alive.cancel();
        if slot.session.as_ref().is_some_and(|s| s.id == session.id) {
            slot.state = SessionState::Disconnected;
        }
    }

    warn!("{} link lost", session.device_id.display_name());
    shared.announce(&session.device_id, "Disconnected");
    shared.events.send(SessionEvent::Disconnected {
        device: session.device_id.clone(),
        reason: DisconnectReason::LinkLost,
    });
}
