//! D-Bus control surface
//!
//! The compositor exports `org.nemomobile.compositor.setUpdatesEnabled(b)` on
//! the system bus. Only the current owner of the authorized service name
//! (the display/power daemon) may call it. Calls that arrive before that
//! owner is known are held back and answered in arrival order once it is.
//!
//! [`UpdatesController`] holds the queueing and authorization rules and knows
//! nothing about the bus; [`DbusControlService`] feeds it from a `dbus`
//! connection and sends the replies.

mod controller;

pub use controller::{ResolvedCall, UpdatesController, UpdatesReply};

use std::ffi::CString;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dbus::blocking::Connection;
use dbus::channel::{MatchingReceiver, Sender};
use dbus::message::MatchRule;
use dbus::strings::ErrorName;
use dbus::Message;
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::compositor::LipstickCompositor;
use crate::config::DbusConfig;
use crate::error::CompositorError;
use crate::session::SessionActivator;

pub const COMPOSITOR_INTERFACE: &str = "org.nemomobile.compositor";
pub const SET_UPDATES_ENABLED: &str = "setUpdatesEnabled";
pub const ACCESS_DENIED: &str = "org.freedesktop.DBus.Error.AccessDenied";
const UNKNOWN_METHOD: &str = "org.freedesktop.DBus.Error.UnknownMethod";
const INVALID_ARGS: &str = "org.freedesktop.DBus.Error.InvalidArgs";

const BUS_NAME: &str = "org.freedesktop.DBus";
const BUS_PATH: &str = "/org/freedesktop/DBus";
const CALL_TIMEOUT: Duration = Duration::from_millis(500);

/// Bus side of the control interface.
pub struct DbusControlService {
    system: Connection,
    /// Kept alive so the service name stays registered on the session bus
    _session: Option<Connection>,
    incoming: Arc<Mutex<Vec<Message>>>,
    owner_changes: Arc<Mutex<Vec<Option<String>>>>,
    controller: UpdatesController<Message>,
    authorized_service: String,
}

impl DbusControlService {
    /// Connects to the system bus, claims the service name and starts
    /// listening for calls and for owner changes of the authorized service.
    pub fn start(config: &DbusConfig) -> Result<Self> {
        let system = Connection::new_system()
            .map_err(|e| CompositorError::Dbus(e.to_string()))
            .context("Failed to connect to the system bus")?;
        system
            .request_name(config.service_name.as_str(), false, true, false)
            .map_err(|e| CompositorError::Dbus(e.to_string()))
            .with_context(|| format!("Failed to register {}", config.service_name))?;
        info!("📡 Registered {} on the system bus", config.service_name);

        let incoming = Arc::new(Mutex::new(Vec::new()));
        let queue = incoming.clone();
        let object_path = config.object_path.clone();
        system.start_receive(
            MatchRule::new_method_call(),
            Box::new(move |message: Message, _: &Connection| {
                let ours = message.path().map(|p| p.to_string()) == Some(object_path.clone());
                if ours {
                    queue.lock().push(message);
                }
                true
            }),
        );

        let owner_changes = Arc::new(Mutex::new(Vec::new()));
        let changes = owner_changes.clone();
        let watched = config.authorized_service.clone();
        let rule = MatchRule::new_signal(BUS_NAME, "NameOwnerChanged").with_sender(BUS_NAME);
        system
            .add_match(
                rule,
                move |(name, _old, new): (String, String, String), _: &Connection, _: &Message| {
                    if name == watched {
                        changes
                            .lock()
                            .push(if new.is_empty() { None } else { Some(new) });
                    }
                    true
                },
            )
            .map_err(|e| CompositorError::Dbus(e.to_string()))
            .context("Failed to watch NameOwnerChanged")?;

        let session = match Self::register_on_session_bus(&config.service_name) {
            Ok(connection) => Some(connection),
            Err(e) => {
                warn!("Session bus registration failed: {:#}", e);
                None
            }
        };

        let mut service = Self {
            system,
            _session: session,
            incoming,
            owner_changes,
            controller: UpdatesController::new(),
            authorized_service: config.authorized_service.clone(),
        };
        let owner = service.query_authorized_owner();
        service.controller.authorized_owner_changed(owner);
        Ok(service)
    }

    fn register_on_session_bus(service_name: &str) -> Result<Connection> {
        let session = Connection::new_session()
            .map_err(|e| CompositorError::Dbus(e.to_string()))
            .context("Failed to connect to the session bus")?;
        session
            .request_name(service_name, false, true, false)
            .map_err(|e| CompositorError::Dbus(e.to_string()))?;
        debug!("Registered {} on the session bus", service_name);
        Ok(session)
    }

    /// Asks the bus daemon who currently owns the authorized service name.
    fn query_authorized_owner(&self) -> Option<String> {
        let proxy = self.system.with_proxy(BUS_NAME, BUS_PATH, CALL_TIMEOUT);
        let reply: Result<(String,), dbus::Error> =
            proxy.method_call(BUS_NAME, "GetNameOwner", (self.authorized_service.as_str(),));
        match reply {
            Ok((owner,)) => {
                debug!("{} is owned by {}", self.authorized_service, owner);
                Some(owner)
            }
            Err(e) => {
                debug!("{} has no owner: {}", self.authorized_service, e);
                None
            }
        }
    }

    /// Processes pending bus traffic without blocking, applies authorized
    /// calls to `compositor` and sends the replies. Returns how many calls
    /// were answered.
    pub fn poll(&mut self, compositor: &mut LipstickCompositor) -> usize {
        let system = &self.system;
        drain_bus(|| system.process(Duration::ZERO));

        let changes: Vec<_> = self.owner_changes.lock().drain(..).collect();
        for owner in changes {
            self.controller.authorized_owner_changed(owner);
        }

        let messages: Vec<_> = self.incoming.lock().drain(..).collect();
        for message in messages {
            self.accept_call(message);
        }

        let resolved = self.controller.drain();
        let count = resolved.len();
        for call in resolved {
            let reply = match call.reply {
                UpdatesReply::Granted(enabled) => {
                    compositor.set_updates_enabled(enabled);
                    call.token.method_return()
                }
                UpdatesReply::Denied => {
                    warn!(
                        "Rejected {} from unauthorized caller {}",
                        SET_UPDATES_ENABLED, call.sender
                    );
                    error_reply(&call.token, ACCESS_DENIED, "Caller is not authorized")
                }
            };
            self.send(reply);
        }
        count
    }

    fn accept_call(&mut self, message: Message) {
        let interface = message.interface().map(|i| i.to_string());
        let member = message.member().map(|m| m.to_string());
        if interface.as_deref() != Some(COMPOSITOR_INTERFACE)
            || member.as_deref() != Some(SET_UPDATES_ENABLED)
        {
            let reply = error_reply(&message, UNKNOWN_METHOD, "Unknown method");
            self.send(reply);
            return;
        }

        let Some(sender) = message.sender().map(|s| s.to_string()) else {
            return;
        };
        match message.read1::<bool>() {
            Ok(enabled) => {
                debug!("{}({}) from {}", SET_UPDATES_ENABLED, enabled, sender);
                self.controller.submit(sender, enabled, message);
            }
            Err(e) => {
                let reply = error_reply(&message, INVALID_ARGS, &e.to_string());
                self.send(reply);
            }
        }
    }

    fn send(&self, message: Message) {
        if self.system.send(message).is_err() {
            warn!("Failed to send D-Bus reply");
        }
    }

    pub fn pending_calls(&self) -> usize {
        self.controller.pending()
    }
}

/// Runs `step` until it reports no more queued traffic. `process()` handles
/// at most one message per call. Returns the number of messages handled.
fn drain_bus<F, E>(mut step: F) -> usize
where
    F: FnMut() -> std::result::Result<bool, E>,
    E: std::fmt::Display,
{
    let mut handled = 0;
    loop {
        match step() {
            Ok(true) => handled += 1,
            Ok(false) => return handled,
            Err(e) => {
                warn!("D-Bus processing failed: {}", e);
                return handled;
            }
        }
    }
}

fn error_reply(call: &Message, name: &str, text: &str) -> Message {
    let name = ErrorName::new(name).unwrap_or_else(|_| ErrorName::from(ACCESS_DENIED));
    let text = CString::new(text).unwrap_or_default();
    call.error(&name, &text)
}

/// Activates the compositor's login session through logind.
#[derive(Default)]
pub struct LogindActivator {
    connection: Option<Connection>,
}

impl LogindActivator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionActivator for LogindActivator {
    fn activate(&mut self) -> Result<()> {
        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => Connection::new_system().context("Failed to connect to the system bus")?,
        };
        let result: Result<(), dbus::Error> = connection
            .with_proxy(
                "org.freedesktop.login1",
                "/org/freedesktop/login1/session/auto",
                CALL_TIMEOUT,
            )
            .method_call("org.freedesktop.login1.Session", "Activate", ());
        self.connection = Some(connection);
        result.context("logind refused to activate the session")
    }
}
