//! Wayland frontend
//!
//! Binds the protocol independent [`LipstickCompositor`] to a real
//! `wayland-server` display. Requests are translated into compositor calls in
//! the `Dispatch` implementations; after every dispatch pass the compositor's
//! outbox is written back to the matching client resources.
//!
//! The event loop is `calloop` driven:
//! - a dispatch timer accepts clients, dispatches their requests, runs
//!   deferred tasks, polls D-Bus and flushes the outbox
//! - a frame timer stands in for the renderer and reports rendered frames
//! - a zero-delay timer activates the login session, re-arming itself while
//!   activation keeps failing
//! - an optional ping timer pings the topmost alien window

mod alien;
mod dispatch;
mod extensions;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use calloop::timer::{TimeoutAction, Timer};
use calloop::EventLoop;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use wayland_protocols::wp::fractional_scale::v1::server::{
    wp_fractional_scale_manager_v1::WpFractionalScaleManagerV1,
    wp_fractional_scale_v1::WpFractionalScaleV1,
};
use wayland_protocols::wp::viewporter::server::wp_viewporter::WpViewporter;
use wayland_server::backend::{ClientData, ClientId, DisconnectReason};
use wayland_server::protocol::{wl_buffer::WlBuffer, wl_callback::WlCallback};
use wayland_server::protocol::{wl_compositor::WlCompositor, wl_shm::WlShm};
use wayland_server::{Client, Display, DisplayHandle, ListeningSocket};

use crate::compositor::LipstickCompositor;
use crate::config::LipstickConfig;
use crate::dbus::{DbusControlService, LogindActivator};
use crate::protocol::generated::alien_client::AlienClient;
use crate::protocol::generated::alien_manager::AlienManager;
use crate::protocol::generated::alien_surface::AlienSurface;
use crate::protocol::{AlienClientId, AlienManagerId, AlienSurfaceId, ProtocolEvent};
use crate::session::{RetryOutcome, SessionActivation};
use crate::surface::{CallbackId, ClientKey, ExtensionObjectId, SurfaceId};
use crate::window::Size;

/// Per-client data handed to `wayland-server`.
struct ClientState {
    disconnected: Arc<Mutex<Vec<ClientId>>>,
}

impl ClientData for ClientState {
    fn initialized(&self, client_id: ClientId) {
        debug!("Client {:?} initialized", client_id);
    }

    fn disconnected(&self, client_id: ClientId, reason: DisconnectReason) {
        debug!("Client {:?} disconnected: {:?}", client_id, reason);
        self.disconnected.lock().push(client_id);
    }
}

/// Surface state between `attach`/`damage` and `commit`.
#[derive(Debug, Default)]
struct PendingCommit {
    buffer: Option<Option<WlBuffer>>,
    damage: Vec<(i32, i32, i32, i32)>,
}

/// Wire resources of the objects the core addresses by id.
#[derive(Default)]
struct Resources {
    callbacks: HashMap<CallbackId, WlCallback>,
    /// Last committed buffer per surface, released after the next frame
    buffers: HashMap<SurfaceId, WlBuffer>,
    fractional_scales: HashMap<ExtensionObjectId, WpFractionalScaleV1>,
    alien_managers: HashMap<AlienManagerId, AlienManager>,
    alien_clients: HashMap<AlienClientId, AlienClient>,
    alien_surfaces: HashMap<AlienSurfaceId, AlienSurface>,
}

/// State shared by every request handler.
pub struct ServerState {
    pub compositor: LipstickCompositor,
    display_handle: DisplayHandle,
    clients: HashMap<ClientId, ClientKey>,
    disconnected: Arc<Mutex<Vec<ClientId>>>,
    pending: HashMap<SurfaceId, PendingCommit>,
    resources: Resources,
    dbus: Option<DbusControlService>,
    session: Option<SessionActivation<LogindActivator>>,
}

impl ServerState {
    /// Compositor key of `client`, registering it on first sight.
    fn client_key(&mut self, client: &Client) -> ClientKey {
        let id = client.id();
        if let Some(key) = self.clients.get(&id) {
            return *key;
        }
        let process_id = client
            .get_credentials(&self.display_handle)
            .map(|credentials| credentials.pid)
            .unwrap_or(0);
        let key = self.compositor.client_connected(process_id);
        self.clients.insert(id, key);
        key
    }

    fn reap_disconnected(&mut self) {
        let gone: Vec<_> = self.disconnected.lock().drain(..).collect();
        for id in gone {
            if let Some(key) = self.clients.remove(&id) {
                self.compositor.client_disconnected(key);
                info!("🔌 Client disconnected ({} left)", self.clients.len());
            }
        }
    }

    /// Writes queued protocol events to their resources.
    fn flush_outbox(&mut self) {
        for event in self.compositor.take_outbox() {
            match event {
                ProtocolEvent::AlienPing { manager, serial } => {
                    if let Some(resource) = self.resources.alien_managers.get(&manager) {
                        resource.ping(serial);
                    }
                }
                ProtocolEvent::AlienOomScore { client, score } => {
                    if let Some(resource) = self.resources.alien_clients.get(&client) {
                        resource.oom_score(score);
                    }
                }
                ProtocolEvent::AlienConfigure {
                    surface,
                    width,
                    height,
                    states,
                    serial,
                } => {
                    if let Some(resource) = self.resources.alien_surfaces.get(&surface) {
                        resource.configure(width, height, states.to_wire(), serial);
                    }
                }
                ProtocolEvent::AlienClose { surface } => {
                    if let Some(resource) = self.resources.alien_surfaces.get(&surface) {
                        resource.close();
                    }
                }
                ProtocolEvent::PreferredScale { object, scale } => {
                    if let Some(resource) = self.resources.fractional_scales.get(&object) {
                        resource.preferred_scale(scale);
                    }
                }
                ProtocolEvent::FrameDone { callback, time } => {
                    if let Some(resource) = self.resources.callbacks.remove(&callback) {
                        resource.done(time);
                    }
                }
                ProtocolEvent::BufferRelease { surface } => {
                    if let Some(buffer) = self.resources.buffers.get(&surface) {
                        buffer.release();
                    }
                }
            }
        }
    }
}

/// Owns the display, the listening socket and the event loop.
pub struct CompositorServer {
    event_loop: EventLoop<'static, ServerState>,
    state: ServerState,
    socket_name: String,
    running: Arc<AtomicBool>,
}

impl CompositorServer {
    pub fn new(config: &LipstickConfig) -> Result<Self> {
        info!("🚀 Creating Wayland frontend...");

        let event_loop: EventLoop<'static, ServerState> =
            EventLoop::try_new().context("Failed to create event loop")?;
        let mut display: Display<ServerState> =
            Display::new().context("Failed to create Wayland display")?;
        let display_handle = display.handle();
        Self::create_globals(&display_handle, config);

        let listening_socket = match &config.compositor.socket_name {
            Some(name) => ListeningSocket::bind(name.as_str())
                .with_context(|| format!("Failed to bind Wayland socket {}", name))?,
            None => ListeningSocket::bind_auto("wayland", 1..33)
                .context("Failed to bind Wayland socket")?,
        };
        let socket_name = listening_socket
            .socket_name()
            .ok_or_else(|| anyhow!("Failed to get socket name"))?
            .to_string_lossy()
            .to_string();
        info!("✅ Wayland socket created: {}", socket_name);

        let dbus = if config.dbus.enabled {
            match DbusControlService::start(&config.dbus) {
                Ok(service) => Some(service),
                Err(e) => {
                    warn!("D-Bus control interface unavailable: {:#}", e);
                    None
                }
            }
        } else {
            info!("D-Bus disabled by configuration");
            None
        };
        let session = config.dbus.enabled.then(|| {
            SessionActivation::new(
                LogindActivator::new(),
                config.session.activation_max_attempts,
                Duration::from_millis(config.session.activation_retry_interval_ms),
            )
        });

        let disconnected = Arc::new(Mutex::new(Vec::new()));
        let state = ServerState {
            compositor: LipstickCompositor::new(config),
            display_handle: display_handle.clone(),
            clients: HashMap::new(),
            disconnected: disconnected.clone(),
            pending: HashMap::new(),
            resources: Resources::default(),
            dbus,
            session,
        };

        let handle = event_loop.handle();

        let dispatch_interval = Duration::from_millis(config.compositor.dispatch_interval_ms);
        handle
            .insert_source(
                Timer::from_duration(dispatch_interval),
                move |_, _, state: &mut ServerState| {
                    while let Ok(Some(stream)) = listening_socket.accept() {
                        let client_data = Arc::new(ClientState {
                            disconnected: disconnected.clone(),
                        });
                        match display.handle().insert_client(stream, client_data) {
                            Ok(client) => {
                                state.client_key(&client);
                                info!("🔌 New client connected ({} total)", state.clients.len());
                            }
                            Err(e) => error!("Failed to insert client: {}", e),
                        }
                    }

                    if let Err(e) = display.dispatch_clients(state) {
                        error!("Failed to dispatch clients: {}", e);
                    }
                    state.reap_disconnected();
                    state.compositor.dispatch_deferred();
                    if let Some(dbus) = state.dbus.as_mut() {
                        dbus.poll(&mut state.compositor);
                    }
                    state.flush_outbox();
                    if let Err(e) = display.flush_clients() {
                        warn!("Failed to flush clients: {}", e);
                    }
                    TimeoutAction::ToDuration(dispatch_interval)
                },
            )
            .map_err(|e| anyhow!("Failed to insert dispatch timer: {}", e.error))?;

        let frame_interval = Duration::from_millis(config.compositor.frame_interval_ms);
        handle
            .insert_source(
                Timer::from_duration(frame_interval),
                move |_, _, state: &mut ServerState| {
                    let time = state.compositor.current_time_ms();
                    state.compositor.frame_rendered(time);
                    TimeoutAction::ToDuration(frame_interval)
                },
            )
            .map_err(|e| anyhow!("Failed to insert frame timer: {}", e.error))?;

        handle
            .insert_source(Timer::immediate(), |_, _, state: &mut ServerState| {
                let Some(session) = state.session.as_mut() else {
                    return TimeoutAction::Drop;
                };
                let outcome = if session.attempts() == 0 {
                    session.start()
                } else {
                    session.retry()
                };
                match outcome {
                    RetryOutcome::RetryAfter(delay) => TimeoutAction::ToDuration(delay),
                    RetryOutcome::Activated | RetryOutcome::GaveUp => TimeoutAction::Drop,
                }
            })
            .map_err(|e| anyhow!("Failed to insert session timer: {}", e.error))?;

        if config.alien.enabled && config.alien.ping_interval_ms > 0 {
            let ping_interval = Duration::from_millis(config.alien.ping_interval_ms);
            handle
                .insert_source(
                    Timer::from_duration(ping_interval),
                    move |_, _, state: &mut ServerState| {
                        state.compositor.schedule_topmost_ping();
                        TimeoutAction::ToDuration(ping_interval)
                    },
                )
                .map_err(|e| anyhow!("Failed to insert ping timer: {}", e.error))?;
        }

        Ok(Self {
            event_loop,
            state,
            socket_name,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    fn create_globals(display: &DisplayHandle, config: &LipstickConfig) {
        info!("📋 Creating protocol globals...");

        display.create_global::<ServerState, WlCompositor, ()>(4, ());
        info!("  ✅ wl_compositor v4");

        display.create_global::<ServerState, WlShm, ()>(1, ());
        info!("  ✅ wl_shm v1");

        display.create_global::<ServerState, WpViewporter, ()>(1, ());
        info!("  ✅ wp_viewporter v1");

        display.create_global::<ServerState, WpFractionalScaleManagerV1, ()>(1, ());
        info!("  ✅ wp_fractional_scale_manager_v1 v1");

        if config.alien.enabled {
            display.create_global::<ServerState, AlienManager, ()>(1, ());
            info!("  ✅ alien_manager v1");
        }
    }

    pub fn socket_name(&self) -> &str {
        &self.socket_name
    }

    pub fn compositor(&mut self) -> &mut LipstickCompositor {
        &mut self.state.compositor
    }

    /// Flag that stops [`run`](Self::run) when cleared.
    pub fn running(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn run(mut self) -> Result<()> {
        let running = self.running.clone();
        if let Err(e) = ctrlc::set_handler(move || running.store(false, Ordering::SeqCst)) {
            warn!("Could not install signal handler: {}", e);
        }

        std::env::set_var("WAYLAND_DISPLAY", &self.socket_name);
        info!("🎬 Compositor running on WAYLAND_DISPLAY={}", self.socket_name);

        while self.running.load(Ordering::SeqCst) {
            self.event_loop
                .dispatch(Some(Duration::from_millis(100)), &mut self.state)
                .context("Event loop dispatch failed")?;
        }

        info!(
            "👋 Shutting down ({} windows, {} ghosts)",
            self.state.compositor.window_count(),
            self.state.compositor.ghost_window_count()
        );
        Ok(())
    }
}

/// Buffer dimensions recorded at `wl_shm_pool.create_buffer`.
#[derive(Debug, Clone, Copy)]
pub struct BufferData {
    pub size: Size,
}
