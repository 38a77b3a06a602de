//! Core compositor implementation
//!
//! [`LipstickCompositor`] owns every piece of window/surface state and
//! orchestrates:
//! - surface lifecycle: created -> view created -> mapped <-> unmapped -> destroyed
//! - topmost window and keyboard focus tracking
//! - display update gating and frame callback throttling
//! - the protocol extensions attached to surfaces (alien, viewport,
//!   fractional scale)
//! - window-model observers and compositor event listeners
//!
//! It is protocol independent: wire events are queued in an outbox of
//! [`ProtocolEvent`]s and written to client resources by the Wayland frontend.
//!
//! Only one instance may exist per process. Constructing a second one while
//! the first is alive aborts the process.

mod display;
mod extensions;
mod lifecycle;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, error, info};

use crate::config::LipstickConfig;
use crate::error::{CompositorError, CompositorResult};
use crate::input::{InputAction, InputDisposition, InputRouter, PointerButton};
use crate::orientation::{Orientation, OrientationState, SensorReading};
use crate::protocol::{AlienLifecycle, ProtocolEvent};
use crate::serial::SerialGenerator;
use crate::surface::{ClientKey, Surface, SurfaceId, SurfaceStore};
use crate::tasks::TaskQueue;
use crate::window::{Size, Window, WindowId, WindowRegistry};

pub use display::DisplayState;

static INSTANCE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Process-wide claim on the single compositor instance. Released on drop.
#[derive(Debug)]
pub struct InstanceGuard {
    _private: (),
}

impl InstanceGuard {
    pub fn acquire() -> CompositorResult<Self> {
        INSTANCE_ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| CompositorError::AlreadyRunning)?;
        Ok(Self { _private: () })
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        INSTANCE_ACTIVE.store(false, Ordering::SeqCst);
    }
}

/// Sentinel reported when the topmost window has no policy application id.
pub const NO_POLICY_APPLICATION_ID: &str = "none";

/// Notifications delivered synchronously to registered listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum CompositorEvent {
    TopmostWindowIdChanged(WindowId),
    TopmostWindowProcessIdChanged(i32),
    TopmostWindowPolicyApplicationIdChanged(String),
    KeyboardFocusChanged(Option<WindowId>),
    WindowMapped(WindowId),
    WindowUnmapped(WindowId),
    WindowDestroyed(WindowId),
    WindowRaised(WindowId),
    WindowLowered(WindowId),
    WindowCountChanged(usize),
    GhostWindowCountChanged(usize),
    /// An alien client un-hid its surface; the window manager raises it.
    RaiseRequested(WindowId),
    MinimizeRequested(WindowId),
    /// An alien client answered a ping for this window.
    WindowPong(WindowId),
    UpdatesEnabledChanged(bool),
    DisplayVisibilityChanged(bool),
    DisplayOffHint,
    DisplayOnHint,
    RepaintRequested,
    SyntheticKey { key: u32, pressed: bool },
    SensorOrientationChanged(Orientation),
    ScreenOrientationChanged(Orientation),
}

/// Observer of the set of mapped windows (window switchers, task lists).
pub trait WindowModel {
    /// Filters which windows this model is interested in.
    fn approve_window(&self, _window: &Window) -> bool {
        true
    }

    fn window_added(&mut self, window: &Window);

    fn window_removed(&mut self, window: WindowId);

    fn window_title_changed(&mut self, _window: &Window) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowModelId(u64);

type Listener = Box<dyn FnMut(&CompositorEvent)>;

struct ModelEntry {
    id: WindowModelId,
    model: Box<dyn WindowModel>,
    /// Windows the model approved and was told about
    shown: HashSet<WindowId>,
}

pub struct LipstickCompositor {
    _guard: InstanceGuard,

    serials: SerialGenerator,
    surfaces: SurfaceStore,
    windows: WindowRegistry,
    alien: AlienLifecycle,

    /// Connected clients and their process ids
    clients: HashMap<ClientKey, i32>,
    next_client: u64,
    next_object_id: u64,

    outbox: Vec<ProtocolEvent>,
    listeners: Vec<(ListenerId, Listener)>,
    models: Vec<ModelEntry>,
    next_handle: u64,
    tasks: TaskQueue<LipstickCompositor>,

    input: InputRouter,
    orientation: OrientationState,

    topmost_window_id: WindowId,
    topmost_window_process_id: i32,
    topmost_window_policy_application_id: String,
    keyboard_focus: Option<WindowId>,

    /// Window whose focus was cleared when updates got disabled
    unfocused_on_updates_disabled: Option<WindowId>,
    updates_enabled: bool,
    display_state: DisplayState,
    display_visible: bool,
    lock_screen_visible: bool,
    repaint_pending: bool,

    output_size: Size,
    output_scale: f64,

    last_window_count: usize,
    last_ghost_window_count: usize,
    started: Instant,
}

impl LipstickCompositor {
    /// Creates the process-wide compositor. Aborts if one already exists.
    pub fn new(config: &LipstickConfig) -> Self {
        match Self::try_new(config) {
            Ok(compositor) => compositor,
            Err(e) => {
                error!("{}", e);
                std::process::abort();
            }
        }
    }

    /// Like [`new`](Self::new) but reports a second instance as an error.
    pub fn try_new(config: &LipstickConfig) -> CompositorResult<Self> {
        let guard = InstanceGuard::acquire()?;

        info!(
            "Compositor core initialised ({}x{} @ {}x scale)",
            config.display.output_width, config.display.output_height, config.display.scale
        );

        Ok(Self {
            _guard: guard,
            serials: SerialGenerator::new(),
            surfaces: SurfaceStore::new(),
            windows: WindowRegistry::new(),
            alien: AlienLifecycle::new(),
            clients: HashMap::new(),
            next_client: 1,
            next_object_id: 1,
            outbox: Vec::new(),
            listeners: Vec::new(),
            models: Vec::new(),
            next_handle: 1,
            tasks: TaskQueue::new(),
            input: InputRouter::new(config.compositor.synthesize_back_event),
            orientation: OrientationState::new(
                config.display.primary_orientation,
                config.display.orientation_lock,
            ),
            topmost_window_id: WindowId::NONE,
            topmost_window_process_id: 0,
            topmost_window_policy_application_id: NO_POLICY_APPLICATION_ID.to_string(),
            keyboard_focus: None,
            unfocused_on_updates_disabled: None,
            updates_enabled: config.compositor.updates_enabled,
            display_state: DisplayState::On,
            display_visible: config.compositor.updates_enabled,
            lock_screen_visible: false,
            repaint_pending: false,
            output_size: Size::new(config.display.output_width, config.display.output_height),
            output_scale: config.display.scale,
            last_window_count: 0,
            last_ghost_window_count: 0,
            started: Instant::now(),
        })
    }

    // === Observers ===

    pub fn add_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&CompositorEvent) + 'static,
    {
        let id = ListenerId(self.next_handle);
        self.next_handle += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _)| *listener != id);
        self.listeners.len() != before
    }

    pub(crate) fn emit(&mut self, event: CompositorEvent) {
        debug!("Compositor event: {:?}", event);
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
    }

    /// Registers a window model and populates it with the mapped windows it
    /// approves, in window id order.
    pub fn add_window_model(&mut self, mut model: Box<dyn WindowModel>) -> WindowModelId {
        let id = WindowModelId(self.next_handle);
        self.next_handle += 1;

        let mut shown = HashSet::new();
        for window_id in self.windows.window_ids() {
            if let Some(window) = self.windows.window_for_id(window_id) {
                if model.approve_window(window) {
                    model.window_added(window);
                    shown.insert(window_id);
                }
            }
        }

        self.models.push(ModelEntry { id, model, shown });
        id
    }

    pub fn remove_window_model(&mut self, id: WindowModelId) -> Option<Box<dyn WindowModel>> {
        let index = self.models.iter().position(|entry| entry.id == id)?;
        Some(self.models.remove(index).model)
    }

    fn notify_models_added(&mut self, id: WindowId) {
        let Some(window) = self.windows.window_for_id(id) else {
            return;
        };
        for entry in &mut self.models {
            if entry.model.approve_window(window) {
                entry.model.window_added(window);
                entry.shown.insert(id);
            }
        }
    }

    fn notify_models_removed(&mut self, id: WindowId) {
        for entry in &mut self.models {
            if entry.shown.remove(&id) {
                entry.model.window_removed(id);
            }
        }
    }

    fn notify_models_title_changed(&mut self, id: WindowId) {
        let Some(window) = self.windows.window_for_id(id) else {
            return;
        };
        for entry in &mut self.models {
            if entry.shown.contains(&id) {
                entry.model.window_title_changed(window);
            }
        }
    }

    /// Emits count notifications for the counts that changed.
    fn notify_counts(&mut self) {
        let window_count = self.windows.window_count();
        let ghost_count = self.windows.ghost_window_count();
        if window_count != self.last_window_count {
            self.last_window_count = window_count;
            self.emit(CompositorEvent::WindowCountChanged(window_count));
        }
        if ghost_count != self.last_ghost_window_count {
            self.last_ghost_window_count = ghost_count;
            self.emit(CompositorEvent::GhostWindowCountChanged(ghost_count));
        }
    }

    // === Deferred tasks ===

    pub fn defer<F>(&mut self, task: F)
    where
        F: FnOnce(&mut LipstickCompositor) + 'static,
    {
        self.tasks.defer(task);
    }

    /// Runs the tasks queued before this call, in order. Returns how many ran.
    pub fn dispatch_deferred(&mut self) -> usize {
        let batch = self.tasks.take_batch();
        let count = batch.len();
        for task in batch {
            task(self);
        }
        count
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    // === Outbox ===

    pub fn outbox(&self) -> &[ProtocolEvent] {
        &self.outbox
    }

    pub fn take_outbox(&mut self) -> Vec<ProtocolEvent> {
        std::mem::take(&mut self.outbox)
    }

    // === Topmost window and focus ===

    pub fn set_topmost_window_id(&mut self, id: WindowId) {
        if id == self.topmost_window_id {
            return;
        }
        self.topmost_window_id = id;
        self.emit(CompositorEvent::TopmostWindowIdChanged(id));
        self.refresh_topmost_details();
    }

    /// Re-reads process id and policy application id of the topmost window
    /// and notifies the fields that changed.
    fn refresh_topmost_details(&mut self) {
        let window = self.windows.window_for_id(self.topmost_window_id);
        let process_id = window.map(|w| w.process_id).unwrap_or(0);
        let policy_application_id = window
            .and_then(|w| w.policy_application_id.clone())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| NO_POLICY_APPLICATION_ID.to_string());

        if process_id != self.topmost_window_process_id {
            self.topmost_window_process_id = process_id;
            self.emit(CompositorEvent::TopmostWindowProcessIdChanged(process_id));
        }
        if policy_application_id != self.topmost_window_policy_application_id {
            self.topmost_window_policy_application_id = policy_application_id.clone();
            self.emit(CompositorEvent::TopmostWindowPolicyApplicationIdChanged(
                policy_application_id,
            ));
        }
    }

    fn update_topmost_from_stack(&mut self) {
        let top = self.windows.top_window().unwrap_or(WindowId::NONE);
        self.set_topmost_window_id(top);
    }

    pub fn topmost_window_id(&self) -> WindowId {
        self.topmost_window_id
    }

    pub fn topmost_window_process_id(&self) -> i32 {
        self.topmost_window_process_id
    }

    pub fn topmost_window_policy_application_id(&self) -> &str {
        &self.topmost_window_policy_application_id
    }

    /// Gives keyboard focus to a mapped window, or clears it with `None`.
    pub fn set_keyboard_focus(&mut self, window: Option<WindowId>) {
        if let Some(id) = window {
            if !self.windows.is_mapped(id) {
                debug!("Ignoring focus request for unmapped window {}", id);
                return;
            }
        }
        if window == self.keyboard_focus {
            return;
        }

        if let Some(previous) = self.keyboard_focus {
            if let Some(previous) = self.windows.window_for_id_mut(previous) {
                previous.focus = false;
            }
        }
        if let Some(id) = window {
            if let Some(next) = self.windows.window_for_id_mut(id) {
                next.focus = true;
            }
        }
        self.keyboard_focus = window;
        self.emit(CompositorEvent::KeyboardFocusChanged(window));
    }

    pub fn keyboard_focus(&self) -> Option<WindowId> {
        self.keyboard_focus
    }

    // === Input ===

    pub fn handle_pointer_button(&mut self, button: u32, pressed: bool) -> InputDisposition {
        match self
            .input
            .route_pointer_button(PointerButton { button, pressed })
        {
            InputAction::SyntheticKey { key, pressed } => {
                self.emit(CompositorEvent::SyntheticKey { key, pressed });
                InputDisposition::Consumed
            }
            InputAction::Forward => InputDisposition::Forward,
        }
    }

    pub fn set_synthesize_back_event(&mut self, enabled: bool) {
        self.input.set_synthesize_back_event(enabled);
    }

    pub fn synthesize_back_event(&self) -> bool {
        self.input.synthesize_back_event()
    }

    // === Orientation ===

    pub fn sensor_orientation_changed(&mut self, reading: SensorReading) {
        if let Some(orientation) = self.orientation.apply_reading(reading) {
            self.emit(CompositorEvent::SensorOrientationChanged(orientation));
        }
    }

    pub fn set_screen_orientation(&mut self, orientation: Orientation) {
        if self.orientation.set_screen(orientation) {
            self.emit(CompositorEvent::ScreenOrientationChanged(orientation));
        }
    }

    pub fn sensor_orientation(&self) -> Orientation {
        self.orientation.sensor()
    }

    pub fn screen_orientation(&self) -> Orientation {
        self.orientation.screen()
    }

    // === Accessors ===

    pub fn serials(&self) -> &SerialGenerator {
        &self.serials
    }

    pub fn windows(&self) -> &WindowRegistry {
        &self.windows
    }

    pub fn window_for_id(&self, id: WindowId) -> Option<&Window> {
        self.windows.window_for_id(id)
    }

    pub fn surface(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(id)
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn alien(&self) -> &AlienLifecycle {
        &self.alien
    }

    pub fn window_count(&self) -> usize {
        self.windows.window_count()
    }

    pub fn ghost_window_count(&self) -> usize {
        self.windows.ghost_window_count()
    }

    pub fn total_window_count(&self) -> usize {
        self.windows.total_window_count()
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        self.windows.window_ids()
    }

    pub fn ghost_window_ids(&self) -> Vec<WindowId> {
        self.windows.ghost_window_ids()
    }

    pub fn output_size(&self) -> Size {
        self.output_size
    }

    fn allocate_object_id(&mut self) -> u64 {
        let id = self.next_object_id;
        self.next_object_id += 1;
        id
    }
}

impl std::fmt::Debug for LipstickCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LipstickCompositor")
            .field("windows", &self.windows.window_count())
            .field("ghosts", &self.windows.ghost_window_count())
            .field("surfaces", &self.surfaces.len())
            .field("topmost_window_id", &self.topmost_window_id)
            .field("updates_enabled", &self.updates_enabled)
            .finish()
    }
}
