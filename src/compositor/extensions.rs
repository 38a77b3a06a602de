//! Protocol extension requests routed through the compositor
//!
//! Requests that reference a destroyed surface or a destroyed extension
//! object are ignored. Only the errors the wire protocols define
//! (`bad_value`, `*_exists`) are reported back.

use log::{debug, info};

use super::{CompositorEvent, LipstickCompositor};
use crate::error::{CompositorError, CompositorResult};
use crate::protocol::{
    AlienClientId, AlienManagerId, AlienState, AlienSurfaceId, FractionalScale, ProtocolEvent,
    StateRequestOutcome, Viewport,
};
use crate::serial::Serial;
use crate::surface::{
    ClientKey, ExtensionKind, ExtensionObjectId, SurfaceExtension, SurfaceId, SurfaceOperation,
};
use crate::window::{Size, WindowId};

impl LipstickCompositor {
    // === wp_viewport ===

    /// Attaches a viewport to `surface`. A destroyed surface yields an
    /// object whose requests are all ignored.
    pub fn create_viewport(&mut self, surface: SurfaceId) -> CompositorResult<ExtensionObjectId> {
        let object = ExtensionObjectId(self.allocate_object_id());
        let Some(s) = self.surfaces.get_mut(surface) else {
            debug!("get_viewport for destroyed {}", surface);
            return Ok(object);
        };
        s.attach_extension(Box::new(Viewport::new(object)))
            .map_err(|_| CompositorError::ViewportExists(surface))?;
        Ok(object)
    }

    /// Detaches the viewport `object` from `surface` before dropping it.
    pub fn destroy_viewport(&mut self, surface: SurfaceId, object: ExtensionObjectId) {
        self.detach_extension_object(surface, ExtensionKind::Viewport, object);
    }

    pub fn viewport_set_source(
        &mut self,
        surface: SurfaceId,
        object: ExtensionObjectId,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> CompositorResult<()> {
        match self.viewport_mut(surface, object) {
            Some(viewport) => viewport.set_source(x, y, width, height),
            None => Ok(()),
        }
    }

    pub fn viewport_set_destination(
        &mut self,
        surface: SurfaceId,
        object: ExtensionObjectId,
        width: i32,
        height: i32,
    ) -> CompositorResult<()> {
        match self.viewport_mut(surface, object) {
            Some(viewport) => viewport.set_destination(width, height),
            None => Ok(()),
        }
    }

    fn viewport_mut(
        &mut self,
        surface: SurfaceId,
        object: ExtensionObjectId,
    ) -> Option<&mut Viewport> {
        self.surfaces
            .get_mut(surface)?
            .extension_mut::<Viewport>()
            .filter(|viewport| viewport.object() == object)
    }

    // === wp_fractional_scale_v1 ===

    /// Attaches a fractional scale object and sends the current preferred
    /// scale right away.
    pub fn create_fractional_scale(
        &mut self,
        surface: SurfaceId,
    ) -> CompositorResult<ExtensionObjectId> {
        let object = ExtensionObjectId(self.allocate_object_id());
        let scale = self.output_scale;
        let Some(s) = self.surfaces.get_mut(surface) else {
            debug!("get_fractional_scale for destroyed {}", surface);
            return Ok(object);
        };
        s.attach_extension(Box::new(FractionalScale::new(object)))
            .map_err(|_| CompositorError::FractionalScaleExists(surface))?;

        let mut operation = SurfaceOperation::PreferredScale { scale, sent: None };
        s.run_operation(&mut operation);
        self.queue_preferred_scale(operation);
        Ok(object)
    }

    pub fn destroy_fractional_scale(&mut self, surface: SurfaceId, object: ExtensionObjectId) {
        self.detach_extension_object(surface, ExtensionKind::FractionalScale, object);
    }

    /// Changes the logical output scale and tells every surface that has a
    /// fractional scale object.
    pub fn set_output_scale(&mut self, scale: f64) {
        if scale <= 0.0 || scale == self.output_scale {
            return;
        }
        info!("Output scale {} -> {}", self.output_scale, scale);
        self.output_scale = scale;

        let mut sent = Vec::new();
        for surface in self.surfaces.iter_mut() {
            let mut operation = SurfaceOperation::PreferredScale { scale, sent: None };
            if surface.run_operation(&mut operation) {
                sent.push(operation);
            }
        }
        for operation in sent {
            self.queue_preferred_scale(operation);
        }
    }

    pub fn output_scale(&self) -> f64 {
        self.output_scale
    }

    fn queue_preferred_scale(&mut self, operation: SurfaceOperation) {
        if let SurfaceOperation::PreferredScale {
            sent: Some((object, scale)),
            ..
        } = operation
        {
            self.outbox
                .push(ProtocolEvent::PreferredScale { object, scale });
        }
    }

    fn detach_extension_object(
        &mut self,
        surface: SurfaceId,
        kind: ExtensionKind,
        object: ExtensionObjectId,
    ) {
        let Some(s) = self.surfaces.get_mut(surface) else {
            return;
        };
        let attached = s
            .extension_object(kind)
            .map(|attached| attached == object)
            .unwrap_or(false);
        if attached {
            // detached from the chain first, dropped afterwards
            let extension = s.detach_extension(kind);
            drop(extension);
        }
    }

    // === Alien lifecycle: client requests ===

    pub fn alien_manager_bound(&mut self, client: ClientKey) -> AlienManagerId {
        self.alien.bind_manager(client)
    }

    pub fn alien_manager_destroyed(&mut self, manager: AlienManagerId) {
        self.alien.destroy_manager(manager);
    }

    pub fn alien_client_created(
        &mut self,
        manager: AlienManagerId,
        package: &str,
    ) -> Option<AlienClientId> {
        let client = self.alien.manager(manager)?.client;
        let process_id = self.clients.get(&client).copied().unwrap_or(0);
        self.alien.create_client(manager, package, process_id)
    }

    pub fn alien_client_destroyed(&mut self, client: AlienClientId) {
        self.alien.destroy_client(client);
    }

    /// Creates alien state for `surface` and sends the initial configure.
    pub fn alien_surface_created(
        &mut self,
        client: AlienClientId,
        surface: SurfaceId,
    ) -> Option<AlienSurfaceId> {
        let s = self.surfaces.get_mut(surface)?;
        let size = match s.effective_size() {
            size if size.width > 0 && size.height > 0 => size,
            _ => self.output_size,
        };
        let window = s.window;

        let id = self.alien.create_surface(client, surface, size)?;
        if let Some(window) = window.and_then(|w| self.windows.window_for_id_mut(w)) {
            window.is_alien = true;
        }
        self.alien.send_configure(id, &self.serials, &mut self.outbox);
        Some(id)
    }

    pub fn alien_surface_destroyed(&mut self, id: AlienSurfaceId) {
        let Some(state) = self.alien.destroy_surface(id) else {
            return;
        };
        if let Some(window) = self.window_of_surface(state.surface) {
            if let Some(window) = self.windows.window_for_id_mut(window) {
                window.is_alien = false;
            }
        }
    }

    pub fn alien_set_title(&mut self, id: AlienSurfaceId, title: &str) {
        if let Some(surface) = self.alien.set_title(id, title) {
            self.set_surface_title(surface, title);
        }
    }

    pub fn alien_ack_configure(&mut self, id: AlienSurfaceId, serial: u32) {
        self.alien.ack_configure(id, serial);
    }

    pub fn alien_request_state(&mut self, id: AlienSurfaceId, states: AlienState, serial: u32) {
        let outcome =
            self.alien
                .request_state(id, states, serial, &self.serials, &mut self.outbox);
        if let StateRequestOutcome::Raise(surface) = outcome {
            if let Some(window) = self.window_of_surface(surface) {
                self.emit(CompositorEvent::RaiseRequested(window));
                self.raise_window(window);
            }
        }
    }

    pub fn alien_set_minimized(&mut self, id: AlienSurfaceId) {
        let Some(surface) = self.alien.surface(id).map(|s| s.surface) else {
            return;
        };
        if let Some(window) = self.window_of_surface(surface) {
            self.emit(CompositorEvent::MinimizeRequested(window));
        }
    }

    pub fn alien_pong(&mut self, serial: u32) {
        let Some(id) = self.alien.pong(serial) else {
            return;
        };
        let surface = self.alien.surface(id).map(|s| s.surface);
        if let Some(window) = surface.and_then(|s| self.window_of_surface(s)) {
            self.emit(CompositorEvent::WindowPong(window));
        }
    }

    // === Alien lifecycle: compositor side ===

    pub fn set_window_hidden(&mut self, window: WindowId, hidden: bool) -> Option<Serial> {
        let id = self.alien_surface_of_window(window)?;
        self.alien
            .set_hidden(id, hidden, &self.serials, &mut self.outbox)
    }

    pub fn set_window_cover(&mut self, window: WindowId, cover: bool) -> Option<Serial> {
        let id = self.alien_surface_of_window(window)?;
        self.alien
            .set_cover(id, cover, &self.serials, &mut self.outbox)
    }

    pub fn resize_window(&mut self, window: WindowId, size: Size) -> Option<Serial> {
        let id = self.alien_surface_of_window(window)?;
        self.alien.resize(id, size, &self.serials, &mut self.outbox)
    }

    /// Asks the client to close `window`. Only alien surfaces can be asked.
    pub fn close_window(&mut self, window: WindowId) -> bool {
        match self.alien_surface_of_window(window) {
            Some(id) => self.alien.close(id, &mut self.outbox),
            None => {
                debug!("Window {} has no close protocol", window);
                false
            }
        }
    }

    pub fn set_process_oom_score(&mut self, process_id: i32, score: i32) -> usize {
        self.alien.set_oom_score(process_id, score, &mut self.outbox)
    }

    pub fn ping_window(&mut self, window: WindowId) -> Option<Serial> {
        let id = self.alien_surface_of_window(window)?;
        self.alien.ping(id, &self.serials, &mut self.outbox)
    }

    /// Queues a liveness ping of whichever window is topmost when the
    /// deferred tasks next run.
    pub fn schedule_topmost_ping(&mut self) {
        self.defer(|compositor| {
            let topmost = compositor.topmost_window_id();
            if !topmost.is_none() {
                compositor.ping_window(topmost);
            }
        });
    }

    fn window_of_surface(&self, surface: SurfaceId) -> Option<WindowId> {
        self.surfaces.get(surface)?.window
    }

    fn alien_surface_of_window(&self, window: WindowId) -> Option<AlienSurfaceId> {
        let surface = self.windows.window_for_id(window)?.surface?;
        self.alien.surface_for(surface)
    }
}
