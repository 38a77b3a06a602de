//! Display state, update gating and frame callbacks

use log::{debug, info};

use super::{CompositorEvent, LipstickCompositor};
use crate::protocol::ProtocolEvent;
use crate::surface::{CallbackId, SurfaceId};
use crate::window::{Size, WindowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayState {
    Off,
    Dimmed,
    On,
}

impl LipstickCompositor {
    /// Display power transitions. Entering `Off` disables updates and
    /// leaving it enables them again.
    pub fn display_state_changed(&mut self, state: DisplayState) {
        let previous = self.display_state;
        if previous == state {
            return;
        }
        self.display_state = state;
        debug!("Display state {:?} -> {:?}", previous, state);

        if state == DisplayState::Off {
            self.set_updates_enabled(false);
        } else if previous == DisplayState::Off {
            self.set_updates_enabled(true);
        }
    }

    pub fn display_state(&self) -> DisplayState {
        self.display_state
    }

    pub fn set_lock_screen_visible(&mut self, visible: bool) {
        self.lock_screen_visible = visible;
    }

    pub fn lock_screen_visible(&self) -> bool {
        self.lock_screen_visible
    }

    pub fn updates_enabled(&self) -> bool {
        self.updates_enabled
    }

    pub fn display_visible(&self) -> bool {
        self.display_visible
    }

    pub fn set_updates_enabled(&mut self, enabled: bool) {
        if self.updates_enabled == enabled {
            return;
        }
        self.updates_enabled = enabled;
        info!("Updates {}", if enabled { "enabled" } else { "disabled" });
        self.emit(CompositorEvent::UpdatesEnabledChanged(enabled));

        if enabled {
            self.emit(CompositorEvent::DisplayOnHint);
            self.display_visible = true;
            self.emit(CompositorEvent::DisplayVisibilityChanged(true));

            if let Some(window) = self.unfocused_on_updates_disabled.take() {
                if !self.lock_screen_visible && self.topmost_window_id == window {
                    debug!("Restoring focus to window {}", window);
                    self.set_keyboard_focus(Some(window));
                }
            }
            self.schedule_repaint();
        } else {
            let topmost = self.topmost_window_id;
            if !topmost.is_none() && self.keyboard_focus == Some(topmost) {
                self.unfocused_on_updates_disabled = Some(topmost);
                self.set_keyboard_focus(None);
            }
            self.display_visible = false;
            self.emit(CompositorEvent::DisplayVisibilityChanged(false));
            self.emit(CompositorEvent::DisplayOffHint);
            self.deliver_frame_callbacks();
        }
    }

    /// Window that lost focus when updates were disabled.
    pub fn unfocused_on_updates_disabled(&self) -> Option<WindowId> {
        self.unfocused_on_updates_disabled
    }

    pub fn set_output_size(&mut self, size: Size) {
        self.output_size = size;
    }

    // === Frame callbacks ===

    /// Queues a `wl_surface.frame` callback. `None` if the surface is gone.
    pub fn frame_requested(&mut self, surface: SurfaceId) -> Option<CallbackId> {
        if !self.surfaces.contains(surface) {
            return None;
        }
        let callback = CallbackId(self.allocate_object_id());
        if let Some(s) = self.surfaces.get_mut(surface) {
            s.frame_callbacks.push(callback);
        }
        Some(callback)
    }

    /// Asks for a repaint once until the next rendered frame.
    pub(crate) fn schedule_repaint(&mut self) {
        if !self.updates_enabled || self.repaint_pending {
            return;
        }
        self.repaint_pending = true;
        self.emit(CompositorEvent::RepaintRequested);
    }

    pub fn repaint_pending(&self) -> bool {
        self.repaint_pending
    }

    /// The renderer finished a frame: deliver callbacks, release buffers,
    /// clear damage.
    pub fn frame_rendered(&mut self, time_ms: u32) {
        self.repaint_pending = false;
        if !self.updates_enabled {
            return;
        }

        let mut events = Vec::new();
        for surface in self.surfaces.iter_mut() {
            events.extend(
                surface
                    .frame_callbacks
                    .drain(..)
                    .map(|callback| ProtocolEvent::FrameDone {
                        callback,
                        time: time_ms,
                    }),
            );
            if surface.buffer_pending_release {
                surface.buffer_pending_release = false;
                events.push(ProtocolEvent::BufferRelease {
                    surface: surface.id,
                });
            }
            surface.damage.clear();
        }
        events.sort_by_key(event_order);
        self.outbox.extend(events);
    }

    /// Fires every queued frame callback now so clients are not left
    /// waiting while the display is off.
    fn deliver_frame_callbacks(&mut self) {
        let time = self.current_time_ms();
        let mut callbacks: Vec<CallbackId> = self
            .surfaces
            .iter_mut()
            .flat_map(|surface| surface.frame_callbacks.drain(..).collect::<Vec<_>>())
            .collect();
        callbacks.sort_by_key(|callback| callback.0);
        debug!("Flushing {} frame callbacks", callbacks.len());
        self.outbox.extend(
            callbacks
                .into_iter()
                .map(|callback| ProtocolEvent::FrameDone { callback, time }),
        );
    }

    pub fn current_time_ms(&self) -> u32 {
        self.started.elapsed().as_millis() as u32
    }
}

/// Deterministic order for events gathered from the surface table.
fn event_order(event: &ProtocolEvent) -> (u8, u64) {
    match event {
        ProtocolEvent::FrameDone { callback, .. } => (0, callback.0),
        ProtocolEvent::BufferRelease { surface } => (1, surface.0),
        _ => (2, 0),
    }
}
