//! Client and surface lifecycle transitions

use log::{debug, info, warn};

use super::{CompositorEvent, LipstickCompositor};
use crate::protocol::ProtocolEvent;
use crate::surface::{
    ClientKey, SurfaceCommit, SurfaceId, CATEGORY_PROPERTY, POLICY_APPLICATION_ID_PROPERTY,
    WINDOW_LINK_PROPERTY,
};
use crate::window::{Point, WindowId};

impl LipstickCompositor {
    // === Clients ===

    pub fn client_connected(&mut self, process_id: i32) -> ClientKey {
        let key = ClientKey(self.next_client);
        self.next_client += 1;
        self.clients.insert(key, process_id);
        debug!("Client {:?} connected (pid {})", key, process_id);
        key
    }

    /// Tears down everything the client still owns.
    pub fn client_disconnected(&mut self, client: ClientKey) {
        for surface in self.surfaces.ids_for_client(client) {
            self.surface_destroyed(surface);
        }
        self.clients.remove(&client);
        debug!("Client {:?} disconnected", client);
    }

    pub fn client_process_id(&self, client: ClientKey) -> Option<i32> {
        self.clients.get(&client).copied()
    }

    // === Surfaces ===

    pub fn surface_created(&mut self, client: ClientKey) -> SurfaceId {
        let process_id = self.clients.get(&client).copied().unwrap_or(0);
        let id = self.surfaces.create(client, process_id);
        debug!("{} created for pid {}", id, process_id);
        id
    }

    /// Sets a client window property. Link and policy ids are applied to an
    /// existing window immediately; the category is read at map time.
    ///
    /// The Wayland frontend has no global carrying window properties or
    /// transient parents; shells built on the library call this and
    /// [`set_transient_parent`](Self::set_transient_parent) directly.
    pub fn set_window_property(&mut self, surface: SurfaceId, key: &str, value: &str) {
        let Some(s) = self.surfaces.get_mut(surface) else {
            debug!("Property {} for destroyed {}", key, surface);
            return;
        };
        s.properties.insert(key.to_string(), value.to_string());
        let Some(window_id) = s.window else {
            return;
        };

        if let Some(window) = self.windows.window_for_id_mut(window_id) {
            match key {
                WINDOW_LINK_PROPERTY => window.link_token = Some(value.to_string()),
                POLICY_APPLICATION_ID_PROPERTY => {
                    window.policy_application_id = Some(value.to_string())
                }
                _ => {}
            }
        }
        if key == POLICY_APPLICATION_ID_PROPERTY && window_id == self.topmost_window_id {
            self.refresh_topmost_details();
        }
    }

    pub fn set_surface_title(&mut self, surface: SurfaceId, title: &str) {
        let Some(s) = self.surfaces.get_mut(surface) else {
            return;
        };
        s.title = title.to_string();
        let Some(window_id) = s.window else {
            return;
        };
        if let Some(window) = self.windows.window_for_id_mut(window_id) {
            if window.title == title {
                return;
            }
            window.title = title.to_string();
        }
        self.notify_models_title_changed(window_id);
    }

    /// Declares `parent` as the transient parent of `surface`. Takes effect
    /// when the view of `surface` is created.
    pub fn set_transient_parent(
        &mut self,
        surface: SurfaceId,
        parent: Option<SurfaceId>,
        offset: Point,
    ) {
        if let Some(s) = self.surfaces.get_mut(surface) {
            s.transient_parent = parent;
            s.transient_offset = offset;
        }
    }

    /// Applies a `wl_surface.commit`. A surface maps on the first commit with
    /// a buffer and unmaps on a commit with a null buffer.
    pub fn surface_committed(&mut self, surface: SurfaceId, commit: SurfaceCommit) {
        let Some(s) = self.surfaces.get_mut(surface) else {
            debug!("Commit for destroyed {}", surface);
            return;
        };

        s.commit_extensions();
        match commit.buffer {
            Some(Some(size)) => {
                s.buffer_size = size;
                s.has_buffer = true;
                s.buffer_pending_release = true;
            }
            Some(None) => {
                s.has_buffer = false;
                s.buffer_pending_release = false;
            }
            None => {}
        }
        s.damage.extend(commit.damage);

        let has_buffer = s.has_buffer;
        let mapped = s.first_map_done;
        let window = s.window;
        let size = s.effective_size();

        if has_buffer && !mapped {
            self.surface_mapped(surface);
        } else if !has_buffer && mapped {
            self.surface_unmapped(surface);
        } else if let Some(window) = window.and_then(|id| self.windows.window_for_id_mut(id)) {
            if window.mapped && window.geometry.size() != size {
                window.geometry.width = size.width;
                window.geometry.height = size.height;
            }
        }

        if has_buffer {
            self.schedule_repaint();
        }
    }

    /// Runs the map transition for `surface`. Creates the view on first use.
    /// A second call while mapped does nothing.
    pub fn surface_mapped(&mut self, surface: SurfaceId) {
        let Some(s) = self.surfaces.get_mut(surface) else {
            return;
        };
        if s.first_map_done {
            return;
        }
        s.first_map_done = true;
        let size = s.effective_size();
        let category = s.property(CATEGORY_PROPERTY).unwrap_or_default().to_string();
        let existing = s.window;

        let window_id = match existing {
            Some(id) => id,
            None => self.create_view(surface),
        };

        if !self.windows.mark_mapped(window_id, size, &category) {
            return;
        }
        info!(
            "Window {} mapped ({}x{}, category {:?})",
            window_id, size.width, size.height, category
        );

        self.notify_models_added(window_id);
        self.emit(CompositorEvent::WindowMapped(window_id));
        self.notify_counts();
        self.update_topmost_from_stack();
    }

    /// Creates the window for `surface` and sets up its transient parent.
    fn create_view(&mut self, surface: SurfaceId) -> WindowId {
        let Some(s) = self.surfaces.get(surface) else {
            return WindowId::NONE;
        };
        let process_id = s.process_id;
        let link_token = s.property(WINDOW_LINK_PROPERTY).map(str::to_string);
        let policy_application_id = s
            .property(POLICY_APPLICATION_ID_PROPERTY)
            .map(str::to_string);
        let title = s.title.clone();
        let parent = s.transient_parent;
        let offset = s.transient_offset;

        let id = self.windows.register_window(surface, process_id);
        let is_alien = self.alien.surface_for(surface).is_some();
        if let Some(window) = self.windows.window_for_id_mut(id) {
            window.link_token = link_token;
            window.policy_application_id = policy_application_id;
            window.title = title;
            window.is_alien = is_alien;
        }
        if let Some(s) = self.surfaces.get_mut(surface) {
            s.window = Some(id);
        }

        if let Some(parent) = parent {
            match self.surfaces.get(parent).and_then(|p| p.window) {
                Some(parent_window) => {
                    self.windows.set_parent(id, parent_window);
                    if let Some(window) = self.windows.window_for_id_mut(id) {
                        window.geometry.x = offset.x;
                        window.geometry.y = offset.y;
                    }
                }
                None => warn!(
                    "Transient parent {} of {} has no window, not parenting",
                    parent, surface
                ),
            }
        }
        id
    }

    /// Runs the unmap transition for `surface`. The window stays as a ghost.
    pub fn surface_unmapped(&mut self, surface: SurfaceId) {
        let Some(s) = self.surfaces.get_mut(surface) else {
            return;
        };
        if !s.first_map_done {
            return;
        }
        s.first_map_done = false;
        if let Some(window) = s.window {
            self.unmap_window(window);
        }
    }

    fn unmap_window(&mut self, window: WindowId) {
        if !self.windows.mark_unmapped(window) {
            return;
        }
        info!("Window {} unmapped", window);

        if self.keyboard_focus == Some(window) {
            self.keyboard_focus = None;
            self.emit(CompositorEvent::KeyboardFocusChanged(None));
        }
        self.notify_models_removed(window);
        self.emit(CompositorEvent::WindowUnmapped(window));
        self.notify_counts();
        self.update_topmost_from_stack();
    }

    /// Destroys `surface`: its extensions and alien state go with it, its
    /// window becomes a ghost and is destroyed on the next deferred pass
    /// unless the UI holds it with `delay_remove`.
    pub fn surface_destroyed(&mut self, surface: SurfaceId) {
        if !self.surfaces.contains(surface) {
            return;
        }
        if let Some(alien_surface) = self.alien.surface_for(surface) {
            self.alien.destroy_surface(alien_surface);
        }
        self.surface_unmapped(surface);

        let Some(removed) = self.surfaces.remove(surface) else {
            return;
        };
        debug!("{} destroyed", surface);

        // callbacks still queued would otherwise outlive their surface
        if !removed.frame_callbacks.is_empty() {
            let time = self.current_time_ms();
            self.outbox.extend(
                removed
                    .frame_callbacks
                    .iter()
                    .map(|&callback| ProtocolEvent::FrameDone { callback, time }),
            );
        }

        if let Some(window) = removed.window {
            self.windows.detach_surface(window);
            self.notify_counts();

            let delay_remove = self
                .windows
                .window_for_id(window)
                .map(|w| w.delay_remove)
                .unwrap_or(false);
            if !delay_remove {
                self.defer(move |compositor| compositor.destroy_window(window));
            }
        }
    }

    /// Removes `window` entirely. Safe on unknown or already destroyed ids.
    pub fn destroy_window(&mut self, window: WindowId) {
        if !self.windows.contains(window) {
            return;
        }
        self.unmap_window(window);

        let Some(removed) = self.windows.destroy_window(window) else {
            return;
        };
        info!("Window {} destroyed", window);

        if let Some(surface) = removed.surface.and_then(|s| self.surfaces.get_mut(s)) {
            surface.window = None;
            surface.first_map_done = false;
        }
        if self.unfocused_on_updates_disabled == Some(window) {
            self.unfocused_on_updates_disabled = None;
        }

        self.emit(CompositorEvent::WindowDestroyed(window));
        self.notify_counts();
        if self.topmost_window_id == window {
            self.update_topmost_from_stack();
        }
    }

    /// Holds (or releases) a window after its surface is gone.
    pub fn set_delay_remove(&mut self, window: WindowId, delay_remove: bool) {
        let Some(w) = self.windows.window_for_id_mut(window) else {
            return;
        };
        if w.delay_remove == delay_remove {
            return;
        }
        w.delay_remove = delay_remove;
        if !delay_remove && w.surface.is_none() {
            self.defer(move |compositor| compositor.destroy_window(window));
        }
    }

    pub fn find_linked_window(&self, sibling: WindowId, token: &str) -> Option<WindowId> {
        self.windows.find_linked_window(sibling, token)
    }

    // === Stacking ===

    pub fn raise_window(&mut self, window: WindowId) -> bool {
        if !self.windows.raise(window) {
            return false;
        }
        self.emit(CompositorEvent::WindowRaised(window));
        self.update_topmost_from_stack();
        true
    }

    pub fn lower_window(&mut self, window: WindowId) -> bool {
        if !self.windows.lower(window) {
            return false;
        }
        self.emit(CompositorEvent::WindowLowered(window));
        self.update_topmost_from_stack();
        true
    }
}
