//! Window registry
//!
//! This module is the single source of truth for which windows exist and
//! which of them are currently visible:
//! - every window created for a client surface lives in the *total* table
//! - windows whose surface is currently mapped are also in the *mapped* table
//! - a window that is in the total table but not mapped is a ghost
//! - mapped windows are kept in a bottom-to-top stacking order
//!
//! Window ids start at 1 and are never reused; 0 means "no window".

use std::collections::{HashMap, VecDeque};
use std::fmt;

use log::debug;

use crate::surface::SurfaceId;

/// Window identifier. `WindowId::NONE` (0) is never assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct WindowId(pub u32);

impl WindowId {
    pub const NONE: WindowId = WindowId(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

/// Rectangle for window positioning and sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rectangle {
    pub fn from_loc_and_size(loc: Point, size: Size) -> Self {
        Self {
            x: loc.x,
            y: loc.y,
            width: size.width,
            height: size.height,
        }
    }

    pub fn loc(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// The compositor's object for one client surface that needed a view.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub id: WindowId,

    /// Backing surface. `None` once the surface was destroyed.
    pub surface: Option<SurfaceId>,

    pub process_id: i32,

    /// Client-set classification ("dialog", "cover", ...)
    pub category: String,

    /// Client-set policy application id
    pub policy_application_id: Option<String>,

    /// Client-set token linking sibling windows of one process
    pub link_token: Option<String>,

    pub title: String,

    pub mapped: bool,

    /// Whether the window was ever mapped; only such windows are counted.
    pub ever_mapped: bool,

    pub geometry: Rectangle,

    pub touch_events_enabled: bool,

    /// Transient parent for dialogs
    pub parent: Option<WindowId>,

    /// Transient children, in attach order
    pub children: Vec<WindowId>,

    /// True if the surface speaks the alien lifecycle protocol.
    pub is_alien: bool,

    /// UI hold keeping the window alive after its surface is gone.
    pub delay_remove: bool,

    pub focus: bool,
}

impl Window {
    pub fn new(id: WindowId, surface: SurfaceId, process_id: i32) -> Self {
        Self {
            id,
            surface: Some(surface),
            process_id,
            category: String::new(),
            policy_application_id: None,
            link_token: None,
            title: String::new(),
            mapped: false,
            ever_mapped: false,
            geometry: Rectangle::default(),
            touch_events_enabled: false,
            parent: None,
            children: Vec::new(),
            is_alien: false,
            delay_remove: false,
            focus: false,
        }
    }

    /// A ghost is a known window whose surface is not currently mapped.
    pub fn is_ghost(&self) -> bool {
        !self.mapped
    }
}

#[derive(Debug)]
pub struct WindowRegistry {
    /// Every window, mapped or not
    windows: HashMap<WindowId, Window>,

    /// Mapped windows and their surfaces
    mapped: HashMap<WindowId, SurfaceId>,

    /// Mapped window stacking order (bottom to top)
    stacking_order: VecDeque<WindowId>,

    /// Next window ID
    next_window_id: u32,

    /// Live windows that have been mapped at least once
    total_window_count: usize,
}

impl Default for WindowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self {
            windows: HashMap::new(),
            mapped: HashMap::new(),
            stacking_order: VecDeque::new(),
            next_window_id: 1,
            total_window_count: 0,
        }
    }

    /// Creates an unmapped window for `surface` and returns its new id.
    pub fn register_window(&mut self, surface: SurfaceId, process_id: i32) -> WindowId {
        let id = WindowId(self.next_window_id);
        self.next_window_id += 1;

        self.windows.insert(id, Window::new(id, surface, process_id));
        debug!("Registered window {} for {}", id, surface);
        id
    }

    /// Transitions `id` to mapped. Returns false (and changes nothing) if the
    /// window is unknown, already mapped or has lost its surface.
    pub fn mark_mapped(&mut self, id: WindowId, size: Size, category: &str) -> bool {
        let Some(window) = self.windows.get_mut(&id) else {
            return false;
        };
        let Some(surface) = window.surface else {
            return false;
        };
        if self.mapped.contains_key(&id) {
            return false;
        }

        window.mapped = true;
        window.geometry = Rectangle::from_loc_and_size(window.geometry.loc(), size);
        window.touch_events_enabled = true;
        window.category = category.to_string();
        if !window.ever_mapped {
            window.ever_mapped = true;
            self.total_window_count += 1;
        }

        self.mapped.insert(id, surface);
        self.add_window_to_stacking(id);
        debug!("Window {} mapped at {}x{}", id, size.width, size.height);
        true
    }

    /// Removes `id` from the mapped table. Idempotent.
    pub fn mark_unmapped(&mut self, id: WindowId) -> bool {
        if self.mapped.remove(&id).is_none() {
            return false;
        }
        if let Some(window) = self.windows.get_mut(&id) {
            window.mapped = false;
            window.focus = false;
        }
        self.remove_window_from_stacking(id);
        debug!("Window {} unmapped", id);
        true
    }

    /// Removes `id` entirely. Safe to call on unknown, unmapped or already
    /// destroyed ids.
    pub fn destroy_window(&mut self, id: WindowId) -> Option<Window> {
        self.mark_unmapped(id);
        let window = self.windows.remove(&id)?;
        if window.ever_mapped {
            self.total_window_count -= 1;
        }

        if let Some(parent) = window.parent {
            if let Some(parent) = self.windows.get_mut(&parent) {
                parent.children.retain(|&child| child != id);
            }
        }
        for child in &window.children {
            if let Some(child) = self.windows.get_mut(child) {
                child.parent = None;
            }
        }

        debug!("Window {} destroyed", id);
        Some(window)
    }

    /// Marks the backing surface of `id` as gone. The window stays addressable.
    pub fn detach_surface(&mut self, id: WindowId) {
        self.mark_unmapped(id);
        if let Some(window) = self.windows.get_mut(&id) {
            window.surface = None;
        }
    }

    pub fn window_for_id(&self, id: WindowId) -> Option<&Window> {
        self.windows.get(&id)
    }

    pub fn window_for_id_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        self.windows.get_mut(&id)
    }

    /// Surface of a *mapped* window.
    pub fn surface_for_id(&self, id: WindowId) -> Option<SurfaceId> {
        self.mapped.get(&id).copied()
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.windows.contains_key(&id)
    }

    pub fn is_mapped(&self, id: WindowId) -> bool {
        self.mapped.contains_key(&id)
    }

    pub fn windows(&self) -> impl Iterator<Item = &Window> {
        self.windows.values()
    }

    /// Another window of `sibling`'s process whose link token equals `token`.
    ///
    /// When several windows match, which one is returned is unspecified.
    pub fn find_linked_window(&self, sibling: WindowId, token: &str) -> Option<WindowId> {
        let process_id = self.windows.get(&sibling)?.process_id;
        self.windows
            .values()
            .find(|w| {
                w.id != sibling
                    && w.process_id == process_id
                    && w.link_token.as_deref() == Some(token)
            })
            .map(|w| w.id)
    }

    /// Attaches `child` as a transient of `parent`.
    pub fn set_parent(&mut self, child: WindowId, parent: WindowId) -> bool {
        if child == parent || !self.windows.contains_key(&parent) {
            return false;
        }
        let Some(window) = self.windows.get_mut(&child) else {
            return false;
        };
        let previous = window.parent.replace(parent);
        if let Some(previous) = previous.and_then(|p| self.windows.get_mut(&p)) {
            previous.children.retain(|&c| c != child);
        }
        if let Some(parent) = self.windows.get_mut(&parent) {
            if !parent.children.contains(&child) {
                parent.children.push(child);
            }
        }
        true
    }

    /// Number of mapped windows
    pub fn window_count(&self) -> usize {
        self.mapped.len()
    }

    /// Number of live windows that were mapped at some point
    pub fn total_window_count(&self) -> usize {
        self.total_window_count
    }

    pub fn ghost_window_count(&self) -> usize {
        self.total_window_count - self.mapped.len()
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        let mut ids: Vec<_> = self.mapped.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn ghost_window_ids(&self) -> Vec<WindowId> {
        let mut ids: Vec<_> = self
            .windows
            .values()
            .filter(|w| w.ever_mapped && !w.mapped)
            .map(|w| w.id)
            .collect();
        ids.sort();
        ids
    }

    // === Stacking Order Management ===

    fn add_window_to_stacking(&mut self, id: WindowId) {
        if !self.stacking_order.contains(&id) {
            self.stacking_order.push_back(id);
        }
    }

    fn remove_window_from_stacking(&mut self, id: WindowId) {
        self.stacking_order.retain(|&w| w != id);
    }

    /// Moves a mapped window to the top. Returns false if it is not mapped.
    pub fn raise(&mut self, id: WindowId) -> bool {
        if !self.mapped.contains_key(&id) {
            return false;
        }
        self.remove_window_from_stacking(id);
        self.stacking_order.push_back(id);
        true
    }

    /// Moves a mapped window to the bottom. Returns false if it is not mapped.
    pub fn lower(&mut self, id: WindowId) -> bool {
        if !self.mapped.contains_key(&id) {
            return false;
        }
        self.remove_window_from_stacking(id);
        self.stacking_order.push_front(id);
        true
    }

    /// Mapped windows, bottom to top
    pub fn stacking_order(&self) -> Vec<WindowId> {
        self.stacking_order.iter().copied().collect()
    }

    pub fn top_window(&self) -> Option<WindowId> {
        self.stacking_order.back().copied()
    }

    pub fn clear(&mut self) {
        self.windows.clear();
        self.mapped.clear();
        self.stacking_order.clear();
        self.total_window_count = 0;
    }
}
