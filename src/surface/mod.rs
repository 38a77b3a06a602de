//! Client surfaces as seen by the compositor core
//!
//! A [`Surface`] is the compositor-side record of a client `wl_surface`. It is
//! distinct from the [`Window`](crate::window::Window) created for it once it
//! needs a view. Protocol extensions that attach to a surface (viewport,
//! fractional scale) live in its ordered extension chain and answer
//! [`SurfaceOperation`] queries.

use std::collections::HashMap;
use std::fmt;

use downcast_rs::{impl_downcast, Downcast};
use log::debug;

use crate::window::{Point, Size, WindowId};

/// Compositor-assigned surface identifier, unique for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Identifies a connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientKey(pub u64);

/// Frame callback handle, mapped to a `wl_callback` by the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(pub u64);

/// Window property carrying the window category ("dialog", "cover", ...).
pub const CATEGORY_PROPERTY: &str = "CATEGORY";
/// Window property used to link sibling windows of one process.
pub const WINDOW_LINK_PROPERTY: &str = "WINDOW_LINK";
/// Window property carrying the policy application id.
pub const POLICY_APPLICATION_ID_PROPERTY: &str = "POLICY_APPLICATION_ID";

/// Source crop rectangle in buffer coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectF {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Extension kinds that can attach to a surface. At most one of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionKind {
    Viewport,
    FractionalScale,
}

/// Handle of an extension wire object (`wp_viewport`, `wp_fractional_scale_v1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtensionObjectId(pub u64);

/// Typed operations offered to a surface's extension chain.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOperation {
    /// Filled in by the viewport extension.
    Viewport {
        source: Option<RectF>,
        destination: Option<Size>,
    },
    /// The output scale for the surface changed. The fractional scale
    /// extension answers with the object and wire value to send.
    PreferredScale {
        scale: f64,
        sent: Option<(ExtensionObjectId, u32)>,
    },
}

/// Handler attached to a surface's operation chain.
pub trait SurfaceExtension: Downcast + fmt::Debug {
    fn kind(&self) -> ExtensionKind;

    /// Wire object backing this extension.
    fn object(&self) -> ExtensionObjectId;

    /// Answers `operation` if this handler understands it.
    fn run_operation(&mut self, operation: &mut SurfaceOperation) -> bool;

    /// Applies double-buffered state on surface commit.
    fn commit(&mut self) {}
}
impl_downcast!(SurfaceExtension);

/// State committed by a client in one `wl_surface.commit`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceCommit {
    /// `Some(Some(size))` when a buffer was attached, `Some(None)` when a
    /// null buffer was attached, `None` when attach was not called.
    pub buffer: Option<Option<Size>>,
    pub damage: Vec<(i32, i32, i32, i32)>,
}

#[derive(Debug)]
pub struct Surface {
    pub id: SurfaceId,
    pub client: ClientKey,
    pub process_id: i32,
    pub buffer_size: Size,
    pub has_buffer: bool,
    /// Set once the first map transition ran, cleared on unmap.
    pub first_map_done: bool,
    pub window: Option<WindowId>,
    pub transient_parent: Option<SurfaceId>,
    pub transient_offset: Point,
    pub properties: HashMap<String, String>,
    pub title: String,
    pub frame_callbacks: Vec<CallbackId>,
    pub damage: Vec<(i32, i32, i32, i32)>,
    pub buffer_pending_release: bool,
    extensions: Vec<Box<dyn SurfaceExtension>>,
}

impl Surface {
    pub fn new(id: SurfaceId, client: ClientKey, process_id: i32) -> Self {
        Self {
            id,
            client,
            process_id,
            buffer_size: Size::default(),
            has_buffer: false,
            first_map_done: false,
            window: None,
            transient_parent: None,
            transient_offset: Point::default(),
            properties: HashMap::new(),
            title: String::new(),
            frame_callbacks: Vec::new(),
            damage: Vec::new(),
            buffer_pending_release: false,
            extensions: Vec::new(),
        }
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn has_extension(&self, kind: ExtensionKind) -> bool {
        self.extensions.iter().any(|e| e.kind() == kind)
    }

    /// Wire object of the handler of `kind`, if one is attached.
    pub fn extension_object(&self, kind: ExtensionKind) -> Option<ExtensionObjectId> {
        self.extensions
            .iter()
            .find(|e| e.kind() == kind)
            .map(|e| e.object())
    }

    /// Appends `extension` to the chain. Returns it back if one of the same
    /// kind is already attached.
    pub fn attach_extension(
        &mut self,
        extension: Box<dyn SurfaceExtension>,
    ) -> Result<(), Box<dyn SurfaceExtension>> {
        if self.has_extension(extension.kind()) {
            return Err(extension);
        }
        debug!("{}: attached {:?}", self.id, extension.kind());
        self.extensions.push(extension);
        Ok(())
    }

    /// Removes the handler of `kind` from the chain and hands it back, so the
    /// caller drops it only once it can no longer be dispatched to.
    pub fn detach_extension(&mut self, kind: ExtensionKind) -> Option<Box<dyn SurfaceExtension>> {
        let index = self.extensions.iter().position(|e| e.kind() == kind)?;
        debug!("{}: detached {:?}", self.id, kind);
        Some(self.extensions.remove(index))
    }

    pub fn extension<T: SurfaceExtension>(&self) -> Option<&T> {
        self.extensions
            .iter()
            .find_map(|e| (**e).downcast_ref::<T>())
    }

    pub fn extension_mut<T: SurfaceExtension>(&mut self) -> Option<&mut T> {
        self.extensions
            .iter_mut()
            .find_map(|e| (**e).downcast_mut::<T>())
    }

    /// Offers `operation` to each handler in order until one claims it.
    pub fn run_operation(&mut self, operation: &mut SurfaceOperation) -> bool {
        self.extensions
            .iter_mut()
            .any(|extension| extension.run_operation(operation))
    }

    pub(crate) fn commit_extensions(&mut self) {
        for extension in &mut self.extensions {
            extension.commit();
        }
    }

    /// Size the surface occupies on screen after viewport scaling.
    pub fn effective_size(&mut self) -> Size {
        let mut query = SurfaceOperation::Viewport {
            source: None,
            destination: None,
        };
        if self.run_operation(&mut query) {
            if let SurfaceOperation::Viewport {
                source,
                destination,
            } = query
            {
                if let Some(destination) = destination {
                    return destination;
                }
                if let Some(source) = source {
                    return Size::new(source.width.round() as i32, source.height.round() as i32);
                }
            }
        }
        self.buffer_size
    }
}

/// Table of live surfaces.
#[derive(Debug)]
pub struct SurfaceStore {
    surfaces: HashMap<SurfaceId, Surface>,
    next_id: u64,
}

impl Default for SurfaceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceStore {
    pub fn new() -> Self {
        Self {
            surfaces: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn create(&mut self, client: ClientKey, process_id: i32) -> SurfaceId {
        let id = SurfaceId(self.next_id);
        self.next_id += 1;
        self.surfaces.insert(id, Surface::new(id, client, process_id));
        id
    }

    pub fn get(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(&id)
    }

    pub fn get_mut(&mut self, id: SurfaceId) -> Option<&mut Surface> {
        self.surfaces.get_mut(&id)
    }

    pub fn remove(&mut self, id: SurfaceId) -> Option<Surface> {
        self.surfaces.remove(&id)
    }

    pub fn contains(&self, id: SurfaceId) -> bool {
        self.surfaces.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Surface> {
        self.surfaces.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Surface> {
        self.surfaces.values_mut()
    }

    pub fn ids_for_client(&self, client: ClientKey) -> Vec<SurfaceId> {
        self.surfaces
            .values()
            .filter(|s| s.client == client)
            .map(|s| s.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Crop {
        object: ExtensionObjectId,
        source: RectF,
    }

    impl SurfaceExtension for Crop {
        fn kind(&self) -> ExtensionKind {
            ExtensionKind::Viewport
        }
        fn object(&self) -> ExtensionObjectId {
            self.object
        }
        fn run_operation(&mut self, operation: &mut SurfaceOperation) -> bool {
            match operation {
                SurfaceOperation::Viewport { source, .. } => {
                    *source = Some(self.source);
                    true
                }
                _ => false,
            }
        }
    }

    fn crop() -> Box<dyn SurfaceExtension> {
        Box::new(Crop {
            object: ExtensionObjectId(7),
            source: RectF {
                x: 0.0,
                y: 0.0,
                width: 10.4,
                height: 20.6,
            },
        })
    }

    #[test]
    fn one_extension_per_kind() {
        let mut store = SurfaceStore::new();
        let id = store.create(ClientKey(1), 100);
        let surface = store.get_mut(id).unwrap();

        assert!(surface.attach_extension(crop()).is_ok());
        assert!(surface.attach_extension(crop()).is_err());
        assert!(surface.has_extension(ExtensionKind::Viewport));
    }

    #[test]
    fn unclaimed_operation_reports_false() {
        let mut surface = Surface::new(SurfaceId(1), ClientKey(1), 1);
        surface.attach_extension(crop()).unwrap();

        let mut op = SurfaceOperation::PreferredScale {
            scale: 2.0,
            sent: None,
        };
        assert!(!surface.run_operation(&mut op));
    }

    #[test]
    fn detached_extension_no_longer_answers() {
        let mut surface = Surface::new(SurfaceId(1), ClientKey(1), 1);
        surface.buffer_size = Size::new(100, 200);
        surface.attach_extension(crop()).unwrap();
        assert_eq!(surface.effective_size(), Size::new(10, 21));

        let detached = surface.detach_extension(ExtensionKind::Viewport);
        assert!(detached.is_some());
        assert_eq!(surface.effective_size(), Size::new(100, 200));
        assert!(surface.detach_extension(ExtensionKind::Viewport).is_none());
    }

    #[test]
    fn surface_ids_are_not_reused() {
        let mut store = SurfaceStore::new();
        let first = store.create(ClientKey(1), 1);
        store.remove(first);
        let second = store.create(ClientKey(1), 1);
        assert_ne!(first, second);
    }
}
