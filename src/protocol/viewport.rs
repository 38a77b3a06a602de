//! `wp_viewport` state
//!
//! Source and destination are double-buffered: requests update the pending
//! state and the surface commit applies it.

use crate::error::{CompositorError, CompositorResult};
use crate::surface::{ExtensionKind, ExtensionObjectId, RectF, SurfaceExtension, SurfaceOperation};
use crate::window::Size;

#[derive(Debug)]
pub struct Viewport {
    object: ExtensionObjectId,
    pending_source: Option<Option<RectF>>,
    pending_destination: Option<Option<Size>>,
    source: Option<RectF>,
    destination: Option<Size>,
}

impl Viewport {
    pub fn new(object: ExtensionObjectId) -> Self {
        Self {
            object,
            pending_source: None,
            pending_destination: None,
            source: None,
            destination: None,
        }
    }

    /// `x, y, width, height` all equal to -1 unset the source rectangle.
    pub fn set_source(&mut self, x: f64, y: f64, width: f64, height: f64) -> CompositorResult<()> {
        if x == -1.0 && y == -1.0 && width == -1.0 && height == -1.0 {
            self.pending_source = Some(None);
            return Ok(());
        }
        if x < 0.0 || y < 0.0 || width <= 0.0 || height <= 0.0 {
            return Err(CompositorError::BadValue(format!(
                "source rectangle {}x{}+{}+{}",
                width, height, x, y
            )));
        }
        self.pending_source = Some(Some(RectF {
            x,
            y,
            width,
            height,
        }));
        Ok(())
    }

    /// `-1, -1` unsets the destination size.
    pub fn set_destination(&mut self, width: i32, height: i32) -> CompositorResult<()> {
        if width == -1 && height == -1 {
            self.pending_destination = Some(None);
            return Ok(());
        }
        if width <= 0 || height <= 0 {
            return Err(CompositorError::BadValue(format!(
                "destination size {}x{}",
                width, height
            )));
        }
        self.pending_destination = Some(Some(Size::new(width, height)));
        Ok(())
    }

    pub fn source(&self) -> Option<RectF> {
        self.source
    }

    pub fn destination(&self) -> Option<Size> {
        self.destination
    }
}

impl SurfaceExtension for Viewport {
    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Viewport
    }

    fn object(&self) -> ExtensionObjectId {
        self.object
    }

    fn run_operation(&mut self, operation: &mut SurfaceOperation) -> bool {
        match operation {
            SurfaceOperation::Viewport {
                source,
                destination,
            } => {
                *source = self.source;
                *destination = self.destination;
                true
            }
            _ => false,
        }
    }

    fn commit(&mut self) {
        if let Some(source) = self.pending_source.take() {
            self.source = source;
        }
        if let Some(destination) = self.pending_destination.take() {
            self.destination = destination;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_applies_on_commit() {
        let mut viewport = Viewport::new(ExtensionObjectId(1));
        viewport.set_destination(200, 100).unwrap();
        assert_eq!(viewport.destination(), None);

        viewport.commit();
        assert_eq!(viewport.destination(), Some(Size::new(200, 100)));

        // a commit without new requests keeps the state
        viewport.commit();
        assert_eq!(viewport.destination(), Some(Size::new(200, 100)));
    }

    #[test]
    fn minus_one_unsets() {
        let mut viewport = Viewport::new(ExtensionObjectId(1));
        viewport.set_source(0.0, 0.0, 64.0, 32.0).unwrap();
        viewport.commit();
        assert!(viewport.source().is_some());

        viewport.set_source(-1.0, -1.0, -1.0, -1.0).unwrap();
        viewport.set_destination(-1, -1).unwrap();
        viewport.commit();
        assert_eq!(viewport.source(), None);
        assert_eq!(viewport.destination(), None);
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut viewport = Viewport::new(ExtensionObjectId(1));
        assert!(matches!(
            viewport.set_source(-2.0, 0.0, 10.0, 10.0),
            Err(CompositorError::BadValue(_))
        ));
        assert!(viewport.set_source(0.0, 0.0, 0.0, 10.0).is_err());
        assert!(viewport.set_destination(0, 10).is_err());
        assert!(viewport.set_destination(-1, 10).is_err());

        viewport.commit();
        assert_eq!(viewport.source(), None);
    }

    #[test]
    fn answers_viewport_queries_only() {
        let mut viewport = Viewport::new(ExtensionObjectId(3));
        viewport.set_source(1.0, 2.0, 3.0, 4.0).unwrap();
        viewport.commit();

        let mut query = SurfaceOperation::Viewport {
            source: None,
            destination: None,
        };
        assert!(viewport.run_operation(&mut query));
        assert_eq!(
            query,
            SurfaceOperation::Viewport {
                source: Some(RectF {
                    x: 1.0,
                    y: 2.0,
                    width: 3.0,
                    height: 4.0
                }),
                destination: None,
            }
        );

        let mut scale = SurfaceOperation::PreferredScale {
            scale: 1.0,
            sent: None,
        };
        assert!(!viewport.run_operation(&mut scale));
    }
}
