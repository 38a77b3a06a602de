//! `wp_fractional_scale_v1` state

use crate::surface::{ExtensionKind, ExtensionObjectId, SurfaceExtension, SurfaceOperation};

/// Denominator of the fractional scale wire format.
pub const SCALE_DENOMINATOR: f64 = 120.0;

/// Wire value of a logical scale (1.0 -> 120, 1.5 -> 180).
pub fn wire_scale(scale: f64) -> u32 {
    (scale * SCALE_DENOMINATOR).round().max(0.0) as u32
}

#[derive(Debug)]
pub struct FractionalScale {
    object: ExtensionObjectId,
    last_sent: Option<u32>,
}

impl FractionalScale {
    pub fn new(object: ExtensionObjectId) -> Self {
        Self {
            object,
            last_sent: None,
        }
    }

    pub fn last_sent(&self) -> Option<u32> {
        self.last_sent
    }
}

impl SurfaceExtension for FractionalScale {
    fn kind(&self) -> ExtensionKind {
        ExtensionKind::FractionalScale
    }

    fn object(&self) -> ExtensionObjectId {
        self.object
    }

    /// Claims `PreferredScale` and reports the event to send, unless the
    /// client already has this value.
    fn run_operation(&mut self, operation: &mut SurfaceOperation) -> bool {
        match operation {
            SurfaceOperation::PreferredScale { scale, sent } => {
                let value = wire_scale(*scale);
                if self.last_sent != Some(value) {
                    self.last_sent = Some(value);
                    *sent = Some((self.object, value));
                }
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values() {
        assert_eq!(wire_scale(1.0), 120);
        assert_eq!(wire_scale(1.5), 180);
        assert_eq!(wire_scale(1.25), 150);
        assert_eq!(wire_scale(2.0), 240);
    }

    #[test]
    fn repeated_scale_is_sent_once() {
        let mut scale = FractionalScale::new(ExtensionObjectId(9));
        let mut op = SurfaceOperation::PreferredScale {
            scale: 1.5,
            sent: None,
        };
        assert!(scale.run_operation(&mut op));
        assert_eq!(
            op,
            SurfaceOperation::PreferredScale {
                scale: 1.5,
                sent: Some((ExtensionObjectId(9), 180)),
            }
        );

        let mut again = SurfaceOperation::PreferredScale {
            scale: 1.5,
            sent: None,
        };
        assert!(scale.run_operation(&mut again));
        assert!(matches!(
            again,
            SurfaceOperation::PreferredScale { sent: None, .. }
        ));
        assert_eq!(scale.last_sent(), Some(180));
    }
}
