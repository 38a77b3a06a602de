//! Protocol extension state
//!
//! This module holds the protocol-independent state of the Wayland
//! extensions the compositor implements:
//!
//! - **alien**: app-lifecycle extension (title, visibility requests,
//!   configure/ack handshake, ping/pong liveness, OOM score hints)
//! - **viewport**: `wp_viewport` source crop and destination size
//! - **fractional_scale**: `wp_fractional_scale_v1` preferred scale
//!
//! Wire objects are addressed by ids allocated by the core. Outgoing events
//! are queued as [`ProtocolEvent`]s and written to the matching resources by
//! the Wayland frontend.

pub mod alien;
pub mod fractional_scale;
pub mod generated;
pub mod viewport;

use std::fmt;

use crate::surface::{CallbackId, ExtensionObjectId, SurfaceId};

pub use alien::{AlienLifecycle, AlienState, StateRequestOutcome};
pub use fractional_scale::{wire_scale, FractionalScale};
pub use viewport::Viewport;

macro_rules! object_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

object_id!(
    /// A bound `alien_manager` global.
    AlienManagerId,
    "alien_manager"
);
object_id!(AlienClientId, "alien_client");
object_id!(AlienSurfaceId, "alien_surface");

/// Event the frontend must write to a client resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    AlienPing {
        manager: AlienManagerId,
        serial: u32,
    },
    AlienOomScore {
        client: AlienClientId,
        score: i32,
    },
    AlienConfigure {
        surface: AlienSurfaceId,
        width: i32,
        height: i32,
        states: AlienState,
        serial: u32,
    },
    AlienClose {
        surface: AlienSurfaceId,
    },
    /// `wp_fractional_scale_v1.preferred_scale`, value in 1/120ths
    PreferredScale {
        object: ExtensionObjectId,
        scale: u32,
    },
    FrameDone {
        callback: CallbackId,
        time: u32,
    },
    BufferRelease {
        surface: SurfaceId,
    },
}
