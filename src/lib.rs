//! # Lipstick Compositor Library
//!
//! Window and surface lifecycle core of a mobile Wayland compositor.
//!
//! ## Architecture
//!
//! - `compositor`: the single [`LipstickCompositor`] instance: surface
//!   lifecycle, topmost window, focus, update gating, listeners
//! - `window`: window registry (ids, mapped/ghost tracking, stacking)
//! - `surface`: per-surface state and the extension handler chain
//! - `protocol`: alien, viewport and fractional scale extension state
//! - `input`, `orientation`: back-key synthesis and screen orientation
//! - `dbus`, `session`: control interface and login session activation
//! - `server`: the `wayland-server` frontend and event loop
//! - `config`, `logging`, `error`: ambient plumbing
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lipstick::{CompositorServer, LipstickConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LipstickConfig::default();
//!     let server = CompositorServer::new(&config)?;
//!     server.run()
//! }
//! ```

pub mod compositor;
pub mod config;
pub mod dbus;
pub mod error;
pub mod input;
pub mod logging;
pub mod orientation;
pub mod protocol;
pub mod serial;
pub mod server;
pub mod session;
pub mod surface;
pub mod tasks;
pub mod window;

// Re-export main types for easy access
pub use compositor::{CompositorEvent, DisplayState, LipstickCompositor, WindowModel};
pub use config::LipstickConfig;
pub use error::{CompositorError, CompositorResult};
pub use server::CompositorServer;
pub use surface::{SurfaceCommit, SurfaceId};
pub use window::{Window, WindowId};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
