//! Error types shared by the compositor core

use thiserror::Error;

use crate::surface::SurfaceId;

#[derive(Debug, Error)]
pub enum CompositorError {
    #[error("a compositor instance is already running in this process")]
    AlreadyRunning,

    #[error("invalid viewport values: {0}")]
    BadValue(String),

    #[error("surface {0} already has a viewport object")]
    ViewportExists(SurfaceId),

    #[error("surface {0} already has a fractional scale object")]
    FractionalScaleExists(SurfaceId),

    #[error("D-Bus error: {0}")]
    Dbus(String),
}

pub type CompositorResult<T> = std::result::Result<T, CompositorError>;
