//! Configuration management for the lipstick compositor
//!
//! This module handles loading, parsing, and validating configuration
//! from TOML files. It combines settings for the compositor core, the
//! output, the alien lifecycle protocol, D-Bus control and session start-up.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::orientation::{Orientation, OrientationLock};

/// Main configuration struct containing all compositor settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LipstickConfig {
    /// Window lifecycle and event loop settings
    #[serde(default)]
    pub compositor: CompositorConfig,

    /// Output geometry, scale and orientation
    #[serde(default)]
    pub display: DisplayConfig,

    /// Alien lifecycle protocol settings
    #[serde(default)]
    pub alien: AlienConfig,

    /// D-Bus control interface
    #[serde(default)]
    pub dbus: DbusConfig,

    /// Session activation at start-up
    #[serde(default)]
    pub session: SessionConfig,

    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompositorConfig {
    /// Turn right mouse button presses into a synthetic back key
    pub synthesize_back_event: bool,

    /// Whether frame callbacks are delivered at start-up
    pub updates_enabled: bool,

    /// Fixed Wayland socket name (`wayland-N` is picked automatically when unset)
    pub socket_name: Option<String>,

    /// Client dispatch period (milliseconds)
    pub dispatch_interval_ms: u64,

    /// Repaint period (milliseconds)
    pub frame_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    pub output_width: i32,
    pub output_height: i32,

    /// Logical output scale (1.0 = no scaling)
    pub scale: f64,

    /// Orientation used when the sensor reading is undefined
    pub primary_orientation: Orientation,

    /// "dynamic" follows the sensor, anything else pins it
    pub orientation_lock: OrientationLock,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlienConfig {
    /// Advertise the `alien_manager` global
    pub enabled: bool,

    /// Liveness ping period for the topmost window (0 = disabled)
    pub ping_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DbusConfig {
    pub enabled: bool,
    pub service_name: String,
    pub object_path: String,

    /// Well-known name whose owner may call `setUpdatesEnabled`
    pub authorized_service: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub activation_max_attempts: u32,
    pub activation_retry_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable debug logging
    pub debug: bool,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            synthesize_back_event: false,
            updates_enabled: true,
            socket_name: None,
            dispatch_interval_ms: 4,
            frame_interval_ms: 16,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            output_width: 1080,
            output_height: 1920,
            scale: 1.0,
            primary_orientation: Orientation::Portrait,
            orientation_lock: OrientationLock::Dynamic,
        }
    }
}

impl Default for AlienConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ping_interval_ms: 0,
        }
    }
}

impl Default for DbusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_name: "org.nemomobile.compositor".to_string(),
            object_path: "/".to_string(),
            authorized_service: "com.nokia.mce".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            activation_max_attempts: 10,
            activation_retry_interval_ms: 1000,
        }
    }
}

/// Expands a leading `~` to `$HOME`.
pub fn expand_home(path: &Path) -> Result<PathBuf> {
    if path.to_string_lossy().starts_with('~') {
        let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
        let rest = path.strip_prefix("~").unwrap_or(path);
        Ok(Path::new(&home).join(rest))
    } else {
        Ok(path.to_path_buf())
    }
}

impl LipstickConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let expanded_path = expand_home(path.as_ref())?;

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        let config: LipstickConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", expanded_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.display.scale > 0.0 && self.display.scale <= 8.0) {
            anyhow::bail!(
                "Invalid display.scale {}: must be greater than 0.0 and at most 8.0",
                self.display.scale
            );
        }

        if self.display.output_width <= 0 || self.display.output_height <= 0 {
            anyhow::bail!(
                "Invalid display.output_width/output_height {}x{}: must be positive",
                self.display.output_width,
                self.display.output_height
            );
        }

        if self.compositor.dispatch_interval_ms == 0 {
            anyhow::bail!("Invalid compositor.dispatch_interval_ms: must be at least 1");
        }

        if self.compositor.frame_interval_ms == 0 {
            anyhow::bail!("Invalid compositor.frame_interval_ms: must be at least 1");
        }

        if let Some(name) = &self.compositor.socket_name {
            if name.is_empty() || name.contains('/') {
                anyhow::bail!("Invalid compositor.socket_name: {:?}", name);
            }
        }

        if self.session.activation_max_attempts == 0 {
            anyhow::bail!("Invalid session.activation_max_attempts: must be at least 1");
        }

        if self.dbus.enabled {
            if self.dbus.service_name.is_empty() {
                anyhow::bail!("Invalid dbus.service_name: must not be empty");
            }
            if !self.dbus.object_path.starts_with('/') {
                anyhow::bail!("Invalid dbus.object_path: {}", self.dbus.object_path);
            }
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }
}
