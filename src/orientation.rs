//! Screen orientation tracking
//!
//! Raw accelerometer readings are reduced to one of four cardinal
//! orientations. Face-up/face-down readings keep the previous orientation and
//! an undefined reading resets to the configured primary orientation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    Portrait,
    Landscape,
    InvertedPortrait,
    InvertedLandscape,
}

/// Sensor readings as reported by the orientation sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorReading {
    TopUp,
    TopDown,
    LeftUp,
    RightUp,
    FaceUp,
    FaceDown,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrientationLock {
    Dynamic,
    Portrait,
    Landscape,
    InvertedPortrait,
    InvertedLandscape,
}

impl OrientationLock {
    pub fn locked_orientation(self) -> Option<Orientation> {
        match self {
            OrientationLock::Dynamic => None,
            OrientationLock::Portrait => Some(Orientation::Portrait),
            OrientationLock::Landscape => Some(Orientation::Landscape),
            OrientationLock::InvertedPortrait => Some(Orientation::InvertedPortrait),
            OrientationLock::InvertedLandscape => Some(Orientation::InvertedLandscape),
        }
    }
}

impl SensorReading {
    /// Maps the reading; `None` means "keep the previous orientation".
    pub fn to_orientation(self, primary: Orientation) -> Option<Orientation> {
        match self {
            SensorReading::TopUp => Some(Orientation::Portrait),
            SensorReading::TopDown => Some(Orientation::InvertedPortrait),
            SensorReading::LeftUp => Some(Orientation::InvertedLandscape),
            SensorReading::RightUp => Some(Orientation::Landscape),
            SensorReading::FaceUp | SensorReading::FaceDown => None,
            SensorReading::Undefined => Some(primary),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrientationState {
    primary: Orientation,
    lock: OrientationLock,
    sensor: Orientation,
    screen: Orientation,
}

impl OrientationState {
    pub fn new(primary: Orientation, lock: OrientationLock) -> Self {
        let initial = lock.locked_orientation().unwrap_or(primary);
        Self {
            primary,
            lock,
            sensor: initial,
            screen: initial,
        }
    }

    pub fn primary(&self) -> Orientation {
        self.primary
    }

    pub fn sensor(&self) -> Orientation {
        self.sensor
    }

    pub fn screen(&self) -> Orientation {
        self.screen
    }

    /// Applies a sensor reading. Returns the new sensor orientation if it
    /// changed.
    pub fn apply_reading(&mut self, reading: SensorReading) -> Option<Orientation> {
        let next = match self.lock.locked_orientation() {
            Some(locked) => locked,
            None => reading.to_orientation(self.primary)?,
        };
        if next == self.sensor {
            return None;
        }
        self.sensor = next;
        Some(next)
    }

    /// Sets the orientation chosen by the UI. Returns true on change.
    pub fn set_screen(&mut self, orientation: Orientation) -> bool {
        if orientation == self.screen {
            return false;
        }
        self.screen = orientation;
        true
    }
}
