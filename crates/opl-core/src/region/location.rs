//! Location source seam

use super::Coordinates;
use parking_lot::RwLock;

/// Supplies the device's current position
pub trait LocationProvider: Send + Sync {
    /// Latest known position, if any
    fn current(&self) -> Option<Coordinates>;
}

/// Location set by hand: from config, the command line, or a test
#[derive(Debug, Default)]
pub struct FixedLocation {
    position: RwLock<Option<Coordinates>>,
}

impl FixedLocation {
    /// Create reporting `position`
    pub fn new(position: Option<Coordinates>) -> Self {
        Self {
            position: RwLock::new(position),
        }
    }

    /// Move to `position`
    pub fn set(&self, position: Option<Coordinates>) {
        *self.position.write() = position;
    }
}

impl LocationProvider for FixedLocation {
    fn current(&self) -> Option<Coordinates> {
        *self.position.read()
    }
}
