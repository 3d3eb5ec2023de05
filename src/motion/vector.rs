use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::warn;

use super::{MotionCommand, TranslationVector};
use crate::link::DroneLink;

/// The single writer of the drone's translation vector.
///
/// Both joystick endpoints and the watchdog's forced stop go through here. The merge and the
/// write to the link happen under one lock, so a concurrent planar update, vertical update and
/// forced stop can never leave the drone with axes from different writes.
pub struct VectorController {
    link: Arc<dyn DroneLink>,
    current: Mutex<TranslationVector>,
}

impl VectorController {
    pub fn new(link: Arc<dyn DroneLink>) -> Self {
        Self {
            link,
            current: Mutex::new(TranslationVector::ZERO),
        }
    }

    pub fn current(&self) -> TranslationVector {
        *self.current.lock().expect("vector lock poisoned")
    }

    /// Overwrite the axis pair carried by `command` and send the full vector.
    pub fn apply(&self, command: MotionCommand) {
        self.write(|vector| vector.merge(command));
    }

    /// Zero all four axes, whatever endpoint last wrote them.
    pub fn force_zero(&self) {
        self.write(|vector| *vector = TranslationVector::ZERO);
    }

    fn write(&self, update: impl FnOnce(&mut TranslationVector)) {
        let mut current = self.current.lock().expect("vector lock poisoned");
        update(&mut current);

        if let Err(e) = self.link.set_vector(*current) {
            warn!(error = %e, vector = ?*current, "Failed to set drone vector");
        }
    }
}

impl fmt::Debug for VectorController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorController")
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}
