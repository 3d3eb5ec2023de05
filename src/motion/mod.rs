//! Operator motion commands and the drone's translation vector.

mod vector;
mod watchdog;

use serde::Deserialize;

pub use self::vector::VectorController;
pub use self::watchdog::MotionWatchdog;

/// A command from one of the two joystick endpoints.
///
/// Each endpoint only ever carries one axis pair, the other pair of the drone's vector is left
/// untouched when the command is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionCommand {
    /// Horizontal translation, `x` forward and `y` sideways.
    Planar { x: f32, y: f32 },
    /// Climb rate `z` and yaw rate `r`.
    Vertical { z: f32, r: f32 },
}

impl MotionCommand {
    /// Both components exactly zero, the operator released the stick.
    pub fn is_stop(&self) -> bool {
        match *self {
            MotionCommand::Planar { x, y } => x == 0.0 && y == 0.0,
            MotionCommand::Vertical { z, r } => z == 0.0 && r == 0.0,
        }
    }
}

/// Body of the planar endpoint, in joystick coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlanarBody {
    pub x: f32,
    pub y: f32,
}

/// The joystick's vertical axis drives the drone forward, its horizontal axis sideways.
impl From<PlanarBody> for MotionCommand {
    fn from(body: PlanarBody) -> Self {
        MotionCommand::Planar {
            x: body.y,
            y: body.x,
        }
    }
}

/// Body of the vertical/yaw endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct VerticalBody {
    pub z: f32,
    pub r: f32,
}

impl From<VerticalBody> for MotionCommand {
    fn from(body: VerticalBody) -> Self {
        MotionCommand::Vertical {
            z: body.z,
            r: body.r,
        }
    }
}

/// The full four-axis vector last written to the drone.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TranslationVector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub r: f32,
}

impl TranslationVector {
    pub const ZERO: TranslationVector = TranslationVector {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        r: 0.0,
    };

    /// Overwrite the axis pair carried by `command`, keeping the other pair.
    pub fn merge(&mut self, command: MotionCommand) {
        match command {
            MotionCommand::Planar { x, y } => {
                self.x = x;
                self.y = y;
            }
            MotionCommand::Vertical { z, r } => {
                self.z = z;
                self.r = r;
            }
        }
    }
}
