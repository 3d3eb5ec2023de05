//! Error types for operator requests on a [`Pilot`](super::Pilot).

use crate::drone::DroneId;
use crate::link::error::DroneLinkError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PilotError {
    /// The request arrived before the drone connected or after it went away.
    #[error("drone {drone_id} is not connected")]
    NotConnected { drone_id: DroneId },

    #[error(transparent)]
    Link(#[from] DroneLinkError),
}
