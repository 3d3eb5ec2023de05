//! The boundary to the drone link.
//!
//! The link owns connection, discovery and command framing. The core only relies on the outbound
//! calls of [`DroneLink`] and on the typed [`LinkEvent`] messages the link pushes onto a channel.

pub mod error;

use bytes::Bytes;

use crate::bitrate::BitrateTier;
use crate::motion::TranslationVector;

use self::error::DroneLinkError;

/// Outbound calls into a connected drone.
///
/// Calls are synchronous and expected to return promptly, they may be issued while the caller
/// holds a lock.
pub trait DroneLink: Send + Sync + 'static {
    /// Replace the drone's translation vector.
    fn set_vector(&self, vector: TranslationVector) -> Result<(), DroneLinkError>;

    /// Ask the drone to (re)start its video stream, which also yields a fresh keyframe.
    fn start_video(&self) -> Result<(), DroneLinkError>;

    /// Change the target rate of the drone's video encoder.
    fn set_encoder_rate(&self, tier: BitrateTier) -> Result<(), DroneLinkError>;

    fn takeoff(&self) -> Result<(), DroneLinkError>;

    fn land(&self) -> Result<(), DroneLinkError>;
}

/// Periodic flight telemetry reported by the drone.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightData {
    pub battery_percentage: u8,
    pub height_dm: i16,
}

/// Events pushed by the drone link, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Connected,
    /// A chunk of the H.264 byte stream, cut at arbitrary positions.
    VideoData(Bytes),
    FlightData(FlightData),
    Disconnected,
}
