//! Control loops for tele-operating a Tello-class quadcopter from a browser.
//!
//! The drone link and the media transport are external. This crate glues them together:
//!
//! - [`video`] regroups the drone's H.264 byte stream into access units and hands them to the
//!   media track one at a time.
//! - [`bitrate`] turns the receiver's bandwidth estimates into encoder rate changes.
//! - [`motion`] applies the operator's joystick commands and forces the drone to a standstill
//!   when they stop arriving.
//! - [`pilot`] ties them to one connected drone and its video sessions.

pub mod bitrate;
pub mod config;
pub mod drone;
pub mod link;
pub mod media;
pub mod motion;
pub mod pilot;
pub mod state_machine;
pub mod video;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::PilotConfig;
pub use drone::DroneId;
pub use pilot::Pilot;
