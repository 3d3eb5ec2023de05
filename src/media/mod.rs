//! The boundary to the media transport that carries video to the browser.

pub mod error;

use std::time::Duration;

use crate::video::VideoFrame;

use self::error::MediaError;

/// Outbound side of the browser's video track.
pub trait MediaTrack: Send + Sync + 'static {
    /// Send one access unit, displayed for `duration` before the next one.
    fn write_frame(&self, frame: VideoFrame, duration: Duration) -> Result<(), MediaError>;

    /// Tear down the peer connection once no more frames will follow.
    fn close(&self);
}

/// Receiver feedback delivered by the media transport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaFeedback {
    /// Receiver estimated maximum bitrate.
    BandwidthEstimate { bits_per_second: f64 },
    /// The receiver lost a picture and needs a keyframe.
    PictureLoss,
}
