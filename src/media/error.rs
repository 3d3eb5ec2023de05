//! Error types for the media track.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    /// The peer connection behind the track is gone.
    #[error("media track is closed")]
    TrackClosed,

    #[error("failed to write sample: {0}")]
    Write(String),
}
