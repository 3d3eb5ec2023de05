//! The video path from drone link to media track.
//!
//! Chunks from the link are regrouped into access units by a [`VideoPipeline`], handed one at a
//! time through a [`FrameSink`] and written to the browser's track by [`forward_frames`].

mod pipeline;
mod sender;
mod sink;

use std::fmt;
use std::ops::Deref;

use bytes::Bytes;

pub use self::pipeline::VideoPipeline;
pub use self::sender::forward_frames;
pub use self::sink::{FrameSink, FrameStream, PushOutcome, frame_channel};

/// One complete encoded access unit.
#[derive(Clone, PartialEq, Eq)]
pub struct VideoFrame(Bytes);

impl VideoFrame {
    pub fn new(data: Bytes) -> Self {
        Self(data)
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl Deref for VideoFrame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrame")
            .field("len", &self.0.len())
            .finish()
    }
}
