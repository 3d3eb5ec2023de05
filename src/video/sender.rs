use std::sync::Arc;

use futures::StreamExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::FrameStream;
use crate::media::MediaTrack;
use crate::media::error::MediaError;

/// Drain `frames` into `track` until the sink closes, then close the track.
///
/// Each frame is written with the time elapsed since the previous write as its duration, the
/// first one with the time since forwarding started. Returns the number of frames written.
pub async fn forward_frames(frames: FrameStream, track: Arc<dyn MediaTrack>) -> u64 {
    let frames = frames.into_stream();
    tokio::pin!(frames);

    let mut latest = Instant::now();
    let mut written = 0u64;

    while let Some(frame) = frames.next().await {
        let len = frame.len();
        match track.write_frame(frame, latest.elapsed()) {
            Ok(()) => written += 1,
            Err(MediaError::TrackClosed) => {
                info!("Media track closed, stop forwarding frames");
                break;
            }
            Err(e) => warn!(error = %e, len, "Failed to write frame"),
        }
        latest = Instant::now();
    }

    debug!(written, "Frame channel closed");
    track.close();
    written
}
