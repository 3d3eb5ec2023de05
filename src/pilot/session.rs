use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::bitrate::BitrateController;
use crate::media::{MediaFeedback, MediaTrack};
use crate::video::{VideoPipeline, forward_frames, frame_channel};

#[derive(Clone, Hash, PartialEq, Eq)]
pub struct VideoSessionId(Arc<Uuid>);

impl VideoSessionId {
    pub fn generate() -> Self {
        Self(Arc::new(Uuid::new_v4()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Debug for VideoSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VideoSessionId({})", self.0)
    }
}

impl fmt::Display for VideoSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One browser video session, from its offer until video is switched off.
///
/// Owns the reassembly pipeline, the task forwarding finished frames to the media track and the
/// task routing receiver feedback to the bitrate controller.
pub struct VideoSession {
    id: VideoSessionId,
    pipeline: Arc<VideoPipeline>,
    sender: Mutex<Option<JoinHandle<u64>>>,
    feedback: JoinHandle<()>,
}

impl VideoSession {
    pub(crate) fn open<S>(
        track: Arc<dyn MediaTrack>,
        feedback: S,
        bitrate: Arc<BitrateController>,
        max_access_unit_bytes: usize,
    ) -> Self
    where
        S: Stream<Item = MediaFeedback> + Send + 'static,
    {
        let id = VideoSessionId::generate();
        let span = info_span!("video_session", session_id = %id);

        let (sink, frames) = frame_channel();
        let pipeline = Arc::new(VideoPipeline::new(sink, max_access_unit_bytes));

        let sender = tokio::spawn(forward_frames(frames, track).instrument(span.clone()));
        let feedback = tokio::spawn(
            async move {
                tokio::pin!(feedback);
                while let Some(event) = feedback.next().await {
                    bitrate.handle(event);
                }
                debug!("Media feedback stream ended");
            }
            .instrument(span),
        );

        info!(session_id = %id, "Video session opened");

        Self {
            id,
            pipeline,
            sender: Mutex::new(Some(sender)),
            feedback,
        }
    }

    pub fn id(&self) -> &VideoSessionId {
        &self.id
    }

    pub async fn feed(&self, chunk: Bytes) {
        self.pipeline.feed(chunk).await;
    }

    /// Hand over the partial access unit, stop both tasks and close the media track.
    ///
    /// The final flush waits at most `flush_grace` for the sender to take the frame.
    pub(crate) async fn close(&self, flush_grace: Duration) {
        if tokio::time::timeout(flush_grace, self.pipeline.flush())
            .await
            .is_err()
        {
            warn!(session_id = %self.id, "Media sender stalled, dropping last access unit");
        }

        self.pipeline.close();
        self.feedback.abort();

        let sender = self.sender.lock().expect("sender lock poisoned").take();
        if let Some(sender) = sender {
            match sender.await {
                Ok(frames) => info!(session_id = %self.id, frames, "Video session closed"),
                Err(e) => warn!(session_id = %self.id, error = %e, "Frame sender failed"),
            }
        }
    }
}

impl fmt::Debug for VideoSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoSession")
            .field("id", &self.id)
            .field("closed", &self.pipeline.is_closed())
            .finish_non_exhaustive()
    }
}

impl Drop for VideoSession {
    fn drop(&mut self) {
        self.feedback.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_unique() {
        let a = VideoSessionId::generate();
        let b = VideoSessionId::generate();

        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
        assert_eq!(a.to_string(), a.as_uuid().to_string());
        assert!(format!("{a:?}").starts_with("VideoSessionId("));
    }
}
