use std::sync::{Arc, Mutex, MutexGuard};

use futures::Stream;
use tokio::sync::{Notify, mpsc};
use tracing::trace;

use super::VideoFrame;

/// Result of a [`FrameSink::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Delivered,
    /// The sink was closed, the frame was discarded.
    Closed,
}

enum SinkState {
    Open(mpsc::Sender<VideoFrame>),
    Closed,
}

struct SinkShared {
    state: Mutex<SinkState>,
    closed: Notify,
}

impl SinkShared {
    fn lock_state(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().expect("sink state lock poisoned")
    }

    fn is_closed(&self) -> bool {
        matches!(*self.lock_state(), SinkState::Closed)
    }

    fn sender(&self) -> Option<mpsc::Sender<VideoFrame>> {
        match &*self.lock_state() {
            SinkState::Open(tx) => Some(tx.clone()),
            SinkState::Closed => None,
        }
    }
}

/// Producer half of a single-slot frame handoff.
///
/// At most one frame waits between producer and consumer, so a stalled consumer blocks
/// [`push`](FrameSink::push). Once closed, every push is a no-op reporting
/// [`PushOutcome::Closed`]. Dropping the sink closes it.
pub struct FrameSink {
    shared: Arc<SinkShared>,
}

/// Consumer half of a [`FrameSink`], yielding frames in push order until the sink closes.
pub struct FrameStream {
    rx: mpsc::Receiver<VideoFrame>,
    shared: Arc<SinkShared>,
}

pub fn frame_channel() -> (FrameSink, FrameStream) {
    let (tx, rx) = mpsc::channel(1);
    let shared = Arc::new(SinkShared {
        state: Mutex::new(SinkState::Open(tx)),
        closed: Notify::new(),
    });

    (
        FrameSink {
            shared: Arc::clone(&shared),
        },
        FrameStream { rx, shared },
    )
}

impl FrameSink {
    /// Hand `frame` to the consumer, waiting while the previous frame is still unclaimed.
    ///
    /// Returns [`PushOutcome::Closed`] without blocking when the sink is already closed, and
    /// wakes up with the same outcome when it gets closed while waiting.
    pub async fn push(&self, frame: VideoFrame) -> PushOutcome {
        // Registered before the state check so a concurrent close cannot slip in between.
        let closed = self.shared.closed.notified();
        tokio::pin!(closed);
        closed.as_mut().enable();

        let Some(tx) = self.shared.sender() else {
            trace!(len = frame.len(), "Frame pushed after close, discarding");
            return PushOutcome::Closed;
        };

        tokio::select! {
            biased;
            _ = &mut closed => PushOutcome::Closed,
            permit = tx.reserve() => match permit {
                Ok(permit) => {
                    // Sent under the state lock, a close either sees the frame queued or
                    // happened first and the frame is dropped.
                    let state = self.shared.lock_state();
                    if matches!(*state, SinkState::Closed) {
                        return PushOutcome::Closed;
                    }
                    permit.send(frame);
                    PushOutcome::Delivered
                }
                // The consumer is gone, nobody will ever read.
                Err(_) => PushOutcome::Closed,
            },
        }
    }

    /// Close the sink. Idempotent.
    pub fn close(&self) {
        let mut state = self.shared.lock_state();
        if matches!(*state, SinkState::Open(_)) {
            *state = SinkState::Closed;
            self.shared.closed.notify_waiters();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

impl Drop for FrameSink {
    fn drop(&mut self) {
        self.close();
    }
}

impl FrameStream {
    /// The next frame, or `None` once the sink is closed and the handed over frame is drained.
    pub async fn next(&mut self) -> Option<VideoFrame> {
        let closed = self.shared.closed.notified();
        tokio::pin!(closed);
        closed.as_mut().enable();

        if self.shared.is_closed() {
            return self.rx.try_recv().ok();
        }

        tokio::select! {
            biased;
            frame = self.rx.recv() => frame,
            _ = &mut closed => self.rx.try_recv().ok(),
        }
    }

    pub fn into_stream(mut self) -> impl Stream<Item = VideoFrame> + Send {
        async_stream::stream! {
            while let Some(frame) = self.next().await {
                yield frame;
            }
        }
    }
}
