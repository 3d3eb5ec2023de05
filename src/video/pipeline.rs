use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::trace;

use super::sink::{FrameSink, PushOutcome};
use crate::state_machine::StateMachine;
use crate::state_machine::access_unit::{AccessUnitInput, AccessUnitMachine};

/// Runner of the [`AccessUnitMachine`] for one video session.
///
/// The lock is held while finished frames are pushed, so chunks fed from concurrent contexts
/// are still regrouped and delivered in the order they acquired it.
pub struct VideoPipeline {
    machine: Mutex<AccessUnitMachine>,
    sink: FrameSink,
}

impl VideoPipeline {
    pub fn new(sink: FrameSink, max_access_unit_bytes: usize) -> Self {
        Self {
            machine: Mutex::new(AccessUnitMachine::new(max_access_unit_bytes)),
            sink,
        }
    }

    /// Feed one chunk from the drone link, pushing the access unit it completes, if any.
    pub async fn feed(&self, chunk: Bytes) {
        self.process(AccessUnitInput::Chunk(chunk)).await;
    }

    /// Push the partially assembled access unit, if any.
    pub async fn flush(&self) {
        self.process(AccessUnitInput::Flush).await;
    }

    /// Stop handing frames to the consumer. Later feeds still regroup but discard their output.
    pub fn close(&self) {
        self.sink.close();
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_closed()
    }

    pub async fn pending_len(&self) -> usize {
        self.machine.lock().await.pending_len()
    }

    pub async fn dropped_bytes(&self) -> u64 {
        self.machine.lock().await.dropped_bytes()
    }

    async fn process(&self, input: AccessUnitInput) {
        let mut machine = self.machine.lock().await;
        machine.process_input(input);

        while let Some(frame) = machine.poll_output() {
            let len = frame.len();
            if self.sink.push(frame).await == PushOutcome::Closed {
                trace!(len, "Video sink closed, discarding access unit");
            }
        }
    }
}
