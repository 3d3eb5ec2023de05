//! Regrouping of an arbitrary H.264 Annex-B byte stream into access units.
//!
//! The drone link cuts its byte stream wherever it likes, so chunk boundaries have nothing to do
//! with NAL unit boundaries. A new access unit starts precisely when a chunk begins with a start
//! code followed by a coded slice or a sequence parameter set, which is how the drone's encoder
//! starts every frame.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use tracing::warn;

use super::StateMachine;
use crate::video::VideoFrame;

/// The 4-byte Annex-B start code prefixing each NAL unit.
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

const NAL_TYPE_MASK: u8 = 0x1F;
const NAL_TYPE_SLICE: u8 = 1;
const NAL_TYPE_SPS: u8 = 7;

/// True iff `chunk` begins with the full start code.
pub fn is_boundary_start(chunk: &[u8]) -> bool {
    chunk.len() >= START_CODE.len() && chunk[..START_CODE.len()] == START_CODE
}

/// True iff `chunk` begins a NAL unit whose type opens a new access unit.
pub fn is_flush_trigger(chunk: &[u8]) -> bool {
    if !is_boundary_start(chunk) || chunk.len() <= START_CODE.len() {
        return false;
    }

    matches!(
        chunk[START_CODE.len()] & NAL_TYPE_MASK,
        NAL_TYPE_SLICE | NAL_TYPE_SPS
    )
}

pub enum AccessUnitInput {
    Chunk(Bytes),
    /// Emit whatever is buffered, used when a video session is torn down.
    Flush,
}

pub struct AccessUnitMachine {
    buffer: BytesMut,
    max_buffer_bytes: usize,
    dropped_bytes: u64,
    completed: VecDeque<VideoFrame>,
}

impl AccessUnitMachine {
    pub fn new(max_buffer_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_buffer_bytes,
            dropped_bytes: 0,
            completed: VecDeque::new(),
        }
    }

    /// Bytes of the access unit currently being assembled.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Total bytes discarded because the pending access unit outgrew the cap.
    pub fn dropped_bytes(&self) -> u64 {
        self.dropped_bytes
    }

    fn feed(&mut self, chunk: Bytes) {
        if is_flush_trigger(&chunk) {
            // The new access unit starts with the triggering chunk itself.
            let finished = std::mem::replace(&mut self.buffer, BytesMut::from(&chunk[..]));
            if !finished.is_empty() {
                self.completed.push_back(VideoFrame::new(finished.freeze()));
            }
        } else {
            self.buffer.extend_from_slice(&chunk);
        }

        self.enforce_cap();
    }

    fn flush(&mut self) {
        if !self.buffer.is_empty() {
            let finished = std::mem::take(&mut self.buffer);
            self.completed.push_back(VideoFrame::new(finished.freeze()));
        }
    }

    fn enforce_cap(&mut self) {
        if self.buffer.len() <= self.max_buffer_bytes {
            return;
        }

        warn!(
            pending = self.buffer.len(),
            max = self.max_buffer_bytes,
            "Access unit exceeded size cap without a boundary, dropping it"
        );
        self.dropped_bytes += self.buffer.len() as u64;
        self.buffer = BytesMut::new();
    }

    fn poll_frame(&mut self) -> Option<VideoFrame> {
        self.completed.pop_front()
    }
}

impl StateMachine for AccessUnitMachine {
    type Input = AccessUnitInput;
    type Output = VideoFrame;

    fn process_input(&mut self, input: Self::Input) {
        match input {
            AccessUnitInput::Chunk(chunk) => self.feed(chunk),
            AccessUnitInput::Flush => self.flush(),
        }
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.poll_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const CAP: usize = 1024 * 1024;

    fn nal(nal_type: u8, body: &[u8]) -> Bytes {
        let mut out = START_CODE.to_vec();
        out.push(0x60 | nal_type);
        out.extend_from_slice(body);
        Bytes::from(out)
    }

    fn drain(machine: &mut AccessUnitMachine) -> Vec<Bytes> {
        std::iter::from_fn(|| machine.poll_output())
            .map(VideoFrame::into_bytes)
            .collect()
    }

    #[test]
    fn test_boundary_predicates() {
        assert!(!is_boundary_start(&[0, 0, 0]));
        assert!(is_boundary_start(&[0, 0, 0, 1]));
        assert!(!is_boundary_start(&[0, 0, 1, 0x67]));

        // Start code alone has no NAL header to inspect.
        assert!(!is_flush_trigger(&[0, 0, 0, 1]));
        assert!(is_flush_trigger(&nal(NAL_TYPE_SLICE, b"")));
        assert!(is_flush_trigger(&nal(NAL_TYPE_SPS, b"x")));
        // IDR slices and PPS follow their SPS inside the same access unit.
        assert!(!is_flush_trigger(&nal(5, b"x")));
        assert!(!is_flush_trigger(&nal(8, b"x")));
        // Only the low five bits carry the type.
        assert!(is_flush_trigger(&[0, 0, 0, 1, 0xE7]));
    }

    #[test]
    fn test_sps_then_slice_scenario() {
        let mut machine = AccessUnitMachine::new(CAP);
        let sps = nal(NAL_TYPE_SPS, b"C");
        let slice = nal(NAL_TYPE_SLICE, b"E");

        for chunk in [
            Bytes::from_static(b"AB"),
            sps.clone(),
            Bytes::from_static(b"D"),
            slice.clone(),
        ] {
            machine.process_input(AccessUnitInput::Chunk(chunk));
        }

        let mut second = sps.to_vec();
        second.extend_from_slice(b"D");

        // The stray leading bytes surface as their own frame once the SPS arrives.
        let frames = drain(&mut machine);
        assert_eq!(frames, vec![Bytes::from_static(b"AB"), Bytes::from(second)]);
        assert_eq!(frames.concat(), [&b"AB"[..], &sps[..], &b"D"[..]].concat());
        assert_eq!(machine.pending_len(), slice.len());

        machine.process_input(AccessUnitInput::Flush);
        assert_eq!(drain(&mut machine), vec![slice]);
        assert_eq!(machine.pending_len(), 0);
    }

    #[test]
    fn test_leading_bytes_wait_for_first_boundary() {
        let mut machine = AccessUnitMachine::new(CAP);
        machine.process_input(AccessUnitInput::Chunk(Bytes::from_static(b"garbage")));
        machine.process_input(AccessUnitInput::Chunk(nal(8, b"pps")));

        assert!(machine.poll_output().is_none());
        assert_eq!(machine.pending_len(), 7 + 8);
    }

    #[test]
    fn test_first_trigger_on_empty_buffer_emits_nothing() {
        let mut machine = AccessUnitMachine::new(CAP);
        machine.process_input(AccessUnitInput::Chunk(nal(NAL_TYPE_SPS, b"")));
        machine.process_input(AccessUnitInput::Chunk(Bytes::new()));

        assert!(machine.poll_output().is_none());
        assert_eq!(machine.pending_len(), 5);
    }

    #[test]
    fn test_flush_on_empty_buffer_is_silent() {
        let mut machine = AccessUnitMachine::new(CAP);
        machine.process_input(AccessUnitInput::Flush);
        assert!(machine.poll_output().is_none());
    }

    #[test]
    fn test_overflow_drops_pending_unit() {
        let mut machine = AccessUnitMachine::new(16);
        machine.process_input(AccessUnitInput::Chunk(nal(NAL_TYPE_SPS, b"0123456789")));
        machine.process_input(AccessUnitInput::Chunk(Bytes::from_static(b"0123456789")));

        assert_eq!(machine.pending_len(), 0);
        assert_eq!(machine.dropped_bytes(), 25);

        // Assembly resumes normally after the drop.
        machine.process_input(AccessUnitInput::Chunk(nal(NAL_TYPE_SLICE, b"a")));
        machine.process_input(AccessUnitInput::Chunk(nal(NAL_TYPE_SLICE, b"b")));
        assert_eq!(drain(&mut machine), vec![nal(NAL_TYPE_SLICE, b"a")]);
    }

    #[test]
    fn test_regrouping_is_lossless() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut machine = AccessUnitMachine::new(CAP);
        let mut input = Vec::new();
        let mut output = Vec::new();

        for _ in 0..500 {
            let chunk = match rng.random_range(0..4) {
                0 => nal(NAL_TYPE_SLICE, &[rng.random::<u8>(); 3]),
                1 => nal(NAL_TYPE_SPS, &[]),
                2 => Bytes::new(),
                _ => {
                    let len = rng.random_range(1..64);
                    Bytes::from((0..len).map(|_| rng.random::<u8>()).collect::<Vec<_>>())
                }
            };
            let was_trigger = is_flush_trigger(&chunk);
            let pending_before = machine.pending_len();

            input.extend_from_slice(&chunk);
            machine.process_input(AccessUnitInput::Chunk(chunk.clone()));

            let frames = drain(&mut machine);
            if was_trigger {
                assert_eq!(frames.len(), usize::from(pending_before > 0));
                assert_eq!(machine.pending_len(), chunk.len());
            } else {
                assert!(frames.is_empty());
                assert_eq!(machine.pending_len(), pending_before + chunk.len());
            }
            for frame in frames {
                output.extend_from_slice(&frame);
            }
        }

        machine.process_input(AccessUnitInput::Flush);
        for frame in drain(&mut machine) {
            output.extend_from_slice(&frame);
        }

        assert_eq!(output, input);
        assert_eq!(machine.dropped_bytes(), 0);
    }
}
