//! Recording fakes of the drone link and the media track.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;

use crate::bitrate::BitrateTier;
use crate::link::DroneLink;
use crate::link::error::DroneLinkError;
use crate::media::MediaTrack;
use crate::media::error::MediaError;
use crate::motion::TranslationVector;
use crate::video::VideoFrame;

#[derive(Debug, Clone, PartialEq)]
pub enum LinkCall {
    SetVector(TranslationVector),
    StartVideo,
    SetEncoderRate(BitrateTier),
    TakeOff,
    Land,
}

/// A [`DroneLink`] that records every call, optionally failing all of them.
#[derive(Debug, Default)]
pub struct RecordingLink {
    calls: Mutex<Vec<(tokio::time::Instant, LinkCall)>>,
    failure: Option<DroneLinkError>,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: DroneLinkError) -> Self {
        Self {
            calls: Mutex::default(),
            failure: Some(error),
        }
    }

    pub fn calls(&self) -> Vec<LinkCall> {
        self.timed_calls().into_iter().map(|(_, call)| call).collect()
    }

    pub fn timed_calls(&self) -> Vec<(tokio::time::Instant, LinkCall)> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    pub fn vectors(&self) -> Vec<TranslationVector> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                LinkCall::SetVector(vector) => Some(vector),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: LinkCall) -> Result<(), DroneLinkError> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push((tokio::time::Instant::now(), call));

        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl DroneLink for RecordingLink {
    fn set_vector(&self, vector: TranslationVector) -> Result<(), DroneLinkError> {
        self.record(LinkCall::SetVector(vector))
    }

    fn start_video(&self) -> Result<(), DroneLinkError> {
        self.record(LinkCall::StartVideo)
    }

    fn set_encoder_rate(&self, tier: BitrateTier) -> Result<(), DroneLinkError> {
        self.record(LinkCall::SetEncoderRate(tier))
    }

    fn takeoff(&self) -> Result<(), DroneLinkError> {
        self.record(LinkCall::TakeOff)
    }

    fn land(&self) -> Result<(), DroneLinkError> {
        self.record(LinkCall::Land)
    }
}

/// A [`MediaTrack`] that records written frames with their durations.
#[derive(Debug, Default)]
pub struct RecordingTrack {
    frames: Mutex<Vec<(Bytes, Duration)>>,
    closed: AtomicBool,
}

impl RecordingTrack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<(Bytes, Duration)> {
        self.frames.lock().expect("frames lock poisoned").clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl MediaTrack for RecordingTrack {
    fn write_frame(&self, frame: VideoFrame, duration: Duration) -> Result<(), MediaError> {
        if self.is_closed() {
            return Err(MediaError::TrackClosed);
        }
        self.frames
            .lock()
            .expect("frames lock poisoned")
            .push((frame.into_bytes(), duration));
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
