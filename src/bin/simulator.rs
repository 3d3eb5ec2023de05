use anyhow::Result;
use bytes::{BufMut, BytesMut};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tello_pilot::bitrate::BitrateTier;
use tello_pilot::link::error::DroneLinkError;
use tello_pilot::link::{DroneLink, FlightData, LinkEvent};
use tello_pilot::media::error::MediaError;
use tello_pilot::media::{MediaFeedback, MediaTrack};
use tello_pilot::motion::{PlanarBody, TranslationVector, VerticalBody};
use tello_pilot::state_machine::access_unit::START_CODE;
use tello_pilot::video::VideoFrame;
use tello_pilot::{DroneId, Pilot, PilotConfig};
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

/// Largest payload the drone puts in one video packet.
const PACKET_PAYLOAD: usize = 1460;
const FRAMES_PER_GOP: u64 = 30;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let drone_id = std::env::var("DRONE_ID").unwrap_or_else(|_| "tello-sim".to_string());
    let seconds: u64 = std::env::var("SIM_SECONDS")
        .unwrap_or_else(|_| "8".to_string())
        .parse()?;

    let link = Arc::new(SimulatedLink::default());
    let pilot = Arc::new(Pilot::new(
        DroneId::from(drone_id.clone()),
        link.clone(),
        PilotConfig::default(),
    ));

    info!(drone_id = %drone_id, seconds, "Starting simulated flight");

    let (event_tx, event_rx) = mpsc::channel(64);
    let events = tokio::spawn({
        let pilot = Arc::clone(&pilot);
        async move { pilot.run_link_events(event_rx).await }
    });

    link.connected.store(true, Ordering::SeqCst);
    event_tx.send(LinkEvent::Connected).await?;
    while !pilot.is_connected() {
        tokio::task::yield_now().await;
    }
    pilot.takeoff()?;

    let track = Arc::new(LoggingTrack::default());
    let (feedback_tx, feedback_rx) = mpsc::channel(8);
    let session_id = pilot
        .open_video(track.clone(), ReceiverStream::new(feedback_rx))
        .await;
    info!(session_id = %session_id, "Browser attached");

    let drone = tokio::spawn(simulate_drone(event_tx.clone()));
    let receiver = tokio::spawn(simulate_receiver(feedback_tx));
    let operator = tokio::spawn(simulate_operator(Arc::clone(&pilot)));

    tokio::time::sleep(Duration::from_secs(seconds)).await;

    operator.abort();
    drone.abort();
    receiver.abort();
    pilot.disconnect().await?;

    drop(event_tx);
    events.await?;

    info!(
        frames = track.frames.load(Ordering::SeqCst),
        bytes = track.bytes.load(Ordering::SeqCst),
        vector = ?pilot.current_vector(),
        "Simulation finished"
    );

    Ok(())
}

/// Emits an Annex-B stream at 30 fps cut into packets the way the drone sends it: every NAL
/// unit starts a new packet.
async fn simulate_drone(events: mpsc::Sender<LinkEvent>) {
    let mut rng = StdRng::from_os_rng();
    let mut ticker = interval(Duration::from_millis(33));
    let mut frame = 0u64;

    loop {
        ticker.tick().await;

        let nals: Vec<(u8, usize)> = if frame % FRAMES_PER_GOP == 0 {
            vec![(0x67, 12), (0x68, 4), (0x65, rng.random_range(8_000..20_000))]
        } else {
            vec![(0x41, rng.random_range(500..4_000))]
        };

        for (header, len) in nals {
            let mut nal = BytesMut::with_capacity(len + 5);
            nal.put_slice(&START_CODE);
            nal.put_u8(header);
            nal.extend((0..len).map(|_| rng.random::<u8>()));

            let mut nal = nal.freeze();
            while !nal.is_empty() {
                let packet = nal.split_to(nal.len().min(PACKET_PAYLOAD));
                if events.send(LinkEvent::VideoData(packet)).await.is_err() {
                    return;
                }
            }
        }

        if frame % 30 == 0 {
            let data = FlightData {
                battery_percentage: battery_after(frame),
                height_dm: 10,
            };
            if events.send(LinkEvent::FlightData(data)).await.is_err() {
                return;
            }
        }

        frame += 1;
    }
}

/// Battery level after `frame` frames, one percent every three seconds of video.
fn battery_after(frame: u64) -> u8 {
    100u8.saturating_sub(u8::try_from(frame / 90).unwrap_or(u8::MAX))
}

/// Reports a wandering bandwidth estimate and the odd lost picture.
async fn simulate_receiver(feedback: mpsc::Sender<MediaFeedback>) {
    let mut rng = StdRng::from_os_rng();
    let mut ticker = interval(Duration::from_secs(1));

    loop {
        ticker.tick().await;

        let event = if rng.random_bool(0.2) {
            MediaFeedback::PictureLoss
        } else {
            MediaFeedback::BandwidthEstimate {
                bits_per_second: rng.random_range(500_000.0..5_000_000.0),
            }
        };
        if feedback.send(event).await.is_err() {
            return;
        }
    }
}

/// Holds the stick forward, loses the connection, then climbs and releases properly.
async fn simulate_operator(pilot: Arc<Pilot>) {
    let mut ticker = interval(Duration::from_millis(50));

    for _ in 0..40 {
        ticker.tick().await;
        pilot.move_planar(PlanarBody { x: 0.0, y: 0.6 });
    }

    info!("Operator went silent");
    tokio::time::sleep(Duration::from_secs(1)).await;

    for _ in 0..20 {
        ticker.tick().await;
        pilot.move_vertical(VerticalBody { z: 0.4, r: 0.1 });
    }
    pilot.move_vertical(VerticalBody::default());
    info!("Operator released the stick");
}

#[derive(Debug, Default)]
struct SimulatedLink {
    connected: AtomicBool,
}

impl SimulatedLink {
    fn ensure_connected(&self) -> Result<(), DroneLinkError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DroneLinkError::NotConnected)
        }
    }
}

impl DroneLink for SimulatedLink {
    fn set_vector(&self, vector: TranslationVector) -> Result<(), DroneLinkError> {
        self.ensure_connected()?;
        debug!(?vector, "Drone vector");
        Ok(())
    }

    fn start_video(&self) -> Result<(), DroneLinkError> {
        self.ensure_connected()?;
        debug!("Drone video (re)started");
        Ok(())
    }

    fn set_encoder_rate(&self, tier: BitrateTier) -> Result<(), DroneLinkError> {
        self.ensure_connected()?;
        debug!(%tier, "Drone encoder rate");
        Ok(())
    }

    fn takeoff(&self) -> Result<(), DroneLinkError> {
        self.ensure_connected()?;
        info!("Drone taking off");
        Ok(())
    }

    fn land(&self) -> Result<(), DroneLinkError> {
        self.ensure_connected()?;
        info!("Drone landing");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct LoggingTrack {
    frames: AtomicU64,
    bytes: AtomicU64,
    closed: AtomicBool,
}

impl MediaTrack for LoggingTrack {
    fn write_frame(&self, frame: VideoFrame, duration: Duration) -> Result<(), MediaError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(MediaError::TrackClosed);
        }

        let frames = self.frames.fetch_add(1, Ordering::SeqCst) + 1;
        self.bytes.fetch_add(frame.len() as u64, Ordering::SeqCst);
        if frames % FRAMES_PER_GOP == 0 {
            info!(frames, len = frame.len(), ?duration, "Frames sent to browser");
        }
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        info!("Peer connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battery_drains_to_empty_and_stays_there() {
        assert_eq!(battery_after(0), 100);
        assert_eq!(battery_after(90 * 40), 60);
        assert_eq!(battery_after(90 * 100), 0);
        // Past the u8 range of drained percent.
        assert_eq!(battery_after(90 * 300), 0);
        assert_eq!(battery_after(u64::MAX), 0);
    }
}
