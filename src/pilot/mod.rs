//! The context of one connected drone.
//!
//! A [`Pilot`] is created when the operator connects and lives until the drone goes away. It
//! injects the drone link into the motion, bitrate and video components and routes the link's
//! events to them.

pub mod error;
mod session;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info, warn};

use crate::bitrate::BitrateController;
use crate::config::PilotConfig;
use crate::drone::DroneId;
use crate::link::{DroneLink, FlightData, LinkEvent};
use crate::media::{MediaFeedback, MediaTrack};
use crate::motion::{
    MotionCommand, MotionWatchdog, PlanarBody, TranslationVector, VectorController, VerticalBody,
};
use crate::state_machine::watchdog::WatchdogState;

use self::error::PilotError;

pub use self::session::{VideoSession, VideoSessionId};

pub struct Pilot {
    drone_id: DroneId,
    config: PilotConfig,
    link: Arc<dyn DroneLink>,
    vector: Arc<VectorController>,
    watchdog: MotionWatchdog,
    bitrate: Arc<BitrateController>,
    connected: AtomicBool,
    video: Mutex<Option<Arc<VideoSession>>>,
    keepalive: Mutex<Option<JoinHandle<()>>>,
}

impl Pilot {
    /// Must be called from within a tokio runtime.
    pub fn new(drone_id: DroneId, link: Arc<dyn DroneLink>, config: PilotConfig) -> Self {
        let vector = Arc::new(VectorController::new(Arc::clone(&link)));
        let watchdog = MotionWatchdog::new(
            Arc::clone(&vector),
            config.watchdog_timeout,
            config.watchdog_period,
        );
        let bitrate = Arc::new(BitrateController::new(Arc::clone(&link)));

        Self {
            drone_id,
            config,
            link,
            vector,
            watchdog,
            bitrate,
            connected: AtomicBool::new(false),
            video: Mutex::new(None),
            keepalive: Mutex::new(None),
        }
    }

    pub fn drone_id(&self) -> &DroneId {
        &self.drone_id
    }

    pub fn current_vector(&self) -> TranslationVector {
        self.vector.current()
    }

    pub fn watchdog_state(&self) -> WatchdogState {
        self.watchdog.state()
    }

    /// Whether the link reported the drone connected and nobody disconnected it since.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn takeoff(&self) -> Result<(), PilotError> {
        self.ensure_connected()?;

        self.link.takeoff().inspect_err(|e| {
            warn!(drone_id = %self.drone_id, error = %e, "Failed to take off");
        })?;
        info!(drone_id = %self.drone_id, "Taking off");
        Ok(())
    }

    pub fn land(&self) -> Result<(), PilotError> {
        self.ensure_connected()?;

        self.link.land().inspect_err(|e| {
            warn!(drone_id = %self.drone_id, error = %e, "Failed to land");
        })?;
        info!(drone_id = %self.drone_id, "Landing");
        Ok(())
    }

    /// Land, give the drone `land_settle` to get down, then tear the session down.
    ///
    /// The teardown happens even when the landing command fails, the failure is returned
    /// afterwards.
    pub async fn disconnect(&self) -> Result<(), PilotError> {
        self.ensure_connected()?;

        self.watchdog.disarm();
        let landed = self.link.land();
        if let Err(e) = &landed {
            warn!(drone_id = %self.drone_id, error = %e, "Failed to land before disconnecting");
        }
        tokio::time::sleep(self.config.land_settle).await;

        info!(drone_id = %self.drone_id, "Operator disconnected the drone");
        self.teardown().await;
        landed.map_err(PilotError::from)
    }

    pub fn move_planar(&self, body: PlanarBody) {
        self.apply_motion(body.into());
    }

    pub fn move_vertical(&self, body: VerticalBody) {
        self.apply_motion(body.into());
    }

    /// Route one operator command through the shared watchdog to the drone.
    pub fn apply_motion(&self, command: MotionCommand) {
        self.watchdog
            .consume(command, |command| self.vector.apply(command));
    }

    /// Start a video session towards `track`, replacing any session already open.
    pub async fn open_video<S>(&self, track: Arc<dyn MediaTrack>, feedback: S) -> VideoSessionId
    where
        S: Stream<Item = MediaFeedback> + Send + 'static,
    {
        self.close_video().await;

        let session = Arc::new(VideoSession::open(
            track,
            feedback,
            Arc::clone(&self.bitrate),
            self.config.max_access_unit_bytes,
        ));
        let id = session.id().clone();
        *self.video.lock().expect("video lock poisoned") = Some(session);

        info!(drone_id = %self.drone_id, session_id = %id, "Video on");
        id
    }

    /// Close the open video session. Returns whether one was open.
    pub async fn close_video(&self) -> bool {
        let session = self.video.lock().expect("video lock poisoned").take();
        match session {
            Some(session) => {
                session.close(self.config.flush_grace).await;
                info!(drone_id = %self.drone_id, session_id = %session.id(), "Video off");
                true
            }
            None => false,
        }
    }

    pub fn video_session(&self) -> Option<VideoSessionId> {
        self.video
            .lock()
            .expect("video lock poisoned")
            .as_ref()
            .map(|session| session.id().clone())
    }

    /// Consume link events until the link drops its sender.
    pub async fn run_link_events(&self, mut events: mpsc::Receiver<LinkEvent>) {
        let mut battery_log = TelemetryThrottle::new(self.config.telemetry_log_interval);

        while let Some(event) = events.recv().await {
            match event {
                LinkEvent::Connected => self.on_connected(),
                LinkEvent::VideoData(chunk) => {
                    let session = self.video.lock().expect("video lock poisoned").clone();
                    // Without a viewer the chunks have nowhere to go.
                    if let Some(session) = session {
                        session.feed(chunk).await;
                    }
                }
                LinkEvent::FlightData(data) => {
                    battery_log.observe(&self.drone_id, &data);
                }
                LinkEvent::Disconnected => self.on_disconnected().await,
            }
        }

        debug!(drone_id = %self.drone_id, "Link event stream ended");
    }

    fn ensure_connected(&self) -> Result<(), PilotError> {
        if self.is_connected() {
            return Ok(());
        }

        warn!(drone_id = %self.drone_id, "Drone has not been connected yet");
        Err(PilotError::NotConnected {
            drone_id: self.drone_id.clone(),
        })
    }

    fn on_connected(&self) {
        info!(drone_id = %self.drone_id, "Drone connected, starting video");
        self.connected.store(true, Ordering::SeqCst);

        if let Err(e) = self.link.start_video() {
            warn!(error = %e, "Failed to start video");
        }
        if let Err(e) = self.link.set_encoder_rate(self.config.initial_encoder_rate) {
            warn!(error = %e, "Failed to set initial encoder rate");
        }

        let period = self.config.video_keepalive_interval;
        if period.is_zero() {
            debug!(drone_id = %self.drone_id, "Video keepalive disabled");
            return;
        }

        let link = Arc::clone(&self.link);
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if let Err(e) = link.start_video() {
                    warn!(error = %e, "Video keepalive failed");
                }
            }
        });

        let previous = self
            .keepalive
            .lock()
            .expect("keepalive lock poisoned")
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    async fn on_disconnected(&self) {
        info!(drone_id = %self.drone_id, "Drone disconnected");
        self.teardown().await;
    }

    async fn teardown(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.stop_keepalive();
        self.watchdog.disarm();
        self.close_video().await;
    }

    fn stop_keepalive(&self) {
        if let Some(task) = self.keepalive.lock().expect("keepalive lock poisoned").take() {
            task.abort();
        }
    }
}

impl Drop for Pilot {
    fn drop(&mut self) {
        self.stop_keepalive();
    }
}

impl fmt::Debug for Pilot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pilot")
            .field("drone_id", &self.drone_id)
            .field("connected", &self.is_connected())
            .field("vector", &self.vector)
            .field("watchdog", &self.watchdog)
            .field("video", &self.video_session())
            .finish_non_exhaustive()
    }
}

/// Logs the battery level at most once per interval.
struct TelemetryThrottle {
    interval: std::time::Duration,
    last_logged: Instant,
}

impl TelemetryThrottle {
    fn new(interval: std::time::Duration) -> Self {
        Self {
            interval,
            last_logged: Instant::now(),
        }
    }

    fn observe(&mut self, drone_id: &DroneId, data: &FlightData) -> bool {
        if self.last_logged.elapsed() <= self.interval {
            return false;
        }

        info!(
            drone_id = %drone_id,
            battery = data.battery_percentage,
            height_dm = data.height_dm,
            "Battery level {}%",
            data.battery_percentage
        );
        self.last_logged = Instant::now();
        true
    }
}
