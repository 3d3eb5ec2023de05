use std::time::Duration;

use bon::Builder;

use crate::bitrate::BitrateTier;

/// Tuning of a [`Pilot`](crate::pilot::Pilot) and the video sessions it opens.
#[derive(Debug, Clone, Builder)]
pub struct PilotConfig {
    /// Silence after the last nonzero motion command before the drone is forced to stop.
    #[builder(default = Duration::from_millis(500))]
    pub watchdog_timeout: Duration,

    /// How often the armed watchdog checks for silence.
    #[builder(default = Duration::from_millis(100))]
    pub watchdog_period: Duration,

    /// Largest access unit assembled before the pending bytes are dropped.
    #[builder(default = 4 * 1024 * 1024)]
    pub max_access_unit_bytes: usize,

    /// Minimum spacing of battery level log lines.
    #[builder(default = Duration::from_secs(3))]
    pub telemetry_log_interval: Duration,

    /// How often video is restarted while the drone is connected, so a late viewer gets a
    /// keyframe. Zero disables the keepalive.
    #[builder(default = Duration::from_secs(10))]
    pub video_keepalive_interval: Duration,

    /// Encoder rate requested right after the drone connects.
    #[builder(default = BitrateTier::Mbps4)]
    pub initial_encoder_rate: BitrateTier,

    /// How long closing a video session waits to hand over the last partial access unit.
    #[builder(default = Duration::from_secs(1))]
    pub flush_grace: Duration,

    /// Time given to the landing before an operator disconnect tears the session down.
    #[builder(default = Duration::from_secs(1))]
    pub land_settle: Duration,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
