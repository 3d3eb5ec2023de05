//! Encoder rate selection driven by the receiver's bandwidth estimates.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::link::DroneLink;
use crate::media::MediaFeedback;

/// The encoder rates the drone supports, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BitrateTier {
    Mbps1,
    Mbps1_5,
    Mbps2,
    Mbps3,
    Mbps4,
}

impl BitrateTier {
    /// Every tier, highest first, in the order the ladder is evaluated.
    pub const LADDER: [BitrateTier; 5] = [
        BitrateTier::Mbps4,
        BitrateTier::Mbps3,
        BitrateTier::Mbps2,
        BitrateTier::Mbps1_5,
        BitrateTier::Mbps1,
    ];

    /// Target rate of this tier in megabits per second.
    pub fn megabits(self) -> f64 {
        match self {
            BitrateTier::Mbps1 => 1.0,
            BitrateTier::Mbps1_5 => 1.5,
            BitrateTier::Mbps2 => 2.0,
            BitrateTier::Mbps3 => 3.0,
            BitrateTier::Mbps4 => 4.0,
        }
    }

    /// Pick the highest tier whose rate does not exceed the estimate.
    ///
    /// Estimates below the lowest tier, zero, negative or NaN all select [`BitrateTier::Mbps1`].
    pub fn from_estimate(bits_per_second: f64) -> BitrateTier {
        let megabits = bits_per_second / 1_000_000.0;

        BitrateTier::LADDER
            .into_iter()
            .find(|tier| megabits >= tier.megabits())
            .unwrap_or(BitrateTier::Mbps1)
    }
}

impl fmt::Display for BitrateTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}M", self.megabits())
    }
}

/// Forwards receiver feedback to the drone's encoder.
///
/// Every estimate is forwarded, even when it selects the tier already in use.
pub struct BitrateController {
    link: Arc<dyn DroneLink>,
}

impl BitrateController {
    pub fn new(link: Arc<dyn DroneLink>) -> Self {
        Self { link }
    }

    pub fn handle(&self, feedback: MediaFeedback) {
        match feedback {
            MediaFeedback::BandwidthEstimate { bits_per_second } => {
                self.on_bandwidth_estimate(bits_per_second);
            }
            MediaFeedback::PictureLoss => self.on_picture_loss_indication(),
        }
    }

    pub fn on_bandwidth_estimate(&self, bits_per_second: f64) -> BitrateTier {
        let tier = BitrateTier::from_estimate(bits_per_second);
        info!(
            estimate_mbps = format_args!("{:.2}", bits_per_second / 1_000_000.0),
            tier = %tier,
            "Changing encoder rate"
        );

        if let Err(e) = self.link.set_encoder_rate(tier) {
            warn!(error = %e, tier = %tier, "Failed to change encoder rate");
        }
        tier
    }

    pub fn on_picture_loss_indication(&self) {
        info!("Picture loss reported, restarting video");

        if let Err(e) = self.link.start_video() {
            warn!(error = %e, "Failed to restart video");
        }
    }
}

impl fmt::Debug for BitrateController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitrateController")
            .field("link", &"<DroneLink>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::error::DroneLinkError;
    use crate::test_utils::{LinkCall, RecordingLink};

    #[test]
    fn test_estimate_scenario() {
        let tiers: Vec<_> = [5_000_000.0, 2_500_000.0, 500_000.0, -1.0]
            .into_iter()
            .map(BitrateTier::from_estimate)
            .collect();

        assert_eq!(
            tiers,
            vec![
                BitrateTier::Mbps4,
                BitrateTier::Mbps2,
                BitrateTier::Mbps1,
                BitrateTier::Mbps1
            ]
        );
    }

    #[test]
    fn test_lower_bounds_are_inclusive() {
        assert_eq!(BitrateTier::from_estimate(4_000_000.0), BitrateTier::Mbps4);
        assert_eq!(BitrateTier::from_estimate(3_999_999.0), BitrateTier::Mbps3);
        assert_eq!(BitrateTier::from_estimate(3_000_000.0), BitrateTier::Mbps3);
        assert_eq!(BitrateTier::from_estimate(2_000_000.0), BitrateTier::Mbps2);
        assert_eq!(BitrateTier::from_estimate(1_500_000.0), BitrateTier::Mbps1_5);
        assert_eq!(BitrateTier::from_estimate(1_499_999.0), BitrateTier::Mbps1);
    }

    #[test]
    fn test_degenerate_estimates_select_floor() {
        for estimate in [0.0, -0.0, -4_000_000.0, f64::NAN, f64::NEG_INFINITY] {
            assert_eq!(BitrateTier::from_estimate(estimate), BitrateTier::Mbps1);
        }
        assert_eq!(BitrateTier::from_estimate(f64::INFINITY), BitrateTier::Mbps4);
    }

    #[test]
    fn test_tier_is_monotonic_in_estimate() {
        let mut previous = BitrateTier::Mbps1;
        for step in 0..=600 {
            let tier = BitrateTier::from_estimate(f64::from(step) * 10_000.0);
            assert!(tier >= previous);
            previous = tier;
        }
        assert_eq!(previous, BitrateTier::Mbps4);
    }

    #[test]
    fn test_every_estimate_is_forwarded() {
        let link = Arc::new(RecordingLink::new());
        let controller = BitrateController::new(link.clone());

        controller.handle(MediaFeedback::BandwidthEstimate {
            bits_per_second: 3_200_000.0,
        });
        controller.handle(MediaFeedback::BandwidthEstimate {
            bits_per_second: 3_100_000.0,
        });
        controller.handle(MediaFeedback::PictureLoss);

        assert_eq!(
            link.calls(),
            vec![
                LinkCall::SetEncoderRate(BitrateTier::Mbps3),
                LinkCall::SetEncoderRate(BitrateTier::Mbps3),
                LinkCall::StartVideo,
            ]
        );
    }

    #[test]
    fn test_link_failures_are_swallowed() {
        let link = Arc::new(RecordingLink::failing(DroneLinkError::NotConnected));
        let controller = BitrateController::new(link.clone());

        assert_eq!(
            controller.on_bandwidth_estimate(1_600_000.0),
            BitrateTier::Mbps1_5
        );
        controller.on_picture_loss_indication();
        assert_eq!(link.calls().len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(BitrateTier::Mbps1_5.to_string(), "1.5M");
        assert_eq!(BitrateTier::Mbps4.to_string(), "4M");
    }
}
