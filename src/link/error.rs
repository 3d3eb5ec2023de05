//! Error types for calls into the drone link.

/// Failure reported by the drone link for an outbound call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DroneLinkError {
    /// The link has no connected drone to talk to.
    #[error("no drone is connected")]
    NotConnected,

    /// The drone or the link refused the call.
    #[error("drone rejected the call: {0}")]
    Rejected(String),
}
