use std::fmt::Display;
use std::sync::Arc;

/// Identifies the drone a [`Pilot`](crate::pilot::Pilot) is flying, used to tag its log lines.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct DroneId(Arc<str>);

impl DroneId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DroneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for DroneId {
    fn from(s: String) -> Self {
        Self(s.into())
    }
}

impl From<&str> for DroneId {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}
