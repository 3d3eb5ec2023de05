//! Common wrappers to provide generic functionality to [`StateMachine`](super::StateMachine)
//! runners that want to inject behavior for common state machine dependencies.
//!
//! This is typically to implicitly provide system resources, like the current time, to state
//! machines that require them to be deterministically provided via input.

pub mod input;
