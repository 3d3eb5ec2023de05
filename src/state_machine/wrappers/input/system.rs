use impl_trait_for_tuples::impl_for_tuples;

/// The [`SystemResource`] trait indicates that a type is a resource inherently provided by the
/// system context of the application.
///
/// Provides a single method [`generate`](SystemResource::generate) which takes no input, producing
/// an instance of the resource from only the implicit system context.
///
/// This is intended for usage with [`SystemInput`] in order to define generic handling of system
/// input into a [`StateMachine`](crate::state_machine::StateMachine).
pub trait SystemResource {
    /// Produce an instance of this resource with no direct input, drawing only from the implicitly
    /// available global system context.
    fn generate() -> Self;
}

#[impl_for_tuples(1, 12)]
impl SystemResource for Tuple {
    fn generate() -> Self {
        for_tuples!( ( #( Tuple::generate() ),* ) )
    }
}

/// Follows the tokio clock, so a paused runtime in tests drives the machines deterministically.
impl SystemResource for tokio::time::Instant {
    fn generate() -> Self {
        tokio::time::Instant::now()
    }
}

/// A [`StateMachine`](crate::state_machine::StateMachine) input wrapper for providing
/// [`SystemResource`] to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SystemInput<I, S> {
    Input(I),
    System(S),
}

impl<I, S: SystemResource> SystemInput<I, S> {
    /// Sample the resource from the system context right now.
    pub fn sample() -> Self {
        SystemInput::System(S::generate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_instant_follows_paused_clock() {
        let before = tokio::time::Instant::generate();
        tokio::time::advance(Duration::from_millis(250)).await;
        let after = tokio::time::Instant::generate();

        assert_eq!(after - before, Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tuple_generates_each_member() {
        let (a, b): (tokio::time::Instant, tokio::time::Instant) = SystemResource::generate();
        assert_eq!(a, b);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_wraps_system_variant() {
        let now = tokio::time::Instant::now();
        let input: SystemInput<(), tokio::time::Instant> = SystemInput::sample();
        assert_eq!(input, SystemInput::System(now));
    }
}
