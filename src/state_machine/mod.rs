pub mod access_unit;
pub mod watchdog;
pub mod wrappers;

/// The [`StateMachine`] trait provides calling semantics and indicates the upholding of invariants
/// that guarantee deterministic behavior.
///
/// # Functionality
/// State machines operate on defined inputs and outputs. The video reassembler consumes payload
/// chunks and yields finished frames, the motion watchdog consumes operator commands and clock
/// ticks and yields timer actions. Both are grouped through the associated types
/// [`Input`](StateMachine::Input) and [`Output`](StateMachine::Output), usually enums.
///
/// Method dispatch is defined by [`process_input`](StateMachine::process_input) and
/// [`poll_output`](StateMachine::poll_output), handling mapping input and output respectively.
///
/// # Invariants
/// A [`StateMachine`] must be pure in that its operation does not depend on any external behavior
/// of the broader system. Implementors *must* uphold all the following invariants.
///
/// ## No Interior Mutability
/// All data is either immutable or mutable only through `&mut` access. No [`std::cell`] like
/// containers, no [`std::sync`] locks, no shared smart pointers such as [`Arc`](std::sync::Arc).
///
/// ## No IO
/// No [`std::io`], [`std::net`], and no calls into the drone link or media track. Those are the
/// job of the runner that owns the machine.
///
/// ### No System Time
/// Reading [`std::time::Instant::now`] or [`tokio::time::Instant::now`] from inside the machine
/// is forbidden. Time values are provided via input, see [`SystemInput`](wrappers::input::SystemInput).
///
/// ## No Concurrency, No Async, No Blocking
/// No threads, no tasks, no futures, no locks. A machine must be usable from inside a critical
/// section held by its runner, so every call returns promptly.
///
/// # Side Effects
/// Logging is allowed as long as the logic of the machine never depends on it.
///
/// # Runners
/// A runner wraps the pure machine. It owns the lock that serializes access, reads the clock,
/// feeds inputs and acts on the polled outputs (pushing frames, spawning or cancelling timers,
/// writing to the drone). See [`MotionWatchdog`](crate::motion::MotionWatchdog) and
/// [`VideoPipeline`](crate::video::VideoPipeline).
///
/// # Example
/// ```ignore
/// let mut machine = AccessUnitMachine::new(4 * 1024 * 1024);
/// machine.process_input(AccessUnitInput::Chunk(chunk));
///
/// while let Some(frame) = machine.poll_output() {
///     sink.push(frame).await;
/// }
/// ```
pub trait StateMachine {
    /// The type of input that is [processed](StateMachine::process_input) by the state machine.
    type Input;
    /// The type of output that is [polled](StateMachine::poll_output) by the state machine.
    type Output;

    /// Process the provided `input` into the state machine.
    fn process_input(&mut self, input: Self::Input);

    /// Poll the state machine for output, returning the first available output if present.
    fn poll_output(&mut self) -> Option<Self::Output>;
}
