use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, warn};

use super::{MotionCommand, VectorController};
use crate::state_machine::StateMachine;
use crate::state_machine::watchdog::{
    WatchdogInput, WatchdogMachine, WatchdogOutput, WatchdogState,
};
use crate::state_machine::wrappers::input::SystemInput;

/// Shortest tick period the watchdog timer runs with.
pub const MIN_TIMER_PERIOD: Duration = Duration::from_millis(1);

/// Forces the drone to a standstill when the operator's command stream goes silent.
///
/// One instance is shared by the planar and the vertical/yaw endpoints. A stop on either pair
/// disarms it, and a forced stop zeroes all four axes.
///
/// Command handling, the apply callback and every timer tick are serialized by one lock, so a
/// forced stop can never land between a command's state transition and its application.
#[derive(Clone)]
pub struct MotionWatchdog {
    shared: Arc<WatchdogShared>,
}

struct WatchdogShared {
    core: Mutex<WatchdogCore>,
    vector: Arc<VectorController>,
    period: Duration,
    runtime: Handle,
}

struct WatchdogCore {
    machine: WatchdogMachine,
    timer: Option<TimerHandle>,
    next_epoch: u64,
}

/// The running timer task. A task only acts while its epoch is the current one, which covers
/// the window between an abort and the task observing it.
struct TimerHandle {
    epoch: u64,
    task: JoinHandle<()>,
}

impl MotionWatchdog {
    /// Must be called from within a tokio runtime, the timer task is spawned onto it.
    ///
    /// A zero `period` is raised to [`MIN_TIMER_PERIOD`].
    pub fn new(vector: Arc<VectorController>, timeout: Duration, period: Duration) -> Self {
        if period < MIN_TIMER_PERIOD {
            warn!(?period, min = ?MIN_TIMER_PERIOD, "Watchdog period too short, raising it");
        }
        let period = period.max(MIN_TIMER_PERIOD);

        Self {
            shared: Arc::new(WatchdogShared {
                core: Mutex::new(WatchdogCore {
                    machine: WatchdogMachine::new(timeout, Instant::now()),
                    timer: None,
                    next_epoch: 0,
                }),
                vector,
                period,
                runtime: Handle::current(),
            }),
        }
    }

    pub fn state(&self) -> WatchdogState {
        self.shared.lock_core().machine.state()
    }

    /// Feed one operator command and hand it to `apply` while the transition is still locked.
    pub fn consume(&self, command: MotionCommand, apply: impl FnOnce(MotionCommand)) {
        let mut core = self.shared.lock_core();
        core.machine.process_input(SystemInput::sample());
        core.machine
            .process_input(SystemInput::Input(WatchdogInput::Command(command)));
        self.shared.perform(&mut core);

        apply(command);
    }

    /// Cancel a pending timer without touching the drone, used when the drone goes away.
    pub fn disarm(&self) {
        let mut core = self.shared.lock_core();
        if core.machine.is_armed() {
            core.machine.process_input(SystemInput::sample());
            core.machine
                .process_input(SystemInput::Input(WatchdogInput::Command(
                    MotionCommand::Planar { x: 0.0, y: 0.0 },
                )));
            self.shared.perform(&mut core);
        }
    }
}

impl WatchdogShared {
    fn lock_core(&self) -> MutexGuard<'_, WatchdogCore> {
        self.core.lock().expect("watchdog lock poisoned")
    }

    fn perform(self: &Arc<Self>, core: &mut WatchdogCore) {
        while let Some(output) = core.machine.poll_output() {
            match output {
                WatchdogOutput::Arm => self.start_timer(core),
                WatchdogOutput::Disarm => {
                    debug!("Stop received, watchdog disarmed");
                    core.cancel_timer();
                }
                WatchdogOutput::ForceStop => {
                    warn!("Motion commands went silent, forcing a zero vector");
                    core.cancel_timer();
                    self.vector.force_zero();
                }
            }
        }
    }

    fn start_timer(self: &Arc<Self>, core: &mut WatchdogCore) {
        core.cancel_timer();

        let epoch = core.next_epoch;
        core.next_epoch += 1;

        let task = self.runtime.spawn(run_timer(Arc::clone(self), epoch));
        core.timer = Some(TimerHandle { epoch, task });
    }
}

impl WatchdogCore {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.task.abort();
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.timer.as_ref().is_some_and(|timer| timer.epoch == epoch)
    }
}

async fn run_timer(shared: Arc<WatchdogShared>, epoch: u64) {
    let mut ticker = interval(shared.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let mut core = shared.lock_core();
        if !core.is_current(epoch) {
            return;
        }

        core.machine.process_input(SystemInput::sample());
        core.machine
            .process_input(SystemInput::Input(WatchdogInput::Tick));
        shared.perform(&mut core);

        if !core.machine.is_armed() {
            return;
        }
    }
}

impl fmt::Debug for MotionWatchdog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotionWatchdog")
            .field("state", &self.state())
            .field("period", &self.shared.period)
            .finish()
    }
}
