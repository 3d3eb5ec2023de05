//! Liveness tracking of the operator's motion command stream.
//!
//! While a joystick is held the browser streams small commands. If that stream stops without an
//! explicit stop command the drone must not keep drifting, so once armed the watchdog expects a
//! fresh nonzero command within the timeout and otherwise asks its runner to force a stop.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use super::StateMachine;
use super::wrappers::input::SystemInput;
use crate::motion::MotionCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Idle,
    Armed { last_signal: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WatchdogInput {
    Command(MotionCommand),
    Tick,
}

/// Actions the runner performs on behalf of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogOutput {
    /// Start the periodic timer.
    Arm,
    /// Cancel the timer, an explicit stop was received.
    Disarm,
    /// Cancel the timer and zero every axis of the drone.
    ForceStop,
}

#[derive(Debug)]
pub struct WatchdogMachine {
    state: WatchdogState,
    now: Instant,
    timeout: Duration,
    pending: VecDeque<WatchdogOutput>,
}

impl WatchdogMachine {
    /// `now` seeds the clock, later advanced through [`SystemInput::System`].
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            state: WatchdogState::Idle,
            now,
            timeout,
            pending: VecDeque::new(),
        }
    }

    pub fn state(&self) -> WatchdogState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, WatchdogState::Armed { .. })
    }

    fn advance_clock(&mut self, now: Instant) {
        // A clock never runs backwards for the machine.
        self.now = self.now.max(now);
    }

    fn process_command(&mut self, command: MotionCommand) {
        match (self.state, command.is_stop()) {
            (WatchdogState::Idle, true) => {}
            (WatchdogState::Idle, false) => {
                self.state = WatchdogState::Armed {
                    last_signal: self.now,
                };
                self.pending.push_back(WatchdogOutput::Arm);
            }
            (WatchdogState::Armed { .. }, true) => {
                self.state = WatchdogState::Idle;
                self.pending.push_back(WatchdogOutput::Disarm);
            }
            (WatchdogState::Armed { .. }, false) => {
                self.state = WatchdogState::Armed {
                    last_signal: self.now,
                };
            }
        }
    }

    fn process_tick(&mut self) {
        if let WatchdogState::Armed { last_signal } = self.state {
            if self.now.saturating_duration_since(last_signal) > self.timeout {
                self.state = WatchdogState::Idle;
                self.pending.push_back(WatchdogOutput::ForceStop);
            }
        }
    }
}

impl StateMachine for WatchdogMachine {
    type Input = SystemInput<WatchdogInput, Instant>;
    type Output = WatchdogOutput;

    fn process_input(&mut self, input: Self::Input) {
        match input {
            SystemInput::System(now) => self.advance_clock(now),
            SystemInput::Input(WatchdogInput::Command(command)) => self.process_command(command),
            SystemInput::Input(WatchdogInput::Tick) => self.process_tick(),
        }
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.pending.pop_front()
    }
}
