//! Session activation at start-up
//!
//! The compositor asks the session manager to make its session the active
//! one. Activation can fail while the session manager is still starting, so
//! failures are retried on a fixed interval up to a bound, after which the
//! compositor gives up for the rest of its lifetime.

use std::time::Duration;

use anyhow::Result;
use log::{info, warn};

#[cfg_attr(test, mockall::automock)]
pub trait SessionActivator {
    fn activate(&mut self) -> Result<()>;
}

/// What the caller should do after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Activated,
    RetryAfter(Duration),
    GaveUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActivationState {
    Pending,
    Activated,
    GaveUp,
}

pub struct SessionActivation<A: SessionActivator> {
    activator: A,
    attempts: u32,
    max_attempts: u32,
    interval: Duration,
    state: ActivationState,
}

impl<A: SessionActivator> SessionActivation<A> {
    pub fn new(activator: A, max_attempts: u32, interval: Duration) -> Self {
        Self {
            activator,
            attempts: 0,
            max_attempts,
            interval,
            state: ActivationState::Pending,
        }
    }

    /// First attempt.
    pub fn start(&mut self) -> RetryOutcome {
        self.retry()
    }

    /// Attempts activation unless it already succeeded or was given up.
    pub fn retry(&mut self) -> RetryOutcome {
        match self.state {
            ActivationState::Activated => return RetryOutcome::Activated,
            ActivationState::GaveUp => return RetryOutcome::GaveUp,
            ActivationState::Pending => {}
        }

        self.attempts += 1;
        match self.activator.activate() {
            Ok(()) => {
                info!("Session activated after {} attempt(s)", self.attempts);
                self.state = ActivationState::Activated;
                RetryOutcome::Activated
            }
            Err(e) if self.attempts >= self.max_attempts => {
                warn!(
                    "Session activation failed {} times, giving up: {:#}",
                    self.attempts, e
                );
                self.state = ActivationState::GaveUp;
                RetryOutcome::GaveUp
            }
            Err(e) => {
                warn!(
                    "Session activation attempt {} failed: {:#}",
                    self.attempts, e
                );
                RetryOutcome::RetryAfter(self.interval)
            }
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_activated(&self) -> bool {
        self.state == ActivationState::Activated
    }
}
