//! Session timer — cancellable countdown with sampled progress
//!
//! A countdown moves `Idle → Running → {Completed, Cancelled}`. Nothing runs
//! in the background: every query samples the injected [`Clock`] under the
//! timer's lock and commits whatever transition the elapsed time implies.
//!
//! Progress is reported at the configured cadence: elapsed time is rounded
//! down to a whole number of tick intervals, so successive samples never go
//! backwards. Completion is decided by elapsed time alone. The sample that
//! first observes completion (or the first sample after a cancel lost the
//! race against completion) carries the final tick at fraction `1.0`; that
//! tick is handed out exactly once.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::TimerError;

/// Countdown lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// Identifies one countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    id: u64,
    started_at_ms: u64,
}

impl TimerHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Clock reading when the countdown started
    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "countdown-{}", self.id)
    }
}

/// Progress of a countdown at one sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimerProgress {
    pub elapsed_ms: u64,
    /// In [0, 1]
    pub progress_fraction: f64,
    pub remaining_ms: u64,
}

impl TimerProgress {
    fn at(elapsed_ms: u64, duration_ms: u64) -> Self {
        let elapsed_ms = elapsed_ms.min(duration_ms);
        Self {
            elapsed_ms,
            progress_fraction: (elapsed_ms as f64 / duration_ms as f64).clamp(0.0, 1.0),
            remaining_ms: duration_ms - elapsed_ms,
        }
    }

    fn finished(duration_ms: u64) -> Self {
        Self {
            elapsed_ms: duration_ms,
            progress_fraction: 1.0,
            remaining_ms: 0,
        }
    }
}

/// Result of sampling a countdown
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerSample {
    /// Still counting down
    Running(TimerProgress),
    /// The final tick; returned exactly once per countdown
    Finished(TimerProgress),
    /// Completed and the final tick was already handed out
    Completed,
    Cancelled,
}

/// Result of a cancel request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelOutcome {
    Cancelled,
    /// Completion was reached first; the cancel was a no-op
    AlreadyCompleted,
    AlreadyCancelled,
}

#[derive(Debug)]
struct Countdown {
    handle: TimerHandle,
    duration_ms: u64,
    tick_interval_ms: u64,
    last: TimerProgress,
    final_delivered: bool,
}

impl Countdown {
    fn elapsed(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.handle.started_at_ms)
    }

    fn is_due(&self, now_ms: u64) -> bool {
        self.elapsed(now_ms) >= self.duration_ms
    }

    /// Latest on-cadence progress, never earlier than the previous one
    fn advance(&mut self, now_ms: u64) -> TimerProgress {
        let elapsed = self.elapsed(now_ms);
        let on_cadence = elapsed / self.tick_interval_ms * self.tick_interval_ms;
        if on_cadence > self.last.elapsed_ms {
            self.last = TimerProgress::at(on_cadence, self.duration_ms);
        }
        self.last
    }

    fn take_final(&mut self) -> TimerSample {
        if self.final_delivered {
            TimerSample::Completed
        } else {
            self.final_delivered = true;
            self.last = TimerProgress::finished(self.duration_ms);
            TimerSample::Finished(self.last)
        }
    }
}

#[derive(Debug)]
struct TimerInner {
    state: TimerState,
    next_id: u64,
    current: Option<Countdown>,
}

impl TimerInner {
    fn countdown_mut(&mut self, handle: TimerHandle) -> Result<&mut Countdown, TimerError> {
        match self.current.as_mut() {
            Some(countdown) if countdown.handle == handle => Ok(countdown),
            _ => Err(TimerError::StaleHandle(handle.id)),
        }
    }
}

/// One-at-a-time countdown driven by an injected clock
pub struct SessionTimer {
    clock: Arc<dyn Clock>,
    inner: Mutex<TimerInner>,
}

impl SessionTimer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(TimerInner {
                state: TimerState::Idle,
                next_id: 1,
                current: None,
            }),
        }
    }

    /// Current clock reading
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// State as of the last committed transition
    pub fn state(&self) -> TimerState {
        self.inner.lock().state
    }

    /// Start a countdown
    ///
    /// Fails with `AlreadyRunning` while another countdown has time left.
    pub fn start(&self, duration_ms: u64, tick_interval_ms: u64) -> Result<TimerHandle, TimerError> {
        if duration_ms == 0 || tick_interval_ms == 0 {
            return Err(TimerError::InvalidDuration {
                duration_ms,
                tick_interval_ms,
            });
        }

        let mut inner = self.inner.lock();
        let now = self.clock.now_ms();

        if inner.state == TimerState::Running {
            let due = inner.current.as_ref().is_some_and(|c| c.is_due(now));
            if !due {
                return Err(TimerError::AlreadyRunning);
            }
            inner.state = TimerState::Completed;
        }

        let handle = TimerHandle {
            id: inner.next_id,
            started_at_ms: now,
        };
        inner.next_id += 1;
        inner.current = Some(Countdown {
            handle,
            duration_ms,
            tick_interval_ms,
            last: TimerProgress::at(0, duration_ms),
            final_delivered: false,
        });
        inner.state = TimerState::Running;

        log::debug!(
            "{} started: {}ms at {}ms cadence",
            handle,
            duration_ms,
            tick_interval_ms
        );
        Ok(handle)
    }

    /// Sample a countdown, committing completion if it is due
    pub fn sample(&self, handle: TimerHandle) -> Result<TimerSample, TimerError> {
        let mut inner = self.inner.lock();
        let now = self.clock.now_ms();
        let state = inner.state;
        let countdown = inner.countdown_mut(handle)?;

        let sample = match state {
            TimerState::Running if countdown.is_due(now) => {
                let sample = countdown.take_final();
                inner.state = TimerState::Completed;
                log::debug!("{} completed", handle);
                sample
            }
            TimerState::Running => TimerSample::Running(countdown.advance(now)),
            TimerState::Completed => countdown.take_final(),
            TimerState::Cancelled => TimerSample::Cancelled,
            TimerState::Idle => return Err(TimerError::StaleHandle(handle.id)),
        };
        Ok(sample)
    }

    /// Cancel a countdown
    ///
    /// The clock is sampled first: if the completion instant has already
    /// passed, completion wins and the cancel is a no-op.
    pub fn cancel(&self, handle: TimerHandle) -> Result<CancelOutcome, TimerError> {
        let mut inner = self.inner.lock();
        let now = self.clock.now_ms();
        let state = inner.state;
        let due = inner.countdown_mut(handle)?.is_due(now);

        let outcome = match state {
            TimerState::Running if due => {
                inner.state = TimerState::Completed;
                CancelOutcome::AlreadyCompleted
            }
            TimerState::Running => {
                inner.state = TimerState::Cancelled;
                log::debug!("{} cancelled", handle);
                CancelOutcome::Cancelled
            }
            TimerState::Completed => CancelOutcome::AlreadyCompleted,
            TimerState::Cancelled => CancelOutcome::AlreadyCancelled,
            TimerState::Idle => return Err(TimerError::StaleHandle(handle.id)),
        };
        Ok(outcome)
    }
}
