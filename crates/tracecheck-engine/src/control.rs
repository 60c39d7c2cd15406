//! Stop flag, step budget, deadline and cancellation shared by every worker
//! of one exploration.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Why an exploration ended before exhausting the bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// A visitor asked to stop.
    Stopped,
    StepBudget { limit: u64 },
    Deadline,
    Cancelled,
}

impl Halt {
    /// True for halts that leave the search incomplete.
    pub fn is_budget(&self) -> bool {
        !matches!(self, Halt::Stopped)
    }
}

impl fmt::Display for Halt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Halt::Stopped => write!(f, "search stopped"),
            Halt::StepBudget { limit } => write!(f, "step budget of {limit} exhausted"),
            Halt::Deadline => write!(f, "wall-clock budget exhausted"),
            Halt::Cancelled => write!(f, "search cancelled"),
        }
    }
}

pub fn deadline_from_timeout_secs(timeout_secs: u64) -> Option<Instant> {
    if timeout_secs == 0 {
        None
    } else {
        Instant::now().checked_add(Duration::from_secs(timeout_secs))
    }
}

pub fn deadline_exceeded(deadline: Option<Instant>) -> bool {
    match deadline {
        Some(deadline) => Instant::now() >= deadline,
        None => false,
    }
}

#[derive(Debug)]
pub struct SearchControl {
    stop: AtomicBool,
    steps: AtomicU64,
    /// 0 disables.
    max_steps: u64,
    deadline: Option<Instant>,
    cancel: Option<Arc<AtomicBool>>,
    halt: OnceLock<Halt>,
}

impl SearchControl {
    pub fn new(max_steps: u64, deadline: Option<Instant>, cancel: Option<Arc<AtomicBool>>) -> Self {
        Self {
            stop: AtomicBool::new(false),
            steps: AtomicU64::new(0),
            max_steps,
            deadline,
            cancel,
            halt: OnceLock::new(),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0, None, None)
    }

    /// Account for one search step. Returns `false` once the search must end.
    pub fn tick(&self) -> bool {
        if self.stop.load(Ordering::Acquire) {
            return false;
        }
        let taken = self.steps.fetch_add(1, Ordering::Relaxed) + 1;
        if self.max_steps > 0 && taken > self.max_steps {
            self.halt(Halt::StepBudget {
                limit: self.max_steps,
            });
            return false;
        }
        if deadline_exceeded(self.deadline) {
            self.halt(Halt::Deadline);
            return false;
        }
        if let Some(cancel) = &self.cancel {
            if cancel.load(Ordering::Acquire) {
                self.halt(Halt::Cancelled);
                return false;
            }
        }
        true
    }

    pub fn request_stop(&self) {
        self.halt(Halt::Stopped);
    }

    /// The first halt reason wins; later ones are ignored.
    fn halt(&self, reason: Halt) {
        let _ = self.halt.set(reason);
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn halted(&self) -> Option<Halt> {
        self.halt.get().copied()
    }

    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }
}
