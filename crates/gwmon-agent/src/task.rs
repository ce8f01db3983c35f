use std::fmt;
use std::time::Duration;

/// Lifecycle of a recurring task. There is no terminal state: every run ends
/// by scheduling the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Scheduled,
    Running,
    Rescheduling,
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskPhase::Scheduled => write!(f, "scheduled"),
            TaskPhase::Running => write!(f, "running"),
            TaskPhase::Rescheduling => write!(f, "rescheduling"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Collect(String),
    Sync,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Collect(service) => write!(f, "collect:{service}"),
            TaskKind::Sync => write!(f, "sync"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("task {task}: illegal transition {from} -> {to}")]
pub struct IllegalTransition {
    pub task: String,
    pub from: TaskPhase,
    pub to: TaskPhase,
}

/// A periodic task: Scheduled -> Running -> Rescheduling -> Scheduled.
#[derive(Debug)]
pub struct PeriodicTask {
    kind: TaskKind,
    interval: Duration,
    phase: TaskPhase,
    runs: u64,
}

impl PeriodicTask {
    /// A new task starts out scheduled.
    pub fn new(kind: TaskKind, interval: Duration) -> Self {
        Self {
            kind,
            interval,
            phase: TaskPhase::Scheduled,
            runs: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn phase(&self) -> TaskPhase {
        self.phase
    }

    pub fn runs(&self) -> u64 {
        self.runs
    }

    pub fn start(&mut self) -> Result<(), IllegalTransition> {
        self.transition(TaskPhase::Scheduled, TaskPhase::Running)?;
        self.runs += 1;
        Ok(())
    }

    pub fn finish(&mut self) -> Result<(), IllegalTransition> {
        self.transition(TaskPhase::Running, TaskPhase::Rescheduling)
    }

    /// Returns the delay after which the next run is due.
    pub fn rearm(&mut self) -> Result<Duration, IllegalTransition> {
        self.transition(TaskPhase::Rescheduling, TaskPhase::Scheduled)?;
        Ok(self.interval)
    }

    fn transition(&mut self, from: TaskPhase, to: TaskPhase) -> Result<(), IllegalTransition> {
        if self.phase != from {
            return Err(IllegalTransition {
                task: self.kind.to_string(),
                from: self.phase,
                to,
            });
        }
        tracing::trace!(task = %self.kind, from = %from, to = %to, "Task transition");
        self.phase = to;
        Ok(())
    }
}
