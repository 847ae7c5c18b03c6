//! Public types for the sync engine coordinator.

use thiserror::Error;

/// Engine lifecycle state.
///
/// ```text
/// Stopped → Starting → Running → Stopping → Stopped
/// ```
///
/// Use [`super::SyncEngine::state()`] to check the current state or
/// [`super::SyncEngine::state_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Not running (initial and terminal state)
    Stopped,
    /// Loading the persisted allowlist and spawning the worker
    Starting,
    /// Started; the worker (if periodic updates are enabled) is ticking
    Running,
    /// Waiting for the worker to exit
    Stopping,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Starting => write!(f, "Starting"),
            Self::Running => write!(f, "Running"),
            Self::Stopping => write!(f, "Stopping"),
        }
    }
}

/// Inputs to the lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Start,
    Started,
    Stop,
    Stopped,
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Started => write!(f, "started"),
            Self::Stop => write!(f, "stop"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

impl EngineState {
    /// Guarded transition function.
    ///
    /// `Ok(Some(next))` moves to `next`, `Ok(None)` is an idempotent no-op
    /// (start while running, stop while stopped), anything else is rejected.
    pub fn next(self, event: LifecycleEvent) -> Result<Option<EngineState>, EngineError> {
        use EngineState::*;
        use LifecycleEvent as E;

        match (self, event) {
            (Stopped, E::Start) => Ok(Some(Starting)),
            (Running, E::Start) => Ok(None),
            (Starting, E::Started) => Ok(Some(Running)),
            (Running, E::Stop) => Ok(Some(Stopping)),
            (Stopped, E::Stop) => Ok(None),
            (Stopping, E::Stopped) => Ok(Some(Stopped)),
            (from, event) => Err(EngineError::InvalidTransition { from, event }),
        }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("cannot {event} while {from}")]
    InvalidTransition { from: EngineState, event: LifecycleEvent },
    #[error("sync worker terminated abnormally: {0}")]
    Worker(String),
}
