//! Controller error types.

use thiserror::Error;

/// Errors that stop the controller itself. Reconcile failures never do;
/// they are retried per group.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("state store error: {0}")]
    State(#[from] grouplcm_state::StateError),

    #[error("worker {worker} failed: {reason}")]
    Worker { worker: usize, reason: String },
}

pub type ControllerResult<T> = Result<T, ControllerError>;
