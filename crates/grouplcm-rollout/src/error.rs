//! Rollout engine error types.

use thiserror::Error;

use grouplcm_state::StateError;

/// Configuration errors found while splitting sites into batches.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("unknown upgrade strategy {0:?} (expected Parallel or Serial)")]
    UnknownStrategy(String),

    #[error("site {0:?} is listed more than once")]
    DuplicateSite(String),
}

/// Data errors in a policy template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeriveError {
    #[error("policy template #{template} (batch {batch}) is malformed: {reason}")]
    MalformedTemplate {
        batch: u32,
        /// Zero-based position in `groupPolicyTemplates`.
        template: usize,
        reason: String,
    },
}

/// Errors that abort a reconcile pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("invalid group {key}: {reason}")]
    InvalidGroup { key: String, reason: String },

    #[error("plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("derive error: {0}")]
    Derive(#[from] DeriveError),

    #[error("store error: {0}")]
    State(#[from] StateError),

    #[error("reconcile cancelled")]
    Cancelled,
}

impl ReconcileError {
    /// Errors that a retry cannot fix without the group being edited.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ReconcileError::InvalidGroup { .. } | ReconcileError::Plan(_) | ReconcileError::Derive(_)
        )
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
