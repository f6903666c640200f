//! Error taxonomy for the containment pipeline.

use std::time::Duration;
use thiserror::Error;

/// Why an instance's pipeline (or a whole batch) stopped.
///
/// `AlreadyLocked` is a skip, not a failure: the dispatcher moves on to the
/// next instance. Everything else aborts the instance's session; only errors
/// surfaced from the batch-level audit/notification calls abort the batch.
#[derive(Error, Debug)]
pub enum ContainmentError {
    #[error("instance {0} is already locked by another session")]
    AlreadyLocked(String),

    #[error("remote dispatch failed: {0}")]
    Dispatch(String),

    #[error("remote command failed: {0}")]
    CommandFailed(String),

    #[error("remote command did not finish within {0:?}")]
    Timeout(Duration),

    #[error("required step {step} failed: {detail}")]
    StepFailed {
        step: &'static str,
        detail: String,
    },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Approval-token verification failures. Never panics on attacker input.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("approval link has expired")]
    Expired,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("missing or malformed parameter: {0}")]
    Malformed(&'static str),
}
