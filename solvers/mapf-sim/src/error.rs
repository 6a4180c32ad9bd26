//! Scheduler-level invariant violations.
//!
//! These are programming errors, not expected outcomes, so they abort the
//! tick rather than being logged and absorbed the way a stale path
//! reservation conflict is.

use mapf_core::RunnerId;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("runner {runner} already has an assigned job")]
    DoubleAssignment { runner: RunnerId },

    #[error("runner {runner} has no assigned job to finish")]
    MissingAssignmentOnFinish { runner: RunnerId },
}
