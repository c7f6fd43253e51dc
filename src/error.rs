//! Error types for schedule computation and replanning.

use thiserror::Error;

use crate::replan::ReplanState;
use crate::step::{CaseId, StepId, TemplateId};

/// Errors raised by the persistence collaborators.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
    /// The stored case version no longer matches the version the batch was computed against.
    #[error("case {case_id} was modified concurrently")]
    VersionConflict { case_id: CaseId },
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors surfaced by the scheduling engine.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("cyclic dependency between steps {}", .involved_step_ids.join(", "))]
    CyclicDependency { involved_step_ids: Vec<StepId> },
    #[error("step {step_id} depends on unknown step {missing_dependency_id}")]
    UnknownDependency {
        step_id: StepId,
        missing_dependency_id: StepId,
    },
    #[error("case {case_id} not found")]
    CaseNotFound { case_id: CaseId },
    /// Transient: retry the whole preview and apply against fresh data.
    #[error("case {case_id} was modified by a concurrent replan")]
    ConcurrentModification { case_id: CaseId },
    #[error("template {template_id} not found")]
    TemplateNotFound { template_id: TemplateId },
    #[error("step {step_id} not found in case {case_id}")]
    StepNotFound { case_id: CaseId, step_id: StepId },
    #[error("step id {step_id} appears more than once")]
    DuplicateStep { step_id: StepId },
    #[error("step {step_id} has invalid sequence {sequence}: {reason}")]
    InvalidSequence {
        step_id: StepId,
        sequence: i32,
        reason: &'static str,
    },
    #[error("step {step_id} has offset {offset_days} outside ±{max} business days")]
    InvalidOffset {
        step_id: StepId,
        offset_days: i64,
        max: i64,
    },
    #[error("case {case_id} already exists")]
    CaseAlreadyExists { case_id: CaseId },
    #[error("invalid calendar: {0}")]
    InvalidCalendar(String),
    #[error("replan cannot move from {from:?} to {to:?}")]
    InvalidTransition { from: ReplanState, to: ReplanState },
    #[error(transparent)]
    Repository(RepositoryError),
}

impl ScheduleError {
    /// True for errors caused by a malformed template rather than by the caller or storage.
    pub fn is_template_error(&self) -> bool {
        matches!(
            self,
            ScheduleError::CyclicDependency { .. }
                | ScheduleError::UnknownDependency { .. }
                | ScheduleError::DuplicateStep { .. }
                | ScheduleError::InvalidSequence { .. }
                | ScheduleError::InvalidOffset { .. }
        )
    }
}

impl From<RepositoryError> for ScheduleError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::VersionConflict { case_id } => {
                ScheduleError::ConcurrentModification { case_id }
            }
            other => ScheduleError::Repository(other),
        }
    }
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
