use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::RepositoryResult;
use crate::step::{CaseId, CaseRecord, ProcessTemplate, StepDefinition, StepId, StepInstance};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueDateUpdate {
    pub step_id: StepId,
    pub due_date: NaiveDate,
}

/// Every write a replan makes, applied together or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplanBatch {
    pub case_id: CaseId,
    /// Case version the updates were computed against.
    pub expected_version: u64,
    pub goal_date: NaiveDate,
    pub updates: Vec<DueDateUpdate>,
}

/// Storage for templates, cases and their step instances.
///
/// Every write that touches a case bumps its version.
pub trait CaseRepository: Send + Sync {
    fn load_template(&self, template_id: &str) -> RepositoryResult<Option<ProcessTemplate>>;

    fn save_template(&self, template: &ProcessTemplate) -> RepositoryResult<()>;

    fn load_step_definitions(
        &self,
        template_id: &str,
    ) -> RepositoryResult<Option<Vec<StepDefinition>>> {
        Ok(self.load_template(template_id)?.map(|template| template.steps))
    }

    fn load_case(&self, case_id: &str) -> RepositoryResult<Option<CaseRecord>>;

    /// Returns `false` without writing when the case id is taken.
    fn insert_case(&self, case: &CaseRecord, steps: &[StepInstance]) -> RepositoryResult<bool>;

    fn load_step_instances(&self, case_id: &str) -> RepositoryResult<Vec<StepInstance>>;

    /// Atomic batch write of due dates.
    fn save_step_instance_due_dates(
        &self,
        case_id: &str,
        updates: &[DueDateUpdate],
    ) -> RepositoryResult<()>;

    fn save_case_goal_date(&self, case_id: &str, goal_date: NaiveDate) -> RepositoryResult<()>;

    /// Replace one step instance; returns `false` if the case has no such step.
    /// Fails with `VersionConflict` when the case moved past `expected_version`.
    fn update_step_instance(
        &self,
        case_id: &str,
        expected_version: u64,
        step: &StepInstance,
    ) -> RepositoryResult<bool>;

    /// Apply a replan in one transaction, failing with `VersionConflict` when the case
    /// moved past `batch.expected_version`.
    fn commit_replan(&self, batch: &ReplanBatch) -> RepositoryResult<()>;
}

pub trait HolidaySource: Send + Sync {
    fn list_holidays(&self) -> RepositoryResult<Vec<NaiveDate>>;
}

/// A holiday source that can be edited by administrators.
pub trait HolidayStore: HolidaySource {
    fn add_holiday(&self, date: NaiveDate) -> RepositoryResult<bool>;
    fn remove_holiday(&self, date: NaiveDate) -> RepositoryResult<bool>;
}

/// A fixed holiday list, e.g. from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticHolidays(pub Vec<NaiveDate>);

impl HolidaySource for StaticHolidays {
    fn list_holidays(&self) -> RepositoryResult<Vec<NaiveDate>> {
        Ok(self.0.clone())
    }
}

pub mod file;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{
    HolidayFile, load_holidays_from_csv, load_holidays_from_json, load_template_from_json,
    save_template_to_json,
};
pub use memory::InMemoryRepository;
