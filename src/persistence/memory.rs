use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

use super::{CaseRepository, DueDateUpdate, HolidaySource, HolidayStore, ReplanBatch};
use crate::error::{RepositoryError, RepositoryResult};
use crate::step::{CaseRecord, ProcessTemplate, StepInstance};

#[derive(Default)]
struct State {
    templates: HashMap<String, ProcessTemplate>,
    cases: HashMap<String, CaseRecord>,
    steps: HashMap<String, Vec<StepInstance>>,
    holidays: BTreeSet<NaiveDate>,
}

impl State {
    fn case_mut(&mut self, case_id: &str) -> RepositoryResult<&mut CaseRecord> {
        self.cases
            .get_mut(case_id)
            .ok_or_else(|| RepositoryError::InvalidData(format!("case {case_id} is not stored")))
    }

    /// Check every update targets a stored step before anything is written.
    fn check_updates(&self, case_id: &str, updates: &[DueDateUpdate]) -> RepositoryResult<()> {
        let steps = self.steps.get(case_id).map(Vec::as_slice).unwrap_or(&[]);
        for update in updates {
            if !steps.iter().any(|s| s.template_step_id == update.step_id) {
                return Err(RepositoryError::InvalidData(format!(
                    "case {case_id} has no step {}",
                    update.step_id
                )));
            }
        }
        Ok(())
    }

    fn apply_updates(&mut self, case_id: &str, updates: &[DueDateUpdate]) {
        if let Some(steps) = self.steps.get_mut(case_id) {
            for update in updates {
                if let Some(step) = steps
                    .iter_mut()
                    .find(|s| s.template_step_id == update.step_id)
                {
                    step.due_date = update.due_date;
                }
            }
        }
    }
}

/// Process-local repository. A single write lock makes every batch atomic.
#[derive(Default)]
pub struct InMemoryRepository {
    state: RwLock<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_holidays<I>(holidays: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let repo = Self::default();
        repo.state.write().holidays.extend(holidays);
        repo
    }
}

impl CaseRepository for InMemoryRepository {
    fn load_template(&self, template_id: &str) -> RepositoryResult<Option<ProcessTemplate>> {
        Ok(self.state.read().templates.get(template_id).cloned())
    }

    fn save_template(&self, template: &ProcessTemplate) -> RepositoryResult<()> {
        self.state
            .write()
            .templates
            .insert(template.id.clone(), template.clone());
        Ok(())
    }

    fn load_case(&self, case_id: &str) -> RepositoryResult<Option<CaseRecord>> {
        Ok(self.state.read().cases.get(case_id).cloned())
    }

    fn insert_case(&self, case: &CaseRecord, steps: &[StepInstance]) -> RepositoryResult<bool> {
        let mut state = self.state.write();
        if state.cases.contains_key(&case.id) {
            return Ok(false);
        }
        state.cases.insert(case.id.clone(), case.clone());
        state.steps.insert(case.id.clone(), steps.to_vec());
        Ok(true)
    }

    fn load_step_instances(&self, case_id: &str) -> RepositoryResult<Vec<StepInstance>> {
        Ok(self
            .state
            .read()
            .steps
            .get(case_id)
            .cloned()
            .unwrap_or_default())
    }

    fn save_step_instance_due_dates(
        &self,
        case_id: &str,
        updates: &[DueDateUpdate],
    ) -> RepositoryResult<()> {
        let mut state = self.state.write();
        state.check_updates(case_id, updates)?;
        state.case_mut(case_id)?.version += 1;
        state.apply_updates(case_id, updates);
        Ok(())
    }

    fn save_case_goal_date(&self, case_id: &str, goal_date: NaiveDate) -> RepositoryResult<()> {
        let mut state = self.state.write();
        let case = state.case_mut(case_id)?;
        case.goal_date = goal_date;
        case.version += 1;
        Ok(())
    }

    fn update_step_instance(
        &self,
        case_id: &str,
        expected_version: u64,
        step: &StepInstance,
    ) -> RepositoryResult<bool> {
        let mut state = self.state.write();
        match state.cases.get(case_id) {
            None => return Ok(false),
            Some(case) if case.version != expected_version => {
                return Err(RepositoryError::VersionConflict {
                    case_id: case_id.to_string(),
                });
            }
            Some(_) => {}
        }
        let Some(stored) = state
            .steps
            .get_mut(case_id)
            .and_then(|steps| {
                steps
                    .iter_mut()
                    .find(|s| s.template_step_id == step.template_step_id)
            })
        else {
            return Ok(false);
        };
        *stored = step.clone();
        state.case_mut(case_id)?.version += 1;
        Ok(true)
    }

    fn commit_replan(&self, batch: &ReplanBatch) -> RepositoryResult<()> {
        let mut state = self.state.write();
        let current = state.case_mut(&batch.case_id)?.version;
        if current != batch.expected_version {
            return Err(RepositoryError::VersionConflict {
                case_id: batch.case_id.clone(),
            });
        }
        state.check_updates(&batch.case_id, &batch.updates)?;
        state.apply_updates(&batch.case_id, &batch.updates);
        let case = state.case_mut(&batch.case_id)?;
        case.goal_date = batch.goal_date;
        case.version += 1;
        Ok(())
    }
}

impl HolidaySource for InMemoryRepository {
    fn list_holidays(&self) -> RepositoryResult<Vec<NaiveDate>> {
        Ok(self.state.read().holidays.iter().copied().collect())
    }
}

impl HolidayStore for InMemoryRepository {
    fn add_holiday(&self, date: NaiveDate) -> RepositoryResult<bool> {
        Ok(self.state.write().holidays.insert(date))
    }

    fn remove_holiday(&self, date: NaiveDate) -> RepositoryResult<bool> {
        Ok(self.state.write().holidays.remove(&date))
    }
}
