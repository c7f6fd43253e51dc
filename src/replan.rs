use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::calculations::due_dates::{ComputedSchedule, DueDateCalculator};
use crate::calendar::SharedCalendar;
use crate::error::{ScheduleError, ScheduleResult};
use crate::graph::{DependencyGraph, ScheduleWarning};
use crate::notification::NotificationSink;
use crate::persistence::{CaseRepository, DueDateUpdate, ReplanBatch};
use crate::step::{
    CaseId, CaseRecord, ProcessTemplate, ScheduleRequest, StepDefinition, StepId, StepInstance,
};

/// Which date a locked step hands to its successors during a replan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockPropagation {
    /// Successors read the locked step's fresh recomputation; the lock only
    /// suppresses the write-back for the step itself.
    #[default]
    Recomputed,
    /// Successors read the locked step's stored due date.
    Stored,
}

impl FromStr for LockPropagation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recomputed" => Ok(LockPropagation::Recomputed),
            "stored" => Ok(LockPropagation::Stored),
            other => Err(format!("unknown lock propagation '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplanState {
    Requested,
    Previewed,
    Applied,
    Discarded,
}

impl ReplanState {
    fn can_move_to(self, next: ReplanState) -> bool {
        matches!(
            (self, next),
            (ReplanState::Requested, ReplanState::Previewed)
                | (ReplanState::Previewed, ReplanState::Applied)
                | (ReplanState::Previewed, ReplanState::Discarded)
                | (ReplanState::Requested, ReplanState::Discarded)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ReplanState::Applied | ReplanState::Discarded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplanDiffEntry {
    pub step_id: StepId,
    pub previous_due_date: NaiveDate,
    pub proposed_due_date: NaiveDate,
    pub changed: bool,
    /// A locked entry always proposes its previous date and is never `changed`.
    pub locked: bool,
}

/// One replan of one case, from request to apply or discard. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ReplanAttempt {
    case_id: CaseId,
    new_goal_date: NaiveDate,
    state: ReplanState,
    entries: Vec<ReplanDiffEntry>,
    warnings: Vec<ScheduleWarning>,
}

impl ReplanAttempt {
    pub fn new(case_id: impl Into<CaseId>, new_goal_date: NaiveDate) -> Self {
        Self {
            case_id: case_id.into(),
            new_goal_date,
            state: ReplanState::Requested,
            entries: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    pub fn new_goal_date(&self) -> NaiveDate {
        self.new_goal_date
    }

    pub fn state(&self) -> ReplanState {
        self.state
    }

    /// The diff shown for review; apply recomputes rather than trusting it.
    pub fn entries(&self) -> &[ReplanDiffEntry] {
        &self.entries
    }

    pub fn warnings(&self) -> &[ScheduleWarning] {
        &self.warnings
    }

    pub fn changed_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.changed).count()
    }

    pub fn discard(&mut self) -> ScheduleResult<()> {
        self.transition(ReplanState::Discarded)
    }

    fn transition(&mut self, next: ReplanState) -> ScheduleResult<()> {
        if !self.state.can_move_to(next) {
            return Err(ScheduleError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

struct ReplanPlan {
    case: CaseRecord,
    instances: Vec<StepInstance>,
    entries: Vec<ReplanDiffEntry>,
    warnings: Vec<ScheduleWarning>,
}

/// Computes initial schedules and replans cases against the injected collaborators.
pub struct ReplanEngine {
    repository: Arc<dyn CaseRepository>,
    notifier: Arc<dyn NotificationSink>,
    calendar: SharedCalendar,
    lock_propagation: LockPropagation,
}

impl ReplanEngine {
    pub fn new(
        repository: Arc<dyn CaseRepository>,
        notifier: Arc<dyn NotificationSink>,
        calendar: SharedCalendar,
    ) -> Self {
        Self {
            repository,
            notifier,
            calendar,
            lock_propagation: LockPropagation::default(),
        }
    }

    pub fn with_lock_propagation(mut self, lock_propagation: LockPropagation) -> Self {
        self.lock_propagation = lock_propagation;
        self
    }

    pub fn calendar(&self) -> &SharedCalendar {
        &self.calendar
    }

    pub fn repository(&self) -> &Arc<dyn CaseRepository> {
        &self.repository
    }

    pub fn lock_propagation(&self) -> LockPropagation {
        self.lock_propagation
    }

    /// Check a template's dependency graph without computing dates.
    pub fn validate_template(&self, steps: &[StepDefinition]) -> ScheduleResult<Vec<ScheduleWarning>> {
        let graph = DependencyGraph::build(steps)?;
        graph.evaluation_plan()?;
        Ok(graph.warnings().to_vec())
    }

    /// Validate then store a template. Invalid templates are never stored.
    pub fn register_template(
        &self,
        template: &ProcessTemplate,
    ) -> ScheduleResult<Vec<ScheduleWarning>> {
        let warnings = self.validate_template(&template.steps)?;
        self.repository.save_template(template)?;
        tracing::info!(
            template_id = %template.id,
            steps = template.steps.len(),
            warnings = warnings.len(),
            "template registered"
        );
        Ok(warnings)
    }

    pub fn compute_schedule(&self, request: &ScheduleRequest) -> ScheduleResult<ComputedSchedule> {
        let calendar = self.calendar.snapshot();
        DueDateCalculator::new(&calendar).execute(request)
    }

    pub fn compute_initial_schedule(
        &self,
        template_id: &str,
        goal_date: NaiveDate,
    ) -> ScheduleResult<ComputedSchedule> {
        let steps = self.load_definitions(template_id)?;
        self.compute_schedule(&ScheduleRequest::new(goal_date, steps))
    }

    /// Instantiate a case from a template with its initial schedule.
    pub fn create_case(
        &self,
        case_id: &str,
        template_id: &str,
        goal_date: NaiveDate,
    ) -> ScheduleResult<Vec<StepInstance>> {
        if self.repository.load_case(case_id)?.is_some() {
            return Err(ScheduleError::CaseAlreadyExists {
                case_id: case_id.to_string(),
            });
        }
        let schedule = self.compute_initial_schedule(template_id, goal_date)?;
        let instances: Vec<StepInstance> = schedule
            .steps
            .iter()
            .map(|step| StepInstance::new(case_id, step.step_id.clone(), step.due_date))
            .collect();
        let case = CaseRecord {
            id: case_id.to_string(),
            template_id: template_id.to_string(),
            goal_date,
            version: 0,
        };
        if !self.repository.insert_case(&case, &instances)? {
            return Err(ScheduleError::CaseAlreadyExists {
                case_id: case_id.to_string(),
            });
        }
        tracing::info!(case_id, template_id, %goal_date, steps = instances.len(), "case created");
        Ok(instances)
    }

    pub fn load_case(&self, case_id: &str) -> ScheduleResult<(CaseRecord, Vec<StepInstance>)> {
        let case = self.require_case(case_id)?;
        let instances = self.repository.load_step_instances(case_id)?;
        Ok((case, instances))
    }

    pub fn set_step_locked(
        &self,
        case_id: &str,
        step_id: &str,
        locked: bool,
    ) -> ScheduleResult<StepInstance> {
        self.edit_step(case_id, step_id, |step| step.locked = locked)
    }

    /// Manual due-date edit. Pass `lock = true` to protect it from later replans.
    pub fn override_step_due_date(
        &self,
        case_id: &str,
        step_id: &str,
        due_date: NaiveDate,
        lock: bool,
    ) -> ScheduleResult<StepInstance> {
        self.edit_step(case_id, step_id, |step| {
            step.due_date = due_date;
            step.locked = step.locked || lock;
        })
    }

    fn edit_step(
        &self,
        case_id: &str,
        step_id: &str,
        mutator: impl FnOnce(&mut StepInstance),
    ) -> ScheduleResult<StepInstance> {
        let (case, instances) = self.load_case(case_id)?;
        let not_found = || ScheduleError::StepNotFound {
            case_id: case_id.to_string(),
            step_id: step_id.to_string(),
        };
        let mut step = instances
            .into_iter()
            .find(|s| s.template_step_id == step_id)
            .ok_or_else(not_found)?;
        mutator(&mut step);
        let updated = self
            .repository
            .update_step_instance(case_id, case.version, &step)?;
        if !updated {
            return Err(not_found());
        }
        Ok(step)
    }

    /// Diff of what a replan to `new_goal_date` would change. Writes nothing.
    pub fn preview_replan(
        &self,
        case_id: &str,
        new_goal_date: NaiveDate,
    ) -> ScheduleResult<Vec<ReplanDiffEntry>> {
        Ok(self.plan(case_id, new_goal_date)?.entries)
    }

    /// Start an attempt and move it to `Previewed`.
    pub fn stage_replan(
        &self,
        case_id: &str,
        new_goal_date: NaiveDate,
    ) -> ScheduleResult<ReplanAttempt> {
        let mut attempt = ReplanAttempt::new(case_id, new_goal_date);
        let plan = self.plan(case_id, new_goal_date)?;
        attempt.entries = plan.entries;
        attempt.warnings = plan.warnings;
        attempt.transition(ReplanState::Previewed)?;
        tracing::debug!(
            case_id,
            changed = attempt.changed_count(),
            "replan previewed"
        );
        Ok(attempt)
    }

    /// Apply a previewed attempt. Dates are recomputed from current data.
    pub fn commit_replan(&self, attempt: &mut ReplanAttempt) -> ScheduleResult<Vec<StepInstance>> {
        if attempt.state != ReplanState::Previewed {
            return Err(ScheduleError::InvalidTransition {
                from: attempt.state,
                to: ReplanState::Applied,
            });
        }
        let (entries, instances) = self.apply(&attempt.case_id, attempt.new_goal_date)?;
        attempt.entries = entries;
        attempt.transition(ReplanState::Applied)?;
        Ok(instances)
    }

    /// Recompute and persist the schedule for `new_goal_date`, leaving locked steps alone.
    pub fn apply_replan(
        &self,
        case_id: &str,
        new_goal_date: NaiveDate,
    ) -> ScheduleResult<Vec<StepInstance>> {
        Ok(self.apply(case_id, new_goal_date)?.1)
    }

    fn apply(
        &self,
        case_id: &str,
        new_goal_date: NaiveDate,
    ) -> ScheduleResult<(Vec<ReplanDiffEntry>, Vec<StepInstance>)> {
        let plan = self.plan(case_id, new_goal_date)?;
        let updates: Vec<DueDateUpdate> = plan
            .entries
            .iter()
            .filter(|entry| entry.changed)
            .map(|entry| DueDateUpdate {
                step_id: entry.step_id.clone(),
                due_date: entry.proposed_due_date,
            })
            .collect();

        let batch = ReplanBatch {
            case_id: case_id.to_string(),
            expected_version: plan.case.version,
            goal_date: new_goal_date,
            updates,
        };
        self.repository.commit_replan(&batch)?;

        for entry in plan.entries.iter().filter(|entry| entry.changed) {
            self.notifier.notify_step_rescheduled(
                case_id,
                &entry.step_id,
                entry.previous_due_date,
                entry.proposed_due_date,
            );
        }
        self.notifier.notify_case_replanned(case_id);

        let new_dates: HashMap<&str, NaiveDate> = batch
            .updates
            .iter()
            .map(|update| (update.step_id.as_str(), update.due_date))
            .collect();
        let instances = plan
            .instances
            .into_iter()
            .map(|mut instance| {
                if let Some(date) = new_dates.get(instance.template_step_id.as_str()) {
                    instance.due_date = *date;
                }
                instance
            })
            .collect();

        tracing::info!(
            case_id,
            %new_goal_date,
            changed = batch.updates.len(),
            "replan applied"
        );
        Ok((plan.entries, instances))
    }

    fn plan(&self, case_id: &str, new_goal_date: NaiveDate) -> ScheduleResult<ReplanPlan> {
        // Version is read before the steps so a write in between fails the commit
        let case = self.require_case(case_id)?;
        let steps = self.load_definitions(&case.template_id)?;
        let instances = self.repository.load_step_instances(case_id)?;

        let pins: HashMap<StepId, NaiveDate> = match self.lock_propagation {
            LockPropagation::Recomputed => HashMap::new(),
            LockPropagation::Stored => instances
                .iter()
                .filter(|instance| instance.locked)
                .map(|instance| (instance.template_step_id.clone(), instance.due_date))
                .collect(),
        };

        let calendar = self.calendar.snapshot();
        let schedule = DueDateCalculator::new(&calendar)
            .execute_with_pins(&ScheduleRequest::new(new_goal_date, steps), &pins)?;

        let mut entries = Vec::with_capacity(instances.len());
        for instance in &instances {
            let Some(recomputed) = schedule.due_date(&instance.template_step_id) else {
                tracing::warn!(
                    case_id,
                    step_id = %instance.template_step_id,
                    "step instance has no definition in its template; left unchanged"
                );
                continue;
            };
            let proposed_due_date = if instance.locked {
                instance.due_date
            } else {
                recomputed
            };
            entries.push(ReplanDiffEntry {
                step_id: instance.template_step_id.clone(),
                previous_due_date: instance.due_date,
                proposed_due_date,
                changed: proposed_due_date != instance.due_date,
                locked: instance.locked,
            });
        }

        Ok(ReplanPlan {
            case,
            instances,
            entries,
            warnings: schedule.warnings,
        })
    }

    fn require_case(&self, case_id: &str) -> ScheduleResult<CaseRecord> {
        self.repository
            .load_case(case_id)?
            .ok_or_else(|| ScheduleError::CaseNotFound {
                case_id: case_id.to_string(),
            })
    }

    fn load_definitions(&self, template_id: &str) -> ScheduleResult<Vec<StepDefinition>> {
        self.repository
            .load_step_definitions(template_id)?
            .ok_or_else(|| ScheduleError::TemplateNotFound {
                template_id: template_id.to_string(),
            })
    }
}
