use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::calendar::BusinessCalendar;
use crate::error::ScheduleResult;
use crate::graph::{DependencyGraph, DependencyRef, ScheduleWarning};
use crate::step::{ScheduleRequest, StepId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedStep {
    pub step_id: StepId,
    pub due_date: NaiveDate,
    pub anchor_date_used: NaiveDate,
    pub resolved_dependencies: Vec<DependencyRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedSchedule {
    pub goal_date: NaiveDate,
    /// In the order the steps were given, not evaluation order.
    pub steps: Vec<ComputedStep>,
    pub warnings: Vec<ScheduleWarning>,
}

impl ComputedSchedule {
    pub fn find(&self, step_id: &str) -> Option<&ComputedStep> {
        self.steps.iter().find(|step| step.step_id == step_id)
    }

    pub fn due_date(&self, step_id: &str) -> Option<NaiveDate> {
        self.find(step_id).map(|step| step.due_date)
    }
}

/// Assigns a due date to every step of a request. Pure: no state beyond the calendar borrow.
pub struct DueDateCalculator<'a> {
    calendar: &'a BusinessCalendar,
}

impl<'a> DueDateCalculator<'a> {
    pub fn new(calendar: &'a BusinessCalendar) -> Self {
        Self { calendar }
    }

    pub fn execute(&self, request: &ScheduleRequest) -> ScheduleResult<ComputedSchedule> {
        self.execute_with_pins(request, &HashMap::new())
    }

    /// Like [`execute`](Self::execute), but successors of a pinned step read the pinned
    /// date instead of that step's recomputed due date. The pinned step's own result is
    /// still the recomputed one.
    pub fn execute_with_pins(
        &self,
        request: &ScheduleRequest,
        pins: &HashMap<StepId, NaiveDate>,
    ) -> ScheduleResult<ComputedSchedule> {
        let plan = DependencyGraph::build(&request.steps)?.evaluation_plan()?;

        // Dates successors read, keyed by step id
        let mut visible: HashMap<&str, NaiveDate> = HashMap::with_capacity(plan.order.len());
        let mut computed: HashMap<&str, ComputedStep> = HashMap::with_capacity(plan.order.len());

        for planned in &plan.order {
            let anchor_date = planned
                .dependencies
                .iter()
                .map(|dep| match dep {
                    DependencyRef::Goal => request.goal_date,
                    // Evaluation order guarantees every dependency is already resolved
                    DependencyRef::Step(id) => visible[id.as_str()],
                })
                .max()
                .unwrap_or(request.goal_date);

            let due_date = self
                .calendar
                .add_business_days(anchor_date, planned.offset_days);

            let id = planned.step_id.as_str();
            visible.insert(id, pins.get(id).copied().unwrap_or(due_date));
            computed.insert(
                id,
                ComputedStep {
                    step_id: planned.step_id.clone(),
                    due_date,
                    anchor_date_used: anchor_date,
                    resolved_dependencies: planned.dependencies.clone(),
                },
            );
        }

        let steps = request
            .steps
            .iter()
            .filter_map(|step| computed.remove(step.id.as_str()))
            .collect::<Vec<_>>();

        tracing::debug!(
            goal_date = %request.goal_date,
            steps = steps.len(),
            warnings = plan.warnings.len(),
            "computed schedule"
        );

        Ok(ComputedSchedule {
            goal_date: request.goal_date,
            steps,
            warnings: plan.warnings,
        })
    }
}
