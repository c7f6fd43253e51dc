use crate::error::{ScheduleError, ScheduleResult};
use crate::step::StepDefinition;
use std::collections::HashSet;

pub fn validate_step(step: &StepDefinition) -> ScheduleResult<()> {
    if step.sequence < 1 {
        return Err(ScheduleError::InvalidSequence {
            step_id: step.id.clone(),
            sequence: step.sequence,
            reason: "sequence numbers start at 1",
        });
    }
    let max = StepDefinition::MAX_OFFSET_DAYS;
    if step.offset_days.unsigned_abs() > max.unsigned_abs() {
        return Err(ScheduleError::InvalidOffset {
            step_id: step.id.clone(),
            offset_days: step.offset_days,
            max,
        });
    }
    Ok(())
}

/// Structural checks that do not need the dependency graph.
pub fn validate_step_collection(steps: &[StepDefinition]) -> ScheduleResult<()> {
    let mut seen_ids = HashSet::with_capacity(steps.len());
    let mut seen_sequences = HashSet::with_capacity(steps.len());
    for step in steps {
        if !seen_ids.insert(step.id.as_str()) {
            return Err(ScheduleError::DuplicateStep {
                step_id: step.id.clone(),
            });
        }
        validate_step(step)?;
        if !seen_sequences.insert(step.sequence) {
            return Err(ScheduleError::InvalidSequence {
                step_id: step.id.clone(),
                sequence: step.sequence,
                reason: "sequence is shared with another step",
            });
        }
    }
    Ok(())
}
