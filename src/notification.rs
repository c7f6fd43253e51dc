//! Notification sinks the replan engine reports changes to.

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::step::{CaseId, StepId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScheduleEvent {
    StepRescheduled {
        case_id: CaseId,
        step_id: StepId,
        old_date: NaiveDate,
        new_date: NaiveDate,
    },
    CaseReplanned {
        case_id: CaseId,
    },
}

/// Transport-agnostic receiver of schedule changes. Delivery is fire-and-forget.
pub trait NotificationSink: Send + Sync {
    fn notify_step_rescheduled(
        &self,
        case_id: &str,
        step_id: &str,
        old_date: NaiveDate,
        new_date: NaiveDate,
    );

    fn notify_case_replanned(&self, case_id: &str);
}

/// Writes every event to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify_step_rescheduled(
        &self,
        case_id: &str,
        step_id: &str,
        old_date: NaiveDate,
        new_date: NaiveDate,
    ) {
        tracing::info!(case_id, step_id, %old_date, %new_date, "step rescheduled");
    }

    fn notify_case_replanned(&self, case_id: &str) {
        tracing::info!(case_id, "case replanned");
    }
}

/// Keeps every event in memory, in delivery order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<ScheduleEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ScheduleEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<ScheduleEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify_step_rescheduled(
        &self,
        case_id: &str,
        step_id: &str,
        old_date: NaiveDate,
        new_date: NaiveDate,
    ) {
        self.events.lock().push(ScheduleEvent::StepRescheduled {
            case_id: case_id.to_string(),
            step_id: step_id.to_string(),
            old_date,
            new_date,
        });
    }

    fn notify_case_replanned(&self, case_id: &str) {
        self.events.lock().push(ScheduleEvent::CaseReplanned {
            case_id: case_id.to_string(),
        });
    }
}

/// Fans events out to live subscribers over a tokio broadcast channel.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<ScheduleEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScheduleEvent> {
        self.tx.subscribe()
    }

    fn publish(&self, event: ScheduleEvent) {
        // No subscribers is not an error
        let _ = self.tx.send(event);
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl NotificationSink for BroadcastNotifier {
    fn notify_step_rescheduled(
        &self,
        case_id: &str,
        step_id: &str,
        old_date: NaiveDate,
        new_date: NaiveDate,
    ) {
        self.publish(ScheduleEvent::StepRescheduled {
            case_id: case_id.to_string(),
            step_id: step_id.to_string(),
            old_date,
            new_date,
        });
    }

    fn notify_case_replanned(&self, case_id: &str) {
        self.publish(ScheduleEvent::CaseReplanned {
            case_id: case_id.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_delivers_to_subscriber() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe();
        notifier.notify_case_replanned("case-1");
        assert_eq!(
            rx.try_recv().unwrap(),
            ScheduleEvent::CaseReplanned {
                case_id: "case-1".into()
            }
        );
    }

    #[test]
    fn broadcast_without_subscribers_is_silent() {
        let notifier = BroadcastNotifier::default();
        notifier.notify_case_replanned("case-1");
    }
}
