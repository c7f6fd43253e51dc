pub mod calculations;
pub mod calendar;
pub mod config;
pub mod error;
pub mod graph;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod notification;
pub mod persistence;
pub mod replan;
pub mod report;
pub mod step;
pub(crate) mod step_validation;
pub mod telemetry;

pub use calculations::business_days::add_business_days;
pub use calculations::due_dates::{ComputedSchedule, ComputedStep, DueDateCalculator};
pub use calendar::{BusinessCalendar, CalendarConfig, Direction, SharedCalendar};
pub use config::AppConfig;
pub use error::{RepositoryError, ScheduleError};
pub use graph::{DependencyGraph, DependencyRef, EvaluationPlan, ScheduleWarning};
pub use notification::{
    BroadcastNotifier, NotificationSink, RecordingNotifier, ScheduleEvent, TracingNotifier,
};
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqliteCaseStore;
pub use persistence::{
    CaseRepository, DueDateUpdate, HolidayFile, HolidaySource, HolidayStore, InMemoryRepository,
    ReplanBatch, StaticHolidays,
};
pub use replan::{LockPropagation, ReplanAttempt, ReplanDiffEntry, ReplanEngine, ReplanState};
pub use step::{
    Anchor, CaseRecord, ProcessTemplate, ScheduleRequest, StepDefinition, StepInstance, StepStatus,
};
