use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type StepId = String;
pub type CaseId = String;
pub type TemplateId = String;

/// What a step's offset is measured from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "depends_on", rename_all = "snake_case")]
pub enum Anchor {
    #[serde(alias = "goal")]
    GoalDate,
    /// The step whose sequence is one less than this step's.
    #[serde(alias = "prev")]
    PreviousStep,
    /// Latest due date among the listed steps. An empty list falls back to `PreviousStep`.
    ExplicitDependencies(Vec<StepId>),
}

impl Anchor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Anchor::GoalDate => "goal",
            Anchor::PreviousStep => "prev",
            Anchor::ExplicitDependencies(_) => "explicit",
        }
    }
}

/// Template-level step. Immutable once the template is published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub id: StepId,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// 1-based order hint, only used to locate the previous step.
    pub sequence: i32,
    pub anchor: Anchor,
    /// Business days relative to the anchor; negative is before, positive after.
    pub offset_days: i64,
}

impl StepDefinition {
    /// Largest accepted `offset_days` magnitude, roughly forty years of business days.
    pub const MAX_OFFSET_DAYS: i64 = 10_000;

    pub fn new(id: impl Into<StepId>, sequence: i32, anchor: Anchor, offset_days: i64) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            sequence,
            anchor,
            offset_days,
        }
    }

    pub fn goal(id: impl Into<StepId>, sequence: i32, offset_days: i64) -> Self {
        Self::new(id, sequence, Anchor::GoalDate, offset_days)
    }

    pub fn after_previous(id: impl Into<StepId>, sequence: i32, offset_days: i64) -> Self {
        Self::new(id, sequence, Anchor::PreviousStep, offset_days)
    }

    pub fn after<I, S>(id: impl Into<StepId>, sequence: i32, offset_days: i64, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StepId>,
    {
        let deps = deps.into_iter().map(Into::into).collect();
        Self::new(id, sequence, Anchor::ExplicitDependencies(deps), offset_days)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// A process template: the ordered step definitions a case is instantiated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessTemplate {
    pub id: TemplateId,
    #[serde(default)]
    pub name: String,
    pub steps: Vec<StepDefinition>,
}

impl ProcessTemplate {
    pub fn new(id: impl Into<TemplateId>, steps: Vec<StepDefinition>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            steps,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRequest {
    pub goal_date: NaiveDate,
    pub steps: Vec<StepDefinition>,
}

impl ScheduleRequest {
    pub fn new(goal_date: NaiveDate, steps: Vec<StepDefinition>) -> Self {
        Self { goal_date, steps }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    NotStarted,
    InProgress,
    Blocked,
    Done,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::NotStarted => "not_started",
            StepStatus::InProgress => "in_progress",
            StepStatus::Blocked => "blocked",
            StepStatus::Done => "done",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "not_started" | "todo" => Ok(StepStatus::NotStarted),
            "in_progress" | "doing" => Ok(StepStatus::InProgress),
            "blocked" => Ok(StepStatus::Blocked),
            "done" => Ok(StepStatus::Done),
            _ => Err(()),
        }
    }
}

/// Case-level step. `due_date` is never overwritten by a replan while `locked` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInstance {
    pub id: String,
    pub template_step_id: StepId,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub status: StepStatus,
}

impl StepInstance {
    pub fn new(case_id: &str, template_step_id: impl Into<StepId>, due_date: NaiveDate) -> Self {
        let template_step_id = template_step_id.into();
        Self {
            id: format!("{case_id}:{template_step_id}"),
            template_step_id,
            due_date,
            locked: false,
            status: StepStatus::NotStarted,
        }
    }
}

/// A case instantiated from a template. `version` is bumped by every committed write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: CaseId,
    pub template_id: TemplateId,
    pub goal_date: NaiveDate,
    #[serde(default)]
    pub version: u64,
}
