use case_schedule::{
    BusinessCalendar, DependencyGraph, DependencyRef, DueDateCalculator, ScheduleError,
    ScheduleRequest, ScheduleWarning, StepDefinition, add_business_days,
};
use chrono::{Datelike, NaiveDate, Weekday};

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn three_step_chain() -> Vec<StepDefinition> {
    vec![
        StepDefinition::goal("step1", 1, -10).with_name("Prepare filing"),
        StepDefinition::after_previous("step2", 2, 3).with_name("Review"),
        StepDefinition::after_previous("step3", 3, 2).with_name("Submit"),
    ]
}

#[test]
fn three_step_chain_before_year_end() {
    let cal = BusinessCalendar::default();
    let request = ScheduleRequest::new(d(2025, 12, 31), three_step_chain());
    let schedule = DueDateCalculator::new(&cal).execute(&request).unwrap();

    let step1 = schedule.due_date("step1").unwrap();
    let step2 = schedule.due_date("step2").unwrap();
    let step3 = schedule.due_date("step3").unwrap();

    assert_eq!(step1, d(2025, 12, 17));
    assert_eq!(step1, add_business_days(&cal, d(2025, 12, 31), -10));
    assert_eq!(step2, d(2025, 12, 22));
    assert_eq!(step2, add_business_days(&cal, step1, 3));
    assert_eq!(step3, d(2025, 12, 24));
    assert_eq!(step3, add_business_days(&cal, step2, 2));

    for step in &schedule.steps {
        assert!(!matches!(step.due_date.weekday(), Weekday::Sat | Weekday::Sun));
    }
    assert!(schedule.warnings.is_empty());
}

#[test]
fn identical_inputs_give_identical_schedules() {
    let cal = BusinessCalendar::with_holidays([d(2025, 12, 25), d(2025, 12, 26)]);
    let request = ScheduleRequest::new(
        d(2026, 1, 15),
        vec![
            StepDefinition::goal("intake", 1, -25),
            StepDefinition::after_previous("draft", 2, 4),
            StepDefinition::goal("review", 3, -6),
            StepDefinition::after("sign", 4, 1, ["draft", "review"]),
        ],
    );
    let calculator = DueDateCalculator::new(&cal);
    let first = calculator.execute(&request).unwrap();
    let second = calculator.execute(&request).unwrap();
    assert_eq!(first, second);
}

#[test]
fn every_due_date_is_a_business_day() {
    let holidays = [
        d(2025, 12, 24),
        d(2025, 12, 25),
        d(2025, 12, 26),
        d(2026, 1, 1),
    ];
    let cal = BusinessCalendar::with_holidays(holidays);
    let steps = vec![
        StepDefinition::goal("a", 1, 0),
        StepDefinition::goal("b", 2, -3),
        StepDefinition::after_previous("c", 3, 2),
        StepDefinition::after_previous("d", 4, -7),
        StepDefinition::after("e", 5, 0, ["a", "d"]),
    ];
    // Goal dates on weekends and holidays included
    for goal in [d(2025, 12, 25), d(2025, 12, 27), d(2026, 1, 1), d(2026, 1, 9)] {
        let schedule = DueDateCalculator::new(&cal)
            .execute(&ScheduleRequest::new(goal, steps.clone()))
            .unwrap();
        for step in &schedule.steps {
            assert!(
                cal.is_business_day(step.due_date),
                "{} due {} for goal {}",
                step.step_id,
                step.due_date,
                goal
            );
        }
    }
}

#[test]
fn anchors_never_precede_dependency_due_dates() {
    let cal = BusinessCalendar::default();
    let steps = vec![
        StepDefinition::after("merge", 4, 2, ["left", "right"]),
        StepDefinition::after_previous("right", 3, -4),
        StepDefinition::goal("left", 1, -12),
        StepDefinition::after_previous("middle", 2, 5),
    ];
    let schedule = DueDateCalculator::new(&cal)
        .execute(&ScheduleRequest::new(d(2026, 6, 30), steps))
        .unwrap();

    for step in &schedule.steps {
        for dep in &step.resolved_dependencies {
            let dep_date = match dep {
                DependencyRef::Goal => schedule.goal_date,
                DependencyRef::Step(id) => schedule.due_date(id).unwrap(),
            };
            assert!(dep_date <= step.anchor_date_used, "{}", step.step_id);
        }
    }
    // Output keeps the input order
    let ids: Vec<&str> = schedule.steps.iter().map(|s| s.step_id.as_str()).collect();
    assert_eq!(ids, ["merge", "right", "left", "middle"]);
}

#[test]
fn two_step_cycle_returns_no_schedule() {
    let cal = BusinessCalendar::default();
    let request = ScheduleRequest::new(
        d(2026, 1, 15),
        vec![
            StepDefinition::goal("start", 1, -5),
            StepDefinition::after("a", 2, 1, ["b"]),
            StepDefinition::after("b", 3, 1, ["a"]),
        ],
    );
    match DueDateCalculator::new(&cal).execute(&request) {
        Err(ScheduleError::CyclicDependency { involved_step_ids }) => {
            assert_eq!(involved_step_ids, vec!["a".to_string(), "b".to_string()]);
        }
        other => panic!("expected cyclic dependency, got {:?}", other),
    }
}

#[test]
fn unknown_dependency_is_reported() {
    let steps = vec![
        StepDefinition::goal("a", 1, -5),
        StepDefinition::after("b", 2, 1, ["a", "ghost"]),
    ];
    match DependencyGraph::build(&steps) {
        Err(ScheduleError::UnknownDependency {
            step_id,
            missing_dependency_id,
        }) => {
            assert_eq!(step_id, "b");
            assert_eq!(missing_dependency_id, "ghost");
        }
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("expected unknown dependency"),
    }
}

#[test]
fn first_step_anchored_to_previous_falls_back_to_goal() {
    let cal = BusinessCalendar::default();
    let goal = d(2026, 2, 27);
    let schedule = DueDateCalculator::new(&cal)
        .execute(&ScheduleRequest::new(
            goal,
            vec![
                StepDefinition::after_previous("first", 1, -2),
                StepDefinition::after_previous("second", 2, 1),
            ],
        ))
        .unwrap();

    assert_eq!(
        schedule.warnings,
        vec![ScheduleWarning::MissingPredecessor {
            step_id: "first".into(),
            sequence: 1
        }]
    );
    let first = schedule.find("first").unwrap();
    assert_eq!(first.resolved_dependencies, vec![DependencyRef::Goal]);
    assert_eq!(first.due_date, d(2026, 2, 25));
    assert_eq!(schedule.due_date("second"), Some(d(2026, 2, 26)));
}

#[test]
fn evaluation_plan_orders_dependencies_first() {
    let steps = vec![
        StepDefinition::after_previous("c", 3, 1),
        StepDefinition::after_previous("b", 2, 1),
        StepDefinition::goal("a", 1, -3),
    ];
    let plan = DependencyGraph::build(&steps)
        .unwrap()
        .evaluation_plan()
        .unwrap();
    let order: Vec<&str> = plan.order.iter().map(|p| p.step_id.as_str()).collect();
    assert_eq!(order, ["a", "b", "c"]);
    assert_eq!(
        plan.order[1].dependencies,
        vec![DependencyRef::Step("a".into())]
    );
}
