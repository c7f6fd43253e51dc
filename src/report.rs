//! Tabular views of schedules and replan diffs.

use chrono::NaiveDate;
use polars::prelude::*;

use crate::calculations::due_dates::ComputedSchedule;
use crate::graph::DependencyRef;
use crate::replan::ReplanDiffEntry;
use crate::step::{Anchor, StepDefinition, StepInstance};

pub fn schedule_frame(schedule: &ComputedSchedule) -> PolarsResult<DataFrame> {
    let ids: Vec<&str> = schedule.steps.iter().map(|s| s.step_id.as_str()).collect();
    let anchors: Vec<NaiveDate> = schedule.steps.iter().map(|s| s.anchor_date_used).collect();
    let dues: Vec<NaiveDate> = schedule.steps.iter().map(|s| s.due_date).collect();
    let depends_on: Vec<String> = schedule
        .steps
        .iter()
        .map(|s| {
            s.resolved_dependencies
                .iter()
                .map(|dep| match dep {
                    DependencyRef::Goal => "goal",
                    DependencyRef::Step(id) => id.as_str(),
                })
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect();

    DataFrame::new(vec![
        Series::new(PlSmallStr::from_static("step_id"), ids).into_column(),
        Series::new(PlSmallStr::from_static("depends_on"), depends_on).into_column(),
        date_series("anchor_date", &anchors)?.into_column(),
        date_series("due_date", &dues)?.into_column(),
    ])
}

pub fn diff_frame(entries: &[ReplanDiffEntry]) -> PolarsResult<DataFrame> {
    let ids: Vec<&str> = entries.iter().map(|e| e.step_id.as_str()).collect();
    let previous: Vec<NaiveDate> = entries.iter().map(|e| e.previous_due_date).collect();
    let proposed: Vec<NaiveDate> = entries.iter().map(|e| e.proposed_due_date).collect();
    let changed: Vec<bool> = entries.iter().map(|e| e.changed).collect();
    let locked: Vec<bool> = entries.iter().map(|e| e.locked).collect();

    DataFrame::new(vec![
        Series::new(PlSmallStr::from_static("step_id"), ids).into_column(),
        date_series("previous_due_date", &previous)?.into_column(),
        date_series("proposed_due_date", &proposed)?.into_column(),
        Series::new(PlSmallStr::from_static("changed"), changed).into_column(),
        Series::new(PlSmallStr::from_static("locked"), locked).into_column(),
    ])
}

pub fn instances_frame(steps: &[StepInstance]) -> PolarsResult<DataFrame> {
    let ids: Vec<&str> = steps.iter().map(|s| s.template_step_id.as_str()).collect();
    let dues: Vec<NaiveDate> = steps.iter().map(|s| s.due_date).collect();
    let locked: Vec<bool> = steps.iter().map(|s| s.locked).collect();
    let status: Vec<&str> = steps.iter().map(|s| s.status.as_str()).collect();

    DataFrame::new(vec![
        Series::new(PlSmallStr::from_static("step_id"), ids).into_column(),
        date_series("due_date", &dues)?.into_column(),
        Series::new(PlSmallStr::from_static("locked"), locked).into_column(),
        Series::new(PlSmallStr::from_static("status"), status).into_column(),
    ])
}

pub fn definitions_frame(steps: &[StepDefinition]) -> PolarsResult<DataFrame> {
    let ids: Vec<&str> = steps.iter().map(|s| s.id.as_str()).collect();
    let names: Vec<&str> = steps.iter().map(|s| s.name.as_str()).collect();
    let sequences: Vec<i32> = steps.iter().map(|s| s.sequence).collect();
    let anchors: Vec<String> = steps
        .iter()
        .map(|s| match &s.anchor {
            Anchor::ExplicitDependencies(deps) if !deps.is_empty() => deps.join(","),
            anchor => anchor.as_str().to_string(),
        })
        .collect();
    let offsets: Vec<i64> = steps.iter().map(|s| s.offset_days).collect();

    DataFrame::new(vec![
        Series::new(PlSmallStr::from_static("sequence"), sequences).into_column(),
        Series::new(PlSmallStr::from_static("step_id"), ids).into_column(),
        Series::new(PlSmallStr::from_static("name"), names).into_column(),
        Series::new(PlSmallStr::from_static("anchor"), anchors).into_column(),
        Series::new(PlSmallStr::from_static("offset_days"), offsets).into_column(),
    ])
}

/// Count of rows flagged `changed` in a diff frame.
pub fn changed_count(diff: &DataFrame) -> PolarsResult<usize> {
    Ok(diff
        .column("changed")?
        .bool()?
        .into_iter()
        .filter(|value| *value == Some(true))
        .count())
}

/// Render a frame as a boxed ASCII table.
pub fn render_text_table(df: &DataFrame) -> String {
    let columns = df.get_columns();
    let col_names: Vec<String> = columns.iter().map(|c| c.name().to_string()).collect();

    let mut cells: Vec<Vec<String>> = Vec::with_capacity(df.height());
    for row_idx in 0..df.height() {
        cells.push(
            columns
                .iter()
                .map(|col| col.get(row_idx).map(|av| cell_text(&av)).unwrap_or_default())
                .collect(),
        );
    }

    let mut widths: Vec<usize> = col_names.iter().map(|n| n.len()).collect();
    for row in &cells {
        for (ci, cell) in row.iter().enumerate() {
            widths[ci] = widths[ci].max(cell.len());
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    push_row(&mut out, &col_names, &widths);
    out.push_str(&sep);
    out.push('\n');
    for row in &cells {
        push_row(&mut out, row, &widths);
    }
    out.push_str(&sep);
    out.push('\n');
    out
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    out.push('|');
    for (cell, width) in cells.iter().zip(widths) {
        out.push(' ');
        out.push_str(cell);
        out.push_str(&" ".repeat(width.saturating_sub(cell.len())));
        out.push_str(" |");
    }
    out.push('\n');
}

fn cell_text(av: &AnyValue) -> String {
    match av {
        AnyValue::Null => String::new(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        _ => av.to_string(),
    }
}

fn date_series(name: &str, dates: &[NaiveDate]) -> PolarsResult<Series> {
    let days: Vec<i32> = dates.iter().map(|d| date_to_i32(*d)).collect();
    Series::new(name.into(), days).cast(&DataType::Date)
}

fn date_to_i32(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    (date - epoch).num_days() as i32
}
