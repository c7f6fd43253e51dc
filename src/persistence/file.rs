use super::HolidaySource;
use crate::error::{RepositoryError, RepositoryResult};
use crate::step::ProcessTemplate;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

pub fn save_template_to_json<P: AsRef<Path>>(
    template: &ProcessTemplate,
    path: P,
) -> RepositoryResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, template)?;
    Ok(())
}

/// Read a template. Graph validation is left to the engine.
pub fn load_template_from_json<P: AsRef<Path>>(path: P) -> RepositoryResult<ProcessTemplate> {
    let file = File::open(path)?;
    let template: ProcessTemplate = serde_json::from_reader(file)?;
    if template.id.trim().is_empty() {
        return Err(RepositoryError::InvalidData(
            "template requires a non-empty id".into(),
        ));
    }
    Ok(template)
}

#[derive(Deserialize)]
struct HolidayCsvRecord {
    date: String,
}

/// Read holidays from a CSV file with a `date` column (`YYYY-MM-DD`) and an optional `name`.
pub fn load_holidays_from_csv<P: AsRef<Path>>(path: P) -> RepositoryResult<Vec<NaiveDate>> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut holidays = Vec::new();
    for record in reader.deserialize::<HolidayCsvRecord>() {
        let record = record?;
        holidays.push(parse_date(&record.date)?);
    }
    holidays.sort();
    holidays.dedup();
    Ok(holidays)
}

/// Read holidays from a JSON array of `YYYY-MM-DD` strings.
pub fn load_holidays_from_json<P: AsRef<Path>>(path: P) -> RepositoryResult<Vec<NaiveDate>> {
    let file = File::open(path)?;
    let mut holidays: Vec<NaiveDate> = serde_json::from_reader(file)?;
    holidays.sort();
    holidays.dedup();
    Ok(holidays)
}

/// Holiday file picked by extension; re-read on every refresh.
#[derive(Debug, Clone)]
pub struct HolidayFile {
    path: PathBuf,
}

impl HolidayFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HolidaySource for HolidayFile {
    fn list_holidays(&self) -> RepositoryResult<Vec<NaiveDate>> {
        match self.path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => load_holidays_from_csv(&self.path),
            Some(ext) if ext.eq_ignore_ascii_case("json") => load_holidays_from_json(&self.path),
            _ => Err(RepositoryError::InvalidData(format!(
                "unsupported holiday file '{}' (expected .csv or .json)",
                self.path.display()
            ))),
        }
    }
}

fn parse_date(input: &str) -> RepositoryResult<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| RepositoryError::InvalidData(format!("invalid date '{input}': {e}")))
}
