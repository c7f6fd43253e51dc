use super::{CaseRepository, DueDateUpdate, HolidaySource, HolidayStore, ReplanBatch};
use crate::error::{RepositoryError, RepositoryResult};
use crate::step::{CaseRecord, ProcessTemplate, StepInstance, StepStatus};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::str::FromStr;
use std::sync::Mutex;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteCaseStore {
    connection: Mutex<Connection>,
}

impl SqliteCaseStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> RepositoryResult<Self> {
        let connection = Connection::open(path)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn in_memory() -> RepositoryResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> RepositoryResult<()> {
        let ddl = r#"
            PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS templates (
                id TEXT PRIMARY KEY,
                template_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS cases (
                id TEXT PRIMARY KEY,
                template_id TEXT NOT NULL,
                goal_date TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS step_instances (
                case_id TEXT NOT NULL REFERENCES cases(id) ON DELETE CASCADE,
                template_step_id TEXT NOT NULL,
                id TEXT NOT NULL,
                position INTEGER NOT NULL,
                due_date TEXT NOT NULL,
                locked INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                PRIMARY KEY (case_id, template_step_id)
            );
            CREATE TABLE IF NOT EXISTS holidays (
                date TEXT PRIMARY KEY
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.connection.lock().expect("sqlite mutex poisoned")
    }

    fn bump_version(tx: &Transaction, case_id: &str) -> RepositoryResult<()> {
        let changed = tx.execute(
            "UPDATE cases SET version = version + 1 WHERE id = ?1",
            params![case_id],
        )?;
        if changed == 0 {
            return Err(RepositoryError::InvalidData(format!(
                "case {case_id} is not stored"
            )));
        }
        Ok(())
    }

    fn write_due_dates(
        tx: &Transaction,
        case_id: &str,
        updates: &[DueDateUpdate],
    ) -> RepositoryResult<()> {
        let mut stmt = tx.prepare(
            "UPDATE step_instances SET due_date = ?3 WHERE case_id = ?1 AND template_step_id = ?2",
        )?;
        for update in updates {
            let changed = stmt.execute(params![
                case_id,
                update.step_id,
                format_date(update.due_date)
            ])?;
            if changed == 0 {
                return Err(RepositoryError::InvalidData(format!(
                    "case {case_id} has no step {}",
                    update.step_id
                )));
            }
        }
        Ok(())
    }
}

impl CaseRepository for SqliteCaseStore {
    fn load_template(&self, template_id: &str) -> RepositoryResult<Option<ProcessTemplate>> {
        let conn = self.lock();
        let json: Option<String> = conn
            .query_row(
                "SELECT template_json FROM templates WHERE id = ?1",
                params![template_id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save_template(&self, template: &ProcessTemplate) -> RepositoryResult<()> {
        let json = serde_json::to_string(template)?;
        self.lock().execute(
            "INSERT INTO templates (id, template_json) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET template_json = excluded.template_json",
            params![template.id, json],
        )?;
        Ok(())
    }

    fn load_case(&self, case_id: &str) -> RepositoryResult<Option<CaseRecord>> {
        let conn = self.lock();
        let row: Option<(String, String, i64)> = conn
            .query_row(
                "SELECT template_id, goal_date, version FROM cases WHERE id = ?1",
                params![case_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((template_id, goal_date, version)) = row else {
            return Ok(None);
        };
        Ok(Some(CaseRecord {
            id: case_id.to_string(),
            template_id,
            goal_date: parse_date(&goal_date)?,
            version: version as u64,
        }))
    }

    fn insert_case(&self, case: &CaseRecord, steps: &[StepInstance]) -> RepositoryResult<bool> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO cases (id, template_id, goal_date, version) VALUES (?1, ?2, ?3, ?4)",
            params![
                case.id,
                case.template_id,
                format_date(case.goal_date),
                case.version as i64
            ],
        )?;
        if inserted == 0 {
            return Ok(false);
        }
        {
            let mut stmt = tx.prepare(
                "INSERT INTO step_instances (case_id, template_step_id, id, position, due_date, locked, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for (position, step) in steps.iter().enumerate() {
                stmt.execute(params![
                    case.id,
                    step.template_step_id,
                    step.id,
                    position as i64,
                    format_date(step.due_date),
                    step.locked,
                    step.status.as_str()
                ])?;
            }
        }
        tx.commit()?;
        Ok(true)
    }

    fn load_step_instances(&self, case_id: &str) -> RepositoryResult<Vec<StepInstance>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, template_step_id, due_date, locked, status FROM step_instances
             WHERE case_id = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(params![case_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut steps = Vec::new();
        for row in rows {
            let (id, template_step_id, due_date, locked, status) = row?;
            let status = StepStatus::from_str(&status).map_err(|_| {
                RepositoryError::InvalidData(format!("invalid step status '{status}'"))
            })?;
            steps.push(StepInstance {
                id,
                template_step_id,
                due_date: parse_date(&due_date)?,
                locked,
                status,
            });
        }
        Ok(steps)
    }

    fn save_step_instance_due_dates(
        &self,
        case_id: &str,
        updates: &[DueDateUpdate],
    ) -> RepositoryResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        Self::write_due_dates(&tx, case_id, updates)?;
        Self::bump_version(&tx, case_id)?;
        tx.commit()?;
        Ok(())
    }

    fn save_case_goal_date(&self, case_id: &str, goal_date: NaiveDate) -> RepositoryResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE cases SET goal_date = ?2 WHERE id = ?1",
            params![case_id, format_date(goal_date)],
        )?;
        Self::bump_version(&tx, case_id)?;
        tx.commit()?;
        Ok(())
    }

    fn update_step_instance(
        &self,
        case_id: &str,
        expected_version: u64,
        step: &StepInstance,
    ) -> RepositoryResult<bool> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let claimed = tx.execute(
            "UPDATE cases SET version = version + 1 WHERE id = ?1 AND version = ?2",
            params![case_id, expected_version as i64],
        )?;
        if claimed == 0 {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM cases WHERE id = ?1)",
                params![case_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Ok(false);
            }
            return Err(RepositoryError::VersionConflict {
                case_id: case_id.to_string(),
            });
        }
        let changed = tx.execute(
            "UPDATE step_instances SET due_date = ?3, locked = ?4, status = ?5
             WHERE case_id = ?1 AND template_step_id = ?2",
            params![
                case_id,
                step.template_step_id,
                format_date(step.due_date),
                step.locked,
                step.status.as_str()
            ],
        )?;
        if changed == 0 {
            // Dropping the transaction rolls back the version claim
            return Ok(false);
        }
        tx.commit()?;
        Ok(true)
    }

    fn commit_replan(&self, batch: &ReplanBatch) -> RepositoryResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        // Compare-and-swap on the version claims the case for this batch
        let claimed = tx.execute(
            "UPDATE cases SET goal_date = ?2, version = version + 1 WHERE id = ?1 AND version = ?3",
            params![
                batch.case_id,
                format_date(batch.goal_date),
                batch.expected_version as i64
            ],
        )?;
        if claimed == 0 {
            return Err(RepositoryError::VersionConflict {
                case_id: batch.case_id.clone(),
            });
        }
        Self::write_due_dates(&tx, &batch.case_id, &batch.updates)?;
        tx.commit()?;
        Ok(())
    }
}

impl HolidaySource for SqliteCaseStore {
    fn list_holidays(&self) -> RepositoryResult<Vec<NaiveDate>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT date FROM holidays ORDER BY date ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut holidays = Vec::new();
        for date in rows {
            holidays.push(parse_date(&date?)?);
        }
        Ok(holidays)
    }
}

impl HolidayStore for SqliteCaseStore {
    fn add_holiday(&self, date: NaiveDate) -> RepositoryResult<bool> {
        let inserted = self.lock().execute(
            "INSERT OR IGNORE INTO holidays (date) VALUES (?1)",
            params![format_date(date)],
        )?;
        Ok(inserted > 0)
    }

    fn remove_holiday(&self, date: NaiveDate) -> RepositoryResult<bool> {
        let removed = self.lock().execute(
            "DELETE FROM holidays WHERE date = ?1",
            params![format_date(date)],
        )?;
        Ok(removed > 0)
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(input: &str) -> RepositoryResult<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT)
        .map_err(|e| RepositoryError::InvalidData(format!("invalid date '{input}': {e}")))
}
