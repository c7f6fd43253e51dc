//! Configuration loaded from TOML.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::calendar::{BusinessCalendar, CalendarConfig};
use crate::error::ScheduleResult;
use crate::persistence::{HolidayFile, HolidaySource};
use crate::replan::LockPropagation;

pub const CONFIG_ENV: &str = "CASE_SCHEDULE_CONFIG";
pub const HTTP_ADDR_ENV: &str = "CASE_SCHEDULE_HTTP_ADDR";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub calendar: CalendarSettings,
    pub replan: ReplanSettings,
    pub storage: StorageSettings,
    pub http: HttpSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarSettings {
    pub working_days: Vec<Weekday>,
    pub holidays: Vec<NaiveDate>,
    /// CSV or JSON holiday list merged into `holidays` at startup.
    pub holiday_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplanSettings {
    pub lock_propagation: LockPropagation,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// SQLite database path; in-memory storage when unset.
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub bind_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            working_days: CalendarConfig::default().working_days().to_vec(),
            holidays: Vec::new(),
            holiday_file: None,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the file named by `CASE_SCHEDULE_CONFIG`, or defaults when it is unset.
    /// `CASE_SCHEDULE_HTTP_ADDR` overrides the bind address.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };
        if let Ok(addr) = std::env::var(HTTP_ADDR_ENV) {
            config.http.bind_address = addr;
        }
        Ok(config)
    }
}

impl CalendarSettings {
    /// Build the startup calendar, reading the holiday file if one is configured.
    pub fn build_calendar(&self) -> ScheduleResult<BusinessCalendar> {
        let mut holidays = self.holidays.clone();
        if let Some(path) = &self.holiday_file {
            holidays.extend(HolidayFile::new(path).list_holidays()?);
        }
        let config = CalendarConfig::try_new(self.working_days.clone(), holidays)?;
        BusinessCalendar::from_config(&config)
    }
}
