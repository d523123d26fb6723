//! On-disk layout of the data root.
//!
//! ```text
//! <root>/raw/YYYY/MM/{var}_{YYYYMMDD}_parsed.parquet        day/variable cache
//! <root>/raw/YYYY/MM/{var}_{tm}_error_snippet.txt           parse failure excerpts
//! <root>/raw/_validation_logs/YYYY/MM/{YYYYMMDD}_{var}.txt  validation logs
//! <root>/interim/YYYY/fusion_{YYYYMMDD}.parquet             per-day region tables
//! <root>/output/YYYY/fusion_{YYYYMM}.csv                    monthly output
//! <root>/output/fusion_weather_{YYYY}.csv                   yearly output
//! ```

use crate::types::variable::{date_key, ObservationInstant};
use chrono::{Datelike, NaiveDate};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn raw_month_dir(&self, date: NaiveDate) -> PathBuf {
        self.raw_dir()
            .join(format!("{:04}", date.year()))
            .join(format!("{:02}", date.month()))
    }

    pub fn cache_file(&self, date: NaiveDate, variable: &str) -> PathBuf {
        self.raw_month_dir(date)
            .join(format!("{}_{}_parsed.parquet", variable, date_key(date)))
    }

    pub fn snippet_file(&self, instant: ObservationInstant, variable: &str) -> PathBuf {
        self.raw_month_dir(instant.date())
            .join(format!("{}_{}_error_snippet.txt", variable, instant.tm()))
    }

    pub fn validation_log_file(&self, date: NaiveDate, variable: &str) -> PathBuf {
        self.raw_dir()
            .join("_validation_logs")
            .join(format!("{:04}", date.year()))
            .join(format!("{:02}", date.month()))
            .join(format!("{}_{}.txt", date_key(date), variable))
    }

    pub fn interim_dir(&self, year: i32) -> PathBuf {
        self.root.join("interim").join(format!("{:04}", year))
    }

    pub fn interim_file(&self, date: NaiveDate) -> PathBuf {
        self.interim_dir(date.year())
            .join(format!("fusion_{}.parquet", date_key(date)))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    pub fn monthly_output_file(&self, year: i32, month: u32) -> PathBuf {
        self.output_dir()
            .join(format!("{:04}", year))
            .join(format!("fusion_{:04}{:02}.csv", year, month))
    }

    pub fn yearly_output_file(&self, year: i32) -> PathBuf {
        self.output_dir()
            .join(format!("fusion_weather_{:04}.csv", year))
    }
}
