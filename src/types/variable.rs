//! Defines the observed variables, their time-bucket layout and the fixed
//! availability policy that decides whether a variable exists for a date.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Width of the time buckets a variable is pivoted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketWidth {
    /// 24 buckets per day, labelled `{prefix}0001` … `{prefix}2300`.
    OneHour,
    /// 8 buckets per day, labelled `{prefix}0003` … `{prefix}2124`.
    ThreeHours,
}

impl BucketWidth {
    pub fn hours(&self) -> u32 {
        match self {
            BucketWidth::OneHour => 1,
            BucketWidth::ThreeHours => 3,
        }
    }

    pub fn buckets_per_day(&self) -> usize {
        (24 / self.hours()) as usize
    }

    /// Start hours of every bucket of a day, in increasing order.
    pub fn bucket_starts(&self) -> Vec<u32> {
        (0..24).step_by(self.hours() as usize).collect()
    }

    /// Canonical column label for the bucket starting at `start_hour`.
    ///
    /// Hourly labels wrap the end hour (`t2300`), three-hour labels do not (`s2124`).
    pub fn label(&self, prefix: &str, start_hour: u32) -> String {
        match self {
            BucketWidth::OneHour => format!("{}{:02}{:02}", prefix, start_hour, (start_hour + 1) % 24),
            BucketWidth::ThreeHours => format!("{}{:02}{:02}", prefix, start_hour, start_hour + 3),
        }
    }
}

/// Reduction used when several samples fall into one time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeMethod {
    Mean,
    Sum,
    /// Latest sample wins; used for values that are already cumulative.
    Last,
    Max,
    Min,
}

impl fmt::Display for TimeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeMethod::Mean => "mean",
            TimeMethod::Sum => "sum",
            TimeMethod::Last => "last",
            TimeMethod::Max => "max",
            TimeMethod::Min => "min",
        };
        write!(f, "{}", name)
    }
}

/// Static description of one upstream variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Upstream variable code, also used in cache file names (e.g. `ta`).
    pub key: String,
    pub name: String,
    pub unit: String,
    /// One-letter prefix for pivoted column labels (`t`, `p`, `s`).
    pub col_prefix: String,
    pub bucket: BucketWidth,
    pub method: TimeMethod,
    /// First year the feed produces this variable.
    #[serde(default)]
    pub start_year: Option<i32>,
    /// Calendar months (1-12) in which the feed does not produce this variable.
    #[serde(default)]
    pub excluded_months: Vec<u32>,
}

impl VariableSpec {
    pub fn is_available_on(&self, date: NaiveDate) -> bool {
        if self.start_year.is_some_and(|y| date.year() < y) {
            return false;
        }
        !self.excluded_months.contains(&date.month())
    }

    /// Column labels in canonical order.
    pub fn bucket_labels(&self) -> Vec<String> {
        self.bucket
            .bucket_starts()
            .into_iter()
            .map(|h| self.bucket.label(&self.col_prefix, h))
            .collect()
    }

    /// Instants to request for `date`, in increasing time order.
    pub fn observation_instants(&self, date: NaiveDate) -> Vec<ObservationInstant> {
        self.bucket
            .bucket_starts()
            .into_iter()
            .filter_map(|h| NaiveTime::from_hms_opt(h, 0, 0))
            .map(|t| ObservationInstant(date.and_time(t)))
            .collect()
    }
}

/// The set of variables the pipeline knows how to fetch and aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableCatalog {
    variables: Vec<VariableSpec>,
}

impl Default for VariableCatalog {
    fn default() -> Self {
        Self {
            variables: vec![
                VariableSpec {
                    key: "ta".into(),
                    name: "temperature".into(),
                    unit: "°C".into(),
                    col_prefix: "t".into(),
                    bucket: BucketWidth::OneHour,
                    method: TimeMethod::Mean,
                    start_year: None,
                    excluded_months: vec![],
                },
                VariableSpec {
                    key: "rn_60m".into(),
                    name: "60-minute precipitation".into(),
                    unit: "mm".into(),
                    col_prefix: "p".into(),
                    bucket: BucketWidth::OneHour,
                    method: TimeMethod::Last,
                    start_year: None,
                    excluded_months: vec![],
                },
                VariableSpec {
                    key: "sd_3hr".into(),
                    name: "3-hour new snow".into(),
                    unit: "cm".into(),
                    col_prefix: "s".into(),
                    bucket: BucketWidth::ThreeHours,
                    method: TimeMethod::Last,
                    start_year: Some(2020),
                    excluded_months: vec![6, 7, 8, 9],
                },
            ],
        }
    }
}

impl VariableCatalog {
    pub fn new(variables: Vec<VariableSpec>) -> Self {
        Self { variables }
    }

    pub fn get(&self, key: &str) -> Option<&VariableSpec> {
        self.variables.iter().find(|v| v.key == key)
    }

    /// `false` for unknown keys.
    pub fn is_available(&self, key: &str, date: NaiveDate) -> bool {
        self.get(key).is_some_and(|spec| spec.is_available_on(date))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.key.as_str())
    }

    /// Splits requested keys into (available, excluded) for `date`.
    ///
    /// Unknown keys are neither; callers validate keys up front with [`VariableCatalog::get`].
    pub fn split_available<'a>(
        &self,
        keys: &'a [String],
        date: NaiveDate,
    ) -> (Vec<&'a str>, Vec<&'a str>) {
        let mut available = Vec::new();
        let mut excluded = Vec::new();
        for key in keys {
            match self.get(key) {
                Some(spec) if spec.is_available_on(date) => available.push(key.as_str()),
                Some(_) => excluded.push(key.as_str()),
                None => {}
            }
        }
        (available, excluded)
    }
}

/// A specific observation instant, rendered on the wire as `YYYYMMDDHHmm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObservationInstant(NaiveDateTime);

impl ObservationInstant {
    pub const FORMAT: &'static str = "%Y%m%d%H%M";

    pub fn new(datetime: NaiveDateTime) -> Self {
        Self(datetime)
    }

    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.0
    }

    /// Wire form, e.g. `202401011200`.
    pub fn tm(&self) -> String {
        self.0.format(Self::FORMAT).to_string()
    }
}

impl fmt::Display for ObservationInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tm())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid observation instant '{0}', expected YYYYMMDDHHmm")]
pub struct InvalidInstant(pub String);

impl FromStr for ObservationInstant {
    type Err = InvalidInstant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 12 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidInstant(s.to_string()));
        }
        NaiveDateTime::parse_from_str(s, Self::FORMAT)
            .map(Self)
            .map_err(|_| InvalidInstant(s.to_string()))
    }
}

/// Compact date key used in cache and log file names (`YYYYMMDD`).
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}
