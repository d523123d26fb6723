//! Running tally lines and end-of-run summaries for batch runs.

use chrono::NaiveDate;
use std::fmt::Write;

/// Skip lists longer than this are cut in the summary.
pub const SUMMARY_LIMIT: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayStatus {
    Ok,
    Failed(String),
    Skipped(String),
}

impl DayStatus {
    fn tag(&self) -> &'static str {
        match self {
            DayStatus::Ok => "[ OK ]",
            DayStatus::Failed(_) => "[FAIL]",
            DayStatus::Skipped(_) => "[SKIP]",
        }
    }
}

/// `[ OK ] 2024-01-01 ta,rn_60m` / `[FAIL] 2024-01-02 ta(...)`
pub fn tally_line(date: NaiveDate, status: &DayStatus, detail: &str) -> String {
    let mut line = format!("{} {}", status.tag(), date);
    match status {
        DayStatus::Ok if !detail.is_empty() => {
            let _ = write!(line, " {}", detail);
        }
        DayStatus::Failed(reason) | DayStatus::Skipped(reason) => {
            let _ = write!(line, " {}", reason);
        }
        _ => {}
    }
    line
}

/// Per-date outcomes of a range run. In aggregation a date can be both ok and
/// skipped when only some of its variables had no cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub ok: Vec<NaiveDate>,
    pub failed: Vec<(NaiveDate, String)>,
    pub skipped: Vec<(NaiveDate, String)>,
}

impl RunReport {
    pub fn record(&mut self, date: NaiveDate, status: DayStatus) {
        match status {
            DayStatus::Ok => self.ok.push(date),
            DayStatus::Failed(reason) => self.failed.push((date, reason)),
            DayStatus::Skipped(reason) => self.skipped.push((date, reason)),
        }
    }

    pub fn merge(&mut self, other: RunReport) {
        self.ok.extend(other.ok);
        self.failed.extend(other.failed);
        self.skipped.extend(other.skipped);
    }

    pub fn total(&self) -> usize {
        self.ok.len() + self.failed.len() + self.skipped.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Counts, then failures and skips sorted by date. Each list is cut after
    /// [`SUMMARY_LIMIT`] entries with an `... and N more` line.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "ok: {}  failed: {}  skipped: {}\n",
            self.ok.len(),
            self.failed.len(),
            self.skipped.len()
        );
        append_section(&mut out, "Failures", &self.failed);
        append_section(&mut out, "Skips", &self.skipped);
        out
    }
}

fn append_section(out: &mut String, title: &str, entries: &[(NaiveDate, String)]) {
    if entries.is_empty() {
        return;
    }
    let mut sorted: Vec<&(NaiveDate, String)> = entries.iter().collect();
    sorted.sort_by_key(|(date, _)| *date);
    let _ = writeln!(out, "{} ({}):", title, sorted.len());
    for (date, reason) in sorted.iter().take(SUMMARY_LIMIT) {
        let _ = writeln!(out, "- {}: {}", date, reason);
    }
    if sorted.len() > SUMMARY_LIMIT {
        let _ = writeln!(out, "... and {} more", sorted.len() - SUMMARY_LIMIT);
    }
}
