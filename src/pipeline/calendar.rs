//! Date ranges and their disjoint partitioning across workers.

use chrono::{Datelike, NaiveDate};

/// Every day of `year`-`month`, in order. Empty for an invalid month.
pub fn month_dates(year: i32, month: u32) -> Vec<NaiveDate> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };
    first
        .iter_days()
        .take_while(|d| d.month() == month)
        .collect()
}

/// `(year, month)` pairs from `start_year-start_month` through `end_year-end_month`.
/// Inner years run over all twelve months.
pub fn span_months(start_year: i32, end_year: i32, start_month: u32, end_month: u32) -> Vec<(i32, u32)> {
    let mut months = Vec::new();
    for year in start_year..=end_year {
        let first = if year == start_year { start_month } else { 1 };
        let last = if year == end_year { end_month } else { 12 };
        months.extend((first.max(1)..=last.min(12)).map(|m| (year, m)));
    }
    months
}

pub fn span_dates(start_year: i32, end_year: i32, start_month: u32, end_month: u32) -> Vec<NaiveDate> {
    span_months(start_year, end_year, start_month, end_month)
        .into_iter()
        .flat_map(|(y, m)| month_dates(y, m))
        .collect()
}

/// Deals `dates` round-robin into at most `workers` non-empty partitions.
/// No date lands in two partitions.
pub fn partition_round_robin(dates: &[NaiveDate], workers: usize) -> Vec<Vec<NaiveDate>> {
    let count = workers.max(1).min(dates.len());
    let mut partitions = vec![Vec::new(); count];
    for (i, date) in dates.iter().enumerate() {
        partitions[i % count].push(*date);
    }
    partitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_dates() {
        assert_eq!(month_dates(2024, 2).len(), 29);
        assert_eq!(month_dates(2023, 2).len(), 28);
        assert_eq!(month_dates(2024, 12).last(), Some(&ymd(2024, 12, 31)));
        assert!(month_dates(2024, 13).is_empty());
    }

    #[test]
    fn test_span_crosses_year_boundary() {
        assert_eq!(
            span_months(2023, 2024, 11, 2),
            [(2023, 11), (2023, 12), (2024, 1), (2024, 2)]
        );
        let dates = span_dates(2023, 2024, 11, 2);
        assert_eq!(dates.first(), Some(&ymd(2023, 11, 1)));
        assert_eq!(dates.last(), Some(&ymd(2024, 2, 29)));
        assert_eq!(dates.len(), 30 + 31 + 31 + 29);
    }

    #[test]
    fn test_partitions_are_disjoint_and_complete() {
        let dates = month_dates(2024, 1);
        let partitions = partition_round_robin(&dates, 4);
        assert_eq!(partitions.len(), 4);

        let mut seen = HashSet::new();
        for partition in &partitions {
            for date in partition {
                assert!(seen.insert(*date), "{} assigned twice", date);
            }
        }
        assert_eq!(seen.len(), dates.len());

        assert_eq!(partition_round_robin(&dates[..2], 8).len(), 2);
        assert!(partition_round_robin(&[], 4).is_empty());
    }
}
