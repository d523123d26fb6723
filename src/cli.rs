//! Arguments shared by the `fusion-acquire` and `fusion-aggregate` binaries.

use crate::config::{ConfigError, PipelineConfig};
use crate::pipeline::calendar::span_dates;
use chrono::NaiveDate;
use clap::Args;
use std::path::PathBuf;

/// Either a year/month span or a single test day.
#[derive(Args, Debug, Clone)]
pub struct DateSpanArgs {
    #[arg(long, default_value_t = 2024)]
    pub start_year: i32,
    #[arg(long, default_value_t = 2024)]
    pub end_year: i32,
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub start_month: u32,
    #[arg(long, default_value_t = 12, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub end_month: u32,
    /// Process only this day (YYYYMMDD); failures end the run with a non-zero exit code
    #[arg(long, value_parser = parse_day)]
    pub test_day: Option<NaiveDate>,
}

impl DateSpanArgs {
    pub fn dates(&self) -> Vec<NaiveDate> {
        match self.test_day {
            Some(day) => vec![day],
            None => span_dates(self.start_year, self.end_year, self.start_month, self.end_month),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Comma-separated variable keys
    #[arg(long, value_delimiter = ',', default_value = "ta,rn_60m")]
    pub variables: Vec<String>,
    /// JSON configuration file; unset fields use defaults
    #[arg(long, env = "FUSION_CONFIG")]
    pub config: Option<PathBuf>,
    #[arg(long, env = "FUSION_DATA_ROOT")]
    pub data_root: Option<PathBuf>,
    /// Grid-to-region mapping (parquet or csv)
    #[arg(long)]
    pub region_mapping: Option<PathBuf>,
}

impl CommonArgs {
    /// Reads the config file (or defaults) and applies command-line overrides.
    pub async fn load_config(&self) -> Result<PipelineConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path).await?,
            None => PipelineConfig::default(),
        };
        if let Some(root) = &self.data_root {
            config.data_root = root.clone();
        }
        if let Some(mapping) = &self.region_mapping {
            config.region_mapping_file = Some(mapping.clone());
        }
        config.validate_variables(&self.variables())?;
        Ok(config)
    }

    pub fn variables(&self) -> Vec<String> {
        self.variables
            .iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()
    }
}

fn parse_day(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|e| format!("expected YYYYMMDD: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        span: DateSpanArgs,
        #[command(flatten)]
        common: CommonArgs,
    }

    #[test]
    fn test_span_and_variables() -> Result<(), clap::Error> {
        let cli = TestCli::try_parse_from([
            "t",
            "--start-year",
            "2023",
            "--end-year",
            "2023",
            "--start-month",
            "2",
            "--end-month",
            "3",
            "--variables",
            "ta, rn_60m,,sd_3hr",
        ])?;
        assert_eq!(cli.span.dates().len(), 28 + 31);
        assert_eq!(cli.common.variables(), ["ta", "rn_60m", "sd_3hr"]);
        Ok(())
    }

    #[test]
    fn test_test_day() -> Result<(), clap::Error> {
        let cli = TestCli::try_parse_from(["t", "--test-day", "20240116"])?;
        assert_eq!(cli.span.dates(), [NaiveDate::from_ymd_opt(2024, 1, 16).unwrap()]);
        assert!(TestCli::try_parse_from(["t", "--test-day", "2024-01-16"]).is_err());
        assert!(TestCli::try_parse_from(["t", "--start-month", "13"]).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_overrides_apply_to_config() -> Result<(), Box<dyn std::error::Error>> {
        let cli = TestCli::try_parse_from(["t", "--data-root", "/srv/x", "--region-mapping", "/srv/m.csv"])?;
        let config = cli.common.load_config().await?;
        assert_eq!(config.data_root, PathBuf::from("/srv/x"));
        assert_eq!(config.region_mapping_file, Some(PathBuf::from("/srv/m.csv")));

        let cli = TestCli::try_parse_from(["t", "--variables", "wind"])?;
        assert!(matches!(
            cli.common.load_config().await,
            Err(ConfigError::UnknownVariable(_))
        ));
        Ok(())
    }
}
