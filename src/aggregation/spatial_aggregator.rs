//! Grid-to-region reduction.

use crate::aggregation::error::AggregationError;
use crate::cache::record::{DATE, GRID_IDX};
use crate::regions::region_mapping::{RegionMapping, LAT, LON, REGION_ID};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionMethod {
    #[default]
    Mean,
    Sum,
    Median,
}

impl RegionMethod {
    fn apply(&self, expr: Expr) -> Expr {
        match self {
            RegionMethod::Mean => expr.mean(),
            RegionMethod::Sum => expr.sum(),
            RegionMethod::Median => expr.median(),
        }
    }
}

/// Columns whose missing values mean "no event" (precipitation `p*`, snow `s*`).
pub fn is_event_column(name: &str) -> bool {
    name.starts_with('p') || name.starts_with('s')
}

#[derive(Debug, Clone)]
pub struct SpatialAggregator {
    mapping: Arc<RegionMapping>,
}

impl SpatialAggregator {
    pub fn new(mapping: Arc<RegionMapping>) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &RegionMapping {
        &self.mapping
    }

    /// Reduces a grid-keyed table to one row per `(date, region_id)`.
    ///
    /// Grid cells without a region are dropped. Missing precipitation/snow values
    /// count as zero; other columns keep missing values out of the reduction.
    /// Value columns absent from `table` are ignored.
    pub fn aggregate_to_regions(
        &self,
        table: LazyFrame,
        value_columns: &[String],
        method: RegionMethod,
    ) -> Result<DataFrame, AggregationError> {
        let mut table = table;
        let schema = table.collect_schema()?;
        if !schema.contains(GRID_IDX) {
            return Err(AggregationError::MissingColumn(GRID_IDX.to_string()));
        }
        let columns: Vec<&String> = value_columns
            .iter()
            .filter(|c| schema.contains(c.as_str()))
            .collect();

        let mut keys = Vec::with_capacity(2);
        if schema.contains(DATE) {
            keys.push(DATE);
        }
        keys.push(REGION_ID);

        let fills: Vec<Expr> = columns
            .iter()
            .filter(|c| is_event_column(c))
            .map(|c| col(c.as_str()).fill_null(lit(0.0)))
            .collect();
        let reductions: Vec<Expr> = columns
            .iter()
            .map(|c| method.apply(col(c.as_str())))
            .collect();

        let regions = self
            .mapping
            .lazy()
            .select([col(GRID_IDX), col(REGION_ID)]);

        let aggregated = table
            .with_column(col(GRID_IDX).cast(DataType::UInt32))
            .left_join(regions, col(GRID_IDX), col(GRID_IDX))
            .filter(col(REGION_ID).is_not_null())
            .with_columns(fills)
            .group_by(keys.iter().map(|k| col(*k)).collect::<Vec<_>>())
            .agg(reductions)
            .sort(keys, Default::default())
            .collect()?;
        Ok(aggregated)
    }

    /// Per-region grid count and coordinate extents:
    /// `region_id, grid_count, lat_min, lat_max, lat_mean, lon_min, lon_max, lon_mean`.
    pub fn region_statistics(&self) -> Result<DataFrame, AggregationError> {
        Ok(self
            .mapping
            .lazy()
            .filter(col(REGION_ID).is_not_null())
            .group_by([col(REGION_ID)])
            .agg([
                col(GRID_IDX).count().alias("grid_count"),
                col(LAT).min().alias("lat_min"),
                col(LAT).max().alias("lat_max"),
                col(LAT).mean().alias("lat_mean"),
                col(LON).min().alias("lon_min"),
                col(LON).max().alias("lon_max"),
                col(LON).mean().alias("lon_mean"),
            ])
            .sort([REGION_ID], Default::default())
            .collect()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    /// Grid 0,1 → region A; grid 2 → region B; grid 3 → no region.
    fn aggregator() -> Result<SpatialAggregator, Box<dyn Error>> {
        let lf = df!(
            "grid_idx" => [0u32, 1, 2, 3],
            "LAW_ID" => [Some("A"), Some("A"), Some("B"), None],
            "LAW_NM" => [Some("Alpha"), Some("Alpha"), Some("Beta"), None],
            "lat" => [37.0, 38.0, 35.0, 30.0],
            "lon" => [127.0, 127.5, 129.0, 120.0]
        )?
        .lazy();
        Ok(SpatialAggregator::new(Arc::new(RegionMapping::from_frame(lf)?)))
    }

    fn pivoted() -> PolarsResult<DataFrame> {
        df!(
            GRID_IDX => [0u32, 1, 2, 3],
            DATE => ["20240101"; 4],
            "t0001" => [Some(10.0), None, Some(4.0), Some(99.0)],
            "p0001" => [Some(3.0), None, None, Some(50.0)]
        )
    }

    fn value(df: &DataFrame, column: &str, row: usize) -> Option<f64> {
        df.column(column).ok()?.f64().ok()?.get(row)
    }

    #[test]
    fn test_asymmetric_missing_value_policy() -> Result<(), Box<dyn Error>> {
        let agg = aggregator()?;
        let columns = vec!["t0001".to_string(), "p0001".to_string()];
        let regions = agg.aggregate_to_regions(pivoted()?.lazy(), &columns, RegionMethod::Mean)?;

        // Grid 3 has no region, so only A and B remain
        assert_eq!(regions.height(), 2);
        assert_eq!(regions.column(REGION_ID)?.str()?.get(0), Some("A"));
        // Temperature: missing cell excluded from the mean
        assert_eq!(value(&regions, "t0001", 0), Some(10.0));
        // Precipitation: missing cell counts as dry
        assert_eq!(value(&regions, "p0001", 0), Some(1.5));
        assert_eq!(value(&regions, "p0001", 1), Some(0.0));
        Ok(())
    }

    #[test]
    fn test_sum_and_median() -> Result<(), Box<dyn Error>> {
        let agg = aggregator()?;
        let columns = vec!["p0001".to_string(), "not_there".to_string()];
        let sums = agg.aggregate_to_regions(pivoted()?.lazy(), &columns, RegionMethod::Sum)?;
        assert_eq!(value(&sums, "p0001", 0), Some(3.0));
        assert!(sums.column("not_there").is_err());

        let medians =
            agg.aggregate_to_regions(pivoted()?.lazy(), &columns, RegionMethod::Median)?;
        assert_eq!(value(&medians, "p0001", 0), Some(1.5));
        Ok(())
    }

    #[test]
    fn test_region_statistics() -> Result<(), Box<dyn Error>> {
        let stats = aggregator()?.region_statistics()?;
        assert_eq!(stats.height(), 2);
        assert_eq!(stats.column("grid_count")?.cast(&DataType::UInt64)?.u64()?.get(0), Some(2));
        assert_eq!(value(&stats, "lat_min", 0), Some(37.0));
        assert_eq!(value(&stats, "lon_mean", 0), Some(127.25));
        Ok(())
    }
}
