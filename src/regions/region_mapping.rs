//! The static grid → region table, loaded once and read-only afterwards.
//!
//! External mapping files come from different geometry tools and name their
//! columns differently. Aliases are resolved once at load time into the canonical
//! schema `(grid_idx: u32, region_id: str?, region_name: str?, lat: f64?, lon: f64?)`.

use crate::cache::record::GRID_IDX;
use crate::regions::error::RegionMappingError;
use log::info;
use polars::prelude::*;
use std::path::Path;
use tokio::task;

pub const REGION_ID: &str = "region_id";
pub const REGION_NAME: &str = "region_name";
pub const LAT: &str = "lat";
pub const LON: &str = "lon";

const GRID_IDX_ALIASES: &[&str] = &["grid_idx"];
const REGION_ID_ALIASES: &[&str] = &["region_id", "LAW_ID", "ADM_DR_CD", "ADM_CD", "EMD_CD", "BJDONG_CD"];
const REGION_NAME_ALIASES: &[&str] = &["region_name", "LAW_NM", "ADM_DR_NM", "ADM_NM", "EMD_NM", "BJDONG_NM"];
const LAT_ALIASES: &[&str] = &["lat", "latitude", "LAT"];
const LON_ALIASES: &[&str] = &["lon", "longitude", "LON"];

#[derive(Debug, Clone)]
pub struct RegionMapping {
    table: DataFrame,
}

impl RegionMapping {
    /// Reads a `.parquet` or `.csv` mapping file.
    pub async fn load(path: &Path) -> Result<Self, RegionMappingError> {
        if tokio::fs::metadata(path).await.is_err() {
            return Err(RegionMappingError::NotFound(path.to_path_buf()));
        }
        let path_buf = path.to_path_buf();
        let mapping = task::spawn_blocking(move || {
            let extension = path_buf
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase);
            let lf = match extension.as_deref() {
                Some("parquet") => LazyFrame::scan_parquet(&path_buf, Default::default()),
                Some("csv") => LazyCsvReader::new(&path_buf).with_has_header(true).finish(),
                _ => return Err(RegionMappingError::UnsupportedFormat(path_buf)),
            }
            .map_err(|e| RegionMappingError::Read(path_buf.clone(), e))?;
            Self::from_frame(lf)
        })
        .await??;
        info!(
            "Loaded region mapping from {:?}: {} grid cells, {} mapped",
            path,
            mapping.len(),
            mapping.mapped_len()
        );
        Ok(mapping)
    }

    /// Resolves column aliases of an arbitrary mapping table into the canonical schema.
    pub fn from_frame(mut lf: LazyFrame) -> Result<Self, RegionMappingError> {
        let schema = lf.collect_schema()?;
        let find = |aliases: &[&'static str]| -> Option<&'static str> {
            aliases.iter().copied().find(|a| schema.contains(a))
        };
        let required = |column: &'static str, aliases: &[&'static str]| {
            find(aliases).ok_or_else(|| RegionMappingError::MissingColumn {
                column,
                tried: aliases.to_vec(),
            })
        };
        let optional = |aliases: &[&'static str], name: &str, dtype: DataType| match find(aliases) {
            Some(found) => col(found).cast(dtype).alias(name),
            None => lit(NULL).cast(dtype).alias(name),
        };

        let grid_col = required(GRID_IDX, GRID_IDX_ALIASES)?;
        let region_col = required(REGION_ID, REGION_ID_ALIASES)?;

        let table = lf
            .select([
                col(grid_col).cast(DataType::UInt32).alias(GRID_IDX),
                col(region_col).cast(DataType::String).alias(REGION_ID),
                optional(REGION_NAME_ALIASES, REGION_NAME, DataType::String),
                optional(LAT_ALIASES, LAT, DataType::Float64),
                optional(LON_ALIASES, LON, DataType::Float64),
            ])
            .sort([GRID_IDX], Default::default())
            .collect()?;
        Ok(Self { table })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.table
    }

    pub fn lazy(&self) -> LazyFrame {
        self.table.clone().lazy()
    }

    /// Number of grid cells in the mapping, including those without a region.
    pub fn len(&self) -> usize {
        self.table.height()
    }

    pub fn is_empty(&self) -> bool {
        self.table.height() == 0
    }

    /// Number of grid cells that belong to a region.
    pub fn mapped_len(&self) -> usize {
        self.table
            .column(REGION_ID)
            .map(|c| c.len() - c.null_count())
            .unwrap_or(0)
    }

    pub fn region_for_grid(&self, grid_idx: u32) -> Result<Option<String>, RegionMappingError> {
        let found = self
            .lazy()
            .filter(col(GRID_IDX).eq(lit(grid_idx)))
            .select([col(REGION_ID)])
            .collect()?;
        if found.height() == 0 {
            return Ok(None);
        }
        Ok(found.column(REGION_ID)?.str()?.get(0).map(str::to_string))
    }

    pub fn grids_in_region(&self, region_id: &str) -> Result<DataFrame, RegionMappingError> {
        Ok(self
            .lazy()
            .filter(col(REGION_ID).eq(lit(region_id)))
            .collect()?)
    }

    /// One row per region: `(region_id, region_name)`, sorted by id.
    pub fn unique_regions(&self) -> Result<DataFrame, RegionMappingError> {
        Ok(self
            .lazy()
            .filter(col(REGION_ID).is_not_null())
            .group_by([col(REGION_ID)])
            .agg([col(REGION_NAME).drop_nulls().first()])
            .sort([REGION_ID], Default::default())
            .collect()?)
    }
}
