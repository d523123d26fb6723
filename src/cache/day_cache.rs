use crate::cache::error::CacheError;
use crate::layout::DataLayout;
use chrono::NaiveDate;
use log::{debug, info};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tokio::{fs, task};

/// Persists one parquet file per (date, variable).
///
/// Presence is existence-only: a closed historical date never changes upstream,
/// so a cached record is trusted permanently and never re-validated.
#[derive(Debug, Clone)]
pub struct DayVariableCache {
    layout: DataLayout,
}

impl DayVariableCache {
    pub fn new(layout: DataLayout) -> Self {
        Self { layout }
    }

    pub fn path(&self, date: NaiveDate, variable: &str) -> PathBuf {
        self.layout.cache_file(date, variable)
    }

    pub async fn has(&self, date: NaiveDate, variable: &str) -> bool {
        fs::metadata(self.path(date, variable))
            .await
            .is_ok_and(|m| m.is_file())
    }

    /// Lazily scans the cached record, or `None` when nothing is cached yet.
    pub async fn load(
        &self,
        date: NaiveDate,
        variable: &str,
    ) -> Result<Option<LazyFrame>, CacheError> {
        let path = self.path(date, variable);
        match fs::metadata(&path).await {
            Ok(_) => {
                debug!("Cache hit for {} on {} at {:?}", variable, date, path);
                LazyFrame::scan_parquet(&path, Default::default())
                    .map(Some)
                    .map_err(|e| CacheError::ParquetScan(path, e))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Cache miss for {} on {}", variable, date);
                Ok(None)
            }
            Err(e) => Err(CacheError::MetadataRead(path, e)),
        }
    }

    /// Writes the record to a temporary file in the target directory and moves
    /// it into place, so readers never observe a partially written file.
    pub async fn store(
        &self,
        date: NaiveDate,
        variable: &str,
        df: DataFrame,
    ) -> Result<PathBuf, CacheError> {
        let path = self.path(date, variable);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::DirCreation(parent.to_path_buf(), e))?;
        }
        let rows = df.height();
        write_parquet_atomic(df, &path).await?;
        info!("Cached {} rows of {} for {} to {:?}", rows, variable, date, path);
        Ok(path)
    }
}

/// Encodes `df` as Snappy parquet next to `path`, then renames it over `path`.
pub(crate) async fn write_parquet_atomic(mut df: DataFrame, path: &Path) -> Result<(), CacheError> {
    let path_buf = path.to_path_buf();
    task::spawn_blocking(move || {
        let dir = path_buf
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut temp = tempfile::Builder::new()
            .prefix(".partial-")
            .suffix(".parquet")
            .tempfile_in(&dir)
            .map_err(|e| CacheError::TempFile(path_buf.clone(), e))?;
        ParquetWriter::new(temp.as_file_mut())
            .with_compression(ParquetCompression::Snappy)
            .finish(&mut df)
            .map_err(|e| CacheError::ParquetWritePolars(path_buf.clone(), e))?;
        temp.persist(&path_buf)
            .map_err(|e| CacheError::Persist(path_buf.clone(), e.error))?;
        Ok(())
    })
    .await?
}
