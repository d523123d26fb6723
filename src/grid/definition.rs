use crate::grid::error::GridDefinitionError;
use serde::Deserialize;
use std::path::Path;

/// The static observation grid.
///
/// Accepted JSON shapes:
/// - `{ "nx": 3, "ny": 2 }` (dimensions only)
/// - `{ "lat": [...], "lon": [...] }` (1D axes, row-major with latitude outer)
/// - `{ "lat2d": [...], "lon2d": [...] }` (already flattened 2D coordinates)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum GridDefinition {
    Dimensions { nx: usize, ny: usize },
    Axes { lat: Vec<f64>, lon: Vec<f64> },
    Flattened { lat2d: Vec<f64>, lon2d: Vec<f64> },
}

impl GridDefinition {
    pub async fn from_json_file(path: &Path) -> Result<Self, GridDefinitionError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| GridDefinitionError::Read(path.to_path_buf(), e))?;
        let definition: GridDefinition = serde_json::from_slice(&bytes)
            .map_err(|e| GridDefinitionError::Decode(path.to_path_buf(), e))?;
        definition.validate()?;
        Ok(definition)
    }

    fn validate(&self) -> Result<(), GridDefinitionError> {
        if let GridDefinition::Flattened { lat2d, lon2d } = self {
            if lat2d.len() != lon2d.len() {
                return Err(GridDefinitionError::AxisLengthMismatch {
                    lat: lat2d.len(),
                    lon: lon2d.len(),
                });
            }
        }
        if self.grid_count() == 0 {
            return Err(GridDefinitionError::Empty);
        }
        Ok(())
    }

    /// Total number of grid cells, i.e. the length every snapshot must have.
    pub fn grid_count(&self) -> usize {
        match self {
            GridDefinition::Dimensions { nx, ny } => nx * ny,
            GridDefinition::Axes { lat, lon } => lat.len() * lon.len(),
            GridDefinition::Flattened { lat2d, .. } => lat2d.len(),
        }
    }

    /// Latitude/longitude of a grid index, when the definition carries coordinates.
    pub fn coordinates(&self, grid_idx: usize) -> Option<(f64, f64)> {
        match self {
            GridDefinition::Dimensions { .. } => None,
            GridDefinition::Axes { lat, lon } => {
                if lon.is_empty() {
                    return None;
                }
                let row = grid_idx / lon.len();
                let col = grid_idx % lon.len();
                Some((*lat.get(row)?, *lon.get(col)?))
            }
            GridDefinition::Flattened { lat2d, lon2d } => {
                Some((*lat2d.get(grid_idx)?, *lon2d.get(grid_idx)?))
            }
        }
    }
}
