//! xG heatmaps over a normalised pitch grid.
//!
//! Generation scores every grid point for each (situation, shot type) pair
//! and writes one JSON document:
//!
//! ```json
//! {
//!   "grid_definition": {"x_coords": [...], "y_coords": [...]},
//!   "heatmaps": {"OpenPlay": {"Head": [[0.01, ...], ...], "None": ...}, "None": ...}
//! }
//! ```
//!
//! Grids are indexed `[y][x]`. `"None"` is the key for an unspecified
//! situation or shot type. The API serves slices of this file.

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;

use crate::error::XgResult;
use crate::pitch::NormalizedCoordinate;
use crate::selector::PENALTY_XG;
use crate::service::{round_to, PredictionService};
use crate::types::{GridDefinition, GridQuery, GridResponse, ShotType, Situation};

pub const NONE_KEY: &str = "None";

/// Situations a heatmap is generated for (`None` = any).
pub const HEATMAP_SITUATIONS: [Option<Situation>; 5] = [
    None,
    Some(Situation::OpenPlay),
    Some(Situation::SetPiece),
    Some(Situation::DirectFreekick),
    Some(Situation::FromCorner),
];

/// Shot types a heatmap is generated for (`None` = any).
pub const HEATMAP_SHOT_TYPES: [Option<ShotType>; 5] = [
    None,
    Some(ShotType::Head),
    Some(ShotType::RightFoot),
    Some(ShotType::LeftFoot),
    Some(ShotType::OtherBodyPart),
];

pub type Grid = Vec<Vec<f64>>;

/// Full heatmap document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapData {
    pub grid_definition: GridDefinition,
    pub heatmaps: BTreeMap<String, BTreeMap<String, Grid>>,
}

fn key<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| NONE_KEY.to_string())
}

/// Axis values `0, r, 2r, ..., 1`, rounded to 2 decimals.
pub fn grid_axis(resolution: f64) -> Result<Vec<f64>> {
    if !(0.01..=1.0).contains(&resolution) {
        anyhow::bail!("Grid resolution must be between 0.01 and 1, got {}", resolution);
    }
    let steps = (1.0 / resolution + 1e-9).floor() as usize;
    Ok((0..=steps)
        .map(|i| round_to(i as f64 * resolution, 2))
        .collect())
}

/// Score every point of the `axis` × `axis` grid for one context.
pub fn generate_combo(
    service: &PredictionService,
    situation: Option<Situation>,
    shot_type: Option<ShotType>,
    axis: &[f64],
) -> XgResult<Grid> {
    let n = axis.len();

    if situation == Some(Situation::Penalty) {
        return Ok(vec![vec![PENALTY_XG; n]; n]);
    }

    let points: Vec<NormalizedCoordinate> = axis
        .iter()
        .flat_map(|&y| axis.iter().map(move |&x| NormalizedCoordinate { x, y }))
        .collect();

    let probs = service.predict_batch(&points, situation, shot_type)?;

    Ok(probs
        .chunks(n.max(1))
        .map(|row| row.iter().map(|p| round_to(*p, 4)).collect())
        .collect())
}

/// Generate heatmaps for every situation / shot type pair in parallel.
pub fn generate(service: &PredictionService, resolution: f64) -> Result<HeatmapData> {
    let axis = grid_axis(resolution)?;

    let combos: Vec<(Option<Situation>, Option<ShotType>)> = HEATMAP_SITUATIONS
        .iter()
        .flat_map(|s| HEATMAP_SHOT_TYPES.iter().map(move |t| (*s, *t)))
        .collect();

    tracing::info!(
        "Generating {} heatmaps on a {}x{} grid",
        combos.len(),
        axis.len(),
        axis.len()
    );

    let grids = combos
        .par_iter()
        .map(|&(situation, shot_type)| {
            let grid = generate_combo(service, situation, shot_type, &axis)?;
            tracing::debug!("Heatmap {}/{} done", key(situation), key(shot_type));
            Ok((situation, shot_type, grid))
        })
        .collect::<XgResult<Vec<_>>>()?;

    let mut heatmaps: BTreeMap<String, BTreeMap<String, Grid>> = BTreeMap::new();
    for (situation, shot_type, grid) in grids {
        heatmaps
            .entry(key(situation))
            .or_default()
            .insert(key(shot_type), grid);
    }

    Ok(HeatmapData {
        grid_definition: GridDefinition {
            x_coords: axis.clone(),
            y_coords: axis,
        },
        heatmaps,
    })
}

impl HeatmapData {
    /// Load a heatmap document from file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("Heatmap file {} not found", path.as_ref().display()))?;
        let data = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Invalid heatmap file {}", path.as_ref().display()))?;
        Ok(data)
    }

    /// Write compact JSON, creating parent directories.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Resolve a grid request against the stored heatmaps.
    pub fn lookup(&self, query: &GridQuery) -> Result<GridResponse, GridError> {
        let situation_key = match query.situation.as_deref() {
            None => NONE_KEY.to_string(),
            Some("Penalty") => return Err(GridError::PenaltyUnavailable),
            Some(s) => match Situation::from_name(s) {
                Some(v) if HEATMAP_SITUATIONS.contains(&Some(v)) => s.to_string(),
                _ => return Err(GridError::InvalidSituation(s.to_string())),
            },
        };
        let shot_type_key = match query.shot_type.as_deref() {
            None => NONE_KEY.to_string(),
            Some(t) => match ShotType::from_name(t) {
                Some(_) => t.to_string(),
                None => return Err(GridError::InvalidShotType(t.to_string())),
            },
        };

        let heatmap = self
            .heatmaps
            .get(&situation_key)
            .and_then(|by_shot| by_shot.get(&shot_type_key))
            .ok_or(GridError::NotFound)?;

        let mut grid_definition = self.grid_definition.clone();
        // Scale only when both dimensions are supplied.
        if let (Some(max_length), Some(max_width)) = (query.max_length, query.max_width) {
            if !(max_length > 0.0 && max_width > 0.0) {
                return Err(GridError::InvalidDimensions);
            }
            grid_definition.x_coords.iter_mut().for_each(|x| *x *= max_length);
            grid_definition.y_coords.iter_mut().for_each(|y| *y *= max_width);
        }

        Ok(GridResponse {
            grid_definition,
            heatmap: heatmap.clone(),
        })
    }
}

/// Grid lookup failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("The 'Penalty' situation is not available for grid prediction")]
    PenaltyUnavailable,

    #[error(
        "Invalid situation '{0}' - valid values are: OpenPlay, SetPiece, DirectFreekick, FromCorner"
    )]
    InvalidSituation(String),

    #[error("Invalid shot type '{0}' - valid values are: Head, RightFoot, LeftFoot, OtherBodyPart")]
    InvalidShotType(String),

    #[error("max_length and max_width must be positive numbers")]
    InvalidDimensions,

    #[error("Data not found for the specified situation and shot_type combination")]
    NotFound,
}
