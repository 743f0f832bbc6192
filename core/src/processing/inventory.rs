//! Bottom-up cross-check from a transmitter inventory.
//!
//! Transmitter power is spread over a fixed footprint and binned onto a
//! regular lat/lon grid spanning the transmitters and the registered sites.

use crate::config::PhysicalConstants;
use crate::model::{Co2Comparison, SiteRegistry};
use crate::prelude::{PipelineError, PipelineResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Area one transmitter's power is assumed to spread over (m²).
pub const FOOTPRINT_M2: f64 = 1.0e6;

/// Upper bound on grid cells; finer resolutions over wide extents are rejected.
pub const MAX_GRID_CELLS: usize = 4_000_000;

const REQUIRED_COLUMNS: [&str; 4] = ["frequency_hz", "power_w", "latitude", "longitude"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transmitter {
    pub frequency_hz: f64,
    pub power_w: f64,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub height_m: Option<f64>,
    #[serde(default, rename = "type")]
    pub service: Option<String>,
}

pub fn load_inventory(path: &Path) -> PipelineResult<Vec<Transmitter>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::InvalidInput(format!(
            "inventory {} is missing columns {:?}",
            path.display(),
            missing
        )));
    }
    let mut transmitters = Vec::new();
    for row in reader.deserialize::<Transmitter>() {
        transmitters.push(row?);
    }
    Ok(transmitters)
}

/// Power density on a regular grid; rows are latitude, columns longitude.
#[derive(Debug, Clone)]
pub struct PowerDensityGrid {
    pub south: f64,
    pub west: f64,
    pub resolution_deg: f64,
    pub density_w_m2: Array2<f64>,
}

impl PowerDensityGrid {
    pub fn build(
        transmitters: &[Transmitter],
        registry: &SiteRegistry,
        resolution_deg: f64,
    ) -> PipelineResult<Self> {
        if !(resolution_deg.is_finite() && resolution_deg > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "grid resolution {} must be positive",
                resolution_deg
            )));
        }
        let points: Vec<(f64, f64)> = transmitters
            .iter()
            .map(|t| (t.latitude, t.longitude))
            .chain(registry.iter().map(|s| (s.latitude, s.longitude)))
            .collect();
        if points.is_empty() {
            return Err(PipelineError::InvalidInput(
                "no transmitters or sites to grid".into(),
            ));
        }

        let fold = |pick: fn(&(f64, f64)) -> f64, init: f64, op: fn(f64, f64) -> f64| {
            points.iter().map(pick).fold(init, op)
        };
        let south = fold(|p| p.0, f64::INFINITY, f64::min) - resolution_deg;
        let north = fold(|p| p.0, f64::NEG_INFINITY, f64::max) + resolution_deg;
        let west = fold(|p| p.1, f64::INFINITY, f64::min) - resolution_deg;
        let east = fold(|p| p.1, f64::NEG_INFINITY, f64::max) + resolution_deg;

        let rows = ((north - south) / resolution_deg).ceil() + 1.0;
        let cols = ((east - west) / resolution_deg).ceil() + 1.0;
        let cells = rows * cols;
        if !(cells.is_finite() && cells <= MAX_GRID_CELLS as f64) {
            return Err(PipelineError::InvalidConfig(format!(
                "grid resolution {} needs {:.3e} cells, limit is {}",
                resolution_deg, cells, MAX_GRID_CELLS
            )));
        }
        let (rows, cols) = (rows as usize, cols as usize);
        let mut grid = Self {
            south,
            west,
            resolution_deg,
            density_w_m2: Array2::zeros((rows, cols)),
        };
        for transmitter in transmitters {
            if let Some(cell) = grid.cell(transmitter.latitude, transmitter.longitude) {
                grid.density_w_m2[cell] += transmitter.power_w / FOOTPRINT_M2;
            }
        }
        Ok(grid)
    }

    /// Nearest cell to a coordinate, if it falls on the grid.
    pub fn cell(&self, latitude: f64, longitude: f64) -> Option<(usize, usize)> {
        let row = ((latitude - self.south) / self.resolution_deg).round();
        let col = ((longitude - self.west) / self.resolution_deg).round();
        let (rows, cols) = self.density_w_m2.dim();
        if row < 0.0 || col < 0.0 || row as usize >= rows || col as usize >= cols {
            return None;
        }
        Some((row as usize, col as usize))
    }

    pub fn density_at(&self, latitude: f64, longitude: f64) -> f64 {
        self.cell(latitude, longitude)
            .map(|cell| self.density_w_m2[cell])
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteDensity {
    pub site_id: String,
    pub density_w_m2: f64,
}

/// Summary of the inventory cross-check as persisted in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryAssessment {
    pub transmitters: usize,
    pub total_power_w: f64,
    pub resolution_deg: f64,
    pub grid_shape: (usize, usize),
    pub mean_density_w_m2: f64,
    pub max_density_w_m2: f64,
    pub absorption_fraction: f64,
    pub site_densities: Vec<SiteDensity>,
    pub forcing: Co2Comparison,
}

pub fn assess(
    transmitters: &[Transmitter],
    registry: &SiteRegistry,
    resolution_deg: f64,
    constants: &PhysicalConstants,
) -> PipelineResult<InventoryAssessment> {
    let grid = PowerDensityGrid::build(transmitters, registry, resolution_deg)?;
    let mean_density = grid.density_w_m2.mean().unwrap_or(0.0);
    let max_density = grid.density_w_m2.iter().copied().fold(0.0, f64::max);
    let absorption = constants.absorption.default_fraction;
    let site_densities = registry
        .iter()
        .map(|site| SiteDensity {
            site_id: site.id.clone(),
            density_w_m2: grid.density_at(site.latitude, site.longitude),
        })
        .collect();

    Ok(InventoryAssessment {
        transmitters: transmitters.len(),
        total_power_w: transmitters.iter().map(|t| t.power_w).sum(),
        resolution_deg,
        grid_shape: grid.density_w_m2.dim(),
        mean_density_w_m2: mean_density,
        max_density_w_m2: max_density,
        absorption_fraction: absorption,
        site_densities,
        forcing: Co2Comparison::new(
            mean_density * absorption,
            constants.co2_reference_forcing_w_m2,
        ),
    })
}
