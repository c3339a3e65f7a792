//! Pipeline orchestration: smooth, optionally remove bumps, repair.
//!
//! The pipeline is a fixed state machine, strictly sequential with no
//! branching back: Loaded -> Smoothed -> [BumpRemoved] -> Repaired -> Done.
//! Reconstruction failure during bump removal degrades that stage to a
//! no-op recorded in the report; any other stage failure aborts with no
//! partial output.

use std::fmt;

use tracing::{debug, info, warn};

use crate::error::{PrepError, PrepResult};
use crate::pointcloud::PointCloud;
use crate::reconstruct::reconstruct;
use crate::repair::{make_printable, RepairParams};
use crate::smooth::{taubin_smooth, TaubinParams};
use crate::tracing_ext::{log_mesh_stats, OperationTimer};
use crate::types::Mesh;
use crate::validate::{validate_mesh_data, DiagnosticReport};

/// Pipeline state, advanced strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loaded,
    Smoothed,
    BumpRemoved,
    Repaired,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Loaded => "loaded",
            Stage::Smoothed => "smoothed",
            Stage::BumpRemoved => "bump-removed",
            Stage::Repaired => "repaired",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Immutable configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// Taubin iteration pairs. Zero skips smoothing.
    pub iterations: usize,

    /// Taubin shrink coefficient, positive.
    pub lambda: f64,

    /// Taubin inflate coefficient; must be more negative than -lambda.
    pub mu: f64,

    /// Run resample -> outlier filter -> reconstruct between smoothing
    /// and repair.
    pub remove_bumps: bool,

    /// Reconstruction voxel size, positive.
    pub voxel_size: f64,

    /// Neighbor count for statistical outlier removal.
    pub outlier_neighbors: usize,

    /// Standard-deviation ratio for the outlier threshold.
    pub outlier_std_ratio: f64,

    /// Repair-stage tuning.
    pub repair: RepairParams,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            iterations: 5,
            lambda: 0.5,
            mu: -0.53,
            remove_bumps: false,
            voxel_size: 0.01,
            outlier_neighbors: 20,
            outlier_std_ratio: 2.0,
            repair: RepairParams::default(),
        }
    }
}

impl ProcessingConfig {
    /// Check every numeric constraint up front.
    pub fn validate(&self) -> PrepResult<()> {
        if !(self.lambda > 0.0 && self.lambda.is_finite()) {
            return Err(PrepError::invalid_parameter(
                "lambda",
                format!("must be positive and finite, got {}", self.lambda),
            ));
        }
        if !(self.mu.is_finite() && self.mu < -self.lambda) {
            return Err(PrepError::invalid_parameter(
                "mu",
                format!(
                    "must be more negative than -lambda ({}) to preserve volume, got {}",
                    -self.lambda,
                    self.mu
                ),
            ));
        }
        if !(self.voxel_size > 0.0 && self.voxel_size.is_finite()) {
            return Err(PrepError::invalid_parameter(
                "voxel_size",
                format!("must be positive and finite, got {}", self.voxel_size),
            ));
        }
        if self.outlier_neighbors == 0 {
            return Err(PrepError::invalid_parameter(
                "outlier_neighbors",
                "must be at least 1",
            ));
        }
        if !(self.outlier_std_ratio > 0.0 && self.outlier_std_ratio.is_finite()) {
            return Err(PrepError::invalid_parameter(
                "outlier_std_ratio",
                format!("must be positive and finite, got {}", self.outlier_std_ratio),
            ));
        }
        Ok(())
    }

    fn taubin(&self) -> TaubinParams {
        TaubinParams {
            iterations: self.iterations,
            lambda: self.lambda,
            mu: self.mu,
        }
    }
}

/// Run the full preparation pipeline on a mesh.
///
/// Fails before any stage runs when the configuration is invalid or the
/// mesh is empty, has non-finite coordinates, or references out-of-range
/// vertices. Returns the prepared mesh together with its diagnosis.
pub fn process(mesh: &Mesh, config: &ProcessingConfig) -> PrepResult<(Mesh, DiagnosticReport)> {
    config.validate()?;
    validate_mesh_data(mesh)?;

    let mut stage = Stage::Loaded;
    let mut current = mesh.clone();
    log_mesh_stats(&current, "input");
    debug!(stage = %stage, "pipeline started");

    {
        let _timer = OperationTimer::start("taubin_smooth");
        taubin_smooth(&mut current, &config.taubin());
    }
    stage = Stage::Smoothed;
    debug!(stage = %stage, "stage complete");

    let mut reconstruction_fallback = None;
    if config.remove_bumps {
        let _timer = OperationTimer::start("bump_removal");
        let cloud = PointCloud::from_mesh(&current);
        let filtered = cloud.remove_outliers(config.outlier_neighbors, config.outlier_std_ratio);

        match reconstruct(&filtered, config.voxel_size) {
            Ok(rebuilt) => {
                log_mesh_stats(&rebuilt, "reconstructed");
                current = rebuilt;
            }
            Err(err) if err.is_reconstruction() => {
                // Bump removal is best-effort; keep the smoothed mesh.
                warn!(error = %err, "reconstruction failed; keeping pre-reconstruction mesh");
                reconstruction_fallback = Some(err.to_string());
            }
            Err(err) => return Err(err),
        }
        stage = Stage::BumpRemoved;
        debug!(stage = %stage, "stage complete");
    }

    let (repaired, mut report) = {
        let _timer = OperationTimer::start("make_printable");
        make_printable(&current, &config.repair)?
    };
    current = repaired;
    stage = Stage::Repaired;
    debug!(stage = %stage, "stage complete");

    report.reconstruction_fallback = reconstruction_fallback;
    stage = Stage::Done;
    info!(
        stage = %stage,
        vertices = current.vertex_count(),
        faces = current.face_count(),
        printable = report.is_printable(),
        "pipeline complete"
    );

    Ok((current, report))
}
