//! Small tracing helpers shared by the pipeline stages.

use std::time::Instant;

use tracing::{debug, info_span, span::EnteredSpan};

use crate::types::Mesh;

/// Guard that times an operation and logs the elapsed milliseconds on drop.
pub struct OperationTimer {
    name: &'static str,
    start: Instant,
    _span: EnteredSpan,
}

impl OperationTimer {
    /// Start timing; the returned guard keeps the operation span entered.
    pub fn start(name: &'static str) -> Self {
        let span = info_span!("operation", name).entered();
        Self {
            name,
            start: Instant::now(),
            _span: span,
        }
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        debug!(name = self.name, elapsed_ms, "operation finished");
    }
}

/// Log basic size and bounds for a mesh at a pipeline checkpoint.
pub fn log_mesh_stats(mesh: &Mesh, label: &str) {
    if let Some((min, max)) = mesh.bounds() {
        let dims = max - min;
        debug!(
            label,
            vertices = mesh.vertex_count(),
            faces = mesh.face_count(),
            dx = dims.x,
            dy = dims.y,
            dz = dims.z,
            "mesh stats"
        );
    } else {
        debug!(label, "mesh stats: empty mesh");
    }
}
