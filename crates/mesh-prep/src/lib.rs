//! Mesh preparation for 3D printing.
//!
//! Takes a triangulated scan or sculpt and turns it into something a slicer
//! will accept: Taubin smoothing to knock down noise without shrinking the
//! model, optional bump removal via point-cloud resampling and implicit
//! surface reconstruction, then a repair pass that removes degenerate and
//! duplicate geometry, welds coincident vertices, fixes winding, and reports
//! on watertightness and manifoldness.
//!
//! The one-call entry point is [`process`]:
//!
//! ```no_run
//! use mesh_prep::{load_mesh, process, save_mesh, ProcessingConfig};
//! use std::path::Path;
//!
//! # fn main() -> mesh_prep::PrepResult<()> {
//! let mesh = load_mesh(Path::new("scan.obj"))?;
//! let (prepared, report) = process(&mesh, &ProcessingConfig::default())?;
//! println!("{report}");
//! save_mesh(&prepared, Path::new("printable.obj"))?;
//! # Ok(())
//! # }
//! ```
//!
//! Individual stages are exported for callers that want finer control.

pub mod adjacency;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod pointcloud;
pub mod reconstruct;
pub mod repair;
pub mod smooth;
pub mod tracing_ext;
pub mod types;
pub mod validate;
pub mod winding;

pub use error::{PrepError, PrepResult};
pub use io::{load_mesh, save_mesh, MeshFormat};
pub use pipeline::{process, ProcessingConfig, Stage};
pub use pointcloud::{CloudPoint, PointCloud};
pub use reconstruct::reconstruct;
pub use repair::{make_printable, RepairParams};
pub use smooth::{taubin_smooth, TaubinParams};
pub use types::{Mesh, Triangle, Vertex};
pub use validate::{analyze_topology, validate_mesh_data, DiagnosticReport, TopologySummary};
pub use winding::{fix_winding, WindingOutcome};
