//! Error types for the mesh preparation pipeline.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result alias used throughout the library.
pub type PrepResult<T> = Result<T, PrepError>;

/// Errors produced by the preparation pipeline.
///
/// Three families matter to callers: invalid-mesh errors abort before any
/// stage runs, reconstruction errors are absorbed by the orchestrator
/// (bump removal is best-effort), and everything else is fatal.
#[derive(Debug, Error, Diagnostic)]
pub enum PrepError {
    #[error("mesh is empty: {details}")]
    #[diagnostic(
        code(prep::mesh::empty),
        help("the input must contain at least one vertex and one triangle")
    )]
    EmptyMesh { details: String },

    #[error("face {face_index} references vertex {vertex_index}, but the mesh has only {vertex_count} vertices")]
    #[diagnostic(
        code(prep::mesh::vertex_index),
        help("the input file is corrupt or was truncated during export")
    )]
    InvalidVertexIndex {
        face_index: usize,
        vertex_index: u32,
        vertex_count: usize,
    },

    #[error("vertex {vertex_index} has a non-finite {coordinate} coordinate: {value}")]
    #[diagnostic(
        code(prep::mesh::coordinate),
        help("NaN or infinite coordinates usually indicate a broken exporter")
    )]
    InvalidCoordinate {
        vertex_index: usize,
        coordinate: char,
        value: f64,
    },

    #[error("invalid parameter {name}: {details}")]
    #[diagnostic(code(prep::config::parameter))]
    InvalidParameter { name: &'static str, details: String },

    #[error("point cloud has {point_count} points, reconstruction needs at least {required}")]
    #[diagnostic(
        code(prep::reconstruct::insufficient_points),
        help("outlier filtering may have removed too much; try a larger std-ratio")
    )]
    InsufficientPoints {
        point_count: usize,
        required: usize,
    },

    #[error("point cloud is degenerate: {details}")]
    #[diagnostic(
        code(prep::reconstruct::degenerate_cloud),
        help("near-coplanar or zero-spread samples cannot bound a volume")
    )]
    DegenerateCloud { details: String },

    #[error("surface reconstruction failed: {details}")]
    #[diagnostic(code(prep::reconstruct::failed))]
    ReconstructionFailed { details: String },

    #[error("repair failed: {details}")]
    #[diagnostic(
        code(prep::repair::failed),
        help("this indicates an internal invariant violation; please report it")
    )]
    RepairFailed { details: String },

    #[error("unsupported file format: {extension:?}")]
    #[diagnostic(
        code(prep::io::unsupported_format),
        help("supported extensions: .obj, .ply")
    )]
    UnsupportedFormat { extension: Option<String> },

    #[error("failed to read {path:?}")]
    #[diagnostic(code(prep::io::read))]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path:?}")]
    #[diagnostic(code(prep::io::write))]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {details}")]
    #[diagnostic(code(prep::io::parse))]
    ParseError { path: PathBuf, details: String },
}

impl PrepError {
    /// Convenience constructor for empty-mesh errors.
    pub fn empty_mesh(details: impl Into<String>) -> Self {
        Self::EmptyMesh {
            details: details.into(),
        }
    }

    /// Convenience constructor for out-of-range face indices.
    pub fn invalid_vertex_index(face_index: usize, vertex_index: u32, vertex_count: usize) -> Self {
        Self::InvalidVertexIndex {
            face_index,
            vertex_index,
            vertex_count,
        }
    }

    /// Convenience constructor for parameter violations.
    pub fn invalid_parameter(name: &'static str, details: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            details: details.into(),
        }
    }

    /// Convenience constructor for repair invariant violations.
    pub fn repair_failed(details: impl Into<String>) -> Self {
        Self::RepairFailed {
            details: details.into(),
        }
    }

    /// True for errors that invalidate the input mesh before any stage runs.
    pub fn is_invalid_mesh(&self) -> bool {
        matches!(
            self,
            Self::EmptyMesh { .. } | Self::InvalidVertexIndex { .. } | Self::InvalidCoordinate { .. }
        )
    }

    /// True for reconstruction-class failures. The orchestrator absorbs
    /// these and falls back to the pre-reconstruction mesh.
    pub fn is_reconstruction(&self) -> bool {
        matches!(
            self,
            Self::InsufficientPoints { .. }
                | Self::DegenerateCloud { .. }
                | Self::ReconstructionFailed { .. }
        )
    }

    /// Stable short code for log lines and CLI output.
    pub fn code_str(&self) -> &'static str {
        match self {
            Self::EmptyMesh { .. } => "PREP-1001",
            Self::InvalidVertexIndex { .. } => "PREP-1002",
            Self::InvalidCoordinate { .. } => "PREP-1003",
            Self::InvalidParameter { .. } => "PREP-1004",
            Self::InsufficientPoints { .. } => "PREP-2001",
            Self::DegenerateCloud { .. } => "PREP-2002",
            Self::ReconstructionFailed { .. } => "PREP-2003",
            Self::RepairFailed { .. } => "PREP-3001",
            Self::UnsupportedFormat { .. } => "PREP-4001",
            Self::IoRead { .. } => "PREP-4002",
            Self::IoWrite { .. } => "PREP-4003",
            Self::ParseError { .. } => "PREP-4004",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_predicates() {
        let invalid = PrepError::empty_mesh("no data");
        assert!(invalid.is_invalid_mesh());
        assert!(!invalid.is_reconstruction());

        let recon = PrepError::InsufficientPoints {
            point_count: 4,
            required: 10,
        };
        assert!(recon.is_reconstruction());
        assert!(!recon.is_invalid_mesh());

        let repair = PrepError::repair_failed("weld produced an empty mesh");
        assert!(!repair.is_reconstruction());
        assert!(!repair.is_invalid_mesh());
    }

    #[test]
    fn error_messages_mention_indices() {
        let err = PrepError::invalid_vertex_index(7, 42, 10);
        let msg = err.to_string();
        assert!(msg.contains('7'), "message should name the face: {msg}");
        assert!(msg.contains("42"), "message should name the index: {msg}");
        assert_eq!(err.code_str(), "PREP-1002");
    }

    #[test]
    fn codes_are_unique() {
        let errors = vec![
            PrepError::empty_mesh(""),
            PrepError::invalid_vertex_index(0, 0, 0),
            PrepError::InvalidCoordinate {
                vertex_index: 0,
                coordinate: 'x',
                value: f64::NAN,
            },
            PrepError::invalid_parameter("voxel_size", ""),
            PrepError::InsufficientPoints {
                point_count: 0,
                required: 10,
            },
            PrepError::DegenerateCloud {
                details: String::new(),
            },
            PrepError::ReconstructionFailed {
                details: String::new(),
            },
            PrepError::repair_failed(""),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code_str()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
