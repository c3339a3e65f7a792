//! Taubin smoothing: volume-preserving surface denoising.
//!
//! Plain Laplacian smoothing shrinks a closed surface toward its centroid.
//! Taubin's variant alternates a shrink pass (positive lambda) with an
//! inflate pass (negative mu, slightly larger magnitude), forming a band-pass
//! filter that damps high-frequency scan noise while keeping enclosed volume
//! nearly constant.

use nalgebra::{Point3, Vector3};
use tracing::{debug, info};

use crate::types::Mesh;

/// Taubin filter coefficients.
#[derive(Debug, Clone, Copy)]
pub struct TaubinParams {
    /// Number of shrink/inflate iteration pairs. Zero is a no-op.
    pub iterations: usize,

    /// Shrink step size, positive. Typical 0.5.
    pub lambda: f64,

    /// Inflate step size, negative with |mu| > lambda. Typical -0.53.
    pub mu: f64,
}

impl Default for TaubinParams {
    fn default() -> Self {
        Self {
            iterations: 5,
            lambda: 0.5,
            mu: -0.53,
        }
    }
}

/// Per-vertex neighbor lists from triangle co-occurrence.
///
/// Two vertices are neighbors iff they appear in a common face. Lists are
/// sorted and deduplicated; vertices referenced by no face get empty lists.
pub fn build_vertex_adjacency(faces: &[[u32; 3]], vertex_count: usize) -> Vec<Vec<u32>> {
    let mut adjacency = vec![Vec::new(); vertex_count];

    for face in faces {
        for i in 0..3 {
            let v = face[i] as usize;
            adjacency[v].push(face[(i + 1) % 3]);
            adjacency[v].push(face[(i + 2) % 3]);
        }
    }

    for neighbors in &mut adjacency {
        neighbors.sort_unstable();
        neighbors.dedup();
    }

    adjacency
}

/// One neighbor-averaging pass: displace every vertex by `factor` times the
/// vector from the vertex to its neighbor centroid, from a snapshot of the
/// current positions. Vertices without neighbors are left in place.
fn neighbor_average_pass(mesh: &mut Mesh, adjacency: &[Vec<u32>], factor: f64) -> usize {
    let snapshot: Vec<Point3<f64>> = mesh.vertices.iter().map(|v| v.position).collect();
    let mut moved = 0;

    for (i, neighbors) in adjacency.iter().enumerate() {
        if neighbors.is_empty() {
            continue;
        }

        let mut centroid = Vector3::zeros();
        for &n in neighbors {
            centroid += snapshot[n as usize].coords;
        }
        centroid /= neighbors.len() as f64;

        let displacement = (centroid - snapshot[i].coords) * factor;
        if displacement.norm_squared() > 0.0 {
            mesh.vertices[i].position += displacement;
            moved += 1;
        }
    }

    moved
}

/// Smooth vertex positions in place with the Taubin lambda/mu filter.
///
/// Connectivity is never altered and texture coordinates are untouched.
/// Stored vertex normals are invalidated (cleared) once any position moves;
/// recompute them downstream if needed. Zero iterations returns the mesh
/// unchanged.
pub fn taubin_smooth(mesh: &mut Mesh, params: &TaubinParams) {
    if params.iterations == 0 || mesh.vertices.len() < 3 {
        debug!("taubin smoothing skipped (iterations=0 or trivial mesh)");
        return;
    }

    let adjacency = build_vertex_adjacency(&mesh.faces, mesh.vertices.len());
    let isolated = adjacency.iter().filter(|n| n.is_empty()).count();
    if isolated > 0 {
        debug!(isolated, "vertices without neighbors will not move");
    }

    let mut any_moved = false;
    for iteration in 0..params.iterations {
        let shrunk = neighbor_average_pass(mesh, &adjacency, params.lambda);
        let inflated = neighbor_average_pass(mesh, &adjacency, params.mu);
        any_moved |= shrunk > 0 || inflated > 0;
        debug!(iteration, shrunk, inflated, "taubin iteration complete");
    }

    if any_moved {
        for vertex in &mut mesh.vertices {
            vertex.normal = None;
        }
    }

    info!(
        iterations = params.iterations,
        lambda = params.lambda,
        mu = params.mu,
        "taubin smoothing complete"
    );
}
