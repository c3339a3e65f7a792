//! Input validation and topology diagnosis.

use std::collections::VecDeque;
use std::fmt;

use hashbrown::HashSet;
use tracing::debug;

use crate::adjacency::MeshAdjacency;
use crate::error::{PrepError, PrepResult};
use crate::types::Mesh;

/// Reject meshes that cannot enter the pipeline: empty, non-finite
/// coordinates, or face indices past the vertex array.
///
/// Runs before any stage so a malformed input never gets partially
/// processed.
pub fn validate_mesh_data(mesh: &Mesh) -> PrepResult<()> {
    if mesh.is_empty() {
        return Err(PrepError::empty_mesh(format!(
            "{} vertices, {} faces",
            mesh.vertex_count(),
            mesh.face_count()
        )));
    }

    for (i, vertex) in mesh.vertices.iter().enumerate() {
        let p = vertex.position;
        for (coordinate, value) in [('x', p.x), ('y', p.y), ('z', p.z)] {
            if !value.is_finite() {
                return Err(PrepError::InvalidCoordinate {
                    vertex_index: i,
                    coordinate,
                    value,
                });
            }
        }
    }

    let vertex_count = mesh.vertex_count();
    for (face_index, face) in mesh.faces.iter().enumerate() {
        for &vertex_index in face {
            if vertex_index as usize >= vertex_count {
                return Err(PrepError::invalid_vertex_index(
                    face_index,
                    vertex_index,
                    vertex_count,
                ));
            }
        }
    }

    Ok(())
}

/// Topology booleans and edge counts for a mesh.
#[derive(Debug, Clone, Copy)]
pub struct TopologySummary {
    pub is_watertight: bool,
    pub is_edge_manifold: bool,
    pub is_vertex_manifold: bool,
    pub boundary_edge_count: usize,
    pub non_manifold_edge_count: usize,
}

/// Diagnose edge and vertex topology.
///
/// Edge-manifold: no edge borders more than two faces. Watertight:
/// edge-manifold with no boundary edges. Vertex-manifold: the faces around
/// every vertex form a single edge-connected fan.
pub fn analyze_topology(mesh: &Mesh) -> TopologySummary {
    let adjacency = MeshAdjacency::build(&mesh.faces);

    let boundary_edge_count = adjacency.boundary_edge_count();
    let non_manifold_edge_count = adjacency.non_manifold_edge_count();
    let is_edge_manifold = non_manifold_edge_count == 0;
    let is_watertight = is_edge_manifold && boundary_edge_count == 0;
    let is_vertex_manifold = all_vertex_fans_connected(mesh, &adjacency);

    debug!(
        boundary_edge_count,
        non_manifold_edge_count, is_watertight, is_vertex_manifold, "topology analyzed"
    );

    TopologySummary {
        is_watertight,
        is_edge_manifold,
        is_vertex_manifold,
        boundary_edge_count,
        non_manifold_edge_count,
    }
}

/// Check that each vertex's incident faces form one connected group, where
/// two faces are connected when they share an edge through the vertex. A
/// vertex joining two otherwise-separate triangle groups (a bowtie) fails.
fn all_vertex_fans_connected(mesh: &Mesh, adjacency: &MeshAdjacency) -> bool {
    for (&vertex, incident) in &adjacency.vertex_to_faces {
        if incident.len() <= 1 {
            continue;
        }
        let incident_set: HashSet<u32> = incident.iter().copied().collect();

        // BFS over incident faces through edges containing this vertex.
        let mut visited: HashSet<u32> = HashSet::with_capacity(incident.len());
        let mut queue = VecDeque::new();
        visited.insert(incident[0]);
        queue.push_back(incident[0]);

        while let Some(fi) = queue.pop_front() {
            let face = mesh.faces[fi as usize];
            for &other in &face {
                if other == vertex {
                    continue;
                }
                for &neighbor in adjacency.faces_of_edge(vertex, other) {
                    if incident_set.contains(&neighbor) && visited.insert(neighbor) {
                        queue.push_back(neighbor);
                    }
                }
            }
        }

        if visited.len() != incident.len() {
            return false;
        }
    }
    true
}

/// Final pipeline diagnosis, returned to the caller alongside the mesh.
/// Built once at the end of processing and not mutated afterwards.
#[derive(Debug, Clone)]
pub struct DiagnosticReport {
    pub is_watertight: bool,
    pub is_vertex_manifold: bool,
    pub is_edge_manifold: bool,
    pub is_orientable: bool,

    /// Faces dropped for repeated indices or vanishing area.
    pub degenerate_faces_removed: usize,

    /// Vertices merged away by the weld pass.
    pub duplicate_vertices_merged: usize,

    /// Faces dropped for duplicating an earlier face.
    pub duplicate_faces_removed: usize,

    /// Faces whose winding was flipped for consistency.
    pub faces_reoriented: usize,

    pub boundary_edge_count: usize,
    pub non_manifold_edge_count: usize,

    /// Final mesh size.
    pub vertex_count: usize,
    pub face_count: usize,

    /// Set when bump removal was requested but reconstruction failed and
    /// the pipeline fell back to the pre-reconstruction mesh.
    pub reconstruction_fallback: Option<String>,
}

impl DiagnosticReport {
    /// A mesh is print-ready when it is watertight, manifold in both
    /// senses, and orientable.
    pub fn is_printable(&self) -> bool {
        self.is_watertight && self.is_vertex_manifold && self.is_edge_manifold && self.is_orientable
    }
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let yes_no = |b: bool| if b { "yes" } else { "no" };
        writeln!(f, "Mesh diagnosis")?;
        writeln!(f, "  vertices:            {}", self.vertex_count)?;
        writeln!(f, "  faces:               {}", self.face_count)?;
        writeln!(f, "  watertight:          {}", yes_no(self.is_watertight))?;
        writeln!(f, "  edge-manifold:       {}", yes_no(self.is_edge_manifold))?;
        writeln!(
            f,
            "  vertex-manifold:     {}",
            yes_no(self.is_vertex_manifold)
        )?;
        writeln!(f, "  orientable:          {}", yes_no(self.is_orientable))?;
        writeln!(f, "  boundary edges:      {}", self.boundary_edge_count)?;
        writeln!(f, "  non-manifold edges:  {}", self.non_manifold_edge_count)?;
        writeln!(
            f,
            "  degenerates removed: {}",
            self.degenerate_faces_removed
        )?;
        writeln!(
            f,
            "  vertices merged:     {}",
            self.duplicate_vertices_merged
        )?;
        writeln!(f, "  faces reoriented:    {}", self.faces_reoriented)?;
        if let Some(reason) = &self.reconstruction_fallback {
            writeln!(f, "  bump removal:        skipped ({reason})")?;
        }
        write!(
            f,
            "  print-ready:         {}",
            yes_no(self.is_printable())
        )
    }
}
