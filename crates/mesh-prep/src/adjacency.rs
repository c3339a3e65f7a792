//! Edge and vertex adjacency built from a flat triangle list.
//!
//! Built once per pass over the current face list and treated as immutable;
//! any operation that changes connectivity rebuilds it rather than patching.

use hashbrown::HashMap;

/// Canonical undirected edge key: indices ordered ascending.
#[inline]
pub fn canonical_edge(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Face incidence maps for a triangle list.
#[derive(Debug, Default)]
pub struct MeshAdjacency {
    /// Undirected edge (min, max) to the faces sharing it.
    pub edge_to_faces: HashMap<(u32, u32), Vec<u32>>,

    /// Vertex index to the faces touching it.
    pub vertex_to_faces: HashMap<u32, Vec<u32>>,
}

impl MeshAdjacency {
    /// Build adjacency from a face list in a single pass.
    pub fn build(faces: &[[u32; 3]]) -> Self {
        let mut edge_to_faces: HashMap<(u32, u32), Vec<u32>> =
            HashMap::with_capacity(faces.len() * 3 / 2);
        let mut vertex_to_faces: HashMap<u32, Vec<u32>> = HashMap::new();

        for (face_idx, face) in faces.iter().enumerate() {
            let fi = face_idx as u32;
            for i in 0..3 {
                let a = face[i];
                let b = face[(i + 1) % 3];
                edge_to_faces
                    .entry(canonical_edge(a, b))
                    .or_default()
                    .push(fi);
            }
            for &v in face {
                let entry = vertex_to_faces.entry(v).or_default();
                // A face with a repeated index would register twice.
                if entry.last() != Some(&fi) {
                    entry.push(fi);
                }
            }
        }

        Self {
            edge_to_faces,
            vertex_to_faces,
        }
    }

    /// Faces sharing the undirected edge (a, b), in either order.
    pub fn faces_of_edge(&self, a: u32, b: u32) -> &[u32] {
        self.edge_to_faces
            .get(&canonical_edge(a, b))
            .map_or(&[], Vec::as_slice)
    }

    /// Number of edges bordered by exactly one face.
    pub fn boundary_edge_count(&self) -> usize {
        self.edge_to_faces
            .values()
            .filter(|faces| faces.len() == 1)
            .count()
    }

    /// Number of edges shared by more than two faces.
    pub fn non_manifold_edge_count(&self) -> usize {
        self.edge_to_faces
            .values()
            .filter(|faces| faces.len() > 2)
            .count()
    }

    /// Iterate over edges shared by more than two faces.
    pub fn non_manifold_edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.edge_to_faces
            .iter()
            .filter(|(_, faces)| faces.len() > 2)
            .map(|(&edge, _)| edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tetrahedron: every edge shared by exactly two faces.
    fn tetra_faces() -> Vec<[u32; 3]> {
        vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]]
    }

    #[test]
    fn tetrahedron_is_closed() {
        let adj = MeshAdjacency::build(&tetra_faces());
        assert_eq!(adj.edge_to_faces.len(), 6);
        assert_eq!(adj.boundary_edge_count(), 0);
        assert_eq!(adj.non_manifold_edge_count(), 0);
        for faces in adj.edge_to_faces.values() {
            assert_eq!(faces.len(), 2);
        }
    }

    #[test]
    fn single_triangle_is_all_boundary() {
        let adj = MeshAdjacency::build(&[[0, 1, 2]]);
        assert_eq!(adj.boundary_edge_count(), 3);
        assert_eq!(adj.non_manifold_edge_count(), 0);
        assert_eq!(adj.faces_of_edge(1, 0), &[0]);
        assert_eq!(adj.faces_of_edge(2, 1), &[0]);
        assert!(adj.faces_of_edge(0, 3).is_empty());
    }

    #[test]
    fn three_faces_on_one_edge_is_non_manifold() {
        // Fan of three faces all sharing edge (0, 1).
        let adj = MeshAdjacency::build(&[[0, 1, 2], [0, 1, 3], [0, 1, 4]]);
        assert_eq!(adj.non_manifold_edge_count(), 1);
        assert_eq!(adj.faces_of_edge(0, 1).len(), 3);
        let edges: Vec<_> = adj.non_manifold_edges().collect();
        assert_eq!(edges, vec![(0, 1)]);
    }

    #[test]
    fn vertex_to_faces_covers_incident_faces() {
        let adj = MeshAdjacency::build(&tetra_faces());
        for v in 0..4 {
            let faces = &adj.vertex_to_faces[&v];
            assert_eq!(faces.len(), 3, "vertex {v} should touch 3 faces");
        }
    }
}
