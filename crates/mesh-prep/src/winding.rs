//! Consistent triangle winding via breadth-first orientation propagation.

use std::collections::VecDeque;

use nalgebra::Vector3;
use tracing::{debug, info};

use crate::adjacency::MeshAdjacency;
use crate::types::Mesh;

/// Result of a winding pass.
#[derive(Debug, Clone, Copy)]
pub struct WindingOutcome {
    /// Faces whose final winding differs from their input winding.
    pub flipped: usize,

    /// False when two faces demanded contradictory orientations for the
    /// same neighbor (a Moebius-like surface).
    pub orientable: bool,

    /// Connected components traversed.
    pub components: usize,
}

/// Direction of the undirected edge (a, b) within a face's stored winding:
/// Some(true) if it appears as a->b, Some(false) if b->a, None if absent.
fn edge_direction(face: &[u32; 3], a: u32, b: u32) -> Option<bool> {
    for i in 0..3 {
        let from = face[i];
        let to = face[(i + 1) % 3];
        if from == a && to == b {
            return Some(true);
        }
        if from == b && to == a {
            return Some(false);
        }
    }
    None
}

/// Re-orient faces so that neighbors sharing an edge agree on winding.
///
/// One BFS per connected component over the face-adjacency graph, seeded at
/// an arbitrary face; a face is marked for flipping when it traverses a
/// shared edge in the same direction as an already-oriented neighbor.
/// Propagation only crosses edges shared by exactly two faces. A closed,
/// consistently wound component that still encloses negative volume is
/// inverted wholesale so its normals face outward.
pub fn fix_winding(mesh: &mut Mesh) -> WindingOutcome {
    let adjacency = MeshAdjacency::build(&mesh.faces);
    let face_count = mesh.faces.len();

    // Flip flag and component id once a face has been visited.
    let mut flip: Vec<Option<bool>> = vec![None; face_count];
    let mut component: Vec<usize> = vec![0; face_count];
    let mut queue: VecDeque<usize> = VecDeque::new();
    let mut orientable = true;
    let mut components = 0;

    for seed in 0..face_count {
        if flip[seed].is_some() {
            continue;
        }
        let comp_id = components;
        components += 1;
        flip[seed] = Some(false);
        component[seed] = comp_id;
        queue.push_back(seed);

        while let Some(fi) = queue.pop_front() {
            let flip_f = flip[fi].unwrap_or(false);
            let face = mesh.faces[fi];

            for i in 0..3 {
                let a = face[i];
                let b = face[(i + 1) % 3];
                let shared = adjacency.faces_of_edge(a, b);
                if shared.len() != 2 {
                    continue;
                }

                for &g in shared {
                    let gi = g as usize;
                    if gi == fi {
                        continue;
                    }
                    let Some(dir_g) = edge_direction(&mesh.faces[gi], a, b) else {
                        continue;
                    };
                    // f traverses (a, b) forward; consistency needs the
                    // neighbor's effective direction to be the reverse.
                    let required = dir_g ^ flip_f;
                    match flip[gi] {
                        None => {
                            flip[gi] = Some(required);
                            component[gi] = comp_id;
                            queue.push_back(gi);
                        }
                        Some(existing) if existing != required => {
                            orientable = false;
                        }
                        Some(_) => {}
                    }
                }
            }
        }
    }

    let mut flags: Vec<bool> = flip.into_iter().map(|f| f.unwrap_or(false)).collect();

    // A component touching a boundary or non-manifold edge has no enclosed
    // volume to orient.
    let mut open = vec![false; components];
    for faces in adjacency.edge_to_faces.values() {
        if faces.len() != 2 {
            for &f in faces {
                open[component[f as usize]] = true;
            }
        }
    }

    if orientable {
        let mut volumes = vec![0.0f64; components];
        for (fi, &[i0, i1, i2]) in mesh.faces.iter().enumerate() {
            let v0 = &mesh.vertices[i0 as usize].position;
            let v1 = &mesh.vertices[i1 as usize].position;
            let v2 = &mesh.vertices[i2 as usize].position;
            let cross = Vector3::new(
                v1.y * v2.z - v1.z * v2.y,
                v1.z * v2.x - v1.x * v2.z,
                v1.x * v2.y - v1.y * v2.x,
            );
            let mut contribution = (v0.x * cross.x + v0.y * cross.y + v0.z * cross.z) / 6.0;
            if flags[fi] {
                contribution = -contribution;
            }
            volumes[component[fi]] += contribution;
        }

        for (comp_id, &volume) in volumes.iter().enumerate() {
            if !open[comp_id] && volume < 0.0 {
                debug!(component = comp_id, volume, "inverting inside-out component");
                for (fi, flag) in flags.iter_mut().enumerate() {
                    if component[fi] == comp_id {
                        *flag = !*flag;
                    }
                }
            }
        }
    }

    let mut flipped = 0;
    for (fi, flag) in flags.iter().enumerate() {
        if *flag {
            mesh.faces[fi].swap(1, 2);
            flipped += 1;
        }
    }

    info!(flipped, orientable, components, "winding pass complete");
    WindingOutcome {
        flipped,
        orientable,
        components,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vertex;
    use approx::assert_relative_eq;

    fn unit_cube() -> Mesh {
        let mut mesh = Mesh::new();
        let coords = [
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (1.0, 1.0, 0.0),
            (0.0, 1.0, 0.0),
            (0.0, 0.0, 1.0),
            (1.0, 0.0, 1.0),
            (1.0, 1.0, 1.0),
            (0.0, 1.0, 1.0),
        ];
        for (x, y, z) in coords {
            mesh.vertices.push(Vertex::from_coords(x, y, z));
        }
        mesh.faces = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [3, 7, 6],
            [3, 6, 2],
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
        ];
        mesh
    }

    #[test]
    fn consistent_cube_is_left_alone() {
        let mut mesh = unit_cube();
        let outcome = fix_winding(&mut mesh);
        assert_eq!(outcome.flipped, 0);
        assert!(outcome.orientable);
        assert_eq!(outcome.components, 1);
        assert_relative_eq!(mesh.signed_volume(), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn scrambled_faces_are_restored() {
        let mut mesh = unit_cube();
        for &fi in &[1usize, 5, 7] {
            mesh.faces[fi].swap(1, 2);
        }
        let outcome = fix_winding(&mut mesh);
        assert_eq!(outcome.flipped, 3);
        assert!(outcome.orientable);
        assert_relative_eq!(mesh.signed_volume(), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn fully_inverted_cube_is_turned_outward() {
        let mut mesh = unit_cube();
        for face in &mut mesh.faces {
            face.swap(1, 2);
        }
        let outcome = fix_winding(&mut mesh);
        assert!(outcome.orientable);
        assert_eq!(outcome.flipped, mesh.faces.len());
        assert_relative_eq!(mesh.signed_volume(), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn idempotent_on_already_fixed_mesh() {
        let mut mesh = unit_cube();
        mesh.faces[4].swap(1, 2);
        fix_winding(&mut mesh);
        let faces_after_first = mesh.faces.clone();
        let outcome = fix_winding(&mut mesh);
        assert_eq!(outcome.flipped, 0);
        assert_eq!(mesh.faces, faces_after_first);
    }

    #[test]
    fn moebius_strip_is_not_orientable() {
        // Triangulated band with a half twist: rails A = {0, 2, 4} and
        // B = {1, 3, 5}, last pair of faces reconnecting with rails swapped.
        let mut mesh = Mesh::new();
        let coords = [
            (0.0, 0.0, 0.0),
            (0.0, 0.0, 1.0),
            (1.0, 0.0, 0.0),
            (1.0, 0.0, 1.0),
            (1.0, 1.0, 0.0),
            (1.0, 1.0, 1.0),
        ];
        for (x, y, z) in coords {
            mesh.vertices.push(Vertex::from_coords(x, y, z));
        }
        mesh.faces = vec![
            [0, 1, 2],
            [1, 3, 2],
            [2, 3, 4],
            [3, 5, 4],
            [4, 5, 1],
            [5, 0, 1],
        ];

        let outcome = fix_winding(&mut mesh);
        assert!(!outcome.orientable);
    }

    #[test]
    fn each_component_is_oriented_outward() {
        let mut mesh = unit_cube();
        let offset_cube = {
            let mut m = unit_cube();
            m.translate(Vector3::new(5.0, 0.0, 0.0));
            m
        };
        let base = mesh.vertex_count() as u32;
        mesh.vertices.extend(offset_cube.vertices.iter().cloned());
        for face in &offset_cube.faces {
            // Add the second cube fully inverted.
            mesh.faces
                .push([face[0] + base, face[2] + base, face[1] + base]);
        }

        let outcome = fix_winding(&mut mesh);
        assert_eq!(outcome.components, 2);
        assert!(outcome.orientable);
        // Both cubes wound outward: total signed volume is 2.
        assert_relative_eq!(mesh.signed_volume(), 2.0, epsilon = 1e-10);
    }

    #[test]
    fn open_strip_is_oriented_without_volume_correction() {
        // Two triangles forming a flat quad, one inverted.
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 1.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
        mesh.faces.push([0, 1, 2]);
        mesh.faces.push([0, 3, 2]); // disagrees with neighbor across (0, 2)

        let outcome = fix_winding(&mut mesh);
        assert!(outcome.orientable);
        assert_eq!(outcome.flipped, 1);
        assert_eq!(mesh.faces[1], [0, 2, 3]);
    }
}
