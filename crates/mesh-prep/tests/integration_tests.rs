//! End-to-end pipeline tests on closed sphere meshes.

use hashbrown::HashMap;
use mesh_prep::{
    make_printable, process, taubin_smooth, Mesh, PrepError, ProcessingConfig, RepairParams,
    TaubinParams, Vertex,
};

/// Icosahedron subdivided `subdivisions` times, projected to the unit
/// sphere. One subdivision yields 42 vertices and 80 faces.
fn icosphere(subdivisions: usize) -> Mesh {
    let t = (1.0 + 5.0_f64.sqrt()) / 2.0;
    let mut mesh = Mesh::new();
    let raw = [
        [-1.0, t, 0.0],
        [1.0, t, 0.0],
        [-1.0, -t, 0.0],
        [1.0, -t, 0.0],
        [0.0, -1.0, t],
        [0.0, 1.0, t],
        [0.0, -1.0, -t],
        [0.0, 1.0, -t],
        [t, 0.0, -1.0],
        [t, 0.0, 1.0],
        [-t, 0.0, -1.0],
        [-t, 0.0, 1.0],
    ];
    for [x, y, z] in raw {
        let len = (x * x + y * y + z * z).sqrt();
        mesh.vertices
            .push(Vertex::from_coords(x / len, y / len, z / len));
    }
    mesh.faces = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    for _ in 0..subdivisions {
        let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
        let mut new_faces = Vec::with_capacity(mesh.faces.len() * 4);
        let faces = std::mem::take(&mut mesh.faces);

        for [a, b, c] in faces {
            let ab = midpoint(&mut mesh, &mut midpoints, a, b);
            let bc = midpoint(&mut mesh, &mut midpoints, b, c);
            let ca = midpoint(&mut mesh, &mut midpoints, c, a);
            new_faces.push([a, ab, ca]);
            new_faces.push([b, bc, ab]);
            new_faces.push([c, ca, bc]);
            new_faces.push([ab, bc, ca]);
        }
        mesh.faces = new_faces;
    }
    mesh
}

fn midpoint(mesh: &mut Mesh, cache: &mut HashMap<(u32, u32), u32>, a: u32, b: u32) -> u32 {
    let key = if a < b { (a, b) } else { (b, a) };
    if let Some(&idx) = cache.get(&key) {
        return idx;
    }
    let mid = (mesh.vertices[a as usize].position.coords
        + mesh.vertices[b as usize].position.coords)
        / 2.0;
    let unit = mid / mid.norm();
    let idx = mesh.vertices.len() as u32;
    mesh.vertices
        .push(Vertex::from_coords(unit.x, unit.y, unit.z));
    cache.insert(key, idx);
    idx
}

#[test]
fn icosphere_fixture_has_expected_size() {
    let sphere = icosphere(1);
    assert_eq!(sphere.vertex_count(), 42);
    assert_eq!(sphere.face_count(), 80);
    assert!(sphere.signed_volume() > 0.0, "winding is outward");
}

#[test]
fn smoothed_icosphere_stays_watertight_with_same_faces() {
    let sphere = icosphere(1);
    let config = ProcessingConfig {
        iterations: 5,
        ..ProcessingConfig::default()
    };
    let (result, report) = process(&sphere, &config).expect("clean sphere processes");

    assert_eq!(result.face_count(), 80);
    assert!(report.is_watertight);
    assert!(report.is_edge_manifold);
    assert!(report.is_vertex_manifold);
    assert!(report.is_orientable);

    // Smoothing a sphere should nudge vertices, not relocate them.
    let max_shift = result
        .vertices
        .iter()
        .zip(&sphere.vertices)
        .map(|(a, b)| (a.position - b.position).norm())
        .fold(0.0_f64, f64::max);
    assert!(max_shift > 0.0, "vertices should move");
    assert!(max_shift < 0.3, "perturbation stays well below the radius");
}

#[test]
fn taubin_volume_drift_stays_small() {
    // A dense sphere keeps the umbrella frequencies inside the Taubin pass
    // band, so enclosed volume barely moves even over many iterations.
    let sphere = icosphere(4);
    let reference = sphere.volume();

    for iterations in [1, 5, 20] {
        let mut smoothed = sphere.clone();
        taubin_smooth(
            &mut smoothed,
            &TaubinParams {
                iterations,
                lambda: 0.5,
                mu: -0.53,
            },
        );
        let drift = (smoothed.volume() - reference).abs() / reference;
        assert!(
            drift < 0.02,
            "volume drift {drift:.4} after {iterations} iterations"
        );
    }
}

#[test]
fn sphere_with_hole_is_manifold_but_not_watertight() {
    let mut sphere = icosphere(1);
    sphere.faces.pop();
    let (_, report) = process(&sphere, &ProcessingConfig::default()).expect("open sphere");

    assert!(!report.is_watertight);
    assert!(report.is_edge_manifold);
    assert!(report.is_vertex_manifold);
    assert_eq!(report.boundary_edge_count, 3);
}

#[test]
fn make_printable_is_idempotent() {
    let mut sphere = icosphere(1);
    // Inject defects: a duplicated vertex used by one face, a degenerate
    // face, and a duplicate face.
    let dup = sphere.vertices[0].clone();
    sphere.vertices.push(dup);
    let last = sphere.vertices.len() as u32 - 1;
    for face in &mut sphere.faces {
        if face[0] == 0 {
            face[0] = last;
            break;
        }
    }
    sphere.faces.push([1, 1, 2]);
    sphere.faces.push(sphere.faces[3]);

    let params = RepairParams::default();
    let (once, report_once) = make_printable(&sphere, &params).expect("first repair");
    let (twice, report_twice) = make_printable(&once, &params).expect("second repair");

    assert!(report_once.degenerate_faces_removed >= 1);
    assert!(report_once.duplicate_vertices_merged >= 1);
    assert_eq!(report_twice.degenerate_faces_removed, 0);
    assert_eq!(report_twice.duplicate_vertices_merged, 0);
    assert_eq!(report_twice.faces_reoriented, 0);
    assert_eq!(once.vertex_count(), twice.vertex_count());
    assert_eq!(once.face_count(), twice.face_count());
    for (a, b) in once.vertices.iter().zip(&twice.vertices) {
        assert_eq!(a.position, b.position);
    }
    assert_eq!(once.faces, twice.faces);
}

#[test]
fn repaired_mesh_has_no_repeated_indices_or_near_duplicate_vertices() {
    let mut sphere = icosphere(1);
    let near = sphere.vertices[5].position + nalgebra::Vector3::new(1e-6, 0.0, 0.0);
    sphere
        .vertices
        .push(Vertex::from_coords(near.x, near.y, near.z));
    let last = sphere.vertices.len() as u32 - 1;
    sphere.faces.push([last, 7, 9]);
    sphere.faces.push([2, 2, 4]);

    let params = RepairParams::default();
    let (repaired, _) = make_printable(&sphere, &params).expect("repairs");

    for face in &repaired.faces {
        assert!(face[0] != face[1] && face[1] != face[2] && face[0] != face[2]);
    }
    for (i, a) in repaired.vertices.iter().enumerate() {
        for b in repaired.vertices.iter().skip(i + 1) {
            assert!(
                (a.position - b.position).norm() > params.weld_epsilon,
                "vertices closer than the weld radius survived"
            );
        }
    }
}

#[test]
fn bump_removal_rebuilds_a_closed_sphere() {
    let sphere = icosphere(2);
    let config = ProcessingConfig {
        iterations: 0,
        remove_bumps: true,
        voxel_size: 0.08,
        outlier_neighbors: 8,
        ..ProcessingConfig::default()
    };
    let (result, report) = process(&sphere, &config).expect("reconstruction succeeds");

    assert!(
        report.reconstruction_fallback.is_none(),
        "162 well-spread points should reconstruct"
    );
    assert!(result.face_count() > 0);
    // The rebuilt surface stays near the unit sphere.
    let (min, max) = result.bounds().expect("non-empty");
    for bound in [min.coords.abs(), max.coords.abs()] {
        assert!(bound.max() < 2.0, "reconstruction stays near the input");
    }
}

#[test]
fn invalid_index_fails_before_processing() {
    let mut sphere = icosphere(1);
    sphere.faces[10] = [0, 1, 9999];
    let err = process(&sphere, &ProcessingConfig::default()).unwrap_err();
    assert!(matches!(err, PrepError::InvalidVertexIndex { .. }));
}
