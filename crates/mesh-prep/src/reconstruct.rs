//! Implicit-surface reconstruction from an oriented point cloud.
//!
//! A signed-distance field is sampled on a regular grid around the cloud:
//! the value at each cell is the distance to the nearest sample, signed by
//! that sample's normal. The zero isosurface is extracted with surface nets
//! and low-density regions of the result are trimmed away. Any correct
//! implicit extraction satisfies the stage contract; this one trades the
//! exactness of a screened-Poisson solve for a dependency-light field that
//! behaves well on scan-scale clouds.

use fast_surface_nets::ndshape::{ConstShape, ConstShape3u32};
use fast_surface_nets::{surface_nets, SurfaceNetsBuffer};
use nalgebra::{Matrix3, Point3, Vector3};
use tracing::{debug, info, warn};

use crate::error::{PrepError, PrepResult};
use crate::pointcloud::PointCloud;
use crate::types::{Mesh, Vertex};

/// Minimum number of points for reconstruction to be attempted.
pub const MIN_RECONSTRUCTION_POINTS: usize = 10;

/// Eigenvalue ratio below which the cloud counts as near-coplanar.
const COPLANARITY_RATIO: f64 = 1e-6;

/// Sample grid edge length, including one padding cell per side.
const GRID_SAMPLES: u32 = 66;

type SampleShape = ConstShape3u32<GRID_SAMPLES, GRID_SAMPLES, GRID_SAMPLES>;

/// Rebuild a surface from an oriented point cloud.
///
/// Fails with a reconstruction-class error when the cloud is too sparse
/// (< [`MIN_RECONSTRUCTION_POINTS`]), has zero spatial spread, or is
/// near-coplanar. The result is a fresh surface: it carries no normals
/// and no texture coordinates.
pub fn reconstruct(cloud: &PointCloud, voxel_size: f64) -> PrepResult<Mesh> {
    if !(voxel_size > 0.0 && voxel_size.is_finite()) {
        return Err(PrepError::invalid_parameter(
            "voxel_size",
            format!("must be a positive finite number, got {voxel_size}"),
        ));
    }
    if cloud.len() < MIN_RECONSTRUCTION_POINTS {
        return Err(PrepError::InsufficientPoints {
            point_count: cloud.len(),
            required: MIN_RECONSTRUCTION_POINTS,
        });
    }

    let (min, max) = cloud.bounds().ok_or_else(|| PrepError::DegenerateCloud {
        details: "cloud has no points".to_string(),
    })?;
    let extent = max - min;
    let max_extent = extent.x.max(extent.y).max(extent.z);
    if max_extent < f64::EPSILON {
        return Err(PrepError::DegenerateCloud {
            details: "all points coincide (zero spread)".to_string(),
        });
    }
    check_spread(cloud)?;

    // The sample grid is fixed at 66^3 including padding; a cloud larger
    // than the requested voxel can cover is sampled at a coarser voxel.
    let usable_cells = (GRID_SAMPLES - 7) as f64;
    let effective_voxel = voxel_size.max(max_extent / usable_cells);
    if effective_voxel > voxel_size {
        warn!(
            requested = voxel_size,
            effective = effective_voxel,
            "voxel size inflated to fit the sample grid"
        );
    }

    let origin = Point3::from(min.coords - Vector3::repeat(3.0 * effective_voxel));
    let sdf = sample_sdf(cloud, &origin, effective_voxel);

    let mut buffer = SurfaceNetsBuffer::default();
    surface_nets(
        &sdf,
        &SampleShape {},
        [0; 3],
        [GRID_SAMPLES - 1; 3],
        &mut buffer,
    );

    if buffer.positions.is_empty() || buffer.indices.is_empty() {
        return Err(PrepError::ReconstructionFailed {
            details: "isosurface extraction produced no geometry".to_string(),
        });
    }

    let mut mesh = Mesh::with_capacity(buffer.positions.len(), buffer.indices.len() / 3);
    for p in &buffer.positions {
        mesh.vertices.push(Vertex::new(Point3::new(
            origin.x + p[0] as f64 * effective_voxel,
            origin.y + p[1] as f64 * effective_voxel,
            origin.z + p[2] as f64 * effective_voxel,
        )));
    }
    for tri in buffer.indices.chunks_exact(3) {
        mesh.faces.push([tri[0], tri[1], tri[2]]);
    }

    debug!(
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        "isosurface extracted"
    );

    let trimmed = trim_low_density(&mut mesh, cloud, voxel_size, effective_voxel);

    if mesh.is_empty() {
        return Err(PrepError::ReconstructionFailed {
            details: "no geometry survived density trimming".to_string(),
        });
    }

    info!(
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        trimmed,
        voxel = effective_voxel,
        "surface reconstruction complete"
    );
    Ok(mesh)
}

/// Reject clouds whose covariance is rank-deficient (collinear or coplanar
/// samples cannot bound a volume).
fn check_spread(cloud: &PointCloud) -> PrepResult<()> {
    let n = cloud.len() as f64;
    let centroid = cloud
        .points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.position.coords)
        / n;

    let mut covariance = Matrix3::zeros();
    for p in &cloud.points {
        let d = p.position.coords - centroid;
        covariance += d * d.transpose();
    }
    covariance /= n;

    let eigen = covariance.symmetric_eigen();
    let max_eig = eigen.eigenvalues.iter().cloned().fold(0.0f64, f64::max);
    let min_eig = eigen
        .eigenvalues
        .iter()
        .cloned()
        .fold(f64::INFINITY, f64::min);

    if max_eig <= 0.0 || min_eig / max_eig < COPLANARITY_RATIO {
        return Err(PrepError::DegenerateCloud {
            details: format!(
                "near-coplanar samples (eigenvalue ratio {:.3e})",
                if max_eig > 0.0 { min_eig / max_eig } else { 0.0 }
            ),
        });
    }
    Ok(())
}

/// Sample the signed distance at every grid cell center: distance to the
/// nearest cloud point, signed by the side of that point's tangent plane.
fn sample_sdf(cloud: &PointCloud, origin: &Point3<f64>, voxel: f64) -> Vec<f32> {
    let tree = cloud.build_kdtree();
    let mut sdf = vec![1.0f32; SampleShape::SIZE as usize];

    for z in 0..GRID_SAMPLES {
        for y in 0..GRID_SAMPLES {
            for x in 0..GRID_SAMPLES {
                let cell = Point3::new(
                    origin.x + x as f64 * voxel,
                    origin.y + y as f64 * voxel,
                    origin.z + z as f64 * voxel,
                );
                let nearest =
                    tree.nearest_one::<kiddo::SquaredEuclidean>(&[cell.x, cell.y, cell.z]);
                let p = &cloud.points[nearest.item as usize];
                let offset = cell - p.position;
                let signed = if offset.dot(&p.normal) >= 0.0 {
                    nearest.distance.sqrt()
                } else {
                    -nearest.distance.sqrt()
                };
                sdf[SampleShape::linearize([x, y, z]) as usize] = signed as f32;
            }
        }
    }

    sdf
}

/// Trim quantile as a function of the requested voxel size: the default
/// voxel (0.01) trims the sparsest 1%, and the cutoff scales linearly with
/// inverse voxel size so denser grids trim harder. Clamped so extreme
/// settings cannot erase the mesh.
pub(crate) fn trim_quantile(voxel_size: f64) -> f64 {
    (0.01 * (0.01 / voxel_size)).clamp(0.002, 0.15)
}

/// Remove reconstructed vertices whose support in the input cloud is weak.
///
/// Density is the number of input samples within two effective voxels of
/// the vertex. Vertices below the trim-quantile density and every face
/// touching them are removed, and indices compacted. Returns the number of
/// vertices removed.
fn trim_low_density(
    mesh: &mut Mesh,
    cloud: &PointCloud,
    requested_voxel: f64,
    effective_voxel: f64,
) -> usize {
    let tree = cloud.build_kdtree();
    let radius = 2.0 * effective_voxel;

    let densities: Vec<usize> = mesh
        .vertices
        .iter()
        .map(|v| {
            let q = [v.position.x, v.position.y, v.position.z];
            tree.within::<kiddo::SquaredEuclidean>(&q, radius * radius)
                .len()
        })
        .collect();

    let quantile = trim_quantile(requested_voxel);
    let mut sorted = densities.clone();
    sorted.sort_unstable();
    let cutoff_idx = ((sorted.len() as f64) * quantile) as usize;
    let threshold = sorted[cutoff_idx.min(sorted.len() - 1)];

    let keep: Vec<bool> = densities.iter().map(|&d| d >= threshold).collect();
    let kept = keep.iter().filter(|&&k| k).count();
    if kept == mesh.vertex_count() {
        return 0;
    }
    // A pathological density distribution can put most of the mesh under
    // the threshold; keep the surface instead of honoring the quantile.
    if kept < mesh.vertex_count() / 2 {
        warn!(
            threshold,
            kept,
            total = mesh.vertex_count(),
            "density trim would remove most of the surface; skipping"
        );
        return 0;
    }

    let mut remap = vec![u32::MAX; mesh.vertex_count()];
    let mut vertices = Vec::with_capacity(kept);
    for (i, vertex) in mesh.vertices.iter().enumerate() {
        if keep[i] {
            remap[i] = vertices.len() as u32;
            vertices.push(vertex.clone());
        }
    }

    let faces = mesh
        .faces
        .iter()
        .filter_map(|face| {
            let mapped = [
                remap[face[0] as usize],
                remap[face[1] as usize],
                remap[face[2] as usize],
            ];
            mapped.iter().all(|&i| i != u32::MAX).then_some(mapped)
        })
        .collect();

    let removed = mesh.vertex_count() - vertices.len();
    mesh.vertices = vertices;
    mesh.faces = faces;
    debug!(removed, threshold, quantile, "trimmed low-density vertices");
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointcloud::CloudPoint;

    /// Oriented samples on a unit sphere via the golden-angle spiral.
    fn sphere_cloud(count: usize) -> PointCloud {
        let golden = std::f64::consts::PI * (3.0 - 5.0f64.sqrt());
        let points = (0..count)
            .map(|i| {
                let y = 1.0 - 2.0 * (i as f64 + 0.5) / count as f64;
                let r = (1.0 - y * y).sqrt();
                let theta = golden * i as f64;
                let normal = Vector3::new(r * theta.cos(), y, r * theta.sin());
                CloudPoint {
                    position: Point3::from(normal),
                    normal,
                }
            })
            .collect();
        PointCloud { points }
    }

    #[test]
    fn too_few_points_is_an_error() {
        let cloud = sphere_cloud(9);
        let err = reconstruct(&cloud, 0.1).unwrap_err();
        assert!(matches!(err, PrepError::InsufficientPoints { point_count: 9, .. }));
        assert!(err.is_reconstruction());
    }

    #[test]
    fn coplanar_cloud_is_an_error() {
        let points = (0..100)
            .map(|i| CloudPoint {
                position: Point3::new((i % 10) as f64, (i / 10) as f64, 0.0),
                normal: Vector3::z(),
            })
            .collect();
        let err = reconstruct(&PointCloud { points }, 0.1).unwrap_err();
        assert!(matches!(err, PrepError::DegenerateCloud { .. }));
        assert!(err.is_reconstruction());
    }

    #[test]
    fn coincident_points_are_an_error() {
        let points = (0..20)
            .map(|_| CloudPoint {
                position: Point3::new(1.0, 2.0, 3.0),
                normal: Vector3::z(),
            })
            .collect();
        let err = reconstruct(&PointCloud { points }, 0.1).unwrap_err();
        assert!(matches!(err, PrepError::DegenerateCloud { .. }));
    }

    #[test]
    fn invalid_voxel_size_is_rejected() {
        let cloud = sphere_cloud(100);
        assert!(matches!(
            reconstruct(&cloud, 0.0).unwrap_err(),
            PrepError::InvalidParameter { .. }
        ));
        assert!(matches!(
            reconstruct(&cloud, f64::NAN).unwrap_err(),
            PrepError::InvalidParameter { .. }
        ));
    }

    #[test]
    fn sphere_reconstructs_to_a_plausible_surface() {
        let cloud = sphere_cloud(500);
        let mesh = reconstruct(&cloud, 0.1).expect("sphere should reconstruct");

        assert!(!mesh.is_empty());
        let (min, max) = mesh.bounds().expect("mesh has vertices");
        for c in [min.x, min.y, min.z] {
            assert!(c > -1.5, "reconstruction should stay near the sphere: {c}");
        }
        for c in [max.x, max.y, max.z] {
            assert!(c < 1.5, "reconstruction should stay near the sphere: {c}");
        }
        // Every face index must be in range.
        let vc = mesh.vertex_count() as u32;
        assert!(mesh.faces.iter().all(|f| f.iter().all(|&i| i < vc)));
    }

    #[test]
    fn trim_quantile_is_stricter_for_denser_voxels() {
        assert!(trim_quantile(0.005) > trim_quantile(0.01));
        assert!(trim_quantile(0.01) > trim_quantile(0.05));
        // Clamped at both ends.
        assert_eq!(trim_quantile(1e-9), 0.15);
        assert_eq!(trim_quantile(100.0), 0.002);
    }
}
