//! Oriented point clouds: mesh resampling and statistical outlier removal.
//!
//! A `PointCloud` is a transient, stage-local representation. It is created
//! from a mesh, filtered, handed to surface reconstruction, and discarded;
//! it is never persisted.

use nalgebra::{Point3, Vector3};
use tracing::{debug, info};

use crate::types::Mesh;

/// kd-tree specialization shared by the pipeline stages.
///
/// Scan meshes routinely contain flat regions where many points share a
/// coordinate on one axis; kiddo's default 32-slot buckets cannot split
/// such data and panic, so the buckets are widened to 257 entries.
pub type CloudTree = kiddo::float::kdtree::KdTree<f64, u64, 3, 257, u32>;

/// A sample point with a unit orientation normal.
#[derive(Debug, Clone, Copy)]
pub struct CloudPoint {
    pub position: Point3<f64>,
    pub normal: Vector3<f64>,
}

/// An oriented point cloud.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    pub points: Vec<CloudPoint>,
}

impl PointCloud {
    /// Number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the cloud has no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Resample a mesh surface: exactly one point per vertex.
    ///
    /// Stored vertex normals are used when every vertex has one; otherwise
    /// normals are estimated from the triangle fan around each vertex
    /// (area-weighted average of adjacent face normals). All normals are
    /// unit length on return; a vertex whose accumulated normal vanishes
    /// falls back to +Z.
    pub fn from_mesh(mesh: &Mesh) -> Self {
        let normals = if mesh.has_vertex_normals() {
            mesh.vertices
                .iter()
                .map(|v| normalize_or_z(v.normal.unwrap_or_else(Vector3::z)))
                .collect()
        } else {
            fan_normals(mesh)
        };

        let points = mesh
            .vertices
            .iter()
            .zip(normals)
            .map(|(v, normal)| CloudPoint {
                position: v.position,
                normal,
            })
            .collect();

        debug!(points = mesh.vertex_count(), "resampled mesh to point cloud");
        Self { points }
    }

    /// Axis-aligned bounding box, or None for an empty cloud.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.points.first()?;
        let mut min = first.position;
        let mut max = first.position;

        for p in &self.points[1..] {
            min.x = min.x.min(p.position.x);
            min.y = min.y.min(p.position.y);
            min.z = min.z.min(p.position.z);
            max.x = max.x.max(p.position.x);
            max.y = max.y.max(p.position.y);
            max.z = max.z.max(p.position.z);
        }

        Some((min, max))
    }

    /// Build a kd-tree over the point positions. Stage-local; callers drop
    /// it when the stage ends.
    pub fn build_kdtree(&self) -> CloudTree {
        let mut tree = CloudTree::with_capacity(self.len());
        for (i, p) in self.points.iter().enumerate() {
            tree.add(&[p.position.x, p.position.y, p.position.z], i as u64);
        }
        tree
    }

    /// Remove statistical outliers.
    ///
    /// For every point, the mean distance to its `k` nearest neighbors is
    /// computed; points whose mean distance exceeds the global mean by more
    /// than `std_ratio` standard deviations are discarded. Only the upper
    /// tail is removed. Clouds with fewer than `k + 1` points are returned
    /// unmodified, since the statistic is meaningless at that density.
    pub fn remove_outliers(&self, k: usize, std_ratio: f64) -> PointCloud {
        if k == 0 || self.len() <= k {
            return self.clone();
        }

        let tree = self.build_kdtree();

        // Mean distance to the k nearest neighbors, excluding the point itself.
        let mean_distances: Vec<f64> = self
            .points
            .iter()
            .map(|p| {
                let query = [p.position.x, p.position.y, p.position.z];
                let neighbors = tree.nearest_n::<kiddo::SquaredEuclidean>(&query, k + 1);
                let sum: f64 = neighbors.iter().skip(1).map(|n| n.distance.sqrt()).sum();
                sum / k as f64
            })
            .collect();

        let n = mean_distances.len() as f64;
        let mean = mean_distances.iter().sum::<f64>() / n;
        let variance = mean_distances
            .iter()
            .map(|d| (d - mean) * (d - mean))
            .sum::<f64>()
            / n;
        let threshold = mean + std_ratio * variance.sqrt();

        let points: Vec<CloudPoint> = self
            .points
            .iter()
            .zip(&mean_distances)
            .filter(|(_, &d)| d <= threshold)
            .map(|(p, _)| *p)
            .collect();

        info!(
            removed = self.len() - points.len(),
            kept = points.len(),
            threshold,
            "statistical outlier removal complete"
        );

        PointCloud { points }
    }
}

/// Area-weighted vertex normals from the triangle fan around each vertex.
///
/// The unnormalized face cross product is proportional to face area, so
/// summing it per vertex weights larger faces more heavily.
fn fan_normals(mesh: &Mesh) -> Vec<Vector3<f64>> {
    let mut accumulated = vec![Vector3::zeros(); mesh.vertex_count()];

    for (face, tri) in mesh.faces.iter().zip(mesh.triangles()) {
        let weighted = tri.normal_unnormalized();
        for &v in face {
            accumulated[v as usize] += weighted;
        }
    }

    accumulated.into_iter().map(normalize_or_z).collect()
}

#[inline]
fn normalize_or_z(v: Vector3<f64>) -> Vector3<f64> {
    let len_sq = v.norm_squared();
    if len_sq > f64::EPSILON {
        v / len_sq.sqrt()
    } else {
        Vector3::z()
    }
}
