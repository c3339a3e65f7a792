//! Interchange mesh I/O for OBJ and PLY.
//!
//! These two formats preserve indexed structure, which the pipeline relies
//! on; OBJ additionally round-trips texture coordinates. Binary scene
//! containers are the caller's concern, not this crate's.

use std::fmt::Write as _;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use nalgebra::{Vector2, Vector3};
use tracing::{debug, info};

use crate::error::{PrepError, PrepResult};
use crate::types::{Mesh, Vertex};
use crate::validate::validate_mesh_data;

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Obj,
    Ply,
}

impl MeshFormat {
    /// Detect format from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .and_then(|ext| match ext.as_str() {
                "obj" => Some(MeshFormat::Obj),
                "ply" => Some(MeshFormat::Ply),
                _ => None,
            })
    }
}

/// Load a mesh from file, auto-detecting format from extension.
///
/// The loaded mesh is validated (indices in range, finite coordinates)
/// before being returned.
pub fn load_mesh(path: &Path) -> PrepResult<Mesh> {
    let format = MeshFormat::from_path(path).ok_or_else(|| PrepError::UnsupportedFormat {
        extension: path.extension().and_then(|e| e.to_str()).map(String::from),
    })?;

    info!("loading mesh from {:?} (format: {:?})", path, format);
    let mesh = match format {
        MeshFormat::Obj => load_obj(path)?,
        MeshFormat::Ply => load_ply(path)?,
    };

    debug!(
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        "mesh loaded"
    );
    validate_mesh_data(&mesh)?;
    Ok(mesh)
}

/// Save a mesh to file, auto-detecting format from extension.
pub fn save_mesh(mesh: &Mesh, path: &Path) -> PrepResult<()> {
    let format = MeshFormat::from_path(path).ok_or_else(|| PrepError::UnsupportedFormat {
        extension: path.extension().and_then(|e| e.to_str()).map(String::from),
    })?;

    let contents = match format {
        MeshFormat::Obj => render_obj(mesh),
        MeshFormat::Ply => render_ply(mesh),
    };

    std::fs::write(path, contents).map_err(|e| PrepError::IoWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    info!(
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        "saved mesh to {:?}",
        path
    );
    Ok(())
}

fn load_obj(path: &Path) -> PrepResult<Mesh> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            ..Default::default()
        },
    )
    .map_err(|e| PrepError::ParseError {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;

    if models.is_empty() {
        return Err(PrepError::empty_mesh("OBJ file contains no models"));
    }

    // Merge all models into a single mesh. Vertices keep the file's `v`
    // order so a save/load cycle does not permute the mesh.
    let mut mesh = Mesh::new();

    for model in &models {
        let obj = &model.mesh;
        let base = mesh.vertices.len() as u32;

        for chunk in obj.positions.chunks_exact(3) {
            mesh.vertices.push(Vertex::from_coords(
                chunk[0] as f64,
                chunk[1] as f64,
                chunk[2] as f64,
            ));
        }

        for chunk in obj.indices.chunks_exact(3) {
            mesh.faces
                .push([chunk[0] + base, chunk[1] + base, chunk[2] + base]);
        }

        // Normals and texcoords are indexed per face corner; fold them onto
        // the referenced vertex, first corner wins.
        if !obj.normals.is_empty() && obj.normal_indices.len() == obj.indices.len() {
            for (&pi, &ni) in obj.indices.iter().zip(&obj.normal_indices) {
                let vertex = &mut mesh.vertices[(base + pi) as usize];
                if vertex.normal.is_none() {
                    let n = ni as usize * 3;
                    vertex.normal = Some(Vector3::new(
                        obj.normals[n] as f64,
                        obj.normals[n + 1] as f64,
                        obj.normals[n + 2] as f64,
                    ));
                }
            }
        }
        if !obj.texcoords.is_empty() && obj.texcoord_indices.len() == obj.indices.len() {
            for (&pi, &ti) in obj.indices.iter().zip(&obj.texcoord_indices) {
                let vertex = &mut mesh.vertices[(base + pi) as usize];
                if vertex.uv.is_none() {
                    let t = ti as usize * 2;
                    vertex.uv = Some(Vector2::new(
                        obj.texcoords[t] as f64,
                        obj.texcoords[t + 1] as f64,
                    ));
                }
            }
        }
    }

    Ok(mesh)
}

fn load_ply(path: &Path) -> PrepResult<Mesh> {
    use ply_rs::parser::Parser;
    use ply_rs::ply::Property;

    let file = File::open(path).map_err(|e| PrepError::IoRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut reader = BufReader::new(file);

    let parser = Parser::<ply_rs::ply::DefaultElement>::new();
    let ply = parser
        .read_ply(&mut reader)
        .map_err(|e| PrepError::ParseError {
            path: path.to_path_buf(),
            details: format!("PLY parse error: {e:?}"),
        })?;

    let mut mesh = Mesh::new();

    if let Some(vertices) = ply.payload.get("vertex") {
        for element in vertices {
            let x = ply_float(element.get("x"), "x", path)?;
            let y = ply_float(element.get("y"), "y", path)?;
            let z = ply_float(element.get("z"), "z", path)?;
            let mut vertex = Vertex::from_coords(x, y, z);

            if let (Some(nx), Some(ny), Some(nz)) =
                (element.get("nx"), element.get("ny"), element.get("nz"))
            {
                if let (Ok(nx), Ok(ny), Ok(nz)) = (
                    ply_float(Some(nx), "nx", path),
                    ply_float(Some(ny), "ny", path),
                    ply_float(Some(nz), "nz", path),
                ) {
                    vertex.normal = Some(Vector3::new(nx, ny, nz));
                }
            }

            // Texture coordinates appear as s/t or u/v depending on exporter.
            let (u, v) = match (element.get("s"), element.get("t")) {
                (Some(s), Some(t)) => (Some(s), Some(t)),
                _ => (element.get("u"), element.get("v")),
            };
            if let (Some(u), Some(v)) = (u, v) {
                if let (Ok(u), Ok(v)) =
                    (ply_float(Some(u), "u", path), ply_float(Some(v), "v", path))
                {
                    vertex.uv = Some(Vector2::new(u, v));
                }
            }

            mesh.vertices.push(vertex);
        }
    }

    if let Some(faces) = ply.payload.get("face") {
        for element in faces {
            let indices = element
                .get("vertex_indices")
                .or_else(|| element.get("vertex_index"));

            let indices: Vec<u32> = match indices {
                Some(Property::ListInt(v)) => v.iter().map(|&i| i as u32).collect(),
                Some(Property::ListUInt(v)) => v.clone(),
                Some(Property::ListUChar(v)) => v.iter().map(|&i| i as u32).collect(),
                _ => continue,
            };

            // Fan-triangulate polygons.
            if indices.len() >= 3 {
                for i in 1..indices.len() - 1 {
                    mesh.faces.push([indices[0], indices[i], indices[i + 1]]);
                }
            }
        }
    }

    Ok(mesh)
}

fn ply_float(
    prop: Option<&ply_rs::ply::Property>,
    name: &str,
    path: &Path,
) -> PrepResult<f64> {
    use ply_rs::ply::Property;

    match prop {
        Some(Property::Float(v)) => Ok(*v as f64),
        Some(Property::Double(v)) => Ok(*v),
        Some(Property::Int(v)) => Ok(*v as f64),
        Some(Property::UInt(v)) => Ok(*v as f64),
        Some(Property::Short(v)) => Ok(*v as f64),
        Some(Property::UShort(v)) => Ok(*v as f64),
        Some(Property::Char(v)) => Ok(*v as f64),
        Some(Property::UChar(v)) => Ok(*v as f64),
        _ => Err(PrepError::ParseError {
            path: path.to_path_buf(),
            details: format!("missing or invalid PLY property: {name}"),
        }),
    }
}

/// Render a mesh as ASCII OBJ. Indexing is 1-based; uvs and normals are
/// written only when every vertex has them, keeping index streams aligned.
fn render_obj(mesh: &Mesh) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# exported by mesh-prep");
    let _ = writeln!(out, "# vertices: {}", mesh.vertex_count());
    let _ = writeln!(out, "# faces: {}", mesh.face_count());

    let has_normals = mesh.has_vertex_normals();
    let has_uvs = !mesh.vertices.is_empty() && mesh.vertices.iter().all(|v| v.uv.is_some());

    for v in &mesh.vertices {
        let p = v.position;
        let _ = writeln!(out, "v {:.6} {:.6} {:.6}", p.x, p.y, p.z);
    }
    if has_uvs {
        for v in &mesh.vertices {
            if let Some(uv) = v.uv {
                let _ = writeln!(out, "vt {:.6} {:.6}", uv.x, uv.y);
            }
        }
    }
    if has_normals {
        for v in &mesh.vertices {
            if let Some(n) = v.normal {
                let _ = writeln!(out, "vn {:.6} {:.6} {:.6}", n.x, n.y, n.z);
            }
        }
    }

    for face in &mesh.faces {
        let [a, b, c] = [face[0] + 1, face[1] + 1, face[2] + 1];
        let _ = match (has_uvs, has_normals) {
            (true, true) => writeln!(out, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}"),
            (true, false) => writeln!(out, "f {a}/{a} {b}/{b} {c}/{c}"),
            (false, true) => writeln!(out, "f {a}//{a} {b}//{b} {c}//{c}"),
            (false, false) => writeln!(out, "f {a} {b} {c}"),
        };
    }

    out
}

/// Render a mesh as ASCII PLY, with normals when every vertex has one.
fn render_ply(mesh: &Mesh) -> String {
    let has_normals = mesh.has_vertex_normals();

    let mut out = String::new();
    let _ = writeln!(out, "ply");
    let _ = writeln!(out, "format ascii 1.0");
    let _ = writeln!(out, "comment exported by mesh-prep");
    let _ = writeln!(out, "element vertex {}", mesh.vertex_count());
    let _ = writeln!(out, "property double x");
    let _ = writeln!(out, "property double y");
    let _ = writeln!(out, "property double z");
    if has_normals {
        let _ = writeln!(out, "property double nx");
        let _ = writeln!(out, "property double ny");
        let _ = writeln!(out, "property double nz");
    }
    let _ = writeln!(out, "element face {}", mesh.face_count());
    let _ = writeln!(out, "property list uchar uint vertex_indices");
    let _ = writeln!(out, "end_header");

    for v in &mesh.vertices {
        let p = v.position;
        if has_normals {
            let n = v.normal.unwrap_or_default();
            let _ = writeln!(
                out,
                "{:.6} {:.6} {:.6} {:.6} {:.6} {:.6}",
                p.x, p.y, p.z, n.x, n.y, n.z
            );
        } else {
            let _ = writeln!(out, "{:.6} {:.6} {:.6}", p.x, p.y, p.z);
        }
    }
    for face in &mesh.faces {
        let _ = writeln!(out, "3 {} {} {}", face[0], face[1], face[2]);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tetrahedron() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.5, 0.866025, 0.0));
        mesh.vertices
            .push(Vertex::from_coords(0.5, 0.288675, 0.816497));
        mesh.faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
        mesh
    }

    #[test]
    fn format_detection() {
        assert_eq!(
            MeshFormat::from_path(Path::new("model.obj")),
            Some(MeshFormat::Obj)
        );
        assert_eq!(
            MeshFormat::from_path(Path::new("SCAN.PLY")),
            Some(MeshFormat::Ply)
        );
        assert_eq!(MeshFormat::from_path(Path::new("scene.glb")), None);
        assert_eq!(MeshFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn unsupported_extension_errors() {
        let err = load_mesh(Path::new("scene.glb")).unwrap_err();
        assert!(matches!(err, PrepError::UnsupportedFormat { .. }));
    }

    #[test]
    fn obj_render_uses_one_based_indices() {
        let text = render_obj(&tetrahedron());
        assert!(text.contains("v 0.000000 0.000000 0.000000"));
        assert!(text.contains("f 1 3 2"));
        assert!(!text.contains("vn "), "no normals were set");
    }

    #[test]
    fn obj_render_includes_uvs_when_complete() {
        let mut mesh = tetrahedron();
        for v in &mut mesh.vertices {
            v.uv = Some(Vector2::new(0.5, 0.5));
        }
        let text = render_obj(&mesh);
        assert!(text.contains("vt 0.500000 0.500000"));
        assert!(text.contains("f 1/1 3/3 2/2"));
    }

    #[test]
    fn ply_render_header_matches_counts() {
        let text = render_ply(&tetrahedron());
        assert!(text.contains("element vertex 4"));
        assert!(text.contains("element face 4"));
        assert!(text.contains("3 0 2 1"));
    }

    #[test]
    fn obj_round_trip_preserves_vertex_order() {
        let mut mesh = tetrahedron();
        // Distinct uv per vertex so any index permutation is visible.
        for (i, v) in mesh.vertices.iter_mut().enumerate() {
            v.uv = Some(Vector2::new(0.1 * i as f64, 0.75));
        }

        let dir = std::env::temp_dir();
        let path = dir.join("mesh_prep_io_roundtrip.obj");
        save_mesh(&mesh, &path).expect("save obj");
        let loaded = load_mesh(&path).expect("load obj");
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded.vertex_count(), mesh.vertex_count());
        assert_eq!(loaded.faces, mesh.faces);
        for (i, (a, b)) in loaded.vertices.iter().zip(&mesh.vertices).enumerate() {
            assert_relative_eq!(a.position, b.position, epsilon = 1e-5);
            let uv = a.uv.expect("uv survives round trip");
            assert_relative_eq!(uv.x, 0.1 * i as f64, epsilon = 1e-5);
        }
    }
}
