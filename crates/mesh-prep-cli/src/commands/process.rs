//! mesh-prep process command - run the full preparation pipeline.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_prep::{load_mesh, process, save_mesh, ProcessingConfig};
use serde::Serialize;

use crate::{output, Cli, OutputFormat};

/// Pipeline tuning collected from the command line.
pub struct ProcessArgs {
    pub iterations: usize,
    pub lambda: f64,
    pub mu: f64,
    pub remove_bumps: bool,
    pub voxel_size: f64,
    pub neighbors: usize,
    pub std_ratio: f64,
}

#[derive(Serialize)]
struct ProcessResult {
    input: String,
    output: String,
    input_vertices: usize,
    input_faces: usize,
    output_vertices: usize,
    output_faces: usize,
    is_printable: bool,
    is_watertight: bool,
    is_edge_manifold: bool,
    is_vertex_manifold: bool,
    is_orientable: bool,
    degenerate_faces_removed: usize,
    duplicate_vertices_merged: usize,
    duplicate_faces_removed: usize,
    faces_reoriented: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    reconstruction_fallback: Option<String>,
}

pub fn run(input: &Path, output_path: &Path, args: ProcessArgs, cli: &Cli) -> Result<()> {
    let mesh = load_mesh(input).with_context(|| format!("Failed to load mesh from {input:?}"))?;

    let input_vertices = mesh.vertex_count();
    let input_faces = mesh.face_count();

    let config = ProcessingConfig {
        iterations: args.iterations,
        lambda: args.lambda,
        mu: args.mu,
        remove_bumps: args.remove_bumps,
        voxel_size: args.voxel_size,
        outlier_neighbors: args.neighbors,
        outlier_std_ratio: args.std_ratio,
        ..ProcessingConfig::default()
    };

    let (prepared, report) =
        process(&mesh, &config).with_context(|| "Preparation pipeline failed")?;

    save_mesh(&prepared, output_path)
        .with_context(|| format!("Failed to save prepared mesh to {output_path:?}"))?;

    let result = ProcessResult {
        input: input.display().to_string(),
        output: output_path.display().to_string(),
        input_vertices,
        input_faces,
        output_vertices: prepared.vertex_count(),
        output_faces: prepared.face_count(),
        is_printable: report.is_printable(),
        is_watertight: report.is_watertight,
        is_edge_manifold: report.is_edge_manifold,
        is_vertex_manifold: report.is_vertex_manifold,
        is_orientable: report.is_orientable,
        degenerate_faces_removed: report.degenerate_faces_removed,
        duplicate_vertices_merged: report.duplicate_vertices_merged,
        duplicate_faces_removed: report.duplicate_faces_removed,
        faces_reoriented: report.faces_reoriented,
        reconstruction_fallback: report.reconstruction_fallback.clone(),
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&result, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                output::success(
                    &format!("Prepared mesh saved to {}", output_path.display()),
                    cli.format,
                    cli.quiet,
                );
                println!(
                    "  {}: {} → {} vertices",
                    "Vertices".cyan(),
                    result.input_vertices,
                    result.output_vertices
                );
                println!(
                    "  {}: {} → {} faces",
                    "Faces".cyan(),
                    result.input_faces,
                    result.output_faces
                );
                if result.degenerate_faces_removed > 0 {
                    println!(
                        "  {}: {} degenerate faces removed",
                        "Cleanup".green(),
                        result.degenerate_faces_removed
                    );
                }
                if result.duplicate_vertices_merged > 0 {
                    println!(
                        "  {}: {} duplicate vertices merged",
                        "Cleanup".green(),
                        result.duplicate_vertices_merged
                    );
                }
                if result.faces_reoriented > 0 {
                    println!(
                        "  {}: {} faces reoriented",
                        "Cleanup".green(),
                        result.faces_reoriented
                    );
                }
                if let Some(ref reason) = result.reconstruction_fallback {
                    println!(
                        "  {}: reconstruction skipped ({reason})",
                        "Warning".yellow()
                    );
                }
                let verdict = if result.is_printable {
                    "print-ready".green().bold()
                } else {
                    "not print-ready".red().bold()
                };
                println!("  {}: {verdict}", "Status".cyan());
            }
        }
    }

    Ok(())
}
