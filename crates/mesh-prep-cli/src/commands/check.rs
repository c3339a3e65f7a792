//! mesh-prep check command - diagnose printability without modifying.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_prep::{analyze_topology, fix_winding, load_mesh};
use serde::Serialize;

use crate::{output, Cli, OutputFormat};

#[derive(Serialize)]
struct CheckResult {
    path: String,
    vertices: usize,
    faces: usize,
    is_watertight: bool,
    is_edge_manifold: bool,
    is_vertex_manifold: bool,
    is_orientable: bool,
    boundary_edges: usize,
    non_manifold_edges: usize,
    print_ready: bool,
}

pub fn run(input: &Path, strict: bool, cli: &Cli) -> Result<()> {
    let mesh = load_mesh(input).with_context(|| format!("Failed to load mesh from {input:?}"))?;

    let topology = analyze_topology(&mesh);
    // Orientability is probed on a scratch copy; the input stays untouched.
    let winding = fix_winding(&mut mesh.clone());

    let result = CheckResult {
        path: input.display().to_string(),
        vertices: mesh.vertex_count(),
        faces: mesh.face_count(),
        is_watertight: topology.is_watertight,
        is_edge_manifold: topology.is_edge_manifold,
        is_vertex_manifold: topology.is_vertex_manifold,
        is_orientable: winding.orientable,
        boundary_edges: topology.boundary_edge_count,
        non_manifold_edges: topology.non_manifold_edge_count,
        print_ready: topology.is_watertight
            && topology.is_edge_manifold
            && topology.is_vertex_manifold
            && winding.orientable,
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&result, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                println!("{}", "Printability Check".bold().underline());
                println!("  {}: {}", "File".cyan(), input.display());
                print_flag("Watertight", result.is_watertight);
                print_flag("Edge-manifold", result.is_edge_manifold);
                print_flag("Vertex-manifold", result.is_vertex_manifold);
                print_flag("Orientable", result.is_orientable);
                if result.boundary_edges > 0 {
                    println!(
                        "  {}: {} boundary edges",
                        "Holes".yellow(),
                        result.boundary_edges
                    );
                }
                if result.non_manifold_edges > 0 {
                    println!(
                        "  {}: {} non-manifold edges",
                        "Defects".yellow(),
                        result.non_manifold_edges
                    );
                }
                let verdict = if result.print_ready {
                    "print-ready".green().bold()
                } else {
                    "not print-ready".red().bold()
                };
                println!("  {}: {verdict}", "Status".cyan());
            }
        }
    }

    if strict && !result.print_ready {
        std::process::exit(1);
    }
    Ok(())
}

fn print_flag(label: &str, ok: bool) {
    let mark = if ok { "yes".green() } else { "no".red() };
    println!("  {}: {mark}", label.cyan());
}
