//! iogltf-inspect - glTF 2.0 import inspector
//!
//! Runs a full import of a `.gltf` document and prints what a host would
//! receive: merged vertex buffers, skins, skeletons, images and the node tree.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use iogltf_core::import_options::DEFAULT_CONNECT_THRESHOLD;
use iogltf_core::{ImportOptions, NodeGraph, TracingProgress};
use iogltf_io::{GltfReader, ImageData, ImportedScene};

#[derive(Parser)]
#[command(name = "iogltf-inspect")]
#[command(about = "Import a glTF 2.0 document and summarize the result")]
#[command(version)]
struct Cli {
    /// Input .gltf file
    input: PathBuf,

    /// Convert from glTF's Y-up to Z-up
    #[arg(long)]
    yup_to_zup: bool,

    /// Keep texture V as stored instead of flipping it
    #[arg(long)]
    no_flip_uv: bool,

    /// Minimum alignment for connecting a bone to its child
    #[arg(long, default_value_t = DEFAULT_CONNECT_THRESHOLD)]
    connect_threshold: f32,

    /// Print the node hierarchy
    #[arg(long)]
    tree: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> ImportOptions {
        ImportOptions::new()
            .with_yup_to_zup(self.yup_to_zup)
            .with_flip_uv(!self.no_flip_uv)
            .with_connect_threshold(self.connect_threshold)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let reader = GltfReader::open_with_options(&cli.input, cli.options())
        .with_context(|| format!("Failed to open {}", cli.input.display()))?;
    let scene = reader
        .import(&mut TracingProgress::new())
        .with_context(|| format!("Failed to import {}", cli.input.display()))?;

    print_meshes(&scene);
    print_skins(&scene);
    print_images(&scene);
    if cli.tree {
        println!();
        print_tree(&scene.graph);
    }

    Ok(())
}

fn print_meshes(scene: &ImportedScene) {
    println!("Meshes ({}):", scene.vertex_buffers.len());
    for vb in &scene.vertex_buffers {
        let mut attributes = vec!["POSITION"];
        if vb.has_normals() {
            attributes.push("NORMAL");
        }
        if vb.has_uvs() {
            attributes.push("TEXCOORD_0");
        }
        if vb.has_skinning() {
            attributes.push("JOINTS_0/WEIGHTS_0");
        }
        println!(
            "  [{}] {}: {} vertices, {} triangles ({})",
            vb.mesh,
            vb.name.as_deref().unwrap_or("<unnamed>"),
            vb.vertex_count(),
            vb.triangle_count(),
            attributes.join(", ")
        );
        for submesh in &vb.submeshes {
            println!(
                "      primitive {}: triangles {}..{}, material {}",
                submesh.primitive,
                submesh.first_triangle(),
                submesh.first_triangle() + submesh.triangle_count(),
                submesh
                    .material
                    .map_or_else(|| "-".to_string(), |m| m.to_string())
            );
        }
    }
}

fn print_skins(scene: &ImportedScene) {
    let graph = &scene.graph;
    if graph.skins().is_empty() {
        return;
    }

    println!("Skins ({}):", graph.skins().len());
    for skin in graph.skins() {
        let root = graph
            .node(skin.skeleton_root)
            .map(|n| n.display_name())
            .unwrap_or_default();
        println!(
            "  [{}] {}: {} joints, skeleton root {}",
            skin.skin,
            skin.name.as_deref().unwrap_or("<unnamed>"),
            skin.joints.len(),
            root
        );
    }

    println!("Skeletons ({}):", graph.skeletons().len());
    for skeleton in graph.skeletons() {
        let root = graph
            .node(skeleton.root)
            .map(|n| n.display_name())
            .unwrap_or_default();
        let connected = skeleton.bones.iter().filter(|b| b.connected).count();
        println!(
            "  {}: skins {:?}, {} bones ({} connected)",
            root,
            skeleton.skins,
            skeleton.bones.len(),
            connected
        );
    }
}

fn print_images(scene: &ImportedScene) {
    if scene.images.is_empty() {
        return;
    }

    println!("Images ({}):", scene.images.len());
    for (i, image) in scene.images.iter().enumerate() {
        let mime = image
            .mime_type()
            .map_or_else(|| "unknown".to_string(), |m| format!("{:?}", m));
        match image {
            ImageData::File { path, .. } => {
                println!("  [{}] file {} ({})", i, path.display(), mime)
            }
            ImageData::Embedded { bytes, .. } => {
                println!("  [{}] embedded, {} bytes ({})", i, bytes.len(), mime)
            }
        }
    }
}

fn print_tree(graph: &NodeGraph) {
    println!("Nodes ({}):", graph.len());
    for node in graph.traverse() {
        let indent = "  ".repeat(graph.depth(node.id) + 1);
        let mut tags = Vec::new();
        if node.is_synthesized() {
            tags.push("synthesized".to_string());
        }
        if let Some(mesh) = node.mesh {
            tags.push(format!("mesh {}", mesh));
        }
        if let Some(skin) = node.skin {
            tags.push(format!("skin {}", skin));
        }
        if let Some(skin) = node.joint_of {
            tags.push(format!("joint of skin {}", skin));
        }
        if tags.is_empty() {
            println!("{}{}", indent, node.display_name());
        } else {
            println!("{}{} [{}]", indent, node.display_name(), tags.join(", "));
        }
    }
}
