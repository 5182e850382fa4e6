//! JSON → [`Document`] conversion.
//!
//! Each top-level collection is decoded element by element so that a field
//! error can name the exact entity (`"materials[2]"`). Once every entity is
//! decoded, all cross-references are bounds-checked; a document that leaves
//! this module is safe to index.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::schema::{Document, MeshPrimitive};
use crate::status::{GltfError, Result};

/// The only major version this decoder reads.
pub const SUPPORTED_MAJOR_VERSION: u32 = 2;

/// Leading magic of a binary `.glb` container.
pub const GLB_MAGIC: &[u8; 4] = b"glTF";

/// Parse a document from raw JSON bytes.
pub fn parse_slice(json_data: &[u8]) -> Result<Document> {
    if json_data.starts_with(GLB_MAGIC) {
        return Err(GltfError::unsupported("glb container"));
    }
    let value: Value = serde_json::from_slice(json_data)
        .map_err(|e| GltfError::malformed("document", format!("invalid JSON: {}", e)))?;
    parse_value(&value)
}

/// Parse a document from JSON text.
pub fn parse_str(json: &str) -> Result<Document> {
    parse_slice(json.as_bytes())
}

/// Parse a document from an already decoded JSON value tree.
pub fn parse_value(value: &Value) -> Result<Document> {
    let root = value
        .as_object()
        .ok_or_else(|| GltfError::malformed("document", "root is not a JSON object"))?;

    let asset = parse_field(root, "asset")?
        .ok_or_else(|| GltfError::malformed("asset", "missing required asset object"))?;

    let document = Document {
        asset,
        extensions_used: parse_field(root, "extensionsUsed")?.unwrap_or_default(),
        extensions_required: parse_field(root, "extensionsRequired")?.unwrap_or_default(),
        accessors: parse_array(root, "accessors")?,
        animations: parse_array(root, "animations")?,
        buffers: parse_array(root, "buffers")?,
        buffer_views: parse_array(root, "bufferViews")?,
        cameras: parse_array(root, "cameras")?,
        images: parse_array(root, "images")?,
        materials: parse_array(root, "materials")?,
        meshes: parse_array(root, "meshes")?,
        nodes: parse_array(root, "nodes")?,
        samplers: parse_array(root, "samplers")?,
        scene: parse_field(root, "scene")?,
        scenes: parse_array(root, "scenes")?,
        skins: parse_array(root, "skins")?,
        textures: parse_array(root, "textures")?,
        extensions: parse_field(root, "extensions")?.unwrap_or_default(),
        extras: parse_field(root, "extras")?.unwrap_or_default(),
    };

    check_version(&document.asset.version)?;
    validate_references(&document)?;

    debug!(
        version = %document.asset.version,
        nodes = document.nodes.len(),
        meshes = document.meshes.len(),
        accessors = document.accessors.len(),
        buffers = document.buffers.len(),
        "parsed glTF document"
    );

    Ok(document)
}

fn parse_field<T: DeserializeOwned>(root: &Map<String, Value>, key: &str) -> Result<Option<T>> {
    match root.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => T::deserialize(value)
            .map(Some)
            .map_err(|e| GltfError::malformed(key, e.to_string())),
    }
}

fn parse_array<T: DeserializeOwned>(root: &Map<String, Value>, key: &str) -> Result<Vec<T>> {
    match root.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                T::deserialize(item)
                    .map_err(|e| GltfError::malformed(format!("{}[{}]", key, i), e.to_string()))
            })
            .collect(),
        Some(_) => Err(GltfError::malformed(key, "expected an array")),
    }
}

fn check_version(version: &str) -> Result<()> {
    let major = version
        .split('.')
        .next()
        .and_then(|major| major.parse::<u32>().ok())
        .ok_or_else(|| {
            GltfError::malformed("asset", format!("invalid version \"{}\"", version))
        })?;
    if major != SUPPORTED_MAJOR_VERSION {
        return Err(GltfError::unsupported(format!("glTF version {}", version)));
    }
    Ok(())
}

// ============================================================================
// Reference validation
// ============================================================================

fn check_index(entity: &str, field: &str, index: usize, len: usize, target: &str) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(GltfError::malformed(
            entity,
            format!("{} {} is out of range ({} {})", field, index, len, target),
        ))
    }
}

fn check_optional(
    entity: &str,
    field: &str,
    index: Option<usize>,
    len: usize,
    target: &str,
) -> Result<()> {
    match index {
        Some(index) => check_index(entity, field, index, len, target),
        None => Ok(()),
    }
}

fn validate_references(doc: &Document) -> Result<()> {
    let n_accessors = doc.accessors.len();
    let n_views = doc.buffer_views.len();
    let n_nodes = doc.nodes.len();

    for (i, accessor) in doc.accessors.iter().enumerate() {
        let entity = format!("accessors[{}]", i);
        check_optional(&entity, "bufferView", accessor.buffer_view, n_views, "bufferViews")?;
        if let Some(sparse) = &accessor.sparse {
            check_index(&entity, "sparse.indices.bufferView", sparse.indices.buffer_view, n_views, "bufferViews")?;
            check_index(&entity, "sparse.values.bufferView", sparse.values.buffer_view, n_views, "bufferViews")?;
        }
    }

    for (i, view) in doc.buffer_views.iter().enumerate() {
        let entity = format!("bufferViews[{}]", i);
        check_index(&entity, "buffer", view.buffer, doc.buffers.len(), "buffers")?;
        if let Some(stride) = view.byte_stride {
            if !(4..=252).contains(&stride) || stride % 4 != 0 {
                return Err(GltfError::malformed(
                    entity,
                    format!("byteStride {} must be a multiple of 4 in 4..=252", stride),
                ));
            }
        }
    }

    for (m, mesh) in doc.meshes.iter().enumerate() {
        if mesh.primitives.is_empty() {
            return Err(GltfError::malformed(
                format!("meshes[{}]", m),
                "mesh has no primitives",
            ));
        }
        for (p, primitive) in mesh.primitives.iter().enumerate() {
            let entity = format!("meshes[{}].primitives[{}]", m, p);
            validate_primitive(doc, &entity, primitive)?;
        }
    }

    for (i, node) in doc.nodes.iter().enumerate() {
        let entity = format!("nodes[{}]", i);
        check_optional(&entity, "camera", node.camera, doc.cameras.len(), "cameras")?;
        check_optional(&entity, "mesh", node.mesh, doc.meshes.len(), "meshes")?;
        check_optional(&entity, "skin", node.skin, doc.skins.len(), "skins")?;
        for &child in &node.children {
            check_index(&entity, "child", child, n_nodes, "nodes")?;
        }
    }

    for (i, skin) in doc.skins.iter().enumerate() {
        let entity = format!("skins[{}]", i);
        check_optional(&entity, "inverseBindMatrices", skin.inverse_bind_matrices, n_accessors, "accessors")?;
        check_optional(&entity, "skeleton", skin.skeleton, n_nodes, "nodes")?;
        for &joint in &skin.joints {
            check_index(&entity, "joint", joint, n_nodes, "nodes")?;
        }
    }

    for (i, material) in doc.materials.iter().enumerate() {
        let entity = format!("materials[{}]", i);
        for texture in material.texture_indices() {
            check_index(&entity, "texture", texture, doc.textures.len(), "textures")?;
        }
    }

    for (i, texture) in doc.textures.iter().enumerate() {
        let entity = format!("textures[{}]", i);
        check_optional(&entity, "sampler", texture.sampler, doc.samplers.len(), "samplers")?;
        check_optional(&entity, "source", texture.source, doc.images.len(), "images")?;
    }

    for (i, image) in doc.images.iter().enumerate() {
        let entity = format!("images[{}]", i);
        check_optional(&entity, "bufferView", image.buffer_view, n_views, "bufferViews")?;
    }

    for (i, scene) in doc.scenes.iter().enumerate() {
        let entity = format!("scenes[{}]", i);
        for &node in &scene.nodes {
            check_index(&entity, "node", node, n_nodes, "nodes")?;
        }
    }
    check_optional("document", "scene", doc.scene, doc.scenes.len(), "scenes")?;

    for (a, animation) in doc.animations.iter().enumerate() {
        for (c, channel) in animation.channels.iter().enumerate() {
            let entity = format!("animations[{}].channels[{}]", a, c);
            check_index(&entity, "sampler", channel.sampler, animation.samplers.len(), "samplers")?;
            check_optional(&entity, "target.node", channel.target.node, n_nodes, "nodes")?;
        }
        for (s, sampler) in animation.samplers.iter().enumerate() {
            let entity = format!("animations[{}].samplers[{}]", a, s);
            check_index(&entity, "input", sampler.input, n_accessors, "accessors")?;
            check_index(&entity, "output", sampler.output, n_accessors, "accessors")?;
        }
    }

    Ok(())
}

fn validate_primitive(doc: &Document, entity: &str, primitive: &MeshPrimitive) -> Result<()> {
    let n_accessors = doc.accessors.len();
    for (semantic, &accessor) in &primitive.attributes {
        check_index(entity, semantic, accessor, n_accessors, "accessors")?;
    }
    check_optional(entity, "indices", primitive.indices, n_accessors, "accessors")?;
    check_optional(entity, "material", primitive.material, doc.materials.len(), "materials")?;
    for target in &primitive.targets {
        for (semantic, &accessor) in target {
            check_index(entity, semantic, accessor, n_accessors, "accessors")?;
        }
    }
    Ok(())
}
