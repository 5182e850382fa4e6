//! glTF 2.0 schema model.
//!
//! These types mirror the JSON schema one-to-one. Cross-references are plain
//! indices into the owning [`Document`]'s vectors; an absent reference (or the
//! legacy `-1` sentinel) is `None`. A `Document` is immutable once
//! [`crate::document_parser`] has produced and validated it.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::gltf_types::{
    AccessorType, AlphaMode, BufferTarget, CameraType, ComponentType, Interpolation, MagFilter,
    MimeType, MinFilter, PrimitiveMode, TargetPath, WrapMode,
};
use crate::property_bag::PropertyBag;
use crate::status::{GltfError, Result};

// ============================================================================
// Document
// ============================================================================

/// Root of a parsed glTF document.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub asset: Asset,
    pub extensions_used: Vec<String>,
    pub extensions_required: Vec<String>,
    pub accessors: Vec<Accessor>,
    pub animations: Vec<Animation>,
    pub buffers: Vec<Buffer>,
    pub buffer_views: Vec<BufferView>,
    pub cameras: Vec<Camera>,
    pub images: Vec<Image>,
    pub materials: Vec<Material>,
    pub meshes: Vec<Mesh>,
    pub nodes: Vec<Node>,
    pub samplers: Vec<Sampler>,
    /// Default scene index (if present).
    pub scene: Option<usize>,
    pub scenes: Vec<Scene>,
    pub skins: Vec<Skin>,
    pub textures: Vec<Texture>,
    pub extensions: PropertyBag,
    pub extras: PropertyBag,
}

impl Document {
    pub fn accessor(&self, index: usize) -> Result<&Accessor> {
        lookup(&self.accessors, index, "accessors")
    }

    pub fn buffer_view(&self, index: usize) -> Result<&BufferView> {
        lookup(&self.buffer_views, index, "bufferViews")
    }

    pub fn buffer(&self, index: usize) -> Result<&Buffer> {
        lookup(&self.buffers, index, "buffers")
    }

    pub fn mesh(&self, index: usize) -> Result<&Mesh> {
        lookup(&self.meshes, index, "meshes")
    }

    pub fn node(&self, index: usize) -> Result<&Node> {
        lookup(&self.nodes, index, "nodes")
    }

    pub fn skin(&self, index: usize) -> Result<&Skin> {
        lookup(&self.skins, index, "skins")
    }

    pub fn image(&self, index: usize) -> Result<&Image> {
        lookup(&self.images, index, "images")
    }

    /// Root nodes of the scene to display.
    ///
    /// Uses the default scene, else the first scene. Without any scene, every
    /// node that is nobody's child is a root.
    pub fn scene_roots(&self) -> Vec<usize> {
        let scene = self.scene.or(if self.scenes.is_empty() { None } else { Some(0) });
        if let Some(scene) = scene.and_then(|idx| self.scenes.get(idx)) {
            return scene.nodes.clone();
        }

        let mut is_child = vec![false; self.nodes.len()];
        for node in &self.nodes {
            for &child_idx in &node.children {
                if child_idx < is_child.len() {
                    is_child[child_idx] = true;
                }
            }
        }
        (0..self.nodes.len()).filter(|&i| !is_child[i]).collect()
    }
}

fn lookup<'a, T>(items: &'a [T], index: usize, collection: &str) -> Result<&'a T> {
    items.get(index).ok_or_else(|| {
        GltfError::malformed(
            format!("{}[{}]", collection, index),
            format!("index out of range ({} {})", items.len(), collection),
        )
    })
}

/// Accepts a non-negative index, treating `null` and `-1` as "no reference".
fn optional_index<'de, D>(deserializer: D) -> std::result::Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<i64>::deserialize(deserializer)? {
        None | Some(-1) => Ok(None),
        Some(value) if value >= 0 => Ok(Some(value as usize)),
        Some(value) => Err(D::Error::custom(format!("invalid index {}", value))),
    }
}

fn one() -> f32 {
    1.0
}

fn default_alpha_cutoff() -> f32 {
    0.5
}

// ============================================================================
// Asset
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub version: String,
    pub min_version: Option<String>,
    pub generator: Option<String>,
    pub copyright: Option<String>,
    #[serde(default)]
    pub extensions: PropertyBag,
    #[serde(default)]
    pub extras: PropertyBag,
}

// ============================================================================
// Buffers, views, accessors
// ============================================================================

/// Raw binary payload stored in an external file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    pub name: Option<String>,
    pub uri: Option<String>,
    pub byte_length: usize,
    #[serde(default)]
    pub extensions: PropertyBag,
    #[serde(default)]
    pub extras: PropertyBag,
}

/// A byte sub-range of one buffer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub name: Option<String>,
    pub buffer: usize,
    #[serde(default)]
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: Option<usize>,
    pub target: Option<BufferTarget>,
    #[serde(default)]
    pub extensions: PropertyBag,
    #[serde(default)]
    pub extras: PropertyBag,
}

/// Typed view into a buffer view.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "optional_index")]
    pub buffer_view: Option<usize>,
    #[serde(default)]
    pub byte_offset: usize,
    pub component_type: ComponentType,
    #[serde(default)]
    pub normalized: bool,
    pub count: usize,
    #[serde(rename = "type")]
    pub accessor_type: AccessorType,
    #[serde(default)]
    pub max: Vec<f64>,
    #[serde(default)]
    pub min: Vec<f64>,
    pub sparse: Option<AccessorSparse>,
    #[serde(default)]
    pub extensions: PropertyBag,
    #[serde(default)]
    pub extras: PropertyBag,
}

impl Accessor {
    /// Size of one element in bytes.
    pub fn element_size(&self) -> usize {
        self.component_type.size() * self.accessor_type.component_count()
    }

    /// Size of the tightly packed element array in bytes, `None` on overflow.
    pub fn byte_length(&self) -> Option<usize> {
        self.count.checked_mul(self.element_size())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessorSparse {
    pub count: usize,
    pub indices: AccessorSparseIndices,
    pub values: AccessorSparseValues,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessorSparseIndices {
    pub buffer_view: usize,
    #[serde(default)]
    pub byte_offset: usize,
    pub component_type: ComponentType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessorSparseValues {
    pub buffer_view: usize,
    #[serde(default)]
    pub byte_offset: usize,
}

// ============================================================================
// Meshes
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<MeshPrimitive>,
    /// Default morph target weights.
    #[serde(default)]
    pub weights: Vec<f32>,
    #[serde(default)]
    pub extensions: PropertyBag,
    #[serde(default)]
    pub extras: PropertyBag,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshPrimitive {
    /// Semantic name (`POSITION`, `NORMAL`, ...) to accessor index.
    pub attributes: BTreeMap<String, usize>,
    #[serde(default, deserialize_with = "optional_index")]
    pub indices: Option<usize>,
    #[serde(default, deserialize_with = "optional_index")]
    pub material: Option<usize>,
    #[serde(default)]
    pub mode: PrimitiveMode,
    /// Morph targets; retained, not decoded.
    #[serde(default)]
    pub targets: Vec<BTreeMap<String, usize>>,
    #[serde(default)]
    pub extensions: PropertyBag,
    #[serde(default)]
    pub extras: PropertyBag,
}

// ============================================================================
// Nodes, skins, scenes
// ============================================================================

/// A node in the scene hierarchy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "optional_index")]
    pub camera: Option<usize>,
    /// Child node indices.
    #[serde(default)]
    pub children: Vec<usize>,
    #[serde(default, deserialize_with = "optional_index")]
    pub skin: Option<usize>,
    /// 4x4 transformation matrix (column-major). Takes precedence over TRS.
    pub matrix: Option<[f32; 16]>,
    #[serde(default, deserialize_with = "optional_index")]
    pub mesh: Option<usize>,
    /// Rotation quaternion [x, y, z, w].
    pub rotation: Option<[f32; 4]>,
    pub scale: Option<[f32; 3]>,
    pub translation: Option<[f32; 3]>,
    #[serde(default)]
    pub weights: Vec<f32>,
    #[serde(default)]
    pub extensions: PropertyBag,
    #[serde(default)]
    pub extras: PropertyBag,
}

/// Joint set and bind pose of a skinned mesh.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skin {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "optional_index")]
    pub inverse_bind_matrices: Option<usize>,
    #[serde(default, deserialize_with = "optional_index")]
    pub skeleton: Option<usize>,
    pub joints: Vec<usize>,
    #[serde(default)]
    pub extensions: PropertyBag,
    #[serde(default)]
    pub extras: PropertyBag,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub name: Option<String>,
    #[serde(default)]
    pub nodes: Vec<usize>,
    #[serde(default)]
    pub extensions: PropertyBag,
    #[serde(default)]
    pub extras: PropertyBag,
}

// ============================================================================
// Materials and textures
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub name: Option<String>,
    #[serde(default)]
    pub pbr_metallic_roughness: PbrMetallicRoughness,
    pub normal_texture: Option<NormalTextureInfo>,
    pub occlusion_texture: Option<OcclusionTextureInfo>,
    pub emissive_texture: Option<TextureInfo>,
    #[serde(default)]
    pub emissive_factor: [f32; 3],
    #[serde(default)]
    pub alpha_mode: AlphaMode,
    #[serde(default = "default_alpha_cutoff")]
    pub alpha_cutoff: f32,
    #[serde(default)]
    pub double_sided: bool,
    #[serde(default)]
    pub extensions: PropertyBag,
    #[serde(default)]
    pub extras: PropertyBag,
}

impl Material {
    /// Texture indices referenced by this material.
    pub fn texture_indices(&self) -> impl Iterator<Item = usize> + '_ {
        let pbr = &self.pbr_metallic_roughness;
        pbr.base_color_texture
            .as_ref()
            .map(|t| t.index)
            .into_iter()
            .chain(pbr.metallic_roughness_texture.as_ref().map(|t| t.index))
            .chain(self.normal_texture.as_ref().map(|t| t.index))
            .chain(self.occlusion_texture.as_ref().map(|t| t.index))
            .chain(self.emissive_texture.as_ref().map(|t| t.index))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PbrMetallicRoughness {
    pub base_color_factor: [f32; 4],
    pub base_color_texture: Option<TextureInfo>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub metallic_roughness_texture: Option<TextureInfo>,
    pub extensions: PropertyBag,
    pub extras: PropertyBag,
}

impl Default for PbrMetallicRoughness {
    fn default() -> Self {
        Self {
            base_color_factor: [1.0; 4],
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
            extensions: PropertyBag::default(),
            extras: PropertyBag::default(),
        }
    }
}

/// Reference from a material to a texture.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureInfo {
    pub index: usize,
    #[serde(default)]
    pub tex_coord: u32,
    #[serde(default)]
    pub extensions: PropertyBag,
    #[serde(default)]
    pub extras: PropertyBag,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalTextureInfo {
    pub index: usize,
    #[serde(default)]
    pub tex_coord: u32,
    #[serde(default = "one")]
    pub scale: f32,
    #[serde(default)]
    pub extensions: PropertyBag,
    #[serde(default)]
    pub extras: PropertyBag,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcclusionTextureInfo {
    pub index: usize,
    #[serde(default)]
    pub tex_coord: u32,
    #[serde(default = "one")]
    pub strength: f32,
    #[serde(default)]
    pub extensions: PropertyBag,
    #[serde(default)]
    pub extras: PropertyBag,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Texture {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "optional_index")]
    pub sampler: Option<usize>,
    #[serde(default, deserialize_with = "optional_index")]
    pub source: Option<usize>,
    #[serde(default)]
    pub extensions: PropertyBag,
    #[serde(default)]
    pub extras: PropertyBag,
}

/// Texture sampling parameters. Absent filters mean "unspecified".
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sampler {
    pub name: Option<String>,
    pub mag_filter: Option<MagFilter>,
    pub min_filter: Option<MinFilter>,
    #[serde(default)]
    pub wrap_s: WrapMode,
    #[serde(default)]
    pub wrap_t: WrapMode,
    #[serde(default)]
    pub extensions: PropertyBag,
    #[serde(default)]
    pub extras: PropertyBag,
}

/// Image data source: an external file or a buffer view.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub name: Option<String>,
    pub uri: Option<String>,
    pub mime_type: Option<MimeType>,
    #[serde(default, deserialize_with = "optional_index")]
    pub buffer_view: Option<usize>,
    #[serde(default)]
    pub extensions: PropertyBag,
    #[serde(default)]
    pub extras: PropertyBag,
}

// ============================================================================
// Cameras and animations
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub camera_type: CameraType,
    pub perspective: Option<CameraPerspective>,
    pub orthographic: Option<CameraOrthographic>,
    #[serde(default)]
    pub extensions: PropertyBag,
    #[serde(default)]
    pub extras: PropertyBag,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraPerspective {
    pub aspect_ratio: Option<f32>,
    pub yfov: f32,
    pub zfar: Option<f32>,
    pub znear: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraOrthographic {
    pub xmag: f32,
    pub ymag: f32,
    pub zfar: f32,
    pub znear: f32,
}

/// Keyframe animation. Parsed and validated, never sampled.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Animation {
    pub name: Option<String>,
    pub channels: Vec<AnimationChannel>,
    pub samplers: Vec<AnimationSampler>,
    #[serde(default)]
    pub extensions: PropertyBag,
    #[serde(default)]
    pub extras: PropertyBag,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationChannel {
    pub sampler: usize,
    pub target: AnimationChannelTarget,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationChannelTarget {
    #[serde(default, deserialize_with = "optional_index")]
    pub node: Option<usize>,
    pub path: TargetPath,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationSampler {
    pub input: usize,
    #[serde(default)]
    pub interpolation: Interpolation,
    pub output: usize,
}
