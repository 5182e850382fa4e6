//! Mesh assembly.
//!
//! All primitives of a mesh are merged into one vertex buffer: attribute
//! arrays are concatenated and every primitive's indices are shifted by the
//! number of vertices that precede it. Each primitive is remembered as a
//! [`Submesh`] so triangles can be mapped back to their material.

use tracing::debug;

use crate::accessor_decoder::AccessorDecoder;
use crate::buffer_resolver::{BufferResolver, BufferSource};
use crate::gltf_types::PrimitiveMode;
use crate::import_options::ImportOptions;
use crate::math_utils::{flip_v, AxisConversion};
use crate::schema::MeshPrimitive;
use crate::status::{GltfError, Result};

pub const POSITION: &str = "POSITION";
pub const NORMAL: &str = "NORMAL";
pub const TEXCOORD_0: &str = "TEXCOORD_0";
pub const JOINTS_0: &str = "JOINTS_0";
pub const WEIGHTS_0: &str = "WEIGHTS_0";

/// The part of a merged vertex buffer that came from one primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submesh {
    /// Primitive index within the source mesh.
    pub primitive: usize,
    pub material: Option<usize>,
    pub vertex_offset: usize,
    pub vertex_count: usize,
    /// First entry in [`VertexBuffer::indices`].
    pub index_offset: usize,
    pub index_count: usize,
}

impl Submesh {
    pub fn first_triangle(&self) -> usize {
        self.index_offset / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.index_count / 3
    }
}

/// Merged vertex data of one mesh.
///
/// Every non-empty attribute array has exactly one entry per vertex.
/// Attributes that no primitive provides are left empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexBuffer {
    /// Source mesh index.
    pub mesh: usize,
    pub name: Option<String>,
    /// Flat `x, y, z` triples.
    pub positions: Vec<f32>,
    /// Flat `x, y, z` triples.
    pub normals: Vec<f32>,
    pub uvs: Vec<[f32; 2]>,
    pub joints: Vec<[u16; 4]>,
    pub weights: Vec<[f32; 4]>,
    /// Triangle list into the merged vertex arrays.
    pub indices: Vec<u32>,
    pub submeshes: Vec<Submesh>,
    /// Exclusive cumulative triangle count per submesh.
    triangle_ends: Vec<usize>,
}

impl VertexBuffer {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn position(&self, vertex: usize) -> Option<[f32; 3]> {
        self.positions
            .get(vertex * 3..vertex * 3 + 3)
            .map(|p| [p[0], p[1], p[2]])
    }

    pub fn normal(&self, vertex: usize) -> Option<[f32; 3]> {
        self.normals
            .get(vertex * 3..vertex * 3 + 3)
            .map(|n| [n[0], n[1], n[2]])
    }

    /// Vertex indices of triangle `face`.
    pub fn triangle(&self, face: usize) -> Option<[u32; 3]> {
        self.indices
            .get(face * 3..face * 3 + 3)
            .map(|t| [t[0], t[1], t[2]])
    }

    /// Submesh that triangle `face` belongs to.
    pub fn get_submesh_from_face(&self, face: usize) -> Option<&Submesh> {
        let submesh = self.triangle_ends.partition_point(|&end| end <= face);
        self.submeshes.get(submesh)
    }

    /// Material of triangle `face`, if its primitive has one.
    pub fn material_for_face(&self, face: usize) -> Option<usize> {
        self.get_submesh_from_face(face).and_then(|s| s.material)
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    pub fn has_uvs(&self) -> bool {
        !self.uvs.is_empty()
    }

    pub fn has_skinning(&self) -> bool {
        !self.joints.is_empty() && !self.weights.is_empty()
    }
}

/// Decoded attributes of a single primitive.
#[derive(Default)]
struct PrimitiveData {
    positions: Vec<[f32; 3]>,
    normals: Option<Vec<[f32; 3]>>,
    uvs: Option<Vec<[f32; 2]>>,
    joints: Option<Vec<[u16; 4]>>,
    weights: Option<Vec<[f32; 4]>>,
    indices: Vec<u32>,
}

/// Builds [`VertexBuffer`]s from the meshes of a document.
#[derive(Debug, Clone)]
pub struct VertexBufferBuilder {
    axis: AxisConversion,
    flip_uv: bool,
}

impl VertexBufferBuilder {
    pub fn new(options: &ImportOptions) -> Self {
        Self {
            axis: options.axis_conversion(),
            flip_uv: options.flip_uv,
        }
    }

    /// Decodes and merges every primitive of mesh `mesh_index`.
    pub fn build<S: BufferSource>(
        &self,
        resolver: &mut BufferResolver<'_, S>,
        mesh_index: usize,
    ) -> Result<VertexBuffer> {
        let mesh = resolver.document().mesh(mesh_index)?;
        let mut decoder = AccessorDecoder::new(resolver);

        let mut parts = Vec::with_capacity(mesh.primitives.len());
        for (p, primitive) in mesh.primitives.iter().enumerate() {
            parts.push(decode_primitive(&mut decoder, mesh_index, p, primitive)?);
        }

        let total_vertices: usize = parts.iter().map(|part| part.positions.len()).sum();
        let total_indices: usize = parts.iter().map(|part| part.indices.len()).sum();
        let any_normals = parts.iter().any(|part| part.normals.is_some());
        let any_uvs = parts.iter().any(|part| part.uvs.is_some());
        let any_joints = parts.iter().any(|part| part.joints.is_some());
        let any_weights = parts.iter().any(|part| part.weights.is_some());

        let mut out = VertexBuffer {
            mesh: mesh_index,
            name: mesh.name.clone(),
            positions: Vec::with_capacity(total_vertices * 3),
            indices: Vec::with_capacity(total_indices),
            ..VertexBuffer::default()
        };

        let mut vertex_offset = 0usize;
        let mut triangle_end = 0usize;
        for (p, (part, primitive)) in parts.into_iter().zip(&mesh.primitives).enumerate() {
            let count = part.positions.len();

            for position in &part.positions {
                out.positions.extend_from_slice(&self.axis.point(*position));
            }
            if any_normals {
                match &part.normals {
                    Some(normals) => {
                        for normal in normals {
                            out.normals.extend_from_slice(&self.axis.point(*normal));
                        }
                    }
                    None => out.normals.resize(out.normals.len() + count * 3, 0.0),
                }
            }
            if any_uvs {
                match &part.uvs {
                    Some(uvs) if self.flip_uv => out.uvs.extend(uvs.iter().map(|uv| flip_v(*uv))),
                    Some(uvs) => out.uvs.extend_from_slice(uvs),
                    None => out.uvs.resize(out.uvs.len() + count, [0.0; 2]),
                }
            }
            if any_joints {
                append_or_pad(&mut out.joints, part.joints, count);
            }
            if any_weights {
                append_or_pad(&mut out.weights, part.weights, count);
            }

            let index_offset = out.indices.len();
            let base = vertex_offset as u32;
            out.indices.extend(part.indices.iter().map(|&i| i + base));
            triangle_end += part.indices.len() / 3;
            out.triangle_ends.push(triangle_end);
            out.submeshes.push(Submesh {
                primitive: p,
                material: primitive.material,
                vertex_offset,
                vertex_count: count,
                index_offset,
                index_count: part.indices.len(),
            });
            vertex_offset += count;
        }

        debug!(
            mesh = mesh_index,
            vertices = out.vertex_count(),
            triangles = out.triangle_count(),
            submeshes = out.submeshes.len(),
            "built vertex buffer"
        );
        Ok(out)
    }
}

fn append_or_pad<T: Copy + Default>(dst: &mut Vec<T>, src: Option<Vec<T>>, count: usize) {
    match src {
        Some(values) => dst.extend(values),
        None => dst.resize(dst.len() + count, T::default()),
    }
}

fn decode_primitive<S: BufferSource>(
    decoder: &mut AccessorDecoder<'_, '_, S>,
    mesh: usize,
    p: usize,
    primitive: &MeshPrimitive,
) -> Result<PrimitiveData> {
    if primitive.mode != PrimitiveMode::Triangles {
        return Err(GltfError::UnsupportedTopology {
            mesh,
            primitive: p,
            mode: primitive.mode,
        });
    }

    let position_accessor =
        primitive
            .attributes
            .get(POSITION)
            .copied()
            .ok_or_else(|| GltfError::MissingAttribute {
                mesh,
                primitive: p,
                attribute: POSITION.to_string(),
            })?;
    let positions = decoder.decode_vec3(position_accessor)?;
    let expected = positions.len();

    let check = |attribute: &str, actual: usize| -> Result<()> {
        if actual == expected {
            Ok(())
        } else {
            Err(GltfError::AttributeLengthMismatch {
                mesh,
                primitive: p,
                attribute: attribute.to_string(),
                expected,
                actual,
            })
        }
    };

    let mut data = PrimitiveData {
        positions,
        ..PrimitiveData::default()
    };

    if let Some(&accessor) = primitive.attributes.get(NORMAL) {
        let normals = decoder.decode_vec3(accessor)?;
        check(NORMAL, normals.len())?;
        data.normals = Some(normals);
    }
    if let Some(&accessor) = primitive.attributes.get(TEXCOORD_0) {
        let uvs = decoder.decode_vec2(accessor)?;
        check(TEXCOORD_0, uvs.len())?;
        data.uvs = Some(uvs);
    }
    if let Some(&accessor) = primitive.attributes.get(JOINTS_0) {
        let joints = decoder.decode_joints(accessor)?;
        check(JOINTS_0, joints.len())?;
        data.joints = Some(joints);
    }
    if let Some(&accessor) = primitive.attributes.get(WEIGHTS_0) {
        let weights = decoder.decode_vec4(accessor)?;
        check(WEIGHTS_0, weights.len())?;
        data.weights = Some(weights);
    }

    let entity = format!("meshes[{}].primitives[{}]", mesh, p);
    data.indices = match primitive.indices {
        Some(accessor) => decoder.decode_indices(accessor)?,
        None => {
            if expected % 3 != 0 {
                return Err(GltfError::malformed(
                    entity,
                    format!("{} non-indexed vertices do not form whole triangles", expected),
                ));
            }
            (0..expected as u32).collect()
        }
    };

    if data.indices.len() % 3 != 0 {
        return Err(GltfError::malformed(
            entity,
            format!("index count {} is not a multiple of 3", data.indices.len()),
        ));
    }
    if let Some(&bad) = data.indices.iter().find(|&&i| i as usize >= expected) {
        return Err(GltfError::malformed(
            entity,
            format!("index {} addresses past the {} vertices", bad, expected),
        ));
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer_resolver::{BufferCache, MemorySource};
    use crate::document_parser::parse_value;
    use crate::schema::Document;
    use crate::ErrorCode;
    use byteorder::{ByteOrder, LittleEndian};
    use serde_json::json;

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        let mut bytes = vec![0u8; values.len() * 4];
        LittleEndian::write_f32_into(values, &mut bytes);
        bytes
    }

    fn u16_bytes(values: &[u16]) -> Vec<u8> {
        let mut bytes = vec![0u8; values.len() * 2];
        LittleEndian::write_u16_into(values, &mut bytes);
        bytes
    }

    /// Two triangles: a quad of 4 vertices (primitive 0, material 0) and a
    /// single triangle (primitive 1, material 1, no normals).
    fn two_primitive_fixture() -> (Document, MemorySource) {
        let mut data = Vec::new();
        // 0: quad positions, 48 bytes
        data.extend(f32_bytes(&[
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0,
        ]));
        // 48: quad normals, 48 bytes
        data.extend(f32_bytes(&[0.0f32, 0.0, 1.0].repeat(4)));
        // 96: triangle positions, 36 bytes
        data.extend(f32_bytes(&[0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0]));
        // 132: quad uvs, 32 bytes
        data.extend(f32_bytes(&[0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.25]));
        // 164: quad indices, 12 bytes
        data.extend(u16_bytes(&[0, 1, 2, 0, 2, 3]));
        // 176: triangle indices, 6 bytes
        data.extend(u16_bytes(&[0, 1, 2]));
        let length = data.len();

        let document = parse_value(&json!({
            "asset": {"version": "2.0"},
            "buffers": [{"uri": "mesh.bin", "byteLength": length}],
            "bufferViews": [
                {"buffer": 0, "byteOffset": 0, "byteLength": 48},
                {"buffer": 0, "byteOffset": 48, "byteLength": 48},
                {"buffer": 0, "byteOffset": 96, "byteLength": 36},
                {"buffer": 0, "byteOffset": 132, "byteLength": 32},
                {"buffer": 0, "byteOffset": 164, "byteLength": 12},
                {"buffer": 0, "byteOffset": 176, "byteLength": 6}
            ],
            "accessors": [
                {"bufferView": 0, "componentType": 5126, "count": 4, "type": "VEC3"},
                {"bufferView": 1, "componentType": 5126, "count": 4, "type": "VEC3"},
                {"bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC3"},
                {"bufferView": 3, "componentType": 5126, "count": 4, "type": "VEC2"},
                {"bufferView": 4, "componentType": 5123, "count": 6, "type": "SCALAR"},
                {"bufferView": 5, "componentType": 5123, "count": 3, "type": "SCALAR"}
            ],
            "materials": [{"name": "a"}, {"name": "b"}],
            "meshes": [{
                "name": "merged",
                "primitives": [
                    {"attributes": {"POSITION": 0, "NORMAL": 1, "TEXCOORD_0": 3}, "indices": 4, "material": 0},
                    {"attributes": {"POSITION": 2}, "indices": 5, "material": 1}
                ]
            }]
        }))
        .unwrap();
        (document, MemorySource::new().with_file("mesh.bin", data))
    }

    fn build(document: &Document, source: MemorySource, options: &ImportOptions) -> Result<VertexBuffer> {
        let mut resolver = BufferResolver::new(document, source, BufferCache::new());
        VertexBufferBuilder::new(options).build(&mut resolver, 0)
    }

    #[test]
    fn test_merge_offsets_second_primitive() {
        let (document, source) = two_primitive_fixture();
        let vb = build(&document, source, &ImportOptions::default()).unwrap();

        assert_eq!(vb.name.as_deref(), Some("merged"));
        assert_eq!(vb.vertex_count(), 7);
        assert_eq!(vb.indices, vec![0, 1, 2, 0, 2, 3, 4, 5, 6]);
        assert_eq!(vb.triangle_count(), 3);
        assert!(vb.indices.iter().all(|&i| (i as usize) < vb.vertex_count()));
        assert_eq!(vb.position(4), Some([0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_missing_attributes_zero_filled() {
        let (document, source) = two_primitive_fixture();
        let vb = build(&document, source, &ImportOptions::default()).unwrap();

        assert_eq!(vb.normals.len(), 7 * 3);
        assert_eq!(vb.normal(0), Some([0.0, 0.0, 1.0]));
        assert_eq!(vb.normal(5), Some([0.0, 0.0, 0.0]));
        assert_eq!(vb.uvs.len(), 7);
        assert!(vb.joints.is_empty());
        assert!(!vb.has_skinning());
    }

    #[test]
    fn test_uvs_flipped() {
        let (document, source) = two_primitive_fixture();
        let vb = build(&document, source, &ImportOptions::default()).unwrap();
        assert_eq!(vb.uvs[0], [0.0, 1.0]);
        assert_eq!(vb.uvs[3], [0.0, 0.75]);

        let (document, source) = two_primitive_fixture();
        let raw = build(&document, source, &ImportOptions::new().with_flip_uv(false)).unwrap();
        assert_eq!(raw.uvs[3], [0.0, 0.25]);
    }

    #[test]
    fn test_submesh_lookup() {
        let (document, source) = two_primitive_fixture();
        let vb = build(&document, source, &ImportOptions::default()).unwrap();

        assert_eq!(vb.submeshes.len(), 2);
        assert_eq!(vb.get_submesh_from_face(0).unwrap().primitive, 0);
        assert_eq!(vb.get_submesh_from_face(1).unwrap().primitive, 0);
        assert_eq!(vb.get_submesh_from_face(2).unwrap().primitive, 1);
        assert!(vb.get_submesh_from_face(3).is_none());
        assert_eq!(vb.material_for_face(2), Some(1));

        let second = &vb.submeshes[1];
        assert_eq!(second.vertex_offset, 4);
        assert_eq!(second.first_triangle(), 2);
        assert_eq!(second.triangle_count(), 1);
    }

    #[test]
    fn test_yup_to_zup_positions_and_normals() {
        let (document, source) = two_primitive_fixture();
        let vb = build(&document, source, &ImportOptions::new().with_yup_to_zup(true)).unwrap();
        // (0, 1, 0) -> (0, 0, 1)
        assert_eq!(vb.position(3), Some([0.0, 0.0, 1.0]));
        // normal (0, 0, 1) -> (0, -1, 0)
        assert_eq!(vb.normal(0), Some([0.0, -1.0, 0.0]));
    }

    fn single_primitive(primitive: serde_json::Value, accessors: serde_json::Value) -> Document {
        parse_value(&json!({
            "asset": {"version": "2.0"},
            "buffers": [{"uri": "mesh.bin", "byteLength": 64}],
            "bufferViews": [{"buffer": 0, "byteLength": 64}],
            "accessors": accessors,
            "meshes": [{"primitives": [primitive]}]
        }))
        .unwrap()
    }

    #[test]
    fn test_non_indexed_gets_sequential_indices() {
        let document = single_primitive(
            json!({"attributes": {"POSITION": 0}}),
            json!([{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"}]),
        );
        let source = MemorySource::new().with_file("mesh.bin", vec![0; 64]);
        let vb = build(&document, source, &ImportOptions::default()).unwrap();
        assert_eq!(vb.indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_missing_position() {
        let document = single_primitive(
            json!({"attributes": {"NORMAL": 0}}),
            json!([{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"}]),
        );
        let source = MemorySource::new().with_file("mesh.bin", vec![0; 64]);
        let err = build(&document, source, &ImportOptions::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingAttribute);
        assert!(err.to_string().contains("POSITION"));
    }

    #[test]
    fn test_attribute_length_mismatch() {
        let document = single_primitive(
            json!({"attributes": {"POSITION": 0, "NORMAL": 1}}),
            json!([
                {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"},
                {"bufferView": 0, "componentType": 5126, "count": 2, "type": "VEC3"}
            ]),
        );
        let source = MemorySource::new().with_file("mesh.bin", vec![0; 64]);
        match build(&document, source, &ImportOptions::default()) {
            Err(GltfError::AttributeLengthMismatch {
                attribute,
                expected,
                actual,
                ..
            }) => {
                assert_eq!(attribute, "NORMAL");
                assert_eq!((expected, actual), (3, 2));
            }
            other => panic!("expected AttributeLengthMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_index_past_vertex_count() {
        let mut data = vec![0u8; 36];
        data.extend(u16_bytes(&[0, 1, 3]));
        data.resize(64, 0);
        let document = single_primitive(
            json!({"attributes": {"POSITION": 0}, "indices": 1}),
            json!([
                {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"},
                {"bufferView": 0, "byteOffset": 36, "componentType": 5123, "count": 3, "type": "SCALAR"}
            ]),
        );
        let source = MemorySource::new().with_file("mesh.bin", data);
        let err = build(&document, source, &ImportOptions::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MalformedDocument);
    }

    #[test]
    fn test_non_triangle_topology() {
        let document = single_primitive(
            json!({"attributes": {"POSITION": 0}, "mode": 1}),
            json!([{"bufferView": 0, "componentType": 5126, "count": 2, "type": "VEC3"}]),
        );
        let source = MemorySource::new().with_file("mesh.bin", vec![0; 64]);
        let err = build(&document, source, &ImportOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            GltfError::UnsupportedTopology {
                mode: PrimitiveMode::Lines,
                ..
            }
        ));
    }
}
