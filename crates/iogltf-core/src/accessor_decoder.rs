//! Accessor decoding.
//!
//! Interprets an accessor's element range inside its buffer view as typed
//! little-endian records. Only the shapes meshes and skins actually use are
//! decoded:
//!
//! | type   | component                         | result            |
//! |--------|-----------------------------------|-------------------|
//! | SCALAR | UNSIGNED_BYTE                     | `u8`              |
//! | SCALAR | SHORT, UNSIGNED_SHORT             | `u16`             |
//! | SCALAR | UNSIGNED_INT                      | `u32`             |
//! | VEC2   | FLOAT                             | `[f32; 2]`        |
//! | VEC3   | FLOAT                             | `[f32; 3]`        |
//! | VEC4   | FLOAT                             | `[f32; 4]`        |
//! | VEC4   | UNSIGNED_BYTE                     | `[u8; 4]`         |
//! | VEC4   | UNSIGNED_SHORT                    | `[u16; 4]`        |
//! | MAT4   | FLOAT                             | `[f32; 16]`       |
//!
//! Any other combination is [`GltfError::UnsupportedAccessorShape`].

use byteorder::{ByteOrder, LittleEndian};
use num_traits::AsPrimitive;

use crate::buffer_resolver::{BufferResolver, BufferSource};
use crate::gltf_types::{AccessorType, ComponentType};
use crate::schema::Accessor;
use crate::status::{GltfError, Result};

/// Decoded accessor contents, one entry per element.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessorData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    Vec2F32(Vec<[f32; 2]>),
    Vec3F32(Vec<[f32; 3]>),
    Vec4F32(Vec<[f32; 4]>),
    Vec4U8(Vec<[u8; 4]>),
    Vec4U16(Vec<[u16; 4]>),
    Mat4F32(Vec<[f32; 16]>),
}

impl AccessorData {
    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            AccessorData::U8(v) => v.len(),
            AccessorData::U16(v) => v.len(),
            AccessorData::U32(v) => v.len(),
            AccessorData::Vec2F32(v) => v.len(),
            AccessorData::Vec3F32(v) => v.len(),
            AccessorData::Vec4F32(v) => v.len(),
            AccessorData::Vec4U8(v) => v.len(),
            AccessorData::Vec4U16(v) => v.len(),
            AccessorData::Mat4F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    U8,
    U16,
    U32,
    Vec2F32,
    Vec3F32,
    Vec4F32,
    Vec4U8,
    Vec4U16,
    Mat4F32,
}

fn layout_of(accessor: &Accessor, index: usize) -> Result<Layout> {
    use AccessorType as T;
    use ComponentType as C;

    let layout = match (accessor.accessor_type, accessor.component_type) {
        (T::Scalar, C::UnsignedByte) => Layout::U8,
        (T::Scalar, C::Short | C::UnsignedShort) => Layout::U16,
        (T::Scalar, C::UnsignedInt) => Layout::U32,
        (T::Vec2, C::Float) => Layout::Vec2F32,
        (T::Vec3, C::Float) => Layout::Vec3F32,
        (T::Vec4, C::Float) => Layout::Vec4F32,
        (T::Vec4, C::UnsignedByte) => Layout::Vec4U8,
        (T::Vec4, C::UnsignedShort) => Layout::Vec4U16,
        (T::Mat4, C::Float) => Layout::Mat4F32,
        (accessor_type, component_type) => {
            return Err(GltfError::UnsupportedAccessorShape {
                accessor: index,
                accessor_type,
                component_type,
            })
        }
    };
    Ok(layout)
}

/// Largest zero-filled accessor decoded without a buffer view.
pub const MAX_ZERO_FILL_BYTES: usize = 1 << 28;

/// Decodes `accessor` from the bytes of its buffer view.
///
/// `view` is the whole buffer view; the accessor's own `byteOffset` is applied
/// here. `byte_stride` is the view's stride, if any. An accessor without a
/// buffer view is decoded as zeros and `view` is ignored.
pub fn decode_slice(
    accessor: &Accessor,
    index: usize,
    view: &[u8],
    byte_stride: Option<usize>,
) -> Result<AccessorData> {
    let layout = layout_of(accessor, index)?;
    if accessor.sparse.is_some() {
        return Err(GltfError::unsupported("sparse accessor"));
    }

    if accessor.buffer_view.is_none() {
        match accessor.byte_length() {
            Some(len) if len <= MAX_ZERO_FILL_BYTES => {}
            len => {
                return Err(GltfError::AccessorOutOfBounds {
                    entity: format!("accessors[{}]", index),
                    start: 0,
                    end: len.unwrap_or(usize::MAX),
                    available: MAX_ZERO_FILL_BYTES,
                })
            }
        }
        let zeros = vec![0u8; accessor.element_size()];
        return Ok(read_layout(layout, &zeros, accessor.count, 0));
    }

    let element_size = accessor.element_size();
    let stride = match byte_stride {
        Some(stride) if stride < element_size => {
            return Err(GltfError::malformed(
                format!("accessors[{}]", index),
                format!(
                    "byteStride {} is smaller than the {}-byte element",
                    stride, element_size
                ),
            ))
        }
        Some(stride) => stride,
        None => element_size,
    };

    let start = accessor.byte_offset;
    let end = match accessor.count {
        0 => Some(0),
        count => (count - 1)
            .checked_mul(stride)
            .and_then(|n| n.checked_add(element_size)),
    }
    .and_then(|needed| start.checked_add(needed))
    .filter(|&end| end <= view.len());
    let end = match end {
        Some(end) => end,
        None => {
            return Err(GltfError::AccessorOutOfBounds {
                entity: format!("accessors[{}]", index),
                start,
                end: accessor
                    .count
                    .saturating_sub(1)
                    .saturating_mul(stride)
                    .saturating_add(element_size)
                    .saturating_add(start),
                available: view.len(),
            })
        }
    };

    Ok(read_layout(layout, &view[start..end], accessor.count, stride))
}

/// Reads `count` records from `data`. A stride of zero repeats the first one.
fn read_layout(layout: Layout, data: &[u8], count: usize, stride: usize) -> AccessorData {
    match layout {
        Layout::U8 => AccessorData::U8(read_scalars(data, count, stride, |b| b[0])),
        Layout::U16 => AccessorData::U16(read_scalars(data, count, stride, LittleEndian::read_u16)),
        Layout::U32 => AccessorData::U32(read_scalars(data, count, stride, LittleEndian::read_u32)),
        Layout::Vec2F32 => AccessorData::Vec2F32(read_records(data, count, stride, 4, LittleEndian::read_f32)),
        Layout::Vec3F32 => AccessorData::Vec3F32(read_records(data, count, stride, 4, LittleEndian::read_f32)),
        Layout::Vec4F32 => AccessorData::Vec4F32(read_records(data, count, stride, 4, LittleEndian::read_f32)),
        Layout::Vec4U8 => AccessorData::Vec4U8(read_records(data, count, stride, 1, |b| b[0])),
        Layout::Vec4U16 => AccessorData::Vec4U16(read_records(data, count, stride, 2, LittleEndian::read_u16)),
        Layout::Mat4F32 => AccessorData::Mat4F32(read_records(data, count, stride, 4, LittleEndian::read_f32)),
    }
}

fn read_scalars<T>(data: &[u8], count: usize, stride: usize, read: impl Fn(&[u8]) -> T) -> Vec<T> {
    (0..count).map(|i| read(&data[i * stride..])).collect()
}

fn read_records<T, const N: usize>(
    data: &[u8],
    count: usize,
    stride: usize,
    component_size: usize,
    read: impl Fn(&[u8]) -> T,
) -> Vec<[T; N]> {
    (0..count)
        .map(|i| {
            let record = &data[i * stride..];
            std::array::from_fn(|c| read(&record[c * component_size..]))
        })
        .collect()
}

/// Decodes accessors of one document through a [`BufferResolver`].
pub struct AccessorDecoder<'a, 'd, S> {
    resolver: &'a mut BufferResolver<'d, S>,
}

impl<'a, 'd, S: BufferSource> AccessorDecoder<'a, 'd, S> {
    pub fn new(resolver: &'a mut BufferResolver<'d, S>) -> Self {
        Self { resolver }
    }

    /// Decodes accessor `index` according to the table in the module docs.
    pub fn decode(&mut self, index: usize) -> Result<AccessorData> {
        let document = self.resolver.document();
        let accessor = document.accessor(index)?;
        match accessor.buffer_view {
            None => decode_slice(accessor, index, &[], None),
            Some(view_index) => {
                let stride = document.buffer_view(view_index)?.byte_stride;
                let view = self.resolver.resolve(view_index)?;
                decode_slice(accessor, index, view, stride)
            }
        }
    }

    /// Index data of any unsigned scalar width, widened to `u32`.
    pub fn decode_indices(&mut self, index: usize) -> Result<Vec<u32>> {
        match self.decode(index)? {
            AccessorData::U8(v) => Ok(widen(&v)),
            AccessorData::U16(v) => Ok(widen(&v)),
            AccessorData::U32(v) => Ok(v),
            _ => Err(self.shape_error(index)),
        }
    }

    pub fn decode_vec2(&mut self, index: usize) -> Result<Vec<[f32; 2]>> {
        match self.decode(index)? {
            AccessorData::Vec2F32(v) => Ok(v),
            _ => Err(self.shape_error(index)),
        }
    }

    pub fn decode_vec3(&mut self, index: usize) -> Result<Vec<[f32; 3]>> {
        match self.decode(index)? {
            AccessorData::Vec3F32(v) => Ok(v),
            _ => Err(self.shape_error(index)),
        }
    }

    pub fn decode_vec4(&mut self, index: usize) -> Result<Vec<[f32; 4]>> {
        match self.decode(index)? {
            AccessorData::Vec4F32(v) => Ok(v),
            _ => Err(self.shape_error(index)),
        }
    }

    /// Joint indices, widened to `u16`.
    pub fn decode_joints(&mut self, index: usize) -> Result<Vec<[u16; 4]>> {
        match self.decode(index)? {
            AccessorData::Vec4U16(v) => Ok(v),
            AccessorData::Vec4U8(v) => Ok(v.iter().map(|j| j.map(u16::from)).collect()),
            _ => Err(self.shape_error(index)),
        }
    }

    pub fn decode_mat4(&mut self, index: usize) -> Result<Vec<[f32; 16]>> {
        match self.decode(index)? {
            AccessorData::Mat4F32(v) => Ok(v),
            _ => Err(self.shape_error(index)),
        }
    }

    fn shape_error(&self, index: usize) -> GltfError {
        match self.resolver.document().accessor(index) {
            Ok(accessor) => GltfError::UnsupportedAccessorShape {
                accessor: index,
                accessor_type: accessor.accessor_type,
                component_type: accessor.component_type,
            },
            Err(err) => err,
        }
    }
}

fn widen<T: AsPrimitive<u32>>(values: &[T]) -> Vec<u32> {
    values.iter().map(|v| v.as_()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer_resolver::{BufferCache, MemorySource};
    use crate::document_parser::parse_value;
    use crate::ErrorCode;
    use serde_json::{json, Value};

    fn accessor(value: Value) -> Accessor {
        serde_json::from_value(value).unwrap()
    }

    fn floats(values: &[f32]) -> Vec<u8> {
        let mut bytes = vec![0u8; values.len() * 4];
        LittleEndian::write_f32_into(values, &mut bytes);
        bytes
    }

    #[test]
    fn test_vec3_float_from_ten_floats() {
        let data = floats(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        let acc = accessor(json!({
            "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"
        }));
        let decoded = decode_slice(&acc, 0, &data, None).unwrap();
        assert_eq!(
            decoded,
            AccessorData::Vec3F32(vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]])
        );
        assert_eq!(decoded.len(), acc.count);
    }

    #[test]
    fn test_huge_count_is_out_of_bounds() {
        let acc = accessor(json!({
            "bufferView": 0, "componentType": 5126, "count": 1u64 << 62, "type": "VEC3"
        }));
        let err = decode_slice(&acc, 4, &[0u8; 64], None).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccessorOutOfBounds);
        assert!(err.to_string().contains("accessors[4]"));

        // Strided and offset ranges overflow the same way
        let acc = accessor(json!({
            "bufferView": 0, "byteOffset": 8, "componentType": 5126,
            "count": 1u64 << 60, "type": "VEC3"
        }));
        let err = decode_slice(&acc, 0, &[0u8; 64], Some(16)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccessorOutOfBounds);
        assert_eq!(acc.byte_length(), Some(12usize << 60));
    }

    #[test]
    fn test_huge_zero_filled_accessor_is_rejected() {
        let acc = accessor(json!({"componentType": 5126, "count": 1u64 << 62, "type": "MAT4"}));
        assert_eq!(acc.byte_length(), None);
        let err = decode_slice(&acc, 0, &[], None).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccessorOutOfBounds);

        let acc = accessor(json!({"componentType": 5126, "count": 4, "type": "VEC2"}));
        assert_eq!(
            decode_slice(&acc, 0, &[], None).unwrap(),
            AccessorData::Vec2F32(vec![[0.0; 2]; 4])
        );
    }

    #[test]
    fn test_scalar_widths() {
        let acc = accessor(json!({
            "bufferView": 0, "componentType": 5123, "count": 3, "type": "SCALAR"
        }));
        let data = [1u8, 0, 2, 0, 0, 1];
        assert_eq!(
            decode_slice(&acc, 0, &data, None).unwrap(),
            AccessorData::U16(vec![1, 2, 256])
        );

        let acc = accessor(json!({
            "bufferView": 0, "componentType": 5125, "count": 1, "type": "SCALAR"
        }));
        assert_eq!(
            decode_slice(&acc, 0, &[0x78, 0x56, 0x34, 0x12], None).unwrap(),
            AccessorData::U32(vec![0x1234_5678])
        );
    }

    #[test]
    fn test_byte_offset_and_stride() {
        // Interleaved [pos.xyz, pad] records; the accessor starts at the second float.
        let data = floats(&[0.0, 1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0]);
        let acc = accessor(json!({
            "bufferView": 0, "byteOffset": 4, "componentType": 5126, "count": 2, "type": "VEC2"
        }));
        assert_eq!(
            decode_slice(&acc, 0, &data, Some(16)).unwrap(),
            AccessorData::Vec2F32(vec![[1.0, 2.0], [4.0, 5.0]])
        );
    }

    #[test]
    fn test_range_past_view_is_out_of_bounds() {
        let data = floats(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let acc = accessor(json!({
            "bufferView": 0, "componentType": 5126, "count": 2, "type": "VEC3"
        }));
        match decode_slice(&acc, 7, &data, None) {
            Err(GltfError::AccessorOutOfBounds {
                entity, end, available, ..
            }) => {
                assert_eq!(entity, "accessors[7]");
                assert_eq!((end, available), (24, 20));
            }
            other => panic!("expected AccessorOutOfBounds, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_shape() {
        let acc = accessor(json!({
            "bufferView": 0, "componentType": 5126, "count": 1, "type": "MAT3"
        }));
        let err = decode_slice(&acc, 2, &[0; 36], None).unwrap_err();
        assert_eq!(err.to_string(), "accessors[2]: unsupported accessor shape MAT3 of FLOAT");
    }

    #[test]
    fn test_sparse_unsupported() {
        let acc = accessor(json!({
            "bufferView": 0, "componentType": 5126, "count": 1, "type": "VEC3",
            "sparse": {
                "count": 1,
                "indices": {"bufferView": 0, "componentType": 5123},
                "values": {"bufferView": 0}
            }
        }));
        let err = decode_slice(&acc, 0, &[0; 12], None).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnsupportedFeature);
    }

    #[test]
    fn test_missing_buffer_view_is_zero_filled() {
        let acc = accessor(json!({"componentType": 5126, "count": 2, "type": "VEC4"}));
        assert_eq!(
            decode_slice(&acc, 0, &[], None).unwrap(),
            AccessorData::Vec4F32(vec![[0.0; 4]; 2])
        );
    }

    #[test]
    fn test_stride_smaller_than_element() {
        let acc = accessor(json!({
            "bufferView": 0, "componentType": 5126, "count": 2, "type": "VEC3"
        }));
        let err = decode_slice(&acc, 0, &[0; 24], Some(8)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MalformedDocument);
    }

    #[test]
    fn test_decoder_typed_helpers() {
        let mut bytes = vec![0u8, 1, 2, 255];
        bytes.extend(floats(&[0.5, 0.25]));
        let document = parse_value(&json!({
            "asset": {"version": "2.0"},
            "buffers": [{"uri": "a.bin", "byteLength": 12}],
            "bufferViews": [
                {"buffer": 0, "byteLength": 4},
                {"buffer": 0, "byteOffset": 4, "byteLength": 8}
            ],
            "accessors": [
                {"bufferView": 0, "componentType": 5121, "count": 4, "type": "SCALAR"},
                {"bufferView": 0, "componentType": 5121, "count": 1, "type": "VEC4"},
                {"bufferView": 1, "componentType": 5126, "count": 1, "type": "VEC2"}
            ]
        }))
        .unwrap();
        let source = MemorySource::new().with_file("a.bin", bytes);
        let mut resolver = BufferResolver::new(&document, source, BufferCache::new());
        let mut decoder = AccessorDecoder::new(&mut resolver);

        assert_eq!(decoder.decode_indices(0).unwrap(), vec![0, 1, 2, 255]);
        assert_eq!(decoder.decode_joints(1).unwrap(), vec![[0, 1, 2, 255]]);
        assert_eq!(decoder.decode_vec2(2).unwrap(), vec![[0.5, 0.25]]);

        let err = decoder.decode_vec3(2).unwrap_err();
        assert!(matches!(err, GltfError::UnsupportedAccessorShape { accessor: 2, .. }));
    }
}
