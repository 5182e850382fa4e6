//! iogltf Core Library
//!
//! Decodes glTF 2.0 documents into typed data a 3D host application can build
//! its scene from: the parsed schema, merged per-mesh vertex buffers and a
//! resolved node hierarchy with skins and skeletons.
//!
//! ```
//! use iogltf_core::{parse_str, BufferCache, BufferResolver, ImportOptions, MemorySource, NodeGraphResolver};
//!
//! let document = parse_str(r#"{"asset": {"version": "2.0"}, "nodes": [{"name": "root"}]}"#)?;
//! let mut resolver = BufferResolver::new(&document, MemorySource::new(), BufferCache::new());
//! let graph = NodeGraphResolver::new(&ImportOptions::default()).resolve(&mut resolver)?;
//! assert_eq!(graph.node(graph.root()).unwrap().name.as_deref(), Some("root"));
//! # Ok::<(), iogltf_core::GltfError>(())
//! ```

// =============================================================================
// Schema and parsing
// =============================================================================

pub mod document_parser;
pub mod gltf_types;
pub mod property_bag;
pub mod schema;
pub mod status;

// =============================================================================
// Decoding
// =============================================================================

pub mod accessor_decoder;
pub mod buffer_resolver;
pub mod import_options;
pub mod math_utils;
pub mod node_graph;
pub mod progress;
pub mod skeleton;
pub mod vertex_buffer;

// =============================================================================
// Re-exports
// =============================================================================

pub use accessor_decoder::{AccessorData, AccessorDecoder};
pub use buffer_resolver::{BufferCache, BufferResolver, BufferSource, MemorySource};
pub use document_parser::{parse_slice, parse_str, parse_value};
pub use gltf_types::{AccessorType, ComponentType, PrimitiveMode};
pub use import_options::ImportOptions;
pub use math_utils::AxisConversion;
pub use node_graph::{GraphNode, HostHandle, LocalTransform, NodeGraph, NodeGraphResolver, NodeId};
pub use progress::{NoProgress, ProgressSink, TracingProgress};
pub use property_bag::PropertyBag;
pub use schema::Document;
pub use skeleton::{Bone, ResolvedSkin, Skeleton};
pub use status::{ErrorCode, GltfError, Result};
pub use vertex_buffer::{Submesh, VertexBuffer, VertexBufferBuilder};
