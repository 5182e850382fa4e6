//! glTF 2.0 import sessions.
//!
//! A [`GltfReader`] owns everything one import needs: the parsed document,
//! the buffer cache and the options. [`GltfReader::import`] runs the decode
//! stages in order and either delivers a complete [`ImportedScene`] or fails
//! with the stage that broke; there are no partial results.
//!
//! ```ignore
//! use iogltf_core::TracingProgress;
//! use iogltf_io::GltfReader;
//!
//! let reader = GltfReader::open("models/robot.gltf")?;
//! let scene = reader.import(&mut TracingProgress::new())?;
//! for vb in &scene.vertex_buffers {
//!     println!("{:?}: {} vertices", vb.name, vb.vertex_count());
//! }
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use iogltf_core::gltf_types::MimeType;
use iogltf_core::{
    parse_slice, BufferCache, BufferResolver, Document, ErrorCode, GltfError, ImportOptions,
    NodeGraph, NodeGraphResolver, ProgressSink, VertexBuffer, VertexBufferBuilder,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::file_source::{decode_uri, FileSource};

// ============================================================================
// State and errors
// ============================================================================

/// Progress of an import session. Transitions are one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImportState {
    Unloaded,
    Parsed,
    BuffersResolved,
    MeshesDecoded,
    GraphResolved,
    Delivered,
}

impl ImportState {
    /// The state that follows this one.
    pub fn next(self) -> Option<ImportState> {
        match self {
            ImportState::Unloaded => Some(ImportState::Parsed),
            ImportState::Parsed => Some(ImportState::BuffersResolved),
            ImportState::BuffersResolved => Some(ImportState::MeshesDecoded),
            ImportState::MeshesDecoded => Some(ImportState::GraphResolved),
            ImportState::GraphResolved => Some(ImportState::Delivered),
            ImportState::Delivered => None,
        }
    }

    fn advance(&mut self, to: ImportState) {
        debug_assert_eq!(self.next(), Some(to));
        debug!(from = ?*self, to = ?to, "import state");
        *self = to;
    }
}

/// Pipeline stage an import failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStage {
    Parse,
    BufferResolve,
    AccessorDecode,
    GraphResolve,
}

impl ImportStage {
    pub const fn name(self) -> &'static str {
        match self {
            ImportStage::Parse => "parse",
            ImportStage::BufferResolve => "buffer-resolve",
            ImportStage::AccessorDecode => "accessor-decode",
            ImportStage::GraphResolve => "graph-resolve",
        }
    }
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors that end an import.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("glTF document not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("{stage} stage failed: {source}")]
    Failed {
        stage: ImportStage,
        #[source]
        source: GltfError,
    },
}

impl ImportError {
    fn at(stage: ImportStage) -> impl FnOnce(GltfError) -> ImportError {
        move |source| ImportError::Failed { stage, source }
    }

    pub fn stage(&self) -> Option<ImportStage> {
        match self {
            ImportError::NotFound(_) => None,
            ImportError::Failed { stage, .. } => Some(*stage),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ImportError::NotFound(_) => ErrorCode::IoFailure,
            ImportError::Failed { source, .. } => source.code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;

// ============================================================================
// Output
// ============================================================================

/// Where the texture collaborator finds an image's bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
    /// External file, not read during import.
    File {
        path: PathBuf,
        mime_type: Option<MimeType>,
    },
    /// Bytes stored in a buffer view.
    Embedded {
        bytes: Vec<u8>,
        mime_type: Option<MimeType>,
    },
}

impl ImageData {
    pub fn mime_type(&self) -> Option<MimeType> {
        match self {
            ImageData::File { mime_type, .. } | ImageData::Embedded { mime_type, .. } => *mime_type,
        }
    }
}

/// Everything a host needs to build its scene.
#[derive(Debug)]
pub struct ImportedScene {
    pub document: Document,
    pub graph: NodeGraph,
    /// One per document mesh, in document order.
    pub vertex_buffers: Vec<VertexBuffer>,
    /// One per document image, in document order.
    pub images: Vec<ImageData>,
}

impl ImportedScene {
    pub fn vertex_buffer(&self, mesh: usize) -> Option<&VertexBuffer> {
        self.vertex_buffers.get(mesh)
    }

    pub fn image(&self, index: usize) -> Option<&ImageData> {
        self.images.get(index)
    }
}

// ============================================================================
// Reader
// ============================================================================

/// One import of one `.gltf` document.
#[derive(Debug)]
pub struct GltfReader {
    path: Option<PathBuf>,
    base_dir: PathBuf,
    options: ImportOptions,
    document: Document,
    cache: BufferCache,
    state: ImportState,
}

impl GltfReader {
    /// Opens and parses a `.gltf` file with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, ImportOptions::default())
    }

    pub fn open_with_options<P: AsRef<Path>>(path: P, options: ImportOptions) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ImportError::NotFound(path.to_path_buf()));
        }

        let data = fs::read(path)
            .map_err(|source| GltfError::Io {
                path: path.to_path_buf(),
                source,
            })
            .map_err(ImportError::at(ImportStage::Parse))?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let mut reader = Self::from_slice(&data, base_dir, options)?;
        reader.path = Some(path.to_path_buf());
        Ok(reader)
    }

    /// Parses document bytes whose relative URIs resolve against `base_dir`.
    pub fn from_slice<P: AsRef<Path>>(json: &[u8], base_dir: P, options: ImportOptions) -> Result<Self> {
        let document = parse_slice(json).map_err(ImportError::at(ImportStage::Parse))?;
        Ok(Self::from_document(document, base_dir, options))
    }

    /// Starts a session over an already parsed document.
    pub fn from_document<P: AsRef<Path>>(document: Document, base_dir: P, options: ImportOptions) -> Self {
        let mut reader = Self {
            path: None,
            base_dir: base_dir.as_ref().to_path_buf(),
            options,
            document,
            cache: BufferCache::new(),
            state: ImportState::Unloaded,
        };
        reader.state.advance(ImportState::Parsed);
        reader
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn state(&self) -> ImportState {
        self.state
    }

    /// Runs every decode stage and hands the results over.
    ///
    /// Progress phases opened here are closed again whether or not the
    /// import succeeds.
    pub fn import(self, progress: &mut dyn ProgressSink) -> Result<ImportedScene> {
        progress.enter_substeps(3, "import glTF");
        let result = self.run_stages(progress);
        progress.leave_substeps();
        result
    }

    fn run_stages(self, progress: &mut dyn ProgressSink) -> Result<ImportedScene> {
        let GltfReader {
            base_dir,
            options,
            document,
            cache,
            mut state,
            ..
        } = self;

        let source = FileSource::new(&base_dir);
        let mut resolver = BufferResolver::new(&document, source, cache);

        let files = resolver
            .preload()
            .map_err(ImportError::at(ImportStage::BufferResolve))?;
        let images = resolve_images(&mut resolver, &base_dir)
            .map_err(ImportError::at(ImportStage::BufferResolve))?;
        debug!(files, images = images.len(), "buffers resolved");
        state.advance(ImportState::BuffersResolved);
        progress.step(Some("buffers"));

        let builder = VertexBufferBuilder::new(&options);
        let mesh_count = document.meshes.len();
        progress.enter_substeps(mesh_count, "meshes");
        let vertex_buffers = (0..mesh_count)
            .map(|mesh_index| {
                let vb = builder.build(&mut resolver, mesh_index)?;
                progress.step(vb.name.as_deref());
                Ok(vb)
            })
            .collect::<iogltf_core::Result<Vec<_>>>();
        progress.leave_substeps();
        let vertex_buffers = vertex_buffers.map_err(ImportError::at(ImportStage::AccessorDecode))?;
        state.advance(ImportState::MeshesDecoded);
        progress.step(Some("meshes"));

        let graph = NodeGraphResolver::new(&options)
            .resolve(&mut resolver)
            .map_err(ImportError::at(ImportStage::GraphResolve))?;
        state.advance(ImportState::GraphResolved);
        progress.step(Some("nodes"));

        drop(resolver);
        state.advance(ImportState::Delivered);
        info!(
            meshes = vertex_buffers.len(),
            nodes = graph.len(),
            skins = graph.skins().len(),
            images = images.len(),
            "glTF import complete"
        );
        Ok(ImportedScene {
            document,
            graph,
            vertex_buffers,
            images,
        })
    }
}

fn resolve_images(
    resolver: &mut BufferResolver<'_, FileSource>,
    base_dir: &Path,
) -> iogltf_core::Result<Vec<ImageData>> {
    let document = resolver.document();
    let mut images = Vec::with_capacity(document.images.len());
    for (i, image) in document.images.iter().enumerate() {
        let data = match (&image.uri, image.buffer_view) {
            (Some(uri), _) if uri.starts_with("data:") => {
                return Err(GltfError::unsupported("embedded data URI"));
            }
            (Some(uri), _) => ImageData::File {
                path: base_dir.join(decode_uri(uri)),
                mime_type: image.mime_type,
            },
            (None, Some(view)) => ImageData::Embedded {
                bytes: resolver.resolve(view)?.to_vec(),
                mime_type: image.mime_type,
            },
            (None, None) => {
                return Err(GltfError::malformed(
                    format!("images[{}]", i),
                    "image has neither uri nor bufferView",
                ));
            }
        };
        images.push(data);
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use iogltf_core::NoProgress;

    #[test]
    fn test_state_order() {
        let mut state = ImportState::Unloaded;
        let mut seen = vec![state];
        while let Some(next) = state.next() {
            assert!(next > state);
            seen.push(next);
            state = next;
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(state, ImportState::Delivered);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(ImportStage::BufferResolve.to_string(), "buffer-resolve");
        assert_eq!(ImportStage::AccessorDecode.name(), "accessor-decode");
    }

    #[test]
    fn test_missing_document() {
        let err = GltfReader::open("does/not/exist.gltf").unwrap_err();
        assert!(matches!(err, ImportError::NotFound(_)));
        assert_eq!(err.stage(), None);
        assert_eq!(err.code(), ErrorCode::IoFailure);
    }

    #[test]
    fn test_parse_failure_reports_stage() {
        let err = GltfReader::from_slice(b"{not json", ".", ImportOptions::default()).unwrap_err();
        assert_eq!(err.stage(), Some(ImportStage::Parse));
        assert_eq!(err.code(), ErrorCode::MalformedDocument);
        assert!(err.to_string().starts_with("parse stage failed"));
    }

    #[test]
    fn test_empty_document_imports() {
        let reader = GltfReader::from_slice(
            br#"{"asset": {"version": "2.0"}}"#,
            ".",
            ImportOptions::default(),
        )
        .unwrap();
        assert_eq!(reader.state(), ImportState::Parsed);
        let scene = reader.import(&mut NoProgress).unwrap();
        assert!(scene.vertex_buffers.is_empty());
        assert_eq!(scene.graph.len(), 1);
    }

    #[test]
    fn test_image_without_source_is_malformed() {
        let reader = GltfReader::from_slice(
            br#"{"asset": {"version": "2.0"}, "images": [{"name": "nothing"}]}"#,
            ".",
            ImportOptions::default(),
        )
        .unwrap();
        let err = reader.import(&mut NoProgress).unwrap_err();
        assert_eq!(err.stage(), Some(ImportStage::BufferResolve));
        assert!(err.to_string().contains("images[0]"));
    }
}
