//! iogltf I/O library.
//!
//! Runs the `iogltf-core` decode pipeline against `.gltf` files on disk:
//! buffer URIs resolve relative to the document, and each import is one
//! [`GltfReader`] session with its own buffer cache.

pub mod file_source;
pub mod gltf_reader;
pub mod traits;

pub use file_source::FileSource;
pub use gltf_reader::{
    GltfReader, ImageData, ImportError, ImportStage, ImportState, ImportedScene,
};
pub use traits::SceneReader;
