//! Common traits for scene readers.
//!
//! Import the trait to access its methods generically:
//!
//! ```ignore
//! use iogltf_core::NoProgress;
//! use iogltf_io::{GltfReader, SceneReader};
//!
//! fn load<R: SceneReader>(path: &str) -> Result<ImportedScene, ImportError> {
//!     R::open(path)?.read_scene(&mut NoProgress)
//! }
//! ```

use std::path::Path;

use iogltf_core::ProgressSink;

use crate::gltf_reader::{GltfReader, ImportError, ImportedScene};

/// A format reader that produces a complete decoded scene.
pub trait SceneReader: Sized {
    /// Open a file for reading.
    fn open<P: AsRef<Path>>(path: P) -> Result<Self, ImportError>;

    /// Decode the whole scene, reporting progress to `progress`.
    fn read_scene(self, progress: &mut dyn ProgressSink) -> Result<ImportedScene, ImportError>;
}

impl SceneReader for GltfReader {
    fn open<P: AsRef<Path>>(path: P) -> Result<Self, ImportError> {
        GltfReader::open(path)
    }

    fn read_scene(self, progress: &mut dyn ProgressSink) -> Result<ImportedScene, ImportError> {
        self.import(progress)
    }
}
