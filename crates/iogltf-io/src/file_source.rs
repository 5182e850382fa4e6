//! Buffer files next to a `.gltf` document.

use std::fs;
use std::path::{Path, PathBuf};

use iogltf_core::status::{GltfError, Result};
use iogltf_core::BufferSource;
use tracing::trace;

/// Reads buffer URIs as paths relative to a base directory.
#[derive(Debug, Clone)]
pub struct FileSource {
    base_dir: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Filesystem path a relative URI refers to.
    pub fn path_for(&self, uri: &str) -> PathBuf {
        self.base_dir.join(decode_uri(uri))
    }
}

impl BufferSource for FileSource {
    fn load(&self, uri: &str) -> Result<Vec<u8>> {
        let path = self.path_for(uri);
        trace!(path = %path.display(), "reading buffer file");
        fs::read(&path).map_err(|source| GltfError::Io { path, source })
    }
}

/// Percent-decodes a URI reference into a path string.
pub fn decode_uri(uri: &str) -> String {
    String::from_utf8_lossy(&percent_decode(uri)).into_owned()
}

fn percent_decode(input: &str) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(h), Some(l)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                output.push((h << 4) | l);
                i += 3;
                continue;
            }
        }
        output.push(bytes[i]);
        i += 1;
    }

    output
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iogltf_core::ErrorCode;

    #[test]
    fn test_decode_uri() {
        assert_eq!(decode_uri("my%20mesh.bin"), "my mesh.bin");
        assert_eq!(decode_uri("sub/dir/a.bin"), "sub/dir/a.bin");
        // Trailing escape is decoded; malformed escapes pass through
        assert_eq!(decode_uri("a%41"), "aA");
        assert_eq!(decode_uri("100%"), "100%");
        assert_eq!(decode_uri("%zz"), "%zz");
    }

    #[test]
    fn test_path_for_joins_base() {
        let source = FileSource::new("/models/robot");
        assert_eq!(
            source.path_for("parts%20v2/body.bin"),
            Path::new("/models/robot/parts v2/body.bin")
        );
    }

    #[test]
    fn test_missing_file_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource::new(dir.path());
        let err = source.load("missing.bin").unwrap_err();
        assert_eq!(err.code(), ErrorCode::IoFailure);
        assert!(err.to_string().contains("missing.bin"));
    }
}
