//! Error handling for the glTF decode pipeline
//!
//! Every failure is terminal for the import that raised it. Errors carry the
//! offending entity (`"accessors[3]"`, `"meshes[0].primitives[1]"`, ...) so the
//! caller can report exactly where a document went wrong.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::gltf_types::{AccessorType, ComponentType, PrimitiveMode};

/// Error categories.
///
/// Several [`GltfError`] variants share a category; hosts that only care
/// about the broad class of failure can match on this instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Schema or field-level problem in the JSON document
    MalformedDocument,
    /// Valid glTF that this decoder deliberately does not handle
    UnsupportedFeature,
    /// A byte range reaches past the data that backs it
    AccessorOutOfBounds,
    /// A vertex attribute disagrees with POSITION on element count
    AttributeLengthMismatch,
    /// A required vertex attribute is absent
    MissingAttribute,
    /// A node is listed as a joint by more than one skin
    MultipleSkinMembership,
    /// Error when reading from storage
    IoFailure,
}

impl ErrorCode {
    /// Returns the name of this error code as a string
    pub const fn name(self) -> &'static str {
        match self {
            ErrorCode::MalformedDocument => "MALFORMED_DOCUMENT",
            ErrorCode::UnsupportedFeature => "UNSUPPORTED_FEATURE",
            ErrorCode::AccessorOutOfBounds => "ACCESSOR_OUT_OF_BOUNDS",
            ErrorCode::AttributeLengthMismatch => "ATTRIBUTE_LENGTH_MISMATCH",
            ErrorCode::MissingAttribute => "MISSING_ATTRIBUTE",
            ErrorCode::MultipleSkinMembership => "MULTIPLE_SKIN_MEMBERSHIP",
            ErrorCode::IoFailure => "IO_FAILURE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Errors that can occur while decoding a glTF document.
#[derive(Error, Debug)]
pub enum GltfError {
    #[error("malformed document at {entity}: {message}")]
    MalformedDocument { entity: String, message: String },

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("accessors[{accessor}]: unsupported accessor shape {accessor_type} of {component_type}")]
    UnsupportedAccessorShape {
        accessor: usize,
        accessor_type: AccessorType,
        component_type: ComponentType,
    },

    #[error("meshes[{mesh}].primitives[{primitive}]: unsupported topology {mode} (only TRIANGLES)")]
    UnsupportedTopology {
        mesh: usize,
        primitive: usize,
        mode: PrimitiveMode,
    },

    #[error("{entity}: byte range {start}..{end} exceeds the {available} bytes available")]
    AccessorOutOfBounds {
        entity: String,
        start: usize,
        end: usize,
        available: usize,
    },

    #[error("meshes[{mesh}].primitives[{primitive}]: {attribute} has {actual} elements but POSITION has {expected}")]
    AttributeLengthMismatch {
        mesh: usize,
        primitive: usize,
        attribute: String,
        expected: usize,
        actual: usize,
    },

    #[error("meshes[{mesh}].primitives[{primitive}]: missing attribute {attribute}")]
    MissingAttribute {
        mesh: usize,
        primitive: usize,
        attribute: String,
    },

    #[error("nodes[{node}] is a joint of both skins[{first}] and skins[{second}]")]
    MultipleSkinMembership {
        node: usize,
        first: usize,
        second: usize,
    },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl GltfError {
    /// Creates a malformed-document error for `entity`.
    pub fn malformed(entity: impl Into<String>, message: impl Into<String>) -> Self {
        GltfError::MalformedDocument {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported-feature error.
    pub fn unsupported(feature: impl Into<String>) -> Self {
        GltfError::UnsupportedFeature(feature.into())
    }

    /// Returns the category of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            GltfError::MalformedDocument { .. } => ErrorCode::MalformedDocument,
            GltfError::UnsupportedFeature(_)
            | GltfError::UnsupportedAccessorShape { .. }
            | GltfError::UnsupportedTopology { .. } => ErrorCode::UnsupportedFeature,
            GltfError::AccessorOutOfBounds { .. } => ErrorCode::AccessorOutOfBounds,
            GltfError::AttributeLengthMismatch { .. } => ErrorCode::AttributeLengthMismatch,
            GltfError::MissingAttribute { .. } => ErrorCode::MissingAttribute,
            GltfError::MultipleSkinMembership { .. } => ErrorCode::MultipleSkinMembership,
            GltfError::Io { .. } => ErrorCode::IoFailure,
        }
    }
}

pub type Result<T> = std::result::Result<T, GltfError>;
