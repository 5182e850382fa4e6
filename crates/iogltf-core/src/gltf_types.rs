//! Enumerations of the glTF 2.0 schema.
//!
//! Numeric enumerations are decoded from their GL codes, string enumerations
//! from their literals. Any other value fails deserialization with a message
//! naming the field and the offending value.

use std::fmt;

use serde::Deserialize;

macro_rules! gl_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($variant:ident = $code:literal => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
        #[serde(try_from = "u32")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Returns the GL enum code.
            pub const fn code(self) -> u32 {
                match self {
                    $($name::$variant => $code),+
                }
            }

            /// Returns the GL constant name.
            pub const fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl TryFrom<u32> for $name {
            type Error = String;

            fn try_from(value: u32) -> Result<Self, Self::Error> {
                match value {
                    $($code => Ok($name::$variant),)+
                    other => Err(format!("{}: unrecognized value {}", $field, other)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

macro_rules! literal_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($variant:ident => $literal:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
        #[serde(try_from = "String")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Returns the literal used in the JSON document.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $literal),+
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                match value.as_str() {
                    $($literal => Ok($name::$variant),)+
                    other => Err(format!("{}: unrecognized value \"{}\"", $field, other)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

gl_enum! {
    /// Data type of an accessor component.
    ComponentType, "componentType" {
        Byte = 5120 => "BYTE",
        UnsignedByte = 5121 => "UNSIGNED_BYTE",
        Short = 5122 => "SHORT",
        UnsignedShort = 5123 => "UNSIGNED_SHORT",
        UnsignedInt = 5125 => "UNSIGNED_INT",
        Float = 5126 => "FLOAT",
    }
}

impl ComponentType {
    /// Size of one component in bytes.
    pub const fn size(self) -> usize {
        match self {
            ComponentType::Byte | ComponentType::UnsignedByte => 1,
            ComponentType::Short | ComponentType::UnsignedShort => 2,
            ComponentType::UnsignedInt | ComponentType::Float => 4,
        }
    }
}

gl_enum! {
    /// Intended GPU buffer binding of a buffer view.
    BufferTarget, "target" {
        ArrayBuffer = 34962 => "ARRAY_BUFFER",
        ElementArrayBuffer = 34963 => "ELEMENT_ARRAY_BUFFER",
    }
}

gl_enum! {
    /// Topology of a mesh primitive.
    PrimitiveMode, "mode" {
        Points = 0 => "POINTS",
        Lines = 1 => "LINES",
        LineLoop = 2 => "LINE_LOOP",
        LineStrip = 3 => "LINE_STRIP",
        Triangles = 4 => "TRIANGLES",
        TriangleStrip = 5 => "TRIANGLE_STRIP",
        TriangleFan = 6 => "TRIANGLE_FAN",
    }
}

impl Default for PrimitiveMode {
    fn default() -> Self {
        PrimitiveMode::Triangles
    }
}

gl_enum! {
    /// Magnification filter of a sampler.
    MagFilter, "magFilter" {
        Nearest = 9728 => "NEAREST",
        Linear = 9729 => "LINEAR",
    }
}

gl_enum! {
    /// Minification filter of a sampler.
    MinFilter, "minFilter" {
        Nearest = 9728 => "NEAREST",
        Linear = 9729 => "LINEAR",
        NearestMipmapNearest = 9984 => "NEAREST_MIPMAP_NEAREST",
        LinearMipmapNearest = 9985 => "LINEAR_MIPMAP_NEAREST",
        NearestMipmapLinear = 9986 => "NEAREST_MIPMAP_LINEAR",
        LinearMipmapLinear = 9987 => "LINEAR_MIPMAP_LINEAR",
    }
}

gl_enum! {
    /// Texture coordinate wrapping mode (`wrapS` / `wrapT`).
    WrapMode, "wrapS/wrapT" {
        ClampToEdge = 33071 => "CLAMP_TO_EDGE",
        MirroredRepeat = 33648 => "MIRRORED_REPEAT",
        Repeat = 10497 => "REPEAT",
    }
}

impl Default for WrapMode {
    fn default() -> Self {
        WrapMode::Repeat
    }
}

literal_enum! {
    /// Element type of an accessor.
    AccessorType, "type" {
        Scalar => "SCALAR",
        Vec2 => "VEC2",
        Vec3 => "VEC3",
        Vec4 => "VEC4",
        Mat2 => "MAT2",
        Mat3 => "MAT3",
        Mat4 => "MAT4",
    }
}

impl AccessorType {
    /// Number of components in one element.
    pub const fn component_count(self) -> usize {
        match self {
            AccessorType::Scalar => 1,
            AccessorType::Vec2 => 2,
            AccessorType::Vec3 => 3,
            AccessorType::Vec4 | AccessorType::Mat2 => 4,
            AccessorType::Mat3 => 9,
            AccessorType::Mat4 => 16,
        }
    }
}

literal_enum! {
    /// Alpha rendering mode of a material.
    AlphaMode, "alphaMode" {
        Opaque => "OPAQUE",
        Mask => "MASK",
        Blend => "BLEND",
    }
}

impl Default for AlphaMode {
    fn default() -> Self {
        AlphaMode::Opaque
    }
}

literal_enum! {
    /// Image MIME type.
    MimeType, "mimeType" {
        ImageJpeg => "image/jpeg",
        ImagePng => "image/png",
    }
}

literal_enum! {
    /// Projection kind of a camera.
    CameraType, "type" {
        Perspective => "perspective",
        Orthographic => "orthographic",
    }
}

literal_enum! {
    /// Keyframe interpolation of an animation sampler.
    Interpolation, "interpolation" {
        Linear => "LINEAR",
        Step => "STEP",
        CubicSpline => "CUBICSPLINE",
    }
}

impl Default for Interpolation {
    fn default() -> Self {
        Interpolation::Linear
    }
}

literal_enum! {
    /// Node property targeted by an animation channel.
    TargetPath, "path" {
        Translation => "translation",
        Rotation => "rotation",
        Scale => "scale",
        Weights => "weights",
    }
}
