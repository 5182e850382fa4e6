//! Per-import configuration.

use crate::math_utils::AxisConversion;

/// Dot-product threshold above which a child bone continues its parent.
pub const DEFAULT_CONNECT_THRESHOLD: f32 = 0.8;

/// Name given to the node synthesized when a document has several roots.
pub const DEFAULT_ROOT_NAME: &str = "__root__";

/// Options controlling one import.
///
/// ```
/// use iogltf_core::ImportOptions;
///
/// let options = ImportOptions::new()
///     .with_yup_to_zup(true)
///     .with_connect_threshold(0.9);
/// assert!(options.yup_to_zup);
/// assert!(options.flip_uv);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    /// Remap `(x, y, z)` to `(x, -z, y)` for geometry, transforms and bind
    /// matrices.
    pub yup_to_zup: bool,
    /// Convert texture coordinates to a bottom-left origin (`v' = 1 - v`).
    pub flip_uv: bool,
    /// See [`DEFAULT_CONNECT_THRESHOLD`].
    pub connect_threshold: f32,
    pub root_name: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            yup_to_zup: false,
            flip_uv: true,
            connect_threshold: DEFAULT_CONNECT_THRESHOLD,
            root_name: DEFAULT_ROOT_NAME.to_string(),
        }
    }
}

impl ImportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_yup_to_zup(mut self, enabled: bool) -> Self {
        self.yup_to_zup = enabled;
        self
    }

    pub fn with_flip_uv(mut self, enabled: bool) -> Self {
        self.flip_uv = enabled;
        self
    }

    pub fn with_connect_threshold(mut self, threshold: f32) -> Self {
        self.connect_threshold = threshold;
        self
    }

    pub fn with_root_name(mut self, name: impl Into<String>) -> Self {
        self.root_name = name.into();
        self
    }

    pub fn axis_conversion(&self) -> AxisConversion {
        AxisConversion::from_yup_to_zup(self.yup_to_zup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ImportOptions::default();
        assert!(!options.yup_to_zup);
        assert!(options.flip_uv);
        assert_eq!(options.connect_threshold, 0.8);
        assert_eq!(options.root_name, "__root__");
        assert_eq!(options.axis_conversion(), AxisConversion::None);
    }

    #[test]
    fn test_builder() {
        let options = ImportOptions::new()
            .with_yup_to_zup(true)
            .with_flip_uv(false)
            .with_root_name("scene_root");
        assert_eq!(options.axis_conversion(), AxisConversion::YUpToZUp);
        assert!(!options.flip_uv);
        assert_eq!(options.root_name, "scene_root");
    }
}
