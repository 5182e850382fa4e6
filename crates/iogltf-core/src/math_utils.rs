//! Coordinate conventions and transform helpers.

use glam::{Mat4, Quat, Vec3};

/// Flips a texture coordinate from glTF's top-left origin to a bottom-left
/// origin: `v' = 1 - v`. Applying it twice is the identity.
pub fn flip_v(uv: [f32; 2]) -> [f32; 2] {
    [uv[0], 1.0 - uv[1]]
}

/// Axis remap applied to imported geometry and transforms.
///
/// `YUpToZUp` maps `(x, y, z)` to `(x, -z, y)`, a +90° rotation about X.
/// It is not an involution: applying it twice yields `(x, -y, -z)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisConversion {
    #[default]
    None,
    YUpToZUp,
}

impl AxisConversion {
    pub fn from_yup_to_zup(enabled: bool) -> Self {
        if enabled {
            AxisConversion::YUpToZUp
        } else {
            AxisConversion::None
        }
    }

    /// Converts a position or direction.
    pub fn point(self, v: [f32; 3]) -> [f32; 3] {
        match self {
            AxisConversion::None => v,
            AxisConversion::YUpToZUp => [v[0], -v[2], v[1]],
        }
    }

    pub fn vec3(self, v: Vec3) -> Vec3 {
        Vec3::from_array(self.point(v.to_array()))
    }

    /// Converts a rotation by remapping its axis; the angle is unchanged.
    pub fn rotation(self, q: Quat) -> Quat {
        match self {
            AxisConversion::None => q,
            AxisConversion::YUpToZUp => Quat::from_xyzw(q.x, -q.z, q.y, q.w),
        }
    }

    /// Converts a per-axis scale; magnitudes follow their axes.
    pub fn scale(self, s: Vec3) -> Vec3 {
        match self {
            AxisConversion::None => s,
            AxisConversion::YUpToZUp => Vec3::new(s.x, s.z, s.y),
        }
    }

    /// Converts a full transform: `C * m * C⁻¹`.
    pub fn matrix(self, m: Mat4) -> Mat4 {
        match self {
            AxisConversion::None => m,
            AxisConversion::YUpToZUp => {
                let basis = self.basis();
                basis * m * basis.transpose()
            }
        }
    }

    /// Up axis of the target coordinate system.
    pub fn up(self) -> Vec3 {
        match self {
            AxisConversion::None => Vec3::Y,
            AxisConversion::YUpToZUp => Vec3::Z,
        }
    }

    fn basis(self) -> Mat4 {
        match self {
            AxisConversion::None => Mat4::IDENTITY,
            AxisConversion::YUpToZUp => Mat4::from_cols(
                Vec3::X.extend(0.0),
                Vec3::Z.extend(0.0),
                Vec3::NEG_Y.extend(0.0),
                glam::Vec4::W,
            ),
        }
    }
}

/// Splits a column-major affine matrix into translation, rotation and scale.
///
/// A negative determinant (mirroring) is folded into the X scale. A matrix
/// with a collapsed axis has no recoverable rotation; identity is used.
pub fn decompose(matrix: &[f32; 16]) -> (Vec3, Quat, Vec3) {
    let m = Mat4::from_cols_array(matrix);
    let translation = m.w_axis.truncate();

    let lengths = Vec3::new(
        m.x_axis.truncate().length(),
        m.y_axis.truncate().length(),
        m.z_axis.truncate().length(),
    );
    if lengths.min_element() <= f32::MIN_POSITIVE || m.determinant() == 0.0 {
        return (translation, Quat::IDENTITY, lengths);
    }

    let (scale, rotation, translation) = m.to_scale_rotation_translation();
    (translation, rotation.normalize(), scale)
}
