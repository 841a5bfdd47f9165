//! Type System
//!
//! Enumerates every source element type the client can hand the bridge
//! (scalars, vectors, SRGB-encoded byte colors, integer pairs, float
//! matrices) and maps each to the USD attribute value type it can be
//! authored as. Sizes are always derived from `(scalar_kind, component
//! count)`, never stored redundantly.

use crate::errors::{BridgeError, Result};

/// The scalar storage kind underlying a source element, independent of
/// how many components it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    Half,
    Float,
    Double,
}

impl ScalarKind {
    /// Size in bytes of a single scalar of this kind.
    #[must_use]
    pub fn byte_size(self) -> usize {
        match self {
            ScalarKind::Bool | ScalarKind::U8 | ScalarKind::I8 => 1,
            ScalarKind::U16 | ScalarKind::I16 | ScalarKind::Half => 2,
            ScalarKind::U32 | ScalarKind::I32 | ScalarKind::Float => 4,
            ScalarKind::U64 | ScalarKind::I64 | ScalarKind::Double => 8,
        }
    }

    #[must_use]
    pub fn is_integer(self) -> bool {
        !matches!(self, ScalarKind::Half | ScalarKind::Float | ScalarKind::Double)
    }

    #[must_use]
    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            ScalarKind::Bool | ScalarKind::U8 | ScalarKind::U16 | ScalarKind::U32 | ScalarKind::U64
        )
    }

    /// Maximum representable value, used when normalizing unsigned
    /// integer sources into `[0, 1]` float ranges.
    #[must_use]
    pub fn integer_max(self) -> f64 {
        match self {
            ScalarKind::U8 => u8::MAX as f64,
            ScalarKind::U16 => u16::MAX as f64,
            ScalarKind::U32 => u32::MAX as f64,
            ScalarKind::U64 => u64::MAX as f64,
            ScalarKind::I8 => i8::MAX as f64,
            ScalarKind::I16 => i16::MAX as f64,
            ScalarKind::I32 => i32::MAX as f64,
            ScalarKind::I64 => i64::MAX as f64,
            _ => 1.0,
        }
    }
}

/// A fully-qualified source element type: scalar kind, component shape,
/// and (for byte vectors) whether the channel data is SRGB-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceType {
    Scalar(ScalarKind),
    Vec2(ScalarKind),
    Vec3(ScalarKind),
    Vec4(ScalarKind),
    /// 1-4 channel SRGB-encoded byte color; channel count given directly.
    Srgb(u8),
    /// A pair of 32-bit integers, used for edge/segment index pairs.
    IntPair,
    Mat2,
    Mat3,
    Mat4,
    Mat2x3,
    Mat3x4,
}

impl SourceType {
    /// Number of scalar components carried by one element.
    #[must_use]
    pub fn component_count(self) -> usize {
        match self {
            SourceType::Scalar(_) => 1,
            SourceType::Vec2(_) => 2,
            SourceType::Vec3(_) => 3,
            SourceType::Vec4(_) => 4,
            SourceType::Srgb(n) => n as usize,
            SourceType::IntPair => 2,
            SourceType::Mat2 => 4,
            SourceType::Mat3 => 9,
            SourceType::Mat4 => 16,
            SourceType::Mat2x3 => 6,
            SourceType::Mat3x4 => 12,
        }
    }

    /// The scalar kind underlying a single component, where defined.
    #[must_use]
    pub fn scalar_kind(self) -> Option<ScalarKind> {
        match self {
            SourceType::Scalar(k) | SourceType::Vec2(k) | SourceType::Vec3(k) | SourceType::Vec4(k) => {
                Some(k)
            }
            SourceType::Srgb(_) => Some(ScalarKind::U8),
            SourceType::IntPair => Some(ScalarKind::I32),
            SourceType::Mat2 | SourceType::Mat3 | SourceType::Mat4 | SourceType::Mat2x3 | SourceType::Mat3x4 => {
                Some(ScalarKind::Float)
            }
        }
    }

    #[must_use]
    pub fn is_srgb_encoded(self) -> bool {
        matches!(self, SourceType::Srgb(_))
    }

    /// Total byte size of one element, derived from component count and
    /// scalar size. Never stored, only computed.
    #[must_use]
    pub fn byte_size(self) -> usize {
        self.component_count() * self.scalar_kind().map_or(4, ScalarKind::byte_size)
    }

    /// Strips vector/matrix shape, returning the scalar-only equivalent
    /// type (`flatten` in spec.md §4.1).
    #[must_use]
    pub fn flatten(self) -> SourceType {
        match self.scalar_kind() {
            Some(k) => SourceType::Scalar(k),
            None => self,
        }
    }
}

/// The destination USD attribute value type. A strict subset of USD's
/// `SdfValueTypeNames`, restricted to what the writer ever authors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsdValueType {
    Bool,
    UChar,
    Int,
    Int64,
    UInt,
    UInt64,
    Half,
    Float,
    Double,
    Float2,
    Float3,
    Float4,
    Point3f,
    Normal3f,
    Color3f,
    Int2,
    Matrix2d,
    Matrix3d,
    Matrix4d,
    Quatf,
    Token,
    Asset,
}

impl UsdValueType {
    #[must_use]
    pub fn component_count(self) -> usize {
        match self {
            UsdValueType::Bool
            | UsdValueType::UChar
            | UsdValueType::Int
            | UsdValueType::Int64
            | UsdValueType::UInt
            | UsdValueType::UInt64
            | UsdValueType::Half
            | UsdValueType::Float
            | UsdValueType::Double
            | UsdValueType::Token
            | UsdValueType::Asset => 1,
            UsdValueType::Float2 | UsdValueType::Int2 => 2,
            UsdValueType::Float3 | UsdValueType::Point3f | UsdValueType::Normal3f | UsdValueType::Color3f => 3,
            UsdValueType::Float4 | UsdValueType::Quatf => 4,
            UsdValueType::Matrix2d => 4,
            UsdValueType::Matrix3d => 9,
            UsdValueType::Matrix4d => 16,
        }
    }

    /// The USD attribute type name token, as it would appear in a `.usda` file.
    #[must_use]
    pub fn usda_name(self) -> &'static str {
        match self {
            UsdValueType::Bool => "bool",
            UsdValueType::UChar => "uchar",
            UsdValueType::Int => "int",
            UsdValueType::Int64 => "int64",
            UsdValueType::UInt => "uint",
            UsdValueType::UInt64 => "uint64",
            UsdValueType::Half => "half",
            UsdValueType::Float => "float",
            UsdValueType::Double => "double",
            UsdValueType::Float2 => "float2",
            UsdValueType::Float3 => "float3",
            UsdValueType::Float4 => "float4",
            UsdValueType::Point3f => "point3f",
            UsdValueType::Normal3f => "normal3f",
            UsdValueType::Color3f => "color3f",
            UsdValueType::Int2 => "int2",
            UsdValueType::Matrix2d => "matrix2d",
            UsdValueType::Matrix3d => "matrix3d",
            UsdValueType::Matrix4d => "matrix4d",
            UsdValueType::Quatf => "quatf",
            UsdValueType::Token => "token",
            UsdValueType::Asset => "asset",
        }
    }

    #[must_use]
    pub fn array_usda_name(self) -> String {
        format!("{}[]", self.usda_name())
    }
}

/// Looks up the canonical USD attribute type for a source type, failing
/// with [`BridgeError::UnknownType`] if no mapping exists, per spec.md §4.1.
pub fn default_usd_value_type(source: SourceType) -> Result<UsdValueType> {
    use ScalarKind as K;
    Ok(match source {
        SourceType::Scalar(K::Bool) => UsdValueType::Bool,
        SourceType::Scalar(K::U8) => UsdValueType::UChar,
        SourceType::Scalar(K::I8 | K::I16 | K::I32) => UsdValueType::Int,
        SourceType::Scalar(K::I64) => UsdValueType::Int64,
        SourceType::Scalar(K::U16 | K::U32) => UsdValueType::UInt,
        SourceType::Scalar(K::U64) => UsdValueType::UInt64,
        SourceType::Scalar(K::Half) => UsdValueType::Half,
        SourceType::Scalar(K::Float) => UsdValueType::Float,
        SourceType::Scalar(K::Double) => UsdValueType::Double,
        SourceType::Vec2(_) => UsdValueType::Float2,
        SourceType::Vec3(_) => UsdValueType::Float3,
        SourceType::Vec4(_) => UsdValueType::Float4,
        SourceType::Srgb(n) if n <= 4 => UsdValueType::Float4,
        SourceType::IntPair => UsdValueType::Int2,
        SourceType::Mat2 => UsdValueType::Matrix2d,
        SourceType::Mat3 => UsdValueType::Matrix3d,
        SourceType::Mat4 | SourceType::Mat2x3 | SourceType::Mat3x4 => UsdValueType::Matrix4d,
        _ => {
            return Err(BridgeError::UnknownType(format!("{source:?}")));
        }
    })
}

/// Validates that writing `source` into `dest` would not silently drop
/// components (spec.md §4.1: "never lossy").
pub fn check_no_component_loss(source: SourceType, dest: UsdValueType) -> Result<()> {
    if source.component_count() > dest.component_count() {
        return Err(BridgeError::ShapeMismatch(format!(
            "source type {source:?} has {} components, destination {dest:?} only holds {}",
            source.component_count(),
            dest.component_count()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_sizes_are_derived_not_stored() {
        assert_eq!(SourceType::Vec3(ScalarKind::Float).byte_size(), 12);
        assert_eq!(SourceType::Vec4(ScalarKind::Double).byte_size(), 32);
        assert_eq!(SourceType::Srgb(4).byte_size(), 4);
        assert_eq!(SourceType::Mat4.byte_size(), 64);
    }

    #[test]
    fn flatten_strips_vector_shape() {
        assert_eq!(
            SourceType::Vec3(ScalarKind::Float).flatten(),
            SourceType::Scalar(ScalarKind::Float)
        );
    }

    #[test]
    fn lossy_mapping_is_rejected() {
        let err = check_no_component_loss(SourceType::Vec4(ScalarKind::Float), UsdValueType::Float);
        assert!(matches!(err, Err(BridgeError::ShapeMismatch(_))));
    }
}
