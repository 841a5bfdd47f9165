//! Runtime parameter value storage.

use crate::object::ObjectHandle;
use crate::params::map::ParamTypeTag;

/// A value held in a parameter slot. Numeric payloads store up to 4
/// components inline (matrices go through [`crate::dataarray::DataArray`]
/// rather than this enum, since they're bulky and rarely scalar params).
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    None,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    String(String),
    Object(ObjectHandle),
    Array(ObjectHandle),
}

impl ParamValue {
    #[must_use]
    pub fn type_tag(&self) -> Option<ParamTypeTag> {
        use crate::types::{ScalarKind, SourceType};
        Some(match self {
            ParamValue::None => return None,
            ParamValue::Bool(_) => ParamTypeTag::Bool,
            ParamValue::Int(_) => ParamTypeTag::Source(SourceType::Scalar(ScalarKind::I64)),
            ParamValue::UInt(_) => ParamTypeTag::Source(SourceType::Scalar(ScalarKind::U64)),
            ParamValue::Float(_) => ParamTypeTag::Source(SourceType::Scalar(ScalarKind::Float)),
            ParamValue::Double(_) => ParamTypeTag::Source(SourceType::Scalar(ScalarKind::Double)),
            ParamValue::Vec2(_) => ParamTypeTag::Source(SourceType::Vec2(ScalarKind::Float)),
            ParamValue::Vec3(_) => ParamTypeTag::Source(SourceType::Vec3(ScalarKind::Float)),
            ParamValue::Vec4(_) => ParamTypeTag::Source(SourceType::Vec4(ScalarKind::Float)),
            ParamValue::String(_) => ParamTypeTag::String,
            ParamValue::Object(_) => ParamTypeTag::Object,
            ParamValue::Array(_) => ParamTypeTag::Array,
        })
    }

    /// Whether this value participates in refcounting (objects and
    /// strings are the only "RefCounted" payloads, spec.md §4.2).
    #[must_use]
    pub fn is_ref_counted(&self) -> bool {
        matches!(self, ParamValue::Object(_) | ParamValue::Array(_))
    }

    #[must_use]
    pub fn as_object(&self) -> Option<ObjectHandle> {
        match self {
            ParamValue::Object(h) | ParamValue::Array(h) => Some(*h),
            _ => None,
        }
    }
}
