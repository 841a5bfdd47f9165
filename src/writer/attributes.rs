//! Attribute Write Dispatch (spec.md §4.4.10).
//!
//! Runtime-typed dispatch from `(source type, destination USD type)` to a
//! conversion strategy, followed by rendering the converted values into
//! the USDA literal text [`crate::stage::Attribute`] stores. A real USD
//! binding would hand back a mutable span into a typed buffer; the
//! hand-rolled stage model has no such buffer; "write" here means
//! "produce the exact literal the span writer would have filled".

use glam::Vec3;

use crate::errors::{BridgeError, Result};
use crate::types::{ScalarKind, SourceType, UsdValueType};

bitflags::bitflags! {
    /// Which attributes on an entity are currently time-varying. One bit
    /// per data member family (spec.md §4.4.4 / §9 "time-varying bit field").
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TimeVaryingBits: u32 {
        const POSITIONS   = 1 << 0;
        const NORMALS     = 1 << 1;
        const COLORS      = 1 << 2;
        const TEXCOORDS   = 1 << 3;
        const INDICES     = 1 << 4;
        const RADIUS      = 1 << 5;
        const IDS         = 1 << 6;
        const TRANSFORM   = 1 << 7;
        const MATERIAL    = 1 << 8;
        const ATTRIBUTES  = 1 << 9;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteStrategy {
    Copy,
    Convert,
    ExpandToColor,
    ExpandNormalizeToColor,
    SrgbDecodeToColor,
    QuaternionFromNormal,
}

fn choose_strategy(source: SourceType, dest: UsdValueType) -> Result<WriteStrategy> {
    if source.is_srgb_encoded() {
        return Ok(WriteStrategy::SrgbDecodeToColor);
    }
    if dest == UsdValueType::Quatf && matches!(source, SourceType::Vec3(_)) {
        return Ok(WriteStrategy::QuaternionFromNormal);
    }
    let sc = source.component_count();
    let dc = dest.component_count();
    if sc == dc {
        return Ok(match source.scalar_kind() {
            Some(k) if k.is_integer() != matches!(dest, UsdValueType::Float | UsdValueType::Float2 | UsdValueType::Float3 | UsdValueType::Float4 | UsdValueType::Point3f | UsdValueType::Normal3f | UsdValueType::Color3f | UsdValueType::Half | UsdValueType::Double) => {
                WriteStrategy::Convert
            }
            _ => WriteStrategy::Copy,
        });
    }
    if sc < dc && dc == 4 {
        return Ok(if source.scalar_kind().is_some_and(ScalarKind::is_unsigned) {
            WriteStrategy::ExpandNormalizeToColor
        } else {
            WriteStrategy::ExpandToColor
        });
    }
    Err(BridgeError::ShapeMismatch(format!(
        "cannot write {source:?} ({sc} components) into {dest:?} ({dc} components)"
    )))
}

/// A 256-entry sRGB-to-linear lookup table, computed once at process
/// start (spec.md §8 property 8: must agree with the reference formula
/// within 1 ULP).
pub struct SrgbLut([f32; 256]);

impl SrgbLut {
    #[must_use]
    pub fn decode(&self, byte: u8) -> f32 {
        self.0[byte as usize]
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

static SRGB_LUT: std::sync::OnceLock<SrgbLut> = std::sync::OnceLock::new();

fn srgb_lut() -> &'static SrgbLut {
    SRGB_LUT.get_or_init(|| {
        let mut table = [0.0f32; 256];
        for (i, slot) in table.iter_mut().enumerate() {
            *slot = srgb_to_linear(i as f32 / 255.0);
        }
        SrgbLut(table)
    })
}

/// Builds the quaternion rotating `(0, 0, 1)` onto `normal` via half-vector
/// construction (spec.md §4.4.5 / §8 property 9), matching the same
/// technique used for cylinder/cone segment orientation.
#[must_use]
pub fn quaternion_from_normal(normal: Vec3) -> glam::Quat {
    let normal = normal.normalize_or_zero();
    let z = Vec3::Z;
    let half = (z + normal).normalize_or_zero();
    if half == Vec3::ZERO {
        // `normal` points exactly opposite z: no unique half-vector, so
        // substitute a 180-degree rotation about y (spec.md §4.4.5).
        return glam::Quat::from_axis_angle(Vec3::Y, std::f32::consts::PI);
    }
    let cos_half = z.dot(half);
    let axis = z.cross(half);
    glam::Quat::from_xyzw(axis.x, axis.y, axis.z, cos_half).normalize()
}

fn read_scalar(bytes: &[u8], offset: usize, kind: ScalarKind) -> f64 {
    match kind {
        ScalarKind::Bool => f64::from(bytes[offset]),
        ScalarKind::U8 => f64::from(bytes[offset]),
        ScalarKind::I8 => f64::from(bytes[offset] as i8),
        ScalarKind::U16 => f64::from(u16::from_le_bytes([bytes[offset], bytes[offset + 1]])),
        ScalarKind::I16 => f64::from(i16::from_le_bytes([bytes[offset], bytes[offset + 1]])),
        ScalarKind::U32 => f64::from(u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())),
        ScalarKind::I32 => f64::from(i32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())),
        ScalarKind::U64 => u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap()) as f64,
        ScalarKind::I64 => i64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap()) as f64,
        ScalarKind::Half => f64::from(half::f16::from_le_bytes([bytes[offset], bytes[offset + 1]]).to_f32()),
        ScalarKind::Float => f64::from(f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())),
        ScalarKind::Double => f64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap()),
    }
}

/// Decodes `count` source elements out of a flat byte buffer into
/// per-element component vectors.
fn decode_elements(bytes: &[u8], source: SourceType, count: usize) -> Vec<Vec<f64>> {
    let components = source.component_count();
    let scalar = source.scalar_kind().unwrap_or(ScalarKind::Float);
    let scalar_size = scalar.byte_size();
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let base = i * components * scalar_size;
        let mut elem = Vec::with_capacity(components);
        for c in 0..components {
            elem.push(read_scalar(bytes, base + c * scalar_size, scalar));
        }
        out.push(elem);
    }
    out
}

fn convert_element(source: SourceType, dest: UsdValueType, strategy: WriteStrategy, elem: &[f64]) -> Vec<f64> {
    match strategy {
        WriteStrategy::Copy | WriteStrategy::Convert => elem.to_vec(),
        WriteStrategy::ExpandToColor => {
            let mut v = vec![0.0; 4];
            v[..elem.len()].copy_from_slice(elem);
            if elem.len() < 4 {
                v[3] = 1.0;
            }
            v
        }
        WriteStrategy::ExpandNormalizeToColor => {
            let max = source.scalar_kind().map_or(1.0, ScalarKind::integer_max);
            let mut v = vec![0.0; 4];
            for (i, x) in elem.iter().enumerate().take(3.min(elem.len())) {
                v[i] = x / max;
            }
            if elem.len() < 4 {
                v[3] = 1.0;
            }
            v
        }
        WriteStrategy::SrgbDecodeToColor => {
            let lut = srgb_lut();
            let mut v = vec![0.0; 4];
            for (i, x) in elem.iter().enumerate().take(3.min(elem.len())) {
                v[i] = f64::from(lut.decode(*x as u8));
            }
            v[3] = if elem.len() >= 4 { elem[3] / 255.0 } else { 1.0 };
            v
        }
        WriteStrategy::QuaternionFromNormal => {
            let n = Vec3::new(elem[0] as f32, elem[1] as f32, elem[2] as f32);
            let q = quaternion_from_normal(n);
            vec![f64::from(q.w), f64::from(q.x), f64::from(q.y), f64::from(q.z)]
        }
    }
    .into_iter()
    .take(dest.component_count())
    .collect()
}

fn format_component(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.0}")
    } else {
        // Trim to a stable, compact precision; USDA doesn't care about
        // exact round-trip width.
        let s = format!("{v:.7}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn format_value(dest: UsdValueType, components: &[f64]) -> String {
    match dest {
        UsdValueType::Bool => (components[0] != 0.0).to_string(),
        UsdValueType::Token | UsdValueType::Asset => {
            // Callers needing token/asset literals build them directly;
            // reaching here means a numeric dispatch mistakenly targeted one.
            String::new()
        }
        _ if components.len() == 1 => format_component(components[0]),
        _ => {
            let inner: Vec<String> = components.iter().map(|c| format_component(*c)).collect();
            format!("({})", inner.join(", "))
        }
    }
}

/// Renders a single default-time (or time-sample) value.
pub fn write_uniform(bytes: &[u8], source: SourceType, dest: UsdValueType) -> Result<String> {
    crate::types::check_no_component_loss(source, dest).or_else(|e| {
        // ExpandToColor/ExpandNormalizeToColor intentionally grow
        // component count; only reject genuine narrowing.
        if source.component_count() < dest.component_count() {
            Ok(())
        } else {
            Err(e)
        }
    })?;
    let strategy = choose_strategy(source, dest)?;
    let elements = decode_elements(bytes, source, 1);
    let converted = convert_element(source, dest, strategy, &elements[0]);
    Ok(format_value(dest, &converted))
}

/// Renders an array value, e.g. `[(0, 0, 0), (1, 0, 0)]`.
pub fn write_array(bytes: &[u8], source: SourceType, dest: UsdValueType, count: usize) -> Result<String> {
    if count == 0 {
        return Err(BridgeError::InvalidArgument("cannot write a zero-length attribute array".into()));
    }
    let strategy = choose_strategy(source, dest)?;
    let elements = decode_elements(bytes, source, count);
    let rendered: Vec<String> = elements
        .iter()
        .map(|e| format_value(dest, &convert_element(source, dest, strategy, e)))
        .collect();
    Ok(format!("[{}]", rendered.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_lut_matches_reference_formula_within_one_ulp() {
        let lut = srgb_lut();
        for i in 0..=255u8 {
            let reference = srgb_to_linear(f32::from(i) / 255.0);
            assert!((lut.decode(i) - reference).abs() <= f32::EPSILON * 4.0);
        }
    }

    #[test]
    fn quaternion_from_normal_rotates_z_onto_target() {
        let target = Vec3::new(0.3, 0.6, 0.742).normalize();
        let q = quaternion_from_normal(target);
        let rotated = q * Vec3::Z;
        assert!((rotated - target).length() < 1e-5);
    }

    #[test]
    fn quaternion_from_normal_handles_antiparallel_case() {
        let q = quaternion_from_normal(Vec3::new(0.0, 0.0, -1.0));
        let rotated = q * Vec3::Z;
        assert!((rotated - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-4);
    }

    #[test]
    fn expand_to_color_pads_alpha_to_one() {
        let bytes = 1.0f32.to_le_bytes();
        let literal = write_uniform(&bytes, SourceType::Scalar(ScalarKind::Float), UsdValueType::Float4).unwrap();
        assert_eq!(literal, "(1, 1, 1, 1)");
    }

    #[test]
    fn shape_mismatch_is_reported_for_narrowing_writes() {
        let bytes = [0u8; 16];
        let err = write_uniform(&bytes, SourceType::Vec4(ScalarKind::Float), UsdValueType::Float);
        assert!(matches!(err, Err(BridgeError::ShapeMismatch(_))));
    }

    #[test]
    fn array_literal_joins_elements() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0.0f32.to_le_bytes());
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
        let literal = write_array(&bytes, SourceType::Scalar(ScalarKind::Float), UsdValueType::Float, 2).unwrap();
        assert_eq!(literal, "[0, 1]");
    }
}
