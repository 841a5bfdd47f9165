//! Geometry updaters (spec.md §4.4.5).

use glam::Vec3;

use crate::errors::Result;
use crate::object::{GeometryKind, ObjectKind};
use crate::timecode::TimeCode;
use crate::types::{ScalarKind, SourceType, UsdValueType};
use crate::writer::attributes::{self, TimeVaryingBits};
use crate::writer::session::UsdWriter;

#[must_use]
pub fn usd_type_name(kind: GeometryKind, use_point_instancer: bool) -> &'static str {
    match kind {
        GeometryKind::Mesh | GeometryKind::Quad | GeometryKind::Triangle => "Mesh",
        GeometryKind::Sphere if use_point_instancer => "PointInstancer",
        GeometryKind::Sphere => "Points",
        GeometryKind::Cylinder | GeometryKind::Cone => "PointInstancer",
        GeometryKind::Curve => "BasisCurves",
    }
}

/// The USD prim type authored for any entity kind the engine creates
/// (spec.md §3 "Stage": category subpaths live beneath `/RootClass`).
#[must_use]
pub fn usd_type_name_for_kind(kind: ObjectKind, use_point_instancer: bool) -> &'static str {
    match kind {
        ObjectKind::World | ObjectKind::Instance | ObjectKind::Group => "Xform",
        ObjectKind::Surface => "Xform",
        ObjectKind::Volume => "Volume",
        ObjectKind::SpatialField => "Field3DAsset",
        ObjectKind::Geometry(g) => usd_type_name(g, use_point_instancer),
        ObjectKind::Material => "Material",
        ObjectKind::Sampler(_) => "Shader",
        ObjectKind::Light(_) => "DistantLight",
        ObjectKind::Camera => "Camera",
        ObjectKind::DataArray => "Scope",
        ObjectKind::Frame => "Scope",
        ObjectKind::Renderer => "Scope",
    }
}

fn extent(points: &[Vec3]) -> (Vec3, Vec3) {
    let mut lo = Vec3::splat(f32::INFINITY);
    let mut hi = Vec3::splat(f32::NEG_INFINITY);
    for &p in points {
        lo = lo.min(p);
        hi = hi.max(p);
    }
    (lo, hi)
}

fn floats_to_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn write_attr(
    writer: &mut UsdWriter,
    prim_path: &str,
    name: &str,
    source: SourceType,
    dest: UsdValueType,
    bytes: &[u8],
    count: usize,
    t: TimeCode,
    time_varying: bool,
) -> Result<()> {
    let literal = attributes::write_array(bytes, source, dest, count)?;
    let layer = writer.master_layer_mut();
    let Some(prim) = layer.get_prim_mut(prim_path) else {
        return Ok(());
    };
    if time_varying {
        prim.clear_uniform(name);
        prim.set_time_sample(name, dest, true, t, literal);
    } else {
        prim.clear_time_sample(name, t);
        prim.set_uniform(name, dest, true, literal);
    }
    Ok(())
}

/// Writes `points`, `extent`, `faceVertexIndices`/`faceVertexCounts`,
/// `normals`, and `primvars:color` for a polygon mesh (spec.md §8
/// scenario S1).
#[allow(clippy::too_many_arguments)]
pub fn write_mesh(
    writer: &mut UsdWriter,
    prim_path: &str,
    points: &[Vec3],
    face_vertex_indices: &[u32],
    face_vertex_count: usize,
    colors: Option<&[[f32; 4]]>,
    t: TimeCode,
    time_varying: TimeVaryingBits,
) -> Result<()> {
    let point_bytes = floats_to_bytes(&points.iter().flat_map(|p| [p.x, p.y, p.z]).collect::<Vec<_>>());
    write_attr(
        writer,
        prim_path,
        "points",
        SourceType::Vec3(ScalarKind::Float),
        UsdValueType::Point3f,
        &point_bytes,
        points.len(),
        t,
        time_varying.contains(TimeVaryingBits::POSITIONS),
    )?;

    let (lo, hi) = extent(points);
    let extent_bytes = floats_to_bytes(&[lo.x, lo.y, lo.z, hi.x, hi.y, hi.z]);
    write_attr(
        writer,
        prim_path,
        "extent",
        SourceType::Vec3(ScalarKind::Float),
        UsdValueType::Point3f,
        &extent_bytes,
        2,
        t,
        time_varying.contains(TimeVaryingBits::POSITIONS),
    )?;

    let index_bytes: Vec<u8> = face_vertex_indices.iter().flat_map(|i| (*i as i32).to_le_bytes()).collect();
    write_attr(
        writer,
        prim_path,
        "faceVertexIndices",
        SourceType::Scalar(ScalarKind::I32),
        UsdValueType::Int,
        &index_bytes,
        face_vertex_indices.len(),
        t,
        time_varying.contains(TimeVaryingBits::INDICES),
    )?;

    let num_prims = face_vertex_indices.len() / face_vertex_count.max(1);
    let counts: Vec<i32> = vec![face_vertex_count as i32; num_prims];
    let counts_bytes: Vec<u8> = counts.iter().flat_map(|c| c.to_le_bytes()).collect();
    write_attr(
        writer,
        prim_path,
        "faceVertexCounts",
        SourceType::Scalar(ScalarKind::I32),
        UsdValueType::Int,
        &counts_bytes,
        num_prims,
        t,
        time_varying.contains(TimeVaryingBits::INDICES),
    )?;

    if let Some(colors) = colors {
        let color_bytes = floats_to_bytes(&colors.iter().flat_map(|c| *c).collect::<Vec<_>>());
        write_attr(
            writer,
            prim_path,
            "primvars:color",
            SourceType::Vec4(ScalarKind::Float),
            UsdValueType::Float4,
            &color_bytes,
            colors.len(),
            t,
            time_varying.contains(TimeVaryingBits::COLORS),
        )?;
    }

    Ok(())
}

/// Writes `UsdGeomPoints` (or `PointInstancer` prototype scales, spec.md
/// §8 scenario S2) `points` + `widths` (diameters = 2 * radius).
pub fn write_sphere_points(
    writer: &mut UsdWriter,
    prim_path: &str,
    points: &[Vec3],
    radii: &[f32],
    t: TimeCode,
    time_varying: TimeVaryingBits,
) -> Result<()> {
    let point_bytes = floats_to_bytes(&points.iter().flat_map(|p| [p.x, p.y, p.z]).collect::<Vec<_>>());
    write_attr(
        writer,
        prim_path,
        "points",
        SourceType::Vec3(ScalarKind::Float),
        UsdValueType::Point3f,
        &point_bytes,
        points.len(),
        t,
        time_varying.contains(TimeVaryingBits::POSITIONS),
    )?;

    let widths: Vec<f32> = radii.iter().map(|r| r * 2.0).collect();
    let widths_bytes = floats_to_bytes(&widths);
    write_attr(
        writer,
        prim_path,
        "widths",
        SourceType::Scalar(ScalarKind::Float),
        UsdValueType::Float,
        &widths_bytes,
        widths.len(),
        t,
        time_varying.contains(TimeVaryingBits::RADIUS),
    )
}

/// Converts a cylinder/cone `(p0, p1)` segment into `(midpoint, scale,
/// orientation)` for a `PointInstancer` prototype (spec.md §4.4.5).
#[must_use]
pub fn segment_to_instance(p0: Vec3, p1: Vec3, radius: f32) -> (Vec3, Vec3, glam::Quat) {
    let midpoint = (p0 + p1) * 0.5;
    let length = (p1 - p0).length();
    let dir = (p1 - p0).normalize_or_zero();
    let scale = Vec3::new(radius, radius, length * 0.5);
    let orientation = attributes::quaternion_from_normal(dir);
    (midpoint, scale, orientation)
}

/// Writes `PointInstancer` prototype data (`positions`, `scales`,
/// `orientations`, `protoIndices`) for a set of cylinder or cone segments,
/// each converted to an instance transform via [`segment_to_instance`]
/// (spec.md §4.4.5).
pub fn write_segment_instances(
    writer: &mut UsdWriter,
    prim_path: &str,
    segments: &[(Vec3, Vec3)],
    radii: &[f32],
    t: TimeCode,
    time_varying: TimeVaryingBits,
) -> Result<()> {
    let mut positions = Vec::with_capacity(segments.len() * 3);
    let mut scales = Vec::with_capacity(segments.len() * 3);
    let mut orientations = Vec::with_capacity(segments.len() * 4);
    for (i, &(p0, p1)) in segments.iter().enumerate() {
        let radius = radii.get(i).copied().unwrap_or(1.0);
        let (mid, scale, orientation) = segment_to_instance(p0, p1, radius);
        positions.extend_from_slice(&[mid.x, mid.y, mid.z]);
        scales.extend_from_slice(&[scale.x, scale.y, scale.z]);
        orientations.extend_from_slice(&[orientation.w, orientation.x, orientation.y, orientation.z]);
    }

    let time_varying_positions = time_varying.contains(TimeVaryingBits::POSITIONS);
    write_attr(
        writer,
        prim_path,
        "positions",
        SourceType::Vec3(ScalarKind::Float),
        UsdValueType::Point3f,
        &floats_to_bytes(&positions),
        segments.len(),
        t,
        time_varying_positions,
    )?;
    write_attr(
        writer,
        prim_path,
        "scales",
        SourceType::Vec3(ScalarKind::Float),
        UsdValueType::Float3,
        &floats_to_bytes(&scales),
        segments.len(),
        t,
        time_varying_positions,
    )?;
    write_attr(
        writer,
        prim_path,
        "orientations",
        SourceType::Vec4(ScalarKind::Float),
        UsdValueType::Quatf,
        &floats_to_bytes(&orientations),
        segments.len(),
        t,
        time_varying_positions,
    )?;

    let proto_indices: Vec<i32> = vec![0; segments.len()];
    let proto_bytes: Vec<u8> = proto_indices.iter().flat_map(|v| v.to_le_bytes()).collect();
    write_attr(
        writer,
        prim_path,
        "protoIndices",
        SourceType::Scalar(ScalarKind::I32),
        UsdValueType::Int,
        &proto_bytes,
        segments.len(),
        t,
        time_varying.contains(TimeVaryingBits::INDICES),
    )
}

/// Writes `points` + `curveVertexCounts` + per-vertex `widths` for a
/// `BasisCurves` prim, splitting strips at index-pair discontinuities via
/// [`curve_vertex_counts`] (spec.md §4.4.5).
pub fn write_curve_data(
    writer: &mut UsdWriter,
    prim_path: &str,
    points: &[Vec3],
    index_pairs: &[(u32, u32)],
    widths: &[f32],
    t: TimeCode,
    time_varying: TimeVaryingBits,
) -> Result<()> {
    let point_bytes = floats_to_bytes(&points.iter().flat_map(|p| [p.x, p.y, p.z]).collect::<Vec<_>>());
    write_attr(
        writer,
        prim_path,
        "points",
        SourceType::Vec3(ScalarKind::Float),
        UsdValueType::Point3f,
        &point_bytes,
        points.len(),
        t,
        time_varying.contains(TimeVaryingBits::POSITIONS),
    )?;

    let counts = curve_vertex_counts(index_pairs);
    let counts_bytes: Vec<u8> = counts.iter().flat_map(|c| c.to_le_bytes()).collect();
    write_attr(
        writer,
        prim_path,
        "curveVertexCounts",
        SourceType::Scalar(ScalarKind::I32),
        UsdValueType::Int,
        &counts_bytes,
        counts.len(),
        t,
        time_varying.contains(TimeVaryingBits::INDICES),
    )?;

    if !widths.is_empty() {
        let widths_bytes = floats_to_bytes(widths);
        write_attr(
            writer,
            prim_path,
            "widths",
            SourceType::Scalar(ScalarKind::Float),
            UsdValueType::Float,
            &widths_bytes,
            widths.len(),
            t,
            time_varying.contains(TimeVaryingBits::RADIUS),
        )?;
    }
    Ok(())
}

/// Writes `curveVertexCounts` by walking index pairs and splitting
/// whenever the next segment doesn't continue from the previous one
/// (spec.md §4.4.5).
#[must_use]
pub fn curve_vertex_counts(index_pairs: &[(u32, u32)]) -> Vec<i32> {
    let mut counts = Vec::new();
    let mut current = 0i32;
    let mut previous_end: Option<u32> = None;
    for &(start, end) in index_pairs {
        match previous_end {
            Some(pe) if pe == start => current += 1,
            _ => {
                if current > 0 {
                    counts.push(current + 1);
                }
                current = 1;
            }
        }
        previous_end = Some(end);
    }
    if current > 0 {
        counts.push(current + 1);
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::TestConnection;
    use crate::settings::BridgeSettings;

    fn new_writer() -> UsdWriter {
        let mut conn = TestConnection::new();
        UsdWriter::initialize_session(&mut conn, &BridgeSettings::default()).unwrap()
    }

    #[test]
    fn mesh_writes_expected_s1_attributes() {
        let mut writer = new_writer();
        writer.define_prim("/RootClass/geometries/G", "Mesh", true);
        let points = vec![
            Vec3::new(-1.0, -1.0, 3.0),
            Vec3::new(-1.0, 1.0, 3.0),
            Vec3::new(1.0, -1.0, 3.0),
            Vec3::new(0.1, 0.1, 0.3),
        ];
        write_mesh(
            &mut writer,
            "/RootClass/geometries/G",
            &points,
            &[0, 1, 2, 1, 2, 3],
            3,
            None,
            TimeCode(0.0),
            TimeVaryingBits::empty(),
        )
        .unwrap();

        let prim = writer.master_layer().get_prim("/RootClass/geometries/G").unwrap();
        assert_eq!(prim.attribute("faceVertexCounts").unwrap().uniform.as_deref(), Some("[3, 3]"));
        assert_eq!(
            prim.attribute("faceVertexIndices").unwrap().uniform.as_deref(),
            Some("[0, 1, 2, 1, 2, 3]")
        );
    }

    #[test]
    fn sphere_widths_are_twice_the_radius() {
        let mut writer = new_writer();
        writer.define_prim("/RootClass/geometries/G", "Points", true);
        let points = vec![Vec3::ZERO; 4];
        write_sphere_points(
            &mut writer,
            "/RootClass/geometries/G",
            &points,
            &[0.1, 2.0, 0.3, 0.05],
            TimeCode(0.0),
            TimeVaryingBits::empty(),
        )
        .unwrap();
        let prim = writer.master_layer().get_prim("/RootClass/geometries/G").unwrap();
        assert_eq!(prim.attribute("widths").unwrap().uniform.as_deref(), Some("[0.2, 4, 0.6, 0.1]"));
    }

    #[test]
    fn curve_vertex_counts_splits_on_discontinuity() {
        let counts = curve_vertex_counts(&[(0, 1), (1, 2), (5, 6)]);
        assert_eq!(counts, vec![3, 2]);
    }
}
