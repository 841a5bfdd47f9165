//! Cameras (spec.md §4.4.8).

use glam::{Mat3, Vec3};

use crate::timecode::TimeCode;
use crate::types::UsdValueType;
use crate::writer::session::UsdWriter;

/// Converts vertical FOV + aspect + focal length convention into USD's
/// pinhole parameters (horizontal/vertical aperture, focal length), via
/// the standard `GfCamera` relation: `aperture = 2 * focal_length *
/// tan(fov / 2)`.
#[must_use]
pub fn pinhole_params(aspect: f32, fovy_radians: f32, focal_length_mm: f32) -> (f32, f32) {
    let vertical_aperture = 2.0 * focal_length_mm * (fovy_radians / 2.0).tan();
    let horizontal_aperture = vertical_aperture * aspect;
    (horizontal_aperture, vertical_aperture)
}

/// Builds the view transform matrix from (position, direction, up) via
/// right-handed orthogonalization; `direction` maps to -Z (spec.md
/// §4.4.8).
#[must_use]
pub fn view_matrix(position: Vec3, direction: Vec3, up: Vec3) -> glam::Mat4 {
    let forward = direction.normalize_or_zero();
    let right = forward.cross(up).normalize_or_zero();
    let ortho_up = right.cross(forward);
    let basis = Mat3::from_cols(right, ortho_up, -forward);
    glam::Mat4::from(glam::Affine3A::from_mat3_translation(basis, position))
}

impl UsdWriter {
    /// Creates a `UsdGeomCamera` prim and authors its pinhole parameters
    /// plus a single transform op built from (position, direction, up).
    #[allow(clippy::too_many_arguments)]
    pub fn write_camera(
        &mut self,
        prim_path: &str,
        aspect: f32,
        fovy_radians: f32,
        near: f32,
        far: f32,
        position: Vec3,
        direction: Vec3,
        up: Vec3,
        t: TimeCode,
        time_varying: bool,
    ) {
        self.master_layer_mut().define_prim(prim_path, "Camera");
        let (h_aperture, v_aperture) = pinhole_params(aspect, fovy_radians, 50.0);
        let literal = format_matrix4(view_matrix(position, direction, up));

        let prim = self.master_layer_mut().get_prim_mut(prim_path).unwrap();
        prim.set_uniform("horizontalAperture", UsdValueType::Float, false, format!("{h_aperture}"));
        prim.set_uniform("verticalAperture", UsdValueType::Float, false, format!("{v_aperture}"));
        prim.set_uniform("clippingRange", UsdValueType::Float2, false, format!("({near}, {far})"));
        if time_varying {
            prim.set_time_sample("xformOp:transform", UsdValueType::Matrix4d, false, t, literal);
        } else {
            prim.set_uniform("xformOp:transform", UsdValueType::Matrix4d, false, literal);
        }
    }
}

fn format_matrix4(m: glam::Mat4) -> String {
    let cols: Vec<String> = m
        .to_cols_array_2d()
        .iter()
        .map(|c| format!("({}, {}, {}, {})", c[0], c[1], c[2], c[3]))
        .collect();
    format!("( {} )", cols.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::TestConnection;
    use crate::settings::BridgeSettings;

    #[test]
    fn pinhole_params_scale_with_focal_length() {
        let (h, v) = pinhole_params(16.0 / 9.0, 50f32.to_radians(), 50.0);
        assert!(h > v);
        assert!(v > 0.0);
    }

    #[test]
    fn write_camera_authors_clipping_range() {
        let mut conn = TestConnection::new();
        let mut writer = UsdWriter::initialize_session(&mut conn, &BridgeSettings::default()).unwrap();
        writer.define_prim("/RootClass/cameras/C", "Camera", true);
        writer.write_camera(
            "/RootClass/cameras/C",
            16.0 / 9.0,
            50f32.to_radians(),
            0.1,
            1000.0,
            Vec3::ZERO,
            -Vec3::Z,
            Vec3::Y,
            TimeCode(0.0),
            false,
        );
        let prim = writer.master_layer().get_prim("/RootClass/cameras/C").unwrap();
        assert_eq!(prim.attribute("clippingRange").unwrap().uniform.as_deref(), Some("(0.1, 1000)"));
    }
}
