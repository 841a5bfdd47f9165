//! Lights (spec.md §4.4.9). Directional lights author a look-at-derived
//! transform op; point lights author a translate op; dome lights author
//! only color and intensity.

use glam::Vec3;

use crate::object::LightKind;
use crate::timecode::TimeCode;
use crate::types::UsdValueType;
use crate::writer::cameras::view_matrix;
use crate::writer::session::UsdWriter;

fn usd_type_name(kind: LightKind) -> &'static str {
    match kind {
        LightKind::Directional => "DistantLight",
        LightKind::Point => "SphereLight",
        LightKind::Dome => "DomeLight",
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

impl UsdWriter {
    /// Creates the light's prim and authors its placement: a `lookAt`
    /// transform for directional lights (direction maps to -Z, same
    /// convention as cameras), a translate for point lights, nothing for
    /// dome lights beyond color/intensity.
    #[allow(clippy::too_many_arguments)]
    pub fn write_light(
        &mut self,
        prim_path: &str,
        kind: LightKind,
        color: [f32; 3],
        intensity: f32,
        position: Vec3,
        direction: Vec3,
        t: TimeCode,
        time_varying: bool,
    ) {
        self.master_layer_mut().define_prim(prim_path, usd_type_name(kind));
        let prim = self.master_layer_mut().get_prim_mut(prim_path).unwrap();
        prim.set_uniform(
            "inputs:color",
            UsdValueType::Color3f,
            false,
            format!("({}, {}, {})", color[0], color[1], color[2]),
        );
        prim.set_uniform("inputs:intensity", UsdValueType::Float, false, format!("{intensity}"));

        match kind {
            LightKind::Dome => {}
            LightKind::Directional => {
                let up = if direction.normalize_or_zero().dot(Vec3::Y).abs() > 0.999 { Vec3::Z } else { Vec3::Y };
                let literal = format_matrix4(view_matrix(position, direction, up));
                let prim = self.master_layer_mut().get_prim_mut(prim_path).unwrap();
                if time_varying {
                    prim.set_time_sample("xformOp:transform", UsdValueType::Matrix4d, false, t, literal);
                } else {
                    prim.set_uniform("xformOp:transform", UsdValueType::Matrix4d, false, literal);
                }
            }
            LightKind::Point => {
                let literal = format!("({}, {}, {})", position.x, position.y, position.z);
                let prim = self.master_layer_mut().get_prim_mut(prim_path).unwrap();
                if time_varying {
                    prim.set_time_sample("xformOp:translate", UsdValueType::Float3, false, t, literal);
                } else {
                    prim.set_uniform("xformOp:translate", UsdValueType::Float3, false, literal);
                }
            }
        }
    }
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
    fn point_light_authors_translate_not_transform() {
        let mut writer = new_writer();
        writer.define_prim("/RootClass/lights/L", "SphereLight", true);
        writer.write_light(
            "/RootClass/lights/L",
            LightKind::Point,
            [1.0, 1.0, 1.0],
            500.0,
            Vec3::new(0.0, 2.0, 0.0),
            -Vec3::Y,
            TimeCode(0.0),
            false,
        );
        let prim = writer.master_layer().get_prim("/RootClass/lights/L").unwrap();
        assert_eq!(prim.attribute("xformOp:translate").unwrap().uniform.as_deref(), Some("(0, 2, 0)"));
        assert!(prim.attribute("xformOp:transform").is_none());
    }

    #[test]
    fn dome_light_authors_only_color_and_intensity() {
        let mut writer = new_writer();
        writer.define_prim("/RootClass/lights/D", "DomeLight", true);
        writer.write_light(
            "/RootClass/lights/D",
            LightKind::Dome,
            [0.8, 0.8, 1.0],
            1.0,
            Vec3::ZERO,
            -Vec3::Y,
            TimeCode(0.0),
            false,
        );
        let prim = writer.master_layer().get_prim("/RootClass/lights/D").unwrap();
        assert!(prim.attribute("xformOp:translate").is_none());
        assert!(prim.attribute("xformOp:transform").is_none());
        assert_eq!(prim.attribute("inputs:intensity").unwrap().uniform.as_deref(), Some("1"));
    }
}
