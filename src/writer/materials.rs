//! Materials and samplers (spec.md §4.4.6).

use crate::errors::Result;
use crate::resources_registry::{ResourceKey, SharedResourceRegistry};
use crate::timecode::TimeCode;
use crate::types::{ScalarKind, SourceType, UsdValueType};
use crate::writer::attributes;
use crate::writer::session::UsdWriter;

/// How a material input channel (diffuse, opacity, ...) is currently
/// bound, in priority order (spec.md §4.4.6: "1. Sampler attached, 2.
/// Source attribute bound, 3. Constant").
pub enum ChannelBinding<'a> {
    Sampler { sampler_path: &'a str },
    Attribute { token: &'a str },
    Constant { value: [f32; 4] },
}

const PREVIEW_SURFACE_INPUTS: &[&str] =
    &["diffuseColor", "opacity", "emissiveColor", "emissiveIntensity", "roughness", "metallic", "ior"];

impl UsdWriter {
    /// Creates the material prim and, when `write_materials` is enabled,
    /// both the `PreviewSurface` and MDL shader graphs bound as surface
    /// outputs under their respective render contexts.
    pub fn define_material(&mut self, prim_path: &str) {
        self.master_layer_mut().define_prim(prim_path, "Material");
        if !self.write_materials {
            return;
        }
        {
            let preview = self.master_layer_mut().define_prim(&format!("{prim_path}/PreviewSurface"), "Shader");
            preview.set_uniform("info:id", UsdValueType::Token, false, "\"UsdPreviewSurface\"".into());
        }
        {
            let mdl = self.master_layer_mut().define_prim(&format!("{prim_path}/MDL"), "Shader");
            mdl.set_uniform("info:sourceAsset", UsdValueType::Asset, false, "@OmniPBR.mdl@".into());
        }
        let prim = self.master_layer_mut().get_prim_mut(prim_path).unwrap();
        prim.add_relationship_target("outputs:surface", format!("{prim_path}/PreviewSurface.outputs:surface"));
        prim.add_relationship_target("outputs:mdl:surface", format!("{prim_path}/MDL.outputs:out"));
    }

    /// Binds one channel (e.g. `diffuseColor`) on both shader graphs per
    /// the priority chain described in spec.md §4.4.6.
    pub fn bind_channel(&mut self, material_path: &str, channel: &str, binding: &ChannelBinding<'_>, t: TimeCode, time_varying: bool) -> Result<()> {
        if !PREVIEW_SURFACE_INPUTS.contains(&channel) {
            return Err(crate::errors::BridgeError::InvalidArgument(format!("unknown material channel '{channel}'")));
        }
        let preview_path = format!("{material_path}/PreviewSurface");
        let mdl_path = format!("{material_path}/MDL");
        let input_name = format!("inputs:{channel}");

        for shader_path in [&preview_path, &mdl_path] {
            if self.master_layer_mut().get_prim_mut(shader_path).is_none() {
                continue;
            }
            {
                let prim = self.master_layer_mut().get_prim_mut(shader_path).unwrap();
                prim.clear_relationship(&input_name);
                prim.remove_attribute(&input_name);
            }

            match binding {
                ChannelBinding::Sampler { sampler_path } => {
                    let prim = self.master_layer_mut().get_prim_mut(shader_path).unwrap();
                    prim.add_relationship_target(&input_name, format!("{sampler_path}.outputs:rgb"));
                    if channel == "diffuseColor" {
                        prim.add_relationship_target("inputs:opacity", format!("{sampler_path}.outputs:a"));
                    }
                }
                ChannelBinding::Attribute { token } => {
                    let reader_path = format!("{shader_path}/{channel}Reader");
                    let reader = self.master_layer_mut().define_prim(&reader_path, "Shader");
                    reader.set_uniform("info:id", UsdValueType::Token, false, "\"UsdPrimvarReader_float3\"".into());
                    reader.set_uniform("inputs:varname", UsdValueType::Token, false, format!("\"{token}\""));
                    let prim = self.master_layer_mut().get_prim_mut(shader_path).unwrap();
                    prim.add_relationship_target(&input_name, format!("{reader_path}.outputs:result"));
                }
                ChannelBinding::Constant { value } => {
                    let bytes: Vec<u8> = value.iter().flat_map(|v| v.to_le_bytes()).collect();
                    let literal = attributes::write_uniform(&bytes, SourceType::Vec3(ScalarKind::Float), UsdValueType::Color3f)?;
                    let prim = self.master_layer_mut().get_prim_mut(shader_path).unwrap();
                    if time_varying {
                        prim.set_time_sample(&input_name, UsdValueType::Color3f, false, t, literal);
                    } else {
                        prim.set_uniform(&input_name, UsdValueType::Color3f, false, literal);
                    }
                }
            }
        }
        Ok(())
    }

    /// Creates a sampler prim and its texture-coordinate reader child
    /// (spec.md §4.4.6).
    pub fn define_sampler(&mut self, prim_path: &str) {
        let layer = self.master_layer_mut();
        layer.define_prim(prim_path, "Shader");
        let reader_path = format!("{prim_path}/TexCoordReader");
        let reader = layer.define_prim(&reader_path, "Shader");
        reader.set_uniform("info:id", UsdValueType::Token, false, "\"UsdPrimvarReader_float2\"".into());
        reader.set_uniform("inputs:varname", UsdValueType::Token, false, "\"st\"".into());
    }

    /// `SetInAttribute`: rewires the sampler's coordinate reader to a new
    /// primvar name.
    pub fn set_sampler_in_attribute(&mut self, prim_path: &str, attribute_name: &str) {
        let reader_path = format!("{prim_path}/TexCoordReader");
        if let Some(reader) = self.master_layer_mut().get_prim_mut(&reader_path) {
            reader.set_uniform("inputs:varname", UsdValueType::Token, false, format!("\"{attribute_name}\""));
        }
    }

    /// Writes inline image data to `images/<name>[_<t>].png`, deduplicated
    /// through `registry` so two samplers pointing at the same
    /// `(name, t)` collapse into one file (spec.md §8 property 7).
    /// `channels` is 1-4; the PNG is flipped vertically before encoding.
    pub fn write_sampler_image(
        &self,
        conn: &mut dyn crate::connection::Connection,
        registry: &mut SharedResourceRegistry,
        name: &str,
        t: Option<TimeCode>,
        width: u32,
        height: u32,
        channels: u8,
        pixels: &[u8],
    ) -> Result<ResourceKey> {
        let (key, _existed) = registry.acquire(Some(name), t);
        if registry.try_claim_write(&key) {
            let png_bytes = encode_png(width, height, channels, pixels)?;
            let suffix = t.map(|tc| format!("_{}", tc.get())).unwrap_or_default();
            let path = format!("{}/images/{name}{suffix}.png", self.session_dir);
            conn.write_file(&png_bytes, &path, true, true)?;
        }
        Ok(key)
    }
}

fn encode_png(width: u32, height: u32, channels: u8, pixels: &[u8]) -> Result<Vec<u8>> {
    use image::{ColorType, ImageEncoder};

    let color_type = match channels {
        1 => ColorType::L8,
        2 => ColorType::La8,
        3 => ColorType::Rgb8,
        _ => ColorType::Rgba8,
    };

    // Flip vertically: USD/Hydra images are authored bottom-to-top.
    let row_bytes = width as usize * channels as usize;
    let mut flipped = vec![0u8; pixels.len()];
    for row in 0..height as usize {
        let src = row * row_bytes;
        let dst = (height as usize - 1 - row) * row_bytes;
        flipped[dst..dst + row_bytes].copy_from_slice(&pixels[src..src + row_bytes]);
    }

    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf).write_image(&flipped, width, height, color_type)?;
    Ok(buf)
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
    fn define_material_creates_both_shader_graphs() {
        let mut writer = new_writer();
        writer.define_material("/RootClass/materials/M");
        assert!(writer.master_layer().has_prim("/RootClass/materials/M/PreviewSurface"));
        assert!(writer.master_layer().has_prim("/RootClass/materials/M/MDL"));
    }

    #[test]
    fn sampler_binding_then_constant_clears_the_relationship() {
        let mut writer = new_writer();
        writer.define_material("/RootClass/materials/M");
        writer.define_sampler("/RootClass/samplers/S");
        writer
            .bind_channel(
                "/RootClass/materials/M",
                "diffuseColor",
                &ChannelBinding::Sampler { sampler_path: "/RootClass/samplers/S" },
                TimeCode(0.0),
                false,
            )
            .unwrap();
        let preview = writer.master_layer().get_prim("/RootClass/materials/M/PreviewSurface").unwrap();
        assert!(!preview.relationships.get("inputs:diffuseColor").unwrap().is_empty());

        writer
            .bind_channel(
                "/RootClass/materials/M",
                "diffuseColor",
                &ChannelBinding::Constant { value: [1.0, 0.0, 0.0, 1.0] },
                TimeCode(0.0),
                false,
            )
            .unwrap();
        let preview = writer.master_layer().get_prim("/RootClass/materials/M/PreviewSurface").unwrap();
        assert!(preview.relationships.get("inputs:diffuseColor").is_none());
        assert!(preview.attribute("inputs:diffuseColor").is_some());
    }

    #[test]
    fn shared_image_is_written_once_for_n_samplers() {
        let writer = new_writer();
        let mut conn = TestConnection::new();
        let mut registry = SharedResourceRegistry::new();
        let pixels = vec![255u8; 4 * 4 * 4];
        let mut writes = 0;
        for _ in 0..5 {
            writer
                .write_sampler_image(&mut conn, &mut registry, "tex", Some(TimeCode(0.0)), 4, 4, 4, &pixels)
                .unwrap();
        }
        for path in conn.files.keys() {
            if path.contains("tex") {
                writes += 1;
            }
        }
        assert_eq!(writes, 1);
    }
}
