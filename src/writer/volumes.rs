//! Volumes (spec.md §4.4.7). A spatial field is backed by `UsdVolVolume`
//! with an `OpenVDBAsset` field relationship; the VDB bytes themselves
//! come from an external [`crate::volume::VolumeWriter`].

use glam::Vec3;

use crate::errors::Result;
use crate::timecode::TimeCode;
use crate::types::UsdValueType;
use crate::volume::{VolumeData, VolumeWriter};
use crate::writer::session::UsdWriter;

impl UsdWriter {
    /// Encodes `data` via `volume_writer`, writes the resulting bytes to
    /// `volumes/<name>_<t>.vdb`, and authors the `UsdVolVolume` +
    /// `OpenVDBAsset` field relationship at `field_prim_path` (spec.md §8
    /// scenario S6).
    pub fn write_spatial_field(
        &mut self,
        conn: &mut dyn crate::connection::Connection,
        volume_writer: &mut dyn VolumeWriter,
        field_prim_path: &str,
        name: &str,
        t: TimeCode,
        data: &VolumeData,
    ) -> Result<()> {
        volume_writer.initialize()?;
        volume_writer.to_vdb(data)?;
        let bytes = volume_writer.serialized_volume_data().to_vec();
        let asset_path = format!("{}/volumes/{name}_{}.vdb", self.session_dir, t.get() as i64);
        conn.write_file(&bytes, &asset_path, true, true)?;
        volume_writer.release();

        let lo = Vec3::from(data.origin);
        let hi = lo + Vec3::new(data.dims.0 as f32, data.dims.1 as f32, data.dims.2 as f32) * Vec3::from(data.spacing);

        self.master_layer_mut().define_prim(field_prim_path, "Field3DAsset");
        let field = self.master_layer_mut().get_prim_mut(field_prim_path).unwrap();
        field.set_uniform("filePath", UsdValueType::Asset, false, format!("@{asset_path}@"));
        field.set_uniform("fieldName", UsdValueType::Token, false, format!("\"{}\"", data.grid_name));

        let extent_literal = format!("[({}, {}, {}), ({}, {}, {})]", lo.x, lo.y, lo.z, hi.x, hi.y, hi.z);
        field.set_uniform("extent", UsdValueType::Point3f, true, extent_literal);
        Ok(())
    }

    /// Creates the `UsdVolVolume` prim referencing a spatial field, deferred
    /// by the caller until the field's own commit has completed (spec.md:
    /// "`UsdVolume` therefore defers until the device's flush loop has
    /// reached a fixed point").
    pub fn define_volume(&mut self, volume_prim_path: &str, field_prim_path: &str) {
        self.master_layer_mut().define_prim(volume_prim_path, "Volume");
        let volume = self.master_layer_mut().get_prim_mut(volume_prim_path).unwrap();
        volume.add_relationship_target("field:density", field_prim_path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::TestConnection;
    use crate::settings::BridgeSettings;
    use crate::volume::StubVolumeWriter;

    #[test]
    fn spatial_field_writes_vdb_and_extent() {
        let mut conn = TestConnection::new();
        let mut writer = UsdWriter::initialize_session(&mut conn, &BridgeSettings::default()).unwrap();
        let mut volume_writer = StubVolumeWriter::new();
        let data = VolumeData {
            dims: (16, 16, 16),
            origin: [0.0; 3],
            spacing: [1.0; 3],
            grid_name: "density".into(),
            values: vec![0.0; 16 * 16 * 16],
        };
        writer
            .write_spatial_field(&mut conn, &mut volume_writer, "/RootClass/spatialfields/F", "F", TimeCode(0.0), &data)
            .unwrap();

        assert!(conn.files.keys().any(|k| k.ends_with("volumes/F_0.vdb")));
        let prim = writer.master_layer().get_prim("/RootClass/spatialfields/F").unwrap();
        assert_eq!(prim.attribute("extent").unwrap().uniform.as_deref(), Some("[(0, 0, 0), (16, 16, 16)]"));
    }
}
