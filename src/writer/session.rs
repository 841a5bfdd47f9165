//! Session lifecycle (spec.md §4.4.1).

use rustc_hash::FxHashMap;

use crate::connection::Connection;
use crate::errors::{BridgeError, Result};
use crate::settings::BridgeSettings;
use crate::stage::{Layer, LayerId, StageStore};
use crate::writer::prims::RefState;

/// The core of the core (spec.md §4.4): owns every open layer for one
/// session and drives prim creation, reference management, value-clip
/// retiming, and attribute writes against them.
pub struct UsdWriter {
    pub(crate) stages: StageStore,
    pub(crate) master: LayerId,
    pub(crate) session_dir: String,
    pub(crate) manifests: FxHashMap<String, LayerId>,
    pub(crate) clips: FxHashMap<String, LayerId>,
    pub(crate) value_clip_retiming: bool,
    pub(crate) time_clip_stages: bool,
    pub(crate) use_point_instancer: bool,
    pub(crate) write_materials: bool,
    /// Lifecycle state of every referencing prim this session has ever
    /// created, keyed by its full path (spec.md §4.4.11).
    pub(crate) ref_states: FxHashMap<String, RefState>,
    valid: bool,
}

impl UsdWriter {
    /// Resolves the session directory (`max(existing) + 1`, or reuse the
    /// latest one if `create_new_session=false`, spec.md §8 property 6),
    /// creates the required subdirectories, and opens the master stage
    /// with `/RootClass` and `/Root`.
    pub fn initialize_session(conn: &mut dyn Connection, settings: &BridgeSettings) -> Result<Self> {
        let max_existing = conn.max_session_nr()?;
        let session_nr = if settings.create_new_session {
            max_existing + 1
        } else {
            max_existing.max(0)
        };
        let session_dir = format!("Session_{session_nr}");

        conn.create_folder(&session_dir, true, true)?;
        for sub in ["manifests", "clips", "primstages", "images", "volumes"] {
            conn.create_folder(&format!("{session_dir}/{sub}"), true, true)?;
        }

        let mut stages = StageStore::new();
        let master = stages.create_layer(format!("{session_dir}/FullScene.usda"));
        {
            let layer = stages.get_mut(master).ok_or_else(|| BridgeError::LogicError("master layer missing".into()))?;
            layer.define_class("/RootClass");
            let root = layer.define_prim("/Root", "Xform");
            root.kind = Some("assembly".into());
            root.references.push(crate::stage::Reference {
                asset_path: None,
                prim_path: "/RootClass".into(),
            });
            layer.default_prim = Some("/Root".into());
        }

        Ok(Self {
            stages,
            master,
            session_dir,
            manifests: FxHashMap::default(),
            clips: FxHashMap::default(),
            value_clip_retiming: settings.value_clip_retiming,
            time_clip_stages: settings.time_clip_stages,
            use_point_instancer: settings.use_point_instancer,
            write_materials: settings.write_materials,
            ref_states: FxHashMap::default(),
            valid: true,
        })
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The current lifecycle state of the referencing prim at `ref_path`,
    /// or `None` if it was never created in this session (spec.md
    /// §4.4.11).
    #[must_use]
    pub fn ref_state(&self, ref_path: &str) -> Option<RefState> {
        self.ref_states.get(ref_path).copied()
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    #[must_use]
    pub fn session_dir(&self) -> &str {
        &self.session_dir
    }

    pub(crate) fn master_layer(&self) -> &Layer {
        self.stages.get(self.master).expect("master layer always exists while the writer is valid")
    }

    pub(crate) fn master_layer_mut(&mut self) -> &mut Layer {
        self.stages.get_mut(self.master).expect("master layer always exists while the writer is valid")
    }

    /// Lazily allocates the manifest stage for a time-varying prim
    /// (spec.md §4.4.3).
    pub(crate) fn manifest_for(&mut self, prim_path: &str) -> LayerId {
        if let Some(&id) = self.manifests.get(prim_path) {
            return id;
        }
        let identifier = format!("{}/manifests/{}.usda", self.session_dir, sanitize_for_filename(prim_path));
        let id = self.stages.create_layer(identifier);
        self.manifests.insert(prim_path.to_string(), id);
        id
    }

    /// Lazily allocates the (non-per-timestep) clip/prim stage used when
    /// `time_clip_stages` is disabled.
    pub(crate) fn clip_for(&mut self, prim_path: &str) -> LayerId {
        if let Some(&id) = self.clips.get(prim_path) {
            return id;
        }
        let identifier = format!("{}/primstages/{}.usda", self.session_dir, sanitize_for_filename(prim_path));
        let id = self.stages.create_layer(identifier);
        self.clips.insert(prim_path.to_string(), id);
        id
    }

    /// The clip asset path a retimed reference's `clipAssetPaths` entry
    /// should point at, lazily allocating the backing clip stage via
    /// [`Self::clip_for`] (spec.md §4.4.3).
    pub(crate) fn clip_asset_path(&mut self, prim_path: &str) -> String {
        let id = self.clip_for(prim_path);
        self.stages.get(id).expect("just allocated").identifier.clone()
    }

    /// Serializes every open layer and writes it through `conn`.
    pub fn save(&self, conn: &mut dyn Connection) -> Result<()> {
        if !self.valid {
            return Err(BridgeError::SessionInvalid);
        }
        for (_, layer) in self.all_layers() {
            let text = layer.to_usda();
            conn.write_file(text.as_bytes(), &layer.identifier, true, false)?;
        }
        conn.process_updates()?;
        Ok(())
    }

    fn all_layers(&self) -> Vec<(LayerId, &Layer)> {
        let mut out = vec![(self.master, self.master_layer())];
        for &id in self.manifests.values() {
            if let Some(l) = self.stages.get(id) {
                out.push((id, l));
            }
        }
        for &id in self.clips.values() {
            if let Some(l) = self.stages.get(id) {
                out.push((id, l));
            }
        }
        out
    }
}

pub(crate) fn sanitize_for_filename(path: &str) -> String {
    path.trim_start_matches('/').replace('/', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::TestConnection;

    #[test]
    fn session_numbering_picks_max_plus_one() {
        let mut conn = TestConnection::new();
        conn.folders.push("Session_0".into());
        conn.folders.push("Session_2".into());
        let settings = BridgeSettings::default();
        let writer = UsdWriter::initialize_session(&mut conn, &settings).unwrap();
        assert_eq!(writer.session_dir(), "Session_3");
    }

    #[test]
    fn root_class_and_root_prim_exist_after_init() {
        let mut conn = TestConnection::new();
        let settings = BridgeSettings::default();
        let writer = UsdWriter::initialize_session(&mut conn, &settings).unwrap();
        assert!(writer.master_layer().has_prim("/RootClass"));
        assert!(writer.master_layer().has_prim("/Root"));
    }
}
