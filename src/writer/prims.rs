//! Prim creation and reference management (spec.md §4.4.2, §4.4.11).

use crate::errors::Result;
use crate::stage::Reference;
use crate::timecode::TimeCode;
use crate::writer::clips::ClipTimeline;
use crate::writer::session::UsdWriter;

/// A referencing prim's lifecycle state (spec.md §4.4.11):
/// `NONEXISTENT -> CREATED -> (VISIBLE_AT_T | INVISIBLE_AT_T)* -> REMOVED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefState {
    Created,
    VisibleAt,
    InvisibleAt,
    Removed,
}

impl UsdWriter {
    /// Creates (or updates the type of) the backing prim for an entity at
    /// `prim_path`. `uniform=false` writes a manifest-stage stand-in that
    /// only enumerates the prim's existence, not its fixed-topology
    /// attributes (spec.md §4.4.2).
    pub fn define_prim(&mut self, prim_path: &str, type_name: &str, uniform: bool) {
        if uniform {
            self.master_layer_mut().define_prim(prim_path, type_name);
        } else {
            let manifest = self.manifest_for(prim_path);
            if let Some(layer) = self.stages.get_mut(manifest) {
                layer.define_prim(prim_path, type_name);
            }
        }
    }

    /// `addRefNoClip` (spec.md §4.4.2): creates `parent/subpathExt/childName`
    /// referencing the child's canonical path, with no value-clip metadata.
    pub fn add_ref_no_clip(&mut self, parent_path: &str, child_path: &str, subpath_ext: &str, child_name: &str, instanceable: bool) -> String {
        let ref_path = format!("{parent_path}/{subpath_ext}/{child_name}");
        let layer = self.master_layer_mut();
        let prim = layer.over_prim(&ref_path);
        prim.instanceable = instanceable;
        prim.references = vec![Reference {
            asset_path: None,
            prim_path: child_path.to_string(),
        }];
        self.ref_states.insert(ref_path.clone(), RefState::Created);
        ref_path
    }

    /// `addRef` (spec.md §4.4.2/§4.4.3): same as [`Self::add_ref_no_clip`],
    /// plus value-clip metadata retiming the child's animation into the
    /// parent's timeline when `value_clip_retiming` is enabled.
    pub fn add_ref(
        &mut self,
        parent_path: &str,
        child_path: &str,
        subpath_ext: &str,
        child_name: &str,
        parent_time: TimeCode,
        child_time: TimeCode,
        clip_asset: &str,
        instanceable: bool,
        timeline: &mut ClipTimeline,
    ) -> String {
        let ref_path = self.add_ref_no_clip(parent_path, child_path, subpath_ext, child_name, instanceable);
        if self.value_clip_retiming {
            timeline.record(parent_time, child_time, clip_asset);
            let metadata = timeline.render_metadata();
            if let Some(prim) = self.master_layer_mut().get_prim_mut(&ref_path) {
                prim.custom_metadata = metadata;
            }
        }
        ref_path
    }

    /// Authors `visibility` on a referencing prim at `t`; when first made
    /// visible, defensively also authors it at the stage's time-range
    /// bounds (spec.md §4.4.2: "defensively ... at the stage's global
    /// start/end when first made visible").
    pub fn set_ref_visible(&mut self, ref_path: &str, t: TimeCode, visible: bool, is_first_visible: bool) {
        let (start, end) = {
            let layer = self.master_layer();
            (layer.start_time_code, layer.end_time_code)
        };
        let value = if visible { "\"inherited\"" } else { "\"invisible\"" };
        let layer = self.master_layer_mut();
        layer.extend_time_range(t.get());
        if let Some(prim) = layer.get_prim_mut(ref_path) {
            prim.set_time_sample("visibility", crate::types::UsdValueType::Token, false, t, value.into());
            if visible && is_first_visible {
                prim.set_time_sample("visibility", crate::types::UsdValueType::Token, false, TimeCode(start), value.into());
                prim.set_time_sample("visibility", crate::types::UsdValueType::Token, false, TimeCode(end), value.into());
            }
            let state = if visible { RefState::VisibleAt } else { RefState::InvisibleAt };
            self.ref_states.insert(ref_path.to_string(), state);
        }
    }

    /// `manageUnusedRefs` (spec.md §4.4.2): any existing reference under
    /// `parent/subpath_ext` not present in `keep_names` is made invisible
    /// at `t` (if time-varying and still visible elsewhere) or removed
    /// entirely.
    pub fn manage_unused_refs(
        &mut self,
        parent_path: &str,
        subpath_ext: &str,
        keep_names: &[String],
        time_varying: bool,
        t: TimeCode,
        mut on_remove: impl FnMut(&str),
    ) -> Result<()> {
        let prefix = format!("{parent_path}/{subpath_ext}/");
        let existing: Vec<String> = self
            .master_layer()
            .prim_order_under(&prefix)
            .into_iter()
            .map(str::to_string)
            .collect();

        for path in existing {
            let leaf = path.rsplit('/').next().unwrap_or(&path).to_string();
            if keep_names.contains(&leaf) {
                continue;
            }
            if time_varying {
                self.set_ref_visible(&path, t, false, false);
            } else {
                self.master_layer_mut().remove_prim(&path);
                self.ref_states.insert(path.clone(), RefState::Removed);
                on_remove(&leaf);
            }
        }
        Ok(())
    }

    /// `removeAllRefs` (spec.md §4.4.2): unconditional bulk removal.
    pub fn remove_all_refs(&mut self, parent_path: &str, subpath_ext: &str, mut on_remove: impl FnMut(&str)) {
        let prefix = format!("{parent_path}/{subpath_ext}/");
        let existing: Vec<String> = self
            .master_layer()
            .prim_order_under(&prefix)
            .into_iter()
            .map(str::to_string)
            .collect();
        for path in existing {
            self.master_layer_mut().remove_prim(&path);
            self.ref_states.insert(path.clone(), RefState::Removed);
            let leaf = path.rsplit('/').next().unwrap_or(&path).to_string();
            on_remove(&leaf);
        }
    }
}

impl crate::stage::Layer {
    /// Direct (one-level) children under `prefix`, used by reference
    /// bookkeeping that walks a category subtree.
    pub(crate) fn prim_order_under(&self, prefix: &str) -> Vec<&str> {
        self.prim_paths()
            .filter(|p| p.starts_with(prefix) && !p[prefix.len()..].contains('/'))
            .collect()
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
    fn add_ref_no_clip_creates_referencing_prim() {
        let mut writer = new_writer();
        writer.define_prim("/RootClass/instances/I", "Xform", true);
        let ref_path = writer.add_ref_no_clip("/Root/worlds/W", "/RootClass/instances/I", "instances", "I", false);
        assert_eq!(ref_path, "/Root/worlds/W/instances/I");
        let prim = writer.master_layer().get_prim(&ref_path).unwrap();
        assert_eq!(prim.references[0].prim_path, "/RootClass/instances/I");
    }

    #[test]
    fn manage_unused_refs_removes_refs_not_in_keep_set_when_not_time_varying() {
        let mut writer = new_writer();
        writer.add_ref_no_clip("/Root/worlds/W", "/RootClass/instances/I", "instances", "I", false);
        let mut removed = Vec::new();
        writer
            .manage_unused_refs("/Root/worlds/W", "instances", &[], false, TimeCode(0.0), |n| removed.push(n.to_string()))
            .unwrap();
        assert_eq!(removed, ["I"]);
        assert!(writer.master_layer().get_prim("/Root/worlds/W/instances/I").is_none());
    }

    #[test]
    fn ref_state_tracks_created_then_visible_then_removed() {
        let mut writer = new_writer();
        let ref_path = writer.add_ref_no_clip("/Root/worlds/W", "/RootClass/instances/I", "instances", "I", false);
        assert_eq!(writer.ref_state(&ref_path), Some(RefState::Created));

        writer.set_ref_visible(&ref_path, TimeCode(0.0), true, true);
        assert_eq!(writer.ref_state(&ref_path), Some(RefState::VisibleAt));

        writer.set_ref_visible(&ref_path, TimeCode(1.0), false, false);
        assert_eq!(writer.ref_state(&ref_path), Some(RefState::InvisibleAt));

        writer
            .manage_unused_refs("/Root/worlds/W", "instances", &[], false, TimeCode(1.0), |_| {})
            .unwrap();
        assert_eq!(writer.ref_state(&ref_path), Some(RefState::Removed));
    }

    #[test]
    fn manage_unused_refs_hides_instead_of_removing_when_time_varying() {
        let mut writer = new_writer();
        let ref_path = writer.add_ref_no_clip("/Root/worlds/W", "/RootClass/instances/I", "instances", "I", false);
        writer.set_ref_visible(&ref_path, TimeCode(0.0), true, true);
        writer
            .manage_unused_refs("/Root/worlds/W", "instances", &[], true, TimeCode(1.0), |_| {})
            .unwrap();
        assert!(writer.master_layer().get_prim(&ref_path).is_some());
        let attr = writer.master_layer().get_prim(&ref_path).unwrap().attribute("visibility").unwrap();
        assert_eq!(attr.samples.get(&TimeCode(1.0)).unwrap(), "\"invisible\"");
    }
}
