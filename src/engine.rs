//! Engine Facade (spec.md §4.5): the single entry point tying the object
//! graph, prim cache, shared-resource registry, and USD writer together
//! behind a session/object/commit lifecycle.

use glam::Vec3;
use rustc_hash::FxHashMap;

use crate::cache::manager::PrimCacheManager;
use crate::cache::entry::PrimCacheHandle;
use crate::connection::{Connection, ConnectionSettings};
use crate::diagnostic::{Diagnostics, DiagnosticSink};
use crate::errors::{BridgeError, Result};
use crate::object::{LightKind, ObjectGraph, ObjectHandle, ObjectKind};
use crate::params::map::{ParamTypeTag, ParameterMap};
use crate::params::object::ParameterizedObject;
use crate::params::value::ParamValue;
use crate::resources_registry::SharedResourceRegistry;
use crate::settings::BridgeSettings;
use crate::timecode::TimeCode;
use crate::volume::{VolumeData, VolumeWriter};
use crate::writer::attributes::TimeVaryingBits;
use crate::writer::clips::ClipTimeline;
use crate::writer::materials::ChannelBinding;
use crate::writer::{geometry, UsdWriter};

/// Ties an [`ObjectHandle`] to its [`PrimCacheHandle`] and canonical prim
/// path; the object graph and the prim cache are deliberately separate
/// arenas (spec.md §3), so the engine is what keeps the two indices in
/// sync.
struct EntityRecord {
    cache_handle: PrimCacheHandle,
    prim_path: String,
    /// The `/Root/<category>/<name>` referencing prim, when this entity is
    /// root-anchored (`None` otherwise).
    root_ref_path: Option<String>,
    /// The write/read parameter record every entity owns (spec.md §4.2),
    /// validated against [`Engine::common_params`].
    params: ParameterizedObject,
}

/// The parameter names every entity accepts regardless of its object kind
/// (spec.md §4.2: `usd::time` retimes a reference without marking the
/// owner changed; `usd::timevarying` toggles whether its next commit is
/// authored as a time sample or a uniform).
fn build_common_params() -> ParameterMap {
    let mut map = ParameterMap::new();
    map.register("usd::time", ParamTypeTag::Source(crate::types::SourceType::Scalar(crate::types::ScalarKind::Double)), ParamValue::Double(0.0));
    map.register("usd::timevarying", ParamTypeTag::Bool, ParamValue::Bool(false));
    map
}

/// Kinds with no natural parent in the object graph are anchored directly
/// under `/Root` on creation (spec.md §8 scenario S1: `/Root/worlds/W` and
/// `/Root/surfaces/S` both exist with no intervening instance), mirroring
/// the prim cache's `attach_root`/`detach_root` "implicit extra reference"
/// for a world/light/camera living at the stage root.
fn is_root_attached(kind: ObjectKind) -> bool {
    matches!(
        kind,
        ObjectKind::World
            | ObjectKind::Surface
            | ObjectKind::Volume
            | ObjectKind::Group
            | ObjectKind::Renderer
            | ObjectKind::Frame
            | ObjectKind::Light(_)
            | ObjectKind::Camera
    )
}

/// The top-level façade a client embeds (spec.md §4.5).
pub struct Engine {
    graph: ObjectGraph,
    cache: PrimCacheManager,
    resources: SharedResourceRegistry,
    writer: Option<UsdWriter>,
    diagnostics: Diagnostics,
    settings: BridgeSettings,
    entities: FxHashMap<ObjectHandle, EntityRecord>,
    enable_saving: bool,
    common_params: ParameterMap,
    /// One [`ClipTimeline`] per referencing prim path, populated only when
    /// `settings.value_clip_retiming` is enabled (spec.md §4.4.3).
    ref_timelines: FxHashMap<String, ClipTimeline>,
}

impl Engine {
    #[must_use]
    pub fn new(settings: BridgeSettings) -> Self {
        Self {
            graph: ObjectGraph::new(),
            cache: PrimCacheManager::new(),
            resources: SharedResourceRegistry::new(),
            writer: None,
            diagnostics: Diagnostics::new(),
            settings,
            entities: FxHashMap::default(),
            enable_saving: true,
            common_params: build_common_params(),
            ref_timelines: FxHashMap::default(),
        }
    }

    /// `openSession(logCallback, userData)` (spec.md §4.5): installs the
    /// diagnostic delegate and opens the writer's session against `conn`.
    pub fn open_session(&mut self, conn: &mut dyn Connection, sink: Option<Box<dyn DiagnosticSink + Send>>) -> Result<()> {
        if let Some(sink) = sink {
            self.diagnostics.set_sink(sink);
        }
        self.diagnostics.status("opening bridge session");
        conn.initialize(&ConnectionSettings {
            host: self.settings.host.clone(),
            working_dir: self.settings.working_dir.clone(),
        })?;
        match UsdWriter::initialize_session(conn, &self.settings) {
            Ok(writer) => {
                self.writer = Some(writer);
                Ok(())
            }
            Err(err) => {
                self.diagnostics.error(&format!("session initialization failed: {err}"));
                Err(err)
            }
        }
    }

    pub fn set_enable_saving(&mut self, enable: bool) {
        self.enable_saving = enable;
    }

    fn writer_mut(&mut self) -> Result<&mut UsdWriter> {
        self.writer.as_mut().filter(|w| w.is_valid()).ok_or(BridgeError::SessionInvalid)
    }

    /// `createX(name, ...)` (spec.md §4.5): allocates the object-graph node
    /// and its backing prim-cache entry, creating the prim on first sight
    /// of this `(category, sanitized name)` pair (spec.md §4.3).
    pub fn create_object(&mut self, kind: ObjectKind, name: Option<String>) -> Result<ObjectHandle> {
        let handle = self.graph.create(kind, name);
        let object_name = self.graph.get(handle).expect("just created").name.clone();
        let writer_ref = &self.writer;
        let (existed_in_stage, existed_in_cache, cache_handle) = self.cache.find_or_create(
            kind.category(),
            &object_name,
            |p| writer_ref.as_ref().is_some_and(|w| w.master_layer().has_prim(p)),
        );
        let prim_path = self.cache.get(cache_handle).expect("just created or found").prim_path.clone();
        if !existed_in_cache && !existed_in_stage {
            match kind {
                ObjectKind::Material => self.writer_mut()?.define_material(&prim_path),
                ObjectKind::Sampler(_) => self.writer_mut()?.define_sampler(&prim_path),
                _ => {
                    let type_name = geometry::usd_type_name_for_kind(kind, self.settings.use_point_instancer);
                    self.writer_mut()?.define_prim(&prim_path, type_name, true);
                }
            }
        }
        let root_ref_path = if !existed_in_cache && is_root_attached(kind) {
            self.cache.attach_root(cache_handle);
            let category = kind.category();
            if existed_in_stage {
                Some(format!("/Root/{category}/{object_name}"))
            } else {
                Some(self.writer_mut()?.add_ref_no_clip("/Root", &prim_path, category, &object_name, false))
            }
        } else {
            None
        };
        self.entities.insert(handle, EntityRecord { cache_handle, prim_path, root_ref_path, params: ParameterizedObject::new() });
        Ok(handle)
    }

    /// `setParam(handle, name, value)` (spec.md §4.2, §4.5): validates and
    /// installs `value` into the entity's write record. Object-valued
    /// parameters participate in the object graph's internal refcount the
    /// moment they're set, independent of whether the entity is ever
    /// committed.
    pub fn set_param(&mut self, handle: ObjectHandle, name: &str, value: ParamValue) -> Result<()> {
        let common_params = &self.common_params;
        let graph = &mut self.graph;
        let rec = self.entities.get_mut(&handle).ok_or_else(|| BridgeError::LogicError("unknown handle".into()))?;
        rec.params.set_param(common_params, name, value, &mut |h, inc| {
            if inc {
                graph.internal_inc(h);
            } else {
                graph.internal_dec(h);
            }
        });
        Ok(())
    }

    /// Reads back a parameter's last-committed (read-record) value.
    #[must_use]
    pub fn param(&self, handle: ObjectHandle, name: &str) -> Option<&ParamValue> {
        self.entities.get(&handle)?.params.read(name)
    }

    /// `commit(handle)`'s parameter half (spec.md §4.2): snapshots the
    /// write record into the read record iff any non-`usd::time` parameter
    /// changed since the last commit, then clears the changed flag.
    /// Returns whether anything was actually transferred.
    pub fn commit_params(&mut self, handle: ObjectHandle) -> Result<bool> {
        let graph = &mut self.graph;
        let rec = self.entities.get_mut(&handle).ok_or_else(|| BridgeError::LogicError("unknown handle".into()))?;
        if !rec.params.has_changed() {
            return Ok(false);
        }
        rec.params.transfer_write_to_read(|h, inc| {
            if inc {
                graph.internal_inc(h);
            } else {
                graph.internal_dec(h);
            }
        });
        rec.params.clear_changed();
        Ok(true)
    }

    #[must_use]
    pub fn prim_path(&self, handle: ObjectHandle) -> Option<&str> {
        self.entities.get(&handle).map(|e| e.prim_path.as_str())
    }

    /// The master stage's in-memory `Layer`, for callers (and this
    /// crate's own integration tests) inspecting authored prims directly
    /// rather than through the serialized USDA text.
    #[must_use]
    pub fn master_stage(&self) -> Option<&crate::stage::Layer> {
        self.writer.as_ref().map(UsdWriter::master_layer)
    }

    pub fn retain(&mut self, handle: ObjectHandle) {
        self.graph.retain_public(handle);
    }

    /// `release` (spec.md §3 Lifecycle): decrements the public refcount;
    /// actual destruction is deferred to [`Self::garbage_collect`]. Once
    /// both refcounts reach zero, a root-anchored object's implicit
    /// `/Root` reference is also dropped so the prim cache's own
    /// structural refcount can fall to zero and be swept.
    pub fn release(&mut self, handle: ObjectHandle) {
        let became_dead = self.graph.release_public(handle);
        if became_dead {
            if let Some(rec) = self.entities.get(&handle) {
                if rec.root_ref_path.is_some() {
                    self.cache.detach_root(rec.cache_handle);
                }
            }
        }
    }

    /// `setXRefs` (spec.md §4.5, wraps §4.4.2): attaches `child` under
    /// `parent`'s category subtree, marking it visible at `t`.
    pub fn set_ref(&mut self, parent: ObjectHandle, child: ObjectHandle, t: TimeCode, time_varying: bool) -> Result<()> {
        let parent_rec_cache = self.entities.get(&parent).ok_or_else(|| BridgeError::LogicError("unknown parent handle".into()))?.cache_handle;
        let (child_path, child_name, subpath_ext, parent_path) = {
            let child_rec = self.entities.get(&child).ok_or_else(|| BridgeError::LogicError("unknown child handle".into()))?;
            let parent_rec = self.entities.get(&parent).unwrap();
            let child_kind = self.graph.get(child).ok_or_else(|| BridgeError::LogicError("dangling child".into()))?.kind;
            (child_rec.prim_path.clone(), self.graph.get(child).unwrap().name.clone(), child_kind.category().to_string(), parent_rec.prim_path.clone())
        };
        self.graph.internal_inc(child);
        let child_cache = self.entities.get(&child).unwrap().cache_handle;
        self.cache.add_child(parent_rec_cache, child_cache);
        self.cache.set_child_visible_at(parent_rec_cache, child_cache, t);

        let ref_path = format!("{parent_path}/{subpath_ext}/{child_name}");
        if self.settings.value_clip_retiming {
            let writer = self.writer.as_mut().filter(|w| w.is_valid()).ok_or(BridgeError::SessionInvalid)?;
            let clip_asset = writer.clip_asset_path(&child_path);
            let timeline = self.ref_timelines.entry(ref_path.clone()).or_default();
            writer.add_ref(&parent_path, &child_path, &subpath_ext, &child_name, t, t, &clip_asset, false, timeline);
        } else {
            self.writer_mut()?.add_ref_no_clip(&parent_path, &child_path, &subpath_ext, &child_name, false);
        }
        let is_first_visible = self.cache.get(parent_rec_cache).map_or(true, |p| p.visible_at(child_cache).map_or(true, |s| s.len() == 1));
        self.writer_mut()?.set_ref_visible(&ref_path, t, true, is_first_visible && time_varying);
        Ok(())
    }

    /// `deleteXRefs` (spec.md §4.5, wraps §4.4.2): removes one `(parent,
    /// child)` edge, updating visibility or fully removing the referencing
    /// prim per spec.md §3's "child is visible at `t` exactly if `t` is in
    /// its visible set" invariant.
    pub fn delete_ref(&mut self, parent: ObjectHandle, child: ObjectHandle, t: TimeCode) -> Result<()> {
        let parent_cache = self.entities.get(&parent).ok_or_else(|| BridgeError::LogicError("unknown parent handle".into()))?.cache_handle;
        let child_cache = self.entities.get(&child).ok_or_else(|| BridgeError::LogicError("unknown child handle".into()))?.cache_handle;
        let now_empty = self.cache.set_child_invisible_at(parent_cache, child_cache, t);

        let parent_path = self.entities.get(&parent).unwrap().prim_path.clone();
        let child_name = self.graph.get(child).ok_or_else(|| BridgeError::LogicError("dangling child".into()))?.name.clone();
        let category = self.graph.get(child).unwrap().kind.category();

        // Every other child sharing `category` under `parent` must survive
        // untouched: `manage_unused_refs` removes or hides whatever it
        // *doesn't* find in `keep_names`, so the set excludes only `child`.
        let siblings = self.cache.get(parent_cache).map(|p| p.children().to_vec()).unwrap_or_default();
        let keep_names: Vec<String> = siblings
            .into_iter()
            .filter(|&h| h != child_cache)
            .filter_map(|h| self.entities.iter().find(|(_, rec)| rec.cache_handle == h).map(|(oh, _)| *oh))
            .filter_map(|oh| self.graph.get(oh).map(|n| (n.kind.category(), n.name.clone())))
            .filter(|(cat, _)| *cat == category)
            .map(|(_, name)| name)
            .collect();

        if now_empty {
            self.cache.remove_child(parent_cache, child_cache);
            self.graph.internal_dec(child);
            self.ref_timelines.remove(&format!("{parent_path}/{category}/{child_name}"));
        }
        self.writer_mut()?.manage_unused_refs(&parent_path, category, &keep_names, !now_empty, t, |_| {})
    }

    /// Compares `bits` against the prim cache entry's last-recorded
    /// time-varying bitmask; on a transition into a non-empty set, lazily
    /// allocates the prim's manifest stage, which is where a transition
    /// away from uniform authoring first becomes visible to a consumer
    /// walking the session's stages (spec.md §4.4.4).
    fn note_time_varying_bits(&mut self, handle: ObjectHandle, bits: TimeVaryingBits) -> Result<()> {
        let rec = self.entities.get(&handle).ok_or_else(|| BridgeError::LogicError("unknown handle".into()))?;
        let (cache_handle, prim_path) = (rec.cache_handle, rec.prim_path.clone());
        let transitioned = self.cache.get_mut(cache_handle).is_some_and(|e| e.update_time_varying_bits(bits.bits()));
        if transitioned && !bits.is_empty() {
            self.writer_mut()?.manifest_for(&prim_path);
        }
        Ok(())
    }

    /// `setXData(handle, data, t)` (spec.md §4.5, wraps §4.4.5–§4.4.9): a
    /// triangle/quad mesh's points and topology.
    pub fn set_mesh_data(
        &mut self,
        handle: ObjectHandle,
        points: &[Vec3],
        face_vertex_indices: &[u32],
        face_vertex_count: usize,
        colors: Option<&[[f32; 4]]>,
        t: TimeCode,
        time_varying: TimeVaryingBits,
    ) -> Result<()> {
        self.note_time_varying_bits(handle, time_varying)?;
        let prim_path = self.prim_path(handle).ok_or_else(|| BridgeError::LogicError("unknown handle".into()))?.to_string();
        let writer = self.writer_mut()?;
        geometry::write_mesh(writer, &prim_path, points, face_vertex_indices, face_vertex_count, colors, t, time_varying)
    }

    /// Sphere glyph set: points + per-point radii (spec.md §8 scenario S2).
    pub fn set_sphere_data(&mut self, handle: ObjectHandle, points: &[Vec3], radii: &[f32], t: TimeCode, time_varying: TimeVaryingBits) -> Result<()> {
        self.note_time_varying_bits(handle, time_varying)?;
        let prim_path = self.prim_path(handle).ok_or_else(|| BridgeError::LogicError("unknown handle".into()))?.to_string();
        let writer = self.writer_mut()?;
        geometry::write_sphere_points(writer, &prim_path, points, radii, t, time_varying)
    }

    /// Cylinder glyph set: each `(p0, p1)` segment becomes one
    /// `PointInstancer` instance via [`geometry::write_segment_instances`]
    /// (spec.md §4.4.5). Cone glyphs share the same instance transform
    /// math and authoring path — the prototype geometry referenced by
    /// `protoIndices` is what distinguishes a cylinder glyph from a cone
    /// one, not this per-instance data.
    pub fn set_cylinder_data(&mut self, handle: ObjectHandle, segments: &[(Vec3, Vec3)], radii: &[f32], t: TimeCode, time_varying: TimeVaryingBits) -> Result<()> {
        self.note_time_varying_bits(handle, time_varying)?;
        let prim_path = self.prim_path(handle).ok_or_else(|| BridgeError::LogicError("unknown handle".into()))?.to_string();
        let writer = self.writer_mut()?;
        geometry::write_segment_instances(writer, &prim_path, segments, radii, t, time_varying)
    }

    /// Cone glyph set (spec.md §4.4.5); see [`Self::set_cylinder_data`].
    pub fn set_cone_data(&mut self, handle: ObjectHandle, segments: &[(Vec3, Vec3)], radii: &[f32], t: TimeCode, time_varying: TimeVaryingBits) -> Result<()> {
        self.set_cylinder_data(handle, segments, radii, t, time_varying)
    }

    /// `BasisCurves` glyph set: points, per-strip vertex counts derived
    /// from `index_pairs` via [`geometry::curve_vertex_counts`], and
    /// per-vertex widths (spec.md §4.4.5).
    pub fn set_curve_data(
        &mut self,
        handle: ObjectHandle,
        points: &[Vec3],
        index_pairs: &[(u32, u32)],
        widths: &[f32],
        t: TimeCode,
        time_varying: TimeVaryingBits,
    ) -> Result<()> {
        self.note_time_varying_bits(handle, time_varying)?;
        let prim_path = self.prim_path(handle).ok_or_else(|| BridgeError::LogicError("unknown handle".into()))?.to_string();
        let writer = self.writer_mut()?;
        geometry::write_curve_data(writer, &prim_path, points, index_pairs, widths, t, time_varying)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_camera_data(
        &mut self,
        handle: ObjectHandle,
        aspect: f32,
        fovy_radians: f32,
        near: f32,
        far: f32,
        position: Vec3,
        direction: Vec3,
        up: Vec3,
        t: TimeCode,
        time_varying: bool,
    ) -> Result<()> {
        let prim_path = self.prim_path(handle).ok_or_else(|| BridgeError::LogicError("unknown handle".into()))?.to_string();
        self.writer_mut()?.write_camera(&prim_path, aspect, fovy_radians, near, far, position, direction, up, t, time_varying);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_light_data(
        &mut self,
        handle: ObjectHandle,
        kind: LightKind,
        color: [f32; 3],
        intensity: f32,
        position: Vec3,
        direction: Vec3,
        t: TimeCode,
        time_varying: bool,
    ) -> Result<()> {
        let prim_path = self.prim_path(handle).ok_or_else(|| BridgeError::LogicError("unknown handle".into()))?.to_string();
        self.writer_mut()?.write_light(&prim_path, kind, color, intensity, position, direction, t, time_varying);
        Ok(())
    }

    pub fn bind_material_channel(&mut self, handle: ObjectHandle, channel: &str, binding: &ChannelBinding<'_>, t: TimeCode, time_varying: bool) -> Result<()> {
        let prim_path = self.prim_path(handle).ok_or_else(|| BridgeError::LogicError("unknown handle".into()))?.to_string();
        self.writer_mut()?.bind_channel(&prim_path, channel, binding, t, time_varying)
    }

    pub fn set_spatial_field_data(&mut self, handle: ObjectHandle, conn: &mut dyn Connection, volume_writer: &mut dyn VolumeWriter, t: TimeCode, data: &VolumeData) -> Result<()> {
        let (prim_path, name) = {
            let rec = self.entities.get(&handle).ok_or_else(|| BridgeError::LogicError("unknown handle".into()))?;
            (rec.prim_path.clone(), self.graph.get(handle).map(|n| n.name.clone()).unwrap_or_default())
        };
        self.writer_mut()?.write_spatial_field(conn, volume_writer, &prim_path, &name, t, data)
    }

    /// Wires a `Volume` object's `field:density` relationship to a spatial
    /// field's prim path (spec.md §8 scenario S6: "referenced by Volume").
    pub fn set_volume_field(&mut self, handle: ObjectHandle, field_prim_path: &str) -> Result<()> {
        let volume_path = self.prim_path(handle).ok_or_else(|| BridgeError::LogicError("unknown handle".into()))?.to_string();
        self.writer_mut()?.define_volume(&volume_path, field_prim_path);
        Ok(())
    }

    /// `saveScene` (spec.md §4.5): a no-op when saving has been disabled
    /// (batch runs, tests that only inspect the in-memory stage).
    pub fn save_scene(&mut self, conn: &mut dyn Connection) -> Result<()> {
        if !self.enable_saving {
            return Ok(());
        }
        self.resources.begin_frame();
        self.writer_mut()?.save(conn)
    }

    /// `garbageCollect` (spec.md §4.5): runs the two-pass prim-cache GC,
    /// removing each orphaned prim from the master stage, then saves.
    pub fn garbage_collect(&mut self, conn: &mut dyn Connection) -> Result<()> {
        let mut removed_paths = Vec::new();
        self.cache.remove_unreferenced(|cache_handle| {
            if let Some((handle, _)) = self.entities.iter().find(|(_, rec)| rec.cache_handle == cache_handle) {
                removed_paths.push((*handle, ));
            }
        });
        let removed_handles: Vec<ObjectHandle> = removed_paths.into_iter().map(|(h,)| h).collect();
        for handle in removed_handles {
            if let Some(rec) = self.entities.remove(&handle) {
                if let Some(writer) = self.writer.as_mut() {
                    writer.master_layer_mut().remove_prim(&rec.prim_path);
                    if let Some(ref_path) = &rec.root_ref_path {
                        writer.master_layer_mut().remove_prim(ref_path);
                    }
                }
                self.graph.destroy(handle);
            }
        }
        self.save_scene(conn)
    }

    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::TestConnection;
    use crate::object::GeometryKind;

    fn new_engine() -> (Engine, TestConnection) {
        let mut conn = TestConnection::new();
        let mut engine = Engine::new(BridgeSettings::default());
        engine.open_session(&mut conn, None).unwrap();
        (engine, conn)
    }

    #[test]
    fn create_object_allocates_a_deterministic_prim_path() {
        let (mut engine, _conn) = new_engine();
        let h = engine.create_object(ObjectKind::Geometry(GeometryKind::Mesh), Some("Tri".into())).unwrap();
        assert_eq!(engine.prim_path(h), Some("/RootClass/geometries/Tri"));
    }

    #[test]
    fn set_mesh_data_authors_triangle_attributes() {
        let (mut engine, _conn) = new_engine();
        let h = engine.create_object(ObjectKind::Geometry(GeometryKind::Triangle), Some("T".into())).unwrap();
        let points = vec![Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, -1.0, 0.0), Vec3::new(0.0, 1.0, 0.0)];
        engine.set_mesh_data(h, &points, &[0, 1, 2], 3, None, TimeCode(0.0), TimeVaryingBits::empty()).unwrap();
        let path = engine.prim_path(h).unwrap().to_string();
        let writer = engine.writer.as_ref().unwrap();
        assert!(writer.master_layer().has_prim(&path));
    }

    #[test]
    fn set_param_is_invisible_until_committed_then_readable() {
        let (mut engine, _conn) = new_engine();
        let h = engine.create_object(ObjectKind::Geometry(GeometryKind::Mesh), Some("M".into())).unwrap();
        engine.set_param(h, "usd::timevarying", ParamValue::Bool(true)).unwrap();
        assert_eq!(engine.param(h, "usd::timevarying"), None);
        assert!(engine.commit_params(h).unwrap());
        assert_eq!(engine.param(h, "usd::timevarying"), Some(&ParamValue::Bool(true)));
        assert!(!engine.commit_params(h).unwrap());
    }

    #[test]
    fn setting_usd_time_does_not_require_a_commit_to_retime() {
        let (mut engine, _conn) = new_engine();
        let h = engine.create_object(ObjectKind::Geometry(GeometryKind::Mesh), Some("M2".into())).unwrap();
        engine.set_param(h, "usd::time", ParamValue::Double(4.0)).unwrap();
        assert!(!engine.commit_params(h).unwrap());
    }

    #[test]
    fn mesh_data_transitioning_into_time_varying_allocates_a_manifest_stage() {
        let (mut engine, _conn) = new_engine();
        let h = engine.create_object(ObjectKind::Geometry(GeometryKind::Triangle), Some("T2".into())).unwrap();
        let points = vec![Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, -1.0, 0.0), Vec3::new(0.0, 1.0, 0.0)];
        engine.set_mesh_data(h, &points, &[0, 1, 2], 3, None, TimeCode(0.0), TimeVaryingBits::empty()).unwrap();
        assert!(engine.writer.as_ref().unwrap().manifests.is_empty());

        engine.set_mesh_data(h, &points, &[0, 1, 2], 3, None, TimeCode(1.0), TimeVaryingBits::POSITIONS).unwrap();
        assert_eq!(engine.writer.as_ref().unwrap().manifests.len(), 1);

        // No further transition on a repeated identical bitmask.
        engine.set_mesh_data(h, &points, &[0, 1, 2], 3, None, TimeCode(2.0), TimeVaryingBits::POSITIONS).unwrap();
        assert_eq!(engine.writer.as_ref().unwrap().manifests.len(), 1);
    }

    #[test]
    fn set_cylinder_data_authors_point_instancer_attributes() {
        let (mut engine, _conn) = new_engine();
        let h = engine.create_object(ObjectKind::Geometry(GeometryKind::Cylinder), Some("C".into())).unwrap();
        let segments = [(Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 2.0))];
        engine.set_cylinder_data(h, &segments, &[0.5], TimeCode(0.0), TimeVaryingBits::empty()).unwrap();
        let path = engine.prim_path(h).unwrap().to_string();
        let writer = engine.writer.as_ref().unwrap();
        let prim = writer.master_layer().get_prim(&path).unwrap();
        assert!(prim.attribute("positions").is_some());
        assert!(prim.attribute("orientations").is_some());
        assert!(prim.attribute("protoIndices").is_some());
    }

    #[test]
    fn set_curve_data_splits_strips_at_index_pair_discontinuities() {
        let (mut engine, _conn) = new_engine();
        let h = engine.create_object(ObjectKind::Geometry(GeometryKind::Curve), Some("Cv".into())).unwrap();
        let points = vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)];
        engine
            .set_curve_data(h, &points, &[(0, 1), (1, 2)], &[0.1, 0.1, 0.1], TimeCode(0.0), TimeVaryingBits::empty())
            .unwrap();
        let path = engine.prim_path(h).unwrap().to_string();
        let writer = engine.writer.as_ref().unwrap();
        let prim = writer.master_layer().get_prim(&path).unwrap();
        assert!(prim.attribute("curveVertexCounts").is_some());
        assert!(prim.attribute("widths").is_some());
    }

    #[test]
    fn release_without_commit_still_leaves_object_collectible_by_gc() {
        let (mut engine, mut conn) = new_engine();
        let world = engine.create_object(ObjectKind::World, Some("W".into())).unwrap();
        let inst = engine.create_object(ObjectKind::Instance, Some("I".into())).unwrap();
        engine.set_ref(world, inst, TimeCode(0.0), false).unwrap();
        engine.release(inst);
        engine.release(world);
        engine.garbage_collect(&mut conn).unwrap();
        assert!(engine.prim_path(inst).is_none());
    }
}
