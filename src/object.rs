//! Object layer (spec.md §3 "Object")
//!
//! Every client-visible entity is a node in a single [`ObjectGraph`] arena,
//! addressed by a [`slotmap`] handle rather than an owning pointer. This
//! sidesteps the destructor-ordering hazards the original's intrusive
//! refcounted pointers are prone to (spec.md §9 design note) while keeping
//! the same dual-refcount semantics: a **public** count held by the client
//! facade, and an **internal** count held by whatever else in the graph
//! (parents, the array-of-objects that references it, ...) points at it.
//! An object is only dropped from the arena once both reach zero and it
//! has been swept by [`crate::cache::PrimCacheManager::remove_unreferenced`].

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

use crate::params::object::ParameterizedObject;

new_key_type! {
    /// Handle to an entity in the object graph. Stable for the object's
    /// lifetime; never reused meaningfully once released (slotmap
    /// generations guard against stale handles silently aliasing).
    pub struct ObjectHandle;
}

/// The polymorphic entity kinds the bridge materializes into USD prims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    World,
    Instance,
    Group,
    Surface,
    Volume,
    SpatialField,
    Geometry(GeometryKind),
    Material,
    Sampler(SamplerDim),
    Light(LightKind),
    Camera,
    DataArray,
    Frame,
    Renderer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Mesh,
    Sphere,
    Cylinder,
    Cone,
    Curve,
    Quad,
    Triangle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerDim {
    D1,
    D2,
    D3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    Directional,
    Point,
    Dome,
}

impl ObjectKind {
    /// A short, stable category name used for prim path and cache lookups
    /// (spec.md §4.3: `"worlds"`, `"instances"`, ...).
    #[must_use]
    pub fn category(self) -> &'static str {
        match self {
            ObjectKind::World => "worlds",
            ObjectKind::Instance => "instances",
            ObjectKind::Group => "groups",
            ObjectKind::Surface => "surfaces",
            ObjectKind::Volume => "volumes",
            ObjectKind::SpatialField => "spatialfields",
            ObjectKind::Geometry(_) => "geometries",
            ObjectKind::Material => "materials",
            ObjectKind::Sampler(_) => "samplers",
            ObjectKind::Light(_) => "lights",
            ObjectKind::Camera => "cameras",
            ObjectKind::DataArray => "arrays",
            ObjectKind::Frame => "frames",
            ObjectKind::Renderer => "renderers",
        }
    }
}

/// One node in the object graph: identity, the dual-refcount pair, and
/// its parameter storage.
pub struct ObjectNode {
    pub kind: ObjectKind,
    pub name: String,
    pub params: ParameterizedObject,
    public_count: u32,
    internal_count: u32,
}

impl ObjectNode {
    #[must_use]
    pub fn public_count(&self) -> u32 {
        self.public_count
    }

    #[must_use]
    pub fn internal_count(&self) -> u32 {
        self.internal_count
    }

    /// Total refcount conservation invariant (spec.md §8 property 2):
    /// an object is live exactly while this is nonzero.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.public_count > 0 || self.internal_count > 0
    }
}

/// The arena holding every live object, keyed by [`ObjectHandle`].
///
/// Auto-generated names are deterministic (`"{category}_{n}"`) so that
/// two runs of the same client program produce the same prim paths, which
/// spec.md §3 requires ("a stable printable name ... yields a deterministic
/// USD prim path").
#[derive(Default)]
pub struct ObjectGraph {
    nodes: SlotMap<ObjectHandle, ObjectNode>,
    auto_name_counters: FxHashMap<&'static str, u32>,
}

impl ObjectGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new object with public refcount 1 (the handle returned to
    /// the client counts as the first public reference).
    pub fn create(&mut self, kind: ObjectKind, name: Option<String>) -> ObjectHandle {
        let name = name.unwrap_or_else(|| self.next_auto_name(kind));
        self.nodes.insert(ObjectNode {
            kind,
            name,
            params: ParameterizedObject::new(),
            public_count: 1,
            internal_count: 0,
        })
    }

    fn next_auto_name(&mut self, kind: ObjectKind) -> String {
        let category = kind.category();
        let counter = self.auto_name_counters.entry(category).or_insert(0);
        let n = *counter;
        *counter += 1;
        format!("{category}_{n}")
    }

    #[must_use]
    pub fn get(&self, handle: ObjectHandle) -> Option<&ObjectNode> {
        self.nodes.get(handle)
    }

    #[must_use]
    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut ObjectNode> {
        self.nodes.get_mut(handle)
    }

    /// Client takes an explicit additional public reference.
    pub fn retain_public(&mut self, handle: ObjectHandle) {
        if let Some(node) = self.nodes.get_mut(handle) {
            node.public_count += 1;
        }
    }

    /// Client releases a public reference. Returns `true` if the object
    /// became eligible for collection (both counts now zero).
    pub fn release_public(&mut self, handle: ObjectHandle) -> bool {
        if let Some(node) = self.nodes.get_mut(handle) {
            node.public_count = node.public_count.saturating_sub(1);
            !node.is_live()
        } else {
            false
        }
    }

    /// Increment the internal refcount: called whenever this object
    /// becomes referenced by another object's parameter, an array
    /// element, or a prim-cache parent/child edge.
    pub fn internal_inc(&mut self, handle: ObjectHandle) {
        if let Some(node) = self.nodes.get_mut(handle) {
            node.internal_count += 1;
        }
    }

    /// Decrement the internal refcount, mirroring `internal_inc`.
    pub fn internal_dec(&mut self, handle: ObjectHandle) {
        if let Some(node) = self.nodes.get_mut(handle) {
            node.internal_count = node.internal_count.saturating_sub(1);
        }
    }

    /// Drops an object from the arena outright. Callers must ensure it is
    /// no longer live and no longer referenced from the prim cache.
    pub fn destroy(&mut self, handle: ObjectHandle) -> Option<ObjectNode> {
        self.nodes.remove(handle)
    }

    #[must_use]
    pub fn sum_internal_refcounts(&self) -> u64 {
        self.nodes.values().map(|n| u64::from(n.internal_count())).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_names_are_deterministic_per_category() {
        let mut graph = ObjectGraph::new();
        let a = graph.create(ObjectKind::Surface, None);
        let b = graph.create(ObjectKind::Surface, None);
        assert_eq!(graph.get(a).unwrap().name, "surfaces_0");
        assert_eq!(graph.get(b).unwrap().name, "surfaces_1");
    }

    #[test]
    fn release_reports_collectability_only_when_both_counts_are_zero() {
        let mut graph = ObjectGraph::new();
        let h = graph.create(ObjectKind::Group, Some("G".into()));
        graph.internal_inc(h);
        assert!(!graph.release_public(h));
        graph.internal_dec(h);
        // Already released its one public ref above; now both are zero.
        assert!(!graph.get(h).unwrap().is_live());
    }
}
