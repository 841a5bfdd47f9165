//! Parameterized Object (spec.md §4.2 / §3 "Parameter record")
//!
//! Every entity owns one `ParameterizedObject`: two parallel records
//! (write, read) of parameter values. The client only ever mutates the
//! write record via [`ParameterizedObject::set_param`]; a commit snapshots
//! write into read via [`ParameterizedObject::transfer_write_to_read`],
//! which is the only place object/string refcounts move between the two
//! records. The writer only ever consults the read record.

use rustc_hash::FxHashMap;

use crate::object::ObjectHandle;
use crate::params::map::ParameterMap;
use crate::params::value::ParamValue;

/// A callback invoked whenever a ref-counted parameter value (an object
/// or an array-of-objects handle) gains or loses a reference from this
/// parameter slot. `inc == true` means "this slot now points here, bump
/// the internal refcount"; `inc == false` means the opposite.
pub type RefChange<'a> = &'a mut dyn FnMut(ObjectHandle, bool);

#[derive(Default)]
pub struct ParameterizedObject {
    write: FxHashMap<String, ParamValue>,
    read: FxHashMap<String, ParamValue>,
    /// Mirrors the source's `paramChanged` flag: true once *any* param
    /// （other than `usd::time`) has changed since the last commit.
    param_changed: bool,
}

impl ParameterizedObject {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn read(&self, name: &str) -> Option<&ParamValue> {
        self.read.get(name)
    }

    #[must_use]
    pub fn write_value(&self, name: &str) -> Option<&ParamValue> {
        self.write.get(name)
    }

    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.param_changed
    }

    pub fn clear_changed(&mut self) {
        self.param_changed = false;
    }

    /// Validates `value`'s type against the registered parameter, then
    /// installs it iff its content differs from the current write value
    /// (spec.md §4.2: "compares new value to the current write-slot value
    /// (content comparison, not just pointer)"). Unknown names are
    /// silently ignored (spec.md §6); type mismatches warn and are not
    /// applied (spec.md §6/§7).
    pub fn set_param(&mut self, map: &ParameterMap, name: &str, value: ParamValue, on_ref: RefChange<'_>) {
        let Some(descriptor) = map.get(name) else {
            return;
        };
        let Some(tag) = value.type_tag() else {
            return;
        };
        if !descriptor.accepts(tag) {
            log::warn!("param '{name}' set with a type outside its accepted set; ignored");
            return;
        }

        let previous = self.write.get(name).cloned().unwrap_or(ParamValue::None);
        if previous == value {
            return;
        }

        if let Some(h) = previous.as_object() {
            on_ref(h, false);
        }
        if let Some(h) = value.as_object() {
            on_ref(h, true);
        }

        self.write.insert(name.to_string(), value);

        // Retiming an existing reference via `usd::time` must not force a
        // full re-commit of whatever object holds the reference.
        if name != "usd::time" {
            self.param_changed = true;
        }
    }

    /// Restores a single parameter's write slot to its registered default.
    pub fn reset_param(&mut self, map: &ParameterMap, name: &str, on_ref: RefChange<'_>) {
        let Some(descriptor) = map.get(name) else {
            return;
        };
        let previous = self.write.get(name).cloned().unwrap_or(ParamValue::None);
        if let Some(h) = previous.as_object() {
            on_ref(h, false);
        }
        self.write.insert(name.to_string(), descriptor.default.clone());
        if name != "usd::time" {
            self.param_changed = true;
        }
    }

    /// Restores every registered parameter to its default.
    pub fn reset_params(&mut self, map: &ParameterMap, mut on_ref: impl FnMut(ObjectHandle, bool)) {
        let names: Vec<&'static str> = map.iter().map(|d| d.name).collect();
        for name in names {
            self.reset_param(map, name, &mut on_ref);
        }
        self.param_changed = true;
    }

    /// Snapshots the write record into the read record. Per-parameter,
    /// byte-for-byte (here: value-for-value) comparison decides whether
    /// anything moves; when it does, the incoming write-side reference is
    /// incremented *before* the outgoing read-side reference is
    /// decremented, so that re-assigning the same object is a no-op
    /// (spec.md §4.2).
    pub fn transfer_write_to_read(&mut self, mut on_ref: impl FnMut(ObjectHandle, bool)) {
        let mut names: Vec<String> = self.write.keys().cloned().collect();
        for k in self.read.keys() {
            if !self.write.contains_key(k) {
                names.push(k.clone());
            }
        }

        for name in names {
            let src = self.write.get(&name).cloned().unwrap_or(ParamValue::None);
            let dest = self.read.get(&name).cloned().unwrap_or(ParamValue::None);
            if src == dest {
                continue;
            }
            if let Some(h) = src.as_object() {
                on_ref(h, true);
            }
            if let Some(h) = dest.as_object() {
                on_ref(h, false);
            }
            self.read.insert(name, src);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectGraph;
    use crate::params::map::ParamTypeTag;
    use crate::types::{ScalarKind, SourceType};

    fn test_map() -> ParameterMap {
        let mut m = ParameterMap::new();
        m.register(
            "radius",
            ParamTypeTag::Source(SourceType::Scalar(ScalarKind::Float)),
            ParamValue::Float(1.0),
        );
        m.register("material", ParamTypeTag::Object, ParamValue::None);
        m.register("usd::time", ParamTypeTag::Source(SourceType::Scalar(ScalarKind::Double)), ParamValue::Double(0.0));
        m
    }

    #[test]
    fn setting_usd_time_does_not_mark_changed() {
        let map = test_map();
        let mut obj = ParameterizedObject::new();
        obj.set_param(&map, "usd::time", ParamValue::Double(1.0), &mut |_, _| {});
        assert!(!obj.has_changed());
    }

    #[test]
    fn setting_a_normal_param_marks_changed() {
        let map = test_map();
        let mut obj = ParameterizedObject::new();
        obj.set_param(&map, "radius", ParamValue::Float(2.0), &mut |_, _| {});
        assert!(obj.has_changed());
    }

    #[test]
    fn unknown_type_is_rejected_without_marking_changed() {
        let map = test_map();
        let mut obj = ParameterizedObject::new();
        obj.set_param(&map, "radius", ParamValue::Bool(true), &mut |_, _| {});
        assert!(!obj.has_changed());
        assert!(obj.write_value("radius").is_none());
    }

    #[test]
    fn refcount_conservation_across_set_transfer_release() {
        let map = test_map();
        let mut graph = ObjectGraph::new();
        let material_a = graph.create(crate::object::ObjectKind::Material, None);
        let material_b = graph.create(crate::object::ObjectKind::Material, None);

        let mut surface = ParameterizedObject::new();
        surface.set_param(&map, "material", ParamValue::Object(material_a), &mut |h, inc| {
            if inc {
                graph.internal_inc(h);
            } else {
                graph.internal_dec(h);
            }
        });
        surface.transfer_write_to_read(&mut |h, inc| {
            if inc {
                graph.internal_inc(h);
            } else {
                graph.internal_dec(h);
            }
        });
        // material_a is now referenced from both the write slot and the
        // (just-transferred) read slot: two independent +1s land on it.
        assert_eq!(graph.get(material_a).unwrap().internal_count(), 2);

        // Swap to material_b: inc b then dec a happens on both set + transfer.
        surface.set_param(&map, "material", ParamValue::Object(material_b), &mut |h, inc| {
            if inc {
                graph.internal_inc(h);
            } else {
                graph.internal_dec(h);
            }
        });
        surface.transfer_write_to_read(&mut |h, inc| {
            if inc {
                graph.internal_inc(h);
            } else {
                graph.internal_dec(h);
            }
        });
        assert_eq!(graph.get(material_a).unwrap().internal_count(), 0);
        assert_eq!(graph.get(material_b).unwrap().internal_count(), 2);
    }
}
