//! Parameter Map (spec.md §4.2)
//!
//! A per-class, process-lifetime immutable table describing which
//! parameter names a class accepts and what source types each permits.
//! The original keys this by byte offset into a packed struct; in Rust
//! there is no such struct to pack; the table is keyed by name directly
//! (the same "keyed by name" lookup contract, spec.md §9 design note),
//! and each entry carries up to three accepted [`ParamTypeTag`]s plus a
//! default value used by `reset_param`.

use rustc_hash::FxHashMap;

use crate::params::value::ParamValue;
use crate::types::SourceType;

/// The kind-level tag a parameter slot accepts, used for `setParam` type
/// validation. Distinct from [`SourceType`] because parameters can also
/// hold strings, object references, and arrays, none of which are numeric
/// element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamTypeTag {
    Bool,
    Source(SourceType),
    String,
    Object,
    Array,
}

/// One registered parameter: its accepted types and its reset default.
#[derive(Clone)]
pub struct ParamDescriptor {
    pub name: &'static str,
    /// Up to three alternative accepted types, per spec.md §3 "Parameter".
    pub accepted: Vec<ParamTypeTag>,
    pub default: ParamValue,
}

impl ParamDescriptor {
    #[must_use]
    pub fn accepts(&self, tag: ParamTypeTag) -> bool {
        self.accepted.contains(&tag)
    }
}

/// The per-class table of [`ParamDescriptor`]s, built once by a class and
/// shared (by `&'static` reference or a process-wide cache) across every
/// instance of that class thereafter.
#[derive(Default, Clone)]
pub struct ParameterMap {
    entries: FxHashMap<&'static str, ParamDescriptor>,
}

impl ParameterMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a single-type parameter.
    pub fn register(&mut self, name: &'static str, tag: ParamTypeTag, default: ParamValue) -> &mut Self {
        self.entries.insert(
            name,
            ParamDescriptor {
                name,
                accepted: vec![tag],
                default,
            },
        );
        self
    }

    /// Registers a parameter accepting one of up to three alternative
    /// types (spec.md: "multi-type alternatives").
    pub fn register_multi(
        &mut self,
        name: &'static str,
        accepted: Vec<ParamTypeTag>,
        default: ParamValue,
    ) -> &mut Self {
        debug_assert!(accepted.len() <= 3, "at most three accepted types per parameter");
        self.entries.insert(
            name,
            ParamDescriptor {
                name,
                accepted,
                default,
            },
        );
        self
    }

    /// Registers an array-of-parameter entry, expanding to N indexed
    /// names (spec.md §4.2: "the registration expands to N entries, index
    /// stamped into the name"), e.g. `transform.op0`, `transform.op1`, ...
    pub fn register_indexed(
        &mut self,
        base_name: &str,
        count: usize,
        tag: ParamTypeTag,
        default: ParamValue,
    ) -> &mut Self {
        for i in 0..count {
            let name: &'static str = Box::leak(format!("{base_name}{i}").into_boxed_str());
            self.entries.insert(
                name,
                ParamDescriptor {
                    name,
                    accepted: vec![tag],
                    default: default.clone(),
                },
            );
        }
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamDescriptor> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamDescriptor> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScalarKind;

    #[test]
    fn unknown_parameter_names_are_silently_absent() {
        let map = ParameterMap::new();
        assert!(map.get("does.not.exist").is_none());
    }

    #[test]
    fn indexed_registration_expands_to_n_entries() {
        let mut map = ParameterMap::new();
        map.register_indexed(
            "transform.op",
            3,
            ParamTypeTag::Source(SourceType::Mat4),
            ParamValue::None,
        );
        assert!(map.get("transform.op0").is_some());
        assert!(map.get("transform.op1").is_some());
        assert!(map.get("transform.op2").is_some());
        assert!(map.get("transform.op3").is_none());
    }

    #[test]
    fn multitype_param_accepts_any_listed_type() {
        let mut map = ParameterMap::new();
        map.register_multi(
            "vertex.position",
            vec![
                ParamTypeTag::Source(SourceType::Vec3(ScalarKind::Float)),
                ParamTypeTag::Source(SourceType::Vec3(ScalarKind::Double)),
            ],
            ParamValue::None,
        );
        let d = map.get("vertex.position").unwrap();
        assert!(d.accepts(ParamTypeTag::Source(SourceType::Vec3(ScalarKind::Double))));
        assert!(!d.accepts(ParamTypeTag::Source(SourceType::Vec3(ScalarKind::Half))));
    }
}
