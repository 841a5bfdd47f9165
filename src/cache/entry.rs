//! Prim cache entry (spec.md §3 "Prim cache entry", §4.3).

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use slotmap::new_key_type;

use crate::stage::LayerId;
use crate::timecode::TimeCode;

new_key_type! {
    /// Handle to a [`PrimCacheEntry`] inside a [`super::manager::PrimCacheManager`].
    pub struct PrimCacheHandle;
}

/// Per-timestep visibility bookkeeping for one child under one parent:
/// the exact set of timecodes at which `addRef`/`manageUnusedRefs` have
/// declared the child prim visible.
pub type VisibleAtSet = BTreeSet<TimeCode>;

/// One persistent prim: its path, refcount, children, per-child
/// visibility, and (when value-clip retiming is enabled) its manifest and
/// clip stages.
pub struct PrimCacheEntry {
    /// `"/RootClass/<category>/<sanitized-name>"`, assigned once, never
    /// changed (spec.md §3 invariant).
    pub prim_path: String,
    pub name_token: String,

    refcount: u32,
    children: Vec<PrimCacheHandle>,
    child_visible_at: FxHashMap<PrimCacheHandle, VisibleAtSet>,

    /// Enumerates which attributes may vary over time; lazily allocated
    /// the first time this prim carries a time-varying attribute.
    pub manifest_stage: Option<LayerId>,
    /// One clip layer per active timestep (or a single prim-stage layer
    /// when `TIME_CLIP_STAGES` is disabled), keyed by timestep.
    pub clip_stages: FxHashMap<TimeCode, LayerId>,

    /// Used to detect timeVaryingBits transitions across commits
    /// (spec.md §4.4.4).
    pub last_time_varying_bits: u32,
}

impl PrimCacheEntry {
    #[must_use]
    pub fn new(prim_path: String, name_token: String) -> Self {
        Self {
            prim_path,
            name_token,
            refcount: 0,
            children: Vec::new(),
            child_visible_at: FxHashMap::default(),
            manifest_stage: None,
            clip_stages: FxHashMap::default(),
            last_time_varying_bits: 0,
        }
    }

    #[must_use]
    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    #[must_use]
    pub fn children(&self) -> &[PrimCacheHandle] {
        &self.children
    }

    pub(crate) fn inc_ref(&mut self) {
        self.refcount += 1;
    }

    pub(crate) fn dec_ref(&mut self) {
        self.refcount = self.refcount.saturating_sub(1);
    }

    pub(crate) fn add_child(&mut self, child: PrimCacheHandle) {
        self.children.push(child);
    }

    pub(crate) fn remove_child(&mut self, child: PrimCacheHandle) {
        self.children.retain(|&c| c != child);
        self.child_visible_at.remove(&child);
    }

    /// Marks `child` visible at `t`. Defensive visibility is authored by
    /// the writer separately; this just maintains the set (spec.md §4.3).
    pub fn set_child_visible_at(&mut self, child: PrimCacheHandle, t: TimeCode) {
        self.child_visible_at.entry(child).or_default().insert(t);
    }

    /// Marks `child` invisible at `t`. Returns `true` iff `t` was present
    /// **and** removing it leaves the visible set empty — the caller's
    /// signal to remove the referencing prim entirely (spec.md §4.3).
    pub fn set_child_invisible_at(&mut self, child: PrimCacheHandle, t: TimeCode) -> bool {
        let Some(set) = self.child_visible_at.get_mut(&child) else {
            return false;
        };
        let removed = set.remove(&t);
        removed && set.is_empty()
    }

    #[must_use]
    pub fn visible_at(&self, child: PrimCacheHandle) -> Option<&VisibleAtSet> {
        self.child_visible_at.get(&child)
    }

    /// Compares against the last recorded time-varying bitmask, updates
    /// it, and reports whether a transition occurred (spec.md §4.4.4).
    pub fn update_time_varying_bits(&mut self, new_bits: u32) -> bool {
        let changed = self.last_time_varying_bits != new_bits;
        self.last_time_varying_bits = new_bits;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn visibility_round_trip_restores_set_and_signals_removal() {
        let mut pool: SlotMap<PrimCacheHandle, ()> = SlotMap::with_key();
        let child = pool.insert(());
        let mut entry = PrimCacheEntry::new("/RootClass/worlds/W".into(), "W".into());

        entry.set_child_visible_at(child, TimeCode(0.0));
        assert!(entry.visible_at(child).unwrap().contains(&TimeCode(0.0)));

        let became_empty = entry.set_child_invisible_at(child, TimeCode(0.0));
        assert!(became_empty);
        assert!(entry.visible_at(child).unwrap().is_empty());
    }

    #[test]
    fn invisible_at_unvisited_time_does_not_signal_removal() {
        let mut pool: SlotMap<PrimCacheHandle, ()> = SlotMap::with_key();
        let child = pool.insert(());
        let mut entry = PrimCacheEntry::new("/x".into(), "x".into());
        entry.set_child_visible_at(child, TimeCode(0.0));
        assert!(!entry.set_child_invisible_at(child, TimeCode(5.0)));
    }
}
