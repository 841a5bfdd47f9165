//! Prim Cache Manager (spec.md §4.3).

use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::cache::entry::{PrimCacheEntry, PrimCacheHandle};
use crate::timecode::TimeCode;

/// Sanitizes a client-supplied name into a USD-legal prim path component:
/// the first character becomes `_` unless it's a letter or underscore;
/// every later character becomes `_` unless it's alphanumeric or
/// underscore. Idempotent (spec.md §8 property 1).
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, c) in name.chars().enumerate() {
        let ok = if i == 0 {
            c.is_ascii_alphabetic() || c == '_'
        } else {
            c.is_ascii_alphanumeric() || c == '_'
        };
        out.push(if ok { c } else { '_' });
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

/// A named cache of prim entries. The canonical prim path is a pure
/// function of `(category, sanitized name)`, so two objects whose
/// sanitized names collide are intentionally treated as the *same* prim
/// (spec.md §4.3: "enables stable references across process runs").
#[derive(Default)]
pub struct PrimCacheManager {
    entries: SlotMap<PrimCacheHandle, PrimCacheEntry>,
    by_name: FxHashMap<String, PrimCacheHandle>,
}

impl PrimCacheManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, handle: PrimCacheHandle) -> Option<&PrimCacheEntry> {
        self.entries.get(handle)
    }

    #[must_use]
    pub fn get_mut(&mut self, handle: PrimCacheHandle) -> Option<&mut PrimCacheEntry> {
        self.entries.get_mut(handle)
    }

    /// Returns `(existed_in_stage, existed_in_cache, entry_handle)`
    /// (spec.md §4.3). `existed_in_cache` is a hit against this process's
    /// in-memory `by_name` table. `existed_in_stage` additionally covers a
    /// cache miss whose prim is nonetheless already authored on the
    /// backing stage — the case of resuming a prior session whose stage
    /// on disk outlives this process's fresh, empty cache. `stage_has_prim`
    /// is only invoked on a cache miss, since a cache hit implies the prim
    /// was already authored by this same process. A fresh entry always
    /// gets `prim_path = "/RootClass/<category>/<sanitized-name>"`, which
    /// never changes afterwards.
    pub fn find_or_create(&mut self, category: &str, name: &str, stage_has_prim: impl FnOnce(&str) -> bool) -> (bool, bool, PrimCacheHandle) {
        let sanitized = sanitize_name(name);
        let key = format!("{category}/{sanitized}");
        if let Some(&handle) = self.by_name.get(&key) {
            return (true, true, handle);
        }
        let prim_path = format!("/RootClass/{category}/{sanitized}");
        let existed_in_stage = stage_has_prim(&prim_path);
        let handle = self.entries.insert(PrimCacheEntry::new(prim_path, sanitized));
        self.by_name.insert(key, handle);
        (existed_in_stage, false, handle)
    }

    pub fn add_child(&mut self, parent: PrimCacheHandle, child: PrimCacheHandle) {
        if let Some(p) = self.entries.get_mut(parent) {
            p.add_child(child);
        }
        if let Some(c) = self.entries.get_mut(child) {
            c.inc_ref();
        }
    }

    pub fn remove_child(&mut self, parent: PrimCacheHandle, child: PrimCacheHandle) {
        if let Some(p) = self.entries.get_mut(parent) {
            p.remove_child(child);
        }
        if let Some(c) = self.entries.get_mut(child) {
            c.dec_ref();
        }
    }

    /// A world/light/camera attached directly at the stage root holds an
    /// implicit extra reference (spec.md §3 invariant on refcount).
    pub fn attach_root(&mut self, handle: PrimCacheHandle) {
        if let Some(e) = self.entries.get_mut(handle) {
            e.inc_ref();
        }
    }

    pub fn detach_root(&mut self, handle: PrimCacheHandle) {
        if let Some(e) = self.entries.get_mut(handle) {
            e.dec_ref();
        }
    }

    pub fn set_child_visible_at(&mut self, parent: PrimCacheHandle, child: PrimCacheHandle, t: TimeCode) {
        if let Some(p) = self.entries.get_mut(parent) {
            p.set_child_visible_at(child, t);
        }
    }

    /// Returns `true` iff the timecode was present and the child's
    /// visible set under `parent` is now empty.
    pub fn set_child_invisible_at(&mut self, parent: PrimCacheHandle, child: PrimCacheHandle, t: TimeCode) -> bool {
        self.entries
            .get_mut(parent)
            .is_some_and(|p| p.set_child_invisible_at(child, t))
    }

    /// Two-pass GC (spec.md §4.3): first recursively zero out children of
    /// already-zero entries, then erase every zero-refcount entry,
    /// invoking `on_remove` for each so the writer can delete its prim
    /// and release shared resources.
    pub fn remove_unreferenced(&mut self, mut on_remove: impl FnMut(PrimCacheHandle)) {
        loop {
            let dead: Vec<PrimCacheHandle> = self
                .entries
                .iter()
                .filter(|(_, e)| e.refcount() == 0)
                .map(|(h, _)| h)
                .collect();
            if dead.is_empty() {
                break;
            }

            // First pass: recursively decrement children of dead entries.
            for &handle in &dead {
                let children: Vec<PrimCacheHandle> =
                    self.entries.get(handle).map(|e| e.children().to_vec()).unwrap_or_default();
                for child in children {
                    if let Some(c) = self.entries.get_mut(child) {
                        c.dec_ref();
                    }
                }
            }

            // Second pass: erase the now-dead entries.
            for handle in dead {
                if let Some(entry) = self.entries.remove(handle) {
                    self.by_name.retain(|_, v| *v != handle);
                    let _ = entry;
                    on_remove(handle);
                }
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_is_idempotent() {
        for raw in ["Hello World!", "123abc", "_ok_", "", "caf\u{e9}"] {
            let once = sanitize_name(raw);
            let twice = sanitize_name(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn sanitize_replaces_illegal_leading_and_inner_characters() {
        assert_eq!(sanitize_name("1geometry"), "_geometry");
        assert_eq!(sanitize_name("my geom.01"), "my_geom_01");
        assert_eq!(sanitize_name("_already_ok"), "_already_ok");
    }

    #[test]
    fn colliding_sanitized_names_map_to_the_same_prim() {
        let mut mgr = PrimCacheManager::new();
        let (stage_a, cache_a, a) = mgr.find_or_create("geometries", "my geom", |_| false);
        let (stage_b, cache_b, b) = mgr.find_or_create("geometries", "my.geom", |_| false);
        assert!(!stage_a);
        assert!(!cache_a);
        assert!(stage_b);
        assert!(cache_b);
        assert_eq!(a, b);
    }

    #[test]
    fn fresh_cache_detects_a_prim_already_present_on_a_resumed_stage() {
        let mut mgr = PrimCacheManager::new();
        let (existed_in_stage, existed_in_cache, _) = mgr.find_or_create("worlds", "W", |path| path == "/RootClass/worlds/W");
        assert!(existed_in_stage);
        assert!(!existed_in_cache);
    }

    #[test]
    fn two_pass_gc_recursively_collects_orphaned_chains() {
        let mut mgr = PrimCacheManager::new();
        let (_, _, grandchild) = mgr.find_or_create("geometries", "leaf", |_| false);
        let (_, _, child) = mgr.find_or_create("surfaces", "mid", |_| false);
        let (_, _, root) = mgr.find_or_create("worlds", "root", |_| false);

        mgr.add_child(child, grandchild);
        mgr.add_child(root, child);
        mgr.attach_root(root);

        // Detach the root's own anchor: whole chain should become collectible.
        mgr.detach_root(root);

        let mut removed = Vec::new();
        mgr.remove_unreferenced(|h| removed.push(h));

        assert_eq!(removed.len(), 3);
        assert!(mgr.is_empty());
    }

    #[test]
    fn referenced_subtree_survives_gc() {
        let mut mgr = PrimCacheManager::new();
        let (_, _, child) = mgr.find_or_create("geometries", "kept", |_| false);
        let (_, _, root) = mgr.find_or_create("worlds", "root", |_| false);
        mgr.add_child(root, child);
        mgr.attach_root(root);

        let mut removed = Vec::new();
        mgr.remove_unreferenced(|h| removed.push(h));
        assert!(removed.is_empty());
        assert_eq!(mgr.len(), 2);
    }
}
