//! Shared Resource Registry (spec.md §2, §3 "Shared-resource key").
//!
//! Tracks externally named resources (images, VDB blobs) with reference
//! counting and a per-frame "already written" flag so that two samplers
//! pointing at the same `(name, timestep)` collapse into one backing file
//! (spec.md §8 property 7).

use rustc_hash::FxHashMap;

use crate::timecode::TimeCode;

/// Two keys with the same name collapse into one reference; absent a
/// name, each key is unique per object+timestep (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    Named { name: String, timestep: Option<TimeCode> },
    Unique(u64),
}

#[derive(Default)]
struct ResourceState {
    refcount: u32,
    written_this_frame: bool,
}

#[derive(Default)]
pub struct SharedResourceRegistry {
    entries: FxHashMap<ResourceKey, ResourceState>,
    next_unique_id: u64,
}

impl SharedResourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn make_key(&mut self, name: Option<&str>, timestep: Option<TimeCode>) -> ResourceKey {
        match name {
            Some(n) => ResourceKey::Named {
                name: n.to_string(),
                timestep,
            },
            None => {
                self.next_unique_id += 1;
                ResourceKey::Unique(self.next_unique_id)
            }
        }
    }

    /// Registers a reference to a resource, returning the normalized key
    /// and whether an entry already existed for it (i.e. whether this is
    /// a dedup hit).
    pub fn acquire(&mut self, name: Option<&str>, timestep: Option<TimeCode>) -> (ResourceKey, bool) {
        let key = self.make_key(name, timestep);
        let existed = self.entries.contains_key(&key);
        self.entries.entry(key.clone()).or_default().refcount += 1;
        (key, existed)
    }

    /// Releases one reference; returns `true` if the resource has no
    /// remaining references (caller should remove the backing file).
    pub fn release(&mut self, key: &ResourceKey) -> bool {
        let Some(state) = self.entries.get_mut(key) else {
            return false;
        };
        state.refcount = state.refcount.saturating_sub(1);
        let dead = state.refcount == 0;
        if dead {
            self.entries.remove(key);
        }
        dead
    }

    /// Returns `true` exactly the first time it's called for a given key
    /// since the last [`SharedResourceRegistry::begin_frame`]; callers use
    /// this to gate the actual file write.
    pub fn try_claim_write(&mut self, key: &ResourceKey) -> bool {
        let Some(state) = self.entries.get_mut(key) else {
            return true;
        };
        if state.written_this_frame {
            false
        } else {
            state.written_this_frame = true;
            true
        }
    }

    /// Clears the per-frame write flags; called once per flush.
    pub fn begin_frame(&mut self) {
        for state in self.entries.values_mut() {
            state.written_this_frame = false;
        }
    }

    #[must_use]
    pub fn refcount(&self, key: &ResourceKey) -> u32 {
        self.entries.get(key).map_or(0, |s| s.refcount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_and_timestep_dedups_to_one_write() {
        let mut registry = SharedResourceRegistry::new();
        let mut writes = 0;
        for _ in 0..5 {
            let (key, _existed) = registry.acquire(Some("x"), Some(TimeCode(0.0)));
            if registry.try_claim_write(&key) {
                writes += 1;
            }
        }
        assert_eq!(writes, 1);
    }

    #[test]
    fn different_timesteps_are_distinct_resources() {
        let mut registry = SharedResourceRegistry::new();
        let (k0, _) = registry.acquire(Some("x"), Some(TimeCode(0.0)));
        let (k1, _) = registry.acquire(Some("x"), Some(TimeCode(1.0)));
        assert_ne!(k0, k1);
    }

    #[test]
    fn unnamed_keys_never_dedup() {
        let mut registry = SharedResourceRegistry::new();
        let (k0, existed0) = registry.acquire(None, None);
        let (k1, existed1) = registry.acquire(None, None);
        assert!(!existed0 && !existed1);
        assert_ne!(k0, k1);
    }

    #[test]
    fn write_flag_resets_each_frame() {
        let mut registry = SharedResourceRegistry::new();
        let (key, _) = registry.acquire(Some("x"), None);
        assert!(registry.try_claim_write(&key));
        assert!(!registry.try_claim_write(&key));
        registry.begin_frame();
        assert!(registry.try_claim_write(&key));
    }
}
