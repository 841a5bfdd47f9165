//! Value-clip retiming (spec.md §4.4.3).
//!
//! Maintains, per referencing prim, the `(parentTime -> childTime)` and
//! `(parentTime -> assetIndex)` tables that USD's value-clip machinery
//! reads to retime a child's animation into its parent's timeline.

use crate::timecode::TimeCode;

#[derive(Debug, Clone, Default)]
pub struct ClipTimeline {
    /// Sorted, deduplicated by parent time (spec.md §8 property 5).
    entries: Vec<(TimeCode, TimeCode, usize)>,
    asset_paths: Vec<String>,
}

impl ClipTimeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records or updates the `(parentTime, childTime)` pair, resolving
    /// which asset index backs `childTime` — reusing an existing unused
    /// asset in place when possible, else appending one.
    pub fn record(&mut self, parent_time: TimeCode, child_time: TimeCode, asset_path: impl Into<String>) {
        let asset_path = asset_path.into();
        let asset_index = match self.asset_paths.iter().position(|p| *p == asset_path) {
            Some(i) => i,
            None => {
                self.asset_paths.push(asset_path);
                self.asset_paths.len() - 1
            }
        };

        match self.entries.iter_mut().find(|(pt, _, _)| *pt == parent_time) {
            Some(entry) => *entry = (parent_time, child_time, asset_index),
            None => {
                self.entries.push((parent_time, child_time, asset_index));
                self.entries.sort_by_key(|(pt, _, _)| *pt);
            }
        }
    }

    pub fn remove(&mut self, parent_time: TimeCode) {
        self.entries.retain(|(pt, _, _)| *pt != parent_time);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn asset_paths(&self) -> &[String] {
        &self.asset_paths
    }

    /// `clipTimes` and `clipActive` arrays, in lockstep, as USDA literals
    /// (spec.md: "Maintain both ... in lockstep").
    #[must_use]
    pub fn render_metadata(&self) -> Vec<(String, String)> {
        if self.entries.is_empty() {
            return Vec::new();
        }
        let clip_times: Vec<String> = self
            .entries
            .iter()
            .map(|(pt, ct, _)| format!("({}, {})", fmt(pt.get()), fmt(ct.get())))
            .collect();
        let clip_active: Vec<String> = self
            .entries
            .iter()
            .map(|(pt, _, idx)| format!("({}, {})", fmt(pt.get()), idx))
            .collect();
        let asset_paths: Vec<String> = self.asset_paths.iter().map(|p| format!("@{p}@")).collect();
        vec![
            ("clipTimes".into(), format!("[{}]", clip_times.join(", "))),
            ("clipActive".into(), format!("[{}]", clip_active.join(", "))),
            ("clipAssetPaths".into(), format!("[{}]", asset_paths.join(", "))),
        ]
    }
}

fn fmt(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_active_stays_sorted_and_deduplicated_by_parent_time() {
        let mut timeline = ClipTimeline::new();
        timeline.record(TimeCode(1.0), TimeCode(1.0), "clips/G_1.usd");
        timeline.record(TimeCode(0.0), TimeCode(0.0), "clips/G_0.usd");
        timeline.record(TimeCode(1.0), TimeCode(1.0), "clips/G_1.usd");

        let meta = timeline.render_metadata();
        let clip_active = meta.iter().find(|(k, _)| k == "clipActive").unwrap();
        assert_eq!(clip_active.1, "[(0, 0), (1, 1)]");
    }

    #[test]
    fn reusing_an_asset_path_reuses_its_index() {
        let mut timeline = ClipTimeline::new();
        timeline.record(TimeCode(0.0), TimeCode(0.0), "clips/G_0.usd");
        timeline.record(TimeCode(1.0), TimeCode(0.0), "clips/G_0.usd");
        assert_eq!(timeline.asset_paths().len(), 1);
    }
}
