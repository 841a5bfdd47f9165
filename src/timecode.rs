//! A USD time code wrapper that is `Eq + Ord + Hash`, since `f64` alone
//! isn't. Every timestep the bridge deals with is a finite value supplied
//! by the client (never NaN), so `total_cmp` is a safe total order.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy)]
pub struct TimeCode(pub f64);

impl TimeCode {
    pub const DEFAULT: TimeCode = TimeCode(0.0);

    #[must_use]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl PartialEq for TimeCode {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}
impl Eq for TimeCode {}

impl PartialOrd for TimeCode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for TimeCode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for TimeCode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl From<f64> for TimeCode {
    fn from(v: f64) -> Self {
        TimeCode(v)
    }
}
