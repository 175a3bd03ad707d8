/// Attribute holding the cached payload
pub const RESULTS_ATTR: &str = "results";

/// Attribute holding the last liveness stamp
pub const TTL_ATTR: &str = "ttl";

pub const REQUIRED_ATTRS: [&str; 2] = [RESULTS_ATTR, TTL_ATTR];

/// Outcome of a single TTL sweep
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub deleted: usize,
    pub skipped: usize,
}

impl SweepReport {
    pub fn kept(&self) -> usize {
        self.examined - self.deleted - self.skipped
    }
}
