//! Per-vertex interval-keyed reservation table.
//!
//! For each vertex the table stores a sorted, pairwise-disjoint list of
//! `([start, end), RunnerId)` holdings. Same-runner holdings that touch or
//! overlap are coalesced into one; a different runner can never acquire an
//! overlapping interval while one is held.

use crate::graph::Vertex;

/// Discrete, non-negative tick counter.
pub type Time = u64;

/// Process-wide unique, monotonically assigned runner identifier.
pub type RunnerId = u64;

/// Unbounded upper end sentinel (`+∞`).
pub const UNBOUNDED: Time = Time::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Interval {
    start: Time,
    end: Time,
}

impl Interval {
    fn overlaps(&self, start: Time, end: Time) -> bool {
        self.start < end && start < self.end
    }

    /// Same-runner merge test: overlapping, or touching at a boundary.
    fn touches_or_overlaps(&self, start: Time, end: Time) -> bool {
        self.start <= end && start <= self.end
    }
}

/// Per-vertex map from half-open time intervals to the runner holding them.
#[derive(Debug, Clone)]
pub struct ReservationTable {
    holdings: Vec<Vec<(Interval, RunnerId)>>,
}

impl ReservationTable {
    /// Create an empty table sized to `vertex_count` vertices.
    pub fn new(vertex_count: usize) -> Self {
        Self {
            holdings: vec![Vec::new(); vertex_count],
        }
    }

    /// True iff every interval currently stored for `v` that intersects
    /// `[s, e)` belongs to `r`.
    pub fn is_vertex_free_for(&self, v: Vertex, r: RunnerId, s: Time, e: Time) -> bool {
        self.holdings[v]
            .iter()
            .all(|(interval, runner)| *runner == r || !interval.overlaps(s, e))
    }

    /// `is_vertex_free_for(v, r, 0, +∞)`: is `v` free for `r` at any time.
    pub fn is_vertex_free_for_any_time(&self, v: Vertex, r: RunnerId) -> bool {
        self.is_vertex_free_for(v, r, 0, UNBOUNDED)
    }

    /// If `v` is free for `r` over `[s, e)`, reserve it (coalescing with
    /// adjacent or overlapping same-runner holdings) and return `true`.
    /// Otherwise make no change and return `false`. Rejects empty ranges
    /// (`s >= e`).
    pub fn lock_vertex(&mut self, v: Vertex, r: RunnerId, s: Time, e: Time) -> bool {
        if s >= e {
            return false;
        }
        if !self.is_vertex_free_for(v, r, s, e) {
            return false;
        }

        let entries = &mut self.holdings[v];
        let mut merged_start = s;
        let mut merged_end = e;
        entries.retain(|(interval, runner)| {
            if *runner == r && interval.touches_or_overlaps(merged_start, merged_end) {
                merged_start = merged_start.min(interval.start);
                merged_end = merged_end.max(interval.end);
                false
            } else {
                true
            }
        });

        let merged = Interval { start: merged_start, end: merged_end };
        let position = entries.partition_point(|(interval, _)| interval.start < merged.start);
        entries.insert(position, (merged, r));
        true
    }

    /// Remove the portion of `r`'s holdings on `v` overlapping `[s, e)`. A
    /// cut that splits one interval into two leaves both. A no-op if `r`
    /// holds nothing overlapping the range, or if `s >= e`.
    pub fn unlock_vertex(&mut self, v: Vertex, r: RunnerId, s: Time, e: Time) {
        if s >= e {
            return;
        }
        let entries = &mut self.holdings[v];
        let mut replacement = Vec::new();
        entries.retain(|(interval, runner)| {
            if *runner != r || !interval.overlaps(s, e) {
                return true;
            }
            if interval.start < s {
                replacement.push((Interval { start: interval.start, end: s }, r));
            }
            if e < interval.end {
                replacement.push((Interval { start: e, end: interval.end }, r));
            }
            false
        });
        for (interval, runner) in replacement {
            let position = entries.partition_point(|(existing, _)| existing.start < interval.start);
            entries.insert(position, (interval, runner));
        }
    }

    /// Release every interval `r` currently holds on `v` (`unlock_vertex`
    /// with the default unbounded range).
    pub fn unlock_vertex_entirely(&mut self, v: Vertex, r: RunnerId) {
        self.unlock_vertex(v, r, 0, UNBOUNDED);
    }

    /// The unique runner holding `v` at instant `t`, if any.
    pub fn vertex_lock(&self, v: Vertex, t: Time) -> Option<RunnerId> {
        self.holdings[v]
            .iter()
            .find(|(interval, _)| interval.start <= t && t < interval.end)
            .map(|(_, runner)| *runner)
    }

    /// Number of disjoint holdings currently stored for `v` (test/debug aid).
    pub fn interval_count(&self, v: Vertex) -> usize {
        self.holdings[v].len()
    }
}
