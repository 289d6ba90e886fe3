//! Selects the visible subset of a fetched run collection.
//!
//! Filters never mutate the collection; they borrow out of it per fetch
//! cycle and are re-applied from scratch whenever either side changes.

use std::fmt::{self, Display, Formatter};

use supwatch_model::RunSnapshot;

/// Filter criteria for the run list. `None` means "all" for the axis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFilter {
    /// Case-insensitive equality against the workload-kind label.
    pub chain: Option<String>,
    /// Case-insensitive equality against the readiness condition's reason.
    pub status: Option<String>,
    /// Keep only each workload's most recent run.
    pub latest_only: bool,
}

impl RunFilter {
    /// All three checks must pass. The latest check is evaluated against
    /// `all`, the unfiltered collection: whether a run is its workload's most
    /// recent cannot depend on what the other axes happen to exclude.
    pub fn matches(&self, run: &RunSnapshot, all: &[RunSnapshot]) -> bool {
        if self.latest_only && !is_latest(run, all) {
            return false;
        }
        if let Some(chain) = &self.chain {
            let matched = run
                .chain
                .as_deref()
                .is_some_and(|label| label.eq_ignore_ascii_case(chain));
            if !matched {
                return false;
            }
        }
        if let Some(status) = &self.status {
            // An unreadable readiness condition fails every concrete status.
            let matched = run
                .ready_condition()
                .ok()
                .and_then(|condition| condition.reason.as_deref())
                .is_some_and(|reason| reason.eq_ignore_ascii_case(status));
            if !matched {
                return false;
            }
        }
        true
    }
}

/// The runs that pass `filter`, in input order.
pub fn select<'a>(runs: &'a [RunSnapshot], filter: &RunFilter) -> Vec<&'a RunSnapshot> {
    runs.iter().filter(|run| filter.matches(run, runs)).collect()
}

/// Whether no other run sharing this run's workload-name label has a strictly
/// greater creation timestamp. Timestamp order is string order (ISO-8601).
///
/// Two runs created at the same instant are both latest. A run without a
/// workload label shares its workload with nothing and is trivially latest.
pub fn is_latest(run: &RunSnapshot, all: &[RunSnapshot]) -> bool {
    let Some(workload) = &run.workload else {
        return true;
    };
    !all.iter()
        .any(|other| other.workload.as_ref() == Some(workload) && other.created > run.created)
}

/// Free-text narrowing over the already-selected set: case-sensitive
/// substring match against `"{workload}/{name}"`.
pub fn matches_search(run: &RunSnapshot, needle: &str) -> bool {
    needle.is_empty() || run.search_key().contains(needle)
}

/// Column the run list can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Chain,
    Created,
    Ready,
}

impl SortKey {
    pub const ALL: [SortKey; 3] = [SortKey::Chain, SortKey::Created, SortKey::Ready];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Chain => "chain",
            SortKey::Created => "created",
            SortKey::Ready => "ready",
        }
    }
}

impl Display for SortKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable sort of a selected set by one column. Runs missing the column's
/// value sort together at the front of ascending order.
pub fn sort_runs(runs: &mut [&RunSnapshot], key: SortKey, ascending: bool) {
    runs.sort_by(|a, b| {
        let ordering = match key {
            SortKey::Chain => a.chain.as_deref().cmp(&b.chain.as_deref()),
            SortKey::Created => a.created.cmp(&b.created),
            SortKey::Ready => ready_reason(a).cmp(&ready_reason(b)),
        };
        if ascending { ordering } else { ordering.reverse() }
    });
}

fn ready_reason(run: &RunSnapshot) -> Option<&str> {
    run.ready_condition()
        .ok()
        .and_then(|condition| condition.reason.as_deref())
}
