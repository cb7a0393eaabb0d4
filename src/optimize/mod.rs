use serde::Serialize;

use crate::character::Character;

pub mod engine;
pub mod infusions;
pub mod list;

/// One progress report from the search loop.
#[derive(Clone, Debug, Serialize)]
pub struct Progress {
    pub is_changed: bool,
    pub calculation_runs: u64,
    /// Snapshot of the current best list. Present on intermediate reports
    /// only when the list changed since the previous report, and always on
    /// the final report.
    pub new_list: Option<Vec<Character>>,
}

/// Outcome of a single `Optimizer::step` call. The driver keeps calling
/// `step` until it sees `Done`; dropping the optimizer instead cancels the
/// search.
#[derive(Clone, Debug)]
pub enum Step {
    Progress(Progress),
    Done(Progress),
}
