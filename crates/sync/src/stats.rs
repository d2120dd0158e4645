use crate::store::SessionState;
use std::collections::BTreeMap;

/// Derived per-answer counts for one view. Purely a function of the
/// snapshot it was computed from; holds no state of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub total_students: usize,
    /// Number of students with any recorded answer.
    pub responded: usize,
    pub per_answer: BTreeMap<String, usize>,
    /// Answers that are no longer offered by the current question (it may
    /// have changed mid-session). Counted rather than silently dropped so
    /// the tallies still sum to `responded`.
    pub other: usize,
}

pub fn tally(state: &SessionState, total_students: usize, answers: &[String]) -> Stats {
    let mut per_answer: BTreeMap<String, usize> =
        answers.iter().map(|answer| (answer.clone(), 0)).collect();
    let mut other = 0;
    for entry in state.assignments.values() {
        match per_answer.get_mut(&entry.answer) {
            Some(count) => *count += 1,
            None => other += 1,
        }
    }
    Stats { total_students, responded: state.assignments.len(), per_answer, other }
}
