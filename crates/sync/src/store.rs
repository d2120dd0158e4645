use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use core::num::NonZeroI64;
use model::AssignmentRecord;
use std::collections::{BTreeMap, BTreeSet};

/// One student's answer as held by a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerEntry {
    pub answer: String,
    pub updated_at: DateTime<Utc>,
}

/// Everything one open class-day view knows. `pending` holds the students
/// whose optimistic writes have not yet been confirmed by the backend; it
/// is always a subset of the assignment keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub class_id: NonZeroI64,
    pub date: NaiveDate,
    pub question_id: NonZeroI64,
    pub assignments: BTreeMap<NonZeroI64, AnswerEntry>,
    pub pending: BTreeSet<NonZeroI64>,
}

pub type SubscriptionId = u64;
type Listener = Box<dyn FnMut(&SessionState) + Send>;

/// The authoritative client-side state for one `(class, date)` view.
///
/// All methods are synchronous and run to completion; there is exactly one
/// logical mutator (the view's event loop), so the struct itself carries
/// no locking. Concurrency exists only across devices and is resolved by
/// the last-write-wins merge in [`apply_remote`]: applying any set of
/// remote records in any order, any number of times, converges to the
/// same state.
///
/// [`apply_remote`]: AssignmentStore::apply_remote
pub struct AssignmentStore {
    state: SessionState,
    mutated: bool,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
}

impl AssignmentStore {
    pub fn new(class_id: NonZeroI64, date: NaiveDate, question_id: NonZeroI64) -> Self {
        Self {
            state: SessionState {
                class_id,
                date,
                question_id,
                assignments: BTreeMap::new(),
                pending: BTreeSet::new(),
            },
            mutated: false,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Bulk-load the initial state from the read path. Only valid before
    /// the first local edit; later reconciliation goes through
    /// [`apply_remote`] so optimistic values are never clobbered.
    ///
    /// [`apply_remote`]: AssignmentStore::apply_remote
    pub fn hydrate(&mut self, records: Vec<AssignmentRecord>) -> Result<()> {
        if self.mutated {
            return Err(Error::AlreadyMutated);
        }
        for record in records {
            let entry = AnswerEntry { answer: record.answer, updated_at: record.updated_at };
            self.merge(record.student_id, entry);
        }
        self.notify();
        Ok(())
    }

    /// Apply a local edit. Never blocks, never fails: the write lands
    /// unconditionally, the student is marked pending, and the applied
    /// record is returned for the caller to persist and broadcast.
    pub fn set(&mut self, student_id: NonZeroI64, answer: String, at: DateTime<Utc>) -> AssignmentRecord {
        self.mutated = true;
        self.state
            .assignments
            .insert(student_id, AnswerEntry { answer: answer.clone(), updated_at: at });
        self.state.pending.insert(student_id);
        self.notify();
        AssignmentRecord {
            student_id,
            class_id: self.state.class_id,
            date: self.state.date,
            question_id: self.state.question_id,
            answer,
            updated_at: at,
        }
    }

    /// The merge rule: last write wins by timestamp, ties keep the current
    /// value. Discarding on a tie makes the rule idempotent and
    /// commutative, which is what guarantees convergence when frames
    /// arrive out of order or twice. Returns whether the record applied;
    /// a stale record is an event worth logging, not an error.
    pub fn apply_remote(&mut self, student_id: NonZeroI64, incoming: AnswerEntry) -> bool {
        let applied = self.merge(student_id, incoming);
        if applied {
            self.notify();
        } else {
            log::debug!("discarded stale update for student {student_id}");
        }
        applied
    }

    fn merge(&mut self, student_id: NonZeroI64, incoming: AnswerEntry) -> bool {
        match self.state.assignments.get(&student_id) {
            Some(current) if incoming.updated_at <= current.updated_at => false,
            _ => {
                self.state.assignments.insert(student_id, incoming);
                true
            }
        }
    }

    /// The backend confirmed the student's write; the optimistic mark
    /// comes off.
    pub fn confirm(&mut self, student_id: NonZeroI64) {
        if self.state.pending.remove(&student_id) {
            self.notify();
        }
    }

    /// The backend definitively failed the student's write. The pending
    /// mark comes off but the optimistic value stays: local state remains
    /// the source of truth until the next hydrate.
    pub fn fail(&mut self, student_id: NonZeroI64) {
        if self.state.pending.remove(&student_id) {
            self.notify();
        }
    }

    /// Read-only copy for derived consumers.
    pub fn snapshot(&self) -> SessionState {
        self.state.clone()
    }

    /// Register a listener fired after every state change.
    pub fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.listeners.retain(|(existing, _)| *existing != id);
    }

    fn notify(&mut self) {
        for (_, listener) in &mut self.listeners {
            listener(&self.state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AnswerEntry, AssignmentStore};
    use crate::error::Error;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use core::num::NonZeroI64;
    use model::AssignmentRecord;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn sid(id: i64) -> NonZeroI64 {
        NonZeroI64::new(id).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn store() -> AssignmentStore {
        AssignmentStore::new(sid(3), NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(), sid(41))
    }

    fn entry(answer: &str, secs: i64) -> AnswerEntry {
        AnswerEntry { answer: String::from(answer), updated_at: at(secs) }
    }

    fn record(student: i64, answer: &str, secs: i64) -> AssignmentRecord {
        AssignmentRecord {
            student_id: sid(student),
            class_id: sid(3),
            date: NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(),
            question_id: sid(41),
            answer: String::from(answer),
            updated_at: at(secs),
        }
    }

    #[test]
    fn older_remote_updates_are_discarded() {
        let mut store = store();
        store.set(sid(7), String::from("Red"), at(100));
        assert!(!store.apply_remote(sid(7), entry("Blue", 90)));
        assert_eq!(store.snapshot().assignments[&sid(7)].answer, "Red");
    }

    #[test]
    fn newer_remote_updates_overwrite() {
        let mut store = store();
        store.set(sid(7), String::from("Red"), at(100));
        store.apply_remote(sid(7), entry("Blue", 90));
        assert!(store.apply_remote(sid(7), entry("Blue", 150)));
        assert_eq!(store.snapshot().assignments[&sid(7)].answer, "Blue");
    }

    #[test]
    fn timestamp_ties_keep_the_current_value() {
        let mut store = store();
        store.set(sid(7), String::from("Red"), at(100));
        assert!(!store.apply_remote(sid(7), entry("Blue", 100)));
        assert_eq!(store.snapshot().assignments[&sid(7)].answer, "Red");
    }

    fn permutations(n: usize) -> Vec<Vec<usize>> {
        if n == 1 {
            return vec![vec![0]];
        }
        let mut all = Vec::new();
        for shorter in permutations(n - 1) {
            for slot in 0..n {
                let mut longer = shorter.clone();
                longer.insert(slot, n - 1);
                all.push(longer);
            }
        }
        all
    }

    #[test]
    fn convergence_under_permutation_and_duplication() {
        let updates =
            [entry("Red", 100), entry("Blue", 150), entry("Green", 90), entry("Blue", 150)];

        for permutation in permutations(updates.len()) {
            let mut store = store();
            for &index in &permutation {
                store.apply_remote(sid(7), updates[index].clone());
                // Duplicate delivery must be a no-op.
                store.apply_remote(sid(7), updates[index].clone());
            }
            let state = store.snapshot();
            assert_eq!(state.assignments[&sid(7)].answer, "Blue", "order {permutation:?}");
            assert_eq!(state.assignments[&sid(7)].updated_at, at(150));
        }
    }

    #[test]
    fn hydrate_loads_initial_state_without_pending_marks() {
        let mut store = store();
        store
            .hydrate(vec![record(7, "Red", 100), record(8, "Blue", 110)])
            .unwrap();
        let state = store.snapshot();
        assert_eq!(state.assignments.len(), 2);
        assert!(state.pending.is_empty());
    }

    #[test]
    fn hydrate_after_a_local_edit_is_rejected() {
        let mut store = store();
        store.set(sid(7), String::from("Red"), at(100));
        let result = store.hydrate(vec![record(8, "Blue", 110)]);
        assert!(matches!(result, Err(Error::AlreadyMutated)));
    }

    #[test]
    fn hydrate_after_remote_merges_is_still_allowed() {
        let mut store = store();
        store.apply_remote(sid(7), entry("Blue", 150));
        // A record older than what the channel already delivered must not
        // regress the entry.
        store.hydrate(vec![record(7, "Red", 100)]).unwrap();
        assert_eq!(store.snapshot().assignments[&sid(7)].answer, "Blue");
    }

    #[test]
    fn pending_tracks_the_optimistic_write_lifecycle() {
        let mut store = store();
        store.set(sid(7), String::from("Red"), at(100));
        store.set(sid(8), String::from("Blue"), at(101));
        assert_eq!(store.snapshot().pending.len(), 2);

        store.confirm(sid(7));
        let state = store.snapshot();
        assert!(!state.pending.contains(&sid(7)));
        assert!(state.pending.contains(&sid(8)));

        // Terminal failure drops the mark but keeps the optimistic value.
        store.fail(sid(8));
        let state = store.snapshot();
        assert!(state.pending.is_empty());
        assert_eq!(state.assignments[&sid(8)].answer, "Blue");
    }

    #[test]
    fn pending_is_a_subset_of_assignments() {
        let mut store = store();
        store.set(sid(7), String::from("Red"), at(100));
        store.apply_remote(sid(9), entry("Blue", 90));
        let state = store.snapshot();
        assert!(state.pending.iter().all(|id| state.assignments.contains_key(id)));
    }

    #[test]
    fn listeners_fire_on_every_state_change() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut store = store();
        let counter = Arc::clone(&fired);
        let id = store.subscribe(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        store.set(sid(7), String::from("Red"), at(100));
        store.apply_remote(sid(7), entry("Blue", 150));
        store.apply_remote(sid(7), entry("Green", 90)); // stale, no change
        store.confirm(sid(7));
        assert_eq!(fired.load(Ordering::SeqCst), 3);

        store.unsubscribe(id);
        store.set(sid(8), String::from("Blue"), at(200));
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn set_returns_the_applied_record() {
        let mut store = store();
        let record = store.set(sid(7), String::from("Red"), at(100));
        assert_eq!(record.student_id, sid(7));
        assert_eq!(record.class_id, sid(3));
        assert_eq!(record.question_id, sid(41));
        assert_eq!(record.answer, "Red");
        assert_eq!(record.updated_at, at(100));
    }
}
