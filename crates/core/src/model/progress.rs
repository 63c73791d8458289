use std::collections::HashSet;

use crate::model::ids::LessonId;

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// Ordered, duplicate-free set of lesson ids completed by the current learner.
///
/// Insertion order is kept so the snapshot can be mirrored to the local cache
/// as a plain list and read back in the same shape.
#[derive(Debug, Clone, Default)]
pub struct ProgressSnapshot {
    order: Vec<LessonId>,
    index: HashSet<LessonId>,
}

impl ProgressSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot from a list, dropping repeated ids.
    #[must_use]
    pub fn from_ids(ids: impl IntoIterator<Item = LessonId>) -> Self {
        let mut snapshot = Self::new();
        snapshot.merge(ids);
        snapshot
    }

    /// Adds a lesson id. Returns `false` if it was already present.
    pub fn insert(&mut self, lesson_id: LessonId) -> bool {
        if self.index.contains(&lesson_id) {
            return false;
        }
        self.index.insert(lesson_id.clone());
        self.order.push(lesson_id);
        true
    }

    /// Union with `ids`: existing entries keep their position, unseen ids are
    /// appended in the order given. Returns how many ids were added.
    pub fn merge(&mut self, ids: impl IntoIterator<Item = LessonId>) -> usize {
        let mut added = 0;
        for id in ids {
            if self.insert(id) {
                added += 1;
            }
        }
        added
    }

    #[must_use]
    pub fn contains(&self, lesson_id: &LessonId) -> bool {
        self.index.contains(lesson_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LessonId> {
        self.order.iter()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<LessonId> {
        self.order.clone()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.index.clear();
    }

    /// Number of `lesson_ids` present in the snapshot.
    #[must_use]
    pub fn count_in(&self, lesson_ids: &[LessonId]) -> usize {
        lesson_ids.iter().filter(|id| self.contains(id)).count()
    }
}

impl PartialEq for ProgressSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
    }
}

impl Eq for ProgressSnapshot {}

//
// ─── COURSE PROGRESS ───────────────────────────────────────────────────────────
//

/// Completion figures for one course, derived on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CourseProgress {
    pub completed_count: usize,
    pub total_count: usize,
    pub percentage: u8,
}

impl CourseProgress {
    #[must_use]
    pub fn new(completed_count: usize, total_count: usize) -> Self {
        Self {
            completed_count,
            total_count,
            percentage: percentage(completed_count, total_count),
        }
    }

    /// Every lesson of a non-empty course is done.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total_count > 0 && self.completed_count >= self.total_count
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.completed_count > 0
    }
}

/// Integer percentage of `completed` over `total`, rounded half up.
///
/// Returns `0` for an empty total and never exceeds `100`, even when a stale
/// total is smaller than the completed count.
#[must_use]
pub fn percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed as u128;
    let total = total as u128;
    let rounded = (200 * completed + total) / (2 * total);
    u8::try_from(rounded.min(100)).unwrap_or(100)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<LessonId> {
        raw.iter().map(|s| LessonId::new(*s).unwrap()).collect()
    }

    #[test]
    fn insert_is_idempotent() {
        let mut snapshot = ProgressSnapshot::new();
        assert!(snapshot.insert(LessonId::new("L").unwrap()));
        assert!(!snapshot.insert(LessonId::new("L").unwrap()));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn merge_is_a_union_keeping_local_order_first() {
        let mut snapshot = ProgressSnapshot::from_ids(ids(&["A", "C"]));
        let added = snapshot.merge(ids(&["B", "C", "D"]));

        assert_eq!(added, 2);
        assert_eq!(snapshot.to_vec(), ids(&["A", "C", "B", "D"]));
    }

    #[test]
    fn from_ids_drops_duplicates() {
        let snapshot = ProgressSnapshot::from_ids(ids(&["A", "A", "B"]));
        assert_eq!(snapshot.to_vec(), ids(&["A", "B"]));
    }

    #[test]
    fn count_in_intersects_with_course_lessons() {
        let snapshot = ProgressSnapshot::from_ids(ids(&["L1", "L3", "X9"]));
        assert_eq!(snapshot.count_in(&ids(&["L1", "L2", "L3", "L4"])), 2);
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage(2, 4), 50);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(1, 200), 1);
        assert_eq!(percentage(1, 201), 0);
    }

    #[test]
    fn percentage_guards_zero_and_clamps() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(5, 0), 0);
        assert_eq!(percentage(7, 4), 100);
    }

    #[test]
    fn course_progress_flags() {
        let done = CourseProgress::new(3, 3);
        assert!(done.is_complete());
        assert_eq!(done.percentage, 100);

        let empty = CourseProgress::new(0, 0);
        assert!(!empty.is_complete());
        assert!(!empty.is_started());
    }
}
