/// Membership relations and set synchronization
///
/// Two join relations exist: project collaborators (`project_user`) and task
/// assignees (`task_user`). Both are only ever changed by replacing the full
/// set. The replacement is expressed as a [`MembershipDiff`], computed from the
/// current and desired sets and applied by the repository in one atomic unit.
///
/// # Example
///
/// ```
/// use std::collections::BTreeSet;
/// use teamboard_shared::models::membership::MembershipDiff;
///
/// let current: BTreeSet<i64> = [1, 2, 3].into_iter().collect();
/// let desired: BTreeSet<i64> = [2, 3, 4].into_iter().collect();
///
/// let diff = MembershipDiff::between(&current, &desired);
/// assert_eq!(diff.to_add, [4].into_iter().collect());
/// assert_eq!(diff.to_remove, [1].into_iter().collect());
/// ```

use std::collections::BTreeSet;

/// Rows to insert and delete to turn one membership set into another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    pub to_add: BTreeSet<i64>,
    pub to_remove: BTreeSet<i64>,
}

impl MembershipDiff {
    /// Computes the diff from `current` to `desired`
    pub fn between(current: &BTreeSet<i64>, desired: &BTreeSet<i64>) -> Self {
        Self {
            to_add: desired.difference(current).copied().collect(),
            to_remove: current.difference(desired).copied().collect(),
        }
    }

    /// True when the sets were already equal
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Applies the diff to an in-memory set
    pub fn apply(&self, set: &mut BTreeSet<i64>) {
        for id in &self.to_remove {
            set.remove(id);
        }
        set.extend(self.to_add.iter().copied());
    }
}

/// Collects ids into a set, dropping duplicates
pub fn id_set(ids: impl IntoIterator<Item = i64>) -> BTreeSet<i64> {
    ids.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_between_equal_sets_is_empty() {
        let set = id_set([1, 2]);
        assert!(MembershipDiff::between(&set, &set).is_empty());
    }

    #[test]
    fn test_diff_to_empty_removes_everything() {
        let diff = MembershipDiff::between(&id_set([1, 2]), &BTreeSet::new());
        assert!(diff.to_add.is_empty());
        assert_eq!(diff.to_remove, id_set([1, 2]));
    }

    #[test]
    fn test_apply_reaches_desired() {
        let mut current = id_set([1, 5, 7]);
        let desired = id_set([5, 8, 9]);

        MembershipDiff::between(&current, &desired).apply(&mut current);
        assert_eq!(current, desired);

        // A second sync is a no-op
        assert!(MembershipDiff::between(&current, &desired).is_empty());
    }

    #[test]
    fn test_id_set_deduplicates() {
        assert_eq!(id_set([3, 3, 1]).len(), 2);
    }
}
