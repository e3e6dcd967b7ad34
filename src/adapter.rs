//! List adapter - turns successive task list snapshots into row operations.
//!
//! Rows are identified by [`TaskId`]; a row whose id survives but whose
//! record differs is reported as a [`DiffOp::Change`]. Moves are limited to
//! rows outside the longest common subsequence of surviving ids, so a single
//! row moving across the list costs one op rather than shifting every other
//! row.

use std::collections::{HashMap, HashSet};

use crate::task::{Task, TaskId};

/// One step of an edit script. Indices refer to the list as it stands when
/// the op is applied, ops being applied in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOp {
    Remove { index: usize },
    Move { from: usize, to: usize },
    Insert { index: usize, task: Task },
    Change { index: usize, task: Task },
}

/// Compute the edit script turning `old` into `new`.
///
/// Ids are assumed unique within each list, which the store guarantees.
pub fn diff(old: &[Task], new: &[Task]) -> Vec<DiffOp> {
    let mut ops = Vec::new();
    let new_ids: HashSet<TaskId> = new.iter().map(|t| t.id).collect();
    let mut current: Vec<TaskId> = old.iter().map(|t| t.id).collect();

    // Removals, highest index first so lower indices stay valid.
    for index in (0..old.len()).rev() {
        if !new_ids.contains(&old[index].id) {
            ops.push(DiffOp::Remove { index });
            current.remove(index);
        }
    }

    let present: HashSet<TaskId> = current.iter().copied().collect();
    let target: Vec<TaskId> = new
        .iter()
        .map(|t| t.id)
        .filter(|id| present.contains(id))
        .collect();
    let stable: HashSet<TaskId> = longest_common_subsequence(&current, &target)
        .into_iter()
        .collect();

    // Each unstable row goes right after its predecessor in the target order,
    // which is already in place by the time it is reached.
    for (pos, id) in target.iter().enumerate() {
        if stable.contains(id) {
            continue;
        }
        let Some(from) = current.iter().position(|c| c == id) else {
            continue;
        };
        current.remove(from);
        let to = match pos.checked_sub(1) {
            Some(prev) => current
                .iter()
                .position(|c| *c == target[prev])
                .map_or(0, |p| p + 1),
            None => 0,
        };
        current.insert(to, *id);
        if from != to {
            ops.push(DiffOp::Move { from, to });
        }
    }

    for (index, task) in new.iter().enumerate() {
        if !present.contains(&task.id) {
            ops.push(DiffOp::Insert {
                index,
                task: task.clone(),
            });
        }
    }

    let old_by_id: HashMap<TaskId, &Task> = old.iter().map(|t| (t.id, t)).collect();
    for (index, task) in new.iter().enumerate() {
        if let Some(previous) = old_by_id.get(&task.id) {
            if *previous != task {
                ops.push(DiffOp::Change {
                    index,
                    task: task.clone(),
                });
            }
        }
    }

    ops
}

/// Replay an edit script. Panics if an index is out of range for the list
/// at that step, as `Vec::remove`/`insert` do.
pub fn apply(old: &[Task], ops: &[DiffOp]) -> Vec<Task> {
    let mut list = old.to_vec();
    for op in ops {
        match op {
            DiffOp::Remove { index } => {
                list.remove(*index);
            }
            DiffOp::Move { from, to } => {
                let task = list.remove(*from);
                list.insert(*to, task);
            }
            DiffOp::Insert { index, task } => list.insert(*index, task.clone()),
            DiffOp::Change { index, task } => list[*index] = task.clone(),
        }
    }
    list
}

fn longest_common_subsequence(a: &[TaskId], b: &[TaskId]) -> Vec<TaskId> {
    let mut dp = vec![vec![0u32; b.len() + 1]; a.len() + 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            dp[i + 1][j + 1] = if x == y {
                dp[i][j] + 1
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }

    let mut out = Vec::new();
    let (mut i, mut j) = (a.len(), b.len());
    while i > 0 && j > 0 {
        if a[i - 1] == b[j - 1] {
            out.push(a[i - 1]);
            i -= 1;
            j -= 1;
        } else if dp[i - 1][j] >= dp[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    out.reverse();
    out
}

/// Holds the last rendered list and reports what changed on each submit.
#[derive(Debug, Default)]
pub struct TaskListAdapter {
    items: Vec<Task>,
}

impl TaskListAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rendered list, returning the ops from the previous one.
    pub fn submit(&mut self, tasks: Vec<Task>) -> Vec<DiffOp> {
        let ops = diff(&self.items, &tasks);
        self.items = tasks;
        ops
    }

    pub fn items(&self) -> &[Task] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&Task> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn task(id: i64, name: &str) -> Task {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Task::new(name).created_at(created).with_id(TaskId(id))
    }

    fn list(ids: &[i64]) -> Vec<Task> {
        ids.iter().map(|id| task(*id, &format!("t{id}"))).collect()
    }

    fn count_moves(ops: &[DiffOp]) -> usize {
        ops.iter().filter(|op| matches!(op, DiffOp::Move { .. })).count()
    }

    #[test]
    fn test_identical_lists_need_no_ops() {
        let old = list(&[1, 2, 3]);
        assert!(diff(&old, &old.clone()).is_empty());
    }

    #[test]
    fn test_first_submit_inserts_everything() {
        let mut adapter = TaskListAdapter::new();
        let ops = adapter.submit(list(&[1, 2]));
        assert_eq!(ops.len(), 2);
        assert!(ops.iter().all(|op| matches!(op, DiffOp::Insert { .. })));
        assert_eq!(adapter.len(), 2);
        assert_eq!(adapter.get(1).map(|t| t.id), Some(TaskId(2)));
    }

    #[test]
    fn test_content_change_keeps_identity() {
        let old = list(&[1, 2, 3]);
        let mut new = old.clone();
        new[1] = new[1].with_completed(true);

        let ops = diff(&old, &new);
        assert_eq!(
            ops,
            vec![DiffOp::Change {
                index: 1,
                task: new[1].clone()
            }]
        );
    }

    #[test]
    fn test_removal_reports_original_index() {
        let old = list(&[1, 2, 3]);
        let new = list(&[1, 3]);
        assert_eq!(diff(&old, &new), vec![DiffOp::Remove { index: 1 }]);
    }

    #[test]
    fn test_single_row_rotation_is_one_move() {
        let old = list(&[1, 2, 3, 4]);
        let new = list(&[2, 3, 4, 1]);
        let ops = diff(&old, &new);
        assert_eq!(ops, vec![DiffOp::Move { from: 0, to: 3 }]);
        assert_eq!(apply(&old, &ops), new);
    }

    #[test]
    fn test_reversal_moves_all_but_one() {
        let old = list(&[1, 2, 3, 4, 5]);
        let new = list(&[5, 4, 3, 2, 1]);
        let ops = diff(&old, &new);
        assert_eq!(count_moves(&ops), 4);
        assert_eq!(apply(&old, &ops), new);
    }

    #[test]
    fn test_mixed_script_replays_to_new_list() {
        let old = list(&[1, 2, 3, 4, 5, 6]);
        let mut new = list(&[7, 4, 2, 8, 6, 1]);
        new[1] = new[1].with_name_and_importance("renamed", true);

        let ops = diff(&old, &new);
        assert_eq!(apply(&old, &ops), new);
        assert!(ops.contains(&DiffOp::Remove { index: 4 }));
        assert!(ops.contains(&DiffOp::Remove { index: 2 }));
        assert!(ops.iter().any(|op| matches!(op, DiffOp::Change { index: 1, .. })));
    }

    #[test]
    fn test_adapter_diffs_against_last_submit() {
        let mut adapter = TaskListAdapter::new();
        adapter.submit(list(&[1, 2, 3]));
        let ops = adapter.submit(list(&[1, 3]));
        assert_eq!(ops, vec![DiffOp::Remove { index: 1 }]);
        assert_eq!(adapter.items(), list(&[1, 3]).as_slice());
        assert!(adapter.submit(Vec::new()).len() == 2 && adapter.is_empty());
    }
}
