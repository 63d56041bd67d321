//! Behavior shared by the functional-unit and method projections.

use std::collections::BTreeSet;

use lf_core::Signal;

use crate::error::{AppError, AppResult};

/// Which half of a calculation setup a projection edit touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupPart {
    Inventory,
    Methods,
}

/// Payload of the "setup changed" notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupChanged {
    pub setup: String,
    pub part: SetupPart,
}

/// Notifications a projection produces for its presenters.
#[derive(Default)]
pub struct ProjectionEvents {
    /// Row data changed; re-render.
    pub updated: Signal<()>,
    /// The projection was edited; the durable setup must follow.
    pub setup_changed: Signal<SetupChanged>,
}

impl ProjectionEvents {
    /// "updated" then "setup changed", the order every edit announces in.
    pub(crate) fn edited(&self, setup: &str, part: SetupPart) {
        self.updated.emit(&());
        self.setup_changed.emit(&SetupChanged {
            setup: setup.to_string(),
            part,
        });
    }
}

pub(crate) fn check_row(row: usize, len: usize) -> AppResult<()> {
    if row < len {
        Ok(())
    } else {
        Err(AppError::RowOutOfRange { row, len })
    }
}

/// Move the row at `source` so it lands immediately before the row that
/// was at `target`, in either direction.
pub(crate) fn relocate<T>(rows: &mut Vec<T>, source: usize, target: usize) -> AppResult<()> {
    check_row(source, rows.len())?;
    check_row(target, rows.len())?;
    if source != target {
        let row = rows.remove(source);
        let at = if source < target { target - 1 } else { target };
        rows.insert(at, row);
    }
    Ok(())
}

/// Remove the rows at `indices` and return them in ascending index order.
///
/// Duplicate indices collapse; any index out of range fails before
/// anything is removed.
pub(crate) fn remove_rows<T>(rows: &mut Vec<T>, indices: &[usize]) -> AppResult<Vec<T>> {
    let unique: BTreeSet<usize> = indices.iter().copied().collect();
    if let Some(&last) = unique.last() {
        check_row(last, rows.len())?;
    }
    let mut removed: Vec<T> = unique.iter().rev().map(|&i| rows.remove(i)).collect();
    removed.reverse();
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn relocate_up_lands_before_target() {
        let mut rows = vec!['a', 'b', 'c', 'd'];
        relocate(&mut rows, 3, 1).unwrap();
        assert_eq!(rows, vec!['a', 'd', 'b', 'c']);
    }

    #[test]
    fn relocate_down_lands_before_target() {
        let mut rows = vec!['a', 'b', 'c', 'd'];
        relocate(&mut rows, 0, 2).unwrap();
        assert_eq!(rows, vec!['b', 'a', 'c', 'd']);

        let mut rows = vec!['a', 'b', 'c', 'd'];
        relocate(&mut rows, 1, 3).unwrap();
        assert_eq!(rows, vec!['a', 'c', 'b', 'd']);
    }

    #[test]
    fn relocate_onto_next_row_keeps_order() {
        let mut rows = vec!['a', 'b', 'c'];
        relocate(&mut rows, 0, 1).unwrap();
        assert_eq!(rows, vec!['a', 'b', 'c']);
    }

    #[test]
    fn relocate_out_of_range() {
        let mut rows = vec!['a'];
        assert!(matches!(
            relocate(&mut rows, 0, 1),
            Err(AppError::RowOutOfRange { row: 1, len: 1 })
        ));
    }

    #[test]
    fn remove_rows_collapses_duplicates() {
        let mut rows = vec![10, 11, 12, 13];
        let removed = remove_rows(&mut rows, &[2, 0, 2]).unwrap();
        assert_eq!(removed, vec![10, 12]);
        assert_eq!(rows, vec![11, 13]);
    }

    #[test]
    fn remove_rows_checks_before_mutating() {
        let mut rows = vec![10, 11];
        assert!(remove_rows(&mut rows, &[0, 5]).is_err());
        assert_eq!(rows, vec![10, 11]);
    }

    #[test]
    fn edited_emits_updated_first() {
        let events = ProjectionEvents::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        events.updated.connect(move |_| l.borrow_mut().push("updated"));
        let l = Rc::clone(&log);
        events
            .setup_changed
            .connect(move |_| l.borrow_mut().push("setup changed"));

        events.edited("s", SetupPart::Inventory);
        assert_eq!(*log.borrow(), vec!["updated", "setup changed"]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Index the row moved by `relocate(source, target)` ends up at.
    fn relocated_index(source: usize, target: usize) -> usize {
        if source < target { target - 1 } else { target }
    }

    fn rows_and_moves() -> impl Strategy<Value = (usize, usize, usize)> {
        (1usize..12).prop_flat_map(|n| (Just(n), 0..n, 0..n))
    }

    proptest! {
        #[test]
        fn relocate_preserves_rows_and_order((n, source, target) in rows_and_moves()) {
            let before: Vec<usize> = (0..n).collect();
            let mut after = before.clone();
            relocate(&mut after, source, target).unwrap();

            let mut sorted = after.clone();
            sorted.sort_unstable();
            prop_assert_eq!(&sorted, &before);

            let at = relocated_index(source, target);
            prop_assert_eq!(after[at], source);
            if source != target {
                prop_assert_eq!(after[at + 1], before[target]);
            }

            let others_before: Vec<usize> = before.iter().copied().filter(|&r| r != source).collect();
            let others_after: Vec<usize> = after.iter().copied().filter(|&r| r != source).collect();
            prop_assert_eq!(others_before, others_after);
        }
    }
}
