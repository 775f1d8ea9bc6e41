//! Effect-order two-way merge.
//!
//! Splices a transformed run into an existing one while keeping the result
//! in effect order. The precondition is directional: the second run must
//! already have been transformed against the first, so the merge never has
//! to reconcile anything; it only interleaves and renumbers.
//!
//! Whichever head has the smaller effective position is emitted; the second
//! run's effective position discounts everything of its own that was already
//! emitted, and first-run ops shift by that same amount when they land after
//! second-run ops. Ties go to the first run.

use crate::op::Operation;
use crate::op::Sequence;
use crate::op::State;

/// Merge two effect-ordered runs, `second` having been transformed against
/// `first`. Returns the merged run and the state of the last `second` op
/// consumed (`None` when `second` is empty); the history store tracks its
/// `last_state` from it.
pub fn merge_effect_ordered<T: Operation>(
    first: &[T],
    second: &[T],
) -> (Sequence<T>, Option<State>) {
    let mut value_size: i64 = 0;
    let mut out = Sequence::new();
    let mut last_state: Option<State> = None;
    let mut i1 = 0usize;
    let mut i2 = 0usize;

    while i1 < first.len() && i2 < second.len() {
        let a = &first[i1];
        let b = &second[i2];
        if (b.position() as i64 - value_size) < a.position() as i64 {
            out.push(b.clone());
            value_size += b.increment();
            last_state = b.state().copied();
            i2 += 1;
        } else {
            let mut op = a.clone();
            op.set_position((a.position() as i64 + value_size) as u64);
            out.push(op);
            i1 += 1;
        }
    }
    for b in &second[i2..] {
        out.push(b.clone());
        value_size += b.increment();
        last_state = b.state().copied();
    }
    for a in &first[i1..] {
        let mut op = a.clone();
        op.set_position((a.position() as i64 + value_size) as u64);
        out.push(op);
    }
    return (out, last_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::DeleteOp;
    use crate::op::DeleteSequence;
    use crate::op::InsertOp;
    use crate::op::InsertSequence;
    use crate::op::SiteId;

    fn ins(site: u32, ops: &[(u64, &str)]) -> InsertSequence {
        return ops
            .iter()
            .enumerate()
            .map(|(k, &(position, value))| {
                let time = k as u64 + 1;
                InsertOp::with_state(position, value, State::new(SiteId(site), time, time))
            })
            .collect();
    }

    fn dels(site: u32, ops: &[(u64, u64)]) -> DeleteSequence {
        return ops
            .iter()
            .enumerate()
            .map(|(k, &(position, length))| {
                let time = k as u64 + 1;
                DeleteOp::with_state(position, length, State::new(SiteId(site), time, time))
            })
            .collect();
    }

    fn ins_pairs(seq: &[InsertOp]) -> Vec<(u64, String)> {
        return seq.iter().map(|op| (op.position, op.value.clone())).collect();
    }

    // Buffer "The quick brown fox": site 1's inserts are the first run, the
    // second run already accounts for them, and the merge interleaves both
    // into one effect-ordered history.
    #[test]
    fn merge_interleaves_insert_runs() {
        let first = ins(1, &[(4, "very "), (14, "ly"), (20, "u")]);
        let second = ins(2, &[(3, "ee"), (18, "k"), (26, "wnwnwn"), (36, "xx!")]);
        let (merged, last) = merge_effect_ordered(&first, &second);
        assert_eq!(
            ins_pairs(&merged),
            vec![
                (3, "ee".to_string()),
                (6, "very ".to_string()),
                (16, "ly".to_string()),
                (18, "k".to_string()),
                (23, "u".to_string()),
                (26, "wnwnwn".to_string()),
                (36, "xx!".to_string()),
            ],
        );
        assert_eq!(last, second[3].state);
    }

    // Delete merges shift first-run positions down by what the second run
    // removed ahead of them.
    #[test]
    fn merge_interleaves_delete_runs() {
        let first = dels(1, &[(2, 1), (6, 1), (10, 2), (18, 2), (28, 1)]);
        let second = dels(1, &[(1, 1), (15, 2), (24, 1)]);
        let (merged, last) = merge_effect_ordered(&first, &second);
        let pairs: Vec<(u64, u64)> = merged.iter().map(|op| (op.position, op.length)).collect();
        assert_eq!(
            pairs,
            vec![
                (1, 1),
                (1, 1),
                (5, 1),
                (9, 2),
                (15, 2),
                (15, 2),
                (24, 1),
                (24, 1),
            ],
        );
        assert_eq!(last, second[2].state);
    }

    #[test]
    fn merge_with_empty_second_leaves_first_alone() {
        let first = ins(1, &[(0, "abc"), (5, "de")]);
        let (merged, last) = merge_effect_ordered(&first, &[]);
        assert_eq!(ins_pairs(&merged), ins_pairs(&first));
        assert!(last.is_none());
    }

    #[test]
    fn merge_with_empty_first_copies_second() {
        let second = ins(2, &[(0, "abc"), (5, "de")]);
        let (merged, last) = merge_effect_ordered(&[], &second);
        assert_eq!(ins_pairs(&merged), ins_pairs(&second));
        assert_eq!(last, second[1].state);
    }

    // Equal effective positions keep the first run's op first.
    #[test]
    fn merge_tie_keeps_first_run_first() {
        let first = ins(1, &[(3, "a")]);
        let second = ins(2, &[(3, "b")]);
        let (merged, _) = merge_effect_ordered(&first, &second);
        assert_eq!(
            ins_pairs(&merged),
            vec![(3, "a".to_string()), (3, "b".to_string())],
        );
    }
}
