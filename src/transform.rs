//! The transformation kernel: pure functions that reposition operation runs
//! relative to one another.
//!
//! Four *inclusive* transformers incorporate the effects of an `existing`
//! run into an `incoming` run, so the incoming run can be applied after the
//! existing one and still mean what its author intended. Two *swappers*
//! reverse the execution order of a pair of runs while preserving their
//! combined effect.
//!
//! All six share one scan shape:
//!
//! 1. Walk both runs front to front, keeping a running total of the signed
//!    effect (`increment`) of everything consumed on each side.
//! 2. At each step compute the *adjusted position* of each head: where it
//!    would land if performed now rather than after its predecessors. Runs
//!    transformed against inserts subtract the running total; delete-delete
//!    transformation adds it back instead, so both runs speak the
//!    coordinates of the untouched document.
//! 3. When the heads' adjusted positions tie, the one with the smaller
//!    `site_id` is treated as earlier. Every site breaks ties the same way,
//!    which is what makes the outcome order-independent.
//! 4. Once either side runs dry, drain the other with the final totals.
//!    The drain recomputes each remaining head's adjusted position before
//!    clipping against the last consumed range.
//!
//! Overlapping deletes get clipped, possibly down to length zero; the
//! zero-length remnants are kept, not dropped. A delete that straddles an
//! existing one is split: the far half is queued on a one-slot lookahead
//! cursor and processed as the next head.

use crate::op::DeleteOp;
use crate::op::DeleteSequence;
use crate::op::InsertOp;
use crate::op::InsertSequence;
use crate::op::Operation;
use crate::op::Sequence;
use crate::op::SiteId;
use crate::op::State;

/// Tie-break for equal adjusted positions. Unstamped operations sort first.
fn site_precedes(existing: Option<SiteId>, incoming: Option<SiteId>) -> bool {
    return existing < incoming;
}

/// A delete in the kernel's working frame. Positions are signed here: a
/// freshly spliced node can sit below zero until the running totals bring it
/// back into range on the next step.
#[derive(Clone)]
struct RawDelete {
    position: i64,
    length: i64,
    state: Option<State>,
}

impl RawDelete {
    fn from_op(op: &DeleteOp) -> RawDelete {
        return RawDelete {
            position: op.position as i64,
            length: op.length as i64,
            state: op.state,
        };
    }

    fn site_id(&self) -> Option<SiteId> {
        return self.state.map(|state| state.site_id);
    }

    fn emit(position: i64, length: i64, state: Option<State>) -> DeleteOp {
        debug_assert!(position >= 0, "emitted delete position went negative");
        debug_assert!(length >= 0, "emitted delete length went negative");
        return DeleteOp {
            position: position as u64,
            length: length as u64,
            state,
        };
    }
}

/// Forward cursor over a delete run with a one-slot lookahead, so a node
/// spliced mid-walk becomes the next head without touching the input.
struct SpliceCursor<'a> {
    ops: &'a [DeleteOp],
    next: usize,
    pending: Option<RawDelete>,
    current: Option<RawDelete>,
}

impl<'a> SpliceCursor<'a> {
    fn new(ops: &'a [DeleteOp]) -> SpliceCursor<'a> {
        let mut cursor = SpliceCursor {
            ops,
            next: 0,
            pending: None,
            current: None,
        };
        cursor.advance();
        return cursor;
    }

    fn head(&self) -> Option<RawDelete> {
        return self.current.clone();
    }

    /// Queue a node to become the head after the next `advance`.
    fn splice(&mut self, node: RawDelete) {
        self.pending = Some(node);
    }

    fn advance(&mut self) {
        if let Some(node) = self.pending.take() {
            self.current = Some(node);
        } else if self.next < self.ops.len() {
            self.current = Some(RawDelete::from_op(&self.ops[self.next]));
            self.next += 1;
        } else {
            self.current = None;
        }
    }
}

/// The shared scan for transforming any run against a run of inserts: the
/// arithmetic is identical whether the incoming run inserts or deletes.
fn transform_against_inserts<T: Operation>(incoming: &[T], existing: &[InsertOp]) -> Sequence<T> {
    let mut incoming_size: i64 = 0;
    let mut existing_size: i64 = 0;
    let mut out = Sequence::new();
    let mut ii = 0usize;
    let mut ei = 0usize;

    while ei < existing.len() && ii < incoming.len() {
        let e = &existing[ei];
        let inc = &incoming[ii];
        let existing_pos = e.position as i64 - existing_size;
        let incoming_pos = inc.position() as i64 - incoming_size;
        if existing_pos < incoming_pos
            || (existing_pos == incoming_pos && site_precedes(e.site_id(), inc.site_id()))
        {
            existing_size += e.increment();
            ei += 1;
        } else {
            let mut op = inc.clone();
            op.set_position((inc.position() as i64 + existing_size) as u64);
            incoming_size += inc.increment();
            out.push(op);
            ii += 1;
        }
    }
    for inc in &incoming[ii..] {
        let mut op = inc.clone();
        op.set_position((inc.position() as i64 + existing_size) as u64);
        out.push(op);
    }
    return out;
}

/// Incorporate existing inserts into an incoming insert run.
pub fn transform_insert_insert(incoming: &[InsertOp], existing: &[InsertOp]) -> InsertSequence {
    return transform_against_inserts(incoming, existing);
}

/// Incorporate existing inserts into an incoming delete run.
pub fn transform_delete_insert(incoming: &[DeleteOp], existing: &[InsertOp]) -> DeleteSequence {
    return transform_against_inserts(incoming, existing);
}

/// Incorporate existing deletes into an incoming insert run.
///
/// An insert whose target character was deleted has nowhere exact to land;
/// it snaps to the coalesced edit point, the end of the delete that swallowed
/// its position.
pub fn transform_insert_delete(incoming: &[InsertOp], existing: &[DeleteOp]) -> InsertSequence {
    let mut incoming_size: i64 = 0;
    let mut existing_size: i64 = 0;
    let mut existing_end: i64 = 0;
    let mut out = InsertSequence::new();
    let mut ii = 0usize;
    let mut ei = 0usize;

    while ei < existing.len() && ii < incoming.len() {
        let e = &existing[ei];
        let inc = &incoming[ii];
        let existing_pos = e.position as i64 - existing_size;
        let incoming_pos = inc.position as i64 - incoming_size;
        if existing_pos < incoming_pos
            || (existing_pos == incoming_pos && site_precedes(e.site_id(), inc.site_id()))
        {
            existing_size += e.increment();
            existing_end = existing_pos + e.length as i64;
            ei += 1;
        } else {
            let mut op = inc.clone();
            let mut position = inc.position as i64;
            if incoming_pos < existing_end {
                position = existing_end + incoming_size;
            }
            op.position = (position + existing_size) as u64;
            incoming_size += inc.increment();
            out.push(op);
            ii += 1;
        }
    }
    while ii < incoming.len() {
        let inc = &incoming[ii];
        let incoming_pos = inc.position as i64 - incoming_size;
        let mut op = inc.clone();
        let mut position = inc.position as i64;
        if incoming_pos < existing_end {
            position = existing_end + incoming_size;
        }
        op.position = (position + existing_size) as u64;
        incoming_size += inc.increment();
        out.push(op);
        ii += 1;
    }
    return out;
}

/// Incorporate existing deletes into an incoming delete run.
///
/// Both runs contract the document, so adjusted positions *add* the running
/// totals back, putting both sides in the coordinates of the untouched
/// document. Overlaps clip the incoming delete (kept even at length zero); a
/// straddle splits it around the existing delete. `double_count` cancels the
/// spans both sides would remove, so the emitted positions stay coherent in
/// a document where the existing run has already been applied.
pub fn transform_delete_delete(incoming: &[DeleteOp], existing: &[DeleteOp]) -> DeleteSequence {
    let mut existing_size: i64 = 0;
    let mut incoming_size: i64 = 0;
    let mut existing_end: i64 = 0;
    let mut double_count: i64 = 0;
    let mut out = DeleteSequence::new();
    let mut cursor = SpliceCursor::new(incoming);
    let mut ei = 0usize;

    while ei < existing.len() {
        let Some(head) = cursor.head() else { break };
        let e = &existing[ei];
        let e_len = e.length as i64;
        let existing_pos = e.position as i64 + existing_size;
        let incoming_pos = head.position + incoming_size;

        if existing_pos < incoming_pos
            || (existing_pos == incoming_pos && site_precedes(e.site_id(), head.site_id()))
        {
            existing_size += e_len;
            existing_end = existing_pos + e_len;
            ei += 1;
            continue;
        }

        let mut emitted_pos = head.position;
        let mut emitted_len = head.length;
        let mut double_delta: i64 = 0;

        // Overlap with the previously consumed existing delete: the head's
        // prefix is already gone, so clip it down (possibly to nothing).
        if existing_end > incoming_pos {
            emitted_pos = existing_end - incoming_size;
            emitted_len = (head.length - (existing_end - incoming_pos)).max(0);
        }
        // Overlap with the current existing delete.
        if incoming_pos + head.length > existing_pos {
            if incoming_pos + head.length < existing_pos + e_len {
                // Ends inside it: keep only the part before it.
                emitted_len = existing_pos - incoming_pos;
            } else if incoming_pos != existing_pos + e_len {
                // Straddles it: keep the near gap now, split off the far gap
                // as a new head. The spliced length is subtracted from the
                // running total so it is not counted twice when it comes
                // back around.
                emitted_len -= incoming_pos + head.length - existing_pos;
                let spliced_len = head.length + incoming_pos - existing_pos - e_len;
                incoming_size -= spliced_len;
                double_delta = -spliced_len;
                cursor.splice(RawDelete {
                    position: existing_pos + e_len - incoming_size - head.length,
                    length: spliced_len,
                    state: head.state,
                });
            }
        }

        emitted_pos -= existing_size - double_count;
        out.push(RawDelete::emit(emitted_pos, emitted_len, head.state));
        double_count += head.length - emitted_len + double_delta;
        incoming_size += head.length;
        cursor.advance();
    }

    while let Some(head) = cursor.head() {
        let incoming_pos = head.position + incoming_size;
        let mut emitted_pos = head.position;
        let mut emitted_len = head.length;
        if existing_end > incoming_pos {
            emitted_pos = existing_end - incoming_size;
            emitted_len = (head.length - (existing_end - incoming_pos)).max(0);
        }
        emitted_pos -= existing_size - double_count;
        out.push(RawDelete::emit(emitted_pos, emitted_len, head.state));
        double_count += head.length - emitted_len;
        incoming_size += head.length;
        cursor.advance();
    }
    return out;
}

/// Swap execution order from "deletes, then inserts" to "inserts, then
/// deletes". Returns `(inserts, deletes)` in their new order.
///
/// Moving an insert ahead of the deletes means its position must add back
/// whatever the earlier deletes had removed before it; moving a delete
/// behind the inserts shifts it by whatever was inserted before it. On a
/// positional tie the delete stays first.
pub fn swap_delete_insert(
    deletes: &[DeleteOp],
    inserts: &[InsertOp],
) -> (InsertSequence, DeleteSequence) {
    let mut inserted: i64 = 0;
    let mut deleted: i64 = 0;
    let mut out_inserts = InsertSequence::new();
    let mut out_deletes = DeleteSequence::new();
    let mut di = 0usize;
    let mut ii = 0usize;

    while di < deletes.len() && ii < inserts.len() {
        let d = &deletes[di];
        let ins = &inserts[ii];
        if (d.position as i64) <= ins.position as i64 - inserted {
            let mut op = d.clone();
            op.position = (d.position as i64 + inserted) as u64;
            deleted += d.length as i64;
            out_deletes.push(op);
            di += 1;
        } else {
            let mut op = ins.clone();
            op.position = (ins.position as i64 + deleted) as u64;
            inserted += ins.increment();
            out_inserts.push(op);
            ii += 1;
        }
    }
    for d in &deletes[di..] {
        let mut op = d.clone();
        op.position = (d.position as i64 + inserted) as u64;
        out_deletes.push(op);
    }
    for ins in &inserts[ii..] {
        let mut op = ins.clone();
        op.position = (ins.position as i64 + deleted) as u64;
        out_inserts.push(op);
    }
    return (out_inserts, out_deletes);
}

/// Swap execution order of two delete runs, so `second` runs first. Returns
/// `(second, first)` in their new order.
///
/// A `second` delete that reaches into a span the `first` run had already
/// removed cannot keep its shape once it runs first: it is cut at the
/// boundary and the remainder is spliced in as the next head. On a
/// positional tie the `first` delete is emitted (it keeps its place in the
/// new second slot).
pub fn swap_delete_delete(
    first: &[DeleteOp],
    second: &[DeleteOp],
) -> (DeleteSequence, DeleteSequence) {
    let mut emitted_second: i64 = 0;
    let mut emitted_first: i64 = 0;
    let mut out_second = DeleteSequence::new();
    let mut out_first = DeleteSequence::new();
    let mut fi = 0usize;
    let mut cursor = SpliceCursor::new(second);

    while fi < first.len() {
        let Some(head) = cursor.head() else { break };
        let f = &first[fi];
        if (f.position as i64) <= head.position + emitted_second {
            out_first.push(RawDelete::emit(
                f.position as i64 - emitted_second,
                f.length as i64,
                f.state,
            ));
            emitted_first += f.length as i64;
            fi += 1;
        } else {
            let mut emitted_len = head.length;
            if head.position + emitted_second + head.length > f.position as i64 {
                emitted_len = f.position as i64 - head.position - emitted_second;
                cursor.splice(RawDelete {
                    position: head.position,
                    length: head.length - emitted_len,
                    state: head.state,
                });
            }
            out_second.push(RawDelete::emit(
                head.position + emitted_first,
                emitted_len,
                head.state,
            ));
            emitted_second += emitted_len;
            cursor.advance();
        }
    }
    for f in &first[fi..] {
        out_first.push(RawDelete::emit(
            f.position as i64 - emitted_second,
            f.length as i64,
            f.state,
        ));
    }
    while let Some(head) = cursor.head() {
        out_second.push(RawDelete::emit(
            head.position + emitted_first,
            head.length,
            head.state,
        ));
        cursor.advance();
    }
    return (out_second, out_first);
}
