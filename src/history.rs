//! Per-site history: everything this site has ever merged, kept replayable.
//!
//! History is two runs, inserts first and deletes second, each in *effect
//! order*: ascending by final buffer position. Keeping the runs this way is
//! what lets the kernel walk them front to front with running totals instead
//! of searching.
//!
//! Operations only enter history through the merge routine, stamped with a
//! fresh `local_time` immediately beforehand. The stamp counter is strictly
//! increasing across both runs, so any operation in history can be compared
//! against a causal cut with a single integer.

use rustc_hash::FxHashSet;

use crate::engine::EngineError;
use crate::merge::merge_effect_ordered;
use crate::op::DeleteOp;
use crate::op::DeleteSequence;
use crate::op::InsertOp;
use crate::op::InsertSequence;
use crate::op::Operation;
use crate::op::SiteId;
use crate::op::State;

/// The history store for one site.
#[derive(Clone, Debug, Default)]
pub struct History {
    inserts: InsertSequence,
    deletes: DeleteSequence,
    last_state: Option<State>,
    time_stamp: u64,
}

impl History {
    /// An empty history: no operations, no last state, counter at zero.
    pub fn new() -> History {
        return History::default();
    }

    /// The insert run, in effect order.
    pub fn inserts(&self) -> &[InsertOp] {
        return &self.inserts;
    }

    /// The delete run, in effect order.
    pub fn deletes(&self) -> &[DeleteOp] {
        return &self.deletes;
    }

    /// The state of the most recently merged operation.
    pub fn last_state(&self) -> Option<&State> {
        return self.last_state.as_ref();
    }

    /// The stamp counter. Every stamped operation's `local_time` is at most
    /// this value.
    pub fn time_stamp(&self) -> u64 {
        return self.time_stamp;
    }

    /// Stamp a run of operations, consuming one counter tick each.
    ///
    /// A remote operation keeps its author's `site_id` and `remote_time` and
    /// only has its `local_time` rewritten; a locally authored operation with
    /// no state yet gets a fresh one where both clocks agree.
    pub fn assign_timestamps<T: Operation>(&mut self, site_id: SiteId, sequence: &mut [T]) {
        for op in sequence {
            self.time_stamp += 1;
            match op.state_mut() {
                Some(state) => state.local_time = self.time_stamp,
                None => op.set_state(State::new(site_id, self.time_stamp, self.time_stamp)),
            }
        }
    }

    /// Resolve a causal cut: find the operation in history with the same
    /// origin as `reference` and report the `local_time` it was stamped
    /// with. Inserts are searched first, then deletes.
    pub fn find_local_time(&self, reference: &State) -> Option<u64> {
        for op in &self.inserts {
            if let Some(state) = op.state
                && state.same_origin(reference)
            {
                return Some(state.local_time);
            }
        }
        for op in &self.deletes {
            if let Some(state) = op.state
                && state.same_origin(reference)
            {
                return Some(state.local_time);
            }
        }
        return None;
    }

    /// Splice an already-transformed insert run into the insert history,
    /// tracking `last_state` from it.
    pub fn merge_inserts(&mut self, incoming: &[InsertOp]) {
        let (merged, last) = merge_effect_ordered(&self.inserts, incoming);
        self.inserts = merged;
        if last.is_some() {
            self.last_state = last;
        }
    }

    /// Splice an already-transformed delete run into the delete history,
    /// tracking `last_state` from it.
    pub fn merge_deletes(&mut self, incoming: &[DeleteOp]) {
        let (merged, last) = merge_effect_ordered(&self.deletes, incoming);
        self.deletes = merged;
        if last.is_some() {
            self.last_state = last;
        }
    }

    /// Install a retransformed delete run wholesale.
    ///
    /// Integration shifts the whole delete history to account for newly
    /// merged inserts before splicing remote deletes into it; the shifted
    /// run replaces the old one, it is not merged.
    pub fn set_deletes(&mut self, deletes: DeleteSequence) {
        self.deletes = deletes;
    }

    /// Check the structural invariants: both runs in effect order, every
    /// operation stamped, `local_time` unique across both runs and within
    /// the counter.
    pub fn check_invariants(&self) -> Result<(), EngineError> {
        check_run(&self.inserts, "insert history")?;
        check_run(&self.deletes, "delete history")?;

        let mut seen = FxHashSet::default();
        let all_states = self
            .inserts
            .iter()
            .filter_map(|op| op.state)
            .chain(self.deletes.iter().filter_map(|op| op.state));
        for state in all_states {
            if state.local_time > self.time_stamp {
                return Err(EngineError::InvariantViolation(format!(
                    "local_time {} is ahead of the stamp counter {}",
                    state.local_time, self.time_stamp,
                )));
            }
            if !seen.insert(state.local_time) {
                return Err(EngineError::InvariantViolation(format!(
                    "duplicate local_time {} in history",
                    state.local_time,
                )));
            }
        }
        return Ok(());
    }
}

fn check_run<T: Operation>(sequence: &[T], what: &str) -> Result<(), EngineError> {
    for pair in sequence.windows(2) {
        if pair[1].position() < pair[0].position() {
            return Err(EngineError::InvariantViolation(format!(
                "{what} is not in effect order at position {}",
                pair[1].position(),
            )));
        }
    }
    for op in sequence {
        if op.state().is_none() {
            return Err(EngineError::InvariantViolation(format!(
                "{what} holds an unstamped operation",
            )));
        }
    }
    return Ok(());
}
