//! The engine façade: one value per site, tying the kernel, the merge, and
//! the history store into the two operations peers actually call.
//!
//! - [`Engine::integrate_remote`] folds a transaction from another site into
//!   local history and returns the transaction to apply to the local buffer.
//! - [`Engine::process_transaction`] positions a locally authored
//!   transaction relative to history so peers can integrate it.
//!
//! Both run to completion without yielding and mutate history only after
//! every fallible step has succeeded, so a returned error always leaves the
//! engine exactly as it was.

use thiserror::Error;

use crate::history::History;
use crate::op::InsertOp;
use crate::op::InsertSequence;
use crate::op::Operation;
use crate::op::SiteId;
use crate::op::State;
use crate::op::Transaction;
use crate::transform::swap_delete_delete;
use crate::transform::swap_delete_insert;
use crate::transform::transform_delete_delete;
use crate::transform::transform_delete_insert;
use crate::transform::transform_insert_delete;
use crate::transform::transform_insert_insert;

/// Why an engine call was refused. The engine's state is unchanged in both
/// cases.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The transaction names a causal cut this site has not seen yet. Buffer
    /// the transaction and retry after integrating more history.
    #[error("transaction depends on an operation not yet in local history")]
    CausalityNotMet,

    /// An input was structurally unsound: an unstamped operation where a
    /// stamp is required, or a run out of effect order.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

/// Select the operations of `sequence` that are concurrent to the causal cut
/// named by `starting_state`: those the cut's author had not observed.
///
/// A `None` cut depends on nothing, so everything is concurrent. Otherwise
/// the cut is resolved through `history` to the local stamp of the matching
/// operation; the concurrent operations are the ones stamped later.
pub fn concurrent_since(
    starting_state: Option<&State>,
    sequence: &[InsertOp],
    history: &History,
) -> Result<InsertSequence, EngineError> {
    let Some(reference) = starting_state else {
        return Ok(sequence.iter().cloned().collect());
    };
    let Some(cut) = history.find_local_time(reference) else {
        return Err(EngineError::CausalityNotMet);
    };
    return Ok(stamped_between(sequence, cut, u64::MAX));
}

/// Operations of `sequence` stamped strictly after `cut` and no later than
/// `upper`.
fn stamped_between(sequence: &[InsertOp], cut: u64, upper: u64) -> InsertSequence {
    return sequence
        .iter()
        .filter(|op| {
            op.state
                .is_some_and(|state| state.local_time > cut && state.local_time <= upper)
        })
        .cloned()
        .collect();
}

fn check_effect_order<T: Operation>(sequence: &[T], what: &str) -> Result<(), EngineError> {
    for pair in sequence.windows(2) {
        if pair[1].position() < pair[0].position() {
            return Err(EngineError::InvariantViolation(format!(
                "{what} run is not in effect order at position {}",
                pair[1].position(),
            )));
        }
    }
    return Ok(());
}

fn check_stamped<T: Operation>(sequence: &[T], what: &str) -> Result<(), EngineError> {
    for op in sequence {
        if op.state().is_none() {
            return Err(EngineError::InvariantViolation(format!(
                "{what} run carries an unstamped operation",
            )));
        }
    }
    return Ok(());
}

/// The transformation engine for one site.
#[derive(Clone, Debug)]
pub struct Engine {
    site_id: SiteId,
    history: History,
}

impl Engine {
    /// A fresh engine: empty history, stamp counter at zero.
    pub fn new(site_id: SiteId) -> Engine {
        return Engine {
            site_id,
            history: History::new(),
        };
    }

    /// This site's identifier.
    pub fn site_id(&self) -> SiteId {
        return self.site_id;
    }

    /// Read access to the history store.
    pub fn history(&self) -> &History {
        return &self.history;
    }

    /// Integrate a transaction received from another site.
    ///
    /// The returned transaction is positioned for the local buffer: apply
    /// its inserts, then its deletes, and the buffer reflects the remote
    /// edit. Local history absorbs the remote operations so later
    /// transactions, local or remote, transform against them.
    ///
    /// Fails with [`EngineError::CausalityNotMet`] when the transaction's
    /// causal cut has not reached this site yet; buffer it and retry after
    /// more integration.
    pub fn integrate_remote(&mut self, remote: &Transaction) -> Result<Transaction, EngineError> {
        check_effect_order(&remote.inserts, "remote insert")?;
        check_effect_order(&remote.deletes, "remote delete")?;
        check_stamped(&remote.inserts, "remote insert")?;
        check_stamped(&remote.deletes, "remote delete")?;

        // Resolve the causal cut before touching anything; this is the only
        // step that can fail on a well-formed transaction.
        let cut = match remote.starting_state.as_ref() {
            None => None,
            Some(reference) => match self.history.find_local_time(reference) {
                Some(local_time) => Some(local_time),
                None => return Err(EngineError::CausalityNotMet),
            },
        };
        let concurrent = match cut {
            None => self.history.inserts().iter().cloned().collect(),
            Some(cut) => stamped_between(self.history.inserts(), cut, u64::MAX),
        };

        let mut remote_inserts = transform_insert_insert(&remote.inserts, &concurrent);
        let out_inserts = transform_insert_delete(&remote_inserts, self.history.deletes());

        let stamped_through = self.history.time_stamp();
        self.history.assign_timestamps(self.site_id, &mut remote_inserts);
        self.history.merge_inserts(&remote_inserts);

        // The merge moved the concurrent inserts; re-select them from the
        // merged history at their new positions. The freshly stamped remote
        // inserts all sit above the old counter, so they stay out.
        let concurrent = stamped_between(
            self.history.inserts(),
            cut.unwrap_or(0),
            stamped_through,
        );

        let shifted_deletes = transform_delete_insert(self.history.deletes(), &remote_inserts);
        self.history.set_deletes(shifted_deletes);

        let remote_deletes = transform_delete_insert(&remote.deletes, &concurrent);
        let mut out_deletes = transform_delete_delete(&remote_deletes, self.history.deletes());
        self.history.assign_timestamps(self.site_id, &mut out_deletes);
        self.history.merge_deletes(&out_deletes);

        return Ok(Transaction {
            starting_state: remote.starting_state,
            inserts: out_inserts,
            deletes: out_deletes,
        });
    }

    /// Position a locally authored transaction for transport.
    ///
    /// The author has already applied `outgoing` to its own buffer; this
    /// call stamps it, records it in history, and returns the version peers
    /// integrate: execution order swapped so the outgoing operations are
    /// expressed relative to the causal cut in `starting_state` rather than
    /// to this site's private delete history.
    pub fn process_transaction(
        &mut self,
        mut outgoing: Transaction,
    ) -> Result<Transaction, EngineError> {
        check_effect_order(&outgoing.inserts, "outgoing insert")?;
        check_effect_order(&outgoing.deletes, "outgoing delete")?;

        let outgoing_state = self.history.last_state().copied();
        self.history.assign_timestamps(self.site_id, &mut outgoing.inserts);
        self.history.assign_timestamps(self.site_id, &mut outgoing.deletes);

        let (swapped_inserts, deletes_after_inserts) =
            swap_delete_insert(self.history.deletes(), &outgoing.inserts);
        let (swapped_deletes, _) = swap_delete_delete(&deletes_after_inserts, &outgoing.deletes);

        self.history.merge_inserts(&swapped_inserts);
        self.history.set_deletes(deletes_after_inserts);
        self.history.merge_deletes(&outgoing.deletes);

        return Ok(Transaction {
            starting_state: outgoing_state,
            inserts: swapped_inserts,
            deletes: swapped_deletes,
        });
    }
}
