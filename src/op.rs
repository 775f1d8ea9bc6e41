//! Operations over a shared linear text buffer.
//!
//! Every edit is either an insert or a delete at a buffer position. The key
//! properties that make them transformable:
//!
//! - Positions are plain indices, interpreted just before the character at
//!   that index. They are only meaningful relative to the history the author
//!   had observed; the transformation kernel repositions them.
//! - Every operation carries a causal tag, its [`State`]: who authored it,
//!   when the author stamped it, and when the holding site stamped it.
//! - An operation's *increment* is the signed amount by which it shifts the
//!   positions of everything after it: `+len` for inserts, `-length` for
//!   deletes.
//!
//! Positions and lengths count Unicode scalar values, not bytes.

use serde::Deserialize;
use serde::Serialize;
use smallvec::SmallVec;

/// A totally ordered identifier, unique per site in the editing session.
///
/// Used as a deterministic tie-breaker when two concurrent operations target
/// the same position, so every site orders them identically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SiteId(pub u32);

/// The causal tag attached to every operation.
///
/// `local_time` is the sequence number assigned by the site currently holding
/// the operation in its history; `remote_time` is the author's original
/// timestamp. Two operations denote the same edit iff they agree on
/// `(site_id, remote_time)`; `local_time` is site-local and never compared
/// across sites.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub site_id: SiteId,
    pub local_time: u64,
    pub remote_time: u64,
}

impl State {
    /// Create a new causal tag.
    pub fn new(site_id: SiteId, local_time: u64, remote_time: u64) -> State {
        return State { site_id, local_time, remote_time };
    }

    /// Check whether two tags identify the same authored operation.
    pub fn same_origin(&self, other: &State) -> bool {
        return self.site_id == other.site_id && self.remote_time == other.remote_time;
    }
}

/// Insert `value` just before the character at `position`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertOp {
    pub position: u64,
    pub value: String,
    /// `None` until the owning engine stamps the operation.
    pub state: Option<State>,
}

impl InsertOp {
    /// Create an unstamped insert.
    pub fn new(position: u64, value: impl Into<String>) -> InsertOp {
        return InsertOp {
            position,
            value: value.into(),
            state: None,
        };
    }

    /// Create an insert carrying a causal tag.
    pub fn with_state(position: u64, value: impl Into<String>, state: State) -> InsertOp {
        return InsertOp {
            position,
            value: value.into(),
            state: Some(state),
        };
    }

    /// The number of characters this insert adds.
    pub fn len(&self) -> u64 {
        return self.value.chars().count() as u64;
    }
}

/// Delete `length` characters starting at `position`.
///
/// Zero-length deletes are legal: the transformation kernel produces them
/// when a delete is entirely swallowed by another, and they must survive all
/// the way through history so timestamps stay aligned across sites.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOp {
    pub position: u64,
    pub length: u64,
    /// `None` until the owning engine stamps the operation.
    pub state: Option<State>,
}

impl DeleteOp {
    /// Create an unstamped delete.
    pub fn new(position: u64, length: u64) -> DeleteOp {
        return DeleteOp {
            position,
            length,
            state: None,
        };
    }

    /// Create a delete carrying a causal tag.
    pub fn with_state(position: u64, length: u64, state: State) -> DeleteOp {
        return DeleteOp {
            position,
            length,
            state: Some(state),
        };
    }
}

/// The seam shared by both operation kinds.
///
/// The kernel walks sequences of either kind with the same running-total
/// scan, and the merge and timestamping routines are written once against
/// this trait.
pub trait Operation: Clone {
    /// The buffer position this operation takes effect at.
    fn position(&self) -> u64;

    /// Reposition the operation.
    fn set_position(&mut self, position: u64);

    /// The signed shift this operation applies to later positions.
    fn increment(&self) -> i64;

    /// The causal tag, if stamped.
    fn state(&self) -> Option<&State>;

    /// Mutable access to the causal tag, if stamped.
    fn state_mut(&mut self) -> Option<&mut State>;

    /// Attach or replace the causal tag.
    fn set_state(&mut self, state: State);

    /// The authoring site, if stamped.
    fn site_id(&self) -> Option<SiteId> {
        return self.state().map(|state| state.site_id);
    }
}

impl Operation for InsertOp {
    fn position(&self) -> u64 {
        return self.position;
    }

    fn set_position(&mut self, position: u64) {
        self.position = position;
    }

    fn increment(&self) -> i64 {
        return self.len() as i64;
    }

    fn state(&self) -> Option<&State> {
        return self.state.as_ref();
    }

    fn state_mut(&mut self) -> Option<&mut State> {
        return self.state.as_mut();
    }

    fn set_state(&mut self, state: State) {
        self.state = Some(state);
    }
}

impl Operation for DeleteOp {
    fn position(&self) -> u64 {
        return self.position;
    }

    fn set_position(&mut self, position: u64) {
        self.position = position;
    }

    fn increment(&self) -> i64 {
        return -(self.length as i64);
    }

    fn state(&self) -> Option<&State> {
        return self.state.as_ref();
    }

    fn state_mut(&mut self) -> Option<&mut State> {
        return self.state.as_mut();
    }

    fn set_state(&mut self, state: State) {
        self.state = Some(state);
    }
}

/// An ordered run of operations. Transactions usually carry a handful, so
/// short runs stay inline.
pub type Sequence<T> = SmallVec<[T; 2]>;

/// A run of inserts in effect order.
pub type InsertSequence = Sequence<InsertOp>;

/// A run of deletes in effect order.
pub type DeleteSequence = Sequence<DeleteOp>;

/// The unit of exchange between sites, and the sole wire format.
///
/// `starting_state` names the latest operation the author had observed when
/// the transaction was created (`None` for a transaction that depends on no
/// prior history). `inserts` and `deletes` are each in effect order, and the
/// inserts are understood to apply before the deletes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub starting_state: Option<State>,
    pub inserts: InsertSequence,
    pub deletes: DeleteSequence,
}

impl Transaction {
    /// Assemble a transaction from operation runs.
    pub fn new(
        starting_state: Option<State>,
        inserts: impl IntoIterator<Item = InsertOp>,
        deletes: impl IntoIterator<Item = DeleteOp>,
    ) -> Transaction {
        return Transaction {
            starting_state,
            inserts: inserts.into_iter().collect(),
            deletes: deletes.into_iter().collect(),
        };
    }

    /// True when the transaction carries no operations at all.
    pub fn is_empty(&self) -> bool {
        return self.inserts.is_empty() && self.deletes.is_empty();
    }
}
