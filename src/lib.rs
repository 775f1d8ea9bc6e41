//! Tandem - A collaborative text editing engine using operational
//! transformation.
//!
//! Each peer of an editing session runs one [`engine::Engine`] over a shared
//! text buffer. Locally authored edits go through
//! [`engine::Engine::process_transaction`] before broadcast; transactions
//! from other peers go through [`engine::Engine::integrate_remote`], which
//! returns the operations to apply to the local buffer. Peers that have seen
//! the same transactions, in any order, end up with the same buffer.
//!
//! # Quick Start
//!
//! ```
//! use tandem::engine::Engine;
//! use tandem::op::InsertOp;
//! use tandem::op::SiteId;
//! use tandem::op::Transaction;
//!
//! let mut alice = Engine::new(SiteId(1));
//! let mut bob = Engine::new(SiteId(2));
//!
//! // Alice types "Hello" and broadcasts the processed transaction.
//! let edit = Transaction::new(None, vec![InsertOp::new(0, "Hello")], vec![]);
//! let outgoing = alice.process_transaction(edit).unwrap();
//!
//! // Bob integrates it and learns where the text lands in his buffer.
//! let applied = bob.integrate_remote(&outgoing).unwrap();
//! assert_eq!(applied.inserts[0].value, "Hello");
//! assert_eq!(applied.inserts[0].position, 0);
//! ```

pub mod engine;
pub mod history;
pub mod merge;
pub mod op;
pub mod transform;
