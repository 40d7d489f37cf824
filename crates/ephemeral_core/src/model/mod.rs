//! Note domain model.
//!
//! # Responsibility
//! - Define the note record, its identifier and its expiration policy.
//! - Own the expiration predicate shared by the store and the engine.
//!
//! # Invariants
//! - A note carries a view limit, a time limit, or neither; never both.
//! - Deletion is a hard delete; the model has no tombstone state.

pub mod note;
