//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the note store contract used by the expiration engine.
//! - Isolate SQLite query details from expiration decisions.
//!
//! # Invariants
//! - Write paths validate drafts before persistence.
//! - "Not found" is a value (`Ok(None)`), never an error.

pub mod note_repo;
