//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into the create/consume use-cases.
//! - Keep presentation callers decoupled from storage details.

pub mod expiration_engine;
pub mod share;
