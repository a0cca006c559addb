//! Test-only adapters that live inside the domain crate for convenience.
//!
//! These are intended for unit testing, local demos and the `memory` storage
//! provider. Real adapters (Firestore, SQLite) live in separate crates.

pub mod memory_repo;
