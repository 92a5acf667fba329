//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the item store boundary used by the reconciler and services.
//! - Isolate SQLite query details from business orchestration.
//!
//! # Invariants
//! - Store writes enforce `Item::validate()` / `UserProfile::validate()`.
//! - Store APIs return semantic errors (`ItemNotFound`, `DuplicateId`) in
//!   addition to transport errors.

pub mod item_store;
pub mod session_guard;
pub mod user_repo;
