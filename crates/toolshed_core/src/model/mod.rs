//! Domain model for the tool/material inventory.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep one item shape for both sides of the tool/material relationship.
//!
//! # Invariants
//! - Every item is identified by a stable, client-generated `ItemId`.
//! - Every item is owned by exactly one user (keyed by email).

pub mod item;
pub mod user;
