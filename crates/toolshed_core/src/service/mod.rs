//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into use-case level APIs.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod inventory_service;
pub mod reconciler;
pub mod symmetry;
