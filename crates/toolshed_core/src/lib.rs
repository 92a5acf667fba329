//! Core domain logic for the Toolshed inventory app.
//! This crate is the single source of truth for tool/material link invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::CoreConfig;
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::item::{Item, ItemId, ItemKind, ItemValidationError, LinkEntry, MAX_LINKS};
pub use model::user::{ProfileUpdate, ProfileValidationError, UserProfile};
pub use repo::item_store::{ItemStore, RepoError, RepoResult, SqliteItemStore};
pub use repo::session_guard::SessionGuardedStore;
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use service::inventory_service::{filter_items_by_name, InventoryService, SaveOutcome};
pub use service::reconciler::{
    ExactNameMatcher, NameMatcher, ReconcileError, ReconcileNotice, ReconcileOutcome,
    RelationshipReconciler,
};
pub use service::symmetry::{Asymmetry, SymmetrySweep};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
