//! Inventory use-case service.
//!
//! # Responsibility
//! - Provide add/edit/delete/list entry points for tool and material screens.
//! - Compose link reconciliation with the parent item's own writes.
//!
//! # Invariants
//! - `add_item` writes the parent only after every link entry is resolved.
//! - Service APIs never bypass store validation.

use crate::model::item::{Item, ItemId, ItemKind, LinkEntry};
use crate::repo::item_store::{ItemStore, RepoResult};
use crate::service::reconciler::{ReconcileError, ReconcileOutcome, RelationshipReconciler};
use crate::service::symmetry::{Asymmetry, SymmetrySweep};

/// Result of a create or edit: the stored parent plus reconciliation details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub item: Item,
    pub reconcile: ReconcileOutcome,
}

/// Use-case facade over a store and its reconciler.
pub struct InventoryService<S: ItemStore> {
    reconciler: RelationshipReconciler<S>,
}

impl<S: ItemStore> InventoryService<S> {
    pub fn new(store: S) -> Self {
        Self::with_reconciler(RelationshipReconciler::new(store))
    }

    /// Uses a pre-configured reconciler, e.g. one with a custom name matcher.
    pub fn with_reconciler(reconciler: RelationshipReconciler<S>) -> Self {
        Self { reconciler }
    }

    pub fn store(&self) -> &S {
        self.reconciler.store()
    }

    /// Lists the owner's items of one kind in creation order.
    pub fn list_items(&self, owner: &str, kind: ItemKind) -> RepoResult<Vec<Item>> {
        self.store().list_items_for_user(owner, kind)
    }

    pub fn get_item(&self, id: &ItemId) -> RepoResult<Option<Item>> {
        self.store().get_item(id)
    }

    /// Looks up the owner's item of `kind` by exact name.
    pub fn find_by_name(&self, owner: &str, kind: ItemKind, name: &str) -> RepoResult<Option<Item>> {
        match self.store().resolve_by_name(owner, kind, name)? {
            Some(id) => self.store().get_item(&id),
            None => Ok(None),
        }
    }

    /// Resolves an item's links to records, skipping ids that no longer exist.
    pub fn linked_items(&self, item: &Item) -> RepoResult<Vec<Item>> {
        let mut linked = Vec::with_capacity(item.links.len());
        for id in &item.links {
            if let Some(other) = self.store().get_item(id)? {
                linked.push(other);
            }
        }
        Ok(linked)
    }

    /// Creates `draft` together with its link entries.
    ///
    /// `known_same_kind` is the caller's current list of the owner's items of
    /// the draft's kind; it drives the duplicate-name check.
    pub fn add_item(
        &self,
        owner: &str,
        draft: &Item,
        entries: &[LinkEntry],
        known_same_kind: &[Item],
    ) -> Result<SaveOutcome, ReconcileError> {
        let reconcile =
            self.reconciler
                .reconcile_on_create(owner, draft, entries, known_same_kind)?;

        let mut item = draft.clone();
        item.links = reconcile.link_ids.clone();
        item.validate()?;
        self.store().create_item(owner, &item)?;

        Ok(SaveOutcome { item, reconcile })
    }

    /// Saves an edit session and returns the stored parent.
    pub fn edit_item(
        &self,
        owner: &str,
        parent: &Item,
        edited: &[LinkEntry],
        removed_ids: &[ItemId],
        known_same_kind: &[Item],
    ) -> Result<SaveOutcome, ReconcileError> {
        let reconcile = self.reconciler.reconcile_on_update(
            owner,
            parent,
            edited,
            removed_ids,
            known_same_kind,
        )?;
        let item = self
            .store()
            .get_item(&parent.id)?
            .ok_or_else(|| ReconcileError::ParentNotFound(parent.id.clone()))?;

        Ok(SaveOutcome { item, reconcile })
    }

    /// Deletes an item after detaching it from every linked item.
    pub fn delete_item(&self, owner: &str, id: &ItemId) -> Result<Vec<ItemId>, ReconcileError> {
        let target = self
            .store()
            .get_item(id)?
            .ok_or_else(|| ReconcileError::ParentNotFound(id.clone()))?;
        self.reconciler.reconcile_on_delete(owner, &target)
    }

    pub fn audit_links(&self, owner: &str) -> RepoResult<Vec<Asymmetry>> {
        SymmetrySweep::new(self.store()).scan(owner)
    }

    pub fn repair_links(&self, owner: &str) -> RepoResult<usize> {
        SymmetrySweep::new(self.store()).repair(owner)
    }
}

/// Case-insensitive substring filter used by list screens.
///
/// An empty or whitespace-only filter keeps every item.
pub fn filter_items_by_name(items: &[Item], filter: &str) -> Vec<Item> {
    let needle = filter.trim().to_lowercase();
    items
        .iter()
        .filter(|item| needle.is_empty() || item.name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}
