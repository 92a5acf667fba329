//! Bidirectional tool/material link reconciliation.
//!
//! # Responsibility
//! - Turn name-only link entries from add/edit forms into resolved ids.
//! - Create missing opposite-kind items and update back-references.
//! - Strip back-references before an item is deleted.
//!
//! # Invariants
//! - Duplicate-name and entry-count checks run before any store call.
//! - Update and delete act only on items owned by the calling owner; anything
//!   else is reported as `ParentNotFound` before the first write.
//! - Store calls are issued one at a time; each later step sees the effect of
//!   earlier ones through a locally evolving view of the opposite collection.
//! - An opposite item that already holds `MAX_LINKS` links is never extended;
//!   the entry is skipped and reported as a notice.
//! - A failed store call aborts the remaining steps. Earlier steps stay
//!   persisted; `SymmetrySweep` exists to repair what they leave behind.

use crate::model::item::{Item, ItemId, ItemKind, ItemValidationError, LinkEntry, MAX_LINKS};
use crate::repo::item_store::{ItemStore, RepoError};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Policy deciding whether an existing item's name matches a typed entry.
pub trait NameMatcher {
    fn is_match(&self, existing: &str, wanted: &str) -> bool;
}

/// Exact, case-sensitive string equality. No trimming or folding.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactNameMatcher;

impl NameMatcher for ExactNameMatcher {
    fn is_match(&self, existing: &str, wanted: &str) -> bool {
        existing == wanted
    }
}

/// Non-fatal condition reported while reconciling one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileNotice {
    /// The matched opposite item is full; the entry was dropped.
    LinkLimitReached {
        id: ItemId,
        kind: ItemKind,
        name: String,
    },
}

impl Display for ReconcileNotice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LinkLimitReached { kind, name, .. } => write!(
                f,
                "{kind} `{name}` already has {MAX_LINKS} {} linked",
                plural(kind.opposite())
            ),
        }
    }
}

/// Result of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Final link list for the parent, in entry order.
    pub link_ids: Vec<ItemId>,
    /// Opposite items created during this run.
    pub created: Vec<ItemId>,
    /// Existing opposite items that received the parent's id.
    pub updated: Vec<ItemId>,
    /// Opposite items whose back-reference to the parent was stripped.
    pub detached: Vec<ItemId>,
    pub notices: Vec<ReconcileNotice>,
}

#[derive(Debug)]
pub enum ReconcileError {
    /// Another item of the same kind already uses this name.
    DuplicateName {
        kind: ItemKind,
        name: String,
        existing: ItemId,
    },
    /// More non-blank link entries than `MAX_LINKS`.
    TooManyLinks { count: usize },
    InvalidParent(ItemValidationError),
    ParentNotFound(ItemId),
    /// A store call failed; remaining steps were abandoned.
    Store(RepoError),
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateName { kind, name, .. } => {
                write!(f, "a {kind} with the name `{name}` already exists")
            }
            Self::TooManyLinks { count } => write!(
                f,
                "{count} link entries given; at most {MAX_LINKS} are allowed"
            ),
            Self::InvalidParent(err) => write!(f, "{err}"),
            Self::ParentNotFound(id) => write!(f, "item not found: {id}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidParent(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ReconcileError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

impl From<ItemValidationError> for ReconcileError {
    fn from(value: ItemValidationError) -> Self {
        Self::InvalidParent(value)
    }
}

/// Keeps both sides of the tool/material relationship in step.
pub struct RelationshipReconciler<S: ItemStore> {
    store: S,
    matcher: Box<dyn NameMatcher>,
}

impl<S: ItemStore> RelationshipReconciler<S> {
    /// Creates a reconciler using exact name matching.
    pub fn new(store: S) -> Self {
        Self {
            store,
            matcher: Box::new(ExactNameMatcher),
        }
    }

    /// Replaces the name matching policy.
    pub fn with_matcher(mut self, matcher: impl NameMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolves link entries for a parent that is about to be created.
    ///
    /// The parent itself is not written; its create call should carry
    /// `outcome.link_ids`.
    ///
    /// # Errors
    /// - `DuplicateName` / `TooManyLinks` / `InvalidParent` before any store call.
    /// - `Store` when a call fails midway; earlier calls are not undone.
    pub fn reconcile_on_create(
        &self,
        owner: &str,
        parent: &Item,
        entries: &[LinkEntry],
        known_same_kind: &[Item],
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.precheck(parent, entries, known_same_kind)?;

        let started_at = Instant::now();
        info!(
            "event=reconcile_create module=reconciler status=start kind={} parent_id={} entries={}",
            parent.kind,
            parent.id,
            entries.len()
        );

        let result = self.link_on_create(owner, parent, entries);
        log_result("reconcile_create", parent, started_at, &result);
        result
    }

    /// Applies an edit session: removals, re-resolution, and the parent update.
    ///
    /// `parent` carries the new scalar fields; its `links` are ignored and
    /// replaced by the resolved list.
    pub fn reconcile_on_update(
        &self,
        owner: &str,
        parent: &Item,
        edited: &[LinkEntry],
        removed_ids: &[ItemId],
        known_same_kind: &[Item],
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.precheck(parent, edited, known_same_kind)?;

        let started_at = Instant::now();
        info!(
            "event=reconcile_update module=reconciler status=start kind={} parent_id={} entries={} removed={}",
            parent.kind,
            parent.id,
            edited.len(),
            removed_ids.len()
        );

        let result = self.link_on_update(owner, parent, edited, removed_ids);
        log_result("reconcile_update", parent, started_at, &result);
        result
    }

    /// Strips every back-reference to `target`, then deletes it.
    ///
    /// Returns the ids of the opposite items that were detached.
    pub fn reconcile_on_delete(
        &self,
        owner: &str,
        target: &Item,
    ) -> Result<Vec<ItemId>, ReconcileError> {
        let started_at = Instant::now();
        info!(
            "event=reconcile_delete module=reconciler status=start kind={} parent_id={}",
            target.kind, target.id
        );

        let result = self.unlink_and_delete(owner, target);
        match &result {
            Ok(detached) => info!(
                "event=reconcile_delete module=reconciler status=ok parent_id={} detached={} duration_ms={}",
                target.id,
                detached.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=reconcile_delete module=reconciler status=error parent_id={} duration_ms={} error={}",
                target.id,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn precheck(
        &self,
        parent: &Item,
        entries: &[LinkEntry],
        known_same_kind: &[Item],
    ) -> Result<(), ReconcileError> {
        if parent.name.trim().is_empty() {
            return Err(ReconcileError::InvalidParent(
                ItemValidationError::BlankName,
            ));
        }

        if let Some(existing) = known_same_kind.iter().find(|known| {
            known.kind == parent.kind
                && known.id != parent.id
                && self.matcher.is_match(&known.name, &parent.name)
        }) {
            warn!(
                "event=reconcile_precheck module=reconciler status=error error_code=duplicate_name kind={} parent_id={} existing_id={}",
                parent.kind, parent.id, existing.id
            );
            return Err(ReconcileError::DuplicateName {
                kind: parent.kind,
                name: parent.name.clone(),
                existing: existing.id.clone(),
            });
        }

        let count = entries.iter().filter(|entry| !entry.is_blank()).count();
        if count > MAX_LINKS {
            return Err(ReconcileError::TooManyLinks { count });
        }

        Ok(())
    }

    fn link_on_create(
        &self,
        owner: &str,
        parent: &Item,
        entries: &[LinkEntry],
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let mut view = self
            .store
            .list_items_for_user(owner, parent.kind.opposite())?;
        let mut outcome = ReconcileOutcome::default();
        self.resolve_entries(owner, parent, entries, &mut view, &mut outcome)?;
        Ok(outcome)
    }

    fn link_on_update(
        &self,
        owner: &str,
        parent: &Item,
        edited: &[LinkEntry],
        removed_ids: &[ItemId],
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let persisted = match self.store.get_item(&parent.id)? {
            Some(item) if item.kind == parent.kind => item,
            _ => return Err(ReconcileError::ParentNotFound(parent.id.clone())),
        };
        self.ensure_owned(owner, &parent.id)?;

        let mut outcome = ReconcileOutcome::default();
        for removed in removed_ids {
            if self.detach_by_id(&parent.id, removed)? {
                outcome.detached.push(removed.clone());
            }
        }

        // Re-read: the removals above changed the opposite collection.
        let mut view = self
            .store
            .list_items_for_user(owner, parent.kind.opposite())?;
        self.resolve_entries(owner, parent, edited, &mut view, &mut outcome)?;

        // Links dropped without an explicit removal, e.g. an entry renamed to
        // another target, still need their back-reference stripped.
        for stale in &persisted.links {
            if outcome.link_ids.contains(stale) || removed_ids.contains(stale) {
                continue;
            }
            let detached = match view.iter_mut().find(|item| &item.id == stale) {
                Some(other) => {
                    if other.remove_link(&parent.id) {
                        self.store.update_item(other)?;
                        true
                    } else {
                        false
                    }
                }
                None => self.detach_by_id(&parent.id, stale)?,
            };
            if detached {
                outcome.detached.push(stale.clone());
            }
        }

        let mut next = parent.clone();
        next.links = outcome.link_ids.clone();
        next.validate()?;
        self.store.update_item(&next)?;

        Ok(outcome)
    }

    fn unlink_and_delete(&self, owner: &str, target: &Item) -> Result<Vec<ItemId>, ReconcileError> {
        self.ensure_owned(owner, &target.id)?;
        let view = self
            .store
            .list_items_for_user(owner, target.kind.opposite())?;

        let mut detached = Vec::new();
        for mut other in view {
            if other.remove_link(&target.id) {
                self.store.update_item(&other)?;
                detached.push(other.id);
            }
        }

        self.store.unlink_from_user(owner, &target.id)?;
        self.store.delete_item(&target.id)?;
        Ok(detached)
    }

    fn resolve_entries(
        &self,
        owner: &str,
        parent: &Item,
        entries: &[LinkEntry],
        view: &mut Vec<Item>,
        outcome: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError> {
        for entry in entries.iter().filter(|entry| !entry.is_blank()) {
            let matched = view
                .iter()
                .position(|candidate| self.matcher.is_match(&candidate.name, &entry.name));

            let Some(index) = matched else {
                let mut created = Item::draft(
                    parent.kind.opposite(),
                    entry.name.clone(),
                    entry.description.clone(),
                );
                created.links.push(parent.id.clone());
                self.store.create_item(owner, &created)?;
                info!(
                    "event=reconcile_link module=reconciler status=created parent_id={} linked_id={}",
                    parent.id, created.id
                );
                outcome.link_ids.push(created.id.clone());
                outcome.created.push(created.id.clone());
                view.push(created);
                continue;
            };

            let existing = &mut view[index];
            if outcome.link_ids.contains(&existing.id) {
                continue;
            }
            if existing.is_linked_to(&parent.id) {
                outcome.link_ids.push(existing.id.clone());
                continue;
            }
            if !existing.has_link_capacity() {
                warn!(
                    "event=reconcile_link module=reconciler status=skipped error_code=link_limit_reached parent_id={} linked_id={}",
                    parent.id, existing.id
                );
                outcome.notices.push(ReconcileNotice::LinkLimitReached {
                    id: existing.id.clone(),
                    kind: existing.kind,
                    name: existing.name.clone(),
                });
                continue;
            }

            let mut next = existing.clone();
            next.add_link(&parent.id);
            self.store.update_item(&next)?;
            info!(
                "event=reconcile_link module=reconciler status=updated parent_id={} linked_id={}",
                parent.id, next.id
            );
            outcome.link_ids.push(next.id.clone());
            outcome.updated.push(next.id.clone());
            *existing = next;
        }

        Ok(())
    }

    fn ensure_owned(&self, owner: &str, id: &ItemId) -> Result<(), ReconcileError> {
        if self.store.is_owned_by(owner, id)? {
            return Ok(());
        }
        warn!(
            "event=reconcile_owner_check module=reconciler status=error error_code=not_owned parent_id={id}"
        );
        Err(ReconcileError::ParentNotFound(id.clone()))
    }

    /// Fetches `other_id` and strips `parent_id` from it.
    ///
    /// Returns whether an update was issued. A missing item is skipped.
    fn detach_by_id(&self, parent_id: &ItemId, other_id: &ItemId) -> Result<bool, ReconcileError> {
        let Some(mut other) = self.store.get_item(other_id)? else {
            warn!(
                "event=reconcile_detach module=reconciler status=skipped error_code=linked_item_missing parent_id={parent_id} linked_id={other_id}"
            );
            return Ok(false);
        };
        if !other.remove_link(parent_id) {
            return Ok(false);
        }
        self.store.update_item(&other)?;
        Ok(true)
    }
}

fn log_result(
    event: &str,
    parent: &Item,
    started_at: Instant,
    result: &Result<ReconcileOutcome, ReconcileError>,
) {
    match result {
        Ok(outcome) => info!(
            "event={event} module=reconciler status=ok parent_id={} links={} created={} updated={} detached={} notices={} duration_ms={}",
            parent.id,
            outcome.link_ids.len(),
            outcome.created.len(),
            outcome.updated.len(),
            outcome.detached.len(),
            outcome.notices.len(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event={event} module=reconciler status=error parent_id={} duration_ms={} error={}",
            parent.id,
            started_at.elapsed().as_millis(),
            err
        ),
    }
}

fn plural(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Tool => "tools",
        ItemKind::Material => "materials",
    }
}
