//! Store decorator that reports rejected credentials to an injected handler.
//!
//! # Responsibility
//! - Forward every call to the wrapped store unchanged.
//! - Invoke the handler passed at construction when a call fails with
//!   `RepoError::Unauthorized`, so the presentation layer can route to login.
//!
//! # Invariants
//! - The handler is owned by this value; there is no process-global hook.
//! - Errors are returned to the caller after the handler runs.

use crate::model::item::{Item, ItemId, ItemKind};
use crate::repo::item_store::{ItemStore, RepoError, RepoResult};
use log::warn;

/// Callback fired on every `Unauthorized` store failure.
pub type UnauthorizedHandler = Box<dyn Fn(&RepoError)>;

pub struct SessionGuardedStore<S: ItemStore> {
    inner: S,
    on_unauthorized: UnauthorizedHandler,
}

impl<S: ItemStore> SessionGuardedStore<S> {
    pub fn new(inner: S, on_unauthorized: impl Fn(&RepoError) + 'static) -> Self {
        Self {
            inner,
            on_unauthorized: Box::new(on_unauthorized),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn guard<T>(&self, operation: &'static str, result: RepoResult<T>) -> RepoResult<T> {
        if let Err(err @ RepoError::Unauthorized(_)) = &result {
            warn!("event=store_unauthorized module=repo status=error operation={operation}");
            (self.on_unauthorized)(err);
        }
        result
    }
}

impl<S: ItemStore> ItemStore for SessionGuardedStore<S> {
    fn list_items(&self, kind: ItemKind) -> RepoResult<Vec<Item>> {
        self.guard("list_items", self.inner.list_items(kind))
    }

    fn list_items_for_user(&self, owner: &str, kind: ItemKind) -> RepoResult<Vec<Item>> {
        self.guard(
            "list_items_for_user",
            self.inner.list_items_for_user(owner, kind),
        )
    }

    fn get_item(&self, id: &ItemId) -> RepoResult<Option<Item>> {
        self.guard("get_item", self.inner.get_item(id))
    }

    fn create_item(&self, owner: &str, item: &Item) -> RepoResult<ItemId> {
        self.guard("create_item", self.inner.create_item(owner, item))
    }

    fn update_item(&self, item: &Item) -> RepoResult<()> {
        self.guard("update_item", self.inner.update_item(item))
    }

    fn delete_item(&self, id: &ItemId) -> RepoResult<()> {
        self.guard("delete_item", self.inner.delete_item(id))
    }

    fn link_to_user(&self, owner: &str, id: &ItemId) -> RepoResult<()> {
        self.guard("link_to_user", self.inner.link_to_user(owner, id))
    }

    fn unlink_from_user(&self, owner: &str, id: &ItemId) -> RepoResult<()> {
        self.guard("unlink_from_user", self.inner.unlink_from_user(owner, id))
    }

    fn is_owned_by(&self, owner: &str, id: &ItemId) -> RepoResult<bool> {
        self.guard("is_owned_by", self.inner.is_owned_by(owner, id))
    }

    fn resolve_by_name(
        &self,
        owner: &str,
        kind: ItemKind,
        name: &str,
    ) -> RepoResult<Option<ItemId>> {
        self.guard(
            "resolve_by_name",
            self.inner.resolve_by_name(owner, kind, name),
        )
    }
}
