#![allow(dead_code)]

use rusqlite::Connection;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use toolshed_core::db::open_db_in_memory;
use toolshed_core::{
    Item, ItemId, ItemKind, ItemStore, RepoError, RepoResult, SqliteUserRepository, UserProfile,
    UserRepository,
};

pub const OWNER: &str = "ada@example.com";
pub const OTHER_OWNER: &str = "grace@example.com";

/// Opens a migrated in-memory database with both test owners registered.
pub fn setup() -> Connection {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    users
        .register_user(&UserProfile::new(OWNER, "Ada"))
        .unwrap();
    users
        .register_user(&UserProfile::new(OTHER_OWNER, "Grace"))
        .unwrap();
    conn
}

/// Store wrapper that records every call and can fail the n-th one.
pub struct CountingStore<S> {
    inner: S,
    calls: RefCell<Vec<&'static str>>,
    fail_at: Cell<Option<usize>>,
}

impl<S: ItemStore> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: RefCell::new(Vec::new()),
            fail_at: Cell::new(None),
        }
    }

    /// Makes the `n`-th call from now (1-based) fail with `Unavailable`.
    pub fn fail_call(&self, n: usize) {
        self.fail_at.set(Some(self.calls.borrow().len() + n));
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn reset(&self) {
        self.calls.borrow_mut().clear();
        self.fail_at.set(None);
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn record(&self, operation: &'static str) -> RepoResult<()> {
        self.calls.borrow_mut().push(operation);
        let count = self.calls.borrow().len();
        if self.fail_at.get() == Some(count) {
            return Err(RepoError::Unavailable(format!(
                "injected failure on {operation}"
            )));
        }
        Ok(())
    }
}

impl<S: ItemStore> ItemStore for CountingStore<S> {
    fn list_items(&self, kind: ItemKind) -> RepoResult<Vec<Item>> {
        self.record("list_items")?;
        self.inner.list_items(kind)
    }

    fn list_items_for_user(&self, owner: &str, kind: ItemKind) -> RepoResult<Vec<Item>> {
        self.record("list_items_for_user")?;
        self.inner.list_items_for_user(owner, kind)
    }

    fn get_item(&self, id: &ItemId) -> RepoResult<Option<Item>> {
        self.record("get_item")?;
        self.inner.get_item(id)
    }

    fn create_item(&self, owner: &str, item: &Item) -> RepoResult<ItemId> {
        self.record("create_item")?;
        self.inner.create_item(owner, item)
    }

    fn update_item(&self, item: &Item) -> RepoResult<()> {
        self.record("update_item")?;
        self.inner.update_item(item)
    }

    fn delete_item(&self, id: &ItemId) -> RepoResult<()> {
        self.record("delete_item")?;
        self.inner.delete_item(id)
    }

    fn link_to_user(&self, owner: &str, id: &ItemId) -> RepoResult<()> {
        self.record("link_to_user")?;
        self.inner.link_to_user(owner, id)
    }

    fn unlink_from_user(&self, owner: &str, id: &ItemId) -> RepoResult<()> {
        self.record("unlink_from_user")?;
        self.inner.unlink_from_user(owner, id)
    }

    fn is_owned_by(&self, owner: &str, id: &ItemId) -> RepoResult<bool> {
        self.record("is_owned_by")?;
        self.inner.is_owned_by(owner, id)
    }

    fn resolve_by_name(
        &self,
        owner: &str,
        kind: ItemKind,
        name: &str,
    ) -> RepoResult<Option<ItemId>> {
        self.record("resolve_by_name")?;
        self.inner.resolve_by_name(owner, kind, name)
    }
}

/// Finds the owner's item of `kind` named `name`, panicking when absent.
pub fn named(store: &impl ItemStore, kind: ItemKind, name: &str) -> Item {
    store
        .list_items_for_user(OWNER, kind)
        .unwrap()
        .into_iter()
        .find(|item| item.name == name)
        .unwrap_or_else(|| panic!("{kind} `{name}` not found"))
}

/// Asserts every link among the owner's items is mirrored on the other side.
pub fn assert_symmetric(store: &impl ItemStore, owner: &str) {
    let mut all = HashMap::new();
    for kind in [ItemKind::Tool, ItemKind::Material] {
        for item in store.list_items_for_user(owner, kind).unwrap() {
            all.insert(item.id.clone(), item);
        }
    }
    for item in all.values() {
        assert!(item.links.len() <= toolshed_core::MAX_LINKS);
        for link in &item.links {
            let other = all
                .get(link)
                .unwrap_or_else(|| panic!("{} links to missing {link}", item.id));
            assert_ne!(other.kind, item.kind);
            assert!(
                other.is_linked_to(&item.id),
                "{} -> {link} has no back-reference",
                item.id
            );
        }
    }
}
