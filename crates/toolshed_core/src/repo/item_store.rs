//! Item store contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the store boundary the reconciler talks to.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call `Item::validate()` before SQL mutations.
//! - The store never enforces link symmetry; each item's list is stored as given.
//! - Client-generated ids are re-checked: creating an existing id fails.
//! - Ownership lives in `user_items`, separate from the global item records.
//! - Owner emails are normalized with `normalize_email` before every bind, so
//!   any casing accepted at registration addresses the same collection.

use crate::db::{ensure_schema_ready, DbError};
use crate::model::item::{Item, ItemId, ItemKind, ItemValidationError};
use crate::model::user::{normalize_email, ProfileValidationError};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const ITEM_SELECT_SQL: &str = "SELECT
    items.id,
    items.kind,
    items.name,
    items.description
FROM items";

pub type RepoResult<T> = Result<T, RepoError>;

/// Store error shared by item and user persistence.
///
/// `Unauthorized` and `Unavailable` are produced by remote-backed stores; the
/// SQLite store never returns them.
#[derive(Debug)]
pub enum RepoError {
    InvalidItem(ItemValidationError),
    InvalidProfile(ProfileValidationError),
    Db(DbError),
    ItemNotFound(ItemId),
    UserNotFound(String),
    DuplicateId(ItemId),
    DuplicateUser(String),
    InvalidData(String),
    Unauthorized(String),
    Unavailable(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidItem(err) => write!(f, "{err}"),
            Self::InvalidProfile(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::ItemNotFound(id) => write!(f, "item not found: {id}"),
            Self::UserNotFound(email) => write!(f, "user not found: {email}"),
            Self::DuplicateId(id) => write!(f, "item id already exists: {id}"),
            Self::DuplicateUser(email) => write!(f, "user already registered: {email}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Unauthorized(message) => write!(f, "store rejected credentials: {message}"),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidItem(err) => Some(err),
            Self::InvalidProfile(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ItemValidationError> for RepoError {
    fn from(value: ItemValidationError) -> Self {
        Self::InvalidItem(value)
    }
}

impl From<ProfileValidationError> for RepoError {
    fn from(value: ProfileValidationError) -> Self {
        Self::InvalidProfile(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Store boundary for tool and material records.
///
/// Every method is one logical round trip; the reconciler counts on that when
/// it sequences calls.
pub trait ItemStore {
    /// Lists every item of `kind`, regardless of owner.
    fn list_items(&self, kind: ItemKind) -> RepoResult<Vec<Item>>;
    /// Lists items of `kind` owned by `owner`, in creation order.
    fn list_items_for_user(&self, owner: &str, kind: ItemKind) -> RepoResult<Vec<Item>>;
    fn get_item(&self, id: &ItemId) -> RepoResult<Option<Item>>;
    /// Creates the record and registers `owner` as its owner.
    fn create_item(&self, owner: &str, item: &Item) -> RepoResult<ItemId>;
    /// Replaces scalar fields and the link list of an existing item.
    fn update_item(&self, item: &Item) -> RepoResult<()>;
    /// Deletes the global record. Ownership links are removed separately.
    fn delete_item(&self, id: &ItemId) -> RepoResult<()>;
    fn link_to_user(&self, owner: &str, id: &ItemId) -> RepoResult<()>;
    fn unlink_from_user(&self, owner: &str, id: &ItemId) -> RepoResult<()>;
    /// Reports whether `owner` has an ownership link to `id`.
    fn is_owned_by(&self, owner: &str, id: &ItemId) -> RepoResult<bool>;
    /// Finds the owner's item of `kind` whose name equals `name` exactly.
    fn resolve_by_name(&self, owner: &str, kind: ItemKind, name: &str)
        -> RepoResult<Option<ItemId>>;
}

/// SQLite-backed item store.
pub struct SqliteItemStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteItemStore<'conn> {
    /// Constructs a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }

    fn item_exists(&self, id: &ItemId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM items WHERE id = ?1);",
            [id.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    /// Expects an already normalized owner key.
    fn ensure_user_exists(&self, owner: &str) -> RepoResult<()> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1);",
            [owner],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(RepoError::UserNotFound(owner.to_string()));
        }
        Ok(())
    }

    fn query_items(&self, sql: &str, bind: &[&dyn rusqlite::ToSql]) -> RepoResult<Vec<Item>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(bind)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        for item in &mut items {
            item.links = load_links(self.conn, &item.id)?;
        }
        Ok(items)
    }
}

impl ItemStore for SqliteItemStore<'_> {
    fn list_items(&self, kind: ItemKind) -> RepoResult<Vec<Item>> {
        self.query_items(
            &format!("{ITEM_SELECT_SQL} WHERE items.kind = ?1 ORDER BY items.rowid ASC;"),
            &[&kind.as_str()],
        )
    }

    fn list_items_for_user(&self, owner: &str, kind: ItemKind) -> RepoResult<Vec<Item>> {
        let owner = normalize_email(owner);
        self.query_items(
            &format!(
                "{ITEM_SELECT_SQL}
                 INNER JOIN user_items ui ON ui.item_id = items.id
                 WHERE ui.owner_email = ?1
                   AND items.kind = ?2
                 ORDER BY items.rowid ASC;"
            ),
            &[&owner, &kind.as_str()],
        )
    }

    fn get_item(&self, id: &ItemId) -> RepoResult<Option<Item>> {
        let item = self
            .conn
            .query_row(
                &format!("{ITEM_SELECT_SQL} WHERE items.id = ?1;"),
                [id.as_str()],
                |row| Ok(parse_item_row(row)),
            )
            .optional()?
            .transpose()?;

        match item {
            Some(mut item) => {
                item.links = load_links(self.conn, &item.id)?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    fn create_item(&self, owner: &str, item: &Item) -> RepoResult<ItemId> {
        item.validate()?;
        let owner = normalize_email(owner);
        self.ensure_user_exists(&owner)?;
        if self.item_exists(&item.id)? {
            return Err(RepoError::DuplicateId(item.id.clone()));
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO items (id, kind, name, description) VALUES (?1, ?2, ?3, ?4);",
            params![
                item.id.as_str(),
                item.kind.as_str(),
                item.name.as_str(),
                item.description.as_str(),
            ],
        )?;
        write_links(&tx, item)?;
        tx.execute(
            "INSERT INTO user_items (owner_email, item_id) VALUES (?1, ?2);",
            params![owner.as_str(), item.id.as_str()],
        )?;
        tx.commit()?;

        Ok(item.id.clone())
    }

    fn update_item(&self, item: &Item) -> RepoResult<()> {
        item.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE items
             SET
                name = ?1,
                description = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?3
               AND kind = ?4;",
            params![
                item.name.as_str(),
                item.description.as_str(),
                item.id.as_str(),
                item.kind.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::ItemNotFound(item.id.clone()));
        }
        write_links(&tx, item)?;
        tx.commit()?;

        Ok(())
    }

    fn delete_item(&self, id: &ItemId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM items WHERE id = ?1;", [id.as_str()])?;
        if changed == 0 {
            return Err(RepoError::ItemNotFound(id.clone()));
        }
        Ok(())
    }

    fn link_to_user(&self, owner: &str, id: &ItemId) -> RepoResult<()> {
        let owner = normalize_email(owner);
        self.ensure_user_exists(&owner)?;
        if !self.item_exists(id)? {
            return Err(RepoError::ItemNotFound(id.clone()));
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO user_items (owner_email, item_id) VALUES (?1, ?2);",
            params![owner.as_str(), id.as_str()],
        )?;
        Ok(())
    }

    fn unlink_from_user(&self, owner: &str, id: &ItemId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM user_items WHERE owner_email = ?1 AND item_id = ?2;",
            params![normalize_email(owner), id.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::ItemNotFound(id.clone()));
        }
        Ok(())
    }

    fn is_owned_by(&self, owner: &str, id: &ItemId) -> RepoResult<bool> {
        let owned: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM user_items WHERE owner_email = ?1 AND item_id = ?2
            );",
            params![normalize_email(owner), id.as_str()],
            |row| row.get(0),
        )?;
        Ok(owned == 1)
    }

    fn resolve_by_name(
        &self,
        owner: &str,
        kind: ItemKind,
        name: &str,
    ) -> RepoResult<Option<ItemId>> {
        let id_text = self
            .conn
            .query_row(
                "SELECT items.id
                 FROM items
                 INNER JOIN user_items ui ON ui.item_id = items.id
                 WHERE ui.owner_email = ?1
                   AND items.kind = ?2
                   AND items.name = ?3
                 ORDER BY items.rowid ASC
                 LIMIT 1;",
                params![normalize_email(owner), kind.as_str(), name],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        id_text.map(|value| parse_item_id(&value, "items.id")).transpose()
    }
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<Item> {
    let id_text: String = row.get(0)?;
    let id = parse_item_id(&id_text, "items.id")?;

    let kind_text: String = row.get(1)?;
    let kind = ItemKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid item kind `{kind_text}` in items.kind"))
    })?;

    Ok(Item {
        id,
        kind,
        name: row.get(2)?,
        description: row.get(3)?,
        links: Vec::new(),
    })
}

fn parse_item_id(value: &str, column: &str) -> RepoResult<ItemId> {
    ItemId::parse(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid item id `{value}` in {column}")))
}

fn load_links(conn: &Connection, id: &ItemId) -> RepoResult<Vec<ItemId>> {
    let mut stmt = conn.prepare(
        "SELECT linked_id
         FROM item_links
         WHERE item_id = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([id.as_str()])?;
    let mut links = Vec::new();
    while let Some(row) = rows.next()? {
        let linked_text: String = row.get(0)?;
        links.push(parse_item_id(&linked_text, "item_links.linked_id")?);
    }
    Ok(links)
}

fn write_links(conn: &Connection, item: &Item) -> RepoResult<()> {
    conn.execute(
        "DELETE FROM item_links WHERE item_id = ?1;",
        [item.id.as_str()],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO item_links (item_id, position, linked_id) VALUES (?1, ?2, ?3);",
    )?;
    for (position, linked) in item.links.iter().enumerate() {
        stmt.execute(params![item.id.as_str(), position as i64, linked.as_str()])?;
    }
    Ok(())
}
