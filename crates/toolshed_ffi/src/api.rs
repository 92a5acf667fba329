//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level functions to Dart via FRB.
//! - Translate between string-typed Dart payloads and core domain types.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Every DB-backed call returns an envelope with `ok` and `message`.
//! - Each call opens its own connection; no connection is cached.

use log::warn;
use std::sync::OnceLock;
use toolshed_core::db::open_db;
use toolshed_core::{
    core_version as core_version_inner, filter_items_by_name, init_logging as init_logging_inner,
    ping as ping_inner, Asymmetry, CoreConfig, InventoryService, Item, ItemId, ItemKind,
    LinkEntry, ProfileUpdate, SqliteItemStore, SqliteUserRepository, UserProfile,
    UserRepository,
};

static CONFIG: OnceLock<CoreConfig> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts with different level or directory return error.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Tool or material as shown to Dart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemView {
    pub id: String,
    /// `tool|material`.
    pub kind: String,
    pub name: String,
    pub description: String,
    /// Linked ids of the opposite kind, in stored order.
    pub link_ids: Vec<String>,
}

/// One cross-reference row from an add/edit form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkEntryInput {
    /// Set when the row was prefilled from an existing link.
    pub id: Option<String>,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserView {
    pub email: String,
    pub name: String,
    pub about_me: String,
    pub bio: String,
    pub profile_pic: Option<String>,
}

/// Envelope for calls returning one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResponse {
    pub ok: bool,
    pub item: Option<ItemView>,
    /// Non-fatal notices, e.g. a linked item that was already full.
    pub notices: Vec<String>,
    pub message: String,
}

impl ItemResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            item: None,
            notices: Vec::new(),
            message: message.into(),
        }
    }
}

/// Envelope for calls returning many items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemListResponse {
    pub ok: bool,
    pub items: Vec<ItemView>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserResponse {
    pub ok: bool,
    pub profile: Option<UserView>,
    pub message: String,
}

/// Envelope for mutations that report affected ids or a count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub ok: bool,
    pub affected_ids: Vec<String>,
    pub count: u32,
    pub message: String,
}

impl ActionResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            affected_ids: Vec::new(),
            count: 0,
            message: message.into(),
        }
    }
}

/// One-sided link found by `links_audit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkIssue {
    /// `missing_back_ref|dangling`.
    pub issue: String,
    pub from_id: String,
    pub to_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinksAuditResponse {
    pub ok: bool,
    pub issues: Vec<LinkIssue>,
    pub message: String,
}

/// Registers a new owner profile.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn user_register(email: String, name: String) -> UserResponse {
    let result = with_users(|users| {
        let profile = UserProfile::new(&email, name.trim());
        users.register_user(&profile)?;
        users.get_user(&profile.email)
    });
    match result {
        Ok(Some(profile)) => UserResponse {
            ok: true,
            profile: Some(to_user_view(profile)),
            message: "User registered.".to_string(),
        },
        Ok(None) => user_failure("user_register failed: profile missing after insert"),
        Err(err) => user_failure(format!("user_register failed: {err}")),
    }
}

/// Loads an owner profile. `ok` is true with `profile=None` when absent.
#[flutter_rust_bridge::frb(sync)]
pub fn user_get(email: String) -> UserResponse {
    match with_users(|users| users.get_user(&email)) {
        Ok(profile) => {
            let message = if profile.is_some() {
                "User found."
            } else {
                "User not found."
            };
            UserResponse {
                ok: true,
                profile: profile.map(to_user_view),
                message: message.to_string(),
            }
        }
        Err(err) => user_failure(format!("user_get failed: {err}")),
    }
}

/// Updates editable profile fields.
///
/// `None` leaves a field untouched. An empty `profile_pic` clears the picture.
#[flutter_rust_bridge::frb(sync)]
pub fn user_update_profile(
    email: String,
    name: Option<String>,
    about_me: Option<String>,
    bio: Option<String>,
    profile_pic: Option<String>,
) -> UserResponse {
    let update = ProfileUpdate {
        name,
        about_me,
        bio,
        profile_pic: profile_pic.map(|value| {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }),
    };
    match with_users(|users| users.update_profile(&email, &update)) {
        Ok(profile) => UserResponse {
            ok: true,
            profile: Some(to_user_view(profile)),
            message: "Profile updated.".to_string(),
        },
        Err(err) => user_failure(format!("user_update_profile failed: {err}")),
    }
}

/// Creates a tool or material and links it to the named entries.
///
/// Missing entries are created on the opposite side; full ones are skipped
/// and reported in `notices`.
#[flutter_rust_bridge::frb(sync)]
pub fn item_add(
    owner: String,
    kind: String,
    name: String,
    description: String,
    entries: Vec<LinkEntryInput>,
) -> ItemResponse {
    let result = parse_kind(&kind).and_then(|kind| {
        let entries = to_link_entries(entries)?;
        with_inventory(|service| {
            let known = service
                .list_items(&owner, kind)
                .map_err(|err| err.to_string())?;
            let draft = Item::draft(kind, name.trim(), description);
            service
                .add_item(&owner, &draft, &entries, &known)
                .map_err(|err| err.to_string())
        })
    });
    match result {
        Ok(saved) => ItemResponse {
            ok: true,
            item: Some(to_item_view(saved.item)),
            notices: saved
                .reconcile
                .notices
                .iter()
                .map(ToString::to_string)
                .collect(),
            message: format!("{} created.", capitalized(kind.trim())),
        },
        Err(err) => ItemResponse::failure(format!("item_add failed: {err}")),
    }
}

/// Saves an edit session for an existing item.
///
/// `entries` is the full edited link form; `removed_ids` lists the links the
/// user removed from it.
#[flutter_rust_bridge::frb(sync)]
pub fn item_edit(
    owner: String,
    id: String,
    name: String,
    description: String,
    entries: Vec<LinkEntryInput>,
    removed_ids: Vec<String>,
) -> ItemResponse {
    let result = parse_id(&id).and_then(|id| {
        let entries = to_link_entries(entries)?;
        let removed_ids = removed_ids
            .iter()
            .map(|raw| parse_id(raw))
            .collect::<Result<Vec<_>, _>>()?;
        with_inventory(|service| {
            let mut parent = service
                .get_item(&id)
                .map_err(|err| err.to_string())?
                .ok_or_else(|| format!("item not found: {id}"))?;
            parent.name = name.trim().to_string();
            parent.description = description;
            let known = service
                .list_items(&owner, parent.kind)
                .map_err(|err| err.to_string())?;
            service
                .edit_item(&owner, &parent, &entries, &removed_ids, &known)
                .map_err(|err| err.to_string())
        })
    });
    match result {
        Ok(saved) => ItemResponse {
            ok: true,
            notices: saved
                .reconcile
                .notices
                .iter()
                .map(ToString::to_string)
                .collect(),
            item: Some(to_item_view(saved.item)),
            message: "Item saved.".to_string(),
        },
        Err(err) => ItemResponse::failure(format!("item_edit failed: {err}")),
    }
}

/// Deletes an item after detaching it from everything it links to.
///
/// `affected_ids` lists the detached items.
#[flutter_rust_bridge::frb(sync)]
pub fn item_delete(owner: String, id: String) -> ActionResponse {
    let result = parse_id(&id).and_then(|id| {
        with_inventory(|service| {
            service
                .delete_item(&owner, &id)
                .map_err(|err| err.to_string())
        })
    });
    match result {
        Ok(detached) => ActionResponse {
            ok: true,
            count: detached.len() as u32,
            affected_ids: detached.iter().map(ToString::to_string).collect(),
            message: "Item deleted.".to_string(),
        },
        Err(err) => ActionResponse::failure(format!("item_delete failed: {err}")),
    }
}

/// Lists the owner's items of one kind, optionally filtered by name.
#[flutter_rust_bridge::frb(sync)]
pub fn item_list(owner: String, kind: String, filter: Option<String>) -> ItemListResponse {
    let result = parse_kind(&kind).and_then(|kind| {
        with_inventory(|service| {
            service
                .list_items(&owner, kind)
                .map_err(|err| err.to_string())
        })
    });
    match result {
        Ok(items) => {
            let items = filter_items_by_name(&items, filter.as_deref().unwrap_or_default());
            list_success(items)
        }
        Err(err) => list_failure(format!("item_list failed: {err}")),
    }
}

/// Resolves an item's links to full records.
#[flutter_rust_bridge::frb(sync)]
pub fn item_links(id: String) -> ItemListResponse {
    let result = parse_id(&id).and_then(|id| {
        with_inventory(|service| {
            let item = service
                .get_item(&id)
                .map_err(|err| err.to_string())?
                .ok_or_else(|| format!("item not found: {id}"))?;
            service.linked_items(&item).map_err(|err| err.to_string())
        })
    });
    match result {
        Ok(items) => list_success(items),
        Err(err) => list_failure(format!("item_links failed: {err}")),
    }
}

/// Reports one-sided links among the owner's items without changing them.
#[flutter_rust_bridge::frb(sync)]
pub fn links_audit(owner: String) -> LinksAuditResponse {
    match with_inventory(|service| service.audit_links(&owner).map_err(|err| err.to_string())) {
        Ok(found) => {
            let message = if found.is_empty() {
                "All links are symmetric.".to_string()
            } else {
                format!("Found {} one-sided link(s).", found.len())
            };
            LinksAuditResponse {
                ok: true,
                issues: found.into_iter().map(to_link_issue).collect(),
                message,
            }
        }
        Err(err) => LinksAuditResponse {
            ok: false,
            issues: Vec::new(),
            message: format!("links_audit failed: {err}"),
        },
    }
}

/// Repairs one-sided links among the owner's items. `count` is the number fixed.
#[flutter_rust_bridge::frb(sync)]
pub fn links_repair(owner: String) -> ActionResponse {
    match with_inventory(|service| service.repair_links(&owner).map_err(|err| err.to_string())) {
        Ok(repaired) => ActionResponse {
            ok: true,
            affected_ids: Vec::new(),
            count: repaired as u32,
            message: format!("Repaired {repaired} link(s)."),
        },
        Err(err) => ActionResponse::failure(format!("links_repair failed: {err}")),
    }
}

fn config() -> &'static CoreConfig {
    CONFIG.get_or_init(CoreConfig::from_env)
}

fn with_inventory<T>(
    f: impl FnOnce(&InventoryService<SqliteItemStore<'_>>) -> Result<T, String>,
) -> Result<T, String> {
    let conn = open_db(&config().db_path).map_err(|err| {
        warn!("event=ffi_db_open module=ffi status=error error={err}");
        format!("DB open failed: {err}")
    })?;
    let store =
        SqliteItemStore::try_new(&conn).map_err(|err| format!("item store init failed: {err}"))?;
    let service = InventoryService::new(store);
    f(&service)
}

fn with_users<T>(
    f: impl FnOnce(&SqliteUserRepository<'_>) -> toolshed_core::RepoResult<T>,
) -> Result<T, String> {
    let conn = open_db(&config().db_path).map_err(|err| {
        warn!("event=ffi_db_open module=ffi status=error error={err}");
        format!("DB open failed: {err}")
    })?;
    let users = SqliteUserRepository::try_new(&conn)
        .map_err(|err| format!("user repo init failed: {err}"))?;
    f(&users).map_err(|err| err.to_string())
}

fn parse_kind(raw: &str) -> Result<ItemKind, String> {
    ItemKind::parse(raw).ok_or_else(|| format!("unknown item kind `{raw}`"))
}

fn parse_id(raw: &str) -> Result<ItemId, String> {
    ItemId::parse(raw).map_err(|err| err.to_string())
}

fn to_link_entries(entries: Vec<LinkEntryInput>) -> Result<Vec<LinkEntry>, String> {
    entries
        .into_iter()
        .map(|entry| {
            let id = entry.id.as_deref().map(parse_id).transpose()?;
            Ok(LinkEntry {
                id,
                name: entry.name,
                description: entry.description,
            })
        })
        .collect()
}

fn to_item_view(item: Item) -> ItemView {
    ItemView {
        id: item.id.to_string(),
        kind: item.kind.as_str().to_string(),
        name: item.name,
        description: item.description,
        link_ids: item.links.iter().map(ToString::to_string).collect(),
    }
}

fn to_user_view(profile: UserProfile) -> UserView {
    UserView {
        email: profile.email,
        name: profile.name,
        about_me: profile.about_me,
        bio: profile.bio,
        profile_pic: profile.profile_pic,
    }
}

fn to_link_issue(asymmetry: Asymmetry) -> LinkIssue {
    let (issue, from, to) = match asymmetry {
        Asymmetry::MissingBackRef { from, to } => ("missing_back_ref", from, to),
        Asymmetry::Dangling { from, to } => ("dangling", from, to),
    };
    LinkIssue {
        issue: issue.to_string(),
        from_id: from.to_string(),
        to_id: to.to_string(),
    }
}

fn list_success(items: Vec<Item>) -> ItemListResponse {
    let message = if items.is_empty() {
        "No items.".to_string()
    } else {
        format!("Found {} item(s).", items.len())
    };
    ItemListResponse {
        ok: true,
        items: items.into_iter().map(to_item_view).collect(),
        message,
    }
}

fn list_failure(message: String) -> ItemListResponse {
    ItemListResponse {
        ok: false,
        items: Vec::new(),
        message,
    }
}

fn user_failure(message: impl Into<String>) -> UserResponse {
    UserResponse {
        ok: false,
        profile: None,
        message: message.into(),
    }
}

fn capitalized(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
