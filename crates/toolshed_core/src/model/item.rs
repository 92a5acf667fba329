//! Item domain model shared by the tool and material projections.
//!
//! # Responsibility
//! - Define the canonical record for tools and materials.
//! - Generate and validate object-id style identifiers.
//! - Keep link-list invariants checkable before every write.
//!
//! # Invariants
//! - `links` only holds ids of the opposite kind, never the item's own id.
//! - `links` is duplicate-free and holds at most `MAX_LINKS` ids.
//! - `name` is never blank after trim.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Maximum number of cross-references one item may hold.
pub const MAX_LINKS: usize = 4;

const ITEM_ID_LEN: usize = 24;

static ITEM_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]{24}$").expect("valid item id regex"));

/// Object-id style identifier: 24 lowercase hex characters.
///
/// Generated client-side so a draft can be linked before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemId(String);

impl ItemId {
    /// Generates a fresh id from the current time and random bytes.
    ///
    /// Layout: 4-byte big-endian unix seconds followed by 8 random bytes.
    pub fn generate() -> Self {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        let random = Uuid::new_v4();

        let mut hex = String::with_capacity(ITEM_ID_LEN);
        for byte in (seconds as u32).to_be_bytes() {
            hex.push_str(&format!("{byte:02x}"));
        }
        for byte in &random.as_bytes()[..8] {
            hex.push_str(&format!("{byte:02x}"));
        }
        Self(hex)
    }

    /// Parses an id, accepting upper-case hex and normalizing to lower-case.
    pub fn parse(value: &str) -> Result<Self, ItemValidationError> {
        let normalized = value.trim().to_ascii_lowercase();
        if !ITEM_ID_RE.is_match(&normalized) {
            return Err(ItemValidationError::InvalidId(value.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ItemId {
    type Error = ItemValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ItemId> for String {
    fn from(value: ItemId) -> Self {
        value.0
    }
}

/// Which side of the tool/material relationship an item sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Tool,
    Material,
}

impl ItemKind {
    /// Returns the kind that items of this kind link to.
    pub fn opposite(self) -> Self {
        match self {
            Self::Tool => Self::Material,
            Self::Material => Self::Tool,
        }
    }

    /// Stable lowercase label used in storage and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tool => "tool",
            Self::Material => "material",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tool" | "tools" => Some(Self::Tool),
            "material" | "materials" => Some(Self::Material),
            _ => None,
        }
    }
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical record for a tool or a material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "_id")]
    pub id: ItemId,
    /// Serialized as `type` to match external schema naming.
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Ordered ids of linked items of the opposite kind.
    #[serde(default)]
    pub links: Vec<ItemId>,
}

impl Item {
    /// Creates a draft item with a freshly generated id and no links.
    pub fn draft(kind: ItemKind, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::with_id(ItemId::generate(), kind, name, description)
    }

    /// Creates an item with a caller-provided id.
    ///
    /// Used when identity already exists, e.g. when rehydrating an edit form.
    pub fn with_id(
        id: ItemId,
        kind: ItemKind,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            description: description.into(),
            links: Vec::new(),
        }
    }

    pub fn is_linked_to(&self, id: &ItemId) -> bool {
        self.links.contains(id)
    }

    pub fn has_link_capacity(&self) -> bool {
        self.links.len() < MAX_LINKS
    }

    /// Appends `id` unless it is already present.
    ///
    /// Returns whether the list changed. Capacity is not checked here; callers
    /// decide how to treat a full list.
    pub fn add_link(&mut self, id: &ItemId) -> bool {
        if self.is_linked_to(id) {
            return false;
        }
        self.links.push(id.clone());
        true
    }

    /// Removes every occurrence of `id`. Returns whether the list changed.
    pub fn remove_link(&mut self, id: &ItemId) -> bool {
        let before = self.links.len();
        self.links.retain(|existing| existing != id);
        self.links.len() != before
    }

    /// Validates record invariants before persistence.
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        if self.name.trim().is_empty() {
            return Err(ItemValidationError::BlankName);
        }
        if self.links.len() > MAX_LINKS {
            return Err(ItemValidationError::TooManyLinks {
                id: self.id.clone(),
                count: self.links.len(),
            });
        }
        let mut seen = HashSet::with_capacity(self.links.len());
        for link in &self.links {
            if link == &self.id {
                return Err(ItemValidationError::SelfLink(self.id.clone()));
            }
            if !seen.insert(link) {
                return Err(ItemValidationError::DuplicateLink {
                    id: self.id.clone(),
                    link: link.clone(),
                });
            }
        }
        Ok(())
    }
}

/// One cross-reference entry as typed into an add/edit form.
///
/// `id` is set when the entry was rehydrated from an existing link; resolution
/// still happens by name because the name may have been edited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    #[serde(default)]
    pub id: Option<ItemId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl LinkEntry {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
        }
    }

    /// Rehydrates an entry from an already linked item.
    pub fn from_item(item: &Item) -> Self {
        Self {
            id: Some(item.id.clone()),
            name: item.name.clone(),
            description: item.description.clone(),
        }
    }

    /// Blank entries are placeholders left in the form and contribute nothing.
    pub fn is_blank(&self) -> bool {
        self.name.trim().is_empty()
    }
}

/// Validation errors for item records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    InvalidId(String),
    BlankName,
    TooManyLinks { id: ItemId, count: usize },
    SelfLink(ItemId),
    DuplicateLink { id: ItemId, link: ItemId },
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId(value) => {
                write!(f, "item id must be 24 hex characters, got `{value}`")
            }
            Self::BlankName => write!(f, "item name must not be blank"),
            Self::TooManyLinks { id, count } => write!(
                f,
                "item {id} has {count} links; at most {MAX_LINKS} are allowed"
            ),
            Self::SelfLink(id) => write!(f, "item {id} must not link to itself"),
            Self::DuplicateLink { id, link } => {
                write!(f, "item {id} links to {link} more than once")
            }
        }
    }
}

impl Error for ItemValidationError {}
