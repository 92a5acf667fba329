//! Link symmetry audit and repair.
//!
//! # Responsibility
//! - Detect one-sided tool/material links within one owner's items.
//! - Repair them after an interrupted reconciliation.
//!
//! # Invariants
//! - Repair is deterministic: dangling ids are dropped first, then missing
//!   back-references are handled; within each pass items are visited tools
//!   first, then materials, each in creation order, links in list order.
//! - Repair never pushes an item past `MAX_LINKS`; when the other side is
//!   full, the one-sided link is dropped instead.

use crate::model::item::{Item, ItemId, ItemKind};
use crate::repo::item_store::{ItemStore, RepoResult};
use log::{info, warn};
use std::collections::HashMap;

/// One half-link found by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asymmetry {
    /// `from` links to `to`, but `to` does not link back.
    MissingBackRef { from: ItemId, to: ItemId },
    /// `from` links to an id that no longer exists.
    Dangling { from: ItemId, to: ItemId },
}

/// Audits and repairs link symmetry through a borrowed store.
pub struct SymmetrySweep<'s, S: ItemStore> {
    store: &'s S,
}

impl<'s, S: ItemStore> SymmetrySweep<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Lists every one-sided link among `owner`'s items.
    pub fn scan(&self, owner: &str) -> RepoResult<Vec<Asymmetry>> {
        let (order, items) = self.load(owner)?;
        let mut found = Vec::new();
        for id in &order {
            let Some(item) = items.get(id) else {
                continue;
            };
            for link in &item.links {
                match self.lookup(&items, link)? {
                    None => found.push(Asymmetry::Dangling {
                        from: item.id.clone(),
                        to: link.clone(),
                    }),
                    Some(other) if !other.is_linked_to(&item.id) => {
                        found.push(Asymmetry::MissingBackRef {
                            from: item.id.clone(),
                            to: link.clone(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        info!(
            "event=symmetry_scan module=symmetry status=ok items={} asymmetries={}",
            order.len(),
            found.len()
        );
        Ok(found)
    }

    /// Repairs every asymmetry found by `scan`. Returns the number repaired.
    ///
    /// Dropping dangling ids first can free capacity for a back-reference.
    pub fn repair(&self, owner: &str) -> RepoResult<usize> {
        let mut found = self.scan(owner)?;
        found.sort_by_key(|asymmetry| match asymmetry {
            Asymmetry::Dangling { .. } => 0,
            Asymmetry::MissingBackRef { .. } => 1,
        });
        let (_, mut items) = self.load(owner)?;

        let mut repaired = 0;
        for asymmetry in &found {
            match asymmetry {
                Asymmetry::Dangling { from, to } => {
                    if self.drop_link(&mut items, from, to)? {
                        repaired += 1;
                    }
                }
                Asymmetry::MissingBackRef { from, to } => {
                    let mut other = match self.lookup(&items, to)? {
                        Some(other) => other,
                        None => continue,
                    };
                    if other.is_linked_to(from) {
                        continue;
                    }
                    if other.has_link_capacity() {
                        other.add_link(from);
                        self.store.update_item(&other)?;
                        items.insert(other.id.clone(), other);
                    } else {
                        warn!(
                            "event=symmetry_repair module=symmetry status=skipped error_code=link_limit_reached from_id={from} to_id={to}"
                        );
                        self.drop_link(&mut items, from, to)?;
                    }
                    repaired += 1;
                }
            }
        }

        info!("event=symmetry_repair module=symmetry status=ok repaired={repaired}");
        Ok(repaired)
    }

    fn load(&self, owner: &str) -> RepoResult<(Vec<ItemId>, HashMap<ItemId, Item>)> {
        let mut order = Vec::new();
        let mut items = HashMap::new();
        for kind in [ItemKind::Tool, ItemKind::Material] {
            for item in self.store.list_items_for_user(owner, kind)? {
                order.push(item.id.clone());
                items.insert(item.id.clone(), item);
            }
        }
        Ok((order, items))
    }

    /// Finds an item in the loaded set, falling back to the store for items
    /// owned by someone else.
    fn lookup(&self, items: &HashMap<ItemId, Item>, id: &ItemId) -> RepoResult<Option<Item>> {
        match items.get(id) {
            Some(item) => Ok(Some(item.clone())),
            None => self.store.get_item(id),
        }
    }

    fn drop_link(
        &self,
        items: &mut HashMap<ItemId, Item>,
        from: &ItemId,
        to: &ItemId,
    ) -> RepoResult<bool> {
        let Some(item) = items.get_mut(from) else {
            return Ok(false);
        };
        if !item.remove_link(to) {
            return Ok(false);
        }
        self.store.update_item(item)?;
        Ok(true)
    }
}
