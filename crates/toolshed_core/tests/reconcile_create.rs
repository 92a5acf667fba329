mod common;

use common::{assert_symmetric, named, setup, CountingStore, OWNER};
use toolshed_core::{
    InventoryService, Item, ItemKind, LinkEntry, NameMatcher, ReconcileError, ReconcileNotice,
    RelationshipReconciler, RepoError, SqliteItemStore, MAX_LINKS,
};

fn entries(names: &[&str]) -> Vec<LinkEntry> {
    names.iter().map(|name| LinkEntry::named(*name)).collect()
}

#[test]
fn missing_material_is_created_and_linked_both_ways() {
    let conn = setup();
    let service = InventoryService::new(CountingStore::new(
        SqliteItemStore::try_new(&conn).unwrap(),
    ));

    let hammer = Item::draft(ItemKind::Tool, "Hammer", "claw");
    let saved = service
        .add_item(OWNER, &hammer, &entries(&["Nails"]), &[])
        .unwrap();

    let nails = named(service.store(), ItemKind::Material, "Nails");
    assert_eq!(nails.links, vec![hammer.id.clone()]);
    assert_eq!(saved.item.links, vec![nails.id.clone()]);
    assert_eq!(saved.reconcile.created, vec![nails.id.clone()]);

    let stored = service.get_item(&hammer.id).unwrap().unwrap();
    assert_eq!(stored.links, vec![nails.id]);
    assert_eq!(stored.description, "claw");
    assert_symmetric(service.store(), OWNER);
}

#[test]
fn one_store_call_per_entry_plus_parent_create() {
    let conn = setup();
    let service = InventoryService::new(CountingStore::new(
        SqliteItemStore::try_new(&conn).unwrap(),
    ));
    let first = Item::draft(ItemKind::Tool, "Hammer", "");
    service
        .add_item(OWNER, &first, &entries(&["Nails"]), &[])
        .unwrap();
    service.store().reset();

    let second = Item::draft(ItemKind::Tool, "Mallet", "");
    service
        .add_item(OWNER, &second, &entries(&["Nails", "Pegs"]), &[first])
        .unwrap();

    assert_eq!(
        service.store().calls(),
        vec![
            "list_items_for_user",
            "update_item",
            "create_item",
            "create_item"
        ]
    );
}

#[test]
fn full_material_is_skipped_with_notice() {
    let conn = setup();
    let service = InventoryService::new(SqliteItemStore::try_new(&conn).unwrap());

    let mut known = Vec::new();
    for index in 0..MAX_LINKS {
        let tool = Item::draft(ItemKind::Tool, format!("Hammer {index}"), "");
        let saved = service
            .add_item(OWNER, &tool, &entries(&["Nails"]), &known)
            .unwrap();
        known.push(saved.item);
    }
    let nails = named(service.store(), ItemKind::Material, "Nails");
    assert_eq!(nails.links.len(), MAX_LINKS);

    let hammer2 = Item::draft(ItemKind::Tool, "Hammer2", "");
    let saved = service
        .add_item(OWNER, &hammer2, &entries(&["Nails"]), &known)
        .unwrap();

    assert!(saved.item.links.is_empty());
    assert_eq!(
        saved.reconcile.notices,
        vec![ReconcileNotice::LinkLimitReached {
            id: nails.id.clone(),
            kind: ItemKind::Material,
            name: "Nails".to_string(),
        }]
    );
    assert!(saved.reconcile.notices[0].to_string().contains("Nails"));
    assert!(service.get_item(&hammer2.id).unwrap().is_some());

    let nails_after = service.get_item(&nails.id).unwrap().unwrap();
    assert_eq!(nails_after.links, nails.links);
    assert_eq!(
        service.list_items(OWNER, ItemKind::Material).unwrap().len(),
        1
    );
    assert_symmetric(service.store(), OWNER);
}

#[test]
fn skipped_entry_does_not_block_the_rest_of_the_batch() {
    let conn = setup();
    let service = InventoryService::new(SqliteItemStore::try_new(&conn).unwrap());

    let mut known = Vec::new();
    for index in 0..MAX_LINKS {
        let tool = Item::draft(ItemKind::Tool, format!("Saw {index}"), "");
        known.push(
            service
                .add_item(OWNER, &tool, &entries(&["Blades"]), &known)
                .unwrap()
                .item,
        );
    }

    let jigsaw = Item::draft(ItemKind::Tool, "Jigsaw", "");
    let saved = service
        .add_item(OWNER, &jigsaw, &entries(&["Blades", "Plywood"]), &known)
        .unwrap();

    let plywood = named(service.store(), ItemKind::Material, "Plywood");
    assert_eq!(saved.item.links, vec![plywood.id]);
    assert_eq!(saved.reconcile.notices.len(), 1);
    assert_symmetric(service.store(), OWNER);
}

#[test]
fn existing_material_is_reused_not_duplicated() {
    let conn = setup();
    let service = InventoryService::new(SqliteItemStore::try_new(&conn).unwrap());

    let hammer = service
        .add_item(
            OWNER,
            &Item::draft(ItemKind::Tool, "Hammer", ""),
            &entries(&["Nails"]),
            &[],
        )
        .unwrap()
        .item;
    let nail_gun = service
        .add_item(
            OWNER,
            &Item::draft(ItemKind::Tool, "Nail gun", ""),
            &entries(&["Nails"]),
            &[hammer.clone()],
        )
        .unwrap();

    let materials = service.list_items(OWNER, ItemKind::Material).unwrap();
    assert_eq!(materials.len(), 1);
    assert_eq!(materials[0].links, vec![hammer.id, nail_gun.item.id]);
    assert_eq!(nail_gun.reconcile.updated, vec![materials[0].id.clone()]);
    assert!(nail_gun.reconcile.created.is_empty());
}

#[test]
fn repeated_and_blank_entries_contribute_once_or_not_at_all() {
    let conn = setup();
    let service = InventoryService::new(SqliteItemStore::try_new(&conn).unwrap());

    let saved = service
        .add_item(
            OWNER,
            &Item::draft(ItemKind::Tool, "Hammer", ""),
            &entries(&["", "Nails", "   ", "Nails"]),
            &[],
        )
        .unwrap();

    assert_eq!(saved.item.links.len(), 1);
    assert_eq!(
        service.list_items(OWNER, ItemKind::Material).unwrap().len(),
        1
    );
}

#[test]
fn duplicate_tool_name_fails_before_any_store_call() {
    let conn = setup();
    let service = InventoryService::new(CountingStore::new(
        SqliteItemStore::try_new(&conn).unwrap(),
    ));
    service
        .add_item(
            OWNER,
            &Item::draft(ItemKind::Tool, "Hammer", ""),
            &entries(&["Nails"]),
            &[],
        )
        .unwrap();
    let known = service.list_items(OWNER, ItemKind::Tool).unwrap();
    service.store().reset();

    let err = service
        .add_item(
            OWNER,
            &Item::draft(ItemKind::Tool, "Hammer", ""),
            &entries(&["Glue"]),
            &known,
        )
        .unwrap_err();

    assert!(
        matches!(err, ReconcileError::DuplicateName { kind: ItemKind::Tool, ref existing, .. } if existing == &known[0].id)
    );
    assert_eq!(service.store().call_count(), 0);
}

#[test]
fn more_than_max_entries_is_rejected_before_any_store_call() {
    let conn = setup();
    let service = InventoryService::new(CountingStore::new(
        SqliteItemStore::try_new(&conn).unwrap(),
    ));

    let err = service
        .add_item(
            OWNER,
            &Item::draft(ItemKind::Material, "Glue", ""),
            &entries(&["A", "B", "C", "D", "E"]),
            &[],
        )
        .unwrap_err();

    assert!(matches!(err, ReconcileError::TooManyLinks { count: 5 }));
    assert_eq!(service.store().call_count(), 0);
}

#[test]
fn blank_parent_name_is_rejected() {
    let conn = setup();
    let service = InventoryService::new(SqliteItemStore::try_new(&conn).unwrap());

    let err = service
        .add_item(OWNER, &Item::draft(ItemKind::Tool, "  ", ""), &[], &[])
        .unwrap_err();
    assert!(matches!(err, ReconcileError::InvalidParent(_)));
}

#[test]
fn name_resolution_is_case_sensitive_by_default() {
    let conn = setup();
    let service = InventoryService::new(SqliteItemStore::try_new(&conn).unwrap());

    let hammer = service
        .add_item(
            OWNER,
            &Item::draft(ItemKind::Tool, "Hammer", ""),
            &entries(&["Nails"]),
            &[],
        )
        .unwrap()
        .item;
    service
        .add_item(
            OWNER,
            &Item::draft(ItemKind::Tool, "Mallet", ""),
            &entries(&["nails"]),
            &[hammer],
        )
        .unwrap();

    assert_eq!(
        service.list_items(OWNER, ItemKind::Material).unwrap().len(),
        2
    );
}

struct CaseInsensitive;

impl NameMatcher for CaseInsensitive {
    fn is_match(&self, existing: &str, wanted: &str) -> bool {
        existing.trim().eq_ignore_ascii_case(wanted.trim())
    }
}

#[test]
fn swapped_matcher_changes_resolution_policy() {
    let conn = setup();
    let reconciler = RelationshipReconciler::new(SqliteItemStore::try_new(&conn).unwrap())
        .with_matcher(CaseInsensitive);
    let service = InventoryService::with_reconciler(reconciler);

    let hammer = service
        .add_item(
            OWNER,
            &Item::draft(ItemKind::Tool, "Hammer", ""),
            &entries(&["Nails"]),
            &[],
        )
        .unwrap()
        .item;
    service
        .add_item(
            OWNER,
            &Item::draft(ItemKind::Tool, "Mallet", ""),
            &entries(&[" NAILS "]),
            &[hammer.clone()],
        )
        .unwrap();

    let materials = service.list_items(OWNER, ItemKind::Material).unwrap();
    assert_eq!(materials.len(), 1);
    assert_eq!(materials[0].links.len(), 2);

    let err = service
        .add_item(
            OWNER,
            &Item::draft(ItemKind::Tool, "hammer", ""),
            &[],
            &[hammer],
        )
        .unwrap_err();
    assert!(matches!(err, ReconcileError::DuplicateName { .. }));
}

#[test]
fn store_failure_midway_keeps_earlier_writes_and_skips_parent() {
    let conn = setup();
    let service = InventoryService::new(CountingStore::new(
        SqliteItemStore::try_new(&conn).unwrap(),
    ));
    let hammer = Item::draft(ItemKind::Tool, "Hammer", "");

    // list, create Nails, then fail creating Screws.
    service.store().fail_call(3);
    let err = service
        .add_item(OWNER, &hammer, &entries(&["Nails", "Screws"]), &[])
        .unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Store(RepoError::Unavailable(_))
    ));
    assert!(service.get_item(&hammer.id).unwrap().is_none());
    let nails = named(service.store(), ItemKind::Material, "Nails");
    assert_eq!(nails.links, vec![hammer.id]);
    assert_eq!(
        service.list_items(OWNER, ItemKind::Material).unwrap().len(),
        1
    );
}

#[test]
fn owner_email_casing_addresses_the_same_collection() {
    let conn = setup();
    let service = InventoryService::new(SqliteItemStore::try_new(&conn).unwrap());

    let saved = service
        .add_item(
            "Ada@Example.com",
            &Item::draft(ItemKind::Tool, "Hammer", ""),
            &entries(&["Nails"]),
            &[],
        )
        .unwrap();

    let tools = service.list_items("ADA@example.COM", ItemKind::Tool).unwrap();
    assert_eq!(tools, vec![saved.item.clone()]);
    assert_eq!(service.list_items(OWNER, ItemKind::Material).unwrap().len(), 1);

    let deleted = service
        .delete_item(" Ada@Example.com ", &saved.item.id)
        .unwrap();
    assert_eq!(deleted.len(), 1);
    assert_symmetric(service.store(), OWNER);
}
