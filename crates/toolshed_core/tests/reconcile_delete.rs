mod common;

use common::{assert_symmetric, named, setup, CountingStore, OTHER_OWNER, OWNER};
use toolshed_core::{
    InventoryService, Item, ItemId, ItemKind, LinkEntry, ReconcileError, RepoError,
    SqliteItemStore,
};

#[test]
fn deleting_a_material_detaches_every_tool_first() {
    let conn = setup();
    let service = InventoryService::new(CountingStore::new(
        SqliteItemStore::try_new(&conn).unwrap(),
    ));
    let tool_a = service
        .add_item(
            OWNER,
            &Item::draft(ItemKind::Tool, "A", ""),
            &[LinkEntry::named("Nails"), LinkEntry::named("Glue")],
            &[],
        )
        .unwrap()
        .item;
    let tool_b = service
        .add_item(
            OWNER,
            &Item::draft(ItemKind::Tool, "B", ""),
            &[LinkEntry::named("Nails")],
            &[tool_a.clone()],
        )
        .unwrap()
        .item;
    let nails = named(service.store(), ItemKind::Material, "Nails");
    let glue = named(service.store(), ItemKind::Material, "Glue");
    service.store().reset();

    let detached = service.delete_item(OWNER, &nails.id).unwrap();

    assert_eq!(detached, vec![tool_a.id.clone(), tool_b.id.clone()]);
    assert_eq!(
        service.store().calls(),
        vec![
            "get_item",
            "is_owned_by",
            "list_items_for_user",
            "update_item",
            "update_item",
            "unlink_from_user",
            "delete_item",
        ]
    );
    assert!(service.get_item(&nails.id).unwrap().is_none());
    assert_eq!(
        service.get_item(&tool_a.id).unwrap().unwrap().links,
        vec![glue.id]
    );
    assert!(service
        .get_item(&tool_b.id)
        .unwrap()
        .unwrap()
        .links
        .is_empty());
    assert_symmetric(service.store(), OWNER);
}

#[test]
fn deleting_an_unlinked_tool_issues_only_the_two_delete_calls() {
    let conn = setup();
    let service = InventoryService::new(CountingStore::new(
        SqliteItemStore::try_new(&conn).unwrap(),
    ));
    let saw = service
        .add_item(OWNER, &Item::draft(ItemKind::Tool, "Saw", ""), &[], &[])
        .unwrap()
        .item;
    service.store().reset();

    let detached = service.delete_item(OWNER, &saw.id).unwrap();

    assert!(detached.is_empty());
    assert_eq!(
        service.store().calls(),
        vec![
            "get_item",
            "is_owned_by",
            "list_items_for_user",
            "unlink_from_user",
            "delete_item"
        ]
    );
    assert!(service
        .list_items(OWNER, ItemKind::Tool)
        .unwrap()
        .is_empty());
}

#[test]
fn deleting_an_unknown_id_reports_not_found() {
    let conn = setup();
    let service = InventoryService::new(SqliteItemStore::try_new(&conn).unwrap());
    let id = ItemId::generate();

    let err = service.delete_item(OWNER, &id).unwrap_err();
    assert!(matches!(err, ReconcileError::ParentNotFound(missing) if missing == id));
}

#[test]
fn cleanup_failure_leaves_the_target_in_place() {
    let conn = setup();
    let service = InventoryService::new(CountingStore::new(
        SqliteItemStore::try_new(&conn).unwrap(),
    ));
    let hammer = service
        .add_item(
            OWNER,
            &Item::draft(ItemKind::Tool, "Hammer", ""),
            &[LinkEntry::named("Nails")],
            &[],
        )
        .unwrap()
        .item;
    let nails = named(service.store(), ItemKind::Material, "Nails");

    // get, ownership check, list, then the back-reference update fails.
    service.store().fail_call(4);
    let err = service.delete_item(OWNER, &hammer.id).unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Store(RepoError::Unavailable(_))
    ));
    assert!(service.get_item(&hammer.id).unwrap().is_some());
    assert_eq!(
        service.get_item(&nails.id).unwrap().unwrap().links,
        vec![hammer.id]
    );
    assert_symmetric(service.store(), OWNER);
}

#[test]
fn another_owner_cannot_delete_the_item() {
    let conn = setup();
    let service = InventoryService::new(CountingStore::new(
        SqliteItemStore::try_new(&conn).unwrap(),
    ));
    let hammer = service
        .add_item(
            OWNER,
            &Item::draft(ItemKind::Tool, "Hammer", ""),
            &[LinkEntry::named("Nails")],
            &[],
        )
        .unwrap()
        .item;
    service.store().reset();

    let err = service.delete_item(OTHER_OWNER, &hammer.id).unwrap_err();

    assert!(matches!(err, ReconcileError::ParentNotFound(id) if id == hammer.id));
    assert_eq!(service.store().calls(), vec!["get_item", "is_owned_by"]);
    assert!(service.get_item(&hammer.id).unwrap().is_some());
    assert_eq!(service.list_items(OWNER, ItemKind::Tool).unwrap().len(), 1);
    assert_symmetric(service.store(), OWNER);
}
