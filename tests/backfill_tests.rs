//! Backfill job against configured models

use baseapp_ids::prelude::*;

const CONFIG: &str = r#"
enable_public_id_logic: true
backfill:
  batch_size: 1000
models:
  - app_label: catalog
    model_name: widget
    graphql_type: Widget
    schemes: [public_id]
  - app_label: catalog
    model_name: gadget
    pk: explicit
    schemes: [pk]
  - app_label: billing
    model_name: invoice
    graphql_type: Invoice
    schemes: [public_id]
"#;

fn setup() -> (IdsConfig, Arc<InMemoryDatabase>) {
    let config = IdsConfig::from_yaml_str(CONFIG).unwrap();
    let registry = Arc::new(config.build_registry().unwrap());
    let db = Arc::new(InMemoryDatabase::new(registry));
    (config, db)
}

#[tokio::test]
async fn test_backfill_ten_thousand_rows_then_rerun() {
    let (config, db) = setup();
    db.load_rows("catalog.widget", (1..=10_000).map(|pk| (pk, json!({}))))
        .unwrap();
    let backfiller = Backfiller::from_store(db.registry().clone(), db.clone());

    let reports = backfiller
        .backfill_all_models(config.backfill.batch_size, Some("catalog"))
        .await
        .unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].batches, 10);
    assert_eq!(reports[0].created, 10_000);
    assert_eq!(
        PublicIdStore::count(db.as_ref(), Some("catalog.widget")).await.unwrap(),
        10_000
    );

    let rerun = backfiller
        .backfill_all_models(config.backfill.batch_size, Some("catalog"))
        .await
        .unwrap();
    assert_eq!(BackfillReport::total_created(&rerun), 0);
}

#[tokio::test]
async fn test_backfilled_ids_resolve() {
    let (config, db) = setup();
    db.load_rows("billing.invoice", (1..=20).map(|pk| (pk, json!({ "total": pk * 10 }))))
        .unwrap();
    Backfiller::from_store(db.registry().clone(), db.clone())
        .backfill_all_models(7, None)
        .await
        .unwrap();

    let ctx = ResolutionContext::from_store(
        db.registry().clone(),
        db.clone(),
        Arc::new(config.runtime_flags()),
    );
    let invoice = ctx.model("billing.invoice").unwrap().clone();
    for pk in 1..=20 {
        let row = db.get("billing.invoice", pk).await.unwrap().unwrap();
        let id = ctx.get_id_from_instance(&row).await.unwrap();
        assert!(id.as_public_id().is_some());
        assert_eq!(ctx.resolve_id(&id.to_string(), &invoice).await.unwrap(), Some(row));
    }
    assert_eq!(PublicIdStore::count(db.as_ref(), None).await.unwrap(), 20);
}

#[tokio::test]
async fn test_backfill_races_with_lazy_creation() {
    let (_, db) = setup();
    db.load_rows("catalog.widget", (1..=500).map(|pk| (pk, json!({}))))
        .unwrap();

    let lazy = {
        let db = db.clone();
        tokio::spawn(async move {
            for pk in (1..=500).rev().step_by(3) {
                db.get_or_create("catalog.widget", pk).await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };
    let report = Backfiller::from_store(db.registry().clone(), db.clone())
        .backfill_model(db.registry().get("catalog.widget").unwrap(), 50)
        .await
        .unwrap();
    lazy.await.unwrap();

    assert!(report.is_complete());
    assert!(report.created <= 500);
    assert_eq!(
        PublicIdStore::count(db.as_ref(), Some("catalog.widget")).await.unwrap(),
        500
    );
}

#[tokio::test]
async fn test_rows_created_after_backfill_are_hooked() {
    let (_, db) = setup();
    db.load_rows("catalog.widget", [(1, json!({}))]).unwrap();
    Backfiller::from_store(db.registry().clone(), db.clone())
        .backfill_all_models(100, None)
        .await
        .unwrap();

    let row = db.create("catalog.widget", json!({})).await.unwrap();
    assert_eq!(row.pk, 2);
    assert!(db.get_for_row("catalog.widget", 2).await.unwrap().is_some());
}

#[tokio::test]
async fn test_config_dry_run() {
    let (config, db) = setup();
    db.load_rows("catalog.widget", (1..=30).map(|pk| (pk, json!({}))))
        .unwrap();

    let reports = Backfiller::from_store(db.registry().clone(), db.clone())
        .dry_run(true)
        .backfill_all_models(config.backfill.batch_size, None)
        .await
        .unwrap();
    assert_eq!(BackfillReport::total_created(&reports), 30);
    assert_eq!(PublicIdStore::count(db.as_ref(), None).await.unwrap(), 0);
}
