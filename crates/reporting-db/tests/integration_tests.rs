//! Integration tests for reporting-db.
//!
//! These tests require a running PostgreSQL instance.
//! Run with: `cargo test -p reporting-db --features integration`

#![cfg(feature = "integration")]

mod common;

use chrono::Utc;
use rust_decimal::Decimal;

use common::{unique, TestContext};
use reporting_db::models::{
    CatalogItem, InfraType, LifecycleLogEntry, Manager, ManagerChargeback, NewCatalogItem,
    NewProvision, Opportunity, OpportunityFields, OpportunityKey, Provision, Student,
    StudentProfile, RESULT_FAILURE, RESULT_SUCCESS,
};

fn new_provision(uuid: &str, catalog_id: i32, student_id: i32) -> NewProvision {
    NewProvision {
        uuid: uuid.to_string(),
        catalog_id,
        student_id,
        manager_id: None,
        manager_chargeback_id: None,
        opportunity_id: None,
        provisioned_at: Utc::now(),
        workshop_users: Some(1),
        service_type: "babylon".into(),
        account: "tests".into(),
        sandbox_name: None,
        provision_result: RESULT_SUCCESS.into(),
        cloud: "aws".into(),
        cloud_region: Some("us-east-1".into()),
        environment: "DEV".into(),
        class_name: None,
        chargeback_method: None,
        purpose: None,
        datasource: "RHDPS".into(),
        babylon_guid: None,
        cost_center: None,
        student_geo: Some("NA".into()),
    }
}

#[tokio::test]
async fn test_migrations_create_tables() {
    let ctx = TestContext::new().await;

    for table in [
        "catalog_items",
        "students",
        "manager",
        "manager_chargeback",
        "opportunities",
        "provisions",
        "lifecycle_log",
    ] {
        let result: Result<(i64,), _> = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(ctx.pg())
            .await;
        assert!(result.is_ok(), "{table} table should exist");
    }
}

#[tokio::test]
async fn test_catalog_item_insert_or_get_is_idempotent() {
    let ctx = TestContext::new().await;
    let key = unique("gpte.test");

    let item = NewCatalogItem {
        catalog_item: key.clone(),
        catalog_name: Some("First Name".into()),
        class_name: Some("CLS".into()),
        infra_type: InfraType::Sandbox,
    };
    let first = CatalogItem::insert_or_get(ctx.pg(), &item).await.unwrap();

    let renamed = NewCatalogItem {
        catalog_name: Some("Second Name".into()),
        ..item
    };
    let second = CatalogItem::insert_or_get(ctx.pg(), &renamed).await.unwrap();

    assert_eq!(first, second);
    let row = CatalogItem::find_by_key(ctx.pg(), &key).await.unwrap().unwrap();
    assert_eq!(row.catalog_name.as_deref(), Some("First Name"));
    assert_eq!(row.infra(), Some(InfraType::Sandbox));
}

#[tokio::test]
async fn test_catalog_item_concurrent_inserts_converge() {
    let ctx = TestContext::new().await;
    let key = unique("gpte.race");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = ctx.pg().clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            CatalogItem::insert_or_get(
                &pool,
                &NewCatalogItem {
                    catalog_item: key,
                    catalog_name: None,
                    class_name: None,
                    infra_type: InfraType::Dedicated,
                },
            )
            .await
            .unwrap()
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
}

#[tokio::test]
async fn test_student_upsert_refreshes_mutable_fields_only() {
    let ctx = TestContext::new().await;
    let email = format!("{}@redhat.com", unique("alice"));

    let first = StudentProfile {
        email: email.clone(),
        username: Some("alice".into()),
        full_name: Some("Alice Smith".into()),
        geo: Some("NA".into()),
        title: Some("Engineer".into()),
        check_headcount: true,
        company_id: Some(16736),
        ..Default::default()
    };
    let id1 = Student::upsert(ctx.pg(), &first).await.unwrap();

    let second = StudentProfile {
        full_name: Some("Alice Renamed".into()),
        geo: Some("EMEA".into()),
        title: Some("Senior Engineer".into()),
        ..first.clone()
    };
    let id2 = Student::upsert(ctx.pg(), &second).await.unwrap();
    assert_eq!(id1, id2);

    let row = Student::find_by_email(ctx.pg(), &email).await.unwrap().unwrap();
    assert_eq!(row.geo.as_deref(), Some("EMEA"));
    assert_eq!(row.title.as_deref(), Some("Senior Engineer"));
    assert_eq!(row.full_name.as_deref(), Some("Alice Smith"));
}

#[tokio::test]
async fn test_manager_insert_or_get_never_updates() {
    let ctx = TestContext::new().await;
    let email = format!("{}@redhat.com", unique("boss"));

    let id1 = Manager::insert_or_get(ctx.pg(), &email, Some("Boss One"), Some("boss"))
        .await
        .unwrap();
    let id2 = Manager::insert_or_get(ctx.pg(), &email, Some("Boss Two"), None)
        .await
        .unwrap();
    assert_eq!(id1, id2);

    let row = Manager::find_by_email(ctx.pg(), &email).await.unwrap().unwrap();
    assert_eq!(row.name.as_deref(), Some("Boss One"));
}

#[tokio::test]
async fn test_manager_chargeback_lookup() {
    let ctx = TestContext::new().await;
    let email = format!("{}@redhat.com", unique("payer"));

    let id = ctx.create_chargeback_manager(&email).await;
    assert!(ManagerChargeback::list_all(ctx.pg())
        .await
        .unwrap()
        .iter()
        .any(|m| m.email == email && m.id == id));
}

#[tokio::test]
async fn test_opportunity_upsert_by_matched_key() {
    let ctx = TestContext::new().await;
    let number = unique("num");
    let crm_id = unique("006");

    let fields = OpportunityFields {
        opportunity_id: crm_id.clone(),
        number: Some(number.clone()),
        amount: Some(Decimal::new(150000, 2)),
        stage: Some("Qualify".into()),
        ..Default::default()
    };
    let id1 = Opportunity::upsert(ctx.pg(), &fields, OpportunityKey::Number)
        .await
        .unwrap();

    let updated = OpportunityFields {
        stage: Some("Closed Won".into()),
        amount: None,
        ..fields.clone()
    };
    let id2 = Opportunity::upsert(ctx.pg(), &updated, OpportunityKey::OpportunityId)
        .await
        .unwrap();
    assert_eq!(id1, id2);

    let row = Opportunity::find_by_keys(ctx.pg(), &crm_id, Some(&number))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.stage.as_deref(), Some("Closed Won"));
    assert_eq!(row.amount, None);
}

#[tokio::test]
async fn test_opportunity_stored_by_id_then_matched_by_number() {
    let ctx = TestContext::new().await;
    let number = unique("num");
    let crm_id = unique("006");

    let by_id = OpportunityFields {
        opportunity_id: crm_id.clone(),
        stage: Some("Qualify".into()),
        ..Default::default()
    };
    let id1 = Opportunity::upsert(ctx.pg(), &by_id, OpportunityKey::OpportunityId)
        .await
        .unwrap();

    let by_number = OpportunityFields {
        number: Some(number.clone()),
        stage: Some("Closed Won".into()),
        ..by_id
    };
    let id2 = Opportunity::upsert(ctx.pg(), &by_number, OpportunityKey::Number)
        .await
        .unwrap();
    assert_eq!(id1, id2);

    let row = Opportunity::find_by_keys(ctx.pg(), &crm_id, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.number.as_deref(), Some(number.as_str()));
    assert_eq!(row.stage.as_deref(), Some("Closed Won"));
}

#[tokio::test]
async fn test_opportunity_stored_by_number_then_matched_by_id() {
    let ctx = TestContext::new().await;
    let number = unique("num");
    let old_id = unique("006");
    let new_id = unique("006");

    let first = OpportunityFields {
        opportunity_id: old_id.clone(),
        number: Some(number.clone()),
        ..Default::default()
    };
    let id1 = Opportunity::upsert(ctx.pg(), &first, OpportunityKey::Number)
        .await
        .unwrap();

    let second = OpportunityFields {
        opportunity_id: new_id.clone(),
        stage: Some("Negotiate".into()),
        ..first
    };
    let id2 = Opportunity::upsert(ctx.pg(), &second, OpportunityKey::OpportunityId)
        .await
        .unwrap();
    assert_eq!(id1, id2);

    let row = Opportunity::find_by_keys(ctx.pg(), &new_id, Some(&number))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.id, id1);
    assert_eq!(row.opportunity_id.as_deref(), Some(old_id.as_str()));
    assert_eq!(row.stage.as_deref(), Some("Negotiate"));
}

#[tokio::test]
async fn test_provision_insert_once_fail_and_retire() {
    let ctx = TestContext::new().await;
    let catalog_id = ctx.create_catalog_item(&unique("cat")).await;
    let student_id = ctx
        .create_student(&format!("{}@example.com", unique("s")))
        .await;
    let uuid = unique("prov");

    assert!(!Provision::exists(ctx.pg(), &uuid).await.unwrap());
    let new = new_provision(&uuid, catalog_id, student_id);
    assert!(Provision::insert(ctx.pg(), &new).await.unwrap());
    assert!(!Provision::insert(ctx.pg(), &new).await.unwrap());
    assert!(Provision::exists(ctx.pg(), &uuid).await.unwrap());

    assert!(Provision::mark_failed(ctx.pg(), &uuid).await.unwrap());
    let row = Provision::find_by_uuid(ctx.pg(), &uuid).await.unwrap().unwrap();
    assert_eq!(row.provision_result, RESULT_FAILURE);

    assert!(Provision::retire(ctx.pg(), &uuid, Utc::now()).await.unwrap());
    assert!(!Provision::retire(ctx.pg(), &uuid, Utc::now()).await.unwrap());
    assert!(!Provision::retire(ctx.pg(), "missing", Utc::now()).await.unwrap());
}

#[tokio::test]
async fn test_lifecycle_append_skips_repeated_operation() {
    let ctx = TestContext::new().await;
    let uuid = unique("life");

    assert!(LifecycleLogEntry::append_if_changed(ctx.pg(), &uuid, "provisioning", Some("alice"))
        .await
        .unwrap());
    assert!(!LifecycleLogEntry::append_if_changed(ctx.pg(), &uuid, "provisioning", Some("alice"))
        .await
        .unwrap());
    assert!(LifecycleLogEntry::append_if_changed(ctx.pg(), &uuid, "started", None)
        .await
        .unwrap());
    assert!(!LifecycleLogEntry::append_if_changed(ctx.pg(), &uuid, "started", None)
        .await
        .unwrap());

    let entries = LifecycleLogEntry::list_for(ctx.pg(), &uuid).await.unwrap();
    let ops: Vec<&str> = entries.iter().map(|e| e.operation.as_str()).collect();
    assert_eq!(ops, vec!["provisioning", "started"]);
    assert_eq!(
        LifecycleLogEntry::latest_operation(ctx.pg(), &uuid).await.unwrap().as_deref(),
        Some("started")
    );
}

#[tokio::test]
async fn test_lifecycle_concurrent_duplicates_write_once() {
    let ctx = TestContext::new().await;
    let uuid = unique("life-race");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = ctx.pg().clone();
        let uuid = uuid.clone();
        handles.push(tokio::spawn(async move {
            LifecycleLogEntry::append_if_changed(&pool, &uuid, "started", None)
                .await
                .unwrap()
        }));
    }

    let mut written = 0;
    for handle in handles {
        if handle.await.unwrap() {
            written += 1;
        }
    }
    assert_eq!(written, 1);
}
