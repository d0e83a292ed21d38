//! Integration tests for the fluent query builder.

mod common;

use common::{create_items_table, memory_env, prepared_driver};
use db_layer::{DbError, Driver, PreparedDriver, QueryParam, SortDirection};
use serde_json::json;

const CONN: &str = "default";

async fn seeded_driver() -> PreparedDriver {
    let driver = prepared_driver(memory_env());
    create_items_table(&driver, CONN).await;
    for (name, price, active) in [
        ("alpha", 1.0, true),
        ("beta", 2.5, false),
        ("gamma", 4.0, true),
        ("delta", 8.0, true),
        ("epsilon", 16.0, false),
    ] {
        driver
            .insert(
                "items",
                &[
                    ("name", QueryParam::from(name)),
                    ("price", QueryParam::from(price)),
                    ("active", QueryParam::from(active)),
                ],
                CONN,
            )
            .await
            .unwrap();
    }
    driver
}

#[tokio::test]
async fn test_where_equals_returns_matching_row() {
    let driver = seeded_driver().await;

    let rows = driver
        .table("items", CONN)
        .and_where("id", "=", 5)
        .get()
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], json!(5));
    assert_eq!(rows[0]["name"], json!("epsilon"));

    let none = driver
        .table("items", CONN)
        .and_where("id", "=", 999)
        .get()
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_projection_order_and_paging() {
    let driver = seeded_driver().await;

    let rows = driver
        .table("items", CONN)
        .select(["name"])
        .and_where("active", "=", true)
        .order_by("price", SortDirection::Desc)
        .limit(2)
        .offset(1)
        .get()
        .await
        .unwrap();

    let names: Vec<&str> = rows.iter().filter_map(|r| r["name"].as_str()).collect();
    assert_eq!(names, vec!["gamma", "alpha"]);
    assert!(rows.iter().all(|r| r.len() == 1));
}

#[tokio::test]
async fn test_where_in() {
    let driver = seeded_driver().await;

    let rows = driver
        .table("items", CONN)
        .where_in("name", ["beta", "delta", "missing"])
        .order_by_asc("id")
        .get()
        .await
        .unwrap();
    let ids: Vec<i64> = rows.iter().filter_map(|r| r["id"].as_i64()).collect();
    assert_eq!(ids, vec![2, 4]);

    let empty = driver
        .table("items", CONN)
        .where_in("id", Vec::<i64>::new())
        .get()
        .await
        .unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_first() {
    let driver = seeded_driver().await;

    let cheapest = driver
        .table("items", CONN)
        .order_by_asc("price")
        .first()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cheapest["name"], json!("alpha"));

    let missing = driver
        .table("items", CONN)
        .and_where("price", ">", 100.0)
        .first()
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_count() {
    let driver = seeded_driver().await;

    assert_eq!(driver.table("items", CONN).count().await.unwrap(), 5);
    assert_eq!(
        driver
            .table("items", CONN)
            .and_where("active", "=", false)
            .limit(1)
            .count()
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn test_negative_limit_is_rejected_before_execution() {
    let driver = seeded_driver().await;
    driver.set_logging(true).await;

    let err = driver.table("items", CONN).limit(-5).get().await.unwrap_err();
    assert!(matches!(err, DbError::InvalidInput { .. }));
    assert!(driver.query_log(None).await.is_empty());
}

#[tokio::test]
async fn test_count_ignores_paging() {
    let driver = seeded_driver().await;
    let count = driver
        .table("items", CONN)
        .and_where("active", "=", true)
        .limit(-5)
        .offset(-1)
        .count()
        .await
        .unwrap();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn test_builder_runs_through_legacy_driver() {
    let driver = common::legacy_driver(memory_env());
    driver.provision(CONN, &Default::default()).await.unwrap();
    create_items_table(&driver, CONN).await;
    driver
        .insert("items", &[("name", QueryParam::from("only"))], CONN)
        .await
        .unwrap();

    let count = db_layer::QueryBuilder::new(&driver, "items", CONN)
        .count()
        .await
        .unwrap();
    assert_eq!(count, 1);
}
