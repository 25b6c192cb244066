// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Integration Tests for DocGrid
//!
//! These tests need a real Redis with the RediSearch and JSON modules.
//! They use testcontainers (redis-stack-server) - no external docker-compose required.
//!
//! # Running Tests
//! ```bash
//! # Run all integration tests (requires Docker)
//! cargo test --test integration -- --ignored
//!
//! # Run only grid tests
//! cargo test --test integration grid -- --ignored
//! ```
//!
//! # Test Organization
//! - `grid_*` - ordered grid storage against real sorted sets and hashes/JSON
//! - `search_*` - index creation, FT.SEARCH paging, facets
//! - `lock_*` - lease locks

use std::time::Duration;

use docgrid::schema::{DocumentSchema, LogicalType, SchemaItem};
use docgrid::search::{Criteria, FacetGrid, FacetPresentation, Operator};
use docgrid::{DocEngine, DocGridConfig, IndexAction, LogicalDocument, StorageKind};

use testcontainers::{clients::Cli, core::WaitFor, Container, GenericImage};

// =============================================================================
// Container Helpers
// =============================================================================

/// Redis with RediSearch + RedisJSON
fn redis_stack_container(docker: &Cli) -> Container<'_, GenericImage> {
    let image = GenericImage::new("redis/redis-stack-server", "7.2.0-v10")
        .with_exposed_port(6379)
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));
    docker.run(image)
}

/// Unique key prefix so tests sharing a container never collide.
fn config_for(port: u16, kind: StorageKind) -> DocGridConfig {
    DocGridConfig {
        redis_url: Some(format!("redis://127.0.0.1:{}", port)),
        key_prefix: format!("it{}:", &uuid::Uuid::new_v4().simple().to_string()[..8]),
        storage_kind: kind,
        fetch_batch_size: 2,
        ..Default::default()
    }
}

fn people() -> DocumentSchema {
    DocumentSchema::from_items(
        "people",
        vec![
            SchemaItem::new("id", LogicalType::Integer).primary(),
            SchemaItem::new("name", LogicalType::Text).stemmed(),
            SchemaItem::new("city", LogicalType::Text).facet().titled("City"),
            SchemaItem::new("age", LogicalType::Integer),
            SchemaItem::new("joined", LogicalType::Date),
        ],
    )
    .unwrap()
}

fn person(id: u32, name: &str, city: &str, age: u32) -> LogicalDocument {
    LogicalDocument::new()
        .with("id", &id.to_string())
        .with("name", name)
        .with("city", city)
        .with("age", &age.to_string())
        .with("joined", "2024-03-01")
}

fn names(rows: &[LogicalDocument]) -> Vec<String> {
    rows.iter()
        .filter_map(|r| r.first("name").map(str::to_string))
        .collect()
}

// =============================================================================
// Grid Tests
// =============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn grid_reindex_on_redis_hash() {
    let docker = Cli::default();
    let redis = redis_stack_container(&docker);
    let engine = DocEngine::connect(config_for(redis.get_host_port_ipv4(6379), StorageKind::Hash))
        .await
        .expect("Failed to connect");

    let grid = engine.create_grid("people", people()).await.unwrap();
    grid.append_all(&[
        person(1, "Ann", "Rome", 31),
        person(2, "Bo", "Oslo", 25),
        person(3, "Cy", "Rome", 40),
    ])
    .await
    .unwrap();

    grid.insert_after(1, &person(4, "Di", "Lima", 29)).await.unwrap();
    assert_eq!(names(&grid.read(1, None).await.unwrap().rows), vec!["Ann", "Di", "Bo", "Cy"]);

    grid.delete_at(2).await.unwrap();
    let page = grid.read(1, None).await.unwrap();
    assert_eq!(names(&page.rows), vec!["Ann", "Bo", "Cy"]);
    assert_eq!(page.metadata.total_count, 3);
    assert_eq!(page.rows[0].first("joined"), Some("2024-03-01"));
    assert!(page.rows[0].get("joined_epoch").is_none());

    let reopened = engine.open_grid("people").await.unwrap();
    assert_eq!(reopened.schema(), &people());
    assert!(grid.drop_grid().await.unwrap() > 0);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn grid_json_rows_with_children() {
    let docker = Cli::default();
    let redis = redis_stack_container(&docker);
    let engine = DocEngine::connect(config_for(redis.get_host_port_ipv4(6379), StorageKind::Json))
        .await
        .expect("Failed to connect");

    let grid = engine.create_grid("people", people()).await.unwrap();
    let parent = person(1, "Ann", "Rome", 31).with_child(person(2, "Kid", "Rome", 3));
    grid.append(&parent).await.unwrap();

    let row = grid.get(1).await.unwrap().unwrap();
    assert_eq!(row.first("name"), Some("Ann"));
    assert_eq!(row.children().len(), 1);
    assert_eq!(row.children()[0].first("name"), Some("Kid"));

    grid.delete_at(1).await.unwrap();
    assert_eq!(grid.count().await.unwrap(), 0);
    assert!(grid.orphaned_rows().await.unwrap().is_empty());
}

// =============================================================================
// Search Tests
// =============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn search_index_pages_and_facets() {
    let docker = Cli::default();
    let redis = redis_stack_container(&docker);
    let engine = DocEngine::connect(config_for(redis.get_host_port_ipv4(6379), StorageKind::Hash))
        .await
        .expect("Failed to connect");

    let grid = engine.create_grid("people", people()).await.unwrap();
    assert_eq!(engine.create_grid_index(&grid, None).await.unwrap(), IndexAction::Created);
    assert_eq!(engine.create_grid_index(&grid, None).await.unwrap(), IndexAction::Unchanged);

    grid.append_all(&[
        person(1, "Ann", "Rome", 31),
        person(2, "Bo", "Oslo", 25),
        person(3, "Cy", "Rome", 40),
        person(4, "Di", "Lima", 52),
    ])
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut criteria = Criteria::new()
        .and("age", Operator::GreaterThan, ["30"])
        .and("age", Operator::Sort, ["ASC"]);
    let page = engine.execute("people", &mut criteria, Some(0), Some(2)).await.unwrap();
    assert_eq!(page.metadata.total_count, 3);
    assert_eq!(names(&page.documents), vec!["Ann", "Cy"]);
    assert_eq!(page.metadata.next_offset, Some(2));
    assert_eq!(criteria.compiled_query(), Some("@age:[(30 +inf]"));

    let mut rome = Criteria::new().and("city", Operator::Equal, ["Rome"]);
    assert_eq!(engine.execute("people", &mut rome, None, None).await.unwrap().metadata.total_count, 2);

    let mut facets = Criteria::new().and("city", Operator::Facet, Vec::<String>::new());
    let report = engine
        .aggregate("people", &mut facets, FacetPresentation::Flat)
        .await
        .unwrap();
    let FacetGrid::Flat(rows) = report.grid else {
        panic!("expected flat facets");
    };
    assert_eq!(rows[0].values[0], "Rome (2)");

    engine.drop_index("people", false).await.unwrap();
    assert_eq!(grid.count().await.unwrap(), 4);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn search_schema_update_rebuilds() {
    let docker = Cli::default();
    let redis = redis_stack_container(&docker);
    let engine = DocEngine::connect(config_for(redis.get_host_port_ipv4(6379), StorageKind::Hash))
        .await
        .expect("Failed to connect");

    let grid = engine.create_grid("people", people()).await.unwrap();
    engine.create_grid_index(&grid, None).await.unwrap();

    let title_only =
        DocumentSchema::from_items("people", vec![SchemaItem::new("city", LogicalType::Text).facet().titled("Town")])
            .unwrap();
    assert!(!engine.update_schema("people", &title_only).await.unwrap());

    let reweighted = DocumentSchema::from_items(
        "people",
        vec![SchemaItem::new("name", LogicalType::Text).stemmed().weighted(4.0)],
    )
    .unwrap();
    assert!(engine.update_schema("people", &reweighted).await.unwrap());

    engine
        .update_synonyms("people", "g1", &["Ann".to_string(), "Anna".to_string()])
        .await
        .unwrap();
    let dump = engine.dump_synonyms("people").await.unwrap();
    assert!(dump.iter().any(|(_, groups)| groups.iter().any(|g| g == "g1")));
}

// =============================================================================
// Lock Tests
// =============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn lock_is_exclusive_until_released() {
    let docker = Cli::default();
    let redis = redis_stack_container(&docker);
    let engine = DocEngine::connect(config_for(redis.get_host_port_ipv4(6379), StorageKind::Hash))
        .await
        .expect("Failed to connect");

    let held = engine.lock("rebuild").await.unwrap();
    let prefix = &engine.config().key_prefix;
    let contender =
        docgrid::LeaseLock::try_acquire(engine.backend(), prefix, "rebuild", Duration::from_secs(5)).await.unwrap();
    assert!(contender.is_none());

    assert!(held.release().await.unwrap());
    let next = docgrid::LeaseLock::try_acquire(engine.backend(), prefix, "rebuild", Duration::from_secs(5))
        .await
        .unwrap()
        .expect("lock should be free");
    assert!(next.release().await.unwrap());
}
