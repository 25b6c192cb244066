// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic docgrid usage example.
//!
//! Demonstrates:
//! 1. Connecting to Redis Stack (RediSearch + RedisJSON)
//! 2. Creating a grid and writing rows by ordinal
//! 3. Inserting and deleting in the middle of the grid
//! 4. Creating the search index and running a paged query
//! 5. Facet counts as a flat grid and as a tree
//! 6. Displaying metrics
//!
//! # Prerequisites
//!
//! ```bash
//! docker run -d -p 6379:6379 redis/redis-stack-server:latest
//! ```
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use docgrid::schema::{DocumentSchema, LogicalType, SchemaItem};
use docgrid::search::{Criteria, FacetGrid, FacetPresentation, Operator};
use docgrid::{DocEngine, DocGridConfig, LogicalDocument};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║              docgrid: Basic Usage Example                     ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Connect
    // ─────────────────────────────────────────────────────────────────────────
    let config = DocGridConfig {
        redis_url: Some("redis://localhost:6379".into()),
        key_prefix: "demo:".into(),
        ..Default::default()
    };
    let engine = DocEngine::connect(config).await?;
    println!("✅ Connected\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Grid with a schema at ordinal 0
    // ─────────────────────────────────────────────────────────────────────────
    let schema = DocumentSchema::from_items(
        "cities",
        vec![
            SchemaItem::new("id", LogicalType::Integer).primary(),
            SchemaItem::new("name", LogicalType::Text).stemmed(),
            SchemaItem::new("country", LogicalType::Text).facet().titled("Country"),
            SchemaItem::new("population", LogicalType::Long),
            SchemaItem::new("founded", LogicalType::Date),
        ],
    )?;
    let grid = match engine.open_grid("cities").await {
        Ok(existing) => {
            existing.drop_grid().await?;
            engine.create_grid("cities", schema).await?
        }
        Err(_) => engine.create_grid("cities", schema).await?,
    };

    let rows = [
        (1, "Rome", "Italy", 2_800_000, "0753-04-21"),
        (2, "Oslo", "Norway", 700_000, "1040-01-01"),
        (3, "Milan", "Italy", 1_400_000, "0590-01-01"),
        (4, "Porto", "Portugal", 230_000, "0868-01-01"),
    ];
    let docs: Vec<LogicalDocument> = rows
        .iter()
        .map(|(id, name, country, population, founded)| {
            LogicalDocument::new()
                .with("id", &id.to_string())
                .with("name", name)
                .with("country", country)
                .with("population", &population.to_string())
                .with("founded", founded)
        })
        .collect();
    let ordinals = grid.append_all(&docs).await?;
    println!("📝 Appended {} rows at ordinals {:?}", docs.len(), ordinals);

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Insert and delete in the middle
    // ─────────────────────────────────────────────────────────────────────────
    let turin = LogicalDocument::new()
        .with("id", "5")
        .with("name", "Turin")
        .with("country", "Italy")
        .with("population", "850000")
        .with("founded", "0028-01-01");
    let at = grid.insert_after(1, &turin).await?;
    println!("➕ Inserted Turin at ordinal {}", at);
    grid.delete_at(3).await?;
    println!("➖ Deleted ordinal 3");

    let page = grid.read(1, None).await?;
    for (i, row) in page.rows.iter().enumerate() {
        println!("   {:>2}. {}", i + 1, row.first("name").unwrap_or("?"));
    }
    println!("   total_count = {}\n", page.metadata.total_count);

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Index and search
    // ─────────────────────────────────────────────────────────────────────────
    let action = engine.create_grid_index(&grid, None).await?;
    println!("🔎 Index: {}", action);

    let mut criteria = Criteria::new()
        .and("country", Operator::Equal, ["Italy"])
        .and("population", Operator::Sort, ["DESC"]);
    let results = engine.execute("cities", &mut criteria, None, Some(10)).await?;
    println!("   query: {}", results.query);
    for doc in &results.documents {
        println!(
            "   • {} ({})",
            doc.first("name").unwrap_or("?"),
            doc.first("population").unwrap_or("?")
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Facets
    // ─────────────────────────────────────────────────────────────────────────
    let mut facets = Criteria::new().and("country", Operator::Facet, Vec::<String>::new());
    let flat = engine.aggregate("cities", &mut facets, FacetPresentation::Flat).await?;
    if let FacetGrid::Flat(rows) = &flat.grid {
        for row in rows {
            println!("\n📊 {}: {}", row.field_title, row.values.join(", "));
        }
    }
    let tree = engine.aggregate("cities", &mut facets, FacetPresentation::Tree).await?;
    if let FacetGrid::Tree(nodes) = &tree.grid {
        for node in nodes {
            println!("   [{}] parent={:?} {} ({})", node.id, node.parent_id, node.label, node.count);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📈 Metrics:");
    dump_metrics(&snapshotter);

    engine.drop_index("cities", false).await?;
    grid.drop_grid().await?;
    println!("\n👋 Done");
    Ok(())
}

fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines: Vec<String> = Vec::new();
    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };
        let rendered = match value {
            DebugValue::Counter(v) => v.to_string(),
            DebugValue::Gauge(v) => format!("{:.2}", v.into_inner()),
            DebugValue::Histogram(samples) => {
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                format!("count={} sum={:.4}", samples.len(), sum)
            }
        };
        lines.push(format!("{}{} = {}", key.name(), label_str, rendered));
    }
    lines.sort();
    if lines.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
    for line in lines {
        println!("   └─ {}", line);
    }
}
