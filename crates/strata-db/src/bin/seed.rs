//! # Seed Data Generator
//!
//! Populates a ledger database with a small warehouse for development.
//!
//! ## Usage
//! ```bash
//! # Seed the configured database (strata.toml, STRATA_DB_PATH)
//! cargo run -p strata-db --bin seed
//!
//! # Specify database path
//! cargo run -p strata-db --bin seed -- --db ./data/strata.db
//!
//! # Use a config file (database path, pool, log filter)
//! cargo run -p strata-db --bin seed -- --config ./strata.toml
//! ```
//!
//! ## Generated Data
//! - Two locations: a warehouse and a store
//! - A handful of fasteners received into the warehouse
//! - Freight landed onto that receipt by value
//! - A damage write-off at the warehouse
//! - A transfer shipped and received at the store

use chrono::Utc;
use std::env;
use std::path::PathBuf;
use strata_core::{
    AllocationMethod, CostCategory, Money, NewAdjustmentLine, NewReceipt, NewReceiptLine,
    NewTransferLine, UnitCost,
};
use strata_db::{init_tracing, Database, DbConfig, LedgerConfig};

/// (sku, name, quantity, unit cost in cents, weight in grams)
const ITEMS: &[(&str, &str, i64, i64, i64)] = &[
    ("BOLT-M8", "M8 hex bolt", 500, 12, 6_000),
    ("NUT-M8", "M8 hex nut", 800, 4, 4_800),
    ("WASH-M8", "M8 flat washer", 1_000, 2, 2_000),
    ("SCREW-W4", "4x40 wood screw", 1_200, 3, 3_600),
    ("ANCHOR-8", "8mm wall anchor", 300, 9, 900),
];

const FREIGHT_CENTS: i64 = 4_500;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Strata Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       Database file path (default: from config)");
                println!("  -c, --config <PATH>   Config file (default: platform config dir)");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = LedgerConfig::load_or_default(config_path);
    if let Some(path) = db_path {
        config.database.path = path;
    }
    init_tracing(&config.logging.filter);

    println!("🌱 Strata Seed Data Generator");
    println!("=============================");
    println!("Database: {}", config.database.path.display());
    println!();

    let db = Database::new(DbConfig::from(&config)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.catalog().item_count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} items", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let catalog = db.catalog();
    let ledger = db.ledger();

    let warehouse = catalog.register_location("WH-01", "Main warehouse").await?;
    let store = catalog.register_location("ST-01", "Downtown store").await?;
    println!("✓ Registered locations {} and {}", warehouse.code, store.code);

    let mut items = Vec::with_capacity(ITEMS.len());
    let mut lines = Vec::with_capacity(ITEMS.len());
    for (sku, name, quantity, cents, grams) in ITEMS {
        let item = catalog.register_item(sku, name).await?;
        let mut line = NewReceiptLine::new(item.id.clone(), *quantity, UnitCost::from_cents(*cents));
        line.weight_grams = Some(*grams);
        lines.push(line);
        items.push(item);
    }
    println!("✓ Registered {} items", items.len());

    let receipt = ledger
        .receive_items(NewReceipt {
            location_id: warehouse.id.clone(),
            reference: Some("PO-1001".to_string()),
            received_at: Utc::now(),
            lines,
        })
        .await?;
    println!("✓ Received {} lines into {}", receipt.lines.len(), warehouse.code);

    let freight = ledger
        .apply_landed_cost(
            &receipt.id,
            CostCategory::Freight,
            Money::from_cents(FREIGHT_CENTS),
            AllocationMethod::Value,
        )
        .await?;
    println!(
        "✓ Landed {} freight over {} layers",
        freight.total_cost,
        freight.allocations.len()
    );

    let damaged = ledger
        .create_adjustment(
            &warehouse.id,
            "Damaged in racking",
            vec![NewAdjustmentLine::decrease(items[0].id.clone(), 20)],
        )
        .await?;
    let damaged = ledger.post_adjustment(&damaged.id).await?;
    println!("✓ Posted adjustment {} ({} lines)", damaged.id, damaged.lines.len());

    let transfer = ledger
        .create_transfer(
            &warehouse.id,
            &store.id,
            items
                .iter()
                .take(3)
                .map(|item| NewTransferLine {
                    item_id: item.id.clone(),
                    quantity: 100,
                })
                .collect(),
        )
        .await?;
    ledger.ship_transfer(&transfer.id).await?;
    let transfer = ledger.receive_transfer(&transfer.id).await?;
    println!(
        "✓ Transfer {} {} -> {} ({:?})",
        transfer.id, warehouse.code, store.code, transfer.status
    );

    println!();
    for location in [&warehouse, &store] {
        let value = ledger.total_inventory_value(None, Some(&location.id)).await?;
        println!("  {} value: {}", location.code, value);
    }
    println!("✓ Seed complete in {:?}", start.elapsed());

    Ok(())
}
