//! # Seed Data Generator
//!
//! Populates the database with a demo supplier, a demo buyer and the demo
//! price list, and prints API tokens for both accounts.
//!
//! ## Usage
//! ```bash
//! # Defaults: ./data/market.db and demos/shop.yaml
//! cargo run -p market-db --bin seed
//!
//! # Specify database path and price list
//! cargo run -p market-db --bin seed -- --db ./data/market.db --price-list demos/shop.yaml
//! ```
//!
//! Running it again reuses existing accounts and re-ingests the price list,
//! which replaces the supplier's listings.

use std::env;
use std::fs;

use anyhow::{bail, Context};
use market_core::{ContactInput, NewUser, PriceList, User, UserKind};
use market_db::{Database, DbConfig};
use tracing_subscriber::EnvFilter;

const SUPPLIER_EMAIL: &str = "partner@example.com";
const BUYER_EMAIL: &str = "buyer@example.com";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "market_db=info".into()))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./data/market.db");
    let mut price_list_path = String::from("demos/shop.yaml");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--price-list" | "-p" => {
                if i + 1 < args.len() {
                    price_list_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Marketplace Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>          Database file path (default: ./data/market.db)");
                println!("  -p, --price-list <PATH>  Price list to ingest (default: demos/shop.yaml)");
                println!("  -h, --help               Show this help message");
                return Ok(());
            }
            other => bail!("unknown argument: {other}"),
        }
        i += 1;
    }

    println!("🌱 Marketplace Seed Data Generator");
    println!("==================================");
    println!("Database:   {}", db_path);
    println!("Price list: {}", price_list_path);
    println!();

    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("creating database directory")?;
        }
    }

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let supplier = ensure_user(&db, SUPPLIER_EMAIL, UserKind::Shop, "Partner").await?;
    let buyer = ensure_user(&db, BUYER_EMAIL, UserKind::Buyer, "Buyer").await?;

    if !db.contacts().exists_for(buyer.id).await? {
        db.contacts()
            .create(
                buyer.id,
                &ContactInput {
                    city: "Moscow".to_string(),
                    street: "Gogolya".to_string(),
                    house: Some("58".to_string()),
                    apartment: Some("73".to_string()),
                    phone: "+79424238142".to_string(),
                    ..Default::default()
                },
            )
            .await?;
        println!("✓ Buyer contact created");
    }

    let bytes = fs::read(&price_list_path)
        .with_context(|| format!("reading price list {price_list_path}"))?;
    let list = PriceList::parse(&bytes).context("parsing price list")?;
    let report = db.ingest().replace_catalog(supplier.id, None, &list).await?;
    println!(
        "✓ Ingested '{}': {} categories, {} listings, {} parameters",
        list.shop, report.categories, report.listings, report.parameters
    );

    let supplier_token = db.users().create_token(supplier.id).await?;
    let buyer_token = db.users().create_token(buyer.id).await?;

    println!();
    println!("Tokens (Authorization: Token <key>):");
    println!("  supplier {:<22} {}", SUPPLIER_EMAIL, supplier_token);
    println!("  buyer    {:<22} {}", BUYER_EMAIL, buyer_token);
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

async fn ensure_user(db: &Database, email: &str, kind: UserKind, name: &str) -> anyhow::Result<User> {
    if let Some(user) = db.users().find_by_email(email).await? {
        println!("• Reusing {} ({})", email, user.id);
        return Ok(user);
    }

    let user = db
        .users()
        .create(&NewUser {
            email: email.to_string(),
            first_name: name.to_string(),
            last_name: "Demo".to_string(),
            company: if kind == UserKind::Shop { "Связной".to_string() } else { String::new() },
            kind,
            ..Default::default()
        })
        .await?;
    println!("✓ Created {} ({})", email, user.id);
    Ok(user)
}
