//! # Database Bootstrap
//!
//! Prepares a fresh canteen database: applies migrations, installs the
//! default ticket pricing and optionally creates the first admin account.
//!
//! ## Usage
//! ```bash
//! # Default database path
//! cargo run -p canteen-db --bin init
//!
//! # Custom path and admin account
//! cargo run -p canteen-db --bin init -- --db ./data/canteen.db \
//!     --admin admin --password 's3cret-pass'
//! ```
//!
//! `ADMIN_USERNAME` / `ADMIN_PASSWORD` and `CANTEEN_DB_PATH` are read from
//! the environment when the flags are absent. Running it twice is harmless.

use chrono::Utc;
use std::env;

use canteen_core::validation::{validate_password, validate_username};
use canteen_core::Role;
use canteen_db::password::hash_password;
use canteen_db::{Database, DbConfig};

const DEFAULT_DB_PATH: &str = "./canteen.db";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = env::var("CANTEEN_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
    let mut admin_username = env::var("ADMIN_USERNAME").ok();
    let mut admin_password = env::var("ADMIN_PASSWORD").ok();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--admin" | "-a" => {
                if i + 1 < args.len() {
                    admin_username = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--password" | "-p" => {
                if i + 1 < args.len() {
                    admin_password = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Canteen POS Database Bootstrap");
                println!();
                println!("Usage: init [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>          Database file path (default: {DEFAULT_DB_PATH})");
                println!("  -a, --admin <USERNAME>   Create this admin account if missing");
                println!("  -p, --password <PASS>    Password for the admin account");
                println!("  -h, --help               Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Canteen POS Database Bootstrap");
    println!("==============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    if db.ticket_configs().ensure_default(Utc::now()).await? {
        println!("✓ Default ticket pricing installed (0.50 per ticket)");
    } else {
        let pricing = db.ticket_configs().active_pricing().await?;
        println!(
            "✓ Ticket pricing already configured (base {}, {} offers)",
            pricing.base_price(),
            pricing.offers().len()
        );
    }

    match (admin_username, admin_password) {
        (Some(username), Some(password)) => {
            let username = validate_username(&username)?;
            validate_password(&password)?;

            if db.users().get_by_username(&username).await?.is_some() {
                println!("✓ Admin '{}' already exists", username);
            } else {
                let hash = hash_password(&password)?;
                db.users().create(&username, &hash, Role::Admin).await?;
                println!("✓ Admin '{}' created", username);
            }
        }
        (Some(_), None) | (None, Some(_)) => {
            eprintln!("⚠ Both an admin username and password are required; skipping admin");
        }
        (None, None) => {
            println!("  No admin requested (set ADMIN_USERNAME and ADMIN_PASSWORD)");
        }
    }

    println!();
    println!(
        "Users: {}  Tickets: {}",
        db.users().count().await?,
        db.tickets().count().await?
    );
    println!("✓ Bootstrap complete!");

    db.close().await;
    Ok(())
}
