#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use disbursements_engine::{schema, DisbursementStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::Connection;
use tempfile::TempDir;

/// (Organization, FiscalYear, Program, SubtotalDescription, TransactionDate,
/// Document, VendorName, Description, Amount)
type FixtureRow = (
    &'static str,
    i64,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    Option<&'static str>,
    &'static str,
    f64,
);

pub const ROWS: [FixtureRow; 8] = [
    ("Office of the Clerk", 2023, "Admin", "Supplies", "2023-01-15", "DOC-1", Some("Acme Corp"), "Paper and toner", 120.50),
    ("Office of the Clerk", 2023, "Admin", "Travel", "2023-03-02", "DOC-2", Some("Delta Air"), "Flight to conference", 640.00),
    ("House Administration", 2022, "Operations", "Equipment", "2022-11-20", "DOC-3", Some("ACME Supply"), "Chairs", 980.00),
    ("House Administration", 2023, "Operations", "Rent", "2023-06-01", "DOC-4", Some("Landlord LLC"), "Office rent", 2500.00),
    ("Committee on Ethics", 2021, "Oversight", "Travel", "2021-07-09", "DOC-5", Some("Amtrak"), "Train tickets for acme audit", 88.25),
    ("committee on budget", 2022, "Budget", "Supplies", "2022-02-14", "DOC-6", Some("Staples"), "Pens", 15.75),
    ("Committee on Ethics", 2023, "Oversight", "Services", "2023-09-30", "DOC-7", None, "Consulting", 1200.00),
    ("Office of the Clerk", 2022, "Admin", "Supplies", "2022-12-31", "DOC-8", Some("Office Depot"), "Folders", 42.00),
];

/// Creates a database file with the fixture rows. Keep the `TempDir` alive
/// for as long as the file is needed.
pub async fn seeded_db() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("disbursements.db");
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let mut conn = SqliteConnection::connect_with(&options)
        .await
        .expect("create db");
    sqlx::query(schema::CREATE_TABLE)
        .execute(&mut conn)
        .await
        .expect("create table");

    for (sequence, row) in ROWS.iter().enumerate() {
        let (org, year, program, subtotal, date, document, vendor, description, amount) = *row;
        sqlx::query(
            "INSERT INTO disbursements (Organization, FiscalYear, OrgCode, Program, ProgramCode, \
             SubtotalDescription, SortSequence, TransactionDate, DataSource, Document, VendorName, \
             Description, Amount) VALUES (?, ?, 'ORG', ?, 'PRG', ?, ?, ?, 'fixture', ?, ?, ?, ?)",
        )
        .bind(org)
        .bind(year)
        .bind(program)
        .bind(subtotal)
        .bind(sequence as i64)
        .bind(date)
        .bind(document)
        .bind(vendor)
        .bind(description)
        .bind(amount)
        .execute(&mut conn)
        .await
        .expect("insert fixture row");
    }
    conn.close().await.expect("close");
    (dir, path)
}

pub async fn open_store() -> (TempDir, Arc<DisbursementStore>) {
    let (dir, path) = seeded_db().await;
    let store = DisbursementStore::open(&path, 2).await.expect("open store");
    (dir, Arc::new(store))
}
