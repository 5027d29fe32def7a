//! Fixed layout of the disbursements table.
//!
//! The service never writes to the table; `CREATE_TABLE` exists so fixtures
//! and local tooling can build a database with the same shape.

/// Default table name. Every statement the service runs reads from it.
pub const TABLE: &str = "disbursements";

/// All 18 columns, in table order.
pub const COLUMNS: [&str; 18] = [
    "Organization",
    "FiscalYear",
    "OrgCode",
    "Program",
    "ProgramCode",
    "SubtotalDescription",
    "BudgetObjectClass",
    "SortSequence",
    "TransactionDate",
    "DataSource",
    "Document",
    "VendorName",
    "VendorID",
    "StartDate",
    "EndDate",
    "Description",
    "BudgetObjectCode",
    "Amount",
];

/// Column list used by the listing query.
pub fn select_list() -> String {
    COLUMNS.join(", ")
}

pub const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS disbursements (
        Organization TEXT,
        FiscalYear INTEGER,
        OrgCode TEXT,
        Program TEXT,
        ProgramCode TEXT,
        SubtotalDescription TEXT,
        BudgetObjectClass TEXT,
        SortSequence INTEGER,
        TransactionDate TEXT,
        DataSource TEXT,
        Document TEXT,
        VendorName TEXT,
        VendorID TEXT,
        StartDate TEXT,
        EndDate TEXT,
        Description TEXT,
        BudgetObjectCode TEXT,
        Amount REAL
    )
"#;

/// Schema description handed to the language model.
pub const SCHEMA_TEXT: &str = "
Table: disbursements
Columns:
- Organization TEXT
- FiscalYear INTEGER
- OrgCode TEXT
- Program TEXT
- ProgramCode TEXT
- SubtotalDescription TEXT
- BudgetObjectClass TEXT
- SortSequence INTEGER
- TransactionDate TEXT  -- format: YYYY-MM-DD
- DataSource TEXT
- Document TEXT
- VendorName TEXT
- VendorID TEXT
- StartDate TEXT
- EndDate TEXT
- Description TEXT
- BudgetObjectCode TEXT
- Amount REAL
";
