//! Listing query construction.
//!
//! Turns request parameters into a pair of parameterized statements: one that
//! counts the filtered rows and one that fetches a single sorted page. Both
//! share the same WHERE clause and parameter order so the reported total
//! always matches the filters applied to the page.

use serde::{Deserialize, Serialize};

use crate::schema;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 200;

/// Columns searched by the free-text `q` filter.
const SEARCH_COLUMNS: [&str; 6] = [
    "VendorName",
    "Description",
    "Organization",
    "Program",
    "Document",
    "SubtotalDescription",
];

/// A value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

/// SQL text plus the values for its placeholders, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    params: Vec<SqlValue>,
}

impl Statement {
    fn new(sql: String, params: Vec<SqlValue>) -> Self {
        Self { sql, params }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }
}

/// Optional constraints applied to the listing. `None` means "not filtered".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub search: Option<String>,
    pub fiscal_year: Option<String>,
    pub organization: Option<String>,
    pub vendor: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

impl FilterCriteria {
    /// Builds the WHERE clause (including the leading ` WHERE`, or empty) and
    /// its parameters. Predicates are always emitted in the same order.
    fn where_clause(&self) -> (String, Vec<SqlValue>) {
        let mut predicates: Vec<String> = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();

        if let Some(term) = &self.search {
            let group = SEARCH_COLUMNS
                .iter()
                .map(|column| format!("{column} LIKE ?"))
                .collect::<Vec<_>>()
                .join(" OR ");
            predicates.push(format!("({group})"));
            let like = format!("%{term}%");
            params.extend(SEARCH_COLUMNS.iter().map(|_| SqlValue::Text(like.clone())));
        }
        if let Some(year) = &self.fiscal_year {
            predicates.push("FiscalYear = ?".into());
            params.push(year.as_str().into());
        }
        if let Some(org) = &self.organization {
            predicates.push("Organization = ?".into());
            params.push(org.as_str().into());
        }
        if let Some(vendor) = &self.vendor {
            predicates.push("VendorName LIKE ?".into());
            params.push(format!("%{vendor}%").into());
        }
        if let Some(from) = &self.date_from {
            predicates.push("TransactionDate >= ?".into());
            params.push(from.as_str().into());
        }
        if let Some(to) = &self.date_to {
            predicates.push("TransactionDate <= ?".into());
            params.push(to.as_str().into());
        }

        if predicates.is_empty() {
            (String::new(), params)
        } else {
            (format!(" WHERE {}", predicates.join(" AND ")), params)
        }
    }
}

/// Closed set of sortable columns. Request aliases are mapped here before
/// anything reaches SQL text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortColumn {
    #[default]
    TransactionDate,
    Amount,
    VendorName,
    Organization,
    Program,
}

impl SortColumn {
    /// Resolves a request alias; anything unknown sorts by date.
    pub fn from_alias(alias: &str) -> Self {
        match alias {
            "date" => SortColumn::TransactionDate,
            "amount" => SortColumn::Amount,
            "vendor" => SortColumn::VendorName,
            "org" => SortColumn::Organization,
            "program" => SortColumn::Program,
            _ => SortColumn::TransactionDate,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            SortColumn::TransactionDate => "TransactionDate",
            SortColumn::Amount => "Amount",
            SortColumn::VendorName => "VendorName",
            SortColumn::Organization => "Organization",
            SortColumn::Program => "Program",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Only `asc` (any case) sorts ascending.
    pub fn from_param(dir: &str) -> Self {
        if dir.eq_ignore_ascii_case("asc") {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortSpec {
    pub column: SortColumn,
    pub direction: SortDirection,
}

/// Page window. Construct with [`Pagination::new`] to get clamped values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    limit: i64,
    offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }
}

/// Raw `/api/disbursements` query string. Every field is optional and
/// malformed numbers fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub q: Option<String>,
    pub fiscal_year: Option<String>,
    pub org: Option<String>,
    pub vendor: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub sort: Option<String>,
    pub dir: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_int(value: Option<&String>) -> Option<i64> {
    value.and_then(|v| v.trim().parse::<i64>().ok())
}

impl ListingParams {
    pub fn into_query(self) -> ListingQuery {
        let page = Pagination::new(parse_int(self.limit.as_ref()), parse_int(self.offset.as_ref()));
        let sort = SortSpec {
            column: self
                .sort
                .as_deref()
                .map(SortColumn::from_alias)
                .unwrap_or_default(),
            direction: self
                .dir
                .as_deref()
                .map(SortDirection::from_param)
                .unwrap_or_default(),
        };
        let filters = FilterCriteria {
            search: present(self.q),
            fiscal_year: present(self.fiscal_year),
            organization: present(self.org),
            vendor: present(self.vendor),
            date_from: present(self.date_from),
            date_to: present(self.date_to),
        };
        ListingQuery {
            filters,
            sort,
            page,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingQuery {
    pub filters: FilterCriteria,
    pub sort: SortSpec,
    pub page: Pagination,
}

impl ListingQuery {
    /// `SELECT COUNT(*)` over the filtered rows.
    pub fn count_statement(&self) -> Statement {
        let (clause, params) = self.filters.where_clause();
        Statement::new(
            format!("SELECT COUNT(*) FROM {}{clause}", schema::TABLE),
            params,
        )
    }

    /// One sorted page of the filtered rows. Limit and offset are the last
    /// two parameters.
    pub fn data_statement(&self) -> Statement {
        let (clause, mut params) = self.filters.where_clause();
        let sql = format!(
            "SELECT {} FROM {}{clause} ORDER BY {} {} LIMIT ? OFFSET ?",
            schema::select_list(),
            schema::TABLE,
            self.sort.column.column(),
            self.sort.direction.keyword(),
        );
        params.push(SqlValue::Integer(self.page.limit()));
        params.push(SqlValue::Integer(self.page.offset()));
        Statement::new(sql, params)
    }

    pub fn statements(&self) -> (Statement, Statement) {
        (self.count_statement(), self.data_statement())
    }
}
