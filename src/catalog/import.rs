//! CSV → SQLite catalog import (`setup-db`)

use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::error::SchemeError;
use crate::Result;

/// Columns the catalog table carries, in table order
pub const CATALOG_COLUMNS: [&str; 18] = [
    "scheme_id",
    "scheme_name",
    "nodal_ministry",
    "implementing_agency",
    "target_beneficiaries",
    "tags",
    "state",
    "category",
    "level",
    "brief_description",
    "detailed_description",
    "eligibility_criteria",
    "documents_required",
    "application_process",
    "benefits",
    "Official Website",
    "Application Form",
    "Order/Notice",
];

/// Headers a dataframe export may give the identifier column
const INDEX_HEADERS: [&str; 2] = ["Unnamed: 0", ""];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    /// One value per [`CATALOG_COLUMNS`] entry
    pub values: Vec<String>,
}

impl CatalogRow {
    pub fn scheme_id(&self) -> &str {
        &self.values[0]
    }

    pub fn scheme_name(&self) -> &str {
        &self.values[1]
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImportReport {
    pub rows: usize,
}

/// Map each catalog column to its position in the CSV header
fn column_positions(headers: &csv::StringRecord) -> Result<Vec<usize>> {
    let names: Vec<&str> = headers.iter().map(str::trim).collect();
    let id_pos = names
        .iter()
        .position(|h| *h == "scheme_id")
        .or_else(|| names.iter().position(|h| INDEX_HEADERS.contains(h)));

    let mut positions = Vec::with_capacity(CATALOG_COLUMNS.len());
    let mut missing = Vec::new();
    for column in CATALOG_COLUMNS {
        let pos = if column == "scheme_id" {
            id_pos
        } else {
            names.iter().position(|h| *h == column)
        };
        match pos {
            Some(p) => positions.push(p),
            None => missing.push(column),
        }
    }

    if !missing.is_empty() {
        return Err(SchemeError::Import(format!(
            "missing required columns: {}",
            missing.join(", ")
        )));
    }
    Ok(positions)
}

/// Parse and check a catalog CSV. Missing cells read as empty strings,
/// names are trimmed, and duplicate or blank identifiers are rejected.
pub fn read_catalog<R: Read>(reader: R) -> Result<Vec<CatalogRow>> {
    let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let positions = column_positions(csv.headers()?)?;

    let mut rows = Vec::new();
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();

    for (n, record) in csv.records().enumerate() {
        let record = record?;
        let mut values: Vec<String> = positions
            .iter()
            .map(|&p| record.get(p).unwrap_or("").to_string())
            .collect();
        values[0] = values[0].trim().to_string();
        values[1] = values[1].trim().to_string();

        if values[0].is_empty() {
            return Err(SchemeError::Import(format!("row {} has no scheme_id", n + 1)));
        }
        if !seen.insert(values[0].clone()) {
            duplicates.push(values[0].clone());
        }
        rows.push(CatalogRow { values });
    }

    if !duplicates.is_empty() {
        return Err(SchemeError::Import(format!(
            "duplicate scheme_id values: {}",
            duplicates.join(", ")
        )));
    }
    Ok(rows)
}

fn quoted_columns() -> String {
    CATALOG_COLUMNS
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Replace the `schemes` table with `rows` and rebuild its indexes
pub async fn write_catalog(pool: &SqlitePool, rows: &[CatalogRow]) -> Result<ImportReport> {
    let columns = quoted_columns();
    let definitions = CATALOG_COLUMNS
        .iter()
        .map(|c| {
            if *c == "scheme_name" {
                format!("\"{}\" TEXT NOT NULL", c)
            } else {
                format!("\"{}\" TEXT", c)
            }
        })
        .collect::<Vec<_>>()
        .join(",\n  ");
    let placeholders = vec!["?"; CATALOG_COLUMNS.len()].join(", ");
    let insert = format!("INSERT INTO schemes ({}) VALUES ({})", columns, placeholders);

    let mut tx = pool.begin().await?;
    sqlx::query("DROP TABLE IF EXISTS schemes").execute(&mut *tx).await?;
    sqlx::query(&format!("CREATE TABLE schemes (\n  {}\n)", definitions))
        .execute(&mut *tx)
        .await?;

    for row in rows {
        let mut query = sqlx::query(&insert);
        for value in &row.values {
            query = query.bind(value.as_str());
        }
        query.execute(&mut *tx).await?;
    }

    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_scheme_id ON schemes(scheme_id)")
        .execute(&mut *tx)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_scheme_name ON schemes(scheme_name)")
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    let count: i64 = sqlx::query("SELECT COUNT(*) FROM schemes")
        .fetch_one(pool)
        .await?
        .try_get(0)?;
    let count = usize::try_from(count).unwrap_or(0);
    if count != rows.len() {
        warn!(csv = rows.len(), table = count, "Row count mismatch after import");
        return Err(SchemeError::Import(format!(
            "CSV has {} rows but the table has {}",
            rows.len(),
            count
        )));
    }

    info!(rows = count, "Loaded schemes table");
    Ok(ImportReport { rows: count })
}

/// Full import from a CSV file on disk
pub async fn import_csv(pool: &SqlitePool, path: impl AsRef<Path>) -> Result<ImportReport> {
    let path = path.as_ref();
    info!(path = %path.display(), "Importing scheme catalog");
    let file = std::fs::File::open(path)?;
    let rows = read_catalog(file)?;
    info!(rows = rows.len(), "Parsed catalog CSV");
    write_catalog(pool, &rows).await
}
