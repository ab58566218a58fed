//! Load mode: replace every table's rows with its master file
//!
//! Each table is loaded in its own transaction as `DELETE` followed by
//! `COPY ... FROM STDIN`. The master file encoding is PostgreSQL's `text`
//! COPY format, so the file is streamed as-is.

use anyhow::{bail, Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::genbank::Table;
use crate::table::TableKind;

/// Columns of each table, in master-file field order
pub fn columns(table: Table) -> &'static [&'static str] {
    const BASIC: [&str; 7] = [
        "partition_key",
        "locus",
        "year",
        "month",
        "version",
        "gi_number",
        "definition",
    ];
    const KEYWORDS: [&str; 3] = ["partition_key", "locus", "keyword"];
    const DBXREFS: [&str; 4] = ["partition_key", "locus", "database_name", "database_id"];
    const JOURNALS: [&str; 5] = ["partition_key", "locus", "name", "citation", "pmid"];
    const AUTHORS: [&str; 3] = ["partition_key", "locus", "author"];
    const ANNOTATIONS: [&str; 5] = ["partition_key", "locus", "name", "indexed_value", "value"];

    match table {
        Table::Basic => &BASIC,
        Table::Keywords => &KEYWORDS,
        Table::DbXRefs => &DBXREFS,
        Table::Journals => &JOURNALS,
        Table::Authors => &AUTHORS,
        Table::Annotations => &ANNOTATIONS,
    }
}

/// `COPY` statement reading one table's master file
pub fn copy_statement(table: Table) -> String {
    format!("COPY {} ({}) FROM STDIN", table.name(), columns(table).join(", "))
}

/// Rows loaded into one table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLoad {
    pub table: Table,
    pub rows: u64,
}

pub struct TableLoader {
    pool: PgPool,
}

impl TableLoader {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;

        info!("Connected to database");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the tables if needed
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;
        Ok(())
    }

    /// Replace the contents of every table. All master files must exist
    /// before any table is touched.
    pub async fn load_all(&self, output_dir: &Path) -> Result<Vec<TableLoad>> {
        for table in Table::ALL {
            let path = output_dir.join(table.file_name());
            if !path.is_file() {
                bail!("Master file {} is missing; run prepare first", path.display());
            }
        }

        let mut loads = Vec::with_capacity(Table::ALL.len());
        for table in Table::ALL {
            let rows = self.load_table(table, &output_dir.join(table.file_name())).await?;
            loads.push(TableLoad { table, rows });
        }
        Ok(loads)
    }

    /// Replace the contents of `table` with the rows in `path`
    pub async fn load_table(&self, table: Table, path: &Path) -> Result<u64> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(&format!("DELETE FROM {}", table.name()))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to clear table {}", table.name()))?
            .rows_affected();
        debug!("Deleted {} rows from {}", deleted, table.name());

        let mut copy = tx
            .copy_in_raw(&copy_statement(table))
            .await
            .with_context(|| format!("Failed to start COPY into {}", table.name()))?;
        copy.read_from(file)
            .await
            .with_context(|| format!("Failed to stream {} into {}", path.display(), table.name()))?;
        let rows = copy
            .finish()
            .await
            .with_context(|| format!("COPY into {} failed", table.name()))?;

        tx.commit().await?;
        info!("Loaded {} rows into {}", rows, table.name());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_statement() {
        assert_eq!(
            copy_statement(Table::Keywords),
            "COPY keywords (partition_key, locus, keyword) FROM STDIN"
        );
    }

    #[test]
    fn test_every_table_starts_with_join_key() {
        for table in Table::ALL {
            assert_eq!(&columns(table)[..2], &["partition_key", "locus"]);
        }
    }
}
