use async_trait::async_trait;
use common::{ItemCode, Product, ProductPatch};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::store::ReplicaStore;
use crate::{ReplicationError, Result};

/// PostgreSQL-backed replica store.
///
/// The table name is interpolated into SQL. It must already have passed
/// [`common::config::identifier`].
#[derive(Clone)]
pub struct PostgresReplicaStore {
    pool: PgPool,
    table: String,
}

impl PostgresReplicaStore {
    /// Creates a new store writing to `table`.
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Gets the name of the replica table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Creates the replica table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                item_code TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                price DOUBLE PRECISION NOT NULL DEFAULT 0,
                category TEXT NOT NULL DEFAULT '',
                jenis TEXT NOT NULL DEFAULT ''
            )
            "#,
            self.table
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        tracing::info!(table = %self.table, "replica schema ready");
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        let item_code: String = row.try_get("item_code")?;
        let item_code =
            ItemCode::new(item_code).map_err(|e| ReplicationError::InvalidRow(e.to_string()))?;

        Ok(Product::new(
            item_code,
            row.try_get::<String, _>("name")?,
            row.try_get("price")?,
            row.try_get::<String, _>("category")?,
            row.try_get::<String, _>("jenis")?,
        ))
    }
}

#[async_trait]
impl ReplicaStore for PostgresReplicaStore {
    async fn upsert(&self, product: &Product) -> Result<()> {
        let sql = format!(
            r#"
            INSERT INTO {} (item_code, name, price, category, jenis)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (item_code) DO UPDATE
            SET name = EXCLUDED.name,
                price = EXCLUDED.price,
                category = EXCLUDED.category,
                jenis = EXCLUDED.jenis
            "#,
            self.table
        );

        sqlx::query(&sql)
            .bind(product.item_code.as_str())
            .bind(&product.name)
            .bind(product.price)
            .bind(&product.category)
            .bind(&product.kind)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update(&self, item_code: &ItemCode, patch: &ProductPatch) -> Result<u64> {
        // Absent fields bind as NULL and keep their stored value.
        let sql = format!(
            r#"
            UPDATE {}
            SET name = COALESCE($2, name),
                price = COALESCE($3, price),
                category = COALESCE($4, category),
                jenis = COALESCE($5, jenis)
            WHERE item_code = $1
            "#,
            self.table
        );

        let result = sqlx::query(&sql)
            .bind(item_code.as_str())
            .bind(patch.name.as_deref())
            .bind(patch.price)
            .bind(patch.category.as_deref())
            .bind(patch.kind.as_deref())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn get(&self, item_code: &ItemCode) -> Result<Option<Product>> {
        let sql = format!(
            "SELECT item_code, name, price, category, jenis FROM {} WHERE item_code = $1",
            self.table
        );

        let row = sqlx::query(&sql)
            .bind(item_code.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_product).transpose()
    }
}
