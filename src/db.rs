use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row};

use crate::store::{DocMatch, DocumentStore, WriteMode, WriteOp};

pub async fn init_db(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed document store. Documents live in a single jsonb table
/// keyed by (collection, id); batch writes commit in one transaction.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let row = sqlx::query(
            "SELECT fields FROM dsp_scorecard.documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.get("fields")))
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        limit: i64,
    ) -> Result<Vec<DocMatch>> {
        let rows = sqlx::query(
            "SELECT id, fields FROM dsp_scorecard.documents \
             WHERE collection = $1 AND fields->>$2 = $3 \
             ORDER BY id LIMIT $4",
        )
        .bind(collection)
        .bind(field)
        .bind(value)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| DocMatch {
                id: row.get("id"),
                fields: row.get("fields"),
            })
            .collect())
    }

    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for op in &ops {
            match op.mode {
                WriteMode::Set => {
                    sqlx::query(
                        "INSERT INTO dsp_scorecard.documents (collection, id, fields) \
                         VALUES ($1, $2, $3) \
                         ON CONFLICT (collection, id) DO UPDATE SET fields = EXCLUDED.fields",
                    )
                    .bind(&op.collection)
                    .bind(&op.id)
                    .bind(&op.fields)
                    .execute(&mut *tx)
                    .await?;
                }
                WriteMode::Merge => {
                    sqlx::query(
                        "INSERT INTO dsp_scorecard.documents (collection, id, fields) \
                         VALUES ($1, $2, $3) \
                         ON CONFLICT (collection, id) \
                         DO UPDATE SET fields = documents.fields || EXCLUDED.fields",
                    )
                    .bind(&op.collection)
                    .bind(&op.id)
                    .bind(&op.fields)
                    .execute(&mut *tx)
                    .await?;
                }
                WriteMode::Update => {
                    let result = sqlx::query(
                        "UPDATE dsp_scorecard.documents SET fields = fields || $3 \
                         WHERE collection = $1 AND id = $2",
                    )
                    .bind(&op.collection)
                    .bind(&op.id)
                    .bind(&op.fields)
                    .execute(&mut *tx)
                    .await?;

                    if result.rows_affected() == 0 {
                        bail!("document {}/{} does not exist", op.collection, op.id);
                    }
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
