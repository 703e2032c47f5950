use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::{AppError, ResultExt};
use crate::models::Lead;

/// Persistent lead storage.
///
/// The pipeline never talks to the store directly; the service loads every
/// lead into its index at startup and writes back what each batch touched.
pub enum LeadStore {
    /// Process-local map, used by tests and when no `DATABASE_URL` is set.
    Memory(RwLock<BTreeMap<Uuid, Lead>>),
    /// `leads` table in Postgres, full lead kept as JSONB.
    Postgres(PgPool),
}

impl LeadStore {
    pub fn memory() -> Self {
        LeadStore::Memory(RwLock::new(BTreeMap::new()))
    }

    pub fn postgres(pool: PgPool) -> Self {
        LeadStore::Postgres(pool)
    }

    pub fn backend(&self) -> &'static str {
        match self {
            LeadStore::Memory(_) => "memory",
            LeadStore::Postgres(_) => "postgres",
        }
    }

    pub async fn load_all(&self) -> Result<Vec<Lead>, AppError> {
        match self {
            LeadStore::Memory(map) => Ok(map.read().await.values().cloned().collect()),
            LeadStore::Postgres(pool) => {
                let rows: Vec<(Json<Lead>,)> =
                    sqlx::query_as("SELECT data FROM leads ORDER BY created_at, id")
                        .fetch_all(pool)
                        .await
                        .context("loading leads")?;
                Ok(rows.into_iter().map(|(Json(lead),)| lead).collect())
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        match self {
            LeadStore::Memory(map) => Ok(map.read().await.get(&id).cloned()),
            LeadStore::Postgres(pool) => {
                let row: Option<(Json<Lead>,)> =
                    sqlx::query_as("SELECT data FROM leads WHERE id = $1")
                        .bind(id)
                        .fetch_optional(pool)
                        .await
                        .with_context(|| format!("loading lead {}", id))?;
                Ok(row.map(|(Json(lead),)| lead))
            }
        }
    }

    /// Leads with at least `min_score`, best first.
    pub async fn list(&self, min_score: u8, limit: usize) -> Result<Vec<Lead>, AppError> {
        match self {
            LeadStore::Memory(map) => {
                let mut leads: Vec<Lead> = map
                    .read()
                    .await
                    .values()
                    .filter(|l| l.completeness_score >= min_score)
                    .cloned()
                    .collect();
                leads.sort_by(|a, b| {
                    b.completeness_score
                        .cmp(&a.completeness_score)
                        .then_with(|| a.id.cmp(&b.id))
                });
                leads.truncate(limit);
                Ok(leads)
            }
            LeadStore::Postgres(pool) => {
                let rows: Vec<(Json<Lead>,)> = sqlx::query_as(
                    r#"
                    SELECT data FROM leads
                    WHERE completeness_score >= $1
                    ORDER BY completeness_score DESC, id
                    LIMIT $2
                    "#,
                )
                .bind(i16::from(min_score))
                .bind(i64::try_from(limit).unwrap_or(i64::MAX))
                .fetch_all(pool)
                .await
                .context("listing leads")?;
                Ok(rows.into_iter().map(|(Json(lead),)| lead).collect())
            }
        }
    }

    pub async fn upsert(&self, lead: &Lead) -> Result<(), AppError> {
        match self {
            LeadStore::Memory(map) => {
                map.write().await.insert(lead.id, lead.clone());
                Ok(())
            }
            LeadStore::Postgres(pool) => {
                sqlx::query(
                    r#"
                    INSERT INTO leads (id, dedup_key, organization_name, completeness_score, data, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (id) DO UPDATE
                    SET dedup_key = EXCLUDED.dedup_key,
                        organization_name = EXCLUDED.organization_name,
                        completeness_score = EXCLUDED.completeness_score,
                        data = EXCLUDED.data,
                        updated_at = now()
                    "#,
                )
                .bind(lead.id)
                .bind(&lead.dedup_key)
                .bind(&lead.organization_name)
                .bind(i16::from(lead.completeness_score))
                .bind(Json(lead))
                .bind(lead.created_at)
                .execute(pool)
                .await
                .with_context(|| format!("saving lead {}", lead.id))?;
                Ok(())
            }
        }
    }

    /// Returns whether a lead was removed.
    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        match self {
            LeadStore::Memory(map) => Ok(map.write().await.remove(&id).is_some()),
            LeadStore::Postgres(pool) => {
                let result = sqlx::query("DELETE FROM leads WHERE id = $1")
                    .bind(id)
                    .execute(pool)
                    .await
                    .with_context(|| format!("deleting lead {}", id))?;
                Ok(result.rows_affected() > 0)
            }
        }
    }
}
