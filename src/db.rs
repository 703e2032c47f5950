use sqlx::{postgres::PgPoolOptions, PgPool};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS leads (
    id UUID PRIMARY KEY,
    dedup_key TEXT NOT NULL,
    organization_name TEXT NOT NULL,
    completeness_score SMALLINT NOT NULL,
    data JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const INDEXES: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS leads_dedup_key_idx ON leads (dedup_key)",
    "CREATE INDEX IF NOT EXISTS leads_score_idx ON leads (completeness_score DESC)",
];

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        ensure_schema(&pool).await?;

        Ok(Self { pool })
    }
}

/// Creates the `leads` table and its indexes if they are missing.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(SCHEMA).execute(pool).await?;
    for statement in INDEXES {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!("Lead schema ready");
    Ok(())
}
