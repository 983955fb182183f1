use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::time::Duration;

use crate::models::{AgentConfig, NewListing, StoredListing};
use crate::services::store::{Store, StoreError};

const LISTING_COLUMNS: &str = r#"
    id, agent_id, source, external_id, url, title, price, mileage, year,
    make, model, raw_json, first_seen, last_seen, alerted, match_score
"#;

/// PostgreSQL-backed store for agents and matched listings
///
/// The `listings.external_id` UNIQUE constraint is the authoritative guard
/// against double inserts, even when two runs race past the existence check.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new store from a connection string and run migrations
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new store from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, StoreError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }
}

fn row_to_listing(row: &PgRow) -> Result<StoredListing, StoreError> {
    let mileage: Option<i64> = row.try_get("mileage")?;
    let raw_json: Json<serde_json::Value> = row.try_get("raw_json")?;

    Ok(StoredListing {
        id: row.try_get("id")?,
        agent_id: row.try_get("agent_id")?,
        source: row.try_get("source")?,
        external_id: row.try_get("external_id")?,
        url: row.try_get("url")?,
        title: row.try_get("title")?,
        price: row.try_get("price")?,
        mileage: mileage.and_then(|m| u32::try_from(m).ok()),
        year: row.try_get("year")?,
        make: row.try_get("make")?,
        model: row.try_get("model")?,
        raw_json: raw_json.0,
        first_seen: row.try_get("first_seen")?,
        last_seen: row.try_get("last_seen")?,
        alerted: row.try_get("alerted")?,
        match_score: row.try_get("match_score")?,
    })
}

#[async_trait]
impl Store for PostgresStore {
    async fn upsert_agents(&self, agents: &[AgentConfig]) -> Result<(), StoreError> {
        let query = r#"
            INSERT INTO agents (id, name, enabled, config_json)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id)
            DO UPDATE SET
                name = EXCLUDED.name,
                enabled = EXCLUDED.enabled,
                config_json = EXCLUDED.config_json
        "#;

        let mut tx = self.pool.begin().await?;
        for agent in agents {
            let config_json = serde_json::to_value(agent)?;
            sqlx::query(query)
                .bind(&agent.id)
                .bind(&agent.name)
                .bind(agent.enabled)
                .bind(Json(config_json))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        tracing::info!("Synced {} agents to PostgreSQL", agents.len());
        Ok(())
    }

    async fn enabled_agents(&self) -> Result<Vec<AgentConfig>, StoreError> {
        let query = r#"
            SELECT config_json
            FROM agents
            WHERE enabled = TRUE
            ORDER BY id
        "#;

        let rows = sqlx::query(query).fetch_all(&self.pool).await?;

        let mut agents = Vec::with_capacity(rows.len());
        for row in &rows {
            let Json(config): Json<serde_json::Value> = row.try_get("config_json")?;
            match serde_json::from_value::<AgentConfig>(config) {
                Ok(agent) => agents.push(agent),
                // One broken stored profile must not stop the others
                Err(e) => tracing::error!("Skipping agent with invalid stored config: {}", e),
            }
        }

        Ok(agents)
    }

    async fn agent(&self, agent_id: &str) -> Result<Option<AgentConfig>, StoreError> {
        let query = r#"
            SELECT config_json, enabled
            FROM agents
            WHERE id = $1
        "#;

        let Some(row) = sqlx::query(query)
            .bind(agent_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let Json(config): Json<serde_json::Value> = row.try_get("config_json")?;
        let mut agent: AgentConfig = serde_json::from_value(config)?;
        agent.enabled = row.try_get("enabled")?;
        Ok(Some(agent))
    }

    async fn exists(&self, external_id: &str) -> Result<bool, StoreError> {
        let query = r#"
            SELECT EXISTS(SELECT 1 FROM listings WHERE external_id = $1) AS found
        "#;

        let row = sqlx::query(query)
            .bind(external_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get("found")?)
    }

    /// Insert a listing; a conflicting `external_id` surfaces as `Duplicate`
    async fn insert_listing(&self, new: &NewListing) -> Result<StoredListing, StoreError> {
        let query = format!(
            r#"
            INSERT INTO listings (
                agent_id, source, external_id, url, title, price, mileage, year,
                make, model, raw_json, match_score
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (external_id) DO NOTHING
            RETURNING {}
            "#,
            LISTING_COLUMNS
        );

        let listing = &new.listing;
        let result = sqlx::query(&query)
            .bind(&new.agent_id)
            .bind(&listing.source)
            .bind(&listing.external_id)
            .bind(&listing.url)
            .bind(&listing.title)
            .bind(listing.price)
            .bind(listing.mileage.map(i64::from))
            .bind(listing.year)
            .bind(&listing.make)
            .bind(&listing.model)
            .bind(Json(&listing.raw))
            .bind(new.match_score)
            .fetch_optional(&self.pool)
            .await;

        match result {
            Ok(Some(row)) => {
                tracing::debug!("Inserted listing {} for agent {}", listing.external_id, new.agent_id);
                row_to_listing(&row)
            }
            Ok(None) => Err(StoreError::Duplicate(listing.external_id.clone())),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Duplicate(listing.external_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn touch(&self, external_id: &str) -> Result<(), StoreError> {
        let query = r#"
            UPDATE listings
            SET last_seen = NOW()
            WHERE external_id = $1
        "#;

        let result = sqlx::query(query)
            .bind(external_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(external_id.to_string()));
        }
        Ok(())
    }

    async fn mark_alerted(&self, ids: &[i64]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }

        let query = r#"
            UPDATE listings
            SET alerted = TRUE
            WHERE id = ANY($1)
        "#;

        let result = sqlx::query(query).bind(ids).execute(&self.pool).await?;

        tracing::debug!("Marked {} listings as alerted", result.rows_affected());
        Ok(())
    }

    async fn listings_for_agent(
        &self,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredListing>, StoreError> {
        let query = format!(
            r#"
            SELECT {}
            FROM listings
            WHERE agent_id = $1
            ORDER BY last_seen DESC, id DESC
            LIMIT $2
            "#,
            LISTING_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(agent_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_listing).collect()
    }

    /// Health check for the database connection
    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}
