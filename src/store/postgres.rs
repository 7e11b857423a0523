//! PostgreSQL-backed resource store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::error::{ResmanError, Result};
use crate::model::{Actor, Resource, ResourceCategory, ResourceChanges, RevisionToken};
use crate::store::ResourceStore;

/// Production store backed by PostgreSQL.
///
/// The conditional update is a single `UPDATE ... WHERE id AND version`
/// statement, so the compare-and-swap on the revision token is atomic with
/// the write at the database level.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new connection pool.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Run embedded migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ResmanError::internal(format!("Migration failed: {}", e)))?;
        Ok(())
    }
}

const SELECT_COLUMNS: &str = r#"
    id, name, description, location, category,
    created_at, last_updated_at, created_by, last_updated_by, version
"#;

#[async_trait]
impl ResourceStore for PgStore {
    async fn get(&self, id: Uuid) -> Result<Option<Resource>> {
        let row = sqlx::query_as::<_, ResourceRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM resources WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Resource::try_from).transpose()
    }

    async fn get_all(&self) -> Result<Vec<Resource>> {
        let rows = sqlx::query_as::<_, ResourceRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM resources ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Resource::try_from).collect()
    }

    async fn insert(&self, resource: &Resource) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO resources (id, name, description, location, category,
                                   created_at, last_updated_at, created_by, last_updated_by, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(resource.id)
        .bind(&resource.name)
        .bind(&resource.description)
        .bind(&resource.location)
        .bind(resource.category.as_str())
        .bind(resource.created_at)
        .bind(resource.last_updated_at)
        .bind(resource.created_by)
        .bind(resource.last_updated_by)
        .bind(resource.version.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        changes: &ResourceChanges,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Resource> {
        let new_version = RevisionToken::fresh();

        let row = sqlx::query_as::<_, ResourceRow>(&format!(
            r#"
            UPDATE resources
            SET name = $3,
                description = $4,
                location = $5,
                category = $6,
                last_updated_at = $7,
                last_updated_by = $8,
                version = $9
            WHERE id = $1 AND version = $2
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.expected_version.0)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(&changes.location)
        .bind(changes.category.as_str())
        .bind(now)
        .bind(actor.id)
        .bind(new_version.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Resource::try_from(row),
            // Zero rows means either the record vanished or the token is
            // stale; a follow-up existence probe tells the two apart.
            None => {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM resources WHERE id = $1)")
                        .bind(id)
                        .fetch_one(&self.pool)
                        .await?;

                if exists {
                    Err(ResmanError::version_conflict(id))
                } else {
                    Err(ResmanError::not_found(id))
                }
            }
        }
    }

    async fn delete(&self, id: Uuid) -> Result<Resource> {
        let row = sqlx::query_as::<_, ResourceRow>(&format!(
            "DELETE FROM resources WHERE id = $1 RETURNING {SELECT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Resource::try_from(row),
            None => Err(ResmanError::not_found(id)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Row Type
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
struct ResourceRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    location: Option<String>,
    category: String,
    created_at: DateTime<Utc>,
    last_updated_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    last_updated_by: Option<Uuid>,
    version: Uuid,
}

impl TryFrom<ResourceRow> for Resource {
    type Error = ResmanError;

    fn try_from(row: ResourceRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            location: row.location,
            category: ResourceCategory::parse(&row.category)?,
            created_at: row.created_at,
            last_updated_at: row.last_updated_at,
            created_by: row.created_by,
            last_updated_by: row.last_updated_by,
            version: RevisionToken(row.version),
        })
    }
}
