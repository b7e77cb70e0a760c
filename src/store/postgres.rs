use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::{seed_drink, DrinkStore, StoreError};
use crate::models::drink::{Drink, DrinkPatch, NewDrink, Recipe};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DrinkRow {
    id: i32,
    title: String,
    recipe: String,
}

impl TryFrom<DrinkRow> for Drink {
    type Error = StoreError;

    fn try_from(row: DrinkRow) -> Result<Self, Self::Error> {
        let recipe = Recipe::from_stored(&row.recipe).map_err(|e| {
            tracing::error!(drink_id = row.id, "stored recipe is not valid JSON: {}", e);
            StoreError::Serialization(e)
        })?;
        Ok(Drink {
            id: row.id,
            title: row.title,
            recipe,
        })
    }
}

const STRING_DATA_RIGHT_TRUNCATION: &str = "22001";

/// Separate constraint violations from other database failures so they can be
/// logged for what they are. Both end up as `unprocessable` for the caller.
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation()
            || db_err.is_check_violation()
            || db_err.is_foreign_key_violation()
            || db_err.code().as_deref() == Some(STRING_DATA_RIGHT_TRUNCATION)
        {
            return StoreError::Constraint(db_err.message().to_string());
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl DrinkStore for PgStore {
    async fn all(&self) -> Result<Vec<Drink>, StoreError> {
        let rows =
            sqlx::query_as::<_, DrinkRow>("SELECT id, title, recipe FROM drinks ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(classify)?;

        rows.into_iter().map(Drink::try_from).collect()
    }

    async fn insert(&self, drink: &NewDrink) -> Result<Drink, StoreError> {
        let recipe = drink.recipe.to_stored()?;
        let row = sqlx::query_as::<_, DrinkRow>(
            "INSERT INTO drinks (title, recipe) VALUES ($1, $2) RETURNING id, title, recipe",
        )
        .bind(&drink.title)
        .bind(recipe)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        Drink::try_from(row)
    }

    async fn modify(&self, id: i32, patch: &DrinkPatch) -> Result<Drink, StoreError> {
        let recipe = patch.recipe.as_ref().map(Recipe::to_stored).transpose()?;
        let row = sqlx::query_as::<_, DrinkRow>(
            r#"UPDATE drinks
               SET title = COALESCE($2, title), recipe = COALESCE($3, recipe)
               WHERE id = $1
               RETURNING id, title, recipe"#,
        )
        .bind(id)
        .bind(patch.title.as_deref())
        .bind(recipe)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;

        row.ok_or(StoreError::NotFound(id)).and_then(Drink::try_from)
    }

    async fn remove(&self, id: i32) -> Result<i32, StoreError> {
        let deleted = sqlx::query_scalar::<_, i32>("DELETE FROM drinks WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        deleted.ok_or(StoreError::NotFound(id))
    }

    async fn reset(&self) -> Result<(), StoreError> {
        sqlx::query("TRUNCATE TABLE drinks RESTART IDENTITY")
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        self.insert(&seed_drink()).await?;
        Ok(())
    }
}
