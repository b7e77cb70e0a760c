pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::drink::{Drink, DrinkLong, DrinkPatch, DrinkShort, NewDrink};

/// Failure kinds a store operation can report. Handlers map these to HTTP
/// statuses; nothing here is retried.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("drink {0} not found")]
    NotFound(i32),

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("recipe serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Width of the `drinks.title` column, in characters.
pub const TITLE_MAX_CHARS: usize = 80;

/// Abstraction over drink persistence.
/// Implementations: PgStore (PostgreSQL), MemoryStore (tests / local runs).
///
/// Every method is a single-record, single-statement change; the backend's
/// own isolation is all the consistency we ask for.
#[async_trait]
pub trait DrinkStore: Send + Sync {
    /// All drinks ordered by id.
    async fn all(&self) -> Result<Vec<Drink>, StoreError>;

    async fn insert(&self, drink: &NewDrink) -> Result<Drink, StoreError>;

    /// Apply a partial update. Fields left `None` keep their stored value.
    async fn modify(&self, id: i32, patch: &DrinkPatch) -> Result<Drink, StoreError>;

    /// Remove a drink, returning its id.
    async fn remove(&self, id: i32) -> Result<i32, StoreError>;

    /// Empty the table, restart id numbering and seed the default drink.
    async fn reset(&self) -> Result<(), StoreError>;

    async fn list_short(&self) -> Result<Vec<DrinkShort>, StoreError> {
        Ok(self.all().await?.iter().map(Drink::short).collect())
    }

    async fn list_long(&self) -> Result<Vec<DrinkLong>, StoreError> {
        Ok(self.all().await?.iter().map(Drink::long).collect())
    }

    async fn create(&self, drink: &NewDrink) -> Result<DrinkLong, StoreError> {
        Ok(self.insert(drink).await?.long())
    }

    async fn update(&self, id: i32, patch: &DrinkPatch) -> Result<DrinkLong, StoreError> {
        Ok(self.modify(id, patch).await?.long())
    }

    async fn delete(&self, id: i32) -> Result<i32, StoreError> {
        self.remove(id).await
    }
}

/// The drink present after a reset.
pub fn seed_drink() -> NewDrink {
    use crate::models::drink::{Ingredient, Recipe};

    NewDrink {
        title: "water".to_string(),
        recipe: Recipe(vec![Ingredient {
            name: "water".to_string(),
            color: "blue".to_string(),
            parts: 1,
        }]),
    }
}
