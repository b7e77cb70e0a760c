//! In-process drink store.
//!
//! Recipes are kept in their serialized form, exactly as the relational
//! backend keeps them, so reads exercise the same parse path. The title
//! constraints of the `drinks` table (unique, at most 80 characters) are
//! enforced here too.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{seed_drink, DrinkStore, StoreError, TITLE_MAX_CHARS};
use crate::models::drink::{Drink, DrinkPatch, NewDrink, Recipe};

#[derive(Debug, Clone)]
struct StoredDrink {
    title: String,
    recipe: String,
}

#[derive(Default)]
struct Table {
    rows: BTreeMap<i32, StoredDrink>,
    next_id: i32,
}

impl Table {
    fn check_title(&self, title: &str, except: Option<i32>) -> Result<(), StoreError> {
        if title.chars().count() > TITLE_MAX_CHARS {
            return Err(StoreError::Constraint(format!(
                "title longer than {} characters",
                TITLE_MAX_CHARS
            )));
        }
        let taken = self
            .rows
            .iter()
            .any(|(id, row)| row.title == title && Some(*id) != except);
        if taken {
            return Err(StoreError::Constraint(format!("duplicate title '{}'", title)));
        }
        Ok(())
    }

    fn load(id: i32, row: &StoredDrink) -> Result<Drink, StoreError> {
        Ok(Drink {
            id,
            title: row.title.clone(),
            recipe: Recipe::from_stored(&row.recipe)?,
        })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    table: RwLock<Table>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DrinkStore for MemoryStore {
    async fn all(&self) -> Result<Vec<Drink>, StoreError> {
        let table = self.table.read().await;
        table
            .rows
            .iter()
            .map(|(id, row)| Table::load(*id, row))
            .collect()
    }

    async fn insert(&self, drink: &NewDrink) -> Result<Drink, StoreError> {
        let recipe = drink.recipe.to_stored()?;
        let mut table = self.table.write().await;
        table.check_title(&drink.title, None)?;

        table.next_id += 1;
        let id = table.next_id;
        let row = StoredDrink {
            title: drink.title.clone(),
            recipe,
        };
        let loaded = Table::load(id, &row)?;
        table.rows.insert(id, row);
        Ok(loaded)
    }

    async fn modify(&self, id: i32, patch: &DrinkPatch) -> Result<Drink, StoreError> {
        let recipe = patch.recipe.as_ref().map(Recipe::to_stored).transpose()?;
        let mut table = self.table.write().await;
        if !table.rows.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        if let Some(title) = &patch.title {
            table.check_title(title, Some(id))?;
        }

        let row = table.rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if let Some(title) = &patch.title {
            row.title = title.clone();
        }
        if let Some(recipe) = recipe {
            row.recipe = recipe;
        }
        Table::load(id, row)
    }

    async fn remove(&self, id: i32) -> Result<i32, StoreError> {
        let mut table = self.table.write().await;
        table
            .rows
            .remove(&id)
            .map(|_| id)
            .ok_or(StoreError::NotFound(id))
    }

    async fn reset(&self) -> Result<(), StoreError> {
        {
            let mut table = self.table.write().await;
            *table = Table::default();
        }
        self.insert(&seed_drink()).await?;
        Ok(())
    }
}
