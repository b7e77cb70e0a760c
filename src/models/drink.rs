//! Drink entity and its short/long projections.
//!
//! The recipe is persisted as serialized JSON text. Every read goes back
//! through [`Recipe::from_stored`] so a row that no longer parses surfaces
//! as an error instead of a half-built drink.

use serde::{Deserialize, Serialize};

/// One ingredient line of a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub color: String,
    pub parts: u32,
}

/// Ingredient without its name, as anonymous callers get to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngredientShort {
    pub color: String,
    pub parts: u32,
}

/// Ordered list of ingredients.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct Recipe(pub Vec<Ingredient>);

/// Clients may send either a list of ingredients or a single ingredient object.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecipeInput {
    Many(Vec<Ingredient>),
    One(Ingredient),
}

impl<'de> Deserialize<'de> for Recipe {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(match RecipeInput::deserialize(deserializer)? {
            RecipeInput::Many(items) => Recipe(items),
            RecipeInput::One(item) => Recipe(vec![item]),
        })
    }
}

impl Recipe {
    /// Serialize for storage in the `recipe` text column.
    pub fn to_stored(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    /// Parse the `recipe` text column.
    pub fn from_stored(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn short(&self) -> Vec<IngredientShort> {
        self.0
            .iter()
            .map(|i| IngredientShort {
                color: i.color.clone(),
                parts: i.parts,
            })
            .collect()
    }
}

/// A drink as held by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drink {
    pub id: i32,
    pub title: String,
    pub recipe: Recipe,
}

/// Public projection: ingredient names omitted.
#[derive(Debug, Clone, Serialize)]
pub struct DrinkShort {
    pub id: i32,
    pub title: String,
    pub recipe: Vec<IngredientShort>,
}

/// Full projection, only for callers holding `get:drinks-detail` or a write permission.
#[derive(Debug, Clone, Serialize)]
pub struct DrinkLong {
    pub id: i32,
    pub title: String,
    pub recipe: Recipe,
}

impl Drink {
    pub fn short(&self) -> DrinkShort {
        DrinkShort {
            id: self.id,
            title: self.title.clone(),
            recipe: self.recipe.short(),
        }
    }

    pub fn long(&self) -> DrinkLong {
        DrinkLong {
            id: self.id,
            title: self.title.clone(),
            recipe: self.recipe.clone(),
        }
    }
}

/// Fields for a new drink.
#[derive(Debug, Clone)]
pub struct NewDrink {
    pub title: String,
    pub recipe: Recipe,
}

/// Partial update: `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct DrinkPatch {
    pub title: Option<String>,
    pub recipe: Option<Recipe>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn water() -> Drink {
        Drink {
            id: 1,
            title: "Water".to_string(),
            recipe: Recipe(vec![Ingredient {
                name: "Water".to_string(),
                color: "blue".to_string(),
                parts: 1,
            }]),
        }
    }

    #[test]
    fn test_short_projection_drops_ingredient_names() {
        let value = serde_json::to_value(water().short()).unwrap();
        assert_eq!(
            value,
            json!({"id": 1, "title": "Water", "recipe": [{"color": "blue", "parts": 1}]})
        );
        assert!(value["recipe"][0].get("name").is_none());
    }

    #[test]
    fn test_long_projection_keeps_ingredient_names() {
        let value = serde_json::to_value(water().long()).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 1,
                "title": "Water",
                "recipe": [{"name": "Water", "color": "blue", "parts": 1}]
            })
        );
    }

    #[test]
    fn test_recipe_accepts_single_ingredient_object() {
        let recipe: Recipe =
            serde_json::from_value(json!({"name": "Milk", "color": "white", "parts": 2})).unwrap();
        assert_eq!(recipe.0.len(), 1);
        assert_eq!(recipe.0[0].name, "Milk");
    }

    #[test]
    fn test_recipe_rejects_incomplete_ingredient() {
        let result: Result<Recipe, _> = serde_json::from_value(json!([{"name": "Milk"}]));
        assert!(result.is_err());

        let result: Result<Recipe, _> = serde_json::from_value(json!("espresso"));
        assert!(result.is_err());
    }

    #[test]
    fn test_stored_form_round_trips_and_preserves_order() {
        let recipe = Recipe(vec![
            Ingredient { name: "espresso".into(), color: "brown".into(), parts: 1 },
            Ingredient { name: "milk".into(), color: "white".into(), parts: 3 },
        ]);
        let stored = recipe.to_stored().unwrap();
        assert_eq!(Recipe::from_stored(&stored).unwrap(), recipe);
    }

    #[test]
    fn test_corrupt_stored_recipe_is_an_error() {
        assert!(Recipe::from_stored("{not json").is_err());
    }
}
