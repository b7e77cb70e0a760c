use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::middleware::oidc::Claims;
use crate::models::drink::{DrinkLong, DrinkPatch, DrinkShort, NewDrink, Recipe};
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct CreateDrinkRequest {
    pub title: String,
    pub recipe: Recipe,
}

#[derive(Deserialize)]
pub struct UpdateDrinkRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub recipe: Option<Recipe>,
}

#[derive(Serialize)]
pub struct DrinksResponse<T> {
    pub success: bool,
    pub drinks: T,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub delete: i32,
}

fn ok<T>(drinks: T) -> Json<DrinksResponse<T>> {
    Json(DrinksResponse {
        success: true,
        drinks,
    })
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::Unprocessable(e.body_text()))
}

/// Non-integer ids simply do not name a drink.
fn drink_id(id: Result<Path<i32>, PathRejection>) -> Result<i32, AppError> {
    id.map(|Path(id)| id).map_err(|_| AppError::NotFound)
}

fn subject(claims: &Claims) -> &str {
    claims.sub.as_deref().unwrap_or("unknown")
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /drinks: public listing, ingredient names omitted
pub async fn list_drinks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DrinksResponse<Vec<DrinkShort>>>, AppError> {
    let drinks = state.store.list_short().await?;
    Ok(ok(drinks))
}

/// GET /drinks-detail: full recipes
pub async fn list_drinks_detail(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DrinksResponse<Vec<DrinkLong>>>, AppError> {
    let drinks = state.store.list_long().await?;
    Ok(ok(drinks))
}

/// POST /drinks
pub async fn create_drink(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateDrinkRequest>, JsonRejection>,
) -> Result<Json<DrinksResponse<DrinkLong>>, AppError> {
    let req = body(payload)?;
    let drink = state
        .store
        .create(&NewDrink {
            title: req.title,
            recipe: req.recipe,
        })
        .await?;

    tracing::info!(drink_id = drink.id, sub = subject(&claims), "drink created");
    Ok(ok(drink))
}

/// PATCH /drinks/:id: fields left out of the body keep their values
pub async fn update_drink(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<UpdateDrinkRequest>, JsonRejection>,
) -> Result<Json<DrinksResponse<DrinkLong>>, AppError> {
    let id = drink_id(id)?;
    let req = body(payload)?;
    let patch = DrinkPatch {
        title: req.title,
        recipe: req.recipe,
    };
    let drink = state.store.update(id, &patch).await?;

    tracing::info!(drink_id = id, sub = subject(&claims), "drink updated");
    Ok(ok(drink))
}

/// DELETE /drinks/:id
pub async fn delete_drink(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<DeleteResponse>, AppError> {
    let id = drink_id(id)?;
    let deleted = state.store.delete(id).await?;

    tracing::info!(drink_id = deleted, sub = subject(&claims), "drink deleted");
    Ok(Json(DeleteResponse {
        success: true,
        delete: deleted,
    }))
}
