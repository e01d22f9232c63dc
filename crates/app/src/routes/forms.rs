//! Form builder API.
//!
//! Every handler takes an [`AuthenticatedShop`], so a shop only ever sees and
//! changes its own forms. A form owned by another shop answers 404.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::instrument;

use shopiform_core::FormId;

use crate::db::FormRepository;
use crate::error::AppError;
use crate::middleware::AuthenticatedShop;
use crate::models::{Form, FormInput, FormSummary};
use crate::state::AppState;

/// List the shop's forms, newest first.
#[instrument(skip_all, fields(shop = %shop))]
pub async fn index(
    State(state): State<AppState>,
    AuthenticatedShop(shop): AuthenticatedShop,
) -> Result<Json<Vec<FormSummary>>, AppError> {
    let forms = FormRepository::new(state.pool()).list_by_shop(&shop).await?;
    Ok(Json(forms))
}

/// Create a form. Its code is generated here and never changes.
#[instrument(skip_all, fields(shop = %shop))]
pub async fn create(
    State(state): State<AppState>,
    AuthenticatedShop(shop): AuthenticatedShop,
    Json(input): Json<FormInput>,
) -> Result<impl IntoResponse, AppError> {
    let draft = input.into_draft()?;
    let mut rng = StdRng::from_os_rng();

    let form = FormRepository::new(state.pool())
        .create(&shop, &draft, &mut rng)
        .await?;

    Ok((StatusCode::CREATED, Json(form)))
}

/// Get one form with its fields.
#[instrument(skip_all, fields(shop = %shop, form_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    AuthenticatedShop(shop): AuthenticatedShop,
    Path(id): Path<FormId>,
) -> Result<Json<Form>, AppError> {
    FormRepository::new(state.pool())
        .get_for_shop(id, &shop)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Form".to_string()))
}

/// Update title and description and replace the field list.
#[instrument(skip_all, fields(shop = %shop, form_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    AuthenticatedShop(shop): AuthenticatedShop,
    Path(id): Path<FormId>,
    Json(input): Json<FormInput>,
) -> Result<Json<Form>, AppError> {
    let draft = input.into_draft()?;

    let form = FormRepository::new(state.pool())
        .update(id, &shop, &draft)
        .await?
        .ok_or_else(|| AppError::NotFound("Form".to_string()))?;

    tracing::info!(fields = form.fields.len(), "form updated");
    Ok(Json(form))
}

/// Delete a form and its fields.
#[instrument(skip_all, fields(shop = %shop, form_id = %id))]
pub async fn destroy(
    State(state): State<AppState>,
    AuthenticatedShop(shop): AuthenticatedShop,
    Path(id): Path<FormId>,
) -> Result<StatusCode, AppError> {
    if FormRepository::new(state.pool()).delete(id, &shop).await? {
        tracing::info!("form deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Form".to_string()))
    }
}
