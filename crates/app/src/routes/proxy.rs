//! App proxy handlers, reached from the storefront through
//! `https://<shop>/apps/form/...`.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::instrument;

use shopiform_core::{FormCode, FormId, ShopDomain};

use crate::db::{FormRepository, SessionRepository};
use crate::error::AppError;
use crate::models::FormField;
use crate::services::submission::{
    Reconciler, SubmissionError, SubmissionOutcome, SubmissionRequest,
};
use crate::state::AppState;

/// Public view of a form.
#[derive(Debug, Serialize)]
pub struct PublicForm {
    pub id: FormId,
    pub code: FormCode,
    pub title: String,
    pub description: Option<String>,
    pub fields: Vec<FormField>,
    pub shop: ShopDomain,
}

/// Look a form up by its public code.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<PublicForm>, AppError> {
    let not_found = || AppError::NotFound("Form".to_string());
    let code = FormCode::parse(code.trim()).map_err(|_| not_found())?;

    let form = FormRepository::new(state.pool())
        .find_by_code(&code)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(PublicForm {
        id: form.id,
        code: form.code,
        title: form.title,
        description: form.description,
        fields: form.fields,
        shop: form.shop,
    }))
}

/// Accept a storefront submission and reconcile it into Shopify records.
pub async fn submit(
    State(state): State<AppState>,
    SubmittedFields(fields): SubmittedFields,
) -> Result<SubmissionOutcome, SubmissionError> {
    let pool = state.pool();
    let reconciler = Reconciler::new(
        FormRepository::new(pool),
        SessionRepository::new(pool),
        state.admin().clone(),
    );

    reconciler
        .submit(SubmissionRequest::from_fields(fields))
        .await
}

/// Posted form values as a flat map, from a multipart or urlencoded body.
///
/// When a key repeats, the first value wins. File parts are ignored.
#[derive(Debug, Default)]
pub struct SubmittedFields(pub HashMap<String, String>);

impl<S> FromRequest<S> for SubmittedFields
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            return read_multipart(multipart)
                .await
                .map(Self)
                .map_err(IntoResponse::into_response);
        }

        let body = axum::body::Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        Ok(Self(parse_urlencoded(&body)))
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<HashMap<String, String>, AppError> {
    let mut fields = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed form data: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if field.file_name().is_some() {
            continue;
        }
        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(format!("Malformed form data: {e}")))?;
        fields.entry(name).or_insert(value);
    }

    Ok(fields)
}

fn parse_urlencoded(body: &[u8]) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(body).into_owned() {
        fields.entry(key).or_insert(value);
    }
    fields
}
