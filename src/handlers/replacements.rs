use crate::{
    handlers::common::AdminActor,
    handlers::returns::ReturnSummary,
    ApiResponse, ApiResult, AppState,
};
use axum::{extract::State, response::Json};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// `POST /replacements/admin` — explicit side-effect trigger once a request
/// has reached `inspection_passed`. The replacement order is created through
/// the order collaborator before the status commits.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReplacementRequest {
    pub return_id: Uuid,
    pub notes: Option<String>,
}

pub async fn create_replacement(
    State(state): State<AppState>,
    AdminActor(actor): AdminActor,
    Json(payload): Json<CreateReplacementRequest>,
) -> ApiResult<ReturnSummary> {
    let updated = state
        .return_service()
        .create_replacement(actor, payload.return_id, payload.notes)
        .await?;
    Ok(Json(ApiResponse::success(ReturnSummary::from(updated))))
}
