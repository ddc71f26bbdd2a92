use crate::{
    handlers::common::AdminActor,
    handlers::returns::ReturnSummary,
    services::returns::InitiateRefundInput,
    ApiResponse, ApiResult, AppState,
};
use axum::{extract::State, response::Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// `POST /refunds/admin` — explicit side-effect trigger once a request has
/// reached `inspection_passed`. The refund record is created through the
/// payment collaborator before the status commits.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRefundRequest {
    pub return_id: Uuid,
    pub amount: Decimal,
    pub method: Option<String>,
    pub notes: Option<String>,
    /// Marks a partial settlement; the request lands in `refund_partial`.
    #[serde(default)]
    pub partial: bool,
}

pub async fn create_refund(
    State(state): State<AppState>,
    AdminActor(actor): AdminActor,
    Json(payload): Json<CreateRefundRequest>,
) -> ApiResult<ReturnSummary> {
    let input = InitiateRefundInput {
        return_id: payload.return_id,
        amount: payload.amount,
        method: payload.method,
        notes: payload.notes,
        partial: payload.partial,
    };
    let updated = state.return_service().initiate_refund(actor, input).await?;
    Ok(Json(ApiResponse::success(ReturnSummary::from(updated))))
}
