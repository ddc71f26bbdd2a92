use crate::{
    entities::return_item::ItemCondition,
    entities::return_request::{self, ReasonCode, RequestedAction},
    errors::ServiceError,
    handlers::common::{AdminActor, CustomerActor},
    repositories::returns::{NewReturnItem, ReturnListFilter},
    services::returns::{ApproveInput, CreateReturnInput, ReturnDetail, ReturnStats},
    state_machine::ReturnStatus,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct ReturnListQuery {
    /// Page number (1-indexed)
    pub page: Option<u64>,
    /// Page size (max 100)
    pub limit: Option<u64>,
    /// Optional status filter
    pub status: Option<String>,
    /// Substring match over return number and reason text
    pub search: Option<String>,
    /// Lower bound on creation time (RFC 3339)
    pub created_from: Option<DateTime<Utc>>,
    /// Upper bound on creation time (RFC 3339)
    pub created_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReturnSummary {
    pub id: Uuid,
    pub return_number: String,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub status: ReturnStatus,
    pub reason_code: ReasonCode,
    pub requested_action: RequestedAction,
    pub refund_id: Option<Uuid>,
    pub replacement_order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<return_request::Model> for ReturnSummary {
    fn from(model: return_request::Model) -> Self {
        Self {
            id: model.id,
            return_number: model.return_number,
            order_id: model.order_id,
            user_id: model.user_id,
            status: model.status,
            reason_code: model.reason_code,
            requested_action: model.requested_action,
            refund_id: model.refund_id,
            replacement_order_id: model.replacement_order_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Admin list payload: the filtered page plus the aggregate status counts the
/// dashboard header renders.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReturnListResponse {
    #[serde(flatten)]
    pub page: PaginatedResponse<ReturnSummary>,
    pub stats: ReturnStats,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReturnItemRequest {
    pub order_item_id: Uuid,
    #[validate(length(min = 1, message = "SKU cannot be empty"))]
    pub sku: String,
    #[validate(length(min = 1, message = "Product name cannot be empty"))]
    pub product_name: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub condition: ItemCondition,
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReturnRequest {
    pub order_id: Uuid,
    pub reason_code: ReasonCode,
    #[validate(length(max = 1000, message = "Reason text too long"))]
    pub reason_text: Option<String>,
    pub requested_action: RequestedAction,
    pub pickup_address: Option<String>,
    #[validate]
    pub items: Vec<CreateReturnItemRequest>,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct ApproveReturnRequest {
    pub notes: Option<String>,
    /// Scheduled pickup date; required unless `customer_ships` is set.
    pub pickup_scheduled: Option<DateTime<Utc>>,
    pub pickup_carrier: Option<String>,
    #[serde(default)]
    pub customer_ships: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RejectReturnRequest {
    #[validate(length(min = 1, message = "Rejection notes are required"))]
    pub notes: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub new_status: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddNoteRequest {
    #[validate(length(min = 1, message = "Note text is required"))]
    pub notes: String,
}

/// `GET /returns/admin` — filtered, paginated list plus summary stats.
pub async fn list_returns(
    State(state): State<AppState>,
    _actor: AdminActor,
    Query(query): Query<ReturnListQuery>,
) -> ApiResult<ReturnListResponse> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let status = query
        .status
        .as_deref()
        .map(ReturnStatus::from_str)
        .transpose()?;

    let filter = ReturnListFilter {
        status,
        search: query.search,
        created_from: query.created_from,
        created_to: query.created_to,
    };

    let (records, total) = state.return_service().list(&filter, page, limit).await?;
    let stats = state.return_service().get_stats().await?;

    let items: Vec<ReturnSummary> = records.into_iter().map(ReturnSummary::from).collect();
    let total_pages = (total + limit - 1) / limit;

    Ok(Json(ApiResponse::success(ReturnListResponse {
        page: PaginatedResponse {
            items,
            total,
            page,
            limit,
            total_pages,
        },
        stats,
    })))
}

/// `GET /returns/admin/stats`
pub async fn get_return_stats(
    State(state): State<AppState>,
    _actor: AdminActor,
) -> ApiResult<ReturnStats> {
    let stats = state.return_service().get_stats().await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// `GET /returns/admin/by-number/{return_number}`
pub async fn get_return_by_number(
    State(state): State<AppState>,
    AdminActor(actor): AdminActor,
    Path(return_number): Path<String>,
) -> ApiResult<ReturnDetail> {
    let service = state.return_service();
    let request = service
        .get_by_return_number(&return_number)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Return {} not found", return_number)))?;
    let detail = service.get_detail(actor.role, request.id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// `GET /returns/admin/{id}` — full detail with timeline, linked refund /
/// replacement snapshots, and the transitions available to the caller's role.
pub async fn get_return_detail(
    State(state): State<AppState>,
    AdminActor(actor): AdminActor,
    Path(id): Path<Uuid>,
) -> ApiResult<ReturnDetail> {
    let detail = state.return_service().get_detail(actor.role, id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// `POST /returns` — customer-facing creation from the storefront client.
pub async fn create_return(
    State(state): State<AppState>,
    CustomerActor(actor): CustomerActor,
    Json(payload): Json<CreateReturnRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReturnSummary>>), ServiceError> {
    payload.validate()?;

    let input = CreateReturnInput {
        order_id: payload.order_id,
        reason_code: payload.reason_code,
        reason_text: payload.reason_text,
        requested_action: payload.requested_action,
        pickup_address: payload.pickup_address,
        items: payload
            .items
            .into_iter()
            .map(|item| NewReturnItem {
                order_item_id: item.order_item_id,
                sku: item.sku,
                product_name: item.product_name,
                quantity: item.quantity,
                condition: item.condition,
                unit_price: item.unit_price,
            })
            .collect(),
    };

    let created = state.return_service().create_return(actor, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(ReturnSummary::from(created))),
    ))
}

/// `PUT /returns/admin/{id}/approve`
pub async fn approve_return(
    State(state): State<AppState>,
    AdminActor(actor): AdminActor,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApproveReturnRequest>,
) -> ApiResult<ReturnSummary> {
    let input = ApproveInput {
        notes: payload.notes,
        pickup_scheduled: payload.pickup_scheduled,
        pickup_carrier: payload.pickup_carrier,
        customer_ships: payload.customer_ships,
    };
    let updated = state.return_service().approve(actor, id, input).await?;
    Ok(Json(ApiResponse::success(ReturnSummary::from(updated))))
}

/// `PUT /returns/admin/{id}/reject` — notes are mandatory.
pub async fn reject_return(
    State(state): State<AppState>,
    AdminActor(actor): AdminActor,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectReturnRequest>,
) -> ApiResult<ReturnSummary> {
    payload.validate()?;
    let updated = state
        .return_service()
        .reject(actor, id, Some(payload.notes))
        .await?;
    Ok(Json(ApiResponse::success(ReturnSummary::from(updated))))
}

/// `PUT /returns/admin/{id}/status` — generic transition for the plain edges.
pub async fn update_return_status(
    State(state): State<AppState>,
    AdminActor(actor): AdminActor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> ApiResult<ReturnSummary> {
    let new_status = ReturnStatus::from_str(&payload.new_status)?;
    let updated = state
        .return_service()
        .update_status(actor, id, new_status, payload.notes)
        .await?;
    Ok(Json(ApiResponse::success(ReturnSummary::from(updated))))
}

/// `POST /returns/admin/{id}/notes` — append a manual timeline note.
pub async fn add_return_note(
    State(state): State<AppState>,
    AdminActor(actor): AdminActor,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddNoteRequest>,
) -> ApiResult<crate::entities::return_event::Model> {
    payload.validate()?;
    let event = state
        .return_service()
        .add_note(actor, id, payload.notes)
        .await?;
    Ok(Json(ApiResponse::success(event)))
}
