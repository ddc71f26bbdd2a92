use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "RMA API",
        version = "0.1.0",
        description = r#"
# Return / Refund / Replacement Lifecycle API

Validates state transitions on customer return requests, triggers
compensating financial and logistics actions through collaborator services,
and maintains an immutable activity timeline per request.

## Actors

Every mutating call runs on behalf of an explicit actor. The upstream gateway
authenticates the caller and forwards identity as headers:
- `X-Admin-Id` / `X-Admin-Role` for staff calls (`agent`, `manager`, `system`)
- `X-User-Id` for storefront customer calls

## Concurrency

Transitions on the same return request are serialized by an optimistic
version check; a losing concurrent writer receives HTTP 409 and should
re-fetch before retrying. A 502 means a collaborator call failed before
anything was persisted, so the same transition is safe to retry.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080/api/v1", description = "Local development")
    ),
    tags(
        (name = "Returns", description = "Return request lifecycle endpoints"),
        (name = "Refunds", description = "Refund side-effect trigger"),
        (name = "Replacements", description = "Replacement side-effect trigger")
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::state_machine::ReturnStatus,
        crate::state_machine::ActorRole,
        crate::entities::return_request::ReasonCode,
        crate::entities::return_request::RequestedAction,
        crate::entities::return_item::ItemCondition,
        crate::entities::return_event::EventType,
        crate::handlers::returns::ReturnSummary,
        crate::handlers::returns::CreateReturnRequest,
        crate::handlers::returns::CreateReturnItemRequest,
        crate::handlers::returns::ApproveReturnRequest,
        crate::handlers::returns::RejectReturnRequest,
        crate::handlers::returns::UpdateStatusRequest,
        crate::handlers::returns::AddNoteRequest,
        crate::handlers::refunds::CreateRefundRequest,
        crate::handlers::replacements::CreateReplacementRequest,
        crate::services::returns::ReturnDetail,
        crate::services::returns::RefundLink,
        crate::services::returns::ReplacementLink,
        crate::services::returns::ReturnStats,
        crate::services::returns::StatusCount,
    ))
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
