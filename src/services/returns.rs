//! Return lifecycle service: composes the store, the transition validator,
//! and the collaborator interfaces behind the operations the admin and
//! storefront clients consume.
//!
//! Orchestration rule for side-effecting transitions: the collaborator call
//! happens first and must yield a durable reference; only then is the status
//! committed, together with that reference and the timeline event, under the
//! store's optimistic version check. A collaborator failure aborts the
//! transition with the request unchanged and nothing recorded.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::return_event::{self, EventType};
use crate::entities::return_item;
use crate::entities::return_request::{self, ReasonCode, RequestedAction};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::repositories::returns::{
    NewReturnItem, NewReturnRequest, ReturnListFilter, ReturnRequestStore, TimelineEntry,
    TransitionCommit,
};
use crate::services::collaborators::{
    CollaboratorError, OrderService, PaymentService, RbacService, ShippingService,
};
use crate::state_machine::{self, ActorRole, ReturnStatus, TransitionAction, TransitionPayload};

/// The caller on whose behalf an operation runs. Handlers build this from
/// gateway-authenticated headers; nothing in the engine reads ambient state.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

#[derive(Debug, Clone)]
pub struct CreateReturnInput {
    pub order_id: Uuid,
    pub reason_code: ReasonCode,
    pub reason_text: Option<String>,
    pub requested_action: RequestedAction,
    pub pickup_address: Option<String>,
    pub items: Vec<NewReturnItem>,
}

#[derive(Debug, Clone, Default)]
pub struct ApproveInput {
    pub notes: Option<String>,
    pub pickup_scheduled: Option<DateTime<Utc>>,
    pub pickup_carrier: Option<String>,
    pub customer_ships: bool,
}

#[derive(Debug, Clone)]
pub struct InitiateRefundInput {
    pub return_id: Uuid,
    pub amount: Decimal,
    pub method: Option<String>,
    pub notes: Option<String>,
    /// Marks the refund as a partial settlement; the request then lands in
    /// `refund_partial` instead of `refund_initiated`.
    pub partial: bool,
}

/// Denormalized snapshot of the linked refund, for display only.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefundLink {
    pub refund_id: Uuid,
    pub status: Option<String>,
    pub amount: Option<Decimal>,
}

/// Denormalized snapshot of the linked replacement order, for display only.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReplacementLink {
    pub replacement_order_id: Uuid,
    pub status: Option<String>,
}

/// Full detail payload for the admin client.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReturnDetail {
    pub request: return_request::Model,
    pub items: Vec<return_item::Model>,
    pub timeline: Vec<return_event::Model>,
    pub refund: Option<RefundLink>,
    pub replacement: Option<ReplacementLink>,
    pub available_transitions: Vec<ReturnStatus>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReturnStats {
    pub total: i64,
    pub by_status: Vec<StatusCount>,
}

/// Service for managing the return request lifecycle
#[derive(Clone)]
pub struct ReturnService {
    store: ReturnRequestStore,
    event_sender: Arc<EventSender>,
    payments: Arc<dyn PaymentService>,
    orders: Arc<dyn OrderService>,
    shipping: Arc<dyn ShippingService>,
    rbac: Arc<dyn RbacService>,
}

impl ReturnService {
    pub fn new(
        store: ReturnRequestStore,
        event_sender: Arc<EventSender>,
        payments: Arc<dyn PaymentService>,
        orders: Arc<dyn OrderService>,
        shipping: Arc<dyn ShippingService>,
        rbac: Arc<dyn RbacService>,
    ) -> Self {
        Self {
            store,
            event_sender,
            payments,
            orders,
            shipping,
            rbac,
        }
    }

    /// Creates a new return request in `pending` with its items and the
    /// opening timeline event.
    #[instrument(skip(self, input), fields(order_id = %input.order_id))]
    pub async fn create_return(
        &self,
        actor: Actor,
        input: CreateReturnInput,
    ) -> Result<return_request::Model, ServiceError> {
        if input.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "A return request needs at least one item".to_string(),
            ));
        }
        if input.items.iter().any(|item| item.quantity < 1) {
            return Err(ServiceError::ValidationError(
                "Item quantities must be at least 1".to_string(),
            ));
        }

        let draft = NewReturnRequest {
            order_id: input.order_id,
            user_id: actor.id,
            reason_code: input.reason_code,
            reason_text: input.reason_text,
            requested_action: input.requested_action,
            pickup_address: input.pickup_address,
        };

        let created = self
            .store
            .create(
                draft,
                input.items,
                TimelineEntry {
                    event_type: EventType::Created,
                    notes: None,
                    actor_id: actor.id,
                    actor_role: actor.role,
                },
            )
            .await?;

        self.emit(Event::ReturnCreated(created.id)).await?;

        Ok(created)
    }

    /// Approves a return request. Unless the customer ships the items
    /// themselves, the carrier pickup is scheduled first and its ticket id is
    /// committed together with the transition.
    #[instrument(skip(self, input), fields(return_id = %id))]
    pub async fn approve(
        &self,
        actor: Actor,
        id: Uuid,
        input: ApproveInput,
    ) -> Result<return_request::Model, ServiceError> {
        let request = self.require(id).await?;
        let from = request.status;

        let payload = TransitionPayload {
            notes: input.notes.as_deref(),
            has_pickup_date: input.pickup_scheduled.is_some(),
            customer_ships: input.customer_ships,
        };
        state_machine::validate(
            from,
            ReturnStatus::Approved,
            actor.role,
            payload,
            self.rbac.as_ref(),
        )?;

        let pickup_ticket_id = match input.pickup_scheduled {
            Some(date) if !input.customer_ships => Some(
                self.shipping
                    .schedule_pickup(
                        request.pickup_address.clone(),
                        date,
                        input.pickup_carrier.clone(),
                    )
                    .await
                    .map_err(map_collaborator_error)?,
            ),
            _ => None,
        };

        let mut commit = TransitionCommit::status_flip(
            from,
            ReturnStatus::Approved,
            TimelineEntry {
                event_type: EventType::Approved,
                notes: input.notes.clone(),
                actor_id: actor.id,
                actor_role: actor.role,
            },
        );
        commit.pickup_scheduled_date = input.pickup_scheduled;
        commit.pickup_carrier = input.pickup_carrier;
        commit.pickup_ticket_id = pickup_ticket_id;
        commit.customer_ships = Some(input.customer_ships);
        commit.admin_notes = input.notes;
        if request.approved_at.is_none() {
            commit.approved_at = Some(Utc::now());
        }

        let updated = self.store.apply_transition(id, request.version, commit).await?;

        self.emit(Event::ReturnApproved(id)).await?;

        Ok(updated)
    }

    /// Rejects a return request; the rejection reason is mandatory.
    #[instrument(skip(self, notes), fields(return_id = %id))]
    pub async fn reject(
        &self,
        actor: Actor,
        id: Uuid,
        notes: Option<String>,
    ) -> Result<return_request::Model, ServiceError> {
        let request = self.require(id).await?;
        let from = request.status;

        state_machine::validate(
            from,
            ReturnStatus::Rejected,
            actor.role,
            TransitionPayload {
                notes: notes.as_deref(),
                ..Default::default()
            },
            self.rbac.as_ref(),
        )?;

        let mut commit = TransitionCommit::status_flip(
            from,
            ReturnStatus::Rejected,
            TimelineEntry {
                event_type: EventType::Rejected,
                notes: notes.clone(),
                actor_id: actor.id,
                actor_role: actor.role,
            },
        );
        commit.admin_notes = notes;

        let updated = self.store.apply_transition(id, request.version, commit).await?;

        self.emit(Event::ReturnRejected(id)).await?;

        Ok(updated)
    }

    /// Generic transition for the plain edges of the graph. Approval,
    /// rejection, and the financial edges each have a dedicated operation and
    /// are refused here.
    #[instrument(skip(self, notes), fields(return_id = %id, new_status = %new_status))]
    pub async fn update_status(
        &self,
        actor: Actor,
        id: Uuid,
        new_status: ReturnStatus,
        notes: Option<String>,
    ) -> Result<return_request::Model, ServiceError> {
        if matches!(new_status, ReturnStatus::Approved | ReturnStatus::Rejected) {
            return Err(ServiceError::ValidationError(format!(
                "Use the dedicated {} operation for this transition",
                if new_status == ReturnStatus::Approved {
                    "approve"
                } else {
                    "reject"
                }
            )));
        }

        let request = self.require(id).await?;
        let from = request.status;

        let action = state_machine::validate(
            from,
            new_status,
            actor.role,
            TransitionPayload {
                notes: notes.as_deref(),
                ..Default::default()
            },
            self.rbac.as_ref(),
        )?;

        if action != TransitionAction::None {
            return Err(ServiceError::ValidationError(format!(
                "Transition to '{}' triggers a side effect and requires its dedicated operation",
                new_status
            )));
        }

        let mut commit = TransitionCommit::status_flip(
            from,
            new_status,
            TimelineEntry {
                event_type: EventType::StatusChanged,
                notes,
                actor_id: actor.id,
                actor_role: actor.role,
            },
        );
        if new_status == ReturnStatus::Completed {
            commit.completed_at = Some(Utc::now());
        }

        let updated = self.store.apply_transition(id, request.version, commit).await?;

        self.emit(Event::ReturnStatusChanged {
            return_id: id,
            old_status: from,
            new_status,
        })
        .await?;
        if new_status == ReturnStatus::Completed {
            self.emit(Event::ReturnCompleted(id)).await?;
        }

        Ok(updated)
    }

    /// Creates a refund through the payment collaborator and commits
    /// `refund_initiated` (or `refund_partial`) with the refund's id. The
    /// refund record must exist before the status claims it does.
    #[instrument(skip(self, input), fields(return_id = %input.return_id, amount = %input.amount))]
    pub async fn initiate_refund(
        &self,
        actor: Actor,
        input: InitiateRefundInput,
    ) -> Result<return_request::Model, ServiceError> {
        let request = self.require(input.return_id).await?;
        let from = request.status;

        let target = if input.partial {
            ReturnStatus::RefundPartial
        } else {
            ReturnStatus::RefundInitiated
        };
        state_machine::validate(
            from,
            target,
            actor.role,
            TransitionPayload::default(),
            self.rbac.as_ref(),
        )?;

        if request.has_compensation_link() {
            return Err(ServiceError::ValidationError(
                "A refund or replacement is already linked to this return".to_string(),
            ));
        }
        if request.requested_action != RequestedAction::Refund {
            return Err(ServiceError::ValidationError(
                "Return did not request a refund".to_string(),
            ));
        }
        if input.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Refund amount must be positive".to_string(),
            ));
        }

        let order_total = self
            .orders
            .order_total(request.order_id)
            .await
            .map_err(map_collaborator_error)?;
        if input.amount > order_total {
            return Err(ServiceError::ValidationError(format!(
                "Refund amount {} exceeds order total {}",
                input.amount, order_total
            )));
        }

        let refund_id = self
            .payments
            .create_refund(
                request.order_id,
                request.id,
                input.amount,
                input.method.clone(),
                input.notes.clone(),
            )
            .await
            .map_err(map_collaborator_error)?;

        let mut commit = TransitionCommit::status_flip(
            from,
            target,
            TimelineEntry {
                event_type: EventType::RefundInitiated,
                notes: input.notes.clone(),
                actor_id: actor.id,
                actor_role: actor.role,
            },
        );
        commit.refund_id = Some(refund_id);
        commit.refund_status = Some("pending".to_string());
        commit.refund_amount = Some(input.amount);

        let updated = self
            .store
            .apply_transition(request.id, request.version, commit)
            .await?;

        self.emit(Event::RefundInitiated {
            return_id: request.id,
            refund_id,
            amount: input.amount,
        })
        .await?;

        Ok(updated)
    }

    /// Clones the returned lines into a replacement order through the order
    /// collaborator and commits `replacement_initiated` with the new order id.
    #[instrument(skip(self), fields(return_id = %id))]
    pub async fn create_replacement(
        &self,
        actor: Actor,
        id: Uuid,
        notes: Option<String>,
    ) -> Result<return_request::Model, ServiceError> {
        let request = self.require(id).await?;
        let from = request.status;

        state_machine::validate(
            from,
            ReturnStatus::ReplacementInitiated,
            actor.role,
            TransitionPayload::default(),
            self.rbac.as_ref(),
        )?;

        if request.has_compensation_link() {
            return Err(ServiceError::ValidationError(
                "A refund or replacement is already linked to this return".to_string(),
            ));
        }
        if request.requested_action != RequestedAction::Replacement {
            return Err(ServiceError::ValidationError(
                "Return did not request a replacement".to_string(),
            ));
        }

        let items = self.store.items(id).await?;
        let replacement_order_id = self
            .orders
            .create_replacement_order(request.order_id, id, items)
            .await
            .map_err(map_collaborator_error)?;

        let mut commit = TransitionCommit::status_flip(
            from,
            ReturnStatus::ReplacementInitiated,
            TimelineEntry {
                event_type: EventType::ReplacementInitiated,
                notes,
                actor_id: actor.id,
                actor_role: actor.role,
            },
        );
        commit.replacement_order_id = Some(replacement_order_id);
        commit.replacement_status = Some("pending".to_string());

        let updated = self.store.apply_transition(id, request.version, commit).await?;

        self.emit(Event::ReplacementInitiated {
            return_id: id,
            replacement_order_id,
        })
        .await?;

        Ok(updated)
    }

    /// Appends a manual admin note to the timeline.
    #[instrument(skip(self, notes), fields(return_id = %id))]
    pub async fn add_note(
        &self,
        actor: Actor,
        id: Uuid,
        notes: String,
    ) -> Result<return_event::Model, ServiceError> {
        if notes.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Note text must not be empty".to_string(),
            ));
        }
        self.require(id).await?;

        self.store
            .append_note(
                id,
                TimelineEntry {
                    event_type: EventType::NoteAdded,
                    notes: Some(notes),
                    actor_id: actor.id,
                    actor_role: actor.role,
                },
            )
            .await
    }

    /// Full detail for one return request, with `available_transitions`
    /// computed for the calling role.
    #[instrument(skip(self), fields(return_id = %id))]
    pub async fn get_detail(
        &self,
        role: ActorRole,
        id: Uuid,
    ) -> Result<ReturnDetail, ServiceError> {
        let request = self.require(id).await?;
        let items = self.store.items(id).await?;
        let timeline = self.store.timeline(id).await?;

        let refund = request.refund_id.map(|refund_id| RefundLink {
            refund_id,
            status: request.refund_status.clone(),
            amount: request.refund_amount,
        });
        let replacement = request
            .replacement_order_id
            .map(|replacement_order_id| ReplacementLink {
                replacement_order_id,
                status: request.replacement_status.clone(),
            });

        let available_transitions =
            state_machine::available_transitions(request.status, role, self.rbac.as_ref());

        Ok(ReturnDetail {
            request,
            items,
            timeline,
            refund,
            replacement,
            available_transitions,
        })
    }

    /// Lists return requests with filters and pagination.
    #[instrument(skip(self, filter))]
    pub async fn list(
        &self,
        filter: &ReturnListFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<return_request::Model>, u64), ServiceError> {
        self.store.list(filter, page, limit).await
    }

    /// Aggregate counts per status. Derived from the store on demand;
    /// eventual consistency is acceptable for this read-model.
    #[instrument(skip(self))]
    pub async fn get_stats(&self) -> Result<ReturnStats, ServiceError> {
        let by_status = self.store.count_by_status().await?;
        let total = by_status.iter().map(|(_, count)| count).sum();
        Ok(ReturnStats {
            total,
            by_status: by_status
                .into_iter()
                .map(|(status, count)| StatusCount { status, count })
                .collect(),
        })
    }

    /// The raw model, for handlers that only need the summary row.
    pub async fn get_return(
        &self,
        id: Uuid,
    ) -> Result<Option<return_request::Model>, ServiceError> {
        self.store.get(id).await
    }

    /// Lookup by the human-readable return number printed on labels.
    pub async fn get_by_return_number(
        &self,
        return_number: &str,
    ) -> Result<Option<return_request::Model>, ServiceError> {
        self.store.get_by_return_number(return_number).await
    }

    async fn require(&self, id: Uuid) -> Result<return_request::Model, ServiceError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Return request {} not found", id)))
    }

    async fn emit(&self, event: Event) -> Result<(), ServiceError> {
        self.event_sender
            .send(event)
            .await
            .map_err(ServiceError::EventError)
    }
}

fn map_collaborator_error(err: CollaboratorError) -> ServiceError {
    match err {
        CollaboratorError::InvalidAmount(msg) => ServiceError::ValidationError(msg),
        CollaboratorError::Unavailable(msg) => ServiceError::SideEffectFailed(msg),
    }
}
