//! Durable store for return requests, their items, and the audit timeline.
//!
//! `apply_transition` is the only mutation path for a return request row. It
//! commits the status change, any linked-entity pointers, and exactly one
//! timeline event in a single transaction, guarded by an optimistic version
//! check: a losing concurrent writer observes `ServiceError::StaleState` and
//! must re-fetch.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::return_event::{self, EventType};
use crate::entities::return_item::{self, ItemCondition};
use crate::entities::return_request::{self, ReasonCode, RequestedAction};
use crate::errors::ServiceError;
use crate::repositories::{BaseRepository, Repository};
use crate::state_machine::{ActorRole, ReturnStatus};

/// Draft of a new return request, as accepted from the storefront client.
#[derive(Debug, Clone)]
pub struct NewReturnRequest {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub reason_code: ReasonCode,
    pub reason_text: Option<String>,
    pub requested_action: RequestedAction,
    pub pickup_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewReturnItem {
    pub order_item_id: Uuid,
    pub sku: String,
    pub product_name: String,
    pub quantity: i32,
    pub condition: ItemCondition,
    pub unit_price: Decimal,
}

/// Who did what, recorded with every timeline entry.
#[derive(Debug, Clone)]
pub struct TimelineEntry {
    pub event_type: EventType,
    pub notes: Option<String>,
    pub actor_id: Uuid,
    pub actor_role: ActorRole,
}

/// Everything a single transition commits atomically. Optional fields are
/// written only when `Some`; they carry pickup details and the set-once
/// refund/replacement pointers obtained from collaborators before the commit.
#[derive(Debug, Clone)]
pub struct TransitionCommit {
    pub previous_status: ReturnStatus,
    pub new_status: ReturnStatus,
    pub event: TimelineEntry,
    pub pickup_scheduled_date: Option<DateTime<Utc>>,
    pub pickup_carrier: Option<String>,
    pub pickup_ticket_id: Option<String>,
    pub customer_ships: Option<bool>,
    pub refund_id: Option<Uuid>,
    pub refund_status: Option<String>,
    pub refund_amount: Option<Decimal>,
    pub replacement_order_id: Option<Uuid>,
    pub replacement_status: Option<String>,
    pub admin_notes: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TransitionCommit {
    /// A plain status flip with no extra fields beyond the timeline entry.
    pub fn status_flip(
        previous_status: ReturnStatus,
        new_status: ReturnStatus,
        event: TimelineEntry,
    ) -> Self {
        Self {
            previous_status,
            new_status,
            event,
            pickup_scheduled_date: None,
            pickup_carrier: None,
            pickup_ticket_id: None,
            customer_ships: None,
            refund_id: None,
            refund_status: None,
            refund_amount: None,
            replacement_order_id: None,
            replacement_status: None,
            admin_notes: None,
            approved_at: None,
            completed_at: None,
        }
    }
}

/// Filters accepted by the admin list endpoint.
#[derive(Debug, Clone, Default)]
pub struct ReturnListFilter {
    pub status: Option<ReturnStatus>,
    pub search: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

/// Repository for return request operations
#[derive(Debug, Clone)]
pub struct ReturnRequestStore {
    base: BaseRepository,
}

impl ReturnRequestStore {
    pub fn new(db: Arc<sea_orm::DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Find a return request by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<return_request::Model>, ServiceError> {
        return_request::Entity::find_by_id(id)
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Find a return request by its human-readable return number
    pub async fn get_by_return_number(
        &self,
        return_number: &str,
    ) -> Result<Option<return_request::Model>, ServiceError> {
        return_request::Entity::find()
            .filter(return_request::Column::ReturnNumber.eq(return_number))
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Items of a return request, in insertion order.
    pub async fn items(&self, return_id: Uuid) -> Result<Vec<return_item::Model>, ServiceError> {
        return_item::Entity::find()
            .filter(return_item::Column::ReturnId.eq(return_id))
            .all(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Timeline of a return request, oldest first.
    pub async fn timeline(
        &self,
        return_id: Uuid,
    ) -> Result<Vec<return_event::Model>, ServiceError> {
        return_event::Entity::find()
            .filter(return_event::Column::ReturnId.eq(return_id))
            .order_by_asc(return_event::Column::CreatedAt)
            .all(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// List return requests with filters and pagination
    pub async fn list(
        &self,
        filter: &ReturnListFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<return_request::Model>, u64), ServiceError> {
        let mut query = return_request::Entity::find();

        if let Some(status) = filter.status {
            query = query.filter(return_request::Column::Status.eq(status));
        }
        if let Some(search) = filter.search.as_deref() {
            query = query.filter(
                Condition::any()
                    .add(return_request::Column::ReturnNumber.contains(search))
                    .add(return_request::Column::ReasonText.contains(search)),
            );
        }
        if let Some(from) = filter.created_from {
            query = query.filter(return_request::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.created_to {
            query = query.filter(return_request::Column::CreatedAt.lte(to));
        }

        let paginator = query
            .order_by_desc(return_request::Column::CreatedAt)
            .paginate(self.base.get_db(), limit);

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;

        let requests = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((requests, total))
    }

    /// Aggregate counts per status, for the admin dashboard read-model.
    pub async fn count_by_status(&self) -> Result<Vec<(String, i64)>, ServiceError> {
        use sea_orm::sea_query::Expr;

        return_request::Entity::find()
            .select_only()
            .column(return_request::Column::Status)
            .column_as(
                Expr::col((return_request::Entity, return_request::Column::Id)).count(),
                "count",
            )
            .group_by(return_request::Column::Status)
            .into_tuple::<(String, i64)>()
            .all(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Create a return request with its items and the opening timeline event.
    #[instrument(skip(self, draft, items))]
    pub async fn create(
        &self,
        draft: NewReturnRequest,
        items: Vec<NewReturnItem>,
        entry: TimelineEntry,
    ) -> Result<return_request::Model, ServiceError> {
        let txn = self
            .base
            .get_db()
            .begin()
            .await
            .map_err(ServiceError::DatabaseError)?;

        let now = Utc::now();
        let id = Uuid::new_v4();
        let return_number = generate_return_number();

        let request = return_request::ActiveModel {
            id: Set(id),
            return_number: Set(return_number.clone()),
            order_id: Set(draft.order_id),
            user_id: Set(draft.user_id),
            reason_code: Set(draft.reason_code),
            reason_text: Set(draft.reason_text),
            requested_action: Set(draft.requested_action),
            status: Set(ReturnStatus::Pending),
            pickup_address: Set(draft.pickup_address),
            pickup_scheduled_date: Set(None),
            pickup_carrier: Set(None),
            pickup_ticket_id: Set(None),
            customer_ships: Set(false),
            refund_id: Set(None),
            refund_status: Set(None),
            refund_amount: Set(None),
            replacement_order_id: Set(None),
            replacement_status: Set(None),
            admin_notes: Set(None),
            version: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            approved_at: Set(None),
            completed_at: Set(None),
        };

        let model = request
            .insert(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        for item in items {
            return_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                return_id: Set(id),
                order_item_id: Set(item.order_item_id),
                sku: Set(item.sku),
                product_name: Set(item.product_name),
                quantity: Set(item.quantity),
                condition: Set(item.condition),
                unit_price: Set(item.unit_price),
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        }

        insert_event(&txn, id, None, Some(ReturnStatus::Pending), entry).await?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(return_id = %id, return_number = %return_number, "Return request created");

        Ok(model)
    }

    /// Apply a validated transition. The status update, linked-entity
    /// pointers, and the timeline event either all commit or none do; a
    /// version mismatch means a concurrent writer won and yields `StaleState`.
    #[instrument(skip(self, commit), fields(return_id = %id, new_status = %commit.new_status))]
    pub async fn apply_transition(
        &self,
        id: Uuid,
        expected_version: i32,
        commit: TransitionCommit,
    ) -> Result<return_request::Model, ServiceError> {
        let txn = self
            .base
            .get_db()
            .begin()
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut update = return_request::ActiveModel {
            status: Set(commit.new_status),
            version: Set(expected_version + 1),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Some(date) = commit.pickup_scheduled_date {
            update.pickup_scheduled_date = Set(Some(date));
        }
        if let Some(carrier) = commit.pickup_carrier {
            update.pickup_carrier = Set(Some(carrier));
        }
        if let Some(ticket) = commit.pickup_ticket_id {
            update.pickup_ticket_id = Set(Some(ticket));
        }
        if let Some(ships) = commit.customer_ships {
            update.customer_ships = Set(ships);
        }
        if let Some(refund_id) = commit.refund_id {
            update.refund_id = Set(Some(refund_id));
        }
        if let Some(refund_status) = commit.refund_status {
            update.refund_status = Set(Some(refund_status));
        }
        if let Some(refund_amount) = commit.refund_amount {
            update.refund_amount = Set(Some(refund_amount));
        }
        if let Some(replacement_id) = commit.replacement_order_id {
            update.replacement_order_id = Set(Some(replacement_id));
        }
        if let Some(replacement_status) = commit.replacement_status {
            update.replacement_status = Set(Some(replacement_status));
        }
        if let Some(notes) = commit.admin_notes {
            update.admin_notes = Set(Some(notes));
        }
        if let Some(approved_at) = commit.approved_at {
            update.approved_at = Set(Some(approved_at));
        }
        if let Some(completed_at) = commit.completed_at {
            update.completed_at = Set(Some(completed_at));
        }

        let result = return_request::Entity::update_many()
            .set(update)
            .filter(return_request::Column::Id.eq(id))
            .filter(return_request::Column::Version.eq(expected_version))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            let exists = return_request::Entity::find_by_id(id)
                .one(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?
                .is_some();
            txn.rollback().await.map_err(ServiceError::DatabaseError)?;
            return Err(if exists {
                ServiceError::StaleState(id)
            } else {
                ServiceError::NotFound(format!("Return request {} not found", id))
            });
        }

        insert_event(
            &txn,
            id,
            Some(commit.previous_status),
            Some(commit.new_status),
            commit.event,
        )
        .await?;

        let updated = return_request::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Return request {} not found", id)))?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(
            return_id = %id,
            previous_status = %commit.previous_status,
            new_status = %commit.new_status,
            "Return request transition committed"
        );

        Ok(updated)
    }

    /// Append a manual note to the timeline without touching the request row.
    pub async fn append_note(
        &self,
        return_id: Uuid,
        entry: TimelineEntry,
    ) -> Result<return_event::Model, ServiceError> {
        // Note events carry no status change.
        let event = return_event::ActiveModel {
            id: Set(Uuid::new_v4()),
            return_id: Set(return_id),
            event_type: Set(entry.event_type),
            previous_status: Set(None),
            new_status: Set(None),
            notes: Set(entry.notes),
            actor_id: Set(entry.actor_id),
            actor_role: Set(entry.actor_role.as_str().to_string()),
            created_at: Set(Utc::now()),
        };

        event
            .insert(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }
}

async fn insert_event(
    txn: &sea_orm::DatabaseTransaction,
    return_id: Uuid,
    previous_status: Option<ReturnStatus>,
    new_status: Option<ReturnStatus>,
    entry: TimelineEntry,
) -> Result<(), ServiceError> {
    return_event::ActiveModel {
        id: Set(Uuid::new_v4()),
        return_id: Set(return_id),
        event_type: Set(entry.event_type),
        previous_status: Set(previous_status.map(|s| s.as_str().to_string())),
        new_status: Set(new_status.map(|s| s.as_str().to_string())),
        notes: Set(entry.notes),
        actor_id: Set(entry.actor_id),
        actor_role: Set(entry.actor_role.as_str().to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(txn)
    .await
    .map_err(ServiceError::DatabaseError)?;

    Ok(())
}

/// Human-readable `RMA-XXXXXXXX` identifier derived from a fresh v4 uuid.
fn generate_return_number() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("RMA-{}", raw[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_numbers_carry_the_rma_prefix() {
        let rn = generate_return_number();
        assert!(rn.starts_with("RMA-"));
        assert_eq!(rn.len(), 12);
        assert!(rn[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn status_flip_commit_carries_no_side_data() {
        let commit = TransitionCommit::status_flip(
            ReturnStatus::PickedUp,
            ReturnStatus::InTransit,
            TimelineEntry {
                event_type: EventType::StatusChanged,
                notes: None,
                actor_id: Uuid::new_v4(),
                actor_role: ActorRole::Agent,
            },
        );
        assert!(commit.refund_id.is_none());
        assert!(commit.replacement_order_id.is_none());
        assert!(commit.pickup_ticket_id.is_none());
    }
}
