use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state_machine::ReturnStatus;

/// Enum representing why the customer is returning the items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    #[sea_orm(string_value = "wrong_item")]
    WrongItem,
    #[sea_orm(string_value = "damaged")]
    Damaged,
    #[sea_orm(string_value = "defective")]
    Defective,
    #[sea_orm(string_value = "not_as_described")]
    NotAsDescribed,
    #[sea_orm(string_value = "no_longer_needed")]
    NoLongerNeeded,
    #[sea_orm(string_value = "other")]
    Other,
}

/// Enum representing the compensation the customer asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum RequestedAction {
    #[sea_orm(string_value = "refund")]
    Refund,
    #[sea_orm(string_value = "replacement")]
    Replacement,
    #[sea_orm(string_value = "repair")]
    Repair,
}

/// The `return_requests` table. Mutated exclusively through the store's
/// `apply_transition`; `version` is the optimistic-lock column that serializes
/// concurrent writers on the same request.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = ReturnRequest)]
#[sea_orm(table_name = "return_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Human-readable `RMA-XXXXXXXX` identifier, immutable once issued.
    #[sea_orm(unique)]
    pub return_number: String,

    pub order_id: Uuid,
    pub user_id: Uuid,

    pub reason_code: ReasonCode,
    pub reason_text: Option<String>,
    pub requested_action: RequestedAction,
    pub status: ReturnStatus,

    /// Pickup fields, populated on/after approval.
    pub pickup_address: Option<String>,
    pub pickup_scheduled_date: Option<DateTime<Utc>>,
    pub pickup_carrier: Option<String>,
    pub pickup_ticket_id: Option<String>,
    pub customer_ships: bool,

    /// Denormalized pointer + status snapshot of the linked refund. The refund
    /// lifecycle is owned by the payment collaborator.
    pub refund_id: Option<Uuid>,
    pub refund_status: Option<String>,
    pub refund_amount: Option<Decimal>,

    /// Denormalized pointer + status snapshot of the linked replacement order.
    pub replacement_order_id: Option<Uuid>,
    pub replacement_status: Option<String>,

    pub admin_notes: Option<String>,

    pub version: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::return_item::Entity")]
    ReturnItems,

    #[sea_orm(has_many = "super::return_event::Entity")]
    ReturnEvents,
}

impl Related<super::return_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReturnItems.def()
    }
}

impl Related<super::return_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReturnEvents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// A request may be linked to a refund or a replacement, never both.
    pub fn has_compensation_link(&self) -> bool {
        self.refund_id.is_some() || self.replacement_order_id.is_some()
    }
}
