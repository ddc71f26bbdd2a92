use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Enum representing the condition of a returned item as assessed on intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ItemCondition {
    #[sea_orm(string_value = "new")]
    New,
    #[sea_orm(string_value = "opened")]
    Opened,
    #[sea_orm(string_value = "used")]
    Used,
    #[sea_orm(string_value = "damaged")]
    Damaged,
    #[sea_orm(string_value = "defective")]
    Defective,
}

/// The `return_items` table. One row per original order line being returned;
/// immutable after creation.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = ReturnItem)]
#[sea_orm(table_name = "return_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub return_id: Uuid,
    pub order_item_id: Uuid,
    pub sku: String,
    pub product_name: String,
    pub quantity: i32,
    pub condition: ItemCondition,
    pub unit_price: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::return_request::Entity",
        from = "Column::ReturnId",
        to = "super::return_request::Column::Id"
    )]
    ReturnRequest,
}

impl Related<super::return_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReturnRequest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
