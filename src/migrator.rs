use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_return_requests_table::Migration),
            Box::new(m20260101_000002_create_return_items_table::Migration),
            Box::new(m20260101_000003_create_return_events_table::Migration),
        ]
    }
}

mod m20260101_000001_create_return_requests_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000001_create_return_requests_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ReturnRequests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReturnRequests::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReturnRequests::ReturnNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(ReturnRequests::OrderId).uuid().not_null())
                        .col(ColumnDef::new(ReturnRequests::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(ReturnRequests::ReasonCode)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReturnRequests::ReasonText).string().null())
                        .col(
                            ColumnDef::new(ReturnRequests::RequestedAction)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReturnRequests::Status).string().not_null())
                        .col(
                            ColumnDef::new(ReturnRequests::PickupAddress)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ReturnRequests::PickupScheduledDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ReturnRequests::PickupCarrier)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ReturnRequests::PickupTicketId)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ReturnRequests::CustomerShips)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(ReturnRequests::RefundId).uuid().null())
                        .col(ColumnDef::new(ReturnRequests::RefundStatus).string().null())
                        .col(
                            ColumnDef::new(ReturnRequests::RefundAmount)
                                .decimal()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ReturnRequests::ReplacementOrderId)
                                .uuid()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ReturnRequests::ReplacementStatus)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(ReturnRequests::AdminNotes).string().null())
                        .col(
                            ColumnDef::new(ReturnRequests::Version)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ReturnRequests::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReturnRequests::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReturnRequests::ApprovedAt).timestamp_with_time_zone().null())
                        .col(
                            ColumnDef::new(ReturnRequests::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_return_requests_status")
                        .table(ReturnRequests::Table)
                        .col(ReturnRequests::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_return_requests_order_id")
                        .table(ReturnRequests::Table)
                        .col(ReturnRequests::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ReturnRequests::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum ReturnRequests {
        Table,
        Id,
        ReturnNumber,
        OrderId,
        UserId,
        ReasonCode,
        ReasonText,
        RequestedAction,
        Status,
        PickupAddress,
        PickupScheduledDate,
        PickupCarrier,
        PickupTicketId,
        CustomerShips,
        RefundId,
        RefundStatus,
        RefundAmount,
        ReplacementOrderId,
        ReplacementStatus,
        AdminNotes,
        Version,
        CreatedAt,
        UpdatedAt,
        ApprovedAt,
        CompletedAt,
    }
}

mod m20260101_000002_create_return_items_table {

    use sea_orm_migration::prelude::*;

    use super::m20260101_000001_create_return_requests_table::ReturnRequests;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000002_create_return_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ReturnItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReturnItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReturnItems::ReturnId).uuid().not_null())
                        .col(ColumnDef::new(ReturnItems::OrderItemId).uuid().not_null())
                        .col(ColumnDef::new(ReturnItems::Sku).string().not_null())
                        .col(ColumnDef::new(ReturnItems::ProductName).string().not_null())
                        .col(ColumnDef::new(ReturnItems::Quantity).integer().not_null())
                        .col(ColumnDef::new(ReturnItems::Condition).string().not_null())
                        .col(ColumnDef::new(ReturnItems::UnitPrice).decimal().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_return_items_return_id")
                                .from(ReturnItems::Table, ReturnItems::ReturnId)
                                .to(ReturnRequests::Table, ReturnRequests::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_return_items_return_id")
                        .table(ReturnItems::Table)
                        .col(ReturnItems::ReturnId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ReturnItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ReturnItems {
        Table,
        Id,
        ReturnId,
        OrderItemId,
        Sku,
        ProductName,
        Quantity,
        Condition,
        UnitPrice,
    }
}

mod m20260101_000003_create_return_events_table {

    use sea_orm_migration::prelude::*;

    use super::m20260101_000001_create_return_requests_table::ReturnRequests;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000003_create_return_events_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ReturnEvents::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReturnEvents::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReturnEvents::ReturnId).uuid().not_null())
                        .col(ColumnDef::new(ReturnEvents::EventType).string().not_null())
                        .col(
                            ColumnDef::new(ReturnEvents::PreviousStatus)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(ReturnEvents::NewStatus).string().null())
                        .col(ColumnDef::new(ReturnEvents::Notes).string().null())
                        .col(ColumnDef::new(ReturnEvents::ActorId).uuid().not_null())
                        .col(ColumnDef::new(ReturnEvents::ActorRole).string().not_null())
                        .col(
                            ColumnDef::new(ReturnEvents::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_return_events_return_id")
                                .from(ReturnEvents::Table, ReturnEvents::ReturnId)
                                .to(ReturnRequests::Table, ReturnRequests::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_return_events_return_id")
                        .table(ReturnEvents::Table)
                        .col(ReturnEvents::ReturnId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ReturnEvents::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ReturnEvents {
        Table,
        Id,
        ReturnId,
        EventType,
        PreviousStatus,
        NewStatus,
        Notes,
        ActorId,
        ActorRole,
        CreatedAt,
    }
}
