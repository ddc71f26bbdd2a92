//! Contracts for the external collaborators the engine drives, plus the
//! in-process defaults the binary wires when no real integration is
//! configured.
//!
//! The engine only ever stores the durable reference each call returns; the
//! refund, replacement order, and pickup ticket lifecycles are owned by the
//! collaborator services.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::entities::return_item;
use crate::state_machine::{ActorRole, ReturnStatus};

/// Failure modes a collaborator call can surface to the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// The refund amount exceeds what the order allows.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The collaborator could not complete the call; nothing durable was
    /// created, so the caller may retry.
    #[error("{0}")]
    Unavailable(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Create a refund record for up to the order total; returns its id.
    /// Fails with `InvalidAmount` if `amount` exceeds the order total.
    async fn create_refund(
        &self,
        order_id: Uuid,
        return_id: Uuid,
        amount: Decimal,
        method: Option<String>,
        notes: Option<String>,
    ) -> Result<Uuid, CollaboratorError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Total of the original order, the ceiling for any refund.
    async fn order_total(&self, order_id: Uuid) -> Result<Decimal, CollaboratorError>;

    /// Clone the returned lines into a fresh replacement order; returns its id.
    async fn create_replacement_order(
        &self,
        original_order_id: Uuid,
        return_id: Uuid,
        items: Vec<return_item::Model>,
    ) -> Result<Uuid, CollaboratorError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShippingService: Send + Sync {
    /// Schedule a carrier pickup; returns the carrier's ticket id. Address
    /// and carrier may be absent — the pickup can be arranged later.
    async fn schedule_pickup(
        &self,
        address: Option<String>,
        date: DateTime<Utc>,
        carrier: Option<String>,
    ) -> Result<String, CollaboratorError>;
}

/// Capability lookup: is `role` allowed to request the edge `from -> to`?
/// Kept synchronous — implementations answer from a capability matrix.
pub trait RbacService: Send + Sync {
    fn can_transition(&self, role: ActorRole, from: ReturnStatus, to: ReturnStatus) -> bool;
}

/// Default capability matrix. Customers may only re-drive their own request
/// after an information hold; agents run logistics; managers and the system
/// role additionally drive the financial edges.
#[derive(Debug, Default, Clone)]
pub struct StaticRbac;

impl RbacService for StaticRbac {
    fn can_transition(&self, role: ActorRole, from: ReturnStatus, to: ReturnStatus) -> bool {
        match role {
            ActorRole::Manager | ActorRole::System => true,
            ActorRole::Agent => !matches!(
                to,
                ReturnStatus::RefundInitiated
                    | ReturnStatus::RefundPartial
                    | ReturnStatus::ReplacementInitiated
            ),
            ActorRole::Customer => {
                from == ReturnStatus::MoreInfoNeeded && to == ReturnStatus::Pending
            }
        }
    }
}

/// In-process order book used by the stub collaborators. Real deployments
/// replace the stubs with clients for the payment / order / shipping
/// services; tests seed the book with known totals.
#[derive(Debug, Default)]
pub struct StubOrderService {
    totals: DashMap<Uuid, Decimal>,
}

impl StubOrderService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an order the stub will answer for.
    pub fn insert_order(&self, order_id: Uuid, total: Decimal) {
        self.totals.insert(order_id, total);
    }
}

#[async_trait]
impl OrderService for StubOrderService {
    async fn order_total(&self, order_id: Uuid) -> Result<Decimal, CollaboratorError> {
        self.totals
            .get(&order_id)
            .map(|entry| *entry.value())
            .ok_or_else(|| CollaboratorError::Unavailable(format!("unknown order {}", order_id)))
    }

    async fn create_replacement_order(
        &self,
        original_order_id: Uuid,
        return_id: Uuid,
        items: Vec<return_item::Model>,
    ) -> Result<Uuid, CollaboratorError> {
        if !self.totals.contains_key(&original_order_id) {
            return Err(CollaboratorError::Unavailable(format!(
                "unknown order {}",
                original_order_id
            )));
        }
        let replacement_id = Uuid::new_v4();
        info!(
            original_order_id = %original_order_id,
            return_id = %return_id,
            replacement_order_id = %replacement_id,
            line_count = items.len(),
            "Stub order service created replacement order"
        );
        Ok(replacement_id)
    }
}

/// Stub payment collaborator validating refunds against the shared order book.
#[derive(Debug)]
pub struct StubPaymentService {
    orders: Arc<StubOrderService>,
}

impl StubPaymentService {
    pub fn new(orders: Arc<StubOrderService>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl PaymentService for StubPaymentService {
    async fn create_refund(
        &self,
        order_id: Uuid,
        return_id: Uuid,
        amount: Decimal,
        _method: Option<String>,
        _notes: Option<String>,
    ) -> Result<Uuid, CollaboratorError> {
        let total = self.orders.order_total(order_id).await?;
        if amount > total {
            return Err(CollaboratorError::InvalidAmount(format!(
                "refund of {} exceeds order total {}",
                amount, total
            )));
        }
        let refund_id = Uuid::new_v4();
        info!(
            order_id = %order_id,
            return_id = %return_id,
            refund_id = %refund_id,
            amount = %amount,
            "Stub payment service created refund"
        );
        Ok(refund_id)
    }
}

/// Stub carrier integration; issues ticket ids without dispatching anything.
#[derive(Debug, Default)]
pub struct StubShippingService;

#[async_trait]
impl ShippingService for StubShippingService {
    async fn schedule_pickup(
        &self,
        address: Option<String>,
        date: DateTime<Utc>,
        carrier: Option<String>,
    ) -> Result<String, CollaboratorError> {
        let ticket = format!("PU-{}", Uuid::new_v4().simple());
        info!(
            pickup_date = %date,
            carrier = carrier.as_deref().unwrap_or("unassigned"),
            has_address = address.is_some(),
            ticket = %ticket,
            "Stub shipping service scheduled pickup"
        );
        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn stub_payment_rejects_amounts_over_the_order_total() {
        let orders = Arc::new(StubOrderService::new());
        let order_id = Uuid::new_v4();
        orders.insert_order(order_id, dec!(100.00));
        let payments = StubPaymentService::new(orders);

        let err = payments
            .create_refund(order_id, Uuid::new_v4(), dec!(150.00), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::InvalidAmount(_)));

        let ok = payments
            .create_refund(order_id, Uuid::new_v4(), dec!(50.00), None, None)
            .await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn stub_order_service_rejects_unknown_orders() {
        let orders = StubOrderService::new();
        let err = orders.order_total(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Unavailable(_)));
    }

    #[test]
    fn static_rbac_matrix() {
        let rbac = StaticRbac;
        assert!(rbac.can_transition(
            ActorRole::Manager,
            ReturnStatus::InspectionPassed,
            ReturnStatus::RefundInitiated
        ));
        assert!(!rbac.can_transition(
            ActorRole::Agent,
            ReturnStatus::InspectionPassed,
            ReturnStatus::RefundInitiated
        ));
        assert!(rbac.can_transition(
            ActorRole::Agent,
            ReturnStatus::Received,
            ReturnStatus::Inspecting
        ));
        assert!(rbac.can_transition(
            ActorRole::Customer,
            ReturnStatus::MoreInfoNeeded,
            ReturnStatus::Pending
        ));
        assert!(!rbac.can_transition(
            ActorRole::Customer,
            ReturnStatus::Pending,
            ReturnStatus::Approved
        ));
    }
}
