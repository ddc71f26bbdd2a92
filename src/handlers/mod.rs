pub mod common;
pub mod refunds;
pub mod replacements;
pub mod returns;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::repositories::returns::ReturnRequestStore;
use crate::services::collaborators::{
    OrderService, PaymentService, RbacService, ShippingService, StaticRbac, StubOrderService,
    StubPaymentService, StubShippingService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub returns: Arc<crate::services::returns::ReturnService>,
}

impl AppServices {
    /// Build a default AppServices container wired with the in-process stub
    /// collaborators. Real deployments swap these for clients of the payment,
    /// order, and shipping services via `with_collaborators`.
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        let orders = Arc::new(StubOrderService::new());
        let payments = Arc::new(StubPaymentService::new(orders.clone()));
        Self::with_collaborators(
            db_pool,
            event_sender,
            payments,
            orders,
            Arc::new(StubShippingService),
            Arc::new(StaticRbac),
        )
    }

    pub fn with_collaborators(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        payments: Arc<dyn PaymentService>,
        orders: Arc<dyn OrderService>,
        shipping: Arc<dyn ShippingService>,
        rbac: Arc<dyn RbacService>,
    ) -> Self {
        let store = ReturnRequestStore::new(db_pool);
        let returns = Arc::new(crate::services::returns::ReturnService::new(
            store,
            event_sender,
            payments,
            orders,
            shipping,
            rbac,
        ));

        Self { returns }
    }
}
