use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use rma_api::{
    config::AppConfig,
    db::{self, DbConfig},
    events::{self, EventSender},
    handlers::AppServices,
    services::collaborators::{
        StaticRbac, StubOrderService, StubPaymentService, StubShippingService,
    },
    AppState,
};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// Harness spinning up the full router over an in-memory SQLite database and
/// the in-process stub collaborators.
pub struct TestApp {
    router: Router,
    #[allow(dead_code)]
    pub state: AppState,
    /// Shared order book backing the stub payment / order collaborators.
    pub orders: Arc<StubOrderService>,
    pub admin_id: Uuid,
    pub customer_id: Uuid,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        // A single pooled connection keeps every query on the same in-memory
        // SQLite database.
        let db_cfg = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = db::establish_connection_with_config(&db_cfg)
            .await
            .expect("failed to create test database");
        rma_api::migrator::Migrator::up(&pool, None)
            .await
            .expect("migrations");

        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let orders = Arc::new(StubOrderService::new());
        let payments = Arc::new(StubPaymentService::new(orders.clone()));
        let services = AppServices::with_collaborators(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            payments,
            orders.clone(),
            Arc::new(StubShippingService),
            Arc::new(StaticRbac),
        );

        let config = AppConfig {
            database_url: "sqlite::memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: 18_080,
            environment: "test".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            auto_migrate: true,
            cors_allowed_origins: None,
            cors_allow_any_origin: true,
            db_max_connections: 1,
            db_min_connections: 1,
            db_connect_timeout_secs: 30,
            db_acquire_timeout_secs: 8,
            db_idle_timeout_secs: 600,
        };

        let state = AppState {
            db: db_arc,
            config,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", rma_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            orders,
            admin_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            _event_task: event_task,
        }
    }

    /// Raw request with explicit headers.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, String)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    /// Staff call with the given role.
    pub async fn admin_request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        role: &str,
    ) -> Response {
        self.request(
            method,
            uri,
            body,
            &[
                ("x-admin-id", self.admin_id.to_string()),
                ("x-admin-role", role.to_string()),
            ],
        )
        .await
    }

    /// Storefront customer call.
    pub async fn customer_request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request(
            method,
            uri,
            body,
            &[("x-user-id", self.customer_id.to_string())],
        )
        .await
    }
}

/// Decode a response body as JSON.
pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Assert status and decode in one step, with the body in the failure message.
pub async fn expect_status(response: Response, expected: StatusCode) -> Value {
    let status = response.status();
    let body = response_json(response).await;
    assert_eq!(status, expected, "unexpected status, body: {}", body);
    body
}
