//! End-to-end tests for the return lifecycle over the HTTP surface:
//! creation, approval, the logistics chain, refund / replacement side-effect
//! triggers, role gating, and the audit timeline.

mod common;

use axum::http::{Method, StatusCode};
use common::{expect_status, TestApp};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

fn create_payload(order_id: Uuid, requested_action: &str) -> Value {
    json!({
        "order_id": order_id,
        "reason_code": "defective",
        "reason_text": "stopped charging after a week",
        "requested_action": requested_action,
        "pickup_address": "12 Rue de la Paix, Paris",
        "items": [{
            "order_item_id": Uuid::new_v4(),
            "sku": "SKU-HDPH-01",
            "product_name": "Noise-cancelling headphones",
            "quantity": 1,
            "condition": "defective",
            "unit_price": "100.00"
        }]
    })
}

/// Creates a return through the storefront endpoint; returns its id.
async fn create_return(app: &TestApp, requested_action: &str) -> Uuid {
    let order_id = Uuid::new_v4();
    app.orders.insert_order(order_id, dec!(100.00));

    let response = app
        .customer_request(
            Method::POST,
            "/api/v1/returns",
            Some(create_payload(order_id, requested_action)),
        )
        .await;
    let body = expect_status(response, StatusCode::CREATED).await;
    assert_eq!(body["data"]["status"], "pending");
    Uuid::parse_str(body["data"]["id"].as_str().expect("return id")).expect("uuid")
}

async fn approve(app: &TestApp, id: Uuid) {
    let response = app
        .admin_request(
            Method::PUT,
            &format!("/api/v1/returns/admin/{}/approve", id),
            Some(json!({
                "notes": "approved for carrier pickup",
                "pickup_scheduled": "2026-08-10T09:00:00Z",
                "pickup_carrier": "DHL"
            })),
            "manager",
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["data"]["status"], "approved");
}

/// Drives an approved request through the logistics chain to
/// `inspection_passed`.
async fn advance_to_inspection_passed(app: &TestApp, id: Uuid) {
    for status in [
        "pickup_scheduled",
        "picked_up",
        "in_transit",
        "received",
        "inspecting",
        "inspection_passed",
    ] {
        let response = app
            .admin_request(
                Method::PUT,
                &format!("/api/v1/returns/admin/{}/status", id),
                Some(json!({ "new_status": status })),
                "manager",
            )
            .await;
        let body = expect_status(response, StatusCode::OK).await;
        assert_eq!(body["data"]["status"], status);
    }
}

#[tokio::test]
async fn refund_scenario_reaches_refund_initiated_with_only_completed_left() {
    let app = TestApp::new().await;
    let id = create_return(&app, "refund").await;

    approve(&app, id).await;
    advance_to_inspection_passed(&app, id).await;

    // Refund half of the 100.00 order total.
    let response = app
        .admin_request(
            Method::POST,
            "/api/v1/refunds/admin",
            Some(json!({
                "return_id": id,
                "amount": "50.00",
                "method": "original_payment",
                "notes": "approved after inspection"
            })),
            "manager",
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["data"]["status"], "refund_initiated");
    assert!(body["data"]["refund_id"].as_str().is_some());

    // Detail shows the refund link, the timeline, and a single remaining edge.
    let response = app
        .admin_request(
            Method::GET,
            &format!("/api/v1/returns/admin/{}", id),
            None,
            "manager",
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    let detail = &body["data"];
    let amount: rust_decimal::Decimal = detail["refund"]["amount"]
        .as_str()
        .expect("refund amount")
        .parse()
        .expect("decimal");
    assert_eq!(amount, dec!(50.00));
    assert_eq!(detail["refund"]["status"], "pending");
    assert!(detail["replacement"].is_null());
    assert_eq!(
        detail["available_transitions"],
        json!(["completed"]),
        "after refund initiation only completion remains"
    );

    // creation + approval + six logistics flips + refund = 9 events.
    let timeline = detail["timeline"].as_array().expect("timeline");
    assert_eq!(timeline.len(), 9);
    let last = timeline.last().unwrap();
    assert_eq!(last["event_type"], "refund_initiated");
    assert_eq!(last["previous_status"], "inspection_passed");
    assert_eq!(last["new_status"], "refund_initiated");

    // Complete the request.
    let response = app
        .admin_request(
            Method::PUT,
            &format!("/api/v1/returns/admin/{}/status", id),
            Some(json!({ "new_status": "completed" })),
            "manager",
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["data"]["status"], "completed");
}

#[tokio::test]
async fn replacement_scenario_links_a_new_order_exactly_once() {
    let app = TestApp::new().await;
    let id = create_return(&app, "replacement").await;

    approve(&app, id).await;
    advance_to_inspection_passed(&app, id).await;

    let response = app
        .admin_request(
            Method::POST,
            "/api/v1/replacements/admin",
            Some(json!({ "return_id": id })),
            "manager",
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["data"]["status"], "replacement_initiated");
    assert!(body["data"]["replacement_order_id"].as_str().is_some());

    // A second compensation attempt is refused; the first link is permanent.
    let response = app
        .admin_request(
            Method::POST,
            "/api/v1/refunds/admin",
            Some(json!({ "return_id": id, "amount": "10.00" })),
            "manager",
        )
        .await;
    expect_status(response, StatusCode::UNPROCESSABLE_ENTITY).await;
}

#[tokio::test]
async fn reject_requires_notes_and_appends_one_event() {
    let app = TestApp::new().await;
    let id = create_return(&app, "refund").await;

    // Empty notes are refused before any write.
    let response = app
        .admin_request(
            Method::PUT,
            &format!("/api/v1/returns/admin/{}/reject", id),
            Some(json!({ "notes": "" })),
            "manager",
        )
        .await;
    expect_status(response, StatusCode::BAD_REQUEST).await;

    let response = app
        .admin_request(
            Method::PUT,
            &format!("/api/v1/returns/admin/{}/reject", id),
            Some(json!({ "notes": "outside the 30-day return window" })),
            "manager",
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["data"]["status"], "rejected");

    let response = app
        .admin_request(
            Method::GET,
            &format!("/api/v1/returns/admin/{}", id),
            None,
            "manager",
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    let timeline = body["data"]["timeline"].as_array().expect("timeline");
    assert_eq!(timeline.len(), 2, "creation plus exactly one rejection event");
    assert_eq!(timeline[1]["event_type"], "rejected");
    // Terminal state: nothing left to do.
    assert_eq!(body["data"]["available_transitions"], json!([]));
}

#[tokio::test]
async fn illegal_edges_are_rejected_with_unprocessable_entity() {
    let app = TestApp::new().await;
    let id = create_return(&app, "refund").await;

    let response = app
        .admin_request(
            Method::PUT,
            &format!("/api/v1/returns/admin/{}/status", id),
            Some(json!({ "new_status": "completed" })),
            "manager",
        )
        .await;
    expect_status(response, StatusCode::UNPROCESSABLE_ENTITY).await;

    // The request is untouched.
    let response = app
        .admin_request(
            Method::GET,
            &format!("/api/v1/returns/admin/{}", id),
            None,
            "manager",
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["data"]["request"]["status"], "pending");
}

#[tokio::test]
async fn refund_over_order_total_is_rejected() {
    let app = TestApp::new().await;
    let id = create_return(&app, "refund").await;

    approve(&app, id).await;
    advance_to_inspection_passed(&app, id).await;

    let response = app
        .admin_request(
            Method::POST,
            "/api/v1/refunds/admin",
            Some(json!({ "return_id": id, "amount": "150.00" })),
            "manager",
        )
        .await;
    expect_status(response, StatusCode::BAD_REQUEST).await;

    // Status is unchanged and no refund is linked.
    let response = app
        .admin_request(
            Method::GET,
            &format!("/api/v1/returns/admin/{}", id),
            None,
            "manager",
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["data"]["request"]["status"], "inspection_passed");
    assert!(body["data"]["refund"].is_null());
}

#[tokio::test]
async fn agents_cannot_trigger_financial_edges() {
    let app = TestApp::new().await;
    let id = create_return(&app, "refund").await;

    approve(&app, id).await;
    advance_to_inspection_passed(&app, id).await;

    let response = app
        .admin_request(
            Method::POST,
            "/api/v1/refunds/admin",
            Some(json!({ "return_id": id, "amount": "50.00" })),
            "agent",
        )
        .await;
    expect_status(response, StatusCode::FORBIDDEN).await;

    // The agent's detail view does not offer the financial edges either.
    let response = app
        .admin_request(
            Method::GET,
            &format!("/api/v1/returns/admin/{}", id),
            None,
            "agent",
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    let transitions = body["data"]["available_transitions"]
        .as_array()
        .expect("transitions");
    assert!(!transitions.contains(&json!("refund_initiated")));
    assert!(transitions.contains(&json!("completed")));
}

#[tokio::test]
async fn concurrent_approvals_commit_exactly_once() {
    let app = TestApp::new().await;
    let id = create_return(&app, "refund").await;

    let payload = json!({ "pickup_scheduled": "2026-08-10T09:00:00Z" });
    let uri = format!("/api/v1/returns/admin/{}/approve", id);
    let (first, second) = tokio::join!(
        app.admin_request(Method::PUT, &uri, Some(payload.clone()), "manager"),
        app.admin_request(Method::PUT, &uri, Some(payload.clone()), "manager"),
    );

    let statuses = [first.status(), second.status()];
    let successes = statuses.iter().filter(|s| **s == StatusCode::OK).count();
    assert_eq!(successes, 1, "exactly one approval may commit: {:?}", statuses);
    // The loser either lost the version race (409) or saw the committed
    // approval and an illegal edge (422).
    assert!(statuses.iter().any(|s| matches!(
        *s,
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY
    )));

    let response = app
        .admin_request(
            Method::GET,
            &format!("/api/v1/returns/admin/{}", id),
            None,
            "manager",
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["data"]["request"]["status"], "approved");
    // Creation plus exactly one approval event.
    assert_eq!(body["data"]["timeline"].as_array().expect("timeline").len(), 2);
}

#[tokio::test]
async fn list_filters_and_stats_reflect_the_store() {
    let app = TestApp::new().await;
    let first = create_return(&app, "refund").await;
    let _second = create_return(&app, "replacement").await;

    approve(&app, first).await;

    let response = app
        .admin_request(
            Method::GET,
            "/api/v1/returns/admin?status=approved",
            None,
            "manager",
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["status"], "approved");

    let stats = &body["data"]["stats"];
    assert_eq!(stats["total"], 2);

    let response = app
        .admin_request(Method::GET, "/api/v1/returns/admin/stats", None, "manager")
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["data"]["total"], 2);
}

#[tokio::test]
async fn missing_identity_headers_are_refused() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/returns/admin", None, &[])
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request(
            Method::POST,
            "/api/v1/returns",
            Some(create_payload(Uuid::new_v4(), "refund")),
            &[],
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_return_id_is_not_found() {
    let app = TestApp::new().await;

    let response = app
        .admin_request(
            Method::GET,
            &format!("/api/v1/returns/admin/{}", Uuid::new_v4()),
            None,
            "manager",
        )
        .await;
    let body = expect_status(response, StatusCode::NOT_FOUND).await;
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn customer_ships_approval_skips_pickup_scheduling() {
    let app = TestApp::new().await;
    let id = create_return(&app, "refund").await;

    let response = app
        .admin_request(
            Method::PUT,
            &format!("/api/v1/returns/admin/{}/approve", id),
            Some(json!({ "customer_ships": true, "notes": "label emailed" })),
            "manager",
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["data"]["status"], "approved");

    let response = app
        .admin_request(
            Method::GET,
            &format!("/api/v1/returns/admin/{}", id),
            None,
            "manager",
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    let request = &body["data"]["request"];
    assert_eq!(request["customer_ships"], true);
    assert!(request["pickup_ticket_id"].is_null());

    // Approval without a date or the flag is refused up front.
    let other = create_return(&app, "refund").await;
    let response = app
        .admin_request(
            Method::PUT,
            &format!("/api/v1/returns/admin/{}/approve", other),
            Some(json!({})),
            "manager",
        )
        .await;
    expect_status(response, StatusCode::BAD_REQUEST).await;
}

#[tokio::test]
async fn pickup_failure_can_be_redriven_to_approved() {
    let app = TestApp::new().await;
    let id = create_return(&app, "refund").await;

    approve(&app, id).await;

    // pickup_scheduled -> pickup_failed, then the re-drive edge back.
    for status in ["pickup_scheduled", "pickup_failed"] {
        let response = app
            .admin_request(
                Method::PUT,
                &format!("/api/v1/returns/admin/{}/status", id),
                Some(json!({ "new_status": status })),
                "manager",
            )
            .await;
        expect_status(response, StatusCode::OK).await;
    }

    let response = app
        .admin_request(
            Method::PUT,
            &format!("/api/v1/returns/admin/{}/approve", id),
            Some(json!({ "pickup_scheduled": "2026-08-17T09:00:00Z" })),
            "manager",
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["data"]["status"], "approved");
}

#[tokio::test]
async fn timeline_is_append_only_through_the_whole_flow() {
    let app = TestApp::new().await;
    let id = create_return(&app, "refund").await;

    approve(&app, id).await;

    // A manual note lands on the timeline without a status change.
    let response = app
        .admin_request(
            Method::POST,
            &format!("/api/v1/returns/admin/{}/notes", id),
            Some(json!({ "notes": "customer called to confirm the pickup slot" })),
            "agent",
        )
        .await;
    expect_status(response, StatusCode::OK).await;

    let response = app
        .admin_request(
            Method::GET,
            &format!("/api/v1/returns/admin/{}", id),
            None,
            "manager",
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    let timeline = body["data"]["timeline"].as_array().expect("timeline");
    assert_eq!(timeline.len(), 3);
    assert_eq!(timeline[0]["event_type"], "created");
    assert_eq!(timeline[1]["event_type"], "approved");
    assert_eq!(timeline[2]["event_type"], "note_added");
    assert!(timeline[2]["previous_status"].is_null());
    assert_eq!(body["data"]["request"]["status"], "approved");
}
