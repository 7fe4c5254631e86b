//! Plans, subscriptions, invoices, payments and webhooks over the router.

use eshtarek::billing::{
    BillingAuditEvent, IDEMPOTENT_REPLAYED_HEADER, InvoiceStatus, PaymentSource, PaymentStatus, SubscriptionStatus, format_cents,
};
use eshtarek::testing::TestWorld;
use serde_json::{Value, json};

// =============================================================================
// Plans
// =============================================================================

#[tokio::test]
async fn test_plans_are_public_and_priced() {
    let world = TestWorld::new().await;

    let plans: Vec<Value> = world.get("/api/plans/").execute().await.assert_ok().json().await;
    let names: Vec<&str> = plans.iter().filter_map(|p| p["name"].as_str()).collect();
    assert!(names.contains(&"Basic"));
    assert!(names.contains(&"Pro"));

    assert_eq!(world.basic.display_price(), "$9.99");
    assert_eq!(world.pro.display_price(), "$29.99");
    assert_eq!(format_cents(1200), "$12.00");
    assert_eq!(format_cents(5), "$0.05");
}

#[tokio::test]
async fn test_plan_writes_need_platform_admin() {
    let world = TestWorld::new().await;
    let body = json!({"name": "Enterprise", "price_cents": 9900, "max_users": 100});

    world
        .post("/api/plans/")
        .json_body(&body)
        .execute()
        .await
        .assert_unauthorized();

    world
        .post("/api/plans/")
        .bearer_token(&world.token(&world.acme_admin))
        .json_body(&body)
        .execute()
        .await
        .assert_forbidden();

    world
        .post("/api/plans/")
        .bearer_token(&world.token(&world.admin))
        .json_body(&body)
        .execute()
        .await
        .assert_created()
        .assert_json_path("name", json!("Enterprise"))
        .await
        .assert_json_path("interval", json!("monthly"))
        .await;
}

#[tokio::test]
async fn test_plan_validation() {
    let world = TestWorld::new().await;

    world
        .post("/api/plans/")
        .bearer_token(&world.token(&world.admin))
        .json_body(&json!({"name": "Broken", "price_cents": -1, "max_users": 0}))
        .execute()
        .await
        .assert_bad_request()
        .assert_field_error("price_cents")
        .await
        .assert_field_error("max_users")
        .await;

    world
        .post("/api/plans/")
        .bearer_token(&world.token(&world.admin))
        .json_body(&json!({"name": "Basic", "price_cents": 100}))
        .execute()
        .await
        .assert_bad_request()
        .assert_field_error("name")
        .await;
}

#[tokio::test]
async fn test_plan_update() {
    let world = TestWorld::new().await;

    world
        .put(&format!("/api/plans/{}/", world.basic.id))
        .bearer_token(&world.token(&world.admin))
        .json_body(&json!({"name": "Basic", "price_cents": 1200, "max_users": 5}))
        .execute()
        .await
        .assert_ok()
        .assert_json_path("price_cents", json!(1200))
        .await;
}

#[tokio::test]
async fn test_plan_delete_blocked_while_in_use() {
    let world = TestWorld::new().await;
    world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let admin = world.token(&world.admin);

    world
        .delete(&format!("/api/plans/{}/", world.basic.id))
        .bearer_token(&admin)
        .execute()
        .await
        .assert_conflict();

    world
        .delete(&format!("/api/plans/{}/", world.pro.id))
        .bearer_token(&admin)
        .execute()
        .await
        .assert_no_content();

    world
        .get(&format!("/api/plans/{}/", world.pro.id))
        .execute()
        .await
        .assert_not_found();
}

// =============================================================================
// Subscriptions
// =============================================================================

#[tokio::test]
async fn test_create_subscription_is_active_on_requested_plan() {
    let world = TestWorld::new().await;

    world
        .post("/api/subscriptions/")
        .bearer_token(&world.token(&world.acme_user))
        .json_body(&json!({"plan": world.basic.id}))
        .execute()
        .await
        .assert_created()
        .assert_json_path("status", json!("active"))
        .await
        .assert_json_path("plan", json!(world.basic.id))
        .await
        .assert_json_path("tenant", json!(world.acme.id))
        .await;
}

#[tokio::test]
async fn test_single_active_subscription_per_tenant() {
    let world = TestWorld::new().await;
    let token = world.token(&world.acme_admin);

    world
        .post("/api/subscriptions/")
        .bearer_token(&token)
        .json_body(&json!({"plan": world.basic.id}))
        .execute()
        .await
        .assert_created();

    world
        .post("/api/subscriptions/")
        .bearer_token(&token)
        .json_body(&json!({"plan": world.pro.id}))
        .execute()
        .await
        .assert_bad_request()
        .assert_field_error("tenant")
        .await;

    // A second, non-active subscription is allowed but cannot be activated.
    let trial: Value = world
        .post("/api/subscriptions/")
        .bearer_token(&token)
        .json_body(&json!({"plan": world.pro.id, "status": "trialing"}))
        .execute()
        .await
        .assert_created()
        .json()
        .await;

    world
        .post(&format!("/api/subscriptions/{}/change-status/", trial["id"]))
        .bearer_token(&token)
        .json_body(&json!({"status": "active"}))
        .execute()
        .await
        .assert_bad_request();
}

#[tokio::test]
async fn test_other_tenants_can_subscribe_independently() {
    let world = TestWorld::new().await;

    for user in [&world.acme_admin, &world.globex_admin] {
        world
            .post("/api/subscriptions/")
            .bearer_token(&world.token(user))
            .json_body(&json!({"plan": world.basic.id}))
            .execute()
            .await
            .assert_created();
    }
}

#[tokio::test]
async fn test_subscriptions_are_tenant_scoped() {
    let world = TestWorld::new().await;
    let acme = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    world.subscribe(&world.globex, &world.pro, SubscriptionStatus::Active).await;

    let visible: Vec<Value> = world
        .get("/api/subscriptions/")
        .bearer_token(&world.token(&world.acme_user))
        .execute()
        .await
        .assert_ok()
        .json()
        .await;
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0]["id"], json!(acme.id));

    world
        .get(&format!("/api/subscriptions/{}/", acme.id))
        .bearer_token(&world.token(&world.globex_admin))
        .execute()
        .await
        .assert_not_found();

    let all: Vec<Value> = world
        .get("/api/subscriptions/")
        .bearer_token(&world.token(&world.admin))
        .execute()
        .await
        .assert_ok()
        .json()
        .await;
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_tenant_admin_cannot_subscribe_other_tenant() {
    let world = TestWorld::new().await;

    world
        .post("/api/subscriptions/")
        .bearer_token(&world.token(&world.acme_admin))
        .json_body(&json!({"plan": world.basic.id, "tenant": world.globex.id}))
        .execute()
        .await
        .assert_forbidden();

    world
        .post("/api/subscriptions/")
        .bearer_token(&world.token(&world.admin))
        .json_body(&json!({"plan": world.basic.id, "tenant": world.globex.id}))
        .execute()
        .await
        .assert_created()
        .assert_json_path("tenant", json!(world.globex.id))
        .await;
}

#[tokio::test]
async fn test_change_plan_and_inactive_plan() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let token = world.token(&world.acme_admin);

    world
        .post(&format!("/api/subscriptions/{}/change-plan/", sub.id))
        .bearer_token(&token)
        .json_body(&json!({"plan": world.pro.id}))
        .execute()
        .await
        .assert_ok()
        .assert_json_path("plan", json!(world.pro.id))
        .await;

    let retired: Value = world
        .post("/api/plans/")
        .bearer_token(&world.token(&world.admin))
        .json_body(&json!({"name": "Legacy", "price_cents": 100, "active": false}))
        .execute()
        .await
        .assert_created()
        .json()
        .await;

    world
        .post(&format!("/api/subscriptions/{}/change-plan/", sub.id))
        .bearer_token(&token)
        .json_body(&json!({"plan": retired["id"]}))
        .execute()
        .await
        .assert_bad_request()
        .assert_field_error("plan")
        .await;
}

#[tokio::test]
async fn test_tenant_user_cannot_change_status_or_delete() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let token = world.token(&world.acme_user);

    world
        .post(&format!("/api/subscriptions/{}/change-status/", sub.id))
        .bearer_token(&token)
        .json_body(&json!({"status": "canceled"}))
        .execute()
        .await
        .assert_forbidden();

    world
        .delete(&format!("/api/subscriptions/{}/", sub.id))
        .bearer_token(&token)
        .execute()
        .await
        .assert_forbidden();
}

#[tokio::test]
async fn test_delete_subscription_removes_invoices() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let invoice = world.invoice(&sub).await;
    let token = world.token(&world.acme_admin);

    world
        .delete(&format!("/api/subscriptions/{}/", sub.id))
        .bearer_token(&token)
        .execute()
        .await
        .assert_no_content();

    world
        .get(&format!("/api/billing/{}/", invoice.id))
        .bearer_token(&token)
        .execute()
        .await
        .assert_not_found();
}

// =============================================================================
// Invoices
// =============================================================================

#[tokio::test]
async fn test_create_invoice_uses_plan_price() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.pro, SubscriptionStatus::Active).await;

    world
        .post("/api/billing/")
        .bearer_token(&world.token(&world.acme_admin))
        .json_body(&json!({"subscription": sub.id}))
        .execute()
        .await
        .assert_created()
        .assert_json_path("amount_cents", json!(2999))
        .await
        .assert_json_path("status", json!("due"))
        .await
        .assert_json_path("currency", json!("USD"))
        .await;
}

#[tokio::test]
async fn test_create_invoice_for_foreign_subscription() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.globex, &world.pro, SubscriptionStatus::Active).await;

    world
        .post("/api/billing/")
        .bearer_token(&world.token(&world.acme_admin))
        .json_body(&json!({"subscription": sub.id}))
        .execute()
        .await
        .assert_bad_request()
        .assert_field_error("subscription")
        .await;
}

#[tokio::test]
async fn test_tenant_user_cannot_invoice_or_pay() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let invoice = world.invoice(&sub).await;
    let token = world.token(&world.acme_user);

    world
        .post("/api/billing/")
        .bearer_token(&token)
        .json_body(&json!({"subscription": sub.id}))
        .execute()
        .await
        .assert_forbidden();

    world
        .post(&format!("/api/billing/{}/pay/", invoice.id))
        .bearer_token(&token)
        .execute()
        .await
        .assert_forbidden();

    // Reads stay open to the tenant.
    world
        .get(&format!("/api/billing/{}/", invoice.id))
        .bearer_token(&token)
        .execute()
        .await
        .assert_ok();
}

// =============================================================================
// Payments and idempotency
// =============================================================================

#[tokio::test]
async fn test_pay_settles_invoice() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let invoice = world.invoice(&sub).await;

    world
        .post(&format!("/api/billing/{}/pay/", invoice.id))
        .bearer_token(&world.token(&world.acme_admin))
        .execute()
        .await
        .assert_ok()
        .assert_no_header(IDEMPOTENT_REPLAYED_HEADER)
        .assert_json_path("invoice.status", json!("paid"))
        .await
        .assert_json_path("payment.status", json!("succeeded"))
        .await
        .assert_json_path("payment.amount_cents", json!(999))
        .await;

    let stored = world.get_invoice(invoice.id).await;
    assert_eq!(stored.status, InvoiceStatus::Paid);
    assert!(stored.paid_at.is_some());
}

#[tokio::test]
async fn test_same_key_pays_once_and_replays() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let invoice = world.invoice(&sub).await;
    let token = world.token(&world.acme_admin);
    let uri = format!("/api/billing/{}/pay/", invoice.id);

    let first: Value = world
        .post(&uri)
        .bearer_token(&token)
        .idempotency_key("subpay-1-abc")
        .json_body(&json!({}))
        .execute()
        .await
        .assert_ok()
        .json()
        .await;

    let second: Value = world
        .post(&uri)
        .bearer_token(&token)
        .idempotency_key("subpay-1-abc")
        .json_body(&json!({}))
        .execute()
        .await
        .assert_ok()
        .assert_header(IDEMPOTENT_REPLAYED_HEADER, "true")
        .json()
        .await;

    assert_eq!(first["payment"]["id"], second["payment"]["id"]);

    let stored = world.get_invoice(invoice.id).await;
    let succeeded = stored
        .payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Succeeded)
        .count();
    assert_eq!(succeeded, 1);
}

#[tokio::test]
async fn test_concurrent_pays_with_same_key_settle_once() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let invoice = world.invoice(&sub).await;
    let token = world.token(&world.acme_admin);
    let uri = format!("/api/billing/{}/pay/", invoice.id);

    let pay = || {
        world
            .post(&uri)
            .bearer_token(&token)
            .idempotency_key("subpay-race")
            .execute()
    };
    let (a, b) = tokio::join!(pay(), pay());
    assert!(a.status().is_success());
    assert!(b.status().is_success());

    let stored = world.get_invoice(invoice.id).await;
    assert_eq!(stored.payments.len(), 1);
}

#[tokio::test]
async fn test_paying_paid_invoice_without_key_is_rejected() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let invoice = world.invoice(&sub).await;
    let token = world.token(&world.acme_admin);
    let uri = format!("/api/billing/{}/pay/", invoice.id);

    world.post(&uri).bearer_token(&token).execute().await.assert_ok();
    world
        .post(&uri)
        .bearer_token(&token)
        .execute()
        .await
        .assert_bad_request();
}

#[tokio::test]
async fn test_key_reused_on_another_invoice_conflicts() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let first = world.invoice(&sub).await;
    let second = world.invoice(&sub).await;
    let token = world.token(&world.acme_admin);

    world
        .post(&format!("/api/billing/{}/pay/", first.id))
        .bearer_token(&token)
        .idempotency_key("shared-key")
        .execute()
        .await
        .assert_ok();

    world
        .post(&format!("/api/billing/{}/pay/", second.id))
        .bearer_token(&token)
        .idempotency_key("shared-key")
        .execute()
        .await
        .assert_conflict();

    assert_eq!(world.get_invoice(second.id).await.status, InvoiceStatus::Due);
}

#[tokio::test]
async fn test_simulated_decline_leaves_invoice_due_and_key_unbound() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let invoice = world.invoice(&sub).await;
    let token = world.token(&world.acme_admin);
    let uri = format!("/api/billing/{}/pay/", invoice.id);

    world
        .post(&uri)
        .bearer_token(&token)
        .idempotency_key("retry-me")
        .json_body(&json!({"simulate": true}))
        .execute()
        .await
        .assert_payment_required();

    let declined = world.get_invoice(invoice.id).await;
    assert_eq!(declined.status, InvoiceStatus::Due);
    assert_eq!(declined.payments.len(), 1);
    assert_eq!(declined.payments[0].status, PaymentStatus::Failed);

    // The same key still performs a real payment.
    world
        .post(&uri)
        .bearer_token(&token)
        .idempotency_key("retry-me")
        .json_body(&json!({}))
        .execute()
        .await
        .assert_ok()
        .assert_no_header(IDEMPOTENT_REPLAYED_HEADER)
        .assert_json_path("invoice.status", json!("paid"))
        .await;
}

#[tokio::test]
async fn test_pay_amount_must_match_invoice() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let invoice = world.invoice(&sub).await;

    world
        .post(&format!("/api/billing/{}/pay/", invoice.id))
        .bearer_token(&world.token(&world.acme_admin))
        .json_body(&json!({"amount_cents": 1}))
        .execute()
        .await
        .assert_bad_request();

    assert_eq!(world.get_invoice(invoice.id).await.status, InvoiceStatus::Due);
}

#[tokio::test]
async fn test_malformed_idempotency_key() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let invoice = world.invoice(&sub).await;

    world
        .post(&format!("/api/billing/{}/pay/", invoice.id))
        .bearer_token(&world.token(&world.acme_admin))
        .idempotency_key(&"k".repeat(300))
        .execute()
        .await
        .assert_bad_request();
}

#[tokio::test]
async fn test_paying_reactivates_past_due_subscription() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::PastDue).await;
    let invoice = world.invoice(&sub).await;
    let token = world.token(&world.acme_admin);

    world
        .post(&format!("/api/billing/{}/pay/", invoice.id))
        .bearer_token(&token)
        .execute()
        .await
        .assert_ok();

    world
        .get(&format!("/api/subscriptions/{}/", sub.id))
        .bearer_token(&token)
        .execute()
        .await
        .assert_ok()
        .assert_json_path("status", json!("active"))
        .await;
}

// =============================================================================
// Webhooks
// =============================================================================

fn webhook(kind: &str, invoice: i64) -> Value {
    json!({"type": kind, "invoice": invoice})
}

#[tokio::test]
async fn test_webhook_succeeded_settles_invoice() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let invoice = world.invoice(&sub).await;

    world
        .post("/api/billing/webhooks/mock/")
        .bearer_token(&world.token(&world.acme_admin))
        .json_body(&webhook("payment_intent.succeeded", invoice.id))
        .execute()
        .await
        .assert_ok()
        .assert_json_path("outcome", json!("settled"))
        .await
        .assert_json_path("invoice.status", json!("paid"))
        .await;

    let stored = world.get_invoice(invoice.id).await;
    let payment = stored.succeeded_payment().unwrap();
    assert_eq!(payment.source, PaymentSource::Webhook);
}

#[tokio::test]
async fn test_webhook_then_pay_settles_once() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let invoice = world.invoice(&sub).await;
    let token = world.token(&world.acme_admin);

    world
        .post("/api/billing/webhooks/mock/")
        .bearer_token(&token)
        .json_body(&webhook("payment_intent.succeeded", invoice.id))
        .execute()
        .await
        .assert_ok();

    world
        .post(&format!("/api/billing/{}/pay/", invoice.id))
        .bearer_token(&token)
        .execute()
        .await
        .assert_bad_request();

    let stored = world.get_invoice(invoice.id).await;
    assert_eq!(stored.payments.len(), 1);
}

#[tokio::test]
async fn test_pay_then_webhook_is_already_settled() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let invoice = world.invoice(&sub).await;
    let token = world.token(&world.acme_admin);

    world
        .post(&format!("/api/billing/{}/pay/", invoice.id))
        .bearer_token(&token)
        .execute()
        .await
        .assert_ok();

    world
        .post("/api/billing/webhooks/mock/")
        .bearer_token(&token)
        .json_body(&webhook("payment_intent.succeeded", invoice.id))
        .execute()
        .await
        .assert_ok()
        .assert_json_path("outcome", json!("already_settled"))
        .await;

    let stored = world.get_invoice(invoice.id).await;
    assert_eq!(stored.payments.len(), 1);
    assert_eq!(stored.succeeded_payment().unwrap().source, PaymentSource::Direct);
}

#[tokio::test]
async fn test_concurrent_webhook_and_pay_settle_once() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let invoice = world.invoice(&sub).await;
    let token = world.token(&world.acme_admin);
    let body = webhook("payment_intent.succeeded", invoice.id);
    let uri = format!("/api/billing/{}/pay/", invoice.id);

    let (hook, pay) = tokio::join!(
        world
            .post("/api/billing/webhooks/mock/")
            .bearer_token(&token)
            .json_body(&body)
            .execute(),
        world.post(&uri).bearer_token(&token).execute(),
    );
    assert!(hook.status().is_success());
    // Either the pay call won, or it saw the invoice already paid.
    assert!(pay.status().is_success() || pay.status().is_client_error());

    let stored = world.get_invoice(invoice.id).await;
    assert_eq!(stored.status, InvoiceStatus::Paid);
    let succeeded = stored
        .payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Succeeded)
        .count();
    assert_eq!(succeeded, 1);
}

#[tokio::test]
async fn test_webhook_failed_marks_subscription_past_due() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let invoice = world.invoice(&sub).await;
    let token = world.token(&world.acme_admin);

    world
        .post("/api/billing/webhooks/mock/")
        .bearer_token(&token)
        .json_body(&webhook("payment_intent.failed", invoice.id))
        .execute()
        .await
        .assert_ok()
        .assert_json_path("outcome", json!("payment_failed"))
        .await
        .assert_json_path("invoice.status", json!("due"))
        .await;

    world
        .get(&format!("/api/subscriptions/{}/", sub.id))
        .bearer_token(&token)
        .execute()
        .await
        .assert_ok()
        .assert_json_path("status", json!("past_due"))
        .await;
}

#[tokio::test]
async fn test_webhook_event_id_processed_once() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let invoice = world.invoice(&sub).await;
    let token = world.token(&world.acme_admin);
    let mut body = webhook("payment_intent.failed", invoice.id);
    body["id"] = json!("evt_1");

    for expected in ["payment_failed", "already_processed"] {
        world
            .post("/api/billing/webhooks/mock/")
            .bearer_token(&token)
            .json_body(&body)
            .execute()
            .await
            .assert_ok()
            .assert_json_path("outcome", json!(expected))
            .await;
    }

    assert_eq!(world.get_invoice(invoice.id).await.payments.len(), 1);
}

#[tokio::test]
async fn test_webhook_amount_mismatch_is_rejected() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let invoice = world.invoice(&sub).await;

    let mut body = webhook("payment_intent.succeeded", invoice.id);
    body["amount_cents"] = json!(1);

    world
        .post("/api/billing/webhooks/mock/")
        .bearer_token(&world.token(&world.acme_admin))
        .json_body(&body)
        .execute()
        .await
        .assert_ok()
        .assert_json_path("outcome", json!("rejected"))
        .await
        .assert_json_path("reason", json!("amount_mismatch"))
        .await
        .assert_json_path("invoice.status", json!("due"))
        .await;
}

#[tokio::test]
async fn test_webhook_unknown_type_and_foreign_invoice() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let invoice = world.invoice(&sub).await;

    world
        .post("/api/billing/webhooks/mock/")
        .bearer_token(&world.token(&world.acme_admin))
        .json_body(&webhook("charge.refunded", invoice.id))
        .execute()
        .await
        .assert_bad_request();

    world
        .post("/api/billing/webhooks/mock/")
        .bearer_token(&world.token(&world.globex_admin))
        .json_body(&webhook("payment_intent.succeeded", invoice.id))
        .execute()
        .await
        .assert_not_found();
}

#[tokio::test]
async fn test_settlement_is_audited() {
    let world = TestWorld::new().await;
    let sub = world.subscribe(&world.acme, &world.basic, SubscriptionStatus::Active).await;
    let invoice = world.invoice(&sub).await;

    world
        .post(&format!("/api/billing/{}/pay/", invoice.id))
        .bearer_token(&world.token(&world.acme_admin))
        .execute()
        .await
        .assert_ok();

    let events = world.audit.events().await;
    let paid = events.iter().any(|event| {
        matches!(event, BillingAuditEvent::InvoicePaid { invoice_id, .. } if *invoice_id == invoice.id)
    });
    assert!(paid);
}
