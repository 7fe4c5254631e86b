use crate::app::AppContext;
use crate::auth::CurrentUser;
use crate::billing::{
    BillingError, CreateInvoice, IDEMPOTENCY_KEY_HEADER, IDEMPOTENT_REPLAYED_HEADER, IdempotencyKey, Invoice, MockWebhookEvent,
    PayReceipt, PayRequest, WebhookReceipt,
};
use crate::error::Result;
use crate::http::{CreatedResponse, RouteModule};
use crate::validation::ValidatedJson;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use validator::Validate;

/// Invoices, payments and the mock provider webhook.
pub struct BillingModule;

impl RouteModule for BillingModule {
    fn routes(&self) -> Router<AppContext> {
        Router::new()
            .route("/", get(list).post(create))
            .route("/{id}/", get(retrieve))
            .route("/{id}/pay/", post(pay))
            .route("/webhooks/mock/", post(webhook))
    }

    fn prefix(&self) -> Option<&str> {
        Some("/billing")
    }
}

async fn list(State(ctx): State<AppContext>, CurrentUser(principal): CurrentUser) -> Result<Json<Vec<Invoice>>> {
    Ok(Json(ctx.invoices.list(&principal).await?))
}

async fn retrieve(
    State(ctx): State<AppContext>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Invoice>> {
    Ok(Json(ctx.invoices.get(&principal, id).await?))
}

async fn create(
    State(ctx): State<AppContext>,
    CurrentUser(principal): CurrentUser,
    ValidatedJson(req): ValidatedJson<CreateInvoice>,
) -> Result<CreatedResponse<Invoice>> {
    let invoice = ctx.invoices.create(&principal, req).await?;
    let location = format!("/api/billing/{}/", invoice.id);
    Ok(CreatedResponse::new(invoice, location))
}

async fn pay(
    State(ctx): State<AppContext>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<i64>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let key = idempotency_key(&headers)?;
    let req = pay_request(&body)?;

    let outcome = ctx.invoices.pay(&principal, id, req, key).await?;

    let mut response = Json::<PayReceipt>(outcome.receipt).into_response();
    if outcome.replayed {
        response
            .headers_mut()
            .insert(IDEMPOTENT_REPLAYED_HEADER, HeaderValue::from_static("true"));
    }
    Ok(response)
}

async fn webhook(
    State(ctx): State<AppContext>,
    CurrentUser(principal): CurrentUser,
    ValidatedJson(event): ValidatedJson<MockWebhookEvent>,
) -> Result<Json<WebhookReceipt>> {
    Ok(Json(ctx.webhooks.handle_event(&principal, event).await?))
}

fn idempotency_key(headers: &HeaderMap) -> Result<Option<IdempotencyKey>> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| BillingError::InvalidIdempotencyKey {
            reason: "must be printable ASCII".to_string(),
        })?;
    Ok(Some(IdempotencyKey::parse(raw)?))
}

/// The pay body is optional; an empty body is a plain full-amount payment.
fn pay_request(body: &[u8]) -> Result<PayRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(PayRequest::default());
    }
    let req: PayRequest = serde_json::from_slice(body)?;
    req.validate()?;
    Ok(req)
}
