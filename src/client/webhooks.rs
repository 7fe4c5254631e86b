use super::ClientContext;
use super::error::ClientResult;
use super::inflight::invoice_key;
use crate::billing::{MockWebhookEvent, WebhookEventType, WebhookReceipt};

/// Sends mock provider events, as a payment provider would.
#[derive(Debug, Clone)]
pub struct WebhookSimulator {
    ctx: ClientContext,
}

impl WebhookSimulator {
    pub fn new(ctx: ClientContext) -> Self {
        Self { ctx }
    }

    pub async fn send(&self, event: &MockWebhookEvent) -> ClientResult<WebhookReceipt> {
        let api = self.ctx.api();
        self.ctx
            .write(Some(invoice_key(event.invoice)), "Webhook delivered", async move {
                let receipt: WebhookReceipt = api.post("/billing/webhooks/mock/", event).await?;
                tracing::debug!(invoice_id = receipt.invoice.id, outcome = %receipt.outcome, "webhook delivered");
                Ok(receipt)
            })
            .await
    }

    pub async fn succeeded(&self, invoice_id: i64, amount_cents: Option<i64>) -> ClientResult<WebhookReceipt> {
        let mut event = MockWebhookEvent::new(WebhookEventType::PaymentSucceeded, invoice_id);
        event.amount_cents = amount_cents;
        self.send(&event).await
    }

    pub async fn failed(&self, invoice_id: i64) -> ClientResult<WebhookReceipt> {
        self.send(&MockWebhookEvent::new(WebhookEventType::PaymentFailed, invoice_id))
            .await
    }
}
