use super::ClientContext;
use super::error::ClientResult;
use super::inflight::invoice_key;
use crate::billing::{CreateInvoice, Invoice, PayOutcome, PayReceipt, PayRequest};
use rand::Rng;

const KEY_PREFIX: &str = "subpay";
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Options for a pay attempt.
#[derive(Debug, Clone, Default)]
pub struct PayOptions {
    /// Ask the server to decline the payment.
    pub simulate_fail: bool,
    pub idempotency_key: Option<String>,
    /// Must equal the invoice amount when given.
    pub amount_cents: Option<i64>,
}

impl PayOptions {
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            idempotency_key: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn simulate_fail(mut self) -> Self {
        self.simulate_fail = true;
        self
    }
}

/// A fresh key of the form `subpay-<unix-millis>-<random base36>`.
pub fn generate_idempotency_key() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..10)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{KEY_PREFIX}-{millis}-{suffix}")
}

/// Invoice and payment actions.
#[derive(Debug, Clone)]
pub struct InvoiceClient {
    ctx: ClientContext,
}

impl InvoiceClient {
    pub fn new(ctx: ClientContext) -> Self {
        Self { ctx }
    }

    pub async fn list(&self) -> ClientResult<Vec<Invoice>> {
        self.ctx.api().get("/billing/").await
    }

    /// A new `due` invoice priced from the subscription's plan.
    pub async fn create(&self, subscription_id: i64) -> ClientResult<Invoice> {
        let api = self.ctx.api();
        let body = CreateInvoice {
            subscription: subscription_id,
        };
        self.ctx
            .write(Some(format!("invoice:new:{subscription_id}")), "Invoice created", async move {
                api.post("/billing/", &body).await
            })
            .await
    }

    /// Pay an invoice. A decline comes back as
    /// [`ClientError::PaymentDeclined`](super::ClientError::PaymentDeclined)
    /// and leaves the invoice unpaid; retry with the same key.
    pub async fn pay(&self, invoice_id: i64, options: PayOptions) -> ClientResult<PayOutcome> {
        let api = self.ctx.api();
        let path = format!("/billing/{invoice_id}/pay/");
        let body = PayRequest {
            simulate: options.simulate_fail,
            amount_cents: options.amount_cents,
        };
        let key = options.idempotency_key;

        self.ctx
            .write(Some(invoice_key(invoice_id)), "Invoice paid", async move {
                let reply = api.post_idempotent::<_, PayReceipt>(&path, &body, key.as_deref()).await?;
                if reply.replayed {
                    tracing::debug!(invoice_id, "payment replayed from idempotency key");
                }
                Ok(PayOutcome {
                    receipt: reply.body,
                    replayed: reply.replayed,
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_key_shape() {
        let key = generate_idempotency_key();
        let parts: Vec<&str> = key.splitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "subpay");
        assert!(parts[1].parse::<i64>().unwrap() > 0);
        assert_eq!(parts[2].len(), 10);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_generated_keys_differ() {
        assert_ne!(generate_idempotency_key(), generate_idempotency_key());
    }

    #[test]
    fn test_pay_options() {
        let options = PayOptions::with_key("k").simulate_fail();
        assert!(options.simulate_fail);
        assert_eq!(options.idempotency_key.as_deref(), Some("k"));
        assert_eq!(options.amount_cents, None);
    }
}
