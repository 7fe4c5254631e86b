//! Mock payment-provider webhook reconciliation.
//!
//! Events are processed under the same invoice lock as direct pay and settle
//! through the shared [`Settlement`] routine, so an invoice paid by both paths
//! at once is still settled once.

use super::audit::{BillingAuditEvent, BillingAuditLogger};
use super::error::BillingError;
use super::invoice::{Invoice, InvoiceStatus, PaymentSource};
use super::locks::LockRegistry;
use super::settlement::Settlement;
use super::storage::{BillingStore, NewPayment};
use super::subscription::SubscriptionStatus;
use crate::auth::Principal;
use crate::error::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use validator::Validate;

pub(crate) const PROVIDER_REF_WEBHOOK: &str = "mock_webhook";

/// Supported event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEventType {
    PaymentSucceeded,
    PaymentFailed,
}

impl WebhookEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentSucceeded => "payment_intent.succeeded",
            Self::PaymentFailed => "payment_intent.failed",
        }
    }
}

impl fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookEventType {
    type Err = BillingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "payment_intent.succeeded" => Ok(Self::PaymentSucceeded),
            "payment_intent.failed" => Ok(Self::PaymentFailed),
            other => Err(BillingError::UnknownWebhookEvent {
                event_type: other.to_string(),
            }),
        }
    }
}

/// Body of `POST /billing/webhooks/mock/`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MockWebhookEvent {
    /// Provider event id; repeated ids are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub invoice: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, message = "Ensure this value is greater than or equal to 1."))]
    pub amount_cents: Option<i64>,
}

impl MockWebhookEvent {
    pub fn new(event_type: WebhookEventType, invoice: i64) -> Self {
        Self {
            id: None,
            event_type: event_type.as_str().to_string(),
            invoice,
            amount_cents: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_amount(mut self, amount_cents: i64) -> Self {
        self.amount_cents = Some(amount_cents);
        self
    }
}

/// Result of processing a webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// The invoice was settled by this event.
    Settled,
    /// The invoice was already paid; nothing changed.
    AlreadySettled,
    /// The event id was seen before; nothing changed.
    AlreadyProcessed,
    /// A failed payment was recorded.
    PaymentFailed,
    /// The event could not be applied; see the reason.
    Rejected,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Settled => "settled",
            Self::AlreadySettled => "already_settled",
            Self::AlreadyProcessed => "already_processed",
            Self::PaymentFailed => "payment_failed",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for WebhookOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response body of the webhook endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookReceipt {
    pub outcome: WebhookOutcome,
    pub invoice: Invoice,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Applies mock provider events to invoices.
pub struct WebhookHandler {
    store: Arc<dyn BillingStore>,
    locks: Arc<LockRegistry>,
    settlement: Arc<Settlement>,
    audit: Arc<dyn BillingAuditLogger>,
}

impl WebhookHandler {
    pub fn new(
        store: Arc<dyn BillingStore>,
        locks: Arc<LockRegistry>,
        settlement: Arc<Settlement>,
        audit: Arc<dyn BillingAuditLogger>,
    ) -> Self {
        Self {
            store,
            locks,
            settlement,
            audit,
        }
    }

    pub async fn handle_event(&self, principal: &Principal, event: MockWebhookEvent) -> Result<WebhookReceipt> {
        let event_type: WebhookEventType = event.event_type.parse()?;
        let invoice_id = event.invoice;

        let visible = self
            .store
            .get_invoice(invoice_id)
            .await?
            .is_some_and(|i| principal.can_access_tenant(i.tenant_id));
        if !visible {
            return Err(BillingError::InvoiceNotFound { invoice_id }.into());
        }

        let _guard = self.locks.invoice(invoice_id).await;

        let invoice = self
            .store
            .get_invoice(invoice_id)
            .await?
            .ok_or(BillingError::InvoiceNotFound { invoice_id })?;

        if let Some(id) = &event.id {
            if self.store.is_event_processed(id).await? {
                tracing::debug!(event_id = %id, invoice_id, "Webhook event already processed");
                return Ok(WebhookReceipt {
                    outcome: WebhookOutcome::AlreadyProcessed,
                    invoice,
                    reason: None,
                });
            }
        }

        let receipt = match event_type {
            WebhookEventType::PaymentSucceeded => self.handle_succeeded(invoice, event.amount_cents).await?,
            WebhookEventType::PaymentFailed => self.handle_failed(invoice, event.amount_cents).await?,
        };

        if let Some(id) = &event.id {
            self.store.mark_event_processed(id).await?;
        }

        tracing::info!(
            event_id = event.id.as_deref().unwrap_or("-"),
            event_type = %event_type,
            invoice_id,
            outcome = receipt.outcome.as_str(),
            "Webhook processed"
        );
        self.audit
            .log(BillingAuditEvent::WebhookProcessed {
                event_id: event.id.clone(),
                event_type: event_type.to_string(),
                invoice_id,
                outcome: receipt.outcome.as_str().to_string(),
            })
            .await;

        Ok(receipt)
    }

    async fn handle_succeeded(&self, invoice: Invoice, amount_cents: Option<i64>) -> Result<WebhookReceipt> {
        match invoice.status {
            InvoiceStatus::Paid => return Ok(already_settled(invoice)),
            InvoiceStatus::Void => return Ok(rejected(invoice, "invoice_void")),
            InvoiceStatus::Due => {}
        }

        if let Some(amount) = amount_cents.filter(|a| *a != invoice.amount_cents) {
            tracing::warn!(
                invoice_id = invoice.id,
                expected = invoice.amount_cents,
                actual = amount,
                "Webhook amount does not match invoice"
            );
            let invoice = self.record_failure(invoice, amount).await?;
            return Ok(rejected(invoice, "amount_mismatch"));
        }

        let receipt = self
            .settlement
            .settle(&invoice, PROVIDER_REF_WEBHOOK, PaymentSource::Webhook)
            .await?;
        Ok(WebhookReceipt {
            outcome: WebhookOutcome::Settled,
            invoice: receipt.invoice,
            reason: None,
        })
    }

    async fn handle_failed(&self, invoice: Invoice, amount_cents: Option<i64>) -> Result<WebhookReceipt> {
        match invoice.status {
            InvoiceStatus::Paid => return Ok(already_settled(invoice)),
            InvoiceStatus::Void => return Ok(rejected(invoice, "invoice_void")),
            InvoiceStatus::Due => {}
        }

        let amount = amount_cents.unwrap_or(invoice.amount_cents);
        let invoice = self.record_failure(invoice, amount).await?;
        self.mark_past_due(&invoice).await?;

        Ok(WebhookReceipt {
            outcome: WebhookOutcome::PaymentFailed,
            invoice,
            reason: None,
        })
    }

    async fn record_failure(&self, invoice: Invoice, amount_cents: i64) -> Result<Invoice> {
        self.store
            .record_payment(
                invoice.id,
                NewPayment::failed(amount_cents, PROVIDER_REF_WEBHOOK, PaymentSource::Webhook),
            )
            .await?;
        self.audit
            .log(BillingAuditEvent::PaymentFailed {
                tenant_id: invoice.tenant_id,
                invoice_id: invoice.id,
                source: PaymentSource::Webhook,
            })
            .await;

        Ok(self
            .store
            .get_invoice(invoice.id)
            .await?
            .ok_or(BillingError::InvoiceNotFound { invoice_id: invoice.id })?)
    }

    async fn mark_past_due(&self, invoice: &Invoice) -> Result<()> {
        let _guard = self.locks.tenant(invoice.tenant_id).await;

        let Some(mut subscription) = self.store.get_subscription(invoice.subscription_id).await? else {
            return Ok(());
        };
        if subscription.status != SubscriptionStatus::Active {
            return Ok(());
        }

        subscription.status = SubscriptionStatus::PastDue;
        subscription.updated_at = Utc::now();
        self.store.save_subscription(&subscription).await?;

        tracing::info!(subscription_id = subscription.id, "Subscription moved to past_due");
        self.audit
            .log(BillingAuditEvent::SubscriptionStatusChanged {
                tenant_id: subscription.tenant_id,
                subscription_id: subscription.id,
                from: SubscriptionStatus::Active,
                to: SubscriptionStatus::PastDue,
            })
            .await;
        Ok(())
    }
}

fn already_settled(invoice: Invoice) -> WebhookReceipt {
    WebhookReceipt {
        outcome: WebhookOutcome::AlreadySettled,
        invoice,
        reason: None,
    }
}

fn rejected(invoice: Invoice, reason: &str) -> WebhookReceipt {
    WebhookReceipt {
        outcome: WebhookOutcome::Rejected,
        invoice,
        reason: Some(reason.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_parsing() {
        assert_eq!(
            "payment_intent.succeeded".parse::<WebhookEventType>().unwrap(),
            WebhookEventType::PaymentSucceeded
        );
        assert_eq!(
            "payment_intent.failed".parse::<WebhookEventType>().unwrap(),
            WebhookEventType::PaymentFailed
        );
        let err = "charge.refunded".parse::<WebhookEventType>().unwrap_err();
        assert!(matches!(err, BillingError::UnknownWebhookEvent { .. }));
    }

    #[test]
    fn test_event_wire_format() {
        let event = MockWebhookEvent::new(WebhookEventType::PaymentSucceeded, 12)
            .with_id("evt_1")
            .with_amount(500);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "payment_intent.succeeded");
        assert_eq!(json["invoice"], 12);
        assert_eq!(json["id"], "evt_1");
        assert_eq!(json["amount_cents"], 500);

        let minimal: MockWebhookEvent =
            serde_json::from_str(r#"{"type":"payment_intent.failed","invoice":3}"#).unwrap();
        assert_eq!(minimal.id, None);
        assert_eq!(minimal.amount_cents, None);
    }

    #[test]
    fn test_outcome_serde() {
        assert_eq!(
            serde_json::to_string(&WebhookOutcome::AlreadyProcessed).unwrap(),
            "\"already_processed\""
        );
        assert_eq!(WebhookOutcome::PaymentFailed.as_str(), "payment_failed");
    }
}
