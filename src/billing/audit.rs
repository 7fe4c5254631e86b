//! Audit logging for billing operations.
//!
//! Every state change on subscriptions, invoices and payments emits one
//! [`BillingAuditEvent`].

use super::invoice::PaymentSource;
use super::subscription::SubscriptionStatus;
use async_trait::async_trait;
use std::fmt;
use uuid::Uuid;

/// Audit event types for billing operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingAuditEvent {
    SubscriptionCreated {
        tenant_id: Uuid,
        subscription_id: i64,
        plan_id: i64,
    },
    SubscriptionPlanChanged {
        tenant_id: Uuid,
        subscription_id: i64,
        from_plan: i64,
        to_plan: i64,
    },
    SubscriptionStatusChanged {
        tenant_id: Uuid,
        subscription_id: i64,
        from: SubscriptionStatus,
        to: SubscriptionStatus,
    },
    SubscriptionDeleted {
        tenant_id: Uuid,
        subscription_id: i64,
    },
    InvoiceCreated {
        tenant_id: Uuid,
        invoice_id: i64,
        amount_cents: i64,
    },
    /// Invoice settled by a succeeded payment.
    InvoicePaid {
        tenant_id: Uuid,
        invoice_id: i64,
        payment_id: i64,
        source: PaymentSource,
    },
    /// A failed payment was recorded.
    PaymentFailed {
        tenant_id: Uuid,
        invoice_id: i64,
        source: PaymentSource,
    },
    /// A stored receipt was returned for a reused idempotency key.
    PaymentReplayed {
        tenant_id: Uuid,
        invoice_id: i64,
    },
    WebhookProcessed {
        event_id: Option<String>,
        event_type: String,
        invoice_id: i64,
        outcome: String,
    },
}

impl fmt::Display for BillingAuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubscriptionCreated { tenant_id, subscription_id, plan_id } => {
                write!(f, "Subscription created: tenant={}, sub={}, plan={}", tenant_id, subscription_id, plan_id)
            }
            Self::SubscriptionPlanChanged { tenant_id, subscription_id, from_plan, to_plan } => {
                write!(
                    f,
                    "Subscription plan changed: tenant={}, sub={}, from={}, to={}",
                    tenant_id, subscription_id, from_plan, to_plan
                )
            }
            Self::SubscriptionStatusChanged { tenant_id, subscription_id, from, to } => {
                write!(
                    f,
                    "Subscription status changed: tenant={}, sub={}, from={}, to={}",
                    tenant_id, subscription_id, from, to
                )
            }
            Self::SubscriptionDeleted { tenant_id, subscription_id } => {
                write!(f, "Subscription deleted: tenant={}, sub={}", tenant_id, subscription_id)
            }
            Self::InvoiceCreated { tenant_id, invoice_id, amount_cents } => {
                write!(f, "Invoice created: tenant={}, invoice={}, amount_cents={}", tenant_id, invoice_id, amount_cents)
            }
            Self::InvoicePaid { tenant_id, invoice_id, payment_id, source } => {
                write!(
                    f,
                    "Invoice paid: tenant={}, invoice={}, payment={}, source={:?}",
                    tenant_id, invoice_id, payment_id, source
                )
            }
            Self::PaymentFailed { tenant_id, invoice_id, source } => {
                write!(f, "Payment failed: tenant={}, invoice={}, source={:?}", tenant_id, invoice_id, source)
            }
            Self::PaymentReplayed { tenant_id, invoice_id } => {
                write!(f, "Payment replayed: tenant={}, invoice={}", tenant_id, invoice_id)
            }
            Self::WebhookProcessed { event_id, event_type, invoice_id, outcome } => {
                write!(
                    f,
                    "Webhook processed: event={}, type={}, invoice={}, outcome={}",
                    event_id.as_deref().unwrap_or("-"),
                    event_type,
                    invoice_id,
                    outcome
                )
            }
        }
    }
}

/// Trait for audit logging backends.
///
/// Implementations should not fail billing operations; log and move on.
#[async_trait]
pub trait BillingAuditLogger: Send + Sync {
    async fn log(&self, event: BillingAuditEvent);
}

/// No-op audit logger.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAuditLogger;

#[async_trait]
impl BillingAuditLogger for NoOpAuditLogger {
    async fn log(&self, _event: BillingAuditEvent) {}
}

/// Logs audit events at INFO level under the `billing::audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLogger;

#[async_trait]
impl BillingAuditLogger for TracingAuditLogger {
    async fn log(&self, event: BillingAuditEvent) {
        tracing::info!(
            target: "billing::audit",
            event_type = %event_kind(&event),
            "{}", event
        );
    }
}

/// Get the event kind as a string for structured logging.
pub fn event_kind(event: &BillingAuditEvent) -> &'static str {
    match event {
        BillingAuditEvent::SubscriptionCreated { .. } => "subscription_created",
        BillingAuditEvent::SubscriptionPlanChanged { .. } => "subscription_plan_changed",
        BillingAuditEvent::SubscriptionStatusChanged { .. } => "subscription_status_changed",
        BillingAuditEvent::SubscriptionDeleted { .. } => "subscription_deleted",
        BillingAuditEvent::InvoiceCreated { .. } => "invoice_created",
        BillingAuditEvent::InvoicePaid { .. } => "invoice_paid",
        BillingAuditEvent::PaymentFailed { .. } => "payment_failed",
        BillingAuditEvent::PaymentReplayed { .. } => "payment_replayed",
        BillingAuditEvent::WebhookProcessed { .. } => "webhook_processed",
    }
}

/// Audit logger that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingAuditLogger {
    events: tokio::sync::Mutex<Vec<BillingAuditEvent>>,
}

impl RecordingAuditLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<BillingAuditEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl BillingAuditLogger for RecordingAuditLogger {
    async fn log(&self, event: BillingAuditEvent) {
        self.events.lock().await.push(event);
    }
}
