//! Storage trait for billing data.
//!
//! Implement [`BillingStore`] to persist billing state. An in-memory
//! implementation lives in [`crate::storage`].

use super::idempotency::PayRecord;
use super::invoice::{Invoice, Payment, PaymentSource, PaymentStatus};
use super::plans::{Plan, PlanInput};
use super::subscription::{Subscription, SubscriptionStatus};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Fields of a subscription to insert.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub tenant_id: Uuid,
    pub plan_id: i64,
    pub status: SubscriptionStatus,
}

/// Fields of an invoice to insert. New invoices are `due`.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub tenant_id: Uuid,
    pub subscription_id: i64,
    pub amount_cents: i64,
    pub currency: String,
    pub period_start: Option<DateTime<Utc>>,
}

/// A payment attempt to append to an invoice's ledger.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub amount_cents: i64,
    pub status: PaymentStatus,
    pub provider_ref: String,
    pub source: PaymentSource,
}

impl NewPayment {
    pub fn succeeded(amount_cents: i64, provider_ref: &str, source: PaymentSource) -> Self {
        Self {
            amount_cents,
            status: PaymentStatus::Succeeded,
            provider_ref: provider_ref.to_string(),
            source,
        }
    }

    pub fn failed(amount_cents: i64, provider_ref: &str, source: PaymentSource) -> Self {
        Self {
            amount_cents,
            status: PaymentStatus::Failed,
            provider_ref: provider_ref.to_string(),
            source,
        }
    }
}

/// Persistence for plans, subscriptions, invoices, payments, idempotency
/// records and processed webhook events.
///
/// Lists are ordered: plans by price then name, subscriptions and invoices
/// newest first. A tenant filter of `None` returns every tenant's rows.
#[async_trait]
pub trait BillingStore: Send + Sync {
    // Plans

    async fn list_plans(&self, include_inactive: bool) -> Result<Vec<Plan>>;

    async fn get_plan(&self, plan_id: i64) -> Result<Option<Plan>>;

    /// Fails with a `name` field error if the name is taken.
    async fn insert_plan(&self, input: PlanInput) -> Result<Plan>;

    async fn update_plan(&self, plan_id: i64, input: PlanInput) -> Result<Plan>;

    async fn delete_plan(&self, plan_id: i64) -> Result<()>;

    /// Whether any subscription references the plan.
    async fn plan_in_use(&self, plan_id: i64) -> Result<bool>;

    // Subscriptions

    async fn list_subscriptions(&self, tenant_id: Option<Uuid>) -> Result<Vec<Subscription>>;

    async fn get_subscription(&self, subscription_id: i64) -> Result<Option<Subscription>>;

    async fn insert_subscription(&self, new: NewSubscription) -> Result<Subscription>;

    async fn save_subscription(&self, subscription: &Subscription) -> Result<()>;

    /// Delete a subscription and its invoices. Returns the number of
    /// invoices removed.
    async fn delete_subscription(&self, subscription_id: i64) -> Result<usize>;

    // Invoices and payments

    async fn list_invoices(&self, tenant_id: Option<Uuid>) -> Result<Vec<Invoice>>;

    async fn get_invoice(&self, invoice_id: i64) -> Result<Option<Invoice>>;

    async fn insert_invoice(&self, new: NewInvoice) -> Result<Invoice>;

    /// Persist invoice fields. The `payments` list is ignored; use
    /// [`record_payment`](Self::record_payment).
    async fn save_invoice(&self, invoice: &Invoice) -> Result<()>;

    async fn record_payment(&self, invoice_id: i64, payment: NewPayment) -> Result<Payment>;

    // Idempotency keys

    async fn get_pay_record(&self, key: &str) -> Result<Option<PayRecord>>;

    async fn save_pay_record(&self, key: &str, record: PayRecord) -> Result<()>;

    // Webhook idempotency

    async fn is_event_processed(&self, event_id: &str) -> Result<bool>;

    async fn mark_event_processed(&self, event_id: &str) -> Result<()>;
}
