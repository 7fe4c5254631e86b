//! Subscription billing.
//!
//! Plans, tenant subscriptions, invoices with their payment ledger, the
//! direct pay flow with idempotency keys and mock provider webhooks.
//!
//! # Example
//!
//! ```rust,ignore
//! use eshtarek::billing::{CreateSubscription, PayRequest};
//!
//! let subscription = ctx.subscriptions.create(&principal, CreateSubscription::for_plan(plan.id)).await?;
//! let invoice = ctx.invoices.create(&principal, CreateInvoice { subscription: subscription.id }).await?;
//! let outcome = ctx.invoices.pay(&principal, invoice.id, PayRequest::default(), Some(key)).await?;
//! assert!(outcome.receipt.invoice.is_paid());
//! ```

pub mod audit;
mod error;
pub mod idempotency;
pub mod invoice;
pub mod locks;
pub mod plans;
pub mod settlement;
pub mod storage;
pub mod subscription;
pub mod webhook;

pub use audit::{
    BillingAuditEvent, BillingAuditLogger, NoOpAuditLogger, RecordingAuditLogger, TracingAuditLogger,
};
pub use error::BillingError;
pub use idempotency::{IDEMPOTENCY_KEY_HEADER, IDEMPOTENT_REPLAYED_HEADER, IdempotencyKey, PayRecord};
pub use invoice::{
    CreateInvoice, DEFAULT_CURRENCY, Invoice, InvoiceManager, InvoiceStatus, PayOutcome, PayReceipt, PayRequest, Payment,
    PaymentSource, PaymentStatus,
};
pub use locks::{KeyedLockGuard, KeyedLocks, LockRegistry};
pub use plans::{Plan, PlanInput, PlanInterval, PlanManager, format_cents};
pub use settlement::Settlement;
pub use storage::{BillingStore, NewInvoice, NewPayment, NewSubscription};
pub use subscription::{
    ChangePlan, ChangeStatus, CreateSubscription, Subscription, SubscriptionManager, SubscriptionStatus,
    active_subscription,
};
pub use webhook::{MockWebhookEvent, WebhookEventType, WebhookHandler, WebhookOutcome, WebhookReceipt};
