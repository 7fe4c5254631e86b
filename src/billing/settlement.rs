//! The one place an invoice becomes paid.
//!
//! Both direct pay and webhook reconciliation call [`Settlement::settle`]
//! while holding the invoice lock.

use super::audit::{BillingAuditEvent, BillingAuditLogger};
use super::error::BillingError;
use super::invoice::{Invoice, InvoiceStatus, PayReceipt, PaymentSource};
use super::locks::LockRegistry;
use super::storage::{BillingStore, NewPayment};
use super::subscription::SubscriptionStatus;
use crate::error::Result;
use chrono::Utc;
use std::sync::Arc;

pub struct Settlement {
    store: Arc<dyn BillingStore>,
    locks: Arc<LockRegistry>,
    audit: Arc<dyn BillingAuditLogger>,
}

impl Settlement {
    pub fn new(
        store: Arc<dyn BillingStore>,
        locks: Arc<LockRegistry>,
        audit: Arc<dyn BillingAuditLogger>,
    ) -> Self {
        Self { store, locks, audit }
    }

    /// Record a succeeded payment for the full amount and mark the invoice
    /// paid. The caller must hold the invoice lock.
    ///
    /// A `past_due` or `incomplete` subscription is reactivated unless its
    /// tenant already has another active subscription.
    pub async fn settle(
        &self,
        invoice: &Invoice,
        provider_ref: &str,
        source: PaymentSource,
    ) -> Result<PayReceipt> {
        if invoice.is_paid() {
            return Err(BillingError::InvoiceAlreadyPaid {
                invoice_id: invoice.id,
            }
            .into());
        }

        let payment = self
            .store
            .record_payment(
                invoice.id,
                NewPayment::succeeded(invoice.amount_cents, provider_ref, source),
            )
            .await?;

        let now = Utc::now();
        let mut paid = invoice.clone();
        paid.status = InvoiceStatus::Paid;
        paid.paid_at = Some(now);
        paid.updated_at = now;
        self.store.save_invoice(&paid).await?;

        let invoice = self
            .store
            .get_invoice(invoice.id)
            .await?
            .ok_or(BillingError::InvoiceNotFound {
                invoice_id: invoice.id,
            })?;

        tracing::info!(
            invoice_id = invoice.id,
            payment_id = payment.id,
            amount_cents = payment.amount_cents,
            source = ?source,
            "Invoice settled"
        );
        self.audit
            .log(BillingAuditEvent::InvoicePaid {
                tenant_id: invoice.tenant_id,
                invoice_id: invoice.id,
                payment_id: payment.id,
                source,
            })
            .await;

        self.reactivate_subscription(&invoice).await?;

        Ok(PayReceipt { invoice, payment })
    }

    async fn reactivate_subscription(&self, invoice: &Invoice) -> Result<()> {
        let _guard = self.locks.tenant(invoice.tenant_id).await;

        let Some(mut subscription) = self.store.get_subscription(invoice.subscription_id).await? else {
            return Ok(());
        };
        if !subscription.status.is_reactivatable() {
            return Ok(());
        }

        let other_active = self
            .store
            .list_subscriptions(Some(subscription.tenant_id))
            .await?
            .iter()
            .any(|s| s.is_active() && s.id != subscription.id);
        if other_active {
            tracing::debug!(
                subscription_id = subscription.id,
                "Tenant has another active subscription; not reactivating"
            );
            return Ok(());
        }

        let previous = subscription.status;
        subscription.status = SubscriptionStatus::Active;
        subscription.updated_at = Utc::now();
        self.store.save_subscription(&subscription).await?;

        tracing::info!(subscription_id = subscription.id, from = %previous, "Subscription reactivated by payment");
        self.audit
            .log(BillingAuditEvent::SubscriptionStatusChanged {
                tenant_id: subscription.tenant_id,
                subscription_id: subscription.id,
                from: previous,
                to: SubscriptionStatus::Active,
            })
            .await;
        Ok(())
    }
}
