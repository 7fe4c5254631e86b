//! Invoices, the payment ledger and the direct pay flow.

use super::audit::{BillingAuditEvent, BillingAuditLogger};
use super::error::BillingError;
use super::idempotency::{IdempotencyKey, PayRecord};
use super::locks::LockRegistry;
use super::settlement::Settlement;
use super::storage::{BillingStore, NewInvoice, NewPayment};
use super::subscription::require_tenant_admin;
use crate::auth::Principal;
use crate::error::{EshtarekError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Currency of every invoice.
pub const DEFAULT_CURRENCY: &str = "USD";

pub(crate) const PROVIDER_REF_DIRECT: &str = "mock_txn";
pub(crate) const PROVIDER_REF_DECLINED: &str = "mock_txn_failed";

/// Invoice status. `due` is the unpaid state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Due,
    Paid,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Due => "due",
            Self::Paid => "paid",
            Self::Void => "void",
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Succeeded,
    Failed,
}

/// Which path recorded a payment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSource {
    #[default]
    Direct,
    Webhook,
}

/// One payment attempt against an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    pub provider_ref: String,
    #[serde(default)]
    pub source: PaymentSource,
    pub created_at: DateTime<Utc>,
}

/// An invoice with its payment attempts, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    #[serde(rename = "tenant")]
    pub tenant_id: Uuid,
    #[serde(rename = "subscription")]
    pub subscription_id: i64,
    pub amount_cents: i64,
    pub currency: String,
    pub status: InvoiceStatus,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub issued_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub payments: Vec<Payment>,
}

impl Invoice {
    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }

    /// The settling payment, if any. There is never more than one.
    pub fn succeeded_payment(&self) -> Option<&Payment> {
        self.payments
            .iter()
            .find(|p| p.status == PaymentStatus::Succeeded)
    }
}

/// Body of `POST /billing/`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateInvoice {
    pub subscription: i64,
}

/// Body of `POST /billing/{id}/pay/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PayRequest {
    /// Force a declined attempt.
    #[serde(default)]
    pub simulate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, message = "Ensure this value is greater than or equal to 1."))]
    pub amount_cents: Option<i64>,
}

/// Successful pay response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayReceipt {
    pub invoice: Invoice,
    pub payment: Payment,
}

/// Result of a pay call that did not fail.
#[derive(Debug, Clone)]
pub struct PayOutcome {
    pub receipt: PayReceipt,
    /// The receipt came from an earlier request with the same key.
    pub replayed: bool,
}

/// Invoice operations.
pub struct InvoiceManager {
    store: Arc<dyn BillingStore>,
    locks: Arc<LockRegistry>,
    settlement: Arc<Settlement>,
    audit: Arc<dyn BillingAuditLogger>,
}

impl InvoiceManager {
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

    /// Invoices visible to the caller, newest first.
    pub async fn list(&self, principal: &Principal) -> Result<Vec<Invoice>> {
        self.store.list_invoices(principal.tenant_scope()).await
    }

    pub async fn get(&self, principal: &Principal, invoice_id: i64) -> Result<Invoice> {
        self.store
            .get_invoice(invoice_id)
            .await?
            .filter(|i| principal.can_access_tenant(i.tenant_id))
            .ok_or_else(|| BillingError::InvoiceNotFound { invoice_id }.into())
    }

    /// Issue an invoice for the subscription's current plan price.
    pub async fn create(&self, principal: &Principal, req: CreateInvoice) -> Result<Invoice> {
        require_tenant_admin(principal)?;

        let subscription = self
            .store
            .get_subscription(req.subscription)
            .await?
            .filter(|s| principal.can_access_tenant(s.tenant_id))
            .ok_or_else(|| {
                EshtarekError::field(
                    "subscription",
                    format!("Invalid pk \"{}\" - object does not exist.", req.subscription),
                )
            })?;
        let plan = self
            .store
            .get_plan(subscription.plan_id)
            .await?
            .ok_or(BillingError::PlanNotFound {
                plan_id: subscription.plan_id,
            })?;

        let invoice = self
            .store
            .insert_invoice(NewInvoice {
                tenant_id: subscription.tenant_id,
                subscription_id: subscription.id,
                amount_cents: plan.price_cents,
                currency: DEFAULT_CURRENCY.to_string(),
                period_start: Some(Utc::now()),
            })
            .await?;

        tracing::info!(
            invoice_id = invoice.id,
            subscription_id = subscription.id,
            amount_cents = invoice.amount_cents,
            "Invoice created"
        );
        self.audit
            .log(BillingAuditEvent::InvoiceCreated {
                tenant_id: invoice.tenant_id,
                invoice_id: invoice.id,
                amount_cents: invoice.amount_cents,
            })
            .await;

        Ok(invoice)
    }

    /// Pay an invoice.
    ///
    /// A declined attempt is recorded on the ledger and returned as
    /// [`BillingError::PaymentDeclined`]; the key stays unbound so the same
    /// key can be retried.
    pub async fn pay(
        &self,
        principal: &Principal,
        invoice_id: i64,
        req: PayRequest,
        key: Option<IdempotencyKey>,
    ) -> Result<PayOutcome> {
        require_tenant_admin(principal)?;
        self.get(principal, invoice_id).await?;

        let _key_guard = match &key {
            Some(key) => Some(self.locks.idempotency_key(key.as_str()).await),
            None => None,
        };
        let _invoice_guard = self.locks.invoice(invoice_id).await;

        if let Some(key) = &key {
            if let Some(record) = self.store.get_pay_record(key.as_str()).await? {
                if record.invoice_id != invoice_id {
                    tracing::warn!(
                        invoice_id,
                        bound_invoice_id = record.invoice_id,
                        "Idempotency key reused on another invoice"
                    );
                    return Err(BillingError::IdempotencyKeyReused {
                        key: key.to_string(),
                        invoice_id: record.invoice_id,
                    }
                    .into());
                }
                tracing::info!(invoice_id, "Replaying stored pay receipt");
                self.audit
                    .log(BillingAuditEvent::PaymentReplayed {
                        tenant_id: record.receipt.invoice.tenant_id,
                        invoice_id,
                    })
                    .await;
                return Ok(PayOutcome {
                    receipt: record.receipt,
                    replayed: true,
                });
            }
        }

        let invoice = self
            .store
            .get_invoice(invoice_id)
            .await?
            .ok_or(BillingError::InvoiceNotFound { invoice_id })?;
        match invoice.status {
            InvoiceStatus::Paid => return Err(BillingError::InvoiceAlreadyPaid { invoice_id }.into()),
            InvoiceStatus::Void => return Err(BillingError::InvoiceVoid { invoice_id }.into()),
            InvoiceStatus::Due => {}
        }

        let amount_cents = req.amount_cents.unwrap_or(invoice.amount_cents);

        if req.simulate {
            let payment = self
                .store
                .record_payment(
                    invoice_id,
                    NewPayment::failed(amount_cents, PROVIDER_REF_DECLINED, PaymentSource::Direct),
                )
                .await?;
            tracing::info!(invoice_id, payment_id = payment.id, "Payment declined");
            self.audit
                .log(BillingAuditEvent::PaymentFailed {
                    tenant_id: invoice.tenant_id,
                    invoice_id,
                    source: PaymentSource::Direct,
                })
                .await;
            return Err(BillingError::PaymentDeclined { invoice_id }.into());
        }

        if amount_cents != invoice.amount_cents {
            return Err(BillingError::AmountMismatch {
                expected: invoice.amount_cents,
                actual: amount_cents,
            }
            .into());
        }

        let receipt = self
            .settlement
            .settle(&invoice, PROVIDER_REF_DIRECT, PaymentSource::Direct)
            .await?;

        if let Some(key) = &key {
            self.store
                .save_pay_record(
                    key.as_str(),
                    PayRecord {
                        invoice_id,
                        receipt: receipt.clone(),
                    },
                )
                .await?;
        }

        Ok(PayOutcome {
            receipt,
            replayed: false,
        })
    }
}
